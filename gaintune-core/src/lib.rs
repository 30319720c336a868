pub mod client;
pub mod history;
pub mod plotfeed;
pub mod report;
pub mod snapshot;
pub mod sync;

pub use client::{ParamClient, ParamError, DEFAULT_RETRY_INTERVAL};
pub use history::HistoryStore;
pub use plotfeed::{register_plot_topics, PlotBinding, PlotFeed, Sample, TopicDirectory};
pub use report::{LogSink, MemorySink, ReportSink, Severity};
pub use snapshot::{save_params, snapshot_group};
pub use sync::{CellState, EditOutcome, SyncController};
