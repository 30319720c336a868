use std::collections::HashMap;
use std::sync::Arc;

use config::TuningConfig;

use crate::client::ParamClient;
use crate::history::HistoryStore;
use crate::report::ReportSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Clean,
    DirtyPending,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// The edit was applied remotely and recorded in history.
    Applied(f64),
    /// The remote store declined the write; the display must fall back to
    /// the last known-good value.
    Rejected { reverted_to: Option<f64> },
    /// The text did not parse as a finite number; no remote call was made
    /// and the group was re-read from remote truth.
    InvalidInput { refreshed: Vec<(String, f64)> },
}

/// Reconciles table edits, remote reads and the history stacks. All
/// operations run to completion on the caller's single event flow.
pub struct SyncController {
    config: Arc<TuningConfig>,
    client: ParamClient,
    history: HistoryStore,
    states: HashMap<(String, String), CellState>,
    active_group: String,
    sink: Arc<dyn ReportSink>,
}

impl SyncController {
    /// Seeds every parameter's history from the remote store's current
    /// value. Parameters whose initial read fails stay unseeded until a
    /// later refresh reads them successfully.
    pub fn new(config: Arc<TuningConfig>, client: ParamClient, sink: Arc<dyn ReportSink>) -> Self {
        let active_group = config.first_group().unwrap_or_default().to_string();
        let mut controller = Self {
            config,
            client,
            history: HistoryStore::new(),
            states: HashMap::new(),
            active_group,
            sink,
        };
        controller.seed_all();
        controller
    }

    fn seed_all(&mut self) {
        let config = Arc::clone(&self.config);
        for (group_name, group) in &config.groups {
            for param in group.params.keys() {
                match self.client.get(group_name, param, true) {
                    Ok(value) => {
                        self.history.seed(group_name, param, value);
                        self.set_state(group_name, param, CellState::Clean);
                    }
                    Err(_) => {
                        self.set_state(group_name, param, CellState::Error);
                    }
                }
            }
        }
    }

    pub fn client(&self) -> &ParamClient {
        &self.client
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn active_group(&self) -> &str {
        &self.active_group
    }

    pub fn cell_state(&self, group: &str, param: &str) -> CellState {
        self.states
            .get(&(group.to_string(), param.to_string()))
            .copied()
            .unwrap_or(CellState::Clean)
    }

    fn set_state(&mut self, group: &str, param: &str, state: CellState) {
        self.states
            .insert((group.to_string(), param.to_string()), state);
    }

    /// Handles a confirmed table edit.
    pub fn edit(&mut self, group: &str, param: &str, text: &str) -> EditOutcome {
        let value = match text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                self.sink
                    .warning("Invalid value type, please enter a number.");
                let refreshed = self.refresh(group);
                return EditOutcome::InvalidInput { refreshed };
            }
        };

        self.set_state(group, param, CellState::DirtyPending);
        match self.client.set(group, param, value, true) {
            Ok(()) => {
                self.history.record(group, param, value);
                self.set_state(group, param, CellState::Clean);
                EditOutcome::Applied(value)
            }
            Err(_) => {
                // the client has already reported the failure
                self.set_state(group, param, CellState::Error);
                EditOutcome::Rejected {
                    reverted_to: self.history.current(group, param),
                }
            }
        }
    }

    /// Pops one history entry and re-applies the exposed value remotely.
    /// The re-application is deliberately not recorded: it is an
    /// already-known value, not a new observation.
    pub fn reset_to_previous(&mut self, group: &str, param: &str) -> Option<f64> {
        let value = self.history.rewind_to_previous(group, param)?;
        self.reapply(group, param, value);
        Some(value)
    }

    /// Truncates history to the initial value and re-applies it remotely,
    /// without recording.
    pub fn reset_to_initial(&mut self, group: &str, param: &str) -> Option<f64> {
        let value = self.history.rewind_to_initial(group, param)?;
        self.reapply(group, param, value);
        Some(value)
    }

    fn reapply(&mut self, group: &str, param: &str, value: f64) {
        let state = if self.client.set(group, param, value, true).is_ok() {
            CellState::Clean
        } else {
            CellState::Error
        };
        self.set_state(group, param, state);
    }

    /// Re-reads every parameter of the group. A read that differs from the
    /// history top is an externally observed change and is recorded; a
    /// bit-identical read pushes nothing. Failed reads keep the last
    /// known-good value on display and never touch history.
    pub fn refresh(&mut self, group: &str) -> Vec<(String, f64)> {
        let config = Arc::clone(&self.config);
        let group_cfg = match config.group(group) {
            Some(group_cfg) => group_cfg,
            None => {
                self.sink
                    .warning(&format!("Unknown parameter group {group}"));
                return Vec::new();
            }
        };
        let mut rows = Vec::new();
        for param in group_cfg.params.keys() {
            match self.client.get(group, param, true) {
                Ok(value) => {
                    if !self.history.is_seeded(group, param) {
                        self.history.seed(group, param, value);
                    } else if self.history.current(group, param).map(f64::to_bits)
                        != Some(value.to_bits())
                    {
                        self.history.record(group, param, value);
                    }
                    self.set_state(group, param, CellState::Clean);
                    rows.push((param.clone(), value));
                }
                Err(_) => {
                    if let Some(value) = self.history.current(group, param) {
                        rows.push((param.clone(), value));
                    }
                }
            }
        }
        rows
    }

    /// Switches the active working set. No remote traffic: the display is
    /// restored from each parameter's history top.
    pub fn select_group(&mut self, group: &str) -> Vec<(String, f64)> {
        if self.config.group(group).is_some() {
            self.active_group = group.to_string();
        } else {
            self.sink.warning(&format!("Unknown parameter group {group}"));
        }
        let active = self.active_group.clone();
        self.rows(&active)
    }

    /// Display rows for a group from history tops, declaration order.
    /// Unseeded parameters show as 0.0 until a read succeeds.
    pub fn rows(&self, group: &str) -> Vec<(String, f64)> {
        let group_cfg = match self.config.group(group) {
            Some(group_cfg) => group_cfg,
            None => return Vec::new(),
        };
        group_cfg
            .params
            .keys()
            .map(|param| {
                (
                    param.clone(),
                    self.history.current(group, param).unwrap_or(0.0),
                )
            })
            .collect()
    }
}
