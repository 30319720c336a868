use std::sync::Arc;

use config::TuningConfig;
use indexmap::IndexMap;
use serde_json::Value;

use crate::report::ReportSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotBinding {
    pub label: String,
    pub topic: String,
    pub field: String,
}

/// Parses a `/<topic>/<field>` binding string. The leading separator is
/// stripped; exactly two non-empty segments are required.
pub fn parse_binding(label: &str, raw: &str) -> Option<PlotBinding> {
    let parts: Vec<&str> = raw.trim_start_matches('/').split('/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return None;
    }
    Some(PlotBinding {
        label: label.to_string(),
        topic: parts[0].to_string(),
        field: parts[1].to_string(),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub topic: String,
    pub field: String,
    pub value: f64,
}

pub type MessageCallback = Box<dyn FnMut(&Value) + Send>;
pub type SampleConsumer = Arc<dyn Fn(Sample) + Send + Sync>;

/// The transport collaborator's subscription surface: runtime message-type
/// lookup plus callback registration. Delivery semantics are the
/// collaborator's concern.
pub trait TopicDirectory {
    fn topic_type(&self, topic: &str) -> Option<String>;
    fn subscribe(&mut self, topic: &str, callback: MessageCallback);
}

#[derive(Debug, Default)]
pub struct PlotFeed {
    bindings: IndexMap<String, PlotBinding>,
}

impl PlotFeed {
    pub fn bindings(&self) -> impl Iterator<Item = &PlotBinding> {
        self.bindings.values()
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.bindings.contains_key(topic)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Registers every configured plot topic with the directory. Each distinct
/// topic gets one subscription whose callback extracts the bound field from
/// incoming messages and forwards it to `consumer`. Topics whose type
/// cannot be resolved are reported and skipped.
pub fn register_plot_topics(
    config: &TuningConfig,
    directory: &mut dyn TopicDirectory,
    sink: &dyn ReportSink,
    consumer: SampleConsumer,
) -> PlotFeed {
    let mut feed = PlotFeed::default();
    for group in config.groups.values() {
        for (label, raw) in &group.plot_topics {
            let binding = match parse_binding(label, raw) {
                Some(binding) => binding,
                None => {
                    sink.warning(&format!(
                        "Malformed plot topic {raw} for {label}, expected /topic/field"
                    ));
                    continue;
                }
            };
            if feed.bindings.contains_key(&binding.topic) {
                continue;
            }
            if directory.topic_type(&binding.topic).is_none() {
                sink.error(&format!(
                    "Failed to get message type for {}, does the topic exist?",
                    binding.topic
                ));
                continue;
            }

            let topic = binding.topic.clone();
            let field = binding.field.clone();
            let consumer = Arc::clone(&consumer);
            directory.subscribe(
                &binding.topic,
                Box::new(move |message: &Value| {
                    if let Some(value) = message.get(&field).and_then(Value::as_f64) {
                        consumer(Sample {
                            topic: topic.clone(),
                            field: field.clone(),
                            value,
                        });
                    }
                }),
            );
            feed.bindings.insert(binding.topic.clone(), binding);
        }
    }
    feed
}
