use std::collections::HashMap;

/// Per-(group, parameter) stacks of observed values, oldest first. Index 0
/// is the initial value seen at load time and is never removed; every stack
/// that exists holds at least one entry.
#[derive(Debug, Default)]
pub struct HistoryStore {
    stacks: HashMap<(String, String), Vec<f64>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(group: &str, param: &str) -> (String, String) {
        (group.to_string(), param.to_string())
    }

    /// Establishes the initial value, exactly once per key. Returns false
    /// without touching the stack when the key already has entries.
    pub fn seed(&mut self, group: &str, param: &str, value: f64) -> bool {
        let stack = self.stacks.entry(Self::key(group, param)).or_default();
        if stack.is_empty() {
            stack.push(value);
            true
        } else {
            false
        }
    }

    pub fn is_seeded(&self, group: &str, param: &str) -> bool {
        self.stacks
            .get(&Self::key(group, param))
            .map_or(false, |stack| !stack.is_empty())
    }

    /// Appends unconditionally. Call once an edit is confirmed applied, or
    /// when a refresh observes an externally changed value.
    pub fn record(&mut self, group: &str, param: &str, value: f64) {
        self.stacks
            .entry(Self::key(group, param))
            .or_default()
            .push(value);
    }

    pub fn current(&self, group: &str, param: &str) -> Option<f64> {
        self.stacks
            .get(&Self::key(group, param))
            .and_then(|stack| stack.last().copied())
    }

    pub fn initial(&self, group: &str, param: &str) -> Option<f64> {
        self.stacks
            .get(&Self::key(group, param))
            .and_then(|stack| stack.first().copied())
    }

    /// The value one pop would expose, without mutating.
    pub fn previous(&self, group: &str, param: &str) -> Option<f64> {
        let stack = self.stacks.get(&Self::key(group, param))?;
        if stack.len() > 1 {
            stack.get(stack.len() - 2).copied()
        } else {
            stack.first().copied()
        }
    }

    pub fn depth(&self, group: &str, param: &str) -> usize {
        self.stacks
            .get(&Self::key(group, param))
            .map_or(0, Vec::len)
    }

    /// Pops the last entry and returns the new last. A single-entry stack is
    /// returned unchanged; the stack never drops below one entry.
    pub fn rewind_to_previous(&mut self, group: &str, param: &str) -> Option<f64> {
        let stack = self.stacks.get_mut(&Self::key(group, param))?;
        if stack.len() > 1 {
            stack.pop();
        }
        stack.last().copied()
    }

    /// Truncates the stack to its initial entry and returns it.
    pub fn rewind_to_initial(&mut self, group: &str, param: &str) -> Option<f64> {
        let stack = self.stacks.get_mut(&Self::key(group, param))?;
        let initial = *stack.first()?;
        stack.truncate(1);
        Some(initial)
    }
}
