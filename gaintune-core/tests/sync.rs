use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use config::TuningConfig;
use connection::{
    ParameterService, ParameterStore, ServiceConnector, ServiceError, ServiceRequest,
    ServiceResponse, SetResult, StoreService, ValueKind,
};
use gaintune_core::{CellState, EditOutcome, MemorySink, ParamClient, Severity, SyncController};

const CONFIG: &str = r#"
rate_controller:
  node: /rate_ctrl
  params:
    kp:
      description: Roll rate proportional gain
attitude_controller:
  node: /attitude_ctrl
  params:
    theta_kp:
      description: Pitch angle proportional gain
"#;

fn sample_config() -> Arc<TuningConfig> {
    Arc::new(TuningConfig::from_yaml_str(CONFIG).expect("load config"))
}

// Connector that counts calls and can reject writes or fail reads on demand,
// so tests can observe exactly what the controller sends.
#[derive(Clone, Default)]
struct Harness {
    stores: std::collections::HashMap<String, ParameterStore>,
    calls: Arc<AtomicUsize>,
    reject_writes: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
}

struct HarnessService {
    inner: StoreService,
    calls: Arc<AtomicUsize>,
    reject_writes: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
}

impl ParameterService for HarnessService {
    fn call(&self, request: &ServiceRequest) -> Result<ServiceResponse, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match request {
            ServiceRequest::GetParameters { .. } if self.fail_reads.load(Ordering::SeqCst) => {
                Err(ServiceError::Unavailable)
            }
            ServiceRequest::SetParameters { parameters }
                if self.reject_writes.load(Ordering::SeqCst) =>
            {
                Ok(ServiceResponse::SetResults {
                    results: parameters
                        .iter()
                        .map(|_| SetResult::rejected("parameter is read-only"))
                        .collect(),
                })
            }
            _ => self.inner.call(request),
        }
    }

    fn available(&self) -> bool {
        true
    }
}

impl Harness {
    fn new() -> Self {
        let mut harness = Self::default();
        let rate = ParameterStore::new();
        rate.declare("kp", ValueKind::Double(2.5));
        let attitude = ParameterStore::new();
        attitude.declare("theta_kp", ValueKind::Double(0.8));
        harness.stores.insert("rate_ctrl".to_string(), rate);
        harness.stores.insert("attitude_ctrl".to_string(), attitude);
        harness
    }

    fn store(&self, node: &str) -> &ParameterStore {
        &self.stores[node.trim_start_matches('/')]
    }

    fn controller(&self) -> (SyncController, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let client = ParamClient::connect(
            sample_config(),
            self,
            sink.clone(),
            Duration::from_millis(1),
        );
        let controller = SyncController::new(sample_config(), client, sink.clone());
        (controller, sink)
    }
}

impl ServiceConnector for Harness {
    fn connect(&self, node: &str) -> Box<dyn ParameterService> {
        let store = self
            .stores
            .get(node.trim_start_matches('/'))
            .cloned()
            .unwrap_or_default();
        Box::new(HarnessService {
            inner: StoreService::new(store),
            calls: Arc::clone(&self.calls),
            reject_writes: Arc::clone(&self.reject_writes),
            fail_reads: Arc::clone(&self.fail_reads),
        })
    }
}

#[test]
fn construction_seeds_history_from_remote_values() {
    let harness = Harness::new();
    let (controller, _sink) = harness.controller();

    assert_eq!(controller.active_group(), "rate_controller");
    assert_eq!(controller.history().current("rate_controller", "kp"), Some(2.5));
    assert_eq!(
        controller.history().initial("attitude_controller", "theta_kp"),
        Some(0.8)
    );
}

#[test]
fn applied_edit_sets_remotely_and_records_history() {
    let harness = Harness::new();
    let (mut controller, _sink) = harness.controller();

    let outcome = controller.edit("rate_controller", "kp", "3.0");
    assert_eq!(outcome, EditOutcome::Applied(3.0));

    assert_eq!(
        harness.store("/rate_ctrl").value("kp"),
        Some(ValueKind::Double(3.0))
    );
    assert_eq!(controller.history().depth("rate_controller", "kp"), 2);
    assert_eq!(controller.history().initial("rate_controller", "kp"), Some(2.5));
    assert_eq!(
        controller.cell_state("rate_controller", "kp"),
        CellState::Clean
    );
}

#[test]
fn reset_to_previous_reapplies_without_recording() {
    let harness = Harness::new();
    let (mut controller, _sink) = harness.controller();

    controller.edit("rate_controller", "kp", "3.0");
    let value = controller.reset_to_previous("rate_controller", "kp");

    assert_eq!(value, Some(2.5));
    // the remote store reflects the reverted value
    assert_eq!(
        harness.store("/rate_ctrl").value("kp"),
        Some(ValueKind::Double(2.5))
    );
    // history is [2.5], not [2.5, 2.5]
    assert_eq!(controller.history().depth("rate_controller", "kp"), 1);
}

#[test]
fn reset_to_previous_on_unedited_parameter_is_a_no_op() {
    let harness = Harness::new();
    let (mut controller, _sink) = harness.controller();

    assert_eq!(
        controller.reset_to_previous("rate_controller", "kp"),
        Some(2.5)
    );
    assert_eq!(controller.history().depth("rate_controller", "kp"), 1);
}

#[test]
fn reset_to_initial_truncates_history_and_reapplies() {
    let harness = Harness::new();
    let (mut controller, _sink) = harness.controller();

    controller.edit("rate_controller", "kp", "3.0");
    controller.edit("rate_controller", "kp", "4.0");
    let value = controller.reset_to_initial("rate_controller", "kp");

    assert_eq!(value, Some(2.5));
    assert_eq!(controller.history().depth("rate_controller", "kp"), 1);
    assert_eq!(
        harness.store("/rate_ctrl").value("kp"),
        Some(ValueKind::Double(2.5))
    );
}

#[test]
fn invalid_input_warns_refreshes_and_skips_the_remote_call() {
    let harness = Harness::new();
    let (mut controller, sink) = harness.controller();
    let calls_before = harness.calls.load(Ordering::SeqCst);

    let outcome = controller.edit("rate_controller", "kp", "abc");
    match outcome {
        EditOutcome::InvalidInput { refreshed } => {
            assert_eq!(refreshed, vec![("kp".to_string(), 2.5)]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(sink.count(Severity::Warning), 1);
    // the remote store was only read again, never written
    assert_eq!(
        harness.store("/rate_ctrl").value("kp"),
        Some(ValueKind::Double(2.5))
    );
    let reads = harness.calls.load(Ordering::SeqCst) - calls_before;
    assert_eq!(reads, 1);
    assert_eq!(controller.history().depth("rate_controller", "kp"), 1);
}

#[test]
fn rejected_edit_reverts_to_the_last_known_good_value() {
    let harness = Harness::new();
    let (mut controller, _sink) = harness.controller();
    harness.reject_writes.store(true, Ordering::SeqCst);

    let outcome = controller.edit("rate_controller", "kp", "9.0");
    assert_eq!(
        outcome,
        EditOutcome::Rejected {
            reverted_to: Some(2.5)
        }
    );
    assert_eq!(controller.history().depth("rate_controller", "kp"), 1);
    assert_eq!(
        controller.cell_state("rate_controller", "kp"),
        CellState::Error
    );
    assert_eq!(
        harness.store("/rate_ctrl").value("kp"),
        Some(ValueKind::Double(2.5))
    );
}

#[test]
fn refresh_is_idempotent_for_unchanged_values() {
    let harness = Harness::new();
    let (mut controller, _sink) = harness.controller();

    let rows = controller.refresh("rate_controller");
    assert_eq!(rows, vec![("kp".to_string(), 2.5)]);
    assert_eq!(controller.history().depth("rate_controller", "kp"), 1);
}

#[test]
fn refresh_records_externally_changed_values() {
    let harness = Harness::new();
    let (mut controller, _sink) = harness.controller();

    // another tuning client changes the value behind our back
    harness.store("/rate_ctrl").declare("kp", ValueKind::Double(4.0));

    let rows = controller.refresh("rate_controller");
    assert_eq!(rows, vec![("kp".to_string(), 4.0)]);
    assert_eq!(controller.history().depth("rate_controller", "kp"), 2);
    assert_eq!(controller.history().previous("rate_controller", "kp"), Some(2.5));
}

#[test]
fn refresh_keeps_the_last_known_good_value_on_failed_reads() {
    let harness = Harness::new();
    let (mut controller, _sink) = harness.controller();

    controller.edit("rate_controller", "kp", "3.0");
    harness.fail_reads.store(true, Ordering::SeqCst);

    let rows = controller.refresh("rate_controller");
    assert_eq!(rows, vec![("kp".to_string(), 3.0)]);
    assert_eq!(controller.history().depth("rate_controller", "kp"), 2);
}

#[test]
fn group_switch_restores_from_history_without_remote_calls() {
    let harness = Harness::new();
    let (mut controller, _sink) = harness.controller();
    let calls_before = harness.calls.load(Ordering::SeqCst);

    let rows = controller.select_group("attitude_controller");

    assert_eq!(controller.active_group(), "attitude_controller");
    assert_eq!(rows, vec![("theta_kp".to_string(), 0.8)]);
    assert_eq!(harness.calls.load(Ordering::SeqCst), calls_before);
}

#[test]
fn selecting_an_unknown_group_warns_and_keeps_the_active_one() {
    let harness = Harness::new();
    let (mut controller, sink) = harness.controller();

    let rows = controller.select_group("no_such_group");

    assert_eq!(controller.active_group(), "rate_controller");
    assert_eq!(rows, vec![("kp".to_string(), 2.5)]);
    assert_eq!(sink.count(Severity::Warning), 1);
}
