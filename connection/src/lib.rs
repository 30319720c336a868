use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex};

pub mod protocol;
pub mod socket;

pub use protocol::{ParameterValue, ServiceRequest, ServiceResponse, SetResult, ValueKind};
pub use socket::{serve_connection, SocketConnector, SocketService};

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("service not available")]
    Unavailable,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("connection closed before a response arrived")]
    Closed,
    #[error("remote error: {0}")]
    Remote(String),
    #[error("unexpected response kind")]
    UnexpectedResponse,
}

pub trait ParameterService: Send {
    fn call(&self, request: &ServiceRequest) -> Result<ServiceResponse, ServiceError>;
    fn available(&self) -> bool;
}

pub trait ServiceConnector {
    fn connect(&self, node: &str) -> Box<dyn ParameterService>;
}

/// Shared name/value map with the remote store's get/set semantics, backing
/// the in-process loopback transport and socket servers.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    values: Arc<Mutex<HashMap<String, ValueKind>>>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&self, name: &str, value: ValueKind) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(name.to_string(), value);
        }
    }

    pub fn value(&self, name: &str) -> Option<ValueKind> {
        self.values.lock().ok()?.get(name).cloned()
    }

    pub fn handle(&self, request: &ServiceRequest) -> ServiceResponse {
        match request {
            ServiceRequest::GetParameters { names } => {
                let values = names
                    .iter()
                    .filter_map(|name| {
                        self.value(name).map(|value| ParameterValue {
                            name: name.clone(),
                            value,
                        })
                    })
                    .collect();
                ServiceResponse::Values { values }
            }
            ServiceRequest::SetParameters { parameters } => {
                let results = parameters.iter().map(|param| self.apply(param)).collect();
                ServiceResponse::SetResults { results }
            }
        }
    }

    // Writes must match a declared name and its declared type.
    fn apply(&self, param: &ParameterValue) -> SetResult {
        let mut values = match self.values.lock() {
            Ok(values) => values,
            Err(_) => return SetResult::rejected("parameter store poisoned"),
        };
        match values.get(&param.name) {
            None => SetResult::rejected(format!("parameter {} is not declared", param.name)),
            Some(current) if mem::discriminant(current) != mem::discriminant(&param.value) => {
                SetResult::rejected(format!(
                    "parameter {} is declared as {}, got {}",
                    param.name,
                    current.type_name(),
                    param.value.type_name()
                ))
            }
            Some(_) => {
                values.insert(param.name.clone(), param.value.clone());
                SetResult::ok()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreService {
    store: ParameterStore,
}

impl StoreService {
    pub fn new(store: ParameterStore) -> Self {
        Self { store }
    }
}

impl ParameterService for StoreService {
    fn call(&self, request: &ServiceRequest) -> Result<ServiceResponse, ServiceError> {
        Ok(self.store.handle(request))
    }

    fn available(&self) -> bool {
        true
    }
}

// Node names are keyed with the leading path separator stripped so
// configured names like `/rate_ctrl` resolve.
#[derive(Default)]
pub struct StoreConnector {
    stores: HashMap<String, ParameterStore>,
}

impl StoreConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: &str, store: ParameterStore) {
        self.stores
            .insert(node.trim_start_matches('/').to_string(), store);
    }

    pub fn store(&self, node: &str) -> Option<&ParameterStore> {
        self.stores.get(node.trim_start_matches('/'))
    }
}

impl ServiceConnector for StoreConnector {
    fn connect(&self, node: &str) -> Box<dyn ParameterService> {
        let store = self.store(node).cloned().unwrap_or_default();
        Box::new(StoreService::new(store))
    }
}
