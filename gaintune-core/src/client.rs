use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use config::TuningConfig;
use connection::{
    ParameterService, ParameterValue, ServiceConnector, ServiceError, ServiceRequest,
    ServiceResponse, ValueKind,
};

use crate::report::ReportSink;

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

#[derive(thiserror::Error, Debug)]
pub enum ParamError {
    #[error("unknown parameter group {0}")]
    UnknownGroup(String),
    #[error("unknown parameter {0}")]
    UnknownParameter(String),
    #[error("parameter {0} not found")]
    ParameterNotFound(String),
    #[error("unsupported parameter type {found} for {name}, only double is supported")]
    UnsupportedType { name: String, found: &'static str },
    #[error("service call failed: {0}")]
    Transport(#[from] ServiceError),
    #[error("failed to set {name} to {value}: {reason}")]
    RejectedWrite {
        name: String,
        value: f64,
        reason: String,
    },
}

/// Client side of the remote parameter store: one service handle per target
/// node, with bidirectional unit scaling between display and remote values.
pub struct ParamClient {
    config: Arc<TuningConfig>,
    services: HashMap<String, Box<dyn ParameterService>>,
    sink: Arc<dyn ReportSink>,
}

impl ParamClient {
    /// Connects one service per distinct target node, polling on a fixed
    /// interval until every service is reachable. The remote control node is
    /// assumed to come up eventually; there is no retry bound.
    pub fn connect(
        config: Arc<TuningConfig>,
        connector: &dyn ServiceConnector,
        sink: Arc<dyn ReportSink>,
        retry_interval: Duration,
    ) -> Self {
        let mut services: HashMap<String, Box<dyn ParameterService>> = HashMap::new();
        for group in config.groups.values() {
            if services.contains_key(&group.node) {
                continue;
            }
            let service = connector.connect(&group.node);
            while !service.available() {
                sink.info(&format!(
                    "{}/parameters service not available, waiting...",
                    group.node
                ));
                std::thread::sleep(retry_interval);
            }
            services.insert(group.node.clone(), service);
        }
        Self {
            config,
            services,
            sink,
        }
    }

    pub fn config(&self) -> &Arc<TuningConfig> {
        &self.config
    }

    /// Reads one parameter. With `scaled`, the raw remote value is multiplied
    /// by the spec's scale factor before return. Failures are reported at
    /// error severity; an `Err` means no authoritative value is available.
    pub fn get(&self, group: &str, param: &str, scaled: bool) -> Result<f64, ParamError> {
        let result = self.get_inner(group, param, scaled);
        if let Err(err) = &result {
            self.sink.error(&err.to_string());
        }
        result
    }

    /// Display fallback for shells that need a value unconditionally. The
    /// zero is not authoritative and must never be recorded or persisted.
    pub fn get_or_default(&self, group: &str, param: &str, scaled: bool) -> f64 {
        self.get(group, param, scaled).unwrap_or(0.0)
    }

    /// Writes one parameter as a double. With `scaled`, the input is divided
    /// by the spec's scale factor first, so `set(get())` round-trips the
    /// displayed value onto the identical raw value.
    pub fn set(&self, group: &str, param: &str, value: f64, scaled: bool) -> Result<(), ParamError> {
        match self.set_inner(group, param, value, scaled) {
            Ok((node, raw)) => {
                self.sink.info(&format!("Set {node}/{param} to {raw}"));
                Ok(())
            }
            Err(err) => {
                self.sink.error(&err.to_string());
                Err(err)
            }
        }
    }

    fn scale_for(&self, group: &str, param: &str, scaled: bool) -> Result<f64, ParamError> {
        let spec = self
            .config
            .group(group)
            .ok_or_else(|| ParamError::UnknownGroup(group.to_string()))?
            .params
            .get(param)
            .ok_or_else(|| ParamError::UnknownParameter(param.to_string()))?;
        if scaled {
            Ok(spec.scale.unwrap_or(1.0))
        } else {
            Ok(1.0)
        }
    }

    fn service(&self, group: &str) -> Result<(&str, &dyn ParameterService), ParamError> {
        let node = self
            .config
            .node_of(group)
            .ok_or_else(|| ParamError::UnknownGroup(group.to_string()))?;
        let service = self
            .services
            .get(node)
            .ok_or(ParamError::Transport(ServiceError::Unavailable))?;
        Ok((node, service.as_ref()))
    }

    fn get_inner(&self, group: &str, param: &str, scaled: bool) -> Result<f64, ParamError> {
        let scale = self.scale_for(group, param, scaled)?;
        let (_, service) = self.service(group)?;
        let request = ServiceRequest::GetParameters {
            names: vec![param.to_string()],
        };
        match service.call(&request)? {
            ServiceResponse::Values { values } => {
                let value = values
                    .into_iter()
                    .next()
                    .ok_or_else(|| ParamError::ParameterNotFound(param.to_string()))?;
                match value.value {
                    ValueKind::Double(raw) => Ok(raw * scale),
                    other => Err(ParamError::UnsupportedType {
                        name: param.to_string(),
                        found: other.type_name(),
                    }),
                }
            }
            ServiceResponse::Error { message } => Err(ServiceError::Remote(message).into()),
            ServiceResponse::SetResults { .. } => Err(ServiceError::UnexpectedResponse.into()),
        }
    }

    fn set_inner(
        &self,
        group: &str,
        param: &str,
        value: f64,
        scaled: bool,
    ) -> Result<(String, f64), ParamError> {
        let scale = self.scale_for(group, param, scaled)?;
        let raw = value / scale;
        let (node, service) = self.service(group)?;
        let node = node.to_string();
        let request = ServiceRequest::SetParameters {
            parameters: vec![ParameterValue {
                name: param.to_string(),
                value: ValueKind::Double(raw),
            }],
        };
        match service.call(&request)? {
            ServiceResponse::SetResults { results } => {
                let result = results
                    .into_iter()
                    .next()
                    .ok_or(ParamError::Transport(ServiceError::UnexpectedResponse))?;
                if result.successful {
                    Ok((node, raw))
                } else {
                    Err(ParamError::RejectedWrite {
                        name: param.to_string(),
                        value: raw,
                        reason: result.reason,
                    })
                }
            }
            ServiceResponse::Error { message } => Err(ServiceError::Remote(message).into()),
            ServiceResponse::Values { .. } => Err(ServiceError::UnexpectedResponse.into()),
        }
    }
}
