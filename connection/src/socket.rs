use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use crate::protocol::{ServiceRequest, ServiceResponse};
use crate::{ParameterService, ParameterStore, ServiceConnector, ServiceError};

/// JSON-line client for a node's parameter service socket. One connection
/// per call; the calling flow blocks until the response line arrives.
pub struct SocketService {
    socket_path: PathBuf,
}

impl SocketService {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl ParameterService for SocketService {
    fn call(&self, request: &ServiceRequest) -> Result<ServiceResponse, ServiceError> {
        let mut stream =
            UnixStream::connect(&self.socket_path).map_err(|_| ServiceError::Unavailable)?;
        let payload = serde_json::to_string(request)?;
        stream.write_all(format!("{payload}\n").as_bytes())?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line)?;
        if line.trim().is_empty() {
            return Err(ServiceError::Closed);
        }
        Ok(serde_json::from_str(line.trim())?)
    }

    fn available(&self) -> bool {
        UnixStream::connect(&self.socket_path).is_ok()
    }
}

/// Answers one request on an accepted stream from a store.
pub fn serve_connection(stream: UnixStream, store: &ParameterStore) -> Result<(), ServiceError> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Err(ServiceError::Closed);
    }
    let request: ServiceRequest = serde_json::from_str(line.trim())?;
    let response = store.handle(&request);
    let payload = serde_json::to_string(&response)?;
    let mut stream = stream;
    stream.write_all(format!("{payload}\n").as_bytes())?;
    Ok(())
}

// Resolves each target node to <root>/<stripped-node>/parameters.sock.
pub struct SocketConnector {
    root: PathBuf,
}

impl SocketConnector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn socket_path(&self, node: &str) -> PathBuf {
        self.root
            .join(node.trim_start_matches('/'))
            .join("parameters.sock")
    }
}

impl ServiceConnector for SocketConnector {
    fn connect(&self, node: &str) -> Box<dyn ParameterService> {
        Box::new(SocketService::new(self.socket_path(node)))
    }
}
