#![allow(dead_code)]
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use teamflow::domain::errors::{ClientError, ClientResult};
use teamflow::domain::ports::{HttpMethod, RemoteGateway};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

/// Gateway double: records every call and answers from a FIFO script.
/// An empty script answers `Ok(None)` for sends and a server fault for gets.
#[derive(Default)]
pub struct MockGateway {
    script: Mutex<VecDeque<ClientResult<Option<Value>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, body: Value) {
        self.script.lock().unwrap().push_back(Ok(Some(body)));
    }

    pub fn respond_empty(&self) {
        self.script.lock().unwrap().push_back(Ok(None));
    }

    pub fn fail(&self, err: ClientError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next(&self) -> Option<ClientResult<Option<Value>>> {
        self.script.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn get(&self, path: &str, _query: &[(&str, String)]) -> ClientResult<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: HttpMethod::Get,
            path: path.to_string(),
            body: None,
        });
        match self.next() {
            Some(Ok(Some(value))) => Ok(value),
            Some(Err(err)) => Err(err),
            _ => Err(ClientError::server_fault(format!("Nothing scripted for GET {}", path))),
        }
    }

    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> ClientResult<Option<Value>> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.to_string(),
            body,
        });
        self.next().unwrap_or(Ok(None))
    }
}
