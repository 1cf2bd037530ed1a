//! Scripted in-memory transport for handler tests.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::config::PollingConfig;
use crate::error::NodeError;
use crate::operations::ExecutionContext;
use crate::transport::{Method, Transport};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
}

impl RecordedCall {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

type Route = (String, String);

/// Answers each `(method, path)` from a queue of scripted responses. The last
/// response of a queue repeats once the others are used up.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<Route, VecDeque<std::result::Result<Value, NodeError>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, path: &str, response: Value) -> &Self {
        self.push(method, path, Ok(response))
    }

    pub fn on_error(&self, method: Method, path: &str, error: NodeError) -> &Self {
        self.push(method, path, Err(error))
    }

    fn push(
        &self,
        method: Method,
        path: &str,
        response: std::result::Result<Value, NodeError>,
    ) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method.to_string(), path.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method && c.path == path)
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(String, String)],
    ) -> Result<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.clone(),
            path: path.to_string(),
            body,
            query: query.to_vec(),
        });

        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(&(method.to_string(), path.to_string()));
        let response = match queue {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match response {
            Some(Ok(value)) => Ok(value),
            Some(Err(err)) => Err(err.into()),
            None => Err(NodeError::Api {
                status: Some(404),
                message: format!("no scripted response for {} {}", method, path),
            }
            .into()),
        }
    }
}

pub fn fast_polling() -> PollingConfig {
    PollingConfig {
        qr_interval_ms: 1,
        qr_max_attempts: 5,
    }
}

pub fn context<'a>(transport: &'a FakeTransport, polling: &'a PollingConfig) -> ExecutionContext<'a> {
    ExecutionContext {
        transport,
        default_account_id: Some(1),
        polling,
    }
}
