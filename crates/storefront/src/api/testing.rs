//! Scripted in-process transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::{ApiError, ApiRequest, Method, Transport};

type Reply = Box<dyn Fn(&ApiRequest) -> Result<Value, ApiError> + Send + Sync>;

/// Transport that answers from per-route scripts and records every request.
///
/// Each route holds a queue of replies; the last reply repeats once the queue
/// is down to one entry. Unscripted routes answer `NotFound`.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful payload for a route.
    pub fn ok(&self, method: Method, path: &str, data: Value) -> &Self {
        self.reply(method, path, move |_| Ok(data.clone()))
    }

    /// Queue a rejection for a route.
    pub fn reject(&self, method: Method, path: &str, message: &str) -> &Self {
        let message = message.to_string();
        self.reply(method, path, move |_| Err(ApiError::Rejected(message.clone())))
    }

    /// Queue a computed reply for a route.
    pub fn reply(
        &self,
        method: Method,
        path: &str,
        reply: impl Fn(&ApiRequest) -> Result<Value, ApiError> + Send + Sync + 'static,
    ) -> &Self {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Box::new(reply));
        self
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests received for one route.
    pub fn calls_to(&self, method: &Method, path: &str) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|c| &c.method == method && c.path == path)
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (request.method.clone(), request.path.clone());
        let Some(queue) = routes.get_mut(&key) else {
            return Err(ApiError::NotFound(request.path));
        };
        if queue.len() > 1 {
            if let Some(reply) = queue.pop_front() {
                return reply(&request);
            }
        }
        match queue.front() {
            Some(reply) => reply(&request),
            None => Err(ApiError::NotFound(request.path)),
        }
    }
}
