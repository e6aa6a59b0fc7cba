#![allow(dead_code)]
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use teamflow::domain::errors::{ClientError, ClientResult};
use teamflow::domain::ports::PageFetcher;
use teamflow::models::Page;
use tokio::sync::Notify;

/// Page fetcher that replays scripted responses per page index and records
/// every request it receives.
///
/// A page can be gated: its fetch then parks until the gate is opened, which
/// lets tests interleave calls deterministically.
pub struct ScriptedFetcher<T> {
    responses: Mutex<HashMap<u32, VecDeque<ClientResult<Page<T>>>>>,
    gates: Mutex<HashMap<u32, Arc<Notify>>>,
    calls: Mutex<Vec<u32>>,
}

impl<T: Clone + Send + Sync + 'static> ScriptedFetcher<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Queues a successful response for `page`.
    pub fn respond(&self, page: u32, content: Vec<T>, last: bool) {
        let size = content.len() as u32;
        self.push(
            page,
            Ok(Page {
                content,
                page,
                size,
                total_elements: 0,
                total_pages: 0,
                last,
            }),
        );
    }

    /// Queues a failure for `page`.
    pub fn fail(&self, page: u32, err: ClientError) {
        self.push(page, Err(err));
    }

    fn push(&self, page: u32, response: ClientResult<Page<T>>) {
        self.responses
            .lock()
            .unwrap()
            .entry(page)
            .or_default()
            .push_back(response);
    }

    /// Makes the next fetches of `page` wait until the returned gate is notified.
    pub fn gate(&self, page: u32) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(page, gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> PageFetcher<T> for ScriptedFetcher<T> {
    async fn fetch_page(&self, page: u32, _size: u32) -> ClientResult<Page<T>> {
        self.calls.lock().unwrap().push(page);

        let gate = self.gates.lock().unwrap().remove(&page);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.responses
            .lock()
            .unwrap()
            .get_mut(&page)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(ClientError::server_fault(format!("No response scripted for page {}", page))))
    }
}
