// Copyright 2024-present The Pregel Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Transports which misbehave on purpose.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pregel_api::{WorkerId, WorkerRequest, WorkerResponse};
use pregel_server::transport::{LocalTransport, Transport};
use pregel_server::{Error, Result};

/// Delivers every request, but loses the first response of each distinct
/// request, so every request is sent at least twice.
pub struct LoseFirstResponse {
    inner: LocalTransport,
    seen: Mutex<HashSet<String>>,
    pub lost: AtomicU64,
}

impl LoseFirstResponse {
    pub fn new(inner: LocalTransport) -> Arc<Self> {
        Arc::new(LoseFirstResponse {
            inner,
            seen: Mutex::default(),
            lost: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl Transport for LoseFirstResponse {
    async fn call(&self, target: WorkerId, request: WorkerRequest) -> Result<WorkerResponse> {
        let fingerprint = format!("{target}:{}", serde_json::to_string(&request)?);
        let first = self.seen.lock().unwrap().insert(fingerprint);
        let resp = self.inner.call(target, request).await;
        if first && resp.is_ok() {
            self.lost.fetch_add(1, Ordering::SeqCst);
            return Err(Error::Transport("connection reset by peer".into()));
        }
        resp
    }
}

/// How [`Faulty`] treats requests to the faulty worker.
#[derive(Clone, Copy, Debug)]
pub enum Fault {
    /// Refuse the connection.
    Refuse,
    /// Never answer.
    Hang,
}

/// Requests to `worker` fail once `after` requests were sent to it.
pub struct Faulty {
    inner: LocalTransport,
    worker: WorkerId,
    fault: Fault,
    after: u64,
    sent: AtomicU64,
}

impl Faulty {
    pub fn new(inner: LocalTransport, worker: WorkerId, fault: Fault, after: u64) -> Arc<Self> {
        Arc::new(Faulty { inner, worker, fault, after, sent: AtomicU64::new(0) })
    }
}

#[async_trait]
impl Transport for Faulty {
    async fn call(&self, target: WorkerId, request: WorkerRequest) -> Result<WorkerResponse> {
        if target == self.worker && self.sent.fetch_add(1, Ordering::SeqCst) >= self.after {
            match self.fault {
                Fault::Refuse => return Err(Error::Transport("connection refused".into())),
                Fault::Hang => futures::future::pending::<()>().await,
            }
        }
        self.inner.call(target, request).await
    }
}
