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

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::oneshot;
use log::{trace, warn};
use pregel_api::{WorkerId, WorkerRequest, WorkerResponse};

use crate::retry::RetryState;
use crate::{Error, Result};

/// The requests a worker answers, see [`WorkerRequest`].
#[async_trait]
pub trait WorkerService: Send + Sync + 'static {
    async fn handle(&self, request: WorkerRequest) -> Result<WorkerResponse>;
}

/// Delivers requests to workers.
///
/// A request may be delivered more than once when it is retried, so all
/// requests are idempotent on the worker side.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn call(&self, target: WorkerId, request: WorkerRequest) -> Result<WorkerResponse>;
}

/// An in-process [`Transport`].
///
/// Requests and responses are serialized as they would be on the wire, and
/// the handler runs in its own task, so a caller giving up does not cancel
/// a request half way.
#[derive(Clone, Default)]
pub struct LocalTransport {
    services: Arc<RwLock<HashMap<WorkerId, Arc<dyn WorkerService>>>>,
}

impl LocalTransport {
    pub fn register(&self, worker: WorkerId, service: Arc<dyn WorkerService>) {
        let mut services = self.services.write().expect("poisoned");
        services.insert(worker, service);
    }

    pub fn deregister(&self, worker: WorkerId) -> Option<Arc<dyn WorkerService>> {
        let mut services = self.services.write().expect("poisoned");
        services.remove(&worker)
    }

    /// Drop all registered services.
    pub fn clear(&self) {
        let mut services = self.services.write().expect("poisoned");
        services.clear();
    }

    fn service(&self, worker: WorkerId) -> Option<Arc<dyn WorkerService>> {
        let services = self.services.read().expect("poisoned");
        services.get(&worker).cloned()
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn call(&self, target: WorkerId, request: WorkerRequest) -> Result<WorkerResponse> {
        let service = self.service(target).ok_or(Error::WorkerNotFound(target))?;
        let name = request.name();
        let bytes = serde_json::to_vec(&request)?;
        trace!("send request. worker={target}, request={name}, bytes={}", bytes.len());

        let (sender, receiver) = oneshot::channel();
        pregel_runtime::spawn_detached(async move {
            let resp = match serde_json::from_slice::<WorkerRequest>(&bytes) {
                Ok(request) => service.handle(request).await,
                Err(err) => Err(err.into()),
            };
            let resp = resp.and_then(|resp| Ok(serde_json::to_vec(&resp)?));
            let _ = sender.send(resp);
        });

        let bytes = receiver.await??;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Call `target`, retrying on transient errors.
///
/// Each attempt is bounded by `timeout`; a request which still fails after
/// `attempts` attempts is reported as [`Error::BarrierTimeout`].
pub async fn call_with_retry<T>(
    transport: &T,
    target: WorkerId,
    request: &WorkerRequest,
    attempts: usize,
    timeout: Duration,
) -> Result<WorkerResponse>
where
    T: Transport + ?Sized,
{
    let name = request.name();
    let mut retry = RetryState::new(attempts);
    loop {
        let result =
            match pregel_runtime::time::timeout(timeout, transport.call(target, request.clone()))
                .await
            {
                Some(result) => result,
                None => Err(Error::DeadlineExceeded(format!("{name} after {timeout:?}"))),
            };
        let err = match result {
            Ok(resp) => return Ok(resp),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) if retry.is_exhausted() => {
                return Err(Error::BarrierTimeout {
                    worker: target,
                    request: name,
                    attempts: retry.attempts(),
                    cause: err.to_string(),
                });
            }
            Err(err) => err,
        };
        warn!(
            "request worker failed, retry later. worker={target}, request={name}, attempts={}, err={err}",
            retry.attempts()
        );
        retry.retry(err).await?;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pregel_api::JobRequest;

    use super::*;

    struct Echo {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl WorkerService for Echo {
        async fn handle(&self, request: WorkerRequest) -> Result<WorkerResponse> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst);
            if calls < self.fail_first {
                return Err(Error::Transport("connection reset".into()));
            }
            match request {
                WorkerRequest::Release(_) => Ok(WorkerResponse::Released),
                _ => Err(Error::InvalidArgument("unexpected request".into())),
            }
        }
    }

    fn release() -> WorkerRequest {
        WorkerRequest::Release(JobRequest { job: 1 })
    }

    #[pregel_macro::test]
    async fn call_registered_worker() {
        let transport = LocalTransport::default();
        transport.register(1, Arc::new(Echo { calls: AtomicUsize::new(0), fail_first: 0 }));
        let resp = transport.call(1, release()).await.unwrap();
        assert!(matches!(resp, WorkerResponse::Released));
        assert!(matches!(transport.call(2, release()).await, Err(Error::WorkerNotFound(2))));

        transport.deregister(1);
        assert!(matches!(transport.call(1, release()).await, Err(Error::WorkerNotFound(1))));
    }

    #[pregel_macro::test]
    async fn retry_transient_errors() {
        let transport = LocalTransport::default();
        transport.register(1, Arc::new(Echo { calls: AtomicUsize::new(0), fail_first: 2 }));
        let timeout = Duration::from_secs(1);
        let resp = call_with_retry(&transport, 1, &release(), 3, timeout).await.unwrap();
        assert!(matches!(resp, WorkerResponse::Released));
    }

    #[pregel_macro::test]
    async fn exhausted_retry_is_barrier_timeout() {
        let transport = LocalTransport::default();
        transport.register(1, Arc::new(Echo { calls: AtomicUsize::new(0), fail_first: 10 }));
        let timeout = Duration::from_secs(1);
        let err = call_with_retry(&transport, 1, &release(), 2, timeout).await.unwrap_err();
        assert!(
            matches!(err, Error::BarrierTimeout { worker: 1, request: "release", attempts: 2, .. }),
            "{err:?}"
        );
    }

    #[pregel_macro::test]
    async fn permanent_errors_are_not_retried() {
        let transport = LocalTransport::default();
        let echo = Arc::new(Echo { calls: AtomicUsize::new(0), fail_first: 0 });
        transport.register(1, echo.clone());
        let request = WorkerRequest::CollectResults(JobRequest { job: 1 });
        let err = call_with_retry(&transport, 1, &request, 5, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    }
}
