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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::info;
use pregel_api::JobId;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::JobReport;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum ConductorState {
    Initializing,
    Loading,
    Running(u64),
    Aggregating(u64),
    Finalizing,
    Done,
    Failed(String),
    Canceled,
}

impl ConductorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConductorState::Done | ConductorState::Failed(_) | ConductorState::Canceled)
    }
}

/// Observes and cancels a running job.
#[derive(Clone)]
pub struct JobHandle {
    inner: Arc<JobShared>,
}

struct JobShared {
    job: JobId,
    state: watch::Sender<ConductorState>,
    canceled: AtomicBool,
    report: Mutex<Option<JobReport>>,
}

impl JobHandle {
    pub fn new(job: JobId) -> Self {
        let (state, _) = watch::channel(ConductorState::Initializing);
        JobHandle {
            inner: Arc::new(JobShared {
                job,
                state,
                canceled: AtomicBool::new(false),
                report: Mutex::new(None),
            }),
        }
    }

    #[inline]
    pub fn job(&self) -> JobId {
        self.inner.job
    }

    pub fn state(&self) -> ConductorState {
        self.inner.state.borrow().clone()
    }

    /// Ask the job to stop, it is observed at the next barrier.
    pub fn cancel(&self) {
        if !self.inner.canceled.swap(true, Ordering::AcqRel) {
            info!("cancel pregel job. job={}", self.inner.job);
        }
    }

    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::Acquire)
    }

    /// The report of a job which is done.
    pub fn report(&self) -> Option<JobReport> {
        self.inner.report.lock().expect("poisoned").clone()
    }

    /// Wait until the job reaches a terminal state.
    pub async fn wait(&self) -> ConductorState {
        let mut receiver = self.inner.state.subscribe();
        loop {
            let state = receiver.borrow_and_update().clone();
            if state.is_terminal() {
                return state;
            }
            if receiver.changed().await.is_err() {
                return self.state();
            }
        }
    }

    pub(crate) fn set_state(&self, state: ConductorState) {
        self.inner.state.send_replace(state);
    }

    pub(crate) fn set_report(&self, report: JobReport) {
        *self.inner.report.lock().expect("poisoned") = Some(report);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[pregel_macro::test]
    async fn wait_terminal_state() {
        let handle = JobHandle::new(1);
        assert_eq!(handle.state(), ConductorState::Initializing);
        let cloned = handle.clone();
        let waiter = pregel_runtime::spawn(async move { cloned.wait().await });
        handle.set_state(ConductorState::Running(0));
        pregel_runtime::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        handle.cancel();
        assert!(handle.is_canceled());
        handle.set_state(ConductorState::Canceled);
        assert_eq!(waiter.await.unwrap(), ConductorState::Canceled);
    }

    #[test]
    fn state_format() {
        let value = serde_json::to_value(ConductorState::Running(3)).unwrap();
        assert_eq!(value, serde_json::json!({ "state": "running", "detail": 3 }));
        assert!(ConductorState::Failed("x".into()).is_terminal());
        assert!(!ConductorState::Finalizing.is_terminal());
    }
}
