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
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::info;
use pregel_api::{GraphByCollections, JobId, VertexResult};
use pregel_runtime::{Executor, JoinHandle};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::algorithm::{Algorithm, PageRank, Sssp, Wcc};
use crate::cluster::LocalJob;
use crate::conductor::{ConductorState, JobHandle, JobReport};
use crate::metrics::{MetricsSink, ACTIVE_JOBS, JOBS_TOTAL};
use crate::store::GraphStore;
use crate::{Error, PregelConfig, Result};

/// The algorithms a job can be started with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmKind {
    PageRank,
    Sssp,
    Wcc,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 3] =
        [AlgorithmKind::PageRank, AlgorithmKind::Sssp, AlgorithmKind::Wcc];

    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::PageRank => "pagerank",
            AlgorithmKind::Sssp => "sssp",
            AlgorithmKind::Wcc => "wcc",
        }
    }
}

impl FromStr for AlgorithmKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.to_ascii_lowercase();
        AlgorithmKind::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown algorithm {s}")))
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[async_trait]
trait RunningJob: Send + Sync + 'static {
    fn handle(&self) -> JobHandle;

    async fn run(&self) -> Result<JobReport>;

    async fn results(&self) -> Result<Vec<VertexResult>>;
}

#[async_trait]
impl<A: Algorithm> RunningJob for LocalJob<A> {
    fn handle(&self) -> JobHandle {
        LocalJob::handle(self)
    }

    async fn run(&self) -> Result<JobReport> {
        LocalJob::run(self).await
    }

    async fn results(&self) -> Result<Vec<VertexResult>> {
        LocalJob::results(self).await
    }
}

struct JobEntry {
    job: Arc<dyn RunningJob>,
    /// Dropping it aborts the job.
    task: Option<JoinHandle<Result<JobReport>>>,
}

/// Decrements the active jobs when the task of a job ends, even if it is
/// aborted.
struct ActiveJobGuard {
    active: Arc<AtomicI64>,
    metrics: Arc<dyn MetricsSink>,
}

/// Starts jobs by algorithm name and keeps them until they are dropped.
pub struct PregelService {
    executor: Executor,
    store: Arc<dyn GraphStore>,
    cfg: PregelConfig,
    metrics: Arc<dyn MetricsSink>,
    next_job: AtomicU64,
    active: Arc<AtomicI64>,
    jobs: Mutex<HashMap<JobId, JobEntry>>,
}

impl PregelService {
    pub fn new(
        executor: Executor,
        store: Arc<dyn GraphStore>,
        cfg: PregelConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        PregelService {
            executor,
            store,
            cfg,
            metrics,
            next_job: AtomicU64::new(1),
            active: Arc::default(),
            jobs: Mutex::default(),
        }
    }

    /// Start a job in the background, `params` are the algorithm settings.
    pub fn start(
        &self,
        kind: AlgorithmKind,
        params: &Value,
        graph: GraphByCollections,
    ) -> Result<JobId> {
        self.cfg.validate()?;
        graph.validate()?;
        let id = self.next_job.fetch_add(1, Ordering::Relaxed);
        let job = match kind {
            AlgorithmKind::PageRank => self.local_job(id, PageRank::from_params(params)?, graph),
            AlgorithmKind::Sssp => self.local_job(id, Sssp::from_params(params)?, graph),
            AlgorithmKind::Wcc => self.local_job(id, Wcc::from_params(params)?, graph),
        };

        self.metrics.increment(JOBS_TOTAL, 1);
        let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        self.metrics.set_gauge(ACTIVE_JOBS, active);
        let guard = ActiveJobGuard { active: self.active.clone(), metrics: self.metrics.clone() };
        let running = job.clone();
        let task = self.executor.spawn(async move {
            let _guard = guard;
            running.run().await
        });
        info!("pregel service start job. job={id}, algorithm={kind}");

        let mut jobs = self.jobs.lock().expect("poisoned");
        jobs.insert(id, JobEntry { job, task: Some(task) });
        Ok(id)
    }

    /// Start a job and wait for its report.
    pub async fn run(
        &self,
        kind: AlgorithmKind,
        params: &Value,
        graph: GraphByCollections,
    ) -> Result<JobReport> {
        let id = self.start(kind, params, graph)?;
        let task = {
            let mut jobs = self.jobs.lock().expect("poisoned");
            jobs.get_mut(&id).and_then(|entry| entry.task.take())
        };
        match task {
            Some(task) => task.await?,
            None => Err(Error::JobNotFound(id)),
        }
    }

    pub fn status(&self, id: JobId) -> Result<ConductorState> {
        Ok(self.job(id)?.handle().state())
    }

    /// Wait until the job is done, failed or canceled.
    pub async fn wait(&self, id: JobId) -> Result<ConductorState> {
        let handle = self.job(id)?.handle();
        Ok(handle.wait().await)
    }

    pub fn cancel(&self, id: JobId) -> Result<()> {
        self.job(id)?.handle().cancel();
        Ok(())
    }

    pub fn report(&self, id: JobId) -> Result<Option<JobReport>> {
        Ok(self.job(id)?.handle().report())
    }

    pub async fn results(&self, id: JobId) -> Result<Vec<VertexResult>> {
        let job = self.job(id)?;
        match job.handle().state() {
            ConductorState::Done => job.results().await,
            state => Err(Error::InvalidArgument(format!("job {id} is {state:?}, not done"))),
        }
    }

    /// Forget a job, a running one is canceled.
    pub fn drop_job(&self, id: JobId) -> Result<()> {
        let entry = {
            let mut jobs = self.jobs.lock().expect("poisoned");
            jobs.remove(&id).ok_or(Error::JobNotFound(id))?
        };
        let handle = entry.job.handle();
        handle.cancel();
        drop(entry);
        if !handle.state().is_terminal() {
            handle.set_state(ConductorState::Canceled);
        }
        info!("pregel service drop job. job={id}");
        Ok(())
    }

    /// The ids and states of all known jobs, ordered by id.
    pub fn jobs(&self) -> Vec<(JobId, ConductorState)> {
        let jobs = self.jobs.lock().expect("poisoned");
        let mut states =
            jobs.iter().map(|(id, entry)| (*id, entry.job.handle().state())).collect::<Vec<_>>();
        states.sort_unstable_by_key(|(id, _)| *id);
        states
    }

    fn job(&self, id: JobId) -> Result<Arc<dyn RunningJob>> {
        let jobs = self.jobs.lock().expect("poisoned");
        jobs.get(&id).map(|entry| entry.job.clone()).ok_or(Error::JobNotFound(id))
    }

    fn local_job<A: Algorithm>(
        &self,
        id: JobId,
        algorithm: A,
        graph: GraphByCollections,
    ) -> Arc<dyn RunningJob> {
        Arc::new(LocalJob::new(
            id,
            algorithm,
            graph,
            self.store.clone(),
            self.cfg.clone(),
            self.metrics.clone(),
        ))
    }
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        let active = self.active.fetch_sub(1, Ordering::AcqRel) - 1;
        self.metrics.set_gauge(ACTIVE_JOBS, active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_algorithm_kind() {
        assert_eq!("pagerank".parse::<AlgorithmKind>().unwrap(), AlgorithmKind::PageRank);
        assert_eq!("WCC".parse::<AlgorithmKind>().unwrap(), AlgorithmKind::Wcc);
        assert!(matches!("louvain".parse::<AlgorithmKind>(), Err(Error::InvalidArgument(_))));
        for kind in AlgorithmKind::ALL {
            assert_eq!(kind.to_string().parse::<AlgorithmKind>().unwrap(), kind);
        }
    }
}
