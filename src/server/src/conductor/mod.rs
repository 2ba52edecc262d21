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

mod handle;

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use pregel_api::{
    GraphByCollections, JobId, JobRequest, LoadRequest, ShardMap, StoreRequest, SuperstepRequest,
    VertexResult, WorkerId, WorkerRequest, WorkerResponse,
};
use serde::{Deserialize, Serialize};

pub use self::handle::{ConductorState, JobHandle};
use crate::algorithm::{Aggregate, Algorithm, Decision};
use crate::metrics::*;
use crate::transport::{call_with_retry, Transport};
use crate::worker::unexpected_response;
use crate::{Error, PregelConfig, Result};

/// Why the superstep loop stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// No vertex is active and no message is in flight.
    #[default]
    Converged,
    /// The algorithm asked to stop.
    Halted,
    MaxSuperstep,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub job: JobId,
    pub algorithm: String,
    pub supersteps: u64,
    pub vertices: u64,
    pub edges: u64,
    pub messages_sent: u64,
    pub vertices_computed: u64,
    pub load_errors: u64,
    pub routing_errors: u64,
    pub stored: u64,
    pub termination: Termination,
    pub elapsed: Duration,
}

/// Drives the supersteps of a job over its workers.
pub struct Conductor<A: Algorithm> {
    job: JobId,
    algorithm: Arc<A>,
    graph: GraphByCollections,
    workers: Vec<WorkerId>,
    transport: Arc<dyn Transport>,
    cfg: PregelConfig,
    metrics: Arc<dyn MetricsSink>,
    handle: JobHandle,
}

/// Merge the contributions of workers, in the given order.
pub fn merge_contributions<'a, T, I>(contributions: I) -> T
where
    T: Aggregate,
    I: IntoIterator<Item = &'a T>,
{
    contributions.into_iter().fold(T::default(), |mut acc, value| {
        acc.merge(value);
        acc
    })
}

impl<A: Algorithm> Conductor<A> {
    pub fn new(
        job: JobId,
        algorithm: Arc<A>,
        graph: GraphByCollections,
        mut workers: Vec<WorkerId>,
        transport: Arc<dyn Transport>,
        cfg: PregelConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        workers.sort_unstable();
        workers.dedup();
        Conductor {
            job,
            algorithm,
            graph,
            workers,
            transport,
            cfg,
            metrics,
            handle: JobHandle::new(job),
        }
    }

    #[inline]
    pub fn handle(&self) -> JobHandle {
        self.handle.clone()
    }

    /// Run the job to its end, the workers are released if it fails.
    pub async fn run(&self) -> Result<JobReport> {
        let result = self.execute().await;
        match &result {
            Ok(report) => {
                info!(
                    "pregel job is done. job={}, algorithm={}, supersteps={}, termination={:?}, elapsed={:?}",
                    self.job,
                    report.algorithm,
                    report.supersteps,
                    report.termination,
                    report.elapsed
                );
                self.handle.set_report(report.clone());
                self.handle.set_state(ConductorState::Done);
            }
            Err(Error::Canceled) => {
                info!("pregel job is canceled. job={}", self.job);
                self.release().await;
                self.handle.set_state(ConductorState::Canceled);
            }
            Err(err) => {
                error!("pregel job is failed. job={}, err={err}", self.job);
                self.release().await;
                self.handle.set_state(ConductorState::Failed(err.to_string()));
            }
        }
        self.metrics.set_gauge(ACTIVE_WORKERS, 0);
        self.metrics.set_gauge(MESSAGES_IN_FLIGHT, 0);
        result
    }

    async fn execute(&self) -> Result<JobReport> {
        let start = Instant::now();
        self.handle.set_state(ConductorState::Initializing);
        self.cfg.validate()?;
        self.graph.validate()?;
        let shard_map =
            ShardMap::new(&self.graph, self.cfg.shards_per_collection, self.workers.clone())?;
        let mut global = self.algorithm.conductor_setup()?;
        info!(
            "start pregel job. job={}, algorithm={}, workers={}, shards={}",
            self.job,
            self.algorithm.name(),
            self.workers.len(),
            shard_map.num_shards()
        );
        self.metrics.set_gauge(ACTIVE_WORKERS, self.workers.len() as i64);

        let mut report = JobReport {
            job: self.job,
            algorithm: self.algorithm.name().to_owned(),
            ..Default::default()
        };
        self.load(shard_map, &mut report).await?;

        let mut aggregated = A::Aggregators::default();
        let mut superstep = 0;
        loop {
            self.check_canceled()?;
            self.handle.set_state(ConductorState::Running(superstep));
            let timer = PREGEL_SUPERSTEP_DURATION_SECONDS.start_timer();
            let request = WorkerRequest::StartSuperstep(SuperstepRequest {
                job: self.job,
                superstep,
                vertex_count: report.vertices,
                global: serde_json::to_value(&global)?,
                aggregated: serde_json::to_value(&aggregated)?,
            });
            let responses = self.broadcast(&request).await?;

            self.handle.set_state(ConductorState::Aggregating(superstep));
            let (mut active, mut sent, mut computed, mut routing_errors) = (0, 0, 0, 0);
            let mut contributions = Vec::with_capacity(responses.len());
            for (worker, resp) in responses {
                let WorkerResponse::Superstep(step) = resp else {
                    return Err(unexpected_response(worker, &request, &resp));
                };
                active += step.active_vertices;
                sent += step.messages_sent;
                computed += step.vertices_computed;
                routing_errors += step.routing_errors;
                let contribution: A::Aggregators = serde_json::from_value(step.aggregators)?;
                contributions.push((worker, contribution));
            }
            contributions.sort_by_key(|(worker, _)| *worker);
            let merged = merge_contributions(contributions.iter().map(|(_, c)| c));
            timer.observe_duration();

            self.metrics.increment(SUPERSTEPS_TOTAL, 1);
            self.metrics.increment(VERTEX_COMPUTE_TOTAL, computed);
            self.metrics.increment(MESSAGES_ROUTED_TOTAL, sent);
            self.metrics.increment(ROUTING_ERRORS_TOTAL, routing_errors);
            self.metrics.set_gauge(MESSAGES_IN_FLIGHT, sent as i64);
            report.supersteps = superstep + 1;
            report.messages_sent += sent;
            report.vertices_computed += computed;
            report.routing_errors += routing_errors;
            if report.routing_errors > self.cfg.max_routing_errors {
                return Err(Error::Routing(format!(
                    "{} messages are undeliverable, {} tolerated",
                    report.routing_errors, self.cfg.max_routing_errors
                )));
            }

            let decision = self.algorithm.post_superstep(superstep, &merged, &mut global);
            aggregated = merged;
            debug!(
                "superstep is finished. job={}, superstep={superstep}, active={active}, sent={sent}, decision={decision:?}",
                self.job
            );
            if active == 0 && sent == 0 {
                report.termination = Termination::Converged;
                break;
            }
            if decision == Decision::Halt {
                report.termination = Termination::Halted;
                break;
            }
            if superstep + 1 >= self.cfg.max_global_superstep {
                warn!(
                    "pregel job reaches the max superstep. job={}, max_global_superstep={}",
                    self.job, self.cfg.max_global_superstep
                );
                report.termination = Termination::MaxSuperstep;
                break;
            }
            superstep += 1;
        }

        self.check_canceled()?;
        self.handle.set_state(ConductorState::Finalizing);
        if self.cfg.store {
            let request = WorkerRequest::Store(StoreRequest {
                job: self.job,
                result_field: self.cfg.result_field.clone(),
            });
            for (worker, resp) in self.broadcast(&request).await? {
                let WorkerResponse::Stored(stored) = resp else {
                    return Err(unexpected_response(worker, &request, &resp));
                };
                report.stored += stored.stored;
            }
        }
        report.elapsed = start.elapsed();
        Ok(report)
    }

    async fn load(&self, shard_map: ShardMap, report: &mut JobReport) -> Result<()> {
        self.check_canceled()?;
        self.handle.set_state(ConductorState::Loading);
        let request = WorkerRequest::Load(LoadRequest {
            job: self.job,
            graph: self.graph.clone(),
            shard_map,
        });
        for (worker, resp) in self.broadcast(&request).await? {
            let WorkerResponse::Loaded(loaded) = resp else {
                return Err(unexpected_response(worker, &request, &resp));
            };
            report.vertices += loaded.vertices;
            report.edges += loaded.edges;
            report.load_errors += loaded.load_errors;
        }
        self.metrics.increment(LOAD_ERRORS_TOTAL, report.load_errors);
        if report.load_errors > self.cfg.max_load_errors {
            return Err(Error::Load(format!(
                "{} documents failed to load, {} tolerated",
                report.load_errors, self.cfg.max_load_errors
            )));
        }
        info!(
            "pregel job is loaded. job={}, vertices={}, edges={}, load_errors={}",
            self.job, report.vertices, report.edges, report.load_errors
        );
        Ok(())
    }

    /// Gather the results of all vertices, ordered by id.
    pub async fn collect_results(&self) -> Result<Vec<VertexResult>> {
        let request = WorkerRequest::CollectResults(JobRequest { job: self.job });
        let mut vertices = Vec::new();
        for (worker, resp) in self.broadcast(&request).await? {
            let WorkerResponse::Results(results) = resp else {
                return Err(unexpected_response(worker, &request, &resp));
            };
            vertices.extend(results.vertices);
        }
        vertices.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        Ok(vertices)
    }

    /// Ask every worker to drop the state of this job, errors are ignored.
    pub async fn release(&self) {
        let request = WorkerRequest::Release(JobRequest { job: self.job });
        for worker in &self.workers {
            let call = self.transport.call(*worker, request.clone());
            match pregel_runtime::time::timeout(self.cfg.barrier_timeout(), call).await {
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!("release worker. job={}, worker={worker}, err={err}", self.job);
                }
                None => warn!("release worker timeout. job={}, worker={worker}", self.job),
            }
        }
    }

    fn check_canceled(&self) -> Result<()> {
        if self.handle.is_canceled() {
            return Err(Error::Canceled);
        }
        Ok(())
    }

    /// Send `request` to all workers concurrently, the responses are ordered
    /// by worker id.
    async fn broadcast(&self, request: &WorkerRequest) -> Result<Vec<(WorkerId, WorkerResponse)>> {
        let attempts = self.cfg.barrier_retry_attempts;
        let timeout = self.cfg.barrier_timeout();
        let mut handles = Vec::with_capacity(self.workers.len());
        for worker in self.workers.iter().copied() {
            let transport = self.transport.clone();
            let request = request.clone();
            handles.push(pregel_runtime::spawn(async move {
                call_with_retry(&*transport, worker, &request, attempts, timeout).await
            }));
        }

        let mut responses = Vec::with_capacity(handles.len());
        for (worker, handle) in self.workers.iter().copied().zip(handles) {
            responses.push((worker, handle.await??));
        }
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{Max, Sum};

    #[test]
    fn merge_in_order() {
        let merged: Sum<u64> = merge_contributions(&[Sum(1), Sum(2), Sum(3)]);
        assert_eq!(merged, Sum(6));
        let merged: Max<f64> = merge_contributions(&[]);
        assert_eq!(merged, Max(None));
    }
}
