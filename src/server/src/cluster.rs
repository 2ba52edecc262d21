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

use std::sync::Arc;

use pregel_api::{GraphByCollections, JobId, VertexResult, WorkerId};

use crate::algorithm::Algorithm;
use crate::conductor::{Conductor, JobHandle, JobReport};
use crate::metrics::MetricsSink;
use crate::store::GraphStore;
use crate::transport::{LocalTransport, Transport};
use crate::worker::Worker;
use crate::{PregelConfig, Result};

/// A job whose conductor and workers live in this process.
pub struct LocalJob<A: Algorithm> {
    conductor: Conductor<A>,
    transport: LocalTransport,
}

impl<A: Algorithm> LocalJob<A> {
    pub fn new(
        job: JobId,
        algorithm: A,
        graph: GraphByCollections,
        store: Arc<dyn GraphStore>,
        cfg: PregelConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let wrap = |local: LocalTransport| -> Arc<dyn Transport> { Arc::new(local) };
        Self::with_transport(job, algorithm, graph, store, cfg, metrics, wrap)
    }

    /// Like [`LocalJob::new`], all requests of the conductor and the workers
    /// go through the transport returned by `wrap`.
    pub fn with_transport<F>(
        job: JobId,
        algorithm: A,
        graph: GraphByCollections,
        store: Arc<dyn GraphStore>,
        cfg: PregelConfig,
        metrics: Arc<dyn MetricsSink>,
        wrap: F,
    ) -> Self
    where
        F: FnOnce(LocalTransport) -> Arc<dyn Transport>,
    {
        let local = LocalTransport::default();
        let transport = wrap(local.clone());
        let algorithm = Arc::new(algorithm);
        let workers = (1..=cfg.num_workers.max(1) as WorkerId).collect::<Vec<_>>();
        for id in &workers {
            let worker = Worker::new(
                *id,
                job,
                algorithm.clone(),
                store.clone(),
                transport.clone(),
                cfg.clone(),
            );
            local.register(*id, Arc::new(worker));
        }
        let conductor = Conductor::new(job, algorithm, graph, workers, transport, cfg, metrics);
        LocalJob { conductor, transport: local }
    }

    #[inline]
    pub fn handle(&self) -> JobHandle {
        self.conductor.handle()
    }

    pub async fn run(&self) -> Result<JobReport> {
        self.conductor.run().await
    }

    /// The results of all vertices ordered by id, available once the job is
    /// done.
    pub async fn results(&self) -> Result<Vec<VertexResult>> {
        self.conductor.collect_results().await
    }

    /// Stop serving a worker, as if its process had died.
    pub fn kill_worker(&self, worker: WorkerId) {
        self.transport.deregister(worker);
    }
}

impl<A: Algorithm> Drop for LocalJob<A> {
    fn drop(&mut self) {
        // Workers hold the transport which holds the workers.
        self.transport.clear();
    }
}
