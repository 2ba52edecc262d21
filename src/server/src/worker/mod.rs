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

mod compute;
mod load;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, info};
use pregel_api::{
    DeliverReport, Document, JobId, LoadReport, LoadRequest, MessageBatch, MessageEnvelope,
    PregelShard, ResultsReport, ShardMap, StoreReport, StoreRequest, SuperstepReport,
    SuperstepRequest, VertexResult, WorkerId, WorkerRequest, WorkerResponse,
};
use serde_json::Value;
use tokio::sync::Semaphore;

use self::compute::{compute_partition, SharedStep};
use crate::algorithm::{Aggregate, Algorithm};
use crate::channel::{MessageBuffer, MessageChannel};
use crate::partition::Partition;
use crate::store::GraphStore;
use crate::transport::{call_with_retry, Transport, WorkerService};
use crate::{Error, PregelConfig, Result};

pub(crate) type PartitionOf<A> =
    Partition<<A as Algorithm>::VertexProperties, <A as Algorithm>::EdgeProperties>;

/// Serves the shards of one job assigned to this worker.
pub struct Worker<A: Algorithm> {
    id: WorkerId,
    job: JobId,
    algorithm: Arc<A>,
    store: Arc<dyn GraphStore>,
    transport: Arc<dyn Transport>,
    cfg: PregelConfig,
    parallelism: Arc<Semaphore>,
    state: futures::lock::Mutex<WorkerState<A>>,
    /// Separated from the state, so deliveries are accepted while a superstep
    /// is computing.
    channel: Mutex<Option<MessageChannel<A::Message>>>,
}

struct WorkerState<A: Algorithm> {
    shard_map: Option<Arc<ShardMap>>,
    partitions: BTreeMap<PregelShard, PartitionOf<A>>,
    loaded: Option<LoadReport>,
    computed: Option<SuperstepReport>,
    stored: Option<StoreReport>,
    released: bool,
}

impl<A: Algorithm> Worker<A> {
    pub fn new(
        id: WorkerId,
        job: JobId,
        algorithm: Arc<A>,
        store: Arc<dyn GraphStore>,
        transport: Arc<dyn Transport>,
        cfg: PregelConfig,
    ) -> Self {
        let parallelism = Arc::new(Semaphore::new(cfg.parallelism.max(1)));
        Worker {
            id,
            job,
            algorithm,
            store,
            transport,
            cfg,
            parallelism,
            state: futures::lock::Mutex::new(WorkerState {
                shard_map: None,
                partitions: BTreeMap::default(),
                loaded: None,
                computed: None,
                stored: None,
                released: false,
            }),
            channel: Mutex::new(None),
        }
    }

    #[inline]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    async fn load(&self, req: LoadRequest) -> Result<LoadReport> {
        let mut state = self.state.lock().await;
        state.check_released(self.job)?;
        if let Some(report) = &state.loaded {
            return Ok(report.clone());
        }

        req.graph.validate()?;
        let shard_map = Arc::new(req.shard_map);
        let shards = shard_map.shards_of(self.id);
        let algorithm = self.algorithm.clone();
        let store = self.store.clone();
        let graph = req.graph;
        let map = shard_map.clone();
        let worker = self.id;
        let loaded = pregel_runtime::spawn_blocking(move || {
            load::load_shards(&*algorithm, &*store, &graph, &map, worker)
        })
        .await??;

        *self.channel.lock().expect("poisoned") =
            Some(MessageChannel::new(self.algorithm.combiner(), shards.iter().copied()));

        info!(
            "worker load shards. job={}, worker={}, shards={}, vertices={}, edges={}, load_errors={}",
            self.job,
            self.id,
            shards.len(),
            loaded.vertices,
            loaded.edges,
            loaded.load_errors
        );
        let report = LoadReport {
            worker: self.id,
            shards,
            vertices: loaded.vertices,
            edges: loaded.edges,
            load_errors: loaded.load_errors,
        };
        state.shard_map = Some(shard_map);
        state.partitions = loaded.partitions;
        state.loaded = Some(report.clone());
        Ok(report)
    }

    async fn superstep(&self, req: SuperstepRequest) -> Result<SuperstepReport> {
        let mut state = self.state.lock().await;
        state.check_released(self.job)?;
        let Some(shard_map) = state.shard_map.clone() else {
            return Err(Error::InvalidArgument(format!(
                "superstep {} before the shards are loaded",
                req.superstep
            )));
        };
        if let Some(report) = state.computed.as_ref().filter(|r| r.superstep == req.superstep) {
            return Ok(report.clone());
        }
        let expected = state.computed.as_ref().map(|r| r.superstep + 1).unwrap_or_default();
        if req.superstep != expected {
            return Err(Error::InvalidArgument(format!(
                "superstep {}, but {expected} is expected",
                req.superstep
            )));
        }

        let superstep = req.superstep;
        let step = Arc::new(SharedStep::<A> {
            shard_map: shard_map.clone(),
            superstep,
            vertex_count: req.vertex_count,
            global: serde_json::from_value(req.global)?,
            aggregated: serde_json::from_value(req.aggregated)?,
        });
        let mut inboxes =
            self.channel().as_mut().map(|c| c.take(superstep)).unwrap_or_default();

        let partitions = std::mem::take(&mut state.partitions);
        let mut handles = Vec::with_capacity(partitions.len());
        for (shard, partition) in partitions {
            let permit =
                self.parallelism.clone().acquire_owned().await.map_err(|_| Error::Canceled)?;
            let algorithm = self.algorithm.clone();
            let step = step.clone();
            let inbox =
                inboxes.remove(&shard).unwrap_or_else(|| MessageBuffer::new(algorithm.combiner()));
            handles.push(pregel_runtime::spawn_blocking(move || {
                let _permit = permit;
                compute_partition(&*algorithm, &step, partition, inbox)
            }));
        }

        let mut report = SuperstepReport { worker: self.id, superstep, ..Default::default() };
        let mut contribution = A::Aggregators::default();
        let mut outboxes = Vec::with_capacity(handles.len());
        for handle in handles {
            let (partition, output, stats) = handle.await??;
            report.vertices_computed += stats.computed;
            report.active_vertices += stats.active;
            report.messages_received += stats.received;
            report.routing_errors += stats.undeliverable + output.routing_errors;
            report.messages_sent += output.messages_sent;
            contribution.merge(&output.contribution);
            outboxes.push(output.outbox);
            state.partitions.insert(partition.shard(), partition);
        }

        report.routing_errors += self.route(&shard_map, superstep + 1, outboxes).await?;
        report.aggregators = serde_json::to_value(&contribution)?;
        debug!(
            "worker finish superstep. job={}, worker={}, superstep={superstep}, computed={}, active={}, sent={}",
            self.job, self.id, report.vertices_computed, report.active_vertices, report.messages_sent
        );
        state.computed = Some(report.clone());
        Ok(report)
    }

    /// File the outgoing messages for `superstep`, returns the number of
    /// messages which could not be routed.
    async fn route(
        &self,
        shard_map: &ShardMap,
        superstep: u64,
        outboxes: Vec<MessageBuffer<A::Message>>,
    ) -> Result<u64> {
        let mut routing_errors = 0;
        let mut remote: HashMap<WorkerId, Vec<MessageEnvelope>> = HashMap::default();
        for outbox in outboxes {
            for (shard, buffer) in outbox.split_by_shard() {
                match shard_map.worker_of(shard) {
                    Some(worker) if worker == self.id => {
                        routing_errors += match self.channel().as_mut() {
                            Some(channel) => channel.deliver_local(superstep, buffer),
                            None => return Err(Error::JobNotFound(self.job)),
                        };
                    }
                    Some(worker) => {
                        let envelopes = remote.entry(worker).or_default();
                        for (target, message) in buffer.into_messages() {
                            let payload = serde_json::to_value(&message)?;
                            envelopes.push(MessageEnvelope { target, payload });
                        }
                    }
                    None => routing_errors += buffer.len() as u64,
                }
            }
        }

        let mut handles = Vec::with_capacity(remote.len());
        for (target, envelopes) in remote {
            let batch_size = self.cfg.message_batch_size.max(1);
            let mut batches = Vec::new();
            let mut envelopes = envelopes.into_iter();
            loop {
                let messages = envelopes.by_ref().take(batch_size).collect::<Vec<_>>();
                if messages.is_empty() {
                    break;
                }
                let sequence = batches.len() as u64;
                batches.push(WorkerRequest::Deliver(MessageBatch {
                    job: self.job,
                    superstep,
                    sender: self.id,
                    sequence,
                    messages,
                }));
            }

            let transport = self.transport.clone();
            let attempts = self.cfg.barrier_retry_attempts;
            let timeout = self.cfg.barrier_timeout();
            handles.push(pregel_runtime::spawn(async move {
                let mut routing_errors = 0;
                for request in batches {
                    match call_with_retry(&*transport, target, &request, attempts, timeout).await? {
                        WorkerResponse::Delivered(report) => routing_errors += report.routing_errors,
                        resp => return Err(unexpected_response(target, &request, &resp)),
                    }
                }
                Ok::<_, Error>(routing_errors)
            }));
        }
        for handle in handles {
            routing_errors += handle.await??;
        }
        Ok(routing_errors)
    }

    fn deliver(&self, batch: MessageBatch) -> Result<DeliverReport> {
        let mut messages = Vec::with_capacity(batch.messages.len());
        for envelope in batch.messages {
            let message: A::Message = serde_json::from_value(envelope.payload)?;
            messages.push((envelope.target, message));
        }
        let mut channel = self.channel();
        let Some(channel) = channel.as_mut() else {
            return Err(Error::JobNotFound(self.job));
        };
        Ok(channel.deliver_batch(batch.superstep, batch.sender, batch.sequence, messages))
    }

    async fn store(&self, req: StoreRequest) -> Result<StoreReport> {
        let mut state = self.state.lock().await;
        state.check_released(self.job)?;
        if let Some(report) = &state.stored {
            return Ok(report.clone());
        }

        let partitions = std::mem::take(&mut state.partitions);
        let algorithm = self.algorithm.clone();
        let store = self.store.clone();
        let (partitions, stored) = pregel_runtime::spawn_blocking(move || {
            let stored = write_results(&*algorithm, &*store, &req.result_field, &partitions);
            (partitions, stored)
        })
        .await?;
        state.partitions = partitions;
        let report = StoreReport { worker: self.id, stored: stored? };
        info!("worker store results. job={}, worker={}, stored={}", self.job, self.id, report.stored);
        state.stored = Some(report.clone());
        Ok(report)
    }

    async fn collect_results(&self) -> Result<ResultsReport> {
        let state = self.state.lock().await;
        state.check_released(self.job)?;
        let Some(shard_map) = state.shard_map.as_ref() else {
            return Ok(ResultsReport { worker: self.id, vertices: Vec::default() });
        };
        let mut vertices = Vec::new();
        for partition in state.partitions.values() {
            for vertex in partition.vertices() {
                let mut document = Document::new();
                self.algorithm.write_vertex_document(&vertex.properties, &mut document)?;
                vertices.push(VertexResult {
                    id: vertex.id.clone(),
                    handle: shard_map.handle_of(&vertex.id).unwrap_or_default(),
                    result: Value::Object(document),
                });
            }
        }
        vertices.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        Ok(ResultsReport { worker: self.id, vertices })
    }

    async fn release(&self) {
        let mut state = self.state.lock().await;
        if !state.released {
            debug!("worker release job. job={}, worker={}", self.job, self.id);
        }
        state.released = true;
        state.partitions.clear();
        state.shard_map = None;
        state.loaded = None;
        state.computed = None;
        state.stored = None;
        self.channel().take();
    }

    fn channel(&self) -> std::sync::MutexGuard<'_, Option<MessageChannel<A::Message>>> {
        self.channel.lock().expect("poisoned")
    }
}

impl<A: Algorithm> WorkerState<A> {
    fn check_released(&self, job: JobId) -> Result<()> {
        if self.released {
            return Err(Error::JobNotFound(job));
        }
        Ok(())
    }
}

#[async_trait]
impl<A: Algorithm> WorkerService for Worker<A> {
    async fn handle(&self, request: WorkerRequest) -> Result<WorkerResponse> {
        if request.job() != self.job {
            return Err(Error::JobNotFound(request.job()));
        }
        match request {
            WorkerRequest::Load(req) => self.load(req).await.map(WorkerResponse::Loaded),
            WorkerRequest::StartSuperstep(req) => {
                self.superstep(req).await.map(WorkerResponse::Superstep)
            }
            WorkerRequest::Deliver(batch) => self.deliver(batch).map(WorkerResponse::Delivered),
            WorkerRequest::Store(req) => self.store(req).await.map(WorkerResponse::Stored),
            WorkerRequest::CollectResults(_) => {
                self.collect_results().await.map(WorkerResponse::Results)
            }
            WorkerRequest::Release(_) => {
                self.release().await;
                Ok(WorkerResponse::Released)
            }
        }
    }
}

fn write_results<A: Algorithm>(
    algorithm: &A,
    store: &dyn GraphStore,
    result_field: &str,
    partitions: &BTreeMap<PregelShard, PartitionOf<A>>,
) -> Result<u64> {
    let mut stored = 0;
    for partition in partitions.values() {
        for vertex in partition.vertices() {
            let mut document = Document::new();
            algorithm.write_vertex_document(&vertex.properties, &mut document)?;
            let mut patch = Document::new();
            patch.insert(result_field.to_owned(), Value::Object(document));
            store.update(partition.collection(), vertex.document_key(), patch)?;
            stored += 1;
        }
    }
    Ok(stored)
}

pub(crate) fn unexpected_response(
    worker: WorkerId,
    request: &WorkerRequest,
    response: &WorkerResponse,
) -> Error {
    Error::Transport(format!(
        "worker {worker} answers {} with {response:?}",
        request.name()
    ))
}
