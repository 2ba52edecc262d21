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

//! Requests and responses exchanged between the conductor and workers, and
//! between workers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{GraphByCollections, JobId, PregelId, PregelShard, ShardMap, WorkerId};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    Load(LoadRequest),
    StartSuperstep(SuperstepRequest),
    Deliver(MessageBatch),
    Store(StoreRequest),
    CollectResults(JobRequest),
    Release(JobRequest),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerResponse {
    Loaded(LoadReport),
    Superstep(SuperstepReport),
    Delivered(DeliverReport),
    Stored(StoreReport),
    Results(ResultsReport),
    Released,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobRequest {
    pub job: JobId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoadRequest {
    pub job: JobId,
    pub graph: GraphByCollections,
    pub shard_map: ShardMap,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub worker: WorkerId,
    pub shards: Vec<PregelShard>,
    pub vertices: u64,
    pub edges: u64,
    /// Documents which could not be read and were skipped.
    pub load_errors: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuperstepRequest {
    pub job: JobId,
    pub superstep: u64,
    /// The total number of vertices of the job.
    pub vertex_count: u64,
    /// The algorithm global state, as set by the conductor.
    pub global: Value,
    /// The aggregators merged from the previous superstep.
    pub aggregated: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SuperstepReport {
    pub worker: WorkerId,
    pub superstep: u64,
    /// Vertices which did not vote to halt.
    pub active_vertices: u64,
    pub vertices_computed: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub routing_errors: u64,
    /// The aggregator contribution of this worker.
    pub aggregators: Value,
}

/// Messages computed in `superstep - 1` and addressed to shards of one worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageBatch {
    pub job: JobId,
    /// The superstep in which the messages become visible.
    pub superstep: u64,
    pub sender: WorkerId,
    /// Unique per `(superstep, sender)`, used to drop duplicated deliveries.
    pub sequence: u64,
    pub messages: Vec<MessageEnvelope>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub target: PregelId,
    pub payload: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverReport {
    pub accepted: u64,
    pub routing_errors: u64,
    /// The batch was delivered before and is ignored.
    pub duplicated: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreRequest {
    pub job: JobId,
    pub result_field: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReport {
    pub worker: WorkerId,
    pub stored: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VertexResult {
    pub id: PregelId,
    /// The `collection/key` handle of the vertex.
    pub handle: String,
    pub result: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsReport {
    pub worker: WorkerId,
    pub vertices: Vec<VertexResult>,
}

impl WorkerRequest {
    pub fn job(&self) -> JobId {
        match self {
            WorkerRequest::Load(req) => req.job,
            WorkerRequest::StartSuperstep(req) => req.job,
            WorkerRequest::Deliver(req) => req.job,
            WorkerRequest::Store(req) => req.job,
            WorkerRequest::CollectResults(req) | WorkerRequest::Release(req) => req.job,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkerRequest::Load(_) => "load",
            WorkerRequest::StartSuperstep(_) => "start_superstep",
            WorkerRequest::Deliver(_) => "deliver",
            WorkerRequest::Store(_) => "store",
            WorkerRequest::CollectResults(_) => "collect_results",
            WorkerRequest::Release(_) => "release",
        }
    }
}
