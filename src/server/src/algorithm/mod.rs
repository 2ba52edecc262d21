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

//! The binding between the engine and a vertex program.

pub mod aggregate;
mod page_rank;
mod sssp;
mod wcc;

use std::fmt::Debug;

use log::trace;
use pregel_api::{Document, PregelId, ShardMap};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use self::aggregate::{Aggregate, All, Any, Max, Min, Sum};
pub use self::page_rank::{PageRank, PageRankSettings, PageRankVertex};
pub use self::sssp::{Sssp, SsspSettings, SsspVertex};
pub use self::wcc::{Wcc, WccMessage, WccPhase, WccSettings, WccVertex};
use crate::channel::MessageBuffer;
use crate::partition::{Edge, Vertex};
use crate::{Error, Result};

/// Folds a message into the one already queued for the same vertex.
pub type Combiner<M> = fn(&mut M, M);

/// The decision of the conductor after a superstep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Halt,
}

/// A vertex program and the types it works on.
///
/// An algorithm is shared by all shards of a job and must not keep state
/// between supersteps; everything it needs lives in the vertex properties,
/// the global state or the aggregators.
pub trait Algorithm: Sized + Send + Sync + 'static {
    type VertexProperties: Debug + Send + Sync + 'static;
    type EdgeProperties: Debug + Send + Sync + 'static;
    type Message: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// The state set by the conductor between supersteps, read-only for
    /// vertices.
    type Global: Clone + Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static;
    type Aggregators: Aggregate;
    type Settings: Debug + Default + DeserializeOwned;

    fn with_settings(settings: Self::Settings) -> Result<Self>;

    /// Build from JSON parameters, `null` takes the default settings.
    fn from_params(params: &Value) -> Result<Self> {
        let settings = if params.is_null() {
            Self::Settings::default()
        } else {
            serde_json::from_value(params.clone())
                .map_err(|err| Error::Config(format!("algorithm settings: {err}")))?
        };
        Self::with_settings(settings)
    }

    /// The stable identifier used in logs and metrics.
    fn name(&self) -> &'static str;

    fn read_vertex_document(&self, document: &Document) -> Result<Self::VertexProperties>;

    fn read_edge_document(&self, document: &Document) -> Result<Self::EdgeProperties>;

    /// Write the result of a vertex into `document`.
    fn write_vertex_document(
        &self,
        properties: &Self::VertexProperties,
        document: &mut Document,
    ) -> Result<()>;

    /// Called once on the conductor before the first superstep.
    fn conductor_setup(&self) -> Result<Self::Global> {
        Ok(Self::Global::default())
    }

    fn combiner(&self) -> Option<Combiner<Self::Message>> {
        None
    }

    /// Runs for every vertex which is active or received messages.
    fn compute(&self, ctx: &mut VertexContext<'_, Self>, messages: &[Self::Message]) -> Result<()>;

    /// Called on the conductor once all workers finished `superstep`.
    fn post_superstep(
        &self,
        _superstep: u64,
        _aggregated: &Self::Aggregators,
        _global: &mut Self::Global,
    ) -> Decision {
        Decision::Continue
    }
}

/// The read-only view of a superstep, shared by all vertices of a worker.
pub(crate) struct StepEnv<'a, A: Algorithm> {
    pub shard_map: &'a ShardMap,
    pub superstep: u64,
    pub vertex_count: u64,
    pub global: &'a A::Global,
    pub aggregated: &'a A::Aggregators,
}

/// What the vertices of a shard produced in a superstep.
pub(crate) struct StepOutput<A: Algorithm> {
    pub outbox: MessageBuffer<A::Message>,
    pub contribution: A::Aggregators,
    pub messages_sent: u64,
    pub routing_errors: u64,
}

impl<A: Algorithm> StepOutput<A> {
    pub fn new(algorithm: &A) -> Self {
        StepOutput {
            outbox: MessageBuffer::new(algorithm.combiner()),
            contribution: A::Aggregators::default(),
            messages_sent: 0,
            routing_errors: 0,
        }
    }
}

/// The view of a vertex during [`Algorithm::compute`].
pub struct VertexContext<'a, A: Algorithm> {
    env: &'a StepEnv<'a, A>,
    vertex: &'a mut Vertex<A::VertexProperties>,
    edges: &'a [Edge<A::EdgeProperties>],
    output: &'a mut StepOutput<A>,
    halted: bool,
}

impl<'a, A: Algorithm> VertexContext<'a, A> {
    pub(crate) fn new(
        env: &'a StepEnv<'a, A>,
        vertex: &'a mut Vertex<A::VertexProperties>,
        edges: &'a [Edge<A::EdgeProperties>],
        output: &'a mut StepOutput<A>,
    ) -> Self {
        VertexContext { env, vertex, edges, output, halted: false }
    }

    #[inline]
    pub fn id(&self) -> &PregelId {
        &self.vertex.id
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.vertex.id.key
    }

    pub fn collection(&self) -> &str {
        self.env.shard_map.collection_of(self.vertex.id.shard).unwrap_or_default()
    }

    /// The `collection/key` handle of this vertex.
    pub fn handle(&self) -> String {
        format!("{}/{}", self.collection(), self.key())
    }

    #[inline]
    pub fn superstep(&self) -> u64 {
        self.env.superstep
    }

    /// The number of vertices of the whole graph.
    #[inline]
    pub fn vertex_count(&self) -> u64 {
        self.env.vertex_count
    }

    #[inline]
    pub fn properties(&self) -> &A::VertexProperties {
        &self.vertex.properties
    }

    #[inline]
    pub fn properties_mut(&mut self) -> &mut A::VertexProperties {
        &mut self.vertex.properties
    }

    #[inline]
    pub fn edges(&self) -> &'a [Edge<A::EdgeProperties>] {
        self.edges
    }

    #[inline]
    pub fn global(&self) -> &A::Global {
        self.env.global
    }

    /// The aggregators merged at the end of the previous superstep.
    #[inline]
    pub fn aggregated(&self) -> &A::Aggregators {
        self.env.aggregated
    }

    /// The contribution to the aggregators of this superstep.
    #[inline]
    pub fn aggregate(&mut self) -> &mut A::Aggregators {
        &mut self.output.contribution
    }

    /// Resolve a vertex by collection and key.
    pub fn id_of(&self, collection: &str, key: &str) -> Option<PregelId> {
        self.env.shard_map.id_of(collection, key)
    }

    /// Queue a message for the next superstep. Messages to unknown vertices
    /// are dropped and counted as routing errors.
    pub fn send_message(&mut self, target: &PregelId, message: A::Message) {
        if let Err(err) = target.validate() {
            trace!("drop message. from={}, err={err}", self.vertex.id);
            self.output.routing_errors += 1;
            return;
        }
        if !self.env.shard_map.contains(target) {
            trace!("drop message to unknown shard. from={}, to={target}", self.vertex.id);
            self.output.routing_errors += 1;
            return;
        }
        self.output.messages_sent += 1;
        self.output.outbox.push(target.clone(), message);
    }

    pub fn send_to_all_neighbours(&mut self, message: A::Message) {
        let edges = self.edges;
        for edge in edges {
            self.send_message(&edge.target, message.clone());
        }
    }

    /// Deactivate this vertex until it receives a message.
    #[inline]
    pub fn vote_halt(&mut self) {
        self.halted = true;
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted
    }
}
