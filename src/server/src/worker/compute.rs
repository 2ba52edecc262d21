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

use pregel_api::ShardMap;

use super::PartitionOf;
use crate::algorithm::{Algorithm, StepEnv, StepOutput, VertexContext};
use crate::channel::MessageBuffer;
use crate::Result;

/// The superstep inputs moved into each compute task.
pub(super) struct SharedStep<A: Algorithm> {
    pub shard_map: Arc<ShardMap>,
    pub superstep: u64,
    pub vertex_count: u64,
    pub global: A::Global,
    pub aggregated: A::Aggregators,
}

#[derive(Debug, Default)]
pub(super) struct ComputeStats {
    pub computed: u64,
    pub active: u64,
    pub received: u64,
    /// Messages for vertices this shard does not have.
    pub undeliverable: u64,
}

impl<A: Algorithm> SharedStep<A> {
    fn env(&self) -> StepEnv<'_, A> {
        StepEnv {
            shard_map: &self.shard_map,
            superstep: self.superstep,
            vertex_count: self.vertex_count,
            global: &self.global,
            aggregated: &self.aggregated,
        }
    }
}

/// Run one superstep over a partition.
///
/// Vertices which halted and received nothing are skipped; a message
/// reactivates a halted vertex.
pub(super) fn compute_partition<A: Algorithm>(
    algorithm: &A,
    step: &SharedStep<A>,
    mut partition: PartitionOf<A>,
    mut inbox: MessageBuffer<A::Message>,
) -> Result<(PartitionOf<A>, StepOutput<A>, ComputeStats)> {
    let env = step.env();
    let mut output = StepOutput::new(algorithm);
    let mut stats = ComputeStats { received: inbox.len() as u64, ..Default::default() };
    partition.for_each_mut(|vertex, edges| {
        let messages = inbox.remove(&vertex.id);
        if !vertex.active && messages.is_empty() {
            return Ok(());
        }
        let mut ctx = VertexContext::new(&env, vertex, edges, &mut output);
        algorithm.compute(&mut ctx, &messages)?;
        let halted = ctx.is_halted();
        vertex.active = !halted;
        stats.computed += 1;
        if vertex.active {
            stats.active += 1;
        }
        Ok(())
    })?;
    stats.undeliverable = inbox.len() as u64;
    Ok((partition, output, stats))
}
