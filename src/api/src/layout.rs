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

use serde::{Deserialize, Serialize};

use crate::{Error, GraphByCollections, PregelId, PregelShard, Result, WorkerId};

/// Assigns vertices to shards and shards to workers.
///
/// Vertex collection `i` owns the shards `[i * S, (i + 1) * S)` where `S` is
/// the number of shards per collection. A vertex lands in
/// `crc32(key) % S` within the range of its collection, and shard `s` is
/// served by worker `workers[s % workers.len()]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardMap {
    vertex_collections: Vec<String>,
    shards_per_collection: u16,
    workers: Vec<WorkerId>,
}

impl ShardMap {
    pub fn new(
        graph: &GraphByCollections,
        shards_per_collection: u16,
        mut workers: Vec<WorkerId>,
    ) -> Result<Self> {
        if shards_per_collection == 0 {
            return Err(Error::Config("shards per collection must be positive".into()));
        }
        workers.sort_unstable();
        workers.dedup();
        if workers.is_empty() {
            return Err(Error::Config("at least one worker is required".into()));
        }
        let num_shards = graph.vertex_collections.len() * shards_per_collection as usize;
        if num_shards > PregelShard::MAX_SHARDS {
            return Err(Error::Config(format!(
                "{num_shards} shards exceed the limit {}",
                PregelShard::MAX_SHARDS
            )));
        }
        Ok(ShardMap {
            vertex_collections: graph.vertex_collections.clone(),
            shards_per_collection,
            workers,
        })
    }

    #[inline]
    pub fn num_shards(&self) -> usize {
        self.vertex_collections.len() * self.shards_per_collection as usize
    }

    #[inline]
    pub fn workers(&self) -> &[WorkerId] {
        &self.workers
    }

    pub fn shards(&self) -> impl Iterator<Item = PregelShard> {
        (0..self.num_shards()).map(|s| PregelShard::new(s as u16))
    }

    /// Returns the shards served by `worker`, in ascending order.
    pub fn shards_of(&self, worker: WorkerId) -> Vec<PregelShard> {
        self.shards().filter(|s| self.worker_of(*s) == Some(worker)).collect()
    }

    pub fn worker_of(&self, shard: PregelShard) -> Option<WorkerId> {
        let index = shard.index().filter(|i| *i < self.num_shards())?;
        Some(self.workers[index % self.workers.len()])
    }

    pub fn collection_of(&self, shard: PregelShard) -> Option<&str> {
        let index = shard.index().filter(|i| *i < self.num_shards())?;
        let collection = index / self.shards_per_collection as usize;
        Some(self.vertex_collections[collection].as_str())
    }

    pub fn shard_of(&self, collection: &str, key: &str) -> Option<PregelShard> {
        let position = self.vertex_collections.iter().position(|c| c == collection)?;
        let per = self.shards_per_collection as u32;
        let offset = pregel_rock::hash::stable_bucket(key.as_bytes(), per);
        Some(PregelShard::new((position as u32 * per + offset) as u16))
    }

    /// Resolve a vertex of `collection`, returns `None` for unknown
    /// collections and empty keys.
    pub fn id_of(&self, collection: &str, key: &str) -> Option<PregelId> {
        if key.is_empty() {
            return None;
        }
        let shard = self.shard_of(collection, key)?;
        Some(PregelId::new(shard, key))
    }

    /// Returns the `collection/key` handle of a vertex.
    pub fn handle_of(&self, id: &PregelId) -> Option<String> {
        let collection = self.collection_of(id.shard)?;
        Some(format!("{collection}/{}", id.key))
    }

    /// Returns whether `id` could have been produced by this map.
    pub fn contains(&self, id: &PregelId) -> bool {
        id.is_valid()
            && self
                .collection_of(id.shard)
                .and_then(|c| self.shard_of(c, &id.key))
                .map(|s| s == id.shard)
                .unwrap_or_default()
    }
}
