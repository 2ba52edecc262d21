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

use std::collections::BTreeMap;

use log::{debug, warn};
use pregel_api::{
    handle_attribute, key_attribute, GraphByCollections, PregelShard, ShardMap, WorkerId,
    FROM_ATTRIBUTE, KEY_ATTRIBUTE, TO_ATTRIBUTE,
};

use super::PartitionOf;
use crate::algorithm::Algorithm;
use crate::partition::PartitionBuilder;
use crate::store::GraphStore;
use crate::Result;

pub(super) struct LoadedShards<A: Algorithm> {
    pub partitions: BTreeMap<PregelShard, PartitionOf<A>>,
    pub vertices: u64,
    pub edges: u64,
    pub load_errors: u64,
}

/// Read the vertices of the shards served by `worker` and their outgoing
/// edges. Documents which can not be read are skipped and counted.
pub(super) fn load_shards<A: Algorithm>(
    algorithm: &A,
    store: &dyn GraphStore,
    graph: &GraphByCollections,
    shard_map: &ShardMap,
    worker: WorkerId,
) -> Result<LoadedShards<A>> {
    let mut builders = BTreeMap::new();
    for shard in shard_map.shards_of(worker) {
        let collection = shard_map.collection_of(shard).unwrap_or_default();
        builders.insert(shard, PartitionBuilder::new(shard, collection));
    }

    // Every worker scans every collection, documents which belong to no shard
    // are counted by the first worker only.
    let counts_unroutable = shard_map.workers().first() == Some(&worker);
    let mut load_errors = 0;
    for collection in &graph.vertex_collections {
        for document in store.scan(collection)? {
            let Some(key) = key_attribute(&document, &graph.shard_key_attribute) else {
                debug!(
                    "skip vertex without shard key. collection={collection}, attribute={}",
                    graph.shard_key_attribute
                );
                load_errors += counts_unroutable as u64;
                continue;
            };
            let Some(builder) =
                shard_map.shard_of(collection, &key).and_then(|shard| builders.get_mut(&shard))
            else {
                continue;
            };
            let document_key = key_attribute(&document, KEY_ATTRIBUTE);
            let result = algorithm
                .read_vertex_document(&document)
                .and_then(|properties| builder.add_document_vertex(key, document_key, properties));
            if let Err(err) = result {
                debug!("skip vertex. collection={collection}, err={err}");
                load_errors += 1;
            }
        }
    }

    for collection in &graph.edge_collections {
        for document in store.scan(collection)? {
            let Some((from_collection, from_key)) = handle_attribute(&document, FROM_ATTRIBUTE)
            else {
                debug!("skip edge without source. collection={collection}");
                load_errors += counts_unroutable as u64;
                continue;
            };
            let Some(shard) = shard_map.shard_of(from_collection, from_key) else {
                debug!("skip edge from unknown collection. collection={collection}, from={from_collection}");
                load_errors += counts_unroutable as u64;
                continue;
            };
            let Some(builder) = builders.get_mut(&shard) else {
                continue;
            };
            if graph.is_restricted(from_collection, collection) {
                continue;
            }
            let Some(target) = handle_attribute(&document, TO_ATTRIBUTE)
                .and_then(|(to_collection, to_key)| shard_map.id_of(to_collection, to_key))
            else {
                debug!("skip edge with unknown target. collection={collection}");
                load_errors += 1;
                continue;
            };
            let result = algorithm
                .read_edge_document(&document)
                .and_then(|properties| builder.add_edge(from_key, target, properties));
            if let Err(err) = result {
                debug!("skip edge. collection={collection}, err={err}");
                load_errors += 1;
            }
        }
    }

    if load_errors > 0 {
        warn!("documents are skipped while loading. worker={worker}, load_errors={load_errors}");
    }

    let mut loaded = LoadedShards {
        partitions: BTreeMap::default(),
        vertices: 0,
        edges: 0,
        load_errors,
    };
    for (shard, builder) in builders {
        let partition = builder.build();
        loaded.vertices += partition.num_vertices() as u64;
        loaded.edges += partition.num_edges() as u64;
        loaded.partitions.insert(shard, partition);
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::algorithm::Sssp;
    use crate::store::MemoryStore;

    #[test]
    fn load_own_shards_only() {
        let store = MemoryStore::from_json(json!({
            "v": [{ "_key": "a" }, { "_key": "b" }, { "_key": "c" }],
            "w": [{ "_key": "x" }],
            "e": [
                { "_from": "v/a", "_to": "v/b", "weight": 2 },
                { "_from": "v/b", "_to": "w/x" },
                { "_from": "v/c", "_to": "nowhere/x" },
                { "_from": "v/a", "_to": "v/c", "weight": -1 },
                { "_from": "v/zz", "_to": "v/a" },
            ],
            "f": [{ "_from": "v/a", "_to": "v/c" }],
        }))
        .unwrap();
        let graph = GraphByCollections::new(["v", "w"], ["e", "f"])
            .unwrap()
            .with_restriction("v", ["e"]);
        let shard_map = ShardMap::new(&graph, 2, vec![1]).unwrap();
        let sssp = Sssp::from_params(&json!({ "source": "v/a", "weight_attribute": "weight" }))
            .unwrap();

        let loaded = load_shards(&sssp, &store, &graph, &shard_map, 1).unwrap();
        assert_eq!(loaded.partitions.len(), 4);
        assert_eq!(loaded.vertices, 4);
        // a -> b, b -> x; f is restricted for v.
        assert_eq!(loaded.edges, 2);
        // Unknown target, negative weight, dangling source.
        assert_eq!(loaded.load_errors, 3);

        let other = load_shards(&sssp, &store, &graph, &shard_map, 2).unwrap();
        assert_eq!(other.vertices, 0);
        assert!(other.partitions.is_empty());
    }

    #[test]
    fn load_by_shard_key_attribute() {
        let store = MemoryStore::from_json(json!({
            "v": [{ "_key": "a", "uid": "u1" }, { "_key": "b" }],
            "e": [{ "_from": "v/u1", "_to": "v/u1" }],
        }))
        .unwrap();
        let graph =
            GraphByCollections::new(["v"], ["e"]).unwrap().with_shard_key_attribute("uid");
        let shard_map = ShardMap::new(&graph, 1, vec![1]).unwrap();
        let sssp = Sssp::from_params(&json!({ "source": "v/u1" })).unwrap();

        let loaded = load_shards(&sssp, &store, &graph, &shard_map, 1).unwrap();
        assert_eq!((loaded.vertices, loaded.edges, loaded.load_errors), (1, 1, 1));
        let partition = loaded.partitions.values().next().unwrap();
        assert_eq!(partition.vertex("u1").unwrap().document_key(), "a");
    }

    #[test]
    fn unroutable_documents_are_counted_once() {
        let store = MemoryStore::from_json(json!({
            "v": [{ "_key": "a" }, { "_key": "b" }],
            "e": [
                { "_to": "v/a" },
                { "_from": "elsewhere/a", "_to": "v/b" },
                { "_from": "v/a", "_to": "nowhere/x" },
            ],
        }))
        .unwrap();
        let graph = GraphByCollections::new(["v"], ["e"]).unwrap();
        let shard_map = ShardMap::new(&graph, 3, vec![1, 2, 3]).unwrap();
        let sssp = Sssp::from_params(&json!({ "source": "v/a" })).unwrap();

        let mut load_errors = 0;
        for worker in [1, 2, 3] {
            let loaded = load_shards(&sssp, &store, &graph, &shard_map, worker).unwrap();
            load_errors += loaded.load_errors;
        }
        // Edge without source, edge from an unknown collection and the edge
        // with an unknown target, which is counted by the owner of v/a.
        assert_eq!(load_errors, 3);
    }

    #[test]
    fn missing_collection_fails() {
        let store = MemoryStore::from_json(json!({ "v": [] })).unwrap();
        let graph = GraphByCollections::new(["v"], ["e"]).unwrap();
        let shard_map = ShardMap::new(&graph, 1, vec![1]).unwrap();
        let sssp = Sssp::from_params(&json!({ "source": "v/a" })).unwrap();
        assert!(load_shards(&sssp, &store, &graph, &shard_map, 1).is_err());
    }
}
