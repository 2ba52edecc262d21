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
use std::ops::Range;

use pregel_api::{PregelId, PregelShard};

use crate::{Error, Result};

#[derive(Debug)]
pub struct Edge<E> {
    pub target: PregelId,
    pub properties: E,
}

#[derive(Debug)]
pub struct Vertex<V> {
    pub id: PregelId,
    pub properties: V,
    pub active: bool,
    /// The `_key` of the document if it differs from the vertex key.
    document_key: Option<String>,
    edges: Range<usize>,
}

/// The vertices of a shard and their outgoing edges.
///
/// Vertices are kept sorted by key, edges of a vertex are a contiguous range
/// of the edge arena.
#[derive(Debug)]
pub struct Partition<V, E> {
    shard: PregelShard,
    collection: String,
    vertices: Vec<Vertex<V>>,
    edges: Vec<Edge<E>>,
    index: HashMap<String, usize>,
}

pub struct PartitionBuilder<V, E> {
    shard: PregelShard,
    collection: String,
    vertices: Vec<(String, Option<String>, V)>,
    index: HashMap<String, usize>,
    edges: Vec<(usize, Edge<E>)>,
}

impl<V> Vertex<V> {
    /// The key of the document this vertex was loaded from.
    pub fn document_key(&self) -> &str {
        self.document_key.as_deref().unwrap_or(&self.id.key)
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
}

impl<V, E> Partition<V, E> {
    #[inline]
    pub fn shard(&self) -> PregelShard {
        self.shard
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex(&self, key: &str) -> Option<&Vertex<V>> {
        self.index.get(key).map(|i| &self.vertices[*i])
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex<V>> {
        self.vertices.iter()
    }

    pub fn edges_of(&self, vertex: &Vertex<V>) -> &[Edge<E>] {
        &self.edges[vertex.edges.clone()]
    }

    /// Visit vertices in key order, each with mutable access to itself and
    /// shared access to its edges.
    pub fn for_each_mut<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(&mut Vertex<V>, &[Edge<E>]) -> Result<()>,
    {
        let edges = &self.edges;
        for vertex in &mut self.vertices {
            let range = vertex.edges.clone();
            visit(vertex, &edges[range])?;
        }
        Ok(())
    }
}

impl<V, E> PartitionBuilder<V, E> {
    pub fn new(shard: PregelShard, collection: impl Into<String>) -> Self {
        PartitionBuilder {
            shard,
            collection: collection.into(),
            vertices: Vec::default(),
            index: HashMap::default(),
            edges: Vec::default(),
        }
    }

    pub fn add_vertex(&mut self, key: String, properties: V) -> Result<()> {
        self.add_document_vertex(key, None, properties)
    }

    /// Add a vertex whose document is stored under another key.
    pub fn add_document_vertex(
        &mut self,
        key: String,
        document_key: Option<String>,
        properties: V,
    ) -> Result<()> {
        if self.index.contains_key(&key) {
            return Err(Error::Load(format!("duplicated vertex {}/{key}", self.collection)));
        }
        let document_key = document_key.filter(|k| *k != key);
        self.index.insert(key.clone(), self.vertices.len());
        self.vertices.push((key, document_key, properties));
        Ok(())
    }

    /// Add an edge from the vertex `from`, which must be added before.
    pub fn add_edge(&mut self, from: &str, target: PregelId, properties: E) -> Result<()> {
        let Some(source) = self.index.get(from).copied() else {
            return Err(Error::Load(format!("edge from unknown vertex {}/{from}", self.collection)));
        };
        target.validate()?;
        self.edges.push((source, Edge { target, properties }));
        Ok(())
    }

    pub fn build(self) -> Partition<V, E> {
        let PartitionBuilder { shard, collection, vertices, edges, .. } = self;

        // Count edges per source, then place them in source order.
        let mut offsets = vec![0usize; vertices.len() + 1];
        for (source, _) in &edges {
            offsets[*source + 1] += 1;
        }
        for i in 1..offsets.len() {
            offsets[i] += offsets[i - 1];
        }
        let mut slots: Vec<Option<Edge<E>>> =
            std::iter::repeat_with(|| None).take(edges.len()).collect();
        let mut cursor = offsets.clone();
        for (source, edge) in edges {
            slots[cursor[source]] = Some(edge);
            cursor[source] += 1;
        }
        let edges: Vec<Edge<E>> = slots.into_iter().flatten().collect();

        let mut order = (0..vertices.len()).collect::<Vec<_>>();
        order.sort_unstable_by(|a, b| vertices[*a].0.cmp(&vertices[*b].0));
        let mut slots = vertices.into_iter().map(Some).collect::<Vec<_>>();
        let mut sorted = Vec::with_capacity(slots.len());
        let mut index = HashMap::with_capacity(slots.len());
        for source in order {
            if let Some((key, document_key, properties)) = slots[source].take() {
                index.insert(key.clone(), sorted.len());
                sorted.push(Vertex {
                    id: PregelId::new(shard, key),
                    properties,
                    active: true,
                    document_key,
                    edges: offsets[source]..offsets[source + 1],
                });
            }
        }

        Partition { shard, collection, vertices: sorted, edges, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(key: &str) -> PregelId {
        PregelId::new(PregelShard::new(1), key)
    }

    #[test]
    fn build_sorted_partition() {
        let mut builder = PartitionBuilder::new(PregelShard::new(0), "v");
        builder.add_vertex("c".to_owned(), 3).unwrap();
        builder.add_vertex("a".to_owned(), 1).unwrap();
        builder.add_document_vertex("b".to_owned(), Some("doc-b".to_owned()), 2).unwrap();
        builder.add_edge("c", id("x"), 0.5).unwrap();
        builder.add_edge("a", id("y"), 1.5).unwrap();
        builder.add_edge("c", id("z"), 2.5).unwrap();

        let partition = builder.build();
        assert_eq!(partition.num_vertices(), 3);
        assert_eq!(partition.num_edges(), 3);
        let keys = partition.vertices().map(|v| v.id.key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["a", "b", "c"]);

        let c = partition.vertex("c").unwrap();
        assert_eq!(c.properties, 3);
        assert_eq!(c.num_edges(), 2);
        let targets =
            partition.edges_of(c).iter().map(|e| e.target.key.as_str()).collect::<Vec<_>>();
        assert_eq!(targets, vec!["x", "z"]);
        assert_eq!(partition.edges_of(partition.vertex("b").unwrap()).len(), 0);
        assert_eq!(partition.vertex("b").unwrap().document_key(), "doc-b");
        assert_eq!(c.document_key(), "c");
        assert_eq!(partition.edges_of(partition.vertex("a").unwrap())[0].properties, 1.5);
    }

    #[test]
    fn reject_duplicated_and_dangling() {
        let mut builder = PartitionBuilder::<(), ()>::new(PregelShard::new(0), "v");
        builder.add_vertex("a".to_owned(), ()).unwrap();
        assert!(matches!(builder.add_vertex("a".to_owned(), ()), Err(Error::Load(_))));
        assert!(matches!(builder.add_edge("b", id("a"), ()), Err(Error::Load(_))));
        assert!(matches!(builder.add_edge("a", id(""), ()), Err(Error::InvalidId(_))));
    }

    #[test]
    fn visit_mutably() {
        let mut builder = PartitionBuilder::new(PregelShard::new(0), "v");
        builder.add_vertex("a".to_owned(), 0usize).unwrap();
        builder.add_vertex("b".to_owned(), 0usize).unwrap();
        builder.add_edge("a", id("b"), ()).unwrap();
        let mut partition = builder.build();
        partition
            .for_each_mut(|vertex, edges| {
                vertex.properties = edges.len();
                vertex.active = false;
                Ok(())
            })
            .unwrap();
        assert_eq!(partition.vertex("a").unwrap().properties, 1);
        assert!(partition.vertices().all(|v| !v.active));
    }
}
