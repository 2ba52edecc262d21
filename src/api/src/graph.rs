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

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::document::KEY_ATTRIBUTE;
use crate::{Error, Result};

/// Describes the collections which form the graph of a job.
///
/// Field names are part of the job configuration format and must not change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphByCollections {
    pub vertex_collections: Vec<String>,
    pub edge_collections: Vec<String>,
    /// Vertex collection to the edge collections allowed for its vertices. An
    /// empty list means no restriction.
    #[serde(default)]
    pub edge_collection_restrictions: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_shard_key_attribute")]
    pub shard_key_attribute: String,
}

fn default_shard_key_attribute() -> String {
    KEY_ATTRIBUTE.to_owned()
}

impl GraphByCollections {
    pub fn new<V, E>(vertex_collections: V, edge_collections: E) -> Result<Self>
    where
        V: IntoIterator,
        V::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        let graph = GraphByCollections {
            vertex_collections: vertex_collections.into_iter().map(Into::into).collect(),
            edge_collections: edge_collections.into_iter().map(Into::into).collect(),
            edge_collection_restrictions: BTreeMap::default(),
            shard_key_attribute: default_shard_key_attribute(),
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Only follow edges of `edge_collections` from vertices of
    /// `vertex_collection`.
    pub fn with_restriction<E>(mut self, vertex_collection: &str, edge_collections: E) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
    {
        self.edge_collection_restrictions.insert(
            vertex_collection.to_owned(),
            edge_collections.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn with_shard_key_attribute(mut self, attribute: &str) -> Self {
        self.shard_key_attribute = attribute.to_owned();
        self
    }

    /// Returns whether edges of `edge_collection` must be skipped for vertices
    /// of `vertex_collection`.
    ///
    /// A vertex collection without an entry, or with an empty list, is not
    /// restricted.
    pub fn is_restricted(&self, vertex_collection: &str, edge_collection: &str) -> bool {
        match self.edge_collection_restrictions.get(vertex_collection) {
            None => false,
            Some(allowed) if allowed.is_empty() => false,
            Some(allowed) => !allowed.iter().any(|e| e == edge_collection),
        }
    }

    #[inline]
    pub fn is_vertex_collection(&self, name: &str) -> bool {
        self.vertex_collections.iter().any(|v| v == name)
    }

    #[inline]
    pub fn is_edge_collection(&self, name: &str) -> bool {
        self.edge_collections.iter().any(|e| e == name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.vertex_collections.is_empty() {
            return Err(Error::Config("at least one vertex collection is required".into()));
        }
        if self.shard_key_attribute.is_empty() {
            return Err(Error::Config("shard key attribute is empty".into()));
        }

        let vertices = unique_names("vertex", &self.vertex_collections)?;
        let edges = unique_names("edge", &self.edge_collections)?;
        if let Some(name) = vertices.intersection(&edges).next() {
            return Err(Error::Config(format!(
                "collection {name} is used as both vertex and edge collection"
            )));
        }

        for (vertex, allowed) in &self.edge_collection_restrictions {
            if !vertices.contains(vertex.as_str()) {
                return Err(Error::Config(format!(
                    "edge collection restriction for unknown vertex collection {vertex}"
                )));
            }
            if let Some(edge) = allowed.iter().find(|e| !edges.contains(e.as_str())) {
                return Err(Error::Config(format!(
                    "edge collection restriction of {vertex} names unknown edge collection {edge}"
                )));
            }
        }
        Ok(())
    }
}

fn unique_names<'a>(role: &str, names: &'a [String]) -> Result<HashSet<&'a str>> {
    let mut set = HashSet::with_capacity(names.len());
    for name in names {
        if name.is_empty() {
            return Err(Error::Config(format!("empty {role} collection name")));
        }
        if !set.insert(name.as_str()) {
            return Err(Error::Config(format!("duplicated {role} collection {name}")));
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> GraphByCollections {
        GraphByCollections::new(["V", "W"], ["E", "X", "Y"]).unwrap()
    }

    #[test]
    fn empty_restriction_list_is_unrestricted() {
        let g = graph().with_restriction("V", Vec::<String>::new());
        for edge in ["E", "X", "Y", "anything"] {
            assert!(!g.is_restricted("V", edge));
        }
    }

    #[test]
    fn absent_restriction_is_unrestricted() {
        let g = graph().with_restriction("W", ["X"]);
        assert!(!g.is_restricted("V", "E"));
        assert!(!g.is_restricted("unknown", "E"));
    }

    #[test]
    fn restriction_basic() {
        let g = graph().with_restriction("V", ["X", "Y"]);
        assert!(g.is_restricted("V", "E"));
        assert!(!g.is_restricted("V", "X"));
        assert!(!g.is_restricted("V", "Y"));
        assert!(!g.is_restricted("W", "E"));
    }

    #[test]
    fn overlapping_roles_are_rejected() {
        let err = GraphByCollections::new(["V", "E"], ["E"]).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err:?}");
    }

    #[test]
    fn invalid_descriptions_are_rejected() {
        assert!(GraphByCollections::new(Vec::<String>::new(), ["E"]).is_err());
        assert!(GraphByCollections::new(["V", "V"], ["E"]).is_err());
        assert!(GraphByCollections::new([""], ["E"]).is_err());
        assert!(graph().with_shard_key_attribute("").validate().is_err());
        assert!(graph().with_restriction("Z", ["E"]).validate().is_err());
        assert!(graph().with_restriction("V", ["Z"]).validate().is_err());
        assert!(graph().with_restriction("V", ["E"]).validate().is_ok());
    }

    #[test]
    fn field_names() {
        let g = graph().with_restriction("V", ["E"]).with_shard_key_attribute("vertex");
        let value = serde_json::to_value(&g).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "vertexCollections": ["V", "W"],
                "edgeCollections": ["E", "X", "Y"],
                "edgeCollectionRestrictions": { "V": ["E"] },
                "shardKeyAttribute": "vertex",
            })
        );
    }

    #[test]
    fn optional_fields_take_defaults() {
        let g: GraphByCollections = serde_json::from_value(serde_json::json!({
            "vertexCollections": ["V"],
            "edgeCollections": ["E"],
        }))
        .unwrap();
        assert!(g.edge_collection_restrictions.is_empty());
        assert_eq!(g.shard_key_attribute, "_key");
        assert!(g.validate().is_ok());
    }
}
