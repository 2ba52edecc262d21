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

use pregel_api::{number_attribute, Document};
use pregel_rock::lang::split_handle;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Algorithm, Combiner, VertexContext};
use crate::{Error, Result};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsspSettings {
    /// The `collection/key` handle of the source vertex.
    pub source: String,
    /// The edge attribute holding the weight, every edge weighs 1 if unset.
    pub weight_attribute: Option<String>,
}

/// Single source shortest paths.
pub struct Sssp {
    source_collection: String,
    source_key: String,
    weight_attribute: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SsspVertex {
    /// `INFINITY` until the vertex is reached.
    pub distance: f64,
}

fn min(acc: &mut f64, value: f64) {
    if value < *acc {
        *acc = value;
    }
}

impl Algorithm for Sssp {
    type VertexProperties = SsspVertex;
    type EdgeProperties = f64;
    type Message = f64;
    type Global = ();
    type Aggregators = ();
    type Settings = SsspSettings;

    fn with_settings(settings: SsspSettings) -> Result<Self> {
        let Some((collection, key)) = split_handle(&settings.source) else {
            return Err(Error::Config(format!(
                "source '{}' is not a collection/key handle",
                settings.source
            )));
        };
        Ok(Sssp {
            source_collection: collection.to_owned(),
            source_key: key.to_owned(),
            weight_attribute: settings.weight_attribute,
        })
    }

    fn name(&self) -> &'static str {
        "sssp"
    }

    fn read_vertex_document(&self, _: &Document) -> Result<SsspVertex> {
        Ok(SsspVertex { distance: f64::INFINITY })
    }

    fn read_edge_document(&self, document: &Document) -> Result<f64> {
        let Some(attribute) = self.weight_attribute.as_deref() else {
            return Ok(1.0);
        };
        match document.get(attribute) {
            None | Some(Value::Null) => Ok(1.0),
            Some(_) => match number_attribute(document, attribute) {
                Some(weight) if weight.is_finite() && weight >= 0.0 => Ok(weight),
                _ => Err(Error::Load(format!("edge weight {attribute} must be a non-negative number"))),
            },
        }
    }

    fn write_vertex_document(&self, vertex: &SsspVertex, document: &mut Document) -> Result<()> {
        let distance =
            if vertex.distance.is_finite() { Value::from(vertex.distance) } else { Value::Null };
        document.insert("distance".to_owned(), distance);
        Ok(())
    }

    fn combiner(&self) -> Option<Combiner<f64>> {
        Some(min)
    }

    fn compute(&self, ctx: &mut VertexContext<'_, Self>, messages: &[f64]) -> Result<()> {
        let mut best = f64::INFINITY;
        if ctx.superstep() == 0
            && ctx.key() == self.source_key
            && ctx.collection() == self.source_collection
        {
            best = 0.0;
        }
        for distance in messages {
            min(&mut best, *distance);
        }

        if best < ctx.properties().distance {
            ctx.properties_mut().distance = best;
            for edge in ctx.edges() {
                ctx.send_message(&edge.target, best + edge.properties);
            }
        }
        ctx.vote_halt();
        Ok(())
    }
}
