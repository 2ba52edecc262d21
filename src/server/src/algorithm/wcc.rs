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

use pregel_api::{Document, PregelId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Algorithm, Decision, VertexContext};
use crate::Result;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WccSettings {}

/// Weakly connected components, edges are followed in both directions.
///
/// Superstep 0 announces each vertex to its out-neighbours so they learn
/// their in-neighbours, then the smallest vertex handle is spread as the
/// label of a component.
pub struct Wcc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WccMessage {
    Announce(PregelId),
    Label(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WccPhase {
    #[default]
    Announce,
    Propagate,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WccVertex {
    pub component: String,
    /// Out and in neighbours, known from the first propagate superstep on.
    pub neighbours: Vec<PregelId>,
}

impl Algorithm for Wcc {
    type VertexProperties = WccVertex;
    type EdgeProperties = ();
    type Message = WccMessage;
    type Global = WccPhase;
    type Aggregators = ();
    type Settings = WccSettings;

    fn with_settings(_: WccSettings) -> Result<Self> {
        Ok(Wcc)
    }

    fn name(&self) -> &'static str {
        "wcc"
    }

    fn read_vertex_document(&self, _: &Document) -> Result<WccVertex> {
        Ok(WccVertex::default())
    }

    fn read_edge_document(&self, _: &Document) -> Result<()> {
        Ok(())
    }

    fn write_vertex_document(&self, vertex: &WccVertex, document: &mut Document) -> Result<()> {
        document.insert("component".to_owned(), Value::String(vertex.component.clone()));
        Ok(())
    }

    fn compute(&self, ctx: &mut VertexContext<'_, Self>, messages: &[WccMessage]) -> Result<()> {
        if *ctx.global() == WccPhase::Announce {
            let id = ctx.id().clone();
            let handle = ctx.handle();
            let neighbours = ctx.edges().iter().map(|e| e.target.clone()).collect();
            *ctx.properties_mut() = WccVertex { component: handle, neighbours };
            ctx.send_to_all_neighbours(WccMessage::Announce(id));
            return Ok(());
        }

        let first = ctx.superstep() == 1;
        let vertex = ctx.properties_mut();
        let mut changed = first;
        for message in messages {
            match message {
                WccMessage::Announce(from) => vertex.neighbours.push(from.clone()),
                WccMessage::Label(label) if *label < vertex.component => {
                    vertex.component = label.clone();
                    changed = true;
                }
                WccMessage::Label(_) => {}
            }
        }
        if first {
            vertex.neighbours.sort_unstable();
            vertex.neighbours.dedup();
        }

        if changed {
            let label = vertex.component.clone();
            let neighbours = vertex.neighbours.clone();
            for target in &neighbours {
                ctx.send_message(target, WccMessage::Label(label.clone()));
            }
        }
        ctx.vote_halt();
        Ok(())
    }

    fn post_superstep(&self, _: u64, _: &(), phase: &mut WccPhase) -> Decision {
        *phase = WccPhase::Propagate;
        Decision::Continue
    }
}
