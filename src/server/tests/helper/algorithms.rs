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

//! Vertex programs which exercise the engine itself.

use pregel_api::{Document, PregelId, PregelShard};
use pregel_server::algorithm::{Algorithm, Sum, VertexContext};
use pregel_server::{Error, Result};
use serde_json::Value;

/// Every vertex sends one message to itself per superstep, `rounds` times,
/// and votes to halt after each.
pub struct SelfMessage {
    pub rounds: u64,
}

impl Algorithm for SelfMessage {
    type VertexProperties = u64;
    type EdgeProperties = ();
    type Message = u64;
    type Global = ();
    /// The number of vertices computed.
    type Aggregators = Sum<u64>;
    type Settings = ();

    fn with_settings(_: ()) -> Result<Self> {
        Ok(SelfMessage { rounds: 1 })
    }

    fn name(&self) -> &'static str {
        "self_message"
    }

    fn read_vertex_document(&self, _: &Document) -> Result<u64> {
        Ok(0)
    }

    fn read_edge_document(&self, _: &Document) -> Result<()> {
        Ok(())
    }

    fn write_vertex_document(&self, received: &u64, document: &mut Document) -> Result<()> {
        document.insert("received".to_owned(), Value::from(*received));
        Ok(())
    }

    fn compute(&self, ctx: &mut VertexContext<'_, Self>, messages: &[u64]) -> Result<()> {
        *ctx.properties_mut() += messages.len() as u64;
        ctx.aggregate().add(1);
        if ctx.superstep() < self.rounds {
            let id = ctx.id().clone();
            let superstep = ctx.superstep();
            ctx.send_message(&id, superstep);
        }
        ctx.vote_halt();
        Ok(())
    }
}

/// Checks that a message is received exactly in the superstep after it was
/// sent, and records the number of messages received per superstep.
pub struct Isolation {
    pub rounds: u64,
}

impl Algorithm for Isolation {
    type VertexProperties = Vec<u64>;
    type EdgeProperties = ();
    type Message = u64;
    type Global = ();
    type Aggregators = ();
    type Settings = ();

    fn with_settings(_: ()) -> Result<Self> {
        Ok(Isolation { rounds: 3 })
    }

    fn name(&self) -> &'static str {
        "isolation"
    }

    fn read_vertex_document(&self, _: &Document) -> Result<Vec<u64>> {
        Ok(Vec::default())
    }

    fn read_edge_document(&self, _: &Document) -> Result<()> {
        Ok(())
    }

    fn write_vertex_document(&self, received: &Vec<u64>, document: &mut Document) -> Result<()> {
        document.insert("received".to_owned(), Value::from(received.clone()));
        Ok(())
    }

    fn compute(&self, ctx: &mut VertexContext<'_, Self>, messages: &[u64]) -> Result<()> {
        let superstep = ctx.superstep();
        if let Some(sent) = messages.iter().find(|sent| **sent + 1 != superstep) {
            return Err(Error::Algorithm(format!(
                "message of superstep {sent} is visible in superstep {superstep}"
            )));
        }
        ctx.properties_mut().push(messages.len() as u64);
        if superstep < self.rounds {
            let id = ctx.id().clone();
            ctx.send_message(&id, superstep);
            ctx.send_to_all_neighbours(superstep);
        } else {
            ctx.vote_halt();
        }
        Ok(())
    }
}

/// Sends one message to a vertex which does not exist and one to an
/// invalid id.
pub struct Stray;

impl Algorithm for Stray {
    type VertexProperties = ();
    type EdgeProperties = ();
    type Message = ();
    type Global = ();
    type Aggregators = ();
    type Settings = ();

    fn with_settings(_: ()) -> Result<Self> {
        Ok(Stray)
    }

    fn name(&self) -> &'static str {
        "stray"
    }

    fn read_vertex_document(&self, _: &Document) -> Result<()> {
        Ok(())
    }

    fn read_edge_document(&self, _: &Document) -> Result<()> {
        Ok(())
    }

    fn write_vertex_document(&self, _: &(), _: &mut Document) -> Result<()> {
        Ok(())
    }

    fn compute(&self, ctx: &mut VertexContext<'_, Self>, _: &[()]) -> Result<()> {
        if ctx.superstep() == 0 {
            let missing = format!("missing-{}", ctx.key());
            if let Some(id) = ctx.id_of(ctx.collection(), &missing) {
                ctx.send_message(&id, ());
            }
            let invalid = PregelId::new(PregelShard::INVALID, ctx.key());
            ctx.send_message(&invalid, ());
        }
        ctx.vote_halt();
        Ok(())
    }
}

/// Panics when computing the vertex `key` in superstep 1.
pub struct Explode {
    pub key: String,
}

impl Algorithm for Explode {
    type VertexProperties = ();
    type EdgeProperties = ();
    type Message = ();
    type Global = ();
    type Aggregators = ();
    type Settings = ();

    fn with_settings(_: ()) -> Result<Self> {
        Ok(Explode { key: String::default() })
    }

    fn name(&self) -> &'static str {
        "explode"
    }

    fn read_vertex_document(&self, _: &Document) -> Result<()> {
        Ok(())
    }

    fn read_edge_document(&self, _: &Document) -> Result<()> {
        Ok(())
    }

    fn write_vertex_document(&self, _: &(), _: &mut Document) -> Result<()> {
        Ok(())
    }

    fn compute(&self, ctx: &mut VertexContext<'_, Self>, _: &[()]) -> Result<()> {
        if ctx.superstep() == 1 && ctx.key() == self.key {
            panic!("vertex {} exploded", self.key);
        }
        if ctx.superstep() == 0 {
            let id = ctx.id().clone();
            ctx.send_message(&id, ());
        }
        ctx.vote_halt();
        Ok(())
    }
}
