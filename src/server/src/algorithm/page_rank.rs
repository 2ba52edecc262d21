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
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Algorithm, Combiner, Decision, Max, VertexContext};
use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRankSettings {
    pub damping: f64,
    /// The job halts once no rank changes more than this.
    pub threshold: f64,
    /// A vertex attribute holding the initial rank, `1 / N` if absent.
    pub seed_attribute: Option<String>,
}

impl Default for PageRankSettings {
    fn default() -> Self {
        PageRankSettings { damping: 0.85, threshold: 0.00002, seed_attribute: None }
    }
}

pub struct PageRank {
    settings: PageRankSettings,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageRankVertex {
    pub rank: f64,
    pub seed: Option<f64>,
}

fn sum(acc: &mut f64, value: f64) {
    *acc += value;
}

impl Algorithm for PageRank {
    type VertexProperties = PageRankVertex;
    type EdgeProperties = ();
    type Message = f64;
    type Global = ();
    /// The largest rank change of a superstep.
    type Aggregators = Max<f64>;
    type Settings = PageRankSettings;

    fn with_settings(settings: PageRankSettings) -> Result<Self> {
        if !(settings.damping > 0.0 && settings.damping <= 1.0) {
            return Err(Error::Config(format!("damping {} out of (0, 1]", settings.damping)));
        }
        if !(settings.threshold >= 0.0) {
            return Err(Error::Config(format!("negative threshold {}", settings.threshold)));
        }
        Ok(PageRank { settings })
    }

    fn name(&self) -> &'static str {
        "pagerank"
    }

    fn read_vertex_document(&self, document: &Document) -> Result<PageRankVertex> {
        let seed = self
            .settings
            .seed_attribute
            .as_deref()
            .and_then(|attribute| number_attribute(document, attribute));
        Ok(PageRankVertex { rank: 0.0, seed })
    }

    fn read_edge_document(&self, _: &Document) -> Result<()> {
        Ok(())
    }

    fn write_vertex_document(&self, vertex: &PageRankVertex, document: &mut Document) -> Result<()> {
        document.insert("rank".to_owned(), Value::from(vertex.rank));
        Ok(())
    }

    fn combiner(&self) -> Option<Combiner<f64>> {
        Some(sum)
    }

    fn compute(&self, ctx: &mut VertexContext<'_, Self>, messages: &[f64]) -> Result<()> {
        let n = ctx.vertex_count().max(1) as f64;
        let damping = self.settings.damping;
        let rank = if ctx.superstep() == 0 {
            ctx.properties().seed.unwrap_or(1.0 / n)
        } else {
            let incoming: f64 = messages.iter().sum();
            let rank = (1.0 - damping) / n + damping * incoming;
            let delta = (rank - ctx.properties().rank).abs();
            ctx.aggregate().add(delta);
            rank
        };
        ctx.properties_mut().rank = rank;

        let out_degree = ctx.edges().len();
        if out_degree > 0 {
            ctx.send_to_all_neighbours(rank / out_degree as f64);
        }
        Ok(())
    }

    fn post_superstep(&self, superstep: u64, delta: &Max<f64>, _: &mut ()) -> Decision {
        match delta.0 {
            Some(delta) if superstep > 0 && delta < self.settings.threshold => Decision::Halt,
            _ => Decision::Continue,
        }
    }
}
