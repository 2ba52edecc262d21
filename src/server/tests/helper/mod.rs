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

#![allow(dead_code)]

pub mod algorithms;
pub mod init;
pub mod transport;

use std::collections::BTreeMap;
use std::sync::Arc;

use pregel_api::{GraphByCollections, VertexResult};
use pregel_server::algorithm::Algorithm;
use pregel_server::metrics::MemorySink;
use pregel_server::store::MemoryStore;
use pregel_server::{JobHandle, JobReport, LocalJob, PregelConfig, Result};
use serde_json::Value;

pub fn store(value: Value) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::from_json(value).unwrap())
}

pub fn graph(vertices: &[&str], edges: &[&str]) -> GraphByCollections {
    GraphByCollections::new(vertices.iter().copied(), edges.iter().copied()).unwrap()
}

/// A config with small timeouts, results are not stored.
pub fn config(num_workers: usize) -> PregelConfig {
    PregelConfig {
        num_workers,
        parallelism: 2,
        shards_per_collection: 3,
        barrier_timeout_ms: 5_000,
        store: false,
        ..Default::default()
    }
}

pub struct JobOutcome {
    pub report: Result<JobReport>,
    pub results: Vec<VertexResult>,
    pub handle: JobHandle,
    pub metrics: Arc<MemorySink>,
}

/// Run a job on in-process workers, results are collected if it is done.
pub async fn run_job<A: Algorithm>(
    algorithm: A,
    graph: GraphByCollections,
    store: Arc<MemoryStore>,
    cfg: PregelConfig,
) -> JobOutcome {
    let metrics = Arc::new(MemorySink::default());
    let job = LocalJob::new(1, algorithm, graph, store, cfg, metrics.clone());
    run_local_job(job, metrics).await
}

pub async fn run_local_job<A: Algorithm>(job: LocalJob<A>, metrics: Arc<MemorySink>) -> JobOutcome {
    let report = job.run().await;
    let results = if report.is_ok() { job.results().await.unwrap() } else { Vec::default() };
    JobOutcome { report, results, handle: job.handle(), metrics }
}

/// Index results by `collection/key` handle.
pub fn by_handle(results: &[VertexResult]) -> BTreeMap<String, Value> {
    results.iter().map(|r| (r.handle.clone(), r.result.clone())).collect()
}

/// Vertices `v/0 .. v/n` with edges `i -> i + 1`, and `n - 1 -> 0` if
/// `cycle` is set.
pub fn chain(n: usize, cycle: bool) -> Value {
    let vertices = (0..n).map(|i| serde_json::json!({ "_key": i.to_string() })).collect::<Vec<_>>();
    let mut edges = (1..n)
        .map(|i| serde_json::json!({ "_from": format!("v/{}", i - 1), "_to": format!("v/{i}") }))
        .collect::<Vec<_>>();
    if cycle && n > 1 {
        edges.push(serde_json::json!({ "_from": format!("v/{}", n - 1), "_to": "v/0" }));
    }
    serde_json::json!({ "v": vertices, "e": edges })
}
