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

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use pregel_api::VertexResult;
use pregel_runtime::ExecutorOwner;
use pregel_server::metrics::PrometheusSink;
use pregel_server::store::MemoryStore;
use pregel_server::{AlgorithmKind, JobReport, PregelService};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::job;

#[derive(Parser)]
#[clap(about = "Run a job over a graph of JSON documents")]
pub struct Command {
    /// The job config in TOML.
    #[clap(long)]
    config: PathBuf,

    /// A JSON object which maps collection names to arrays of documents.
    #[clap(long)]
    graph: PathBuf,

    /// Overrides the algorithm of the job config.
    #[clap(long)]
    algorithm: Option<AlgorithmKind>,

    /// Write the documents, results included, to this file once the job is
    /// done.
    #[clap(long)]
    output: Option<PathBuf>,

    /// The number of vertices printed, all of them are written to `output`.
    #[clap(long, default_value = "20")]
    limit: usize,

    /// Print the prometheus metrics after the job.
    #[clap(long)]
    metrics: bool,

    /// Sets the log level.
    #[clap(long)]
    log_level: Option<tracing::Level>,
}

impl Command {
    pub fn run(self) -> Result<()> {
        tracing_subscriber::fmt()
            .with_max_level(self.log_level.unwrap_or(tracing::Level::WARN))
            .with_ansi(atty::is(atty::Stream::Stderr))
            .init();

        let mut job = job::load(&self.config)?;
        if let Some(algorithm) = self.algorithm {
            job.algorithm = algorithm;
        }
        let file = File::open(&self.graph)
            .with_context(|| format!("open graph {}", self.graph.display()))?;
        let data = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parse graph {}", self.graph.display()))?;
        let store = Arc::new(MemoryStore::from_json(data)?);
        info!("graph is loaded. path={}", self.graph.display());

        let owner = ExecutorOwner::with_config(job.executor.clone());
        let executor = owner.executor();
        let service = PregelService::new(
            executor.clone(),
            store.clone(),
            job.pregel.clone(),
            Arc::new(PrometheusSink),
        );
        let (report, results) = executor.block_on(async {
            let report = service.run(job.algorithm, &job.params, job.graph.clone()).await?;
            let results = service.results(report.job).await?;
            Ok::<_, pregel_server::Error>((report, results))
        })?;

        show_report(&report);
        show_results(&results, self.limit);
        if let Some(path) = &self.output {
            let file = File::create(path)
                .with_context(|| format!("create output {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), &store.to_json())
                .with_context(|| format!("write output {}", path.display()))?;
        }
        if self.metrics {
            use prometheus::Encoder;
            let mut buf = Vec::new();
            prometheus::TextEncoder::new()
                .encode(&prometheus::gather(), &mut buf)
                .context("encode metrics")?;
            println!("{}", String::from_utf8_lossy(&buf));
        }
        Ok(())
    }
}

fn show_report(report: &JobReport) {
    let mut builder = Builder::default();
    builder.push_record(["job", "algorithm", "supersteps", "vertices", "edges", "termination"]);
    builder.push_record([
        report.job.to_string(),
        report.algorithm.clone(),
        report.supersteps.to_string(),
        report.vertices.to_string(),
        report.edges.to_string(),
        format!("{:?}", report.termination),
    ]);
    println!("{}", builder.build().with(Style::ascii_rounded()));
    println!(
        "messages: {}, load errors: {}, routing errors: {}, stored: {}, elapsed: {:?}",
        report.messages_sent,
        report.load_errors,
        report.routing_errors,
        report.stored,
        report.elapsed
    );
}

fn show_results(results: &[VertexResult], limit: usize) {
    let mut builder = Builder::default();
    builder.push_record(["vertex", "result"]);
    for result in results.iter().take(limit) {
        builder.push_record([result.handle.clone(), result.result.to_string()]);
    }
    println!("{}", builder.build().with(Style::ascii_rounded()));
    if results.len() > limit {
        println!("{} of {} vertices are shown", limit, results.len());
    }
}
