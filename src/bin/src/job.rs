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

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Environment, File, FileFormat};
use pregel_api::GraphByCollections;
use pregel_runtime::ExecutorConfig;
use pregel_server::algorithm::PageRankSettings;
use pregel_server::{AlgorithmKind, PregelConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything needed to run one job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobConfig {
    pub algorithm: AlgorithmKind,
    pub graph: GraphByCollections,
    /// The algorithm settings, missing fields take their defaults.
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub pregel: PregelConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

/// Load a job config from a TOML file, environment variables like
/// `PREGEL__PREGEL__NUM_WORKERS` override the file.
pub fn load(path: &Path) -> Result<JobConfig> {
    let cfg = config::Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml))
        .add_source(Environment::with_prefix("PREGEL").prefix_separator("__").separator("__"))
        .build()
        .with_context(|| format!("read job config {}", path.display()))?;
    cfg.try_deserialize().with_context(|| format!("parse job config {}", path.display()))
}

pub fn to_toml(job: &JobConfig) -> Result<String> {
    // TOML has no null.
    let mut job = job.clone();
    if let Value::Object(params) = &mut job.params {
        params.retain(|_, v| !v.is_null());
    }
    // Plain values must precede tables, `toml::Value` orders them.
    let value = toml::Value::try_from(&job).context("convert job config")?;
    toml::to_string_pretty(&value).context("format job config")
}

#[derive(Parser)]
#[clap(about = "Print a job config with the default settings")]
pub struct TemplateCommand {
    #[clap(long, default_value = "pagerank")]
    algorithm: AlgorithmKind,
}

impl TemplateCommand {
    pub fn run(self) -> Result<()> {
        let params = match self.algorithm {
            AlgorithmKind::PageRank => serde_json::to_value(PageRankSettings::default())?,
            AlgorithmKind::Sssp => serde_json::json!({ "source": "vertices/0" }),
            AlgorithmKind::Wcc => serde_json::json!({}),
        };
        let job = JobConfig {
            algorithm: self.algorithm,
            graph: GraphByCollections::new(["vertices"], ["edges"])?,
            params,
            pregel: PregelConfig::default(),
            executor: ExecutorConfig::default(),
        };
        println!("{}", to_toml(&job)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_partial_job_config() {
        let dir = std::env::temp_dir().join(format!("pregel-job-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("job.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
algorithm = "sssp"

[graph]
vertex_collections = ["cities"]
edge_collections = ["roads"]

[params]
source = "cities/berlin"
weight_attribute = "km"

[pregel]
num_workers = 3
store = false
"#
        )
        .unwrap();

        let job = load(&path).unwrap();
        assert_eq!(job.algorithm, AlgorithmKind::Sssp);
        assert_eq!(job.graph.shard_key_attribute, "_key");
        assert_eq!(job.params["source"], "cities/berlin");
        assert_eq!(job.pregel.num_workers, 3);
        assert!(!job.pregel.store);
        assert_eq!(job.pregel.result_field, "result");
        assert!(job.executor.num_threads.is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn template_is_loadable() {
        let job = JobConfig {
            algorithm: AlgorithmKind::PageRank,
            graph: GraphByCollections::new(["v"], ["e"]).unwrap(),
            params: serde_json::to_value(PageRankSettings::default()).unwrap(),
            pregel: PregelConfig::default(),
            executor: ExecutorConfig { num_threads: Some(2), ..Default::default() },
        };
        let text = to_toml(&job).unwrap();
        let parsed: JobConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.algorithm, AlgorithmKind::PageRank);
        assert_eq!(parsed.graph, job.graph);
        assert_eq!(parsed.pregel, job.pregel);
        assert_eq!(parsed.executor.num_threads, Some(2));
    }
}
