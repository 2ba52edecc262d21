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

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PregelConfig {
    /// The number of in-process workers of a local job.
    pub num_workers: usize,

    /// The number of shards computed concurrently by a worker.
    pub parallelism: usize,

    pub shards_per_collection: u16,

    /// The job is finalized after this many supersteps even if vertices are
    /// still active.
    pub max_global_superstep: u64,

    /// The timeout of a single barrier request.
    pub barrier_timeout_ms: u64,

    /// The number of attempts of a barrier request, including the first one.
    pub barrier_retry_attempts: usize,

    /// The number of documents which may fail to load before the job fails.
    pub max_load_errors: u64,

    /// The number of undeliverable messages tolerated before the job fails.
    pub max_routing_errors: u64,

    /// The maximum number of messages in one batch sent to another worker.
    pub message_batch_size: usize,

    /// Write the results back to the document store once the job is done.
    pub store: bool,

    /// The attribute which receives the result of a vertex.
    pub result_field: String,
}

impl Default for PregelConfig {
    fn default() -> Self {
        PregelConfig {
            num_workers: 2,
            parallelism: num_cpus::get(),
            shards_per_collection: 4,
            max_global_superstep: 500,
            barrier_timeout_ms: 30_000,
            barrier_retry_attempts: 5,
            max_load_errors: 0,
            max_routing_errors: 0,
            message_batch_size: 1024,
            store: true,
            result_field: "result".to_owned(),
        }
    }
}

impl PregelConfig {
    #[inline]
    pub fn barrier_timeout(&self) -> Duration {
        Duration::from_millis(self.barrier_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(Error::Config("num_workers must be positive".into()));
        }
        if self.parallelism == 0 {
            return Err(Error::Config("parallelism must be positive".into()));
        }
        if self.shards_per_collection == 0 {
            return Err(Error::Config("shards_per_collection must be positive".into()));
        }
        if self.max_global_superstep == 0 {
            return Err(Error::Config("max_global_superstep must be positive".into()));
        }
        if self.barrier_retry_attempts == 0 {
            return Err(Error::Config("barrier_retry_attempts must be positive".into()));
        }
        if self.message_batch_size == 0 {
            return Err(Error::Config("message_batch_size must be positive".into()));
        }
        if self.store && self.result_field.is_empty() {
            return Err(Error::Config("result_field is required to store results".into()));
        }
        Ok(())
    }
}
