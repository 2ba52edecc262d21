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

mod executor;

pub mod time;

use serde::{Deserialize, Serialize};
pub use tokio::select;
pub use tokio::task::yield_now;

pub use self::executor::*;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// The number of worker threads, defaults to the number of cpus.
    pub num_threads: Option<usize>,
    pub event_interval: Option<u32>,
    pub global_event_interval: Option<u32>,
    /// The upper bound of threads used by `spawn_blocking`, vertex compute
    /// runs there.
    pub max_blocking_threads: Option<usize>,
    /// A poll taking longer than this is reported as slow.
    pub slow_poll_threshold_ms: Option<u64>,
}
