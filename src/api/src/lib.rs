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

mod document;
mod error;
mod graph;
mod layout;
mod shard;
mod worker;

pub use crate::document::*;
pub use crate::error::{Error, Result};
pub use crate::graph::GraphByCollections;
pub use crate::layout::ShardMap;
pub use crate::shard::{PregelId, PregelShard};
pub use crate::worker::*;

/// The identity of a worker, unique inside a job.
pub type WorkerId = u64;

/// The identity of a job, assigned by the service which starts it.
pub type JobId = u64;
