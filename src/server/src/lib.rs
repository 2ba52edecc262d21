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

//! A vertex-centric graph computation engine.
//!
//! A job partitions the vertices of a graph into shards served by workers,
//! and a conductor drives bulk synchronous supersteps over them: messages
//! sent in superstep `N` are received in `N + 1`, aggregator contributions
//! are merged between supersteps.

pub mod algorithm;
mod channel;
mod cluster;
pub mod conductor;
mod config;
mod error;
pub mod metrics;
mod partition;
mod retry;
mod service;
pub mod store;
pub mod transport;
mod worker;

pub use crate::channel::{MessageBuffer, MessageChannel};
pub use crate::cluster::LocalJob;
pub use crate::conductor::{ConductorState, JobHandle, JobReport, Termination};
pub use crate::config::PregelConfig;
pub use crate::error::{Error, Result};
pub use crate::partition::{Edge, Partition, PartitionBuilder, Vertex};
pub use crate::retry::RetryState;
pub use crate::service::{AlgorithmKind, PregelService};
pub use crate::worker::Worker;
