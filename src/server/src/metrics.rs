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

use std::collections::HashMap;
use std::sync::Mutex;

use lazy_static::lazy_static;
use log::debug;
use prometheus::*;

pub const SUPERSTEPS_TOTAL: &str = "pregel_supersteps_total";
pub const MESSAGES_ROUTED_TOTAL: &str = "pregel_messages_routed_total";
pub const VERTEX_COMPUTE_TOTAL: &str = "pregel_vertex_compute_total";
pub const ROUTING_ERRORS_TOTAL: &str = "pregel_routing_errors_total";
pub const LOAD_ERRORS_TOTAL: &str = "pregel_load_errors_total";
pub const JOBS_TOTAL: &str = "pregel_jobs_total";

pub const ACTIVE_WORKERS: &str = "pregel_active_workers";
pub const MESSAGES_IN_FLIGHT: &str = "pregel_messages_in_flight";
pub const ACTIVE_JOBS: &str = "pregel_active_jobs";

lazy_static! {
    pub static ref PREGEL_SUPERSTEPS_TOTAL: IntCounter =
        register_int_counter!(SUPERSTEPS_TOTAL, "The total supersteps of all jobs").unwrap();
    pub static ref PREGEL_MESSAGES_ROUTED_TOTAL: IntCounter =
        register_int_counter!(MESSAGES_ROUTED_TOTAL, "The total messages sent by vertices")
            .unwrap();
    pub static ref PREGEL_VERTEX_COMPUTE_TOTAL: IntCounter =
        register_int_counter!(VERTEX_COMPUTE_TOTAL, "The total invocations of vertex compute")
            .unwrap();
    pub static ref PREGEL_ROUTING_ERRORS_TOTAL: IntCounter = register_int_counter!(
        ROUTING_ERRORS_TOTAL,
        "The total messages dropped because of unknown targets"
    )
    .unwrap();
    pub static ref PREGEL_LOAD_ERRORS_TOTAL: IntCounter =
        register_int_counter!(LOAD_ERRORS_TOTAL, "The total documents failed to load").unwrap();
    pub static ref PREGEL_JOBS_TOTAL: IntCounter =
        register_int_counter!(JOBS_TOTAL, "The total jobs started").unwrap();
    pub static ref PREGEL_ACTIVE_WORKERS: IntGauge =
        register_int_gauge!(ACTIVE_WORKERS, "The workers serving the latest job").unwrap();
    pub static ref PREGEL_MESSAGES_IN_FLIGHT: IntGauge = register_int_gauge!(
        MESSAGES_IN_FLIGHT,
        "The messages waiting for the next superstep"
    )
    .unwrap();
    pub static ref PREGEL_ACTIVE_JOBS: IntGauge =
        register_int_gauge!(ACTIVE_JOBS, "The jobs which are not finished").unwrap();
    pub static ref PREGEL_SUPERSTEP_DURATION_SECONDS: Histogram = register_histogram!(
        "pregel_superstep_duration_seconds",
        "The duration of a superstep, barrier included",
        exponential_buckets(0.0005, 2.0, 20).unwrap()
    )
    .unwrap();
    pub static ref PREGEL_BARRIER_RETRY_TOTAL: IntCounter =
        register_int_counter!("pregel_barrier_retry_total", "The total retried barrier requests")
            .unwrap();
}

/// A write-only destination of engine metrics.
///
/// Updating a metric is best effort and never fails the caller.
pub trait MetricsSink: Send + Sync + 'static {
    fn increment(&self, name: &str, delta: u64);

    fn set_gauge(&self, name: &str, value: i64);
}

/// Forwards metrics to the prometheus default registry.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrometheusSink;

impl MetricsSink for PrometheusSink {
    fn increment(&self, name: &str, delta: u64) {
        let counter: &IntCounter = match name {
            SUPERSTEPS_TOTAL => &*PREGEL_SUPERSTEPS_TOTAL,
            MESSAGES_ROUTED_TOTAL => &*PREGEL_MESSAGES_ROUTED_TOTAL,
            VERTEX_COMPUTE_TOTAL => &*PREGEL_VERTEX_COMPUTE_TOTAL,
            ROUTING_ERRORS_TOTAL => &*PREGEL_ROUTING_ERRORS_TOTAL,
            LOAD_ERRORS_TOTAL => &*PREGEL_LOAD_ERRORS_TOTAL,
            JOBS_TOTAL => &*PREGEL_JOBS_TOTAL,
            _ => {
                debug!("ignore increment of unknown counter. name={name}");
                return;
            }
        };
        counter.inc_by(delta);
    }

    fn set_gauge(&self, name: &str, value: i64) {
        let gauge: &IntGauge = match name {
            ACTIVE_WORKERS => &*PREGEL_ACTIVE_WORKERS,
            MESSAGES_IN_FLIGHT => &*PREGEL_MESSAGES_IN_FLIGHT,
            ACTIVE_JOBS => &*PREGEL_ACTIVE_JOBS,
            _ => {
                debug!("ignore update of unknown gauge. name={name}");
                return;
            }
        };
        gauge.set(value);
    }
}

/// Keeps metrics in memory, so a single job can be inspected in isolation.
#[derive(Debug, Default)]
pub struct MemorySink {
    counters: Mutex<HashMap<String, u64>>,
    gauges: Mutex<HashMap<String, i64>>,
}

impl MemorySink {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().expect("poisoned").get(name).copied().unwrap_or_default()
    }

    pub fn gauge(&self, name: &str) -> Option<i64> {
        self.gauges.lock().expect("poisoned").get(name).copied()
    }
}

impl MetricsSink for MemorySink {
    fn increment(&self, name: &str, delta: u64) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(name.to_owned()).or_default() += delta;
        }
    }

    fn set_gauge(&self, name: &str, value: i64) {
        if let Ok(mut gauges) = self.gauges.lock() {
            gauges.insert(name.to_owned(), value);
        }
    }
}

/// Sends every update to both sinks.
pub struct Tee<A, B>(pub A, pub B);

impl<A: MetricsSink, B: MetricsSink> MetricsSink for Tee<A, B> {
    fn increment(&self, name: &str, delta: u64) {
        self.0.increment(name, delta);
        self.1.increment(name, delta);
    }

    fn set_gauge(&self, name: &str, value: i64) {
        self.0.set_gauge(name, value);
        self.1.set_gauge(name, value);
    }
}

impl<T: MetricsSink> MetricsSink for std::sync::Arc<T> {
    fn increment(&self, name: &str, delta: u64) {
        self.as_ref().increment(name, delta)
    }

    fn set_gauge(&self, name: &str, value: i64) {
        self.as_ref().set_gauge(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records() {
        let sink = MemorySink::default();
        sink.increment(SUPERSTEPS_TOTAL, 2);
        sink.increment(SUPERSTEPS_TOTAL, 1);
        sink.set_gauge(ACTIVE_WORKERS, 3);
        sink.set_gauge(ACTIVE_WORKERS, 1);
        assert_eq!(sink.counter(SUPERSTEPS_TOTAL), 3);
        assert_eq!(sink.counter(JOBS_TOTAL), 0);
        assert_eq!(sink.gauge(ACTIVE_WORKERS), Some(1));
        assert_eq!(sink.gauge(ACTIVE_JOBS), None);
    }

    #[test]
    fn prometheus_sink_ignores_unknown_names() {
        let sink = PrometheusSink;
        let before = PREGEL_JOBS_TOTAL.get();
        sink.increment("no_such_metric", 1);
        sink.set_gauge("no_such_gauge", 1);
        sink.increment(JOBS_TOTAL, 1);
        assert!(PREGEL_JOBS_TOTAL.get() > before);
    }
}
