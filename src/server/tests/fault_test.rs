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

mod helper;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use helper::algorithms::Isolation;
use helper::init::setup_panic_hook;
use helper::transport::{Fault, Faulty, LoseFirstResponse};
use helper::*;
use log::info;
use pregel_rock::fn_name;
use pregel_runtime::time::sleep;
use pregel_server::algorithm::{Algorithm, PageRank};
use pregel_server::metrics::MemorySink;
use pregel_server::transport::Transport;
use pregel_server::{ConductorState, Error, LocalJob, PregelConfig};
use serde_json::{json, Value};

#[ctor::ctor]
fn init() {
    setup_panic_hook();
    tracing_subscriber::fmt::init();
}

fn faulty_config(attempts: usize, timeout_ms: u64) -> PregelConfig {
    PregelConfig {
        barrier_retry_attempts: attempts,
        barrier_timeout_ms: timeout_ms,
        message_batch_size: 4,
        ..config(2)
    }
}

fn failure(state: ConductorState) -> String {
    match state {
        ConductorState::Failed(msg) => msg,
        state => panic!("job is {state:?}, not failed"),
    }
}

#[pregel_macro::test]
async fn lost_responses_are_retried_without_duplicates() {
    info!("run {}", fn_name!());

    let graph = graph(&["v"], &["e"]);
    let algorithm = Isolation { rounds: 3 };
    let clean = run_job(algorithm, graph.clone(), store(chain(40, true)), config(2)).await;
    clean.report.unwrap();

    let metrics = Arc::new(MemorySink::default());
    let lossy = Arc::new(Mutex::new(None));
    let slot = lossy.clone();
    let job = LocalJob::with_transport(
        1,
        Isolation { rounds: 3 },
        graph,
        store(chain(40, true)),
        faulty_config(3, 5_000),
        metrics.clone(),
        move |local| -> Arc<dyn Transport> {
            let transport = LoseFirstResponse::new(local);
            *slot.lock().unwrap() = Some(transport.clone());
            transport
        },
    );
    let outcome = run_local_job(job, metrics).await;
    let report = outcome.report.unwrap();
    assert_eq!(report.supersteps, 4);
    assert_eq!(outcome.results, clean.results);
    for result in &outcome.results {
        assert_eq!(result.result, json!({ "received": [0, 2, 2, 2] }), "{}", result.handle);
    }

    let transport = lossy.lock().unwrap().take().unwrap();
    assert!(transport.lost.load(Ordering::SeqCst) > 0);
}

#[pregel_macro::test]
async fn refused_worker_fails_after_retries() {
    info!("run {}", fn_name!());

    let metrics = Arc::new(MemorySink::default());
    let job = LocalJob::with_transport(
        1,
        Isolation { rounds: 3 },
        graph(&["v"], &["e"]),
        store(chain(40, true)),
        faulty_config(2, 1_000),
        metrics.clone(),
        |local| -> Arc<dyn Transport> { Faulty::new(local, 2, Fault::Refuse, 3) },
    );
    let outcome = run_local_job(job, metrics).await;
    match outcome.report.unwrap_err() {
        Error::BarrierTimeout { worker, attempts, .. } => {
            assert_eq!(worker, 2);
            assert_eq!(attempts, 2);
        }
        err => panic!("unexpected error {err:?}"),
    }
    let msg = failure(outcome.handle.state());
    assert!(msg.contains("worker 2 does not answer"), "{msg}");
    assert!(outcome.handle.report().is_none());
}

#[pregel_macro::test]
async fn hanging_worker_hits_barrier_timeout() {
    info!("run {}", fn_name!());

    let metrics = Arc::new(MemorySink::default());
    let job = LocalJob::with_transport(
        1,
        Isolation { rounds: 3 },
        graph(&["v"], &["e"]),
        store(chain(40, true)),
        faulty_config(2, 100),
        metrics.clone(),
        |local| -> Arc<dyn Transport> { Faulty::new(local, 2, Fault::Hang, 2) },
    );
    let outcome = run_local_job(job, metrics).await;
    let err = outcome.report.unwrap_err();
    assert!(matches!(err, Error::BarrierTimeout { .. }), "{err:?}");
    let msg = failure(outcome.handle.state());
    assert!(msg.contains("does not answer"), "{msg}");
}

#[pregel_macro::test]
async fn killed_worker_fails_the_job() {
    info!("run {}", fn_name!());

    let pagerank = PageRank::from_params(&json!({ "threshold": 0.0 })).unwrap();
    let cfg = PregelConfig { max_global_superstep: u64::MAX, ..config(2) };
    let metrics = Arc::new(MemorySink::default());
    let graph = graph(&["v"], &["e"]);
    let job = LocalJob::new(1, pagerank, graph, store(chain(20, true)), cfg, metrics);
    let handle = job.handle();
    let killer = async {
        while !matches!(handle.state(), ConductorState::Running(n) if n >= 2) {
            sleep(Duration::from_millis(1)).await;
        }
        job.kill_worker(2);
    };
    let (report, _) = futures::join!(job.run(), killer);
    assert!(matches!(report, Err(Error::WorkerNotFound(2))), "{report:?}");
    assert!(matches!(handle.state(), ConductorState::Failed(_)));
}

#[pregel_macro::test]
async fn canceled_job_stops_at_barrier() {
    info!("run {}", fn_name!());

    let pagerank = PageRank::from_params(&Value::Null).unwrap();
    let job = LocalJob::new(
        1,
        pagerank,
        graph(&["v"], &["e"]),
        store(chain(4, true)),
        config(2),
        Arc::new(MemorySink::default()),
    );
    let handle = job.handle();
    handle.cancel();
    assert!(matches!(job.run().await, Err(Error::Canceled)));
    assert_eq!(handle.state(), ConductorState::Canceled);
}
