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

use pregel_api::WorkerId;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid config: {0}")]
    Config(String),

    #[error("load {0}")]
    Load(String),

    #[error("route message {0}")]
    Routing(String),

    #[error("invalid pregel id {0}")]
    InvalidId(String),

    #[error("worker {worker} does not answer {request} after {attempts} attempts: {cause}")]
    BarrierTimeout { worker: WorkerId, request: &'static str, attempts: usize, cause: String },

    #[error("algorithm {0}")]
    Algorithm(String),

    #[error("invalid argument {0}")]
    InvalidArgument(String),

    #[error("invalid {0} data")]
    InvalidData(String),

    #[error("worker {0} not found")]
    WorkerNotFound(WorkerId),

    #[error("job {0} not found")]
    JobNotFound(u64),

    #[error("job canceled")]
    Canceled,

    // retryable errors
    #[error("transport {0}")]
    Transport(String),

    #[error("deadline exceeded {0}")]
    DeadlineExceeded(String),

    #[error("io {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<pregel_api::Error> for Error {
    fn from(err: pregel_api::Error) -> Self {
        match err {
            pregel_api::Error::Config(msg) => Error::Config(msg),
            pregel_api::Error::InvalidId(msg) => Error::InvalidId(msg),
            pregel_api::Error::InvalidData(msg) => Error::InvalidData(msg),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(format!("json: {err}"))
    }
}

impl From<pregel_runtime::JoinError> for Error {
    fn from(err: pregel_runtime::JoinError) -> Self {
        if err.is_cancelled() {
            return Error::Canceled;
        }
        let payload = err.into_panic();
        let msg = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_owned()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_owned()
        };
        Error::Algorithm(format!("compute panicked: {msg}"))
    }
}

impl From<futures::channel::oneshot::Canceled> for Error {
    fn from(_: futures::channel::oneshot::Canceled) -> Self {
        Error::Transport("request dropped by remote".into())
    }
}

impl Error {
    /// Whether a failed request could succeed if sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::DeadlineExceeded(_))
    }
}
