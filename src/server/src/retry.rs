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

use crate::{Error, Result};

const MIN_INTERVAL_MS: u64 = 8;
const MAX_INTERVAL_MS: u64 = 3000;

/// Exponential backoff with a bounded number of attempts.
pub struct RetryState {
    interval_ms: u64,
    attempts: usize,
    max_attempts: usize,
}

impl RetryState {
    /// `max_attempts` counts the first attempt as well.
    pub fn new(max_attempts: usize) -> Self {
        RetryState { interval_ms: MIN_INTERVAL_MS, attempts: 1, max_attempts: max_attempts.max(1) }
    }

    /// The number of attempts made so far.
    #[inline]
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Wait before the next attempt, or return `err` if it is not retryable
    /// or the attempts are used up.
    pub async fn retry(&mut self, err: Error) -> Result<()> {
        if !err.is_retryable() || self.is_exhausted() {
            return Err(err);
        }

        crate::metrics::PREGEL_BARRIER_RETRY_TOTAL.inc();
        pregel_runtime::time::sleep(Duration::from_millis(self.interval_ms)).await;
        self.interval_ms = std::cmp::min(self.interval_ms * 2, MAX_INTERVAL_MS);
        self.attempts += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[pregel_macro::test]
    async fn retry_until_exhausted() {
        let mut retry = RetryState::new(3);
        assert!(retry.retry(Error::Transport("reset".into())).await.is_ok());
        assert!(retry.retry(Error::DeadlineExceeded("timeout".into())).await.is_ok());
        assert_eq!(retry.attempts(), 3);
        assert!(retry.is_exhausted());
        let err = retry.retry(Error::Transport("reset".into())).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[pregel_macro::test]
    async fn non_retryable_error() {
        let mut retry = RetryState::new(3);
        let err = retry.retry(Error::Config("bad".into())).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(retry.attempts(), 1);
        assert!(!retry.is_exhausted());
    }
}
