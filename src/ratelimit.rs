// File: ratelimit.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::errors::{ScanError, ScanResult};
use crate::signal::{CancelSignal, Cancelled};
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Proof that one request may be dispatched.
#[derive(Debug)]
#[must_use]
pub struct Permit {
    _private: (),
}

/// Process-wide token bucket shared by every worker.
///
/// Waiters queue on a FIFO mutex before touching the bucket, so permits are
/// handed out in arrival order and nobody starves behind later callers.
#[derive(Debug, Clone)]
pub struct ScanRateLimiter {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    queue: Arc<Mutex<()>>,
}

impl ScanRateLimiter {
    pub fn new(rate_per_second: u32, burst: u32) -> ScanResult<Self> {
        let rate = NonZeroU32::new(rate_per_second)
            .ok_or_else(|| ScanError::Validation("rate limit must be at least 1".to_string()))?;
        let burst = NonZeroU32::new(burst)
            .ok_or_else(|| ScanError::Validation("burst must be at least 1".to_string()))?;
        let quota = Quota::per_second(rate).allow_burst(burst);
        Ok(Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            queue: Arc::new(Mutex::new(())),
        })
    }

    /// Waits for a token. Returns `Cancelled` instead if the scan is cancelled
    /// first; a cancelled caller never consumes a token.
    pub async fn acquire(&self, cancel: &CancelSignal) -> Result<Permit, Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Cancelled),
            _ = self.wait_turn() => Ok(Permit { _private: () }),
        }
    }

    /// Waits for a token even if the scan is cancelled meanwhile. Used for
    /// the second request of a pair whose first request already went out.
    pub async fn acquire_committed(&self) -> Permit {
        self.wait_turn().await;
        Permit { _private: () }
    }

    async fn wait_turn(&self) {
        let _turn = self.queue.lock().await;
        self.limiter.until_ready().await;
    }
}
