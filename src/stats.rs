// File: stats.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2022-2025
// - Volker Schwaberow <volker@schwaberow.de>

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Live scan counters, shared between workers and the progress display.
#[derive(Debug, Default)]
pub struct ScanStats {
    requests: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    retries: AtomicU64,
    findings: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Counts one outstanding request until dropped.
#[derive(Debug)]
pub struct FlightGuard {
    stats: Arc<ScanStats>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScanStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enter_flight(self: &Arc<Self>) -> FlightGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.requests.fetch_add(1, Ordering::Relaxed);
        FlightGuard {
            stats: Arc::clone(self),
        }
    }

    pub fn add_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_finding(&self) {
        self.findings.fetch_add(1, Ordering::Relaxed);
    }

    /// HTTP exchanges issued, control requests and retries included.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Probes that reached a terminal state during this run.
    pub fn completed(&self) -> u64 {
        self.succeeded() + self.failed() + self.skipped()
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn findings(&self) -> u64 {
        self.findings.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}
