// File: config.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::errors::{ScanError, ScanResult};
use crate::probe::ProbeKind;
use reqwest::header::{HeaderName, HeaderValue};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MAX_CONCURRENCY: usize = 200;
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigParameter {
    concurrency: usize,
    rate_limit: u32,
    burst: Option<u32>,
    timeout: Duration,
    retries: u32,
    backoff_initial: Duration,
    proxy: Option<String>,
    headers: Vec<(String, String)>,
    cookies: Option<String>,
    user_agent: String,
    resume_from: Option<PathBuf>,
    checkpoint_path: Option<PathBuf>,
    checkpoint_interval: usize,
    scan_kinds: Vec<ProbeKind>,
    max_redirects: usize,
    pool_max_idle_per_host: Option<usize>,
    pool_idle_timeout: Duration,
    max_body_bytes: usize,
    soft404: bool,
    soft404_tolerance: u64,
    sqli_time_threshold: Duration,
    sqli_delay_secs: u64,
    sqli_boolean_size_delta: u64,
    max_scan_time: Option<Duration>,
}

impl Default for ConfigParameter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigParameter {
    pub fn new() -> Self {
        Self {
            concurrency: 50,
            rate_limit: 100,
            burst: None,
            timeout: Duration::from_secs(10),
            retries: 2,
            backoff_initial: Duration::from_millis(250),
            proxy: None,
            headers: Vec::new(),
            cookies: None,
            user_agent: format!("rsweep/{}", env!("CARGO_PKG_VERSION")),
            resume_from: None,
            checkpoint_path: None,
            checkpoint_interval: 100,
            scan_kinds: ProbeKind::all().to_vec(),
            max_redirects: 3,
            pool_max_idle_per_host: None,
            pool_idle_timeout: Duration::from_secs(30),
            max_body_bytes: 64 * 1024,
            soft404: true,
            soft404_tolerance: 32,
            sqli_time_threshold: Duration::from_secs(2),
            sqli_delay_secs: 5,
            sqli_boolean_size_delta: 100,
            max_scan_time: None,
        }
    }

    /// Rejects configurations the engine cannot run with.
    pub fn validate(&self) -> ScanResult<()> {
        if self.concurrency == 0 {
            return Err(ScanError::Validation(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.rate_limit == 0 {
            return Err(ScanError::Validation(
                "rate limit must be at least 1 request per second".to_string(),
            ));
        }
        if self.burst == Some(0) {
            return Err(ScanError::Validation("burst must be at least 1".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(ScanError::Validation(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if self.checkpoint_interval == 0 {
            return Err(ScanError::Validation(
                "checkpoint interval must be at least 1".to_string(),
            ));
        }
        if self.scan_kinds.is_empty() {
            return Err(ScanError::Validation(
                "at least one scan kind must be enabled".to_string(),
            ));
        }
        if let Some(proxy) = &self.proxy {
            reqwest::Proxy::all(proxy.as_str()).map_err(|e| {
                ScanError::Validation(format!("invalid proxy '{}': {}", proxy, e))
            })?;
        }
        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ScanError::Validation(format!("invalid header name '{}'", name))
            })?;
            HeaderValue::from_str(value).map_err(|_| {
                ScanError::Validation(format!("invalid value for header '{}'", name))
            })?;
        }
        if let Some(cookies) = &self.cookies {
            HeaderValue::from_str(cookies)
                .map_err(|_| ScanError::Validation("invalid cookie string".to_string()))?;
        }
        Ok(())
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Values above `MAX_CONCURRENCY` are clamped.
    pub fn set_concurrency(&mut self, concurrency: usize) {
        self.concurrency = concurrency.min(MAX_CONCURRENCY);
    }

    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    pub fn set_rate_limit(&mut self, rate_limit: u32) {
        self.rate_limit = rate_limit;
    }

    /// Bucket capacity; defaults to one second worth of requests.
    pub fn burst(&self) -> u32 {
        self.burst.unwrap_or(self.rate_limit)
    }

    pub fn set_burst(&mut self, burst: Option<u32>) {
        self.burst = burst;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Values above `MAX_RETRIES` are clamped.
    pub fn set_retries(&mut self, retries: u32) {
        self.retries = retries.min(MAX_RETRIES);
    }

    pub fn backoff_initial(&self) -> Duration {
        self.backoff_initial
    }

    pub fn set_backoff_initial(&mut self, backoff_initial: Duration) {
        self.backoff_initial = backoff_initial;
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    pub fn set_proxy(&mut self, proxy: Option<String>) {
        self.proxy = proxy;
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn set_headers(&mut self, headers: Vec<(String, String)>) {
        self.headers = headers;
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    pub fn cookies(&self) -> Option<&str> {
        self.cookies.as_deref()
    }

    pub fn set_cookies(&mut self, cookies: Option<String>) {
        self.cookies = cookies;
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        self.user_agent = user_agent.into();
    }

    pub fn resume_from(&self) -> Option<&Path> {
        self.resume_from.as_deref()
    }

    pub fn set_resume_from(&mut self, resume_from: Option<PathBuf>) {
        self.resume_from = resume_from;
    }

    /// Where checkpoints are written. Falls back to the resume file so a
    /// resumed scan keeps extending the same checkpoint.
    pub fn checkpoint_path(&self) -> Option<&Path> {
        self.checkpoint_path
            .as_deref()
            .or(self.resume_from.as_deref())
    }

    pub fn set_checkpoint_path(&mut self, checkpoint_path: Option<PathBuf>) {
        self.checkpoint_path = checkpoint_path;
    }

    pub fn checkpoint_interval(&self) -> usize {
        self.checkpoint_interval
    }

    pub fn set_checkpoint_interval(&mut self, checkpoint_interval: usize) {
        self.checkpoint_interval = checkpoint_interval;
    }

    pub fn scan_kinds(&self) -> &[ProbeKind] {
        &self.scan_kinds
    }

    pub fn set_scan_kinds(&mut self, scan_kinds: Vec<ProbeKind>) {
        let mut kinds = scan_kinds;
        kinds.sort();
        kinds.dedup();
        self.scan_kinds = kinds;
    }

    pub fn scans(&self, kind: ProbeKind) -> bool {
        self.scan_kinds.contains(&kind)
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    pub fn set_max_redirects(&mut self, max_redirects: usize) {
        self.max_redirects = max_redirects;
    }

    pub fn pool_max_idle_per_host(&self) -> usize {
        self.pool_max_idle_per_host.unwrap_or(self.concurrency)
    }

    pub fn set_pool_max_idle_per_host(&mut self, pool_max_idle_per_host: Option<usize>) {
        self.pool_max_idle_per_host = pool_max_idle_per_host;
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        self.pool_idle_timeout
    }

    pub fn set_pool_idle_timeout(&mut self, pool_idle_timeout: Duration) {
        self.pool_idle_timeout = pool_idle_timeout;
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn set_max_body_bytes(&mut self, max_body_bytes: usize) {
        self.max_body_bytes = max_body_bytes;
    }

    pub fn soft404(&self) -> bool {
        self.soft404
    }

    pub fn set_soft404(&mut self, soft404: bool) {
        self.soft404 = soft404;
    }

    pub fn soft404_tolerance(&self) -> u64 {
        self.soft404_tolerance
    }

    pub fn set_soft404_tolerance(&mut self, soft404_tolerance: u64) {
        self.soft404_tolerance = soft404_tolerance;
    }

    pub fn sqli_time_threshold(&self) -> Duration {
        self.sqli_time_threshold
    }

    pub fn set_sqli_time_threshold(&mut self, sqli_time_threshold: Duration) {
        self.sqli_time_threshold = sqli_time_threshold;
    }

    pub fn sqli_delay_secs(&self) -> u64 {
        self.sqli_delay_secs
    }

    pub fn set_sqli_delay_secs(&mut self, sqli_delay_secs: u64) {
        self.sqli_delay_secs = sqli_delay_secs;
    }

    pub fn sqli_boolean_size_delta(&self) -> u64 {
        self.sqli_boolean_size_delta
    }

    pub fn set_sqli_boolean_size_delta(&mut self, sqli_boolean_size_delta: u64) {
        self.sqli_boolean_size_delta = sqli_boolean_size_delta;
    }

    pub fn max_scan_time(&self) -> Option<Duration> {
        self.max_scan_time
    }

    pub fn set_max_scan_time(&mut self, max_scan_time: Option<Duration>) {
        self.max_scan_time = max_scan_time;
    }
}
