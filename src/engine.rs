// File: engine.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::classify::{self, Baseline, ClassifyContext};
use crate::config::ConfigParameter;
use crate::errors::{ScanError, ScanResult, TransportErrorKind};
use crate::http::HttpClient;
use crate::probe::{Finding, ProbeId, ProbeKind, ProbeResult, ProbeSpec};
use crate::ratelimit::ScanRateLimiter;
use crate::signal::CancelSignal;
use crate::source::ProbeSource;
use crate::state::{AttemptOutcome, CheckpointStore, ScanState};
use crate::stats::ScanStats;
use crate::target::{ProbeRequest, Target};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use log::{debug, error, info, warn};
use rand::Rng;
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

/// Ceiling for a single retry delay, before jitter.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Lifecycle of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Pending,
    Dispatched,
    Retrying,
    Succeeded,
    FailedExhausted,
    Skipped,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    Succeeded(Option<Finding>),
    FailedExhausted {
        kind: TransportErrorKind,
        message: String,
    },
    Skipped {
        reason: String,
    },
    /// Interrupted before reaching a terminal state; not recorded.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub spec: ProbeSpec,
    pub terminal: Terminal,
    pub attempts: u32,
    pub transitions: Vec<ProbeState>,
}

impl ProbeOutcome {
    fn finish(spec: ProbeSpec, terminal: Terminal, attempts: u32, mut transitions: Vec<ProbeState>) -> Self {
        transitions.push(match terminal {
            Terminal::Succeeded(_) => ProbeState::Succeeded,
            Terminal::FailedExhausted { .. } => ProbeState::FailedExhausted,
            Terminal::Skipped { .. } => ProbeState::Skipped,
            Terminal::Cancelled => ProbeState::Cancelled,
        });
        Self {
            spec,
            terminal,
            attempts,
            transitions,
        }
    }
}

/// Everything one probe needs, shared read-only across workers.
#[derive(Debug, Clone)]
pub struct ProbeWorker {
    target: Arc<Target>,
    client: HttpClient,
    limiter: ScanRateLimiter,
    cancel: CancelSignal,
    stats: Arc<ScanStats>,
    context: Arc<ClassifyContext>,
    retries: u32,
    backoff_initial: Duration,
}

/// Exponential delay before retry number `attempt`, capped at `MAX_BACKOFF`
/// and jittered by ±20%.
fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    let base = initial
        .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        .min(MAX_BACKOFF);
    let jitter = rand::thread_rng().gen_range(0.8..=1.2);
    base.mul_f64(jitter)
}

impl ProbeWorker {

    /// One rate-limited exchange, counted as in flight while it runs.
    async fn exchange(&self, request: &ProbeRequest) -> Option<ProbeResult> {
        let _permit = self.limiter.acquire(&self.cancel).await.ok()?;
        let _flight = self.stats.enter_flight();
        Some(self.client.execute(request).await)
    }

    /// Like `exchange`, but not interrupted by cancellation: the probe's
    /// first request is already out, so the attempt has to finish.
    async fn committed_exchange(&self, request: &ProbeRequest) -> ProbeResult {
        let _permit = self.limiter.acquire_committed().await;
        let _flight = self.stats.enter_flight();
        self.client.execute(request).await
    }

    /// Drives `spec` from `Pending` to a terminal state.
    pub async fn run(&self, spec: ProbeSpec) -> ProbeOutcome {
        let mut transitions = vec![ProbeState::Pending];

        let built = self
            .target
            .request_for(&spec)
            .and_then(|request| Ok((request, self.target.control_request_for(&spec)?)));
        let (request, control) = match built {
            Ok(built) => built,
            Err(e) => {
                let reason = e.to_string();
                return ProbeOutcome::finish(spec, Terminal::Skipped { reason }, 0, transitions);
            }
        };

        let mut attempt = 0;
        let mut last_failure: Option<(TransportErrorKind, String)> = None;
        loop {
            let Some(mut result) = self.exchange(&request).await else {
                // Once a request for this identity went out, the last failure stands.
                let terminal = match last_failure {
                    Some((kind, message)) => Terminal::FailedExhausted { kind, message },
                    None => Terminal::Cancelled,
                };
                return ProbeOutcome::finish(spec, terminal, attempt, transitions);
            };
            attempt += 1;
            transitions.push(ProbeState::Dispatched);

            if let (true, Some(control)) = (result.success(), control.as_ref()) {
                let control_result = self.committed_exchange(control).await;
                match control_result.error() {
                    None => result.set_control(control_result.sample()),
                    Some(_) => result = control_result,
                }
            }

            let (kind, message) = match result.error() {
                None => {
                    let finding = self.classify(&spec, &result);
                    return ProbeOutcome::finish(
                        spec,
                        Terminal::Succeeded(finding),
                        attempt,
                        transitions,
                    );
                }
                Some((kind, message)) => (kind, message.to_string()),
            };

            if !kind.is_retryable() || attempt > self.retries {
                return ProbeOutcome::finish(
                    spec,
                    Terminal::FailedExhausted { kind, message },
                    attempt,
                    transitions,
                );
            }

            transitions.push(ProbeState::Retrying);
            self.stats.add_retry();
            let delay = backoff_delay(self.backoff_initial, attempt);
            debug!(
                "{} failed ({}), retry {}/{} in {:?}",
                spec.id(),
                kind,
                attempt,
                self.retries,
                delay
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => {
                    return ProbeOutcome::finish(
                        spec,
                        Terminal::FailedExhausted { kind, message },
                        attempt,
                        transitions,
                    );
                }
            }
            last_failure = Some((kind, message));
        }
    }

    fn classify(&self, spec: &ProbeSpec, result: &ProbeResult) -> Option<Finding> {
        match classify::classify(spec, result, &self.context) {
            Ok(verdict) => {
                verdict.map(|verdict| Finding::new(spec.clone(), result.url().to_string(), verdict))
            }
            Err(e) => {
                warn!("Classifier failed for {}: {}", spec.id(), e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub cancelled: bool,
    pub elapsed: Duration,
    /// Probes that reached a terminal state in this run.
    pub completed: usize,
    /// Specs skipped because an earlier run already attempted them.
    pub resumed: usize,
    pub findings: usize,
    pub checkpoint_saved: bool,
}

/// The dispatcher. Owns the scan state and is its only writer.
pub struct Engine {
    target: Arc<Target>,
    config: ConfigParameter,
    client: HttpClient,
    limiter: ScanRateLimiter,
    cancel: CancelSignal,
    stats: Arc<ScanStats>,
    state: ScanState,
    store: Option<CheckpointStore>,
    context: Option<Arc<ClassifyContext>>,
    started: Option<Instant>,
    progress: bool,
}

impl Engine {
    /// Validates the configuration and, when resuming, loads the checkpoint.
    /// Any failure here is fatal.
    pub fn new(target: Target, config: ConfigParameter) -> ScanResult<Self> {
        config.validate()?;

        let mut headers = target.headers().to_vec();
        headers.extend(config.headers().iter().cloned());
        let cookies = target
            .cookies()
            .or(config.cookies())
            .map(|c| c.to_string());
        let target = target.with_headers(headers).with_cookies(cookies);

        let client = HttpClient::new(&config, &target)?;
        let limiter = ScanRateLimiter::new(config.rate_limit(), config.burst())?;

        let fingerprint = target.fingerprint();
        let state = match config.resume_from() {
            Some(path) => {
                let state = CheckpointStore::new(path).load(&fingerprint)?;
                info!(
                    "Resuming from {}: {} probes already attempted, {} findings",
                    path.display(),
                    state.attempted().len(),
                    state.findings().len()
                );
                state
            }
            None => ScanState::new(fingerprint),
        };
        let store = config.checkpoint_path().map(CheckpointStore::new);

        Ok(Self {
            target: Arc::new(target),
            config,
            client,
            limiter,
            cancel: CancelSignal::new(),
            stats: ScanStats::new(),
            state,
            store,
            context: None,
            started: None,
            progress: false,
        })
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn config(&self) -> &ConfigParameter {
        &self.config
    }

    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    pub fn stats(&self) -> Arc<ScanStats> {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn into_state(self) -> ScanState {
        self.state
    }

    pub fn worker(&self, context: ClassifyContext) -> ProbeWorker {
        ProbeWorker {
            target: Arc::clone(&self.target),
            client: self.client.clone(),
            limiter: self.limiter.clone(),
            cancel: self.cancel.clone(),
            stats: Arc::clone(&self.stats),
            context: Arc::new(context),
            retries: self.config.retries(),
            backoff_initial: self.config.backoff_initial(),
        }
    }

    /// Baselines taken once per engine: the soft-404 response and the
    /// latency of the unmodified page.
    pub async fn calibrate(&mut self) -> Arc<ClassifyContext> {
        if let Some(context) = &self.context {
            return Arc::clone(context);
        }
        let mut context = ClassifyContext::from_config(&self.config);

        if self.config.soft404() && self.config.scans(ProbeKind::Discovery) {
            let marker: u64 = rand::thread_rng().gen();
            let path = format!("__nonexistent__{:016x}", marker);
            if let Some(result) = self.baseline_exchange(&path, false).await {
                if result.success() {
                    info!(
                        "Soft-404 baseline: status {}, {} bytes",
                        result.status(),
                        result.size()
                    );
                    context.soft404 = Some(Baseline {
                        status: result.status(),
                        size: result.size(),
                    });
                } else {
                    warn!("Soft-404 baseline request failed, soft-404 detection disabled");
                }
            }
        }

        if self.config.scans(ProbeKind::Sqli) {
            if let Some(result) = self.baseline_exchange("", true).await {
                if result.success() {
                    debug!("Latency baseline: {:?}", result.latency());
                    context.baseline_latency = result.latency();
                }
            }
        }

        let context = Arc::new(context);
        self.context = Some(Arc::clone(&context));
        context
    }

    /// One rate-limited GET of a page, outside of any probe. The target page
    /// (`""`) is fetched with its original query string.
    pub async fn fetch_page(&self, path: &str) -> Option<ProbeResult> {
        self.baseline_exchange(path, path.trim_start_matches('/').is_empty())
            .await
    }

    async fn baseline_exchange(&self, path: &str, with_query: bool) -> Option<ProbeResult> {
        let mut url = match self.target.url_for(path) {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot build baseline request: {}", e);
                return None;
            }
        };
        if with_query && !self.target.query().is_empty() {
            url.query_pairs_mut().extend_pairs(self.target.query().iter());
        }
        let _permit = self.limiter.acquire(&self.cancel).await.ok()?;
        let _flight = self.stats.enter_flight();
        Some(self.client.execute(&ProbeRequest::get(url)).await)
    }

    fn progress_bar(&self, planned: Option<usize>) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(planned.unwrap_or(0) as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        ) {
            pb.set_style(
                style
                    .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
                        let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                    })
                    .progress_chars("█▉▊▋▌▍▎▏  "),
            );
        }
        pb
    }

    fn flush(&self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        match store.save(&self.state) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to write checkpoint {}: {}",
                    store.path().display(),
                    e
                );
                false
            }
        }
    }

    /// Returns whether the outcome was terminal and therefore recorded.
    fn record(
        &mut self,
        outcome: ProbeOutcome,
        findings: Option<&UnboundedSender<Finding>>,
    ) -> ScanResult<bool> {
        let id = outcome.spec.id();
        match outcome.terminal {
            Terminal::Succeeded(finding) => {
                self.state
                    .record_attempt(id, AttemptOutcome::Succeeded, outcome.attempts)?;
                self.stats.add_success();
                if let Some(finding) = finding {
                    info!(
                        "{} {} at {}",
                        finding.verdict.confidence,
                        finding.verdict.evidence.label(),
                        finding.url
                    );
                    self.state.append_finding(finding.clone())?;
                    self.stats.add_finding();
                    if let Some(tx) = findings {
                        let _ = tx.send(finding);
                    }
                }
            }
            Terminal::FailedExhausted { kind, message } => {
                warn!(
                    "{} failed after {} attempts: {}",
                    id,
                    outcome.attempts,
                    ScanError::transport(kind, message.as_str())
                );
                self.state.record_attempt(
                    id,
                    AttemptOutcome::FailedExhausted { kind, message },
                    outcome.attempts,
                )?;
                self.stats.add_failure();
            }
            Terminal::Skipped { reason } => {
                warn!("Skipping {}: {}", id, reason);
                self.state
                    .record_attempt(id, AttemptOutcome::Skipped { reason }, 0)?;
                self.stats.add_skip();
            }
            Terminal::Cancelled => return Ok(false),
        }
        Ok(true)
    }

    /// Runs every spec `source` yields that has not been attempted yet.
    /// May be called more than once; `max_scan_time` counts from the first call.
    ///
    /// At most `concurrency` probes are outstanding at once and the source is
    /// only pulled when a slot frees up. Findings are sent to `findings` as
    /// they are recorded. On cancellation no new probe is started, the ones
    /// in flight are drained, and the state is flushed before returning.
    pub async fn run(
        &mut self,
        mut source: ProbeSource,
        findings: Option<UnboundedSender<Finding>>,
    ) -> ScanResult<ScanOutcome> {
        let start = Instant::now();
        let first_start = *self.started.get_or_insert(start);
        let deadline = self
            .config
            .max_scan_time()
            .map(|limit| self.cancel.cancel_after(limit.saturating_sub(first_start.elapsed())));

        let context = self.calibrate().await;
        let worker = Arc::new(self.worker((*context).clone()));
        let width = self.config.concurrency();
        let interval = self.config.checkpoint_interval();
        let pb = self.progress_bar(source.planned());

        info!(
            "Scanning {} with {} workers at {} req/s",
            self.target.base_url(),
            width,
            self.config.rate_limit()
        );

        let mut in_flight: HashSet<ProbeId> = HashSet::new();
        let mut tasks = FuturesUnordered::new();
        let mut exhausted = false;
        let mut completed = 0usize;
        let mut resumed = 0usize;
        let mut found = 0usize;
        let mut since_flush = 0usize;

        loop {
            while !exhausted && tasks.len() < width && !self.cancel.is_cancelled() {
                let Some(spec) = source.next() else {
                    exhausted = true;
                    break;
                };
                let id = spec.id();
                if self.state.is_attempted(&id) {
                    resumed += 1;
                    pb.inc(1);
                    continue;
                }
                if !in_flight.insert(id.clone()) {
                    continue;
                }
                let worker = Arc::clone(&worker);
                let handle = tokio::spawn(async move { worker.run(spec).await });
                tasks.push(async move { (id, handle.await) });
            }

            let Some((id, joined)) = tasks.next().await else {
                break;
            };
            in_flight.remove(&id);

            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Worker for {} aborted: {}", id, e);
                    self.state.record_attempt(
                        id,
                        AttemptOutcome::Skipped {
                            reason: format!("worker aborted: {}", e),
                        },
                        0,
                    )?;
                    self.stats.add_skip();
                    continue;
                }
            };

            let had_finding = matches!(outcome.terminal, Terminal::Succeeded(Some(_)));
            if self.record(outcome, findings.as_ref())? {
                completed += 1;
                since_flush += 1;
                if had_finding {
                    found += 1;
                    pb.set_message(format!("{} findings", found));
                }
                pb.inc(1);
            }

            if since_flush >= interval {
                self.flush();
                since_flush = 0;
            }
        }

        let cancelled = self.cancel.is_cancelled();
        if let Some(deadline) = deadline {
            deadline.abort();
        }
        let checkpoint_saved = self.flush();
        pb.finish_and_clear();

        let outcome = ScanOutcome {
            cancelled,
            elapsed: start.elapsed(),
            completed,
            resumed,
            findings: found,
            checkpoint_saved,
        };
        info!(
            "Scan {} after {:.1}s: {} probes completed, {} resumed, {} findings",
            if cancelled { "cancelled" } else { "finished" },
            outcome.elapsed.as_secs_f64(),
            completed,
            resumed,
            found
        );
        debug!(
            "Session totals: {} completed ({} succeeded, {} failed, {} skipped), {} findings, {} requests",
            self.stats.completed(),
            self.stats.succeeded(),
            self.stats.failed(),
            self.stats.skipped(),
            self.stats.findings(),
            self.stats.requests()
        );
        Ok(outcome)
    }
}
