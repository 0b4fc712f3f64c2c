// File: source.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::probe::{InjectionPoint, ProbeId, ProbeKind, ProbeSpec, SqliTechnique};
use std::collections::HashSet;
use std::sync::Arc;

type SpecIter = Box<dyn Iterator<Item = ProbeSpec> + Send>;

/// Lazy, deduplicating stream of probe specifications. The engine pulls from
/// it only when it has room for another in-flight probe.
pub struct ProbeSource {
    inner: SpecIter,
    seen: HashSet<ProbeId>,
    kinds: Vec<ProbeKind>,
    planned: Option<usize>,
}

impl ProbeSource {
    pub fn from_specs<I>(specs: I) -> Self
    where
        I: IntoIterator<Item = ProbeSpec>,
        I::IntoIter: Send + 'static,
    {
        Self {
            inner: Box::new(specs.into_iter()),
            seen: HashSet::new(),
            kinds: ProbeKind::all().to_vec(),
            planned: None,
        }
    }

    pub fn empty() -> Self {
        Self::from_specs(Vec::new())
    }

    /// Only yield specs of the given kinds.
    pub fn with_kinds(mut self, kinds: &[ProbeKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    pub fn with_planned(mut self, planned: usize) -> Self {
        self.planned = Some(planned);
        self
    }

    /// Upper bound on the number of specs this source will yield, if known.
    pub fn planned(&self) -> Option<usize> {
        self.planned
    }
}

impl Iterator for ProbeSource {
    type Item = ProbeSpec;

    fn next(&mut self) -> Option<ProbeSpec> {
        loop {
            let spec = self.inner.next()?;
            if !self.kinds.contains(&spec.kind()) {
                continue;
            }
            if self.seen.insert(spec.id()) {
                return Some(spec);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceBuilder {
    paths: Vec<String>,
    injection_paths: Vec<String>,
    points: Vec<InjectionPoint>,
    form_targets: Vec<(String, InjectionPoint)>,
    dom_sink_pages: Vec<String>,
    xss_payloads: Vec<String>,
    sqli_error_payloads: Vec<String>,
    sqli_boolean_pairs: Vec<(String, String)>,
    sqli_time_payloads: Vec<String>,
    sqli_delay_secs: u64,
    kinds: Vec<ProbeKind>,
}

impl SourceBuilder {
    pub fn new(kinds: &[ProbeKind]) -> Self {
        Self {
            kinds: kinds.to_vec(),
            ..Default::default()
        }
    }

    pub fn paths(mut self, paths: Vec<String>) -> Self {
        self.paths = paths;
        self
    }

    pub fn injection_paths(mut self, paths: Vec<String>) -> Self {
        self.injection_paths = paths;
        self
    }

    pub fn points(mut self, points: Vec<InjectionPoint>) -> Self {
        self.points = points;
        self
    }

    /// Injection points tied to one path each, such as fields of forms found
    /// on scanned pages.
    pub fn form_targets(mut self, targets: Vec<(String, InjectionPoint)>) -> Self {
        self.form_targets = targets;
        self
    }

    /// Pages to check for DOM XSS sinks when XSS is enabled.
    pub fn dom_sink_pages(mut self, pages: Vec<String>) -> Self {
        self.dom_sink_pages = pages;
        self
    }

    pub fn xss_payloads(mut self, payloads: Vec<String>) -> Self {
        self.xss_payloads = payloads;
        self
    }

    pub fn sqli_error_payloads(mut self, payloads: Vec<String>) -> Self {
        self.sqli_error_payloads = payloads;
        self
    }

    pub fn sqli_boolean_pairs(mut self, pairs: Vec<(String, String)>) -> Self {
        self.sqli_boolean_pairs = pairs;
        self
    }

    pub fn sqli_time_payloads(mut self, payloads: Vec<String>, delay_secs: u64) -> Self {
        self.sqli_time_payloads = payloads;
        self.sqli_delay_secs = delay_secs;
        self
    }

    fn enabled(&self, kind: ProbeKind) -> bool {
        self.kinds.contains(&kind)
    }

    fn planned(&self) -> usize {
        let mut planned = 0;
        if self.enabled(ProbeKind::Discovery) {
            planned += self.paths.len();
        }
        let targets = self.injection_paths.len() * self.points.len() + self.form_targets.len();
        if self.enabled(ProbeKind::Xss) {
            planned += targets * self.xss_payloads.len() + self.dom_sink_pages.len();
        }
        if self.enabled(ProbeKind::Sqli) {
            planned += targets
                * (self.sqli_error_payloads.len()
                    + self.sqli_boolean_pairs.len()
                    + self.sqli_time_payloads.len());
        }
        planned
    }

    pub fn build(mut self) -> ProbeSource {
        let planned = self.planned();
        let mut chains: Vec<SpecIter> = Vec::new();

        if self.enabled(ProbeKind::Discovery) {
            let paths = std::mem::take(&mut self.paths);
            chains.push(Box::new(paths.into_iter().map(ProbeSpec::discovery)));
        }

        let mut crossed: Vec<(String, InjectionPoint)> = self
            .injection_paths
            .iter()
            .flat_map(|path| {
                self.points
                    .iter()
                    .map(move |point| (path.clone(), point.clone()))
            })
            .collect();
        crossed.append(&mut self.form_targets);
        let targets = Arc::new(crossed);

        if self.enabled(ProbeKind::Xss) {
            let pages = std::mem::take(&mut self.dom_sink_pages);
            chains.push(Box::new(pages.into_iter().map(ProbeSpec::dom_sinks)));

            let payloads = Arc::new(std::mem::take(&mut self.xss_payloads));
            chains.push(injections(targets.clone(), payloads, |path, point, payload| {
                ProbeSpec::xss(path, point, payload)
            }));
        }

        if self.enabled(ProbeKind::Sqli) {
            let errors = Arc::new(std::mem::take(&mut self.sqli_error_payloads));
            chains.push(injections(targets.clone(), errors, |path, point, payload| {
                ProbeSpec::sqli(path, point, payload, SqliTechnique::ErrorBased)
            }));

            let pairs = Arc::new(std::mem::take(&mut self.sqli_boolean_pairs));
            chains.push(injections(targets.clone(), pairs, |path, point, (truthy, falsy)| {
                ProbeSpec::sqli(
                    path,
                    point,
                    truthy,
                    SqliTechnique::BooleanBased {
                        false_payload: falsy,
                    },
                )
            }));

            let delay_secs = self.sqli_delay_secs;
            let delays = Arc::new(std::mem::take(&mut self.sqli_time_payloads));
            chains.push(injections(targets, delays, move |path, point, payload| {
                ProbeSpec::sqli(path, point, payload, SqliTechnique::TimeBased { delay_secs })
            }));
        }

        ProbeSource::from_specs(chains.into_iter().flatten())
            .with_kinds(&self.kinds)
            .with_planned(planned)
    }
}

fn injections<P, F>(targets: Arc<Vec<(String, InjectionPoint)>>, payloads: Arc<Vec<P>>, make: F) -> SpecIter
where
    P: Clone + Send + Sync + 'static,
    F: Fn(String, InjectionPoint, P) -> ProbeSpec + Clone + Send + 'static,
{
    let count = targets.len();
    Box::new((0..count).flat_map(move |i| {
        let (path, point) = targets[i].clone();
        let payloads = payloads.clone();
        let make = make.clone();
        (0..payloads.len()).map(move |j| make(path.clone(), point.clone(), payloads[j].clone()))
    }))
}
