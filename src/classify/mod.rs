// File: mod.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

pub mod discovery;
pub mod sqli;
pub mod xss;

use crate::config::ConfigParameter;
use crate::errors::{ScanError, ScanResult};
use crate::probe::{ProbeResult, ProbeSpec, Verdict};
use std::time::Duration;

/// Status and size of the response to a path that cannot exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Baseline {
    pub status: u16,
    pub size: u64,
}

/// Read-only inputs shared by every classifier for the duration of a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyContext {
    pub soft404: Option<Baseline>,
    pub soft404_tolerance: u64,
    pub baseline_latency: Duration,
    pub sqli_time_threshold: Duration,
    pub sqli_boolean_delta: u64,
}

impl Default for ClassifyContext {
    fn default() -> Self {
        Self {
            soft404: None,
            soft404_tolerance: 32,
            baseline_latency: Duration::ZERO,
            sqli_time_threshold: Duration::from_secs(2),
            sqli_boolean_delta: 100,
        }
    }
}

impl ClassifyContext {
    pub fn from_config(config: &ConfigParameter) -> Self {
        Self {
            soft404: None,
            soft404_tolerance: config.soft404_tolerance(),
            baseline_latency: Duration::ZERO,
            sqli_time_threshold: config.sqli_time_threshold(),
            sqli_boolean_delta: config.sqli_boolean_size_delta(),
        }
    }
}

pub type ClassifierFn = fn(&ProbeSpec, &ProbeResult, &ClassifyContext) -> ScanResult<Option<Verdict>>;

/// Indexed by `ProbeKind::index()`.
const CLASSIFIERS: [ClassifierFn; 3] = [discovery::classify, xss::classify, sqli::classify];

fn classifier_for(spec: &ProbeSpec) -> ClassifierFn {
    CLASSIFIERS[spec.kind().index()]
}

/// Routes a completed exchange to the one classifier matching its kind.
pub fn classify(
    spec: &ProbeSpec,
    result: &ProbeResult,
    context: &ClassifyContext,
) -> ScanResult<Option<Verdict>> {
    if let Some((kind, message)) = result.error() {
        return Err(ScanError::Classifier(format!(
            "cannot classify a failed exchange ({}): {}",
            kind, message
        )));
    }
    classifier_for(spec)(spec, result, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportErrorKind;
    use crate::probe::{Evidence, InjectionPoint, ProbeKind};

    #[test]
    fn test_table_matches_kind_order() {
        for kind in ProbeKind::all() {
            assert_eq!(ProbeKind::all()[kind.index()], *kind);
        }
    }

    #[test]
    fn test_routes_by_kind() {
        let context = ClassifyContext::default();
        let body = "<div><script>alert(1)</script></div>".to_string();
        let result = ProbeResult::new_with_all(
            200,
            body.len() as u64,
            Duration::from_millis(10),
            body,
            "http://example.com/?q=x".into(),
            None,
        );

        let xss = ProbeSpec::xss("", InjectionPoint::Query("q".into()), "<script>alert(1)</script>");
        let verdict = classify(&xss, &result, &context).unwrap().unwrap();
        assert!(matches!(verdict.evidence, Evidence::Xss { .. }));

        let discovery = ProbeSpec::discovery("admin");
        let verdict = classify(&discovery, &result, &context).unwrap().unwrap();
        assert!(matches!(verdict.evidence, Evidence::Discovery { status: 200, .. }));
    }

    #[test]
    fn test_failed_exchange_is_classifier_error() {
        let result = ProbeResult::failure(
            TransportErrorKind::Connect,
            "refused",
            "http://example.com/".into(),
            Duration::ZERO,
        );
        let spec = ProbeSpec::discovery("admin");
        assert!(matches!(
            classify(&spec, &result, &ClassifyContext::default()),
            Err(ScanError::Classifier(_))
        ));
    }
}
