// File: config_tests.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

#[cfg(test)]
mod tests {
    use crate::config::{ConfigParameter, MAX_CONCURRENCY, MAX_RETRIES};
    use crate::errors::ScanError;
    use crate::probe::ProbeKind;
    use rstest::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_config_parameter_default() {
        let config = ConfigParameter::default();

        assert_eq!(config.concurrency(), 50);
        assert_eq!(config.rate_limit(), 100);
        assert_eq!(config.burst(), 100);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.retries(), 2);
        assert_eq!(config.backoff_initial(), Duration::from_millis(250));
        assert_eq!(config.proxy(), None);
        assert!(config.headers().is_empty());
        assert_eq!(config.checkpoint_interval(), 100);
        assert_eq!(config.scan_kinds(), ProbeKind::all());
        assert_eq!(config.max_redirects(), 3);
        assert_eq!(config.pool_max_idle_per_host(), 50);
        assert_eq!(config.max_body_bytes(), 64 * 1024);
        assert!(config.soft404());
        assert_eq!(config.soft404_tolerance(), 32);
        assert_eq!(config.sqli_time_threshold(), Duration::from_secs(2));
        assert_eq!(config.sqli_boolean_size_delta(), 100);
        assert_eq!(config.max_scan_time(), None);
        assert!(config.user_agent().starts_with("rsweep/"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConfigParameter::new().validate().is_ok());
    }

    #[rstest]
    #[case(1, 1)]
    #[case(50, 50)]
    #[case(200, 200)]
    #[case(500, MAX_CONCURRENCY)]
    fn test_set_concurrency_clamps(#[case] requested: usize, #[case] expected: usize) {
        let mut config = ConfigParameter::new();
        config.set_concurrency(requested);
        assert_eq!(config.concurrency(), expected);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(3, 3)]
    #[case(1000, MAX_RETRIES)]
    fn test_set_retries_clamps(#[case] requested: u32, #[case] expected: u32) {
        let mut config = ConfigParameter::new();
        config.set_retries(requested);
        assert_eq!(config.retries(), expected);
    }

    #[test]
    fn test_burst_follows_rate_unless_set() {
        let mut config = ConfigParameter::new();
        config.set_rate_limit(20);
        assert_eq!(config.burst(), 20);

        config.set_burst(Some(5));
        assert_eq!(config.burst(), 5);
    }

    #[test]
    fn test_checkpoint_path_falls_back_to_resume_file() {
        let mut config = ConfigParameter::new();
        assert_eq!(config.checkpoint_path(), None);

        config.set_resume_from(Some(PathBuf::from("scan.json")));
        assert_eq!(config.checkpoint_path(), Some(PathBuf::from("scan.json").as_path()));

        config.set_checkpoint_path(Some(PathBuf::from("other.json")));
        assert_eq!(config.checkpoint_path(), Some(PathBuf::from("other.json").as_path()));
    }

    #[test]
    fn test_set_scan_kinds_deduplicates() {
        let mut config = ConfigParameter::new();
        config.set_scan_kinds(vec![ProbeKind::Sqli, ProbeKind::Xss, ProbeKind::Sqli]);
        assert_eq!(config.scan_kinds(), &[ProbeKind::Xss, ProbeKind::Sqli]);
        assert!(config.scans(ProbeKind::Xss));
        assert!(!config.scans(ProbeKind::Discovery));
    }

    #[rstest]
    #[case::zero_concurrency(|c: &mut ConfigParameter| c.set_concurrency(0))]
    #[case::zero_rate(|c: &mut ConfigParameter| c.set_rate_limit(0))]
    #[case::zero_burst(|c: &mut ConfigParameter| c.set_burst(Some(0)))]
    #[case::zero_timeout(|c: &mut ConfigParameter| c.set_timeout(Duration::ZERO))]
    #[case::zero_interval(|c: &mut ConfigParameter| c.set_checkpoint_interval(0))]
    #[case::no_kinds(|c: &mut ConfigParameter| c.set_scan_kinds(Vec::new()))]
    #[case::bad_proxy(|c: &mut ConfigParameter| c.set_proxy(Some("not a proxy".to_string())))]
    #[case::bad_header_name(|c: &mut ConfigParameter| c.add_header("bad header", "x"))]
    #[case::bad_header_value(|c: &mut ConfigParameter| c.add_header("X-Test", "line\nbreak"))]
    fn test_validate_rejects(#[case] mutate: fn(&mut ConfigParameter)) {
        let mut config = ConfigParameter::new();
        mutate(&mut config);
        assert!(matches!(config.validate(), Err(ScanError::Validation(_))));
    }

    #[test]
    fn test_validate_accepts_headers_and_proxy() {
        let mut config = ConfigParameter::new();
        config.add_header("Authorization", "Bearer token");
        config.set_cookies(Some("session=abc".to_string()));
        config.set_proxy(Some("http://127.0.0.1:8080".to_string()));
        assert!(config.validate().is_ok());
    }
}
