// File: cli.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::{anyhow, Result};
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigParameter;
use crate::probe::ProbeKind;
use crate::reports::ReportFormat;
use crate::wordlist::{ScanMode, Technology};

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[arg(help = "Target URL or host, e.g. https://example.com/app?id=1")]
    pub target: String,

    #[arg(
        short = 'm',
        long = "mode",
        value_enum,
        default_value = "normal",
        help = "Size of the built-in path wordlist"
    )]
    pub mode: ScanMode,

    #[arg(
        short = 'k',
        long = "kinds",
        value_enum,
        value_delimiter = ',',
        default_values_t = vec![ProbeKind::Discovery, ProbeKind::Xss, ProbeKind::Sqli],
        help = "Probe kinds to run"
    )]
    pub kinds: Vec<ProbeKind>,

    #[arg(short = 'W', long = "wordlist", help = "Additional path wordlist file")]
    pub wordlists: Vec<PathBuf>,

    #[arg(
        long = "no-builtin",
        help = "Only use --wordlist files, not the built-in list"
    )]
    pub no_builtin: bool,

    #[arg(long = "tech", value_enum, help = "Append technology-specific paths")]
    pub tech: Vec<Technology>,

    #[arg(long = "param", help = "Query parameter to inject into")]
    pub params: Vec<String>,

    #[arg(long = "form-field", help = "Form field to inject into (POST)")]
    pub form_fields: Vec<String>,

    #[arg(
        long = "inject-path",
        help = "Extra path to run injection probes against"
    )]
    pub inject_paths: Vec<String>,

    #[arg(
        long = "no-forms",
        help = "Do not inject into forms found on scanned pages"
    )]
    pub no_forms: bool,

    #[arg(long = "xss-payloads", help = "File with XSS payloads, one per line")]
    pub xss_payloads: Option<PathBuf>,

    #[arg(
        long = "sqli-payloads",
        help = "File with error-based SQLi payloads, one per line"
    )]
    pub sqli_payloads: Option<PathBuf>,

    #[arg(short = 'c', long = "concurrency", default_value_t = 50)]
    pub concurrency: usize,

    #[arg(
        short = 'r',
        long = "rate-limit",
        default_value_t = 100,
        help = "Requests per second across all workers"
    )]
    pub rate_limit: u32,

    #[arg(long = "burst", help = "Token bucket capacity [default: rate limit]")]
    pub burst: Option<u32>,

    #[arg(
        short = 't',
        long = "timeout",
        default_value_t = 10,
        help = "HTTP request timeout in seconds"
    )]
    pub timeout: u64,

    #[arg(long = "retries", default_value_t = 2)]
    pub retries: u32,

    #[arg(long = "backoff-ms", default_value_t = 250)]
    pub backoff_ms: u64,

    #[arg(long = "proxy", help = "Proxy URL (http, https or socks5)")]
    pub proxy: Option<String>,

    #[arg(short = 'H', long = "header", help = "Extra header, 'Name: value'")]
    pub headers: Vec<String>,

    #[arg(long = "cookie", help = "Cookie header value")]
    pub cookie: Option<String>,

    #[arg(long = "user-agent")]
    pub user_agent: Option<String>,

    #[arg(long = "resume", help = "Resume from a checkpoint file")]
    pub resume: Option<PathBuf>,

    #[arg(long = "checkpoint", help = "Write checkpoints to this file")]
    pub checkpoint: Option<PathBuf>,

    #[arg(long = "checkpoint-interval", default_value_t = 100)]
    pub checkpoint_interval: usize,

    #[arg(long = "max-redirects", default_value_t = 3)]
    pub max_redirects: usize,

    #[arg(long = "max-body-kb", default_value_t = 64)]
    pub max_body_kb: usize,

    #[arg(long = "no-soft404", help = "Disable soft-404 detection")]
    pub no_soft404: bool,

    #[arg(long = "soft404-tolerance", default_value_t = 32)]
    pub soft404_tolerance: u64,

    #[arg(
        long = "sqli-delay",
        default_value_t = 5,
        help = "Delay in seconds requested by time-based payloads"
    )]
    pub sqli_delay: u64,

    #[arg(
        long = "sqli-threshold-ms",
        default_value_t = 2000,
        help = "Latency above baseline that counts as a time-based hit"
    )]
    pub sqli_threshold_ms: u64,

    #[arg(long = "boolean-delta", default_value_t = 100)]
    pub boolean_delta: u64,

    #[arg(long = "max-time", help = "Stop the scan after this many seconds")]
    pub max_time: Option<u64>,

    #[arg(short = 'o', long = "output", help = "Write a report to this file")]
    pub output: Option<PathBuf>,

    #[arg(
        long = "format",
        value_enum,
        help = "Report format [default: from --output extension, else text]"
    )]
    pub format: Option<ReportFormat>,

    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,

    #[arg(short = 'v', long = "verbose", help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short = 'q', long = "quiet", help = "Reduce output verbosity")]
    pub quiet: bool,

    #[arg(long = "no-color", help = "Disable colored output")]
    pub no_color: bool,

    #[arg(long = "no-progress", help = "Hide the progress bar")]
    pub no_progress: bool,
}

impl Cli {
    pub fn log_level(&self) -> Result<LevelFilter> {
        if self.verbose {
            return Ok(LevelFilter::Debug);
        }
        if self.quiet {
            return Ok(LevelFilter::Error);
        }
        self.log_level
            .parse::<LevelFilter>()
            .map_err(|_| anyhow!("Invalid log level '{}'", self.log_level))
    }

    pub fn report_format(&self) -> ReportFormat {
        self.format
            .or_else(|| self.output.as_deref().and_then(ReportFormat::from_path))
            .unwrap_or(ReportFormat::Text)
    }

    pub fn to_config(&self) -> Result<ConfigParameter> {
        let mut config = ConfigParameter::new();
        config.set_concurrency(self.concurrency);
        config.set_rate_limit(self.rate_limit);
        config.set_burst(self.burst);
        config.set_timeout(Duration::from_secs(self.timeout));
        config.set_retries(self.retries);
        config.set_backoff_initial(Duration::from_millis(self.backoff_ms));
        config.set_proxy(self.proxy.clone());
        for header in &self.headers {
            let (name, value) = parse_header(header)?;
            config.add_header(name, value);
        }
        config.set_cookies(self.cookie.clone());
        if let Some(user_agent) = &self.user_agent {
            config.set_user_agent(user_agent.clone());
        }
        config.set_resume_from(self.resume.clone());
        config.set_checkpoint_path(self.checkpoint.clone());
        config.set_checkpoint_interval(self.checkpoint_interval);
        config.set_scan_kinds(self.kinds.clone());
        config.set_max_redirects(self.max_redirects);
        config.set_max_body_bytes(self.max_body_kb * 1024);
        config.set_soft404(!self.no_soft404);
        config.set_soft404_tolerance(self.soft404_tolerance);
        config.set_sqli_delay_secs(self.sqli_delay);
        config.set_sqli_time_threshold(Duration::from_millis(self.sqli_threshold_ms));
        config.set_sqli_boolean_size_delta(self.boolean_delta);
        config.set_max_scan_time(self.max_time.map(Duration::from_secs));
        Ok(config)
    }
}

fn parse_header(header: &str) -> Result<(String, String)> {
    let (name, value) = header
        .split_once(':')
        .ok_or_else(|| anyhow!("Header '{}' is not in 'Name: value' form", header))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Header '{}' has an empty name", header));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["rsweep", "example.com"]).unwrap();
        let config = cli.to_config().unwrap();
        let defaults = ConfigParameter::new();

        assert_eq!(cli.mode, ScanMode::Normal);
        assert_eq!(config.concurrency(), defaults.concurrency());
        assert_eq!(config.rate_limit(), defaults.rate_limit());
        assert_eq!(config.timeout(), defaults.timeout());
        assert_eq!(config.retries(), defaults.retries());
        assert_eq!(config.scan_kinds(), defaults.scan_kinds());
        assert_eq!(config.sqli_time_threshold(), defaults.sqli_time_threshold());
        assert_eq!(config.max_body_bytes(), defaults.max_body_bytes());
        assert_eq!(cli.report_format(), ReportFormat::Text);
    }

    #[test]
    fn test_parses_kinds_headers_and_points() {
        let cli = Cli::try_parse_from([
            "rsweep",
            "https://example.com/search?q=1",
            "--kinds",
            "xss,sqli",
            "-H",
            "Authorization: Bearer abc:def",
            "--param",
            "page",
            "--form-field",
            "user",
            "-o",
            "out/report.json",
        ])
        .unwrap();
        let config = cli.to_config().unwrap();

        assert_eq!(config.scan_kinds(), &[ProbeKind::Xss, ProbeKind::Sqli]);
        assert_eq!(
            config.headers(),
            &[("Authorization".to_string(), "Bearer abc:def".to_string())]
        );
        assert_eq!(cli.params, vec!["page".to_string()]);
        assert_eq!(cli.form_fields, vec!["user".to_string()]);
        assert_eq!(cli.report_format(), ReportFormat::Json);
    }

    #[test]
    fn test_rejects_malformed_header() {
        let cli = Cli::try_parse_from(["rsweep", "example.com", "-H", "no-colon"]).unwrap();
        assert!(cli.to_config().is_err());
    }

    #[test]
    fn test_log_level_flags() {
        let cli = Cli::try_parse_from(["rsweep", "example.com", "-v"]).unwrap();
        assert_eq!(cli.log_level().unwrap(), LevelFilter::Debug);
        let cli = Cli::try_parse_from(["rsweep", "example.com", "--log-level", "info"]).unwrap();
        assert_eq!(cli.log_level().unwrap(), LevelFilter::Info);
        let cli = Cli::try_parse_from(["rsweep", "example.com", "--log-level", "loud"]).unwrap();
        assert!(cli.log_level().is_err());
    }
}
