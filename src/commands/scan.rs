// File: scan.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::{Context, Result};
use colored::*;
use log::{debug, info};
use std::collections::HashSet;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use url::Url;

use super::{format_duration, print_error, print_info, print_success, print_warning};
use crate::cli::Cli;
use crate::engine::Engine;
use crate::forms;
use crate::probe::{Confidence, Evidence, Finding, InjectionPoint, ProbeKind};
use crate::reports::ReportEngine;
use crate::source::SourceBuilder;
use crate::state::{AttemptOutcome, ScanState};
use crate::stats::ScanStats;
use crate::target::Target;
use crate::wordlist;

/// Discovered pages fed into the injection phase, at most.
pub const MAX_DISCOVERED_PAGES: usize = 50;

const MAX_LISTED_FAILURES: usize = 20;

/// Runs discovery first, then injection probes against the target page, the
/// `--inject-path` pages and every 2xx page discovery found, plus the fields
/// of the forms on those pages. Both phases share one engine, so one
/// checkpoint covers the whole scan.
pub async fn execute(cli: &Cli) -> Result<()> {
    let target = Target::parse(&cli.target)
        .with_context(|| format!("Invalid target '{}'", cli.target))?;
    let config = cli.to_config()?;

    let discovery = discovery_paths(cli)?;
    let points = injection_points(&target, &cli.params, &cli.form_fields);
    let xss_payloads = match &cli.xss_payloads {
        Some(path) => wordlist::load_file(path)
            .with_context(|| format!("Failed to read XSS payloads from {}", path.display()))?,
        None => wordlist::xss_payloads(),
    };
    let sqli_errors = match &cli.sqli_payloads {
        Some(path) => wordlist::load_file(path)
            .with_context(|| format!("Failed to read SQLi payloads from {}", path.display()))?,
        None => wordlist::sqli_error_payloads(),
    };

    let mut engine = Engine::new(target, config)
        .context("Failed to initialise scan")?
        .with_progress(!cli.quiet && !cli.no_progress);

    let cancel = engine.cancel_signal();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            print_warning("Interrupted, waiting for in-flight probes to finish");
            cancel.cancel();
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_findings(rx));

    let started = Instant::now();
    let mut cancelled = false;

    if engine.config().scans(ProbeKind::Discovery) {
        if discovery.is_empty() {
            print_warning("No discovery paths, skipping discovery");
        } else {
            print_info(&format!(
                "Discovery: {} paths against {}",
                discovery.len(),
                engine.target().base_url()
            ));
            let source = SourceBuilder::new(&[ProbeKind::Discovery])
                .paths(discovery)
                .build();
            let outcome = engine.run(source, Some(tx.clone())).await?;
            cancelled = outcome.cancelled;
        }
    }

    let injection_kinds: Vec<ProbeKind> = engine
        .config()
        .scan_kinds()
        .iter()
        .copied()
        .filter(|kind| *kind != ProbeKind::Discovery)
        .collect();

    if !cancelled && !injection_kinds.is_empty() {
        let pages = injection_pages(&cli.inject_paths, engine.state(), MAX_DISCOVERED_PAGES);
        debug!("Injection pages: {:?}", pages);
        let forms = if cli.no_forms {
            Vec::new()
        } else {
            page_form_targets(&engine, &pages).await
        };
        let dom_checks = injection_kinds.contains(&ProbeKind::Xss);

        if points.is_empty() && forms.is_empty() {
            print_warning(
                "No injection points: the target has no query parameters, no forms were found and no --param or --form-field was given",
            );
        }
        if dom_checks || !points.is_empty() || !forms.is_empty() {
            print_info(&format!(
                "Injection: {} pages x {} points, {} form fields ({})",
                pages.len(),
                points.len(),
                forms.len(),
                injection_kinds
                    .iter()
                    .map(|kind| kind.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            let source = SourceBuilder::new(&injection_kinds)
                .injection_paths(pages.clone())
                .points(points)
                .form_targets(forms)
                .dom_sink_pages(pages)
                .xss_payloads(xss_payloads)
                .sqli_error_payloads(sqli_errors)
                .sqli_boolean_pairs(wordlist::sqli_boolean_pairs())
                .sqli_time_payloads(
                    wordlist::sqli_time_payloads(engine.config().sqli_delay_secs()),
                    engine.config().sqli_delay_secs(),
                )
                .build();
            let outcome = engine.run(source, Some(tx.clone())).await?;
            cancelled = outcome.cancelled;
        }
    }

    drop(tx);
    let _ = printer.await;
    interrupt.abort();

    let elapsed = started.elapsed();
    print_summary(
        &engine.target().base_url(),
        engine.state(),
        &engine.stats(),
        elapsed.as_millis() as u64,
        cancelled,
    );
    if cancelled {
        if let Some(path) = engine.config().checkpoint_path() {
            print_info(&format!(
                "Resume with --resume {}",
                path.display()
            ));
        }
    }

    let report_engine = ReportEngine::new();
    let data = report_engine.create_report_data(
        &engine.target().base_url(),
        engine.state(),
        elapsed,
        cancelled,
    );
    match &cli.output {
        Some(path) => {
            let content = report_engine
                .generate_report(cli.report_format(), &data, Some(path))
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            print_success(&format!(
                "Report written to {} ({} bytes)",
                path.display(),
                content.len()
            ));
        }
        None if cli.format.is_some() => {
            let content =
                report_engine.generate_report::<&str>(cli.report_format(), &data, None)?;
            println!("{}", content);
        }
        None => {}
    }

    info!("Scan finished in {}", format_duration(elapsed.as_millis() as u64));
    Ok(())
}

/// Built-in list for the selected mode (unless `--no-builtin`), technology
/// lists, then wordlist files. Duplicates are dropped by the probe source.
pub fn discovery_paths(cli: &Cli) -> Result<Vec<String>> {
    let mut paths = if cli.no_builtin {
        Vec::new()
    } else {
        cli.mode.wordlist()
    };
    for tech in &cli.tech {
        paths.extend(wordlist::technology_wordlist(*tech));
    }
    for file in &cli.wordlists {
        let loaded = wordlist::load_file(file)
            .with_context(|| format!("Failed to read wordlist {}", file.display()))?;
        info!("Loaded {} paths from {}", loaded.len(), file.display());
        paths.extend(loaded);
    }
    Ok(paths)
}

pub fn injection_points(
    target: &Target,
    params: &[String],
    form_fields: &[String],
) -> Vec<InjectionPoint> {
    let mut seen = HashSet::new();
    target
        .query_parameters()
        .into_iter()
        .chain(params.iter().cloned())
        .map(InjectionPoint::Query)
        .chain(form_fields.iter().cloned().map(InjectionPoint::Form))
        .filter(|point| !point.name().is_empty())
        .filter(|point| seen.insert(point.clone()))
        .collect()
}

/// The target page itself, the explicit extra pages, then up to `limit`
/// pages that answered 2xx during discovery.
pub fn injection_pages(extra: &[String], state: &ScanState, limit: usize) -> Vec<String> {
    let discovered = state
        .findings()
        .iter()
        .filter(|finding| {
            matches!(
                finding.verdict.evidence,
                Evidence::Discovery { status, .. } if (200..300).contains(&status)
            )
        })
        .map(|finding| finding.spec.path().to_string())
        .take(limit);

    let mut seen = HashSet::new();
    std::iter::once(String::new())
        .chain(
            extra
                .iter()
                .map(|page| page.trim_start_matches('/').to_string()),
        )
        .chain(discovered)
        .filter(|page| seen.insert(page.clone()))
        .collect()
}

/// Fields of the forms on `pages` that submit inside the target scope,
/// deduplicated across pages.
async fn page_form_targets(engine: &Engine, pages: &[String]) -> Vec<(String, InjectionPoint)> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for page in pages {
        let Some(result) = engine.fetch_page(page).await else {
            break;
        };
        if !result.success() || !(200..300).contains(&result.status()) {
            debug!("Not looking for forms on /{} (status {})", page, result.status());
            continue;
        }
        let Ok(url) = Url::parse(result.url()) else {
            continue;
        };
        for form in forms::extract_forms(result.body(), &url) {
            for target in form.injection_targets(engine.target()) {
                if seen.insert(target.clone()) {
                    targets.push(target);
                }
            }
        }
    }
    if !targets.is_empty() {
        info!("Found {} form fields to inject into", targets.len());
    }
    targets
}

async fn print_findings(mut rx: UnboundedReceiver<Finding>) {
    while let Some(finding) = rx.recv().await {
        let confidence = match finding.verdict.confidence {
            Confidence::High => "HIGH".red().bold(),
            Confidence::Medium => "MEDIUM".yellow().bold(),
            Confidence::Low => "LOW".blue(),
        };
        let mut line = format!(
            "[{}] {} {} {}",
            confidence,
            finding.spec.kind().to_string().cyan(),
            finding.verdict.evidence.label(),
            finding.url
        );
        if let Some(injection) = finding.spec.injection() {
            line.push_str(&format!(" via {}", injection.point()).dimmed().to_string());
        }
        println!("{}", line);
    }
}

fn print_summary(target: &str, state: &ScanState, stats: &ScanStats, ms: u64, cancelled: bool) {
    let failed: Vec<_> = state.failed().collect();

    println!();
    println!("{}", "Scan summary".bold());
    println!("  Target:    {}", target);
    println!(
        "  Probes:    {} attempted, {} succeeded, {} failed, {} skipped",
        state.attempted().len(),
        state.succeeded_count(),
        failed.len(),
        state.skipped().count()
    );
    println!(
        "  Requests:  {} sent, {} retries, peak {} in flight",
        stats.requests(),
        stats.retries(),
        stats.peak_in_flight()
    );
    println!("  Findings:  {}", state.findings().len().to_string().green().bold());
    println!("  Duration:  {}", format_duration(ms));

    if cancelled {
        print_warning("Scan was cancelled, results are partial");
    }

    if !failed.is_empty() {
        println!();
        print_error(&format!("{} probes failed after all retries:", failed.len()));
        for record in failed.iter().take(MAX_LISTED_FAILURES) {
            if let AttemptOutcome::FailedExhausted { kind, message } = &record.outcome {
                eprintln!("    {} ({}): {}", record.id, kind, message);
            }
        }
        if failed.len() > MAX_LISTED_FAILURES {
            eprintln!("    ... and {} more", failed.len() - MAX_LISTED_FAILURES);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProbeSpec, Verdict};
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn discovery_finding(path: &str, status: u16) -> Finding {
        Finding::new(
            ProbeSpec::discovery(path),
            format!("https://example.com/{}", path),
            Verdict::new(
                Evidence::Discovery {
                    status,
                    size: 10,
                    title: None,
                    location: None,
                },
                Confidence::High,
            ),
        )
    }

    #[test]
    fn test_injection_points_merge_and_dedup() {
        let target = Target::parse("https://example.com/search?q=1&page=2").unwrap();
        let points = injection_points(
            &target,
            &["q".to_string(), "sort".to_string()],
            &["user".to_string()],
        );
        assert_eq!(
            points,
            vec![
                InjectionPoint::Query("q".into()),
                InjectionPoint::Query("page".into()),
                InjectionPoint::Query("sort".into()),
                InjectionPoint::Form("user".into()),
            ]
        );
    }

    #[test]
    fn test_injection_pages_use_2xx_discoveries_only() {
        let mut state = ScanState::new("fp");
        for (path, status) in [("admin", 200), ("login", 302), ("api", 204), ("boom", 500)] {
            let finding = discovery_finding(path, status);
            state
                .record_attempt(finding.id(), AttemptOutcome::Succeeded, 1)
                .unwrap();
            state.append_finding(finding).unwrap();
        }

        let pages = injection_pages(&["/admin".to_string(), "/search".to_string()], &state, 10);
        assert_eq!(pages, vec!["", "admin", "search", "api"]);

        let pages = injection_pages(&[], &state, 1);
        assert_eq!(pages, vec!["", "admin"]);
    }

    #[test]
    fn test_discovery_paths_from_files_only() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# comment\nadmin\n\nbackup.zip").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from([
            "rsweep",
            "example.com",
            "--no-builtin",
            "-W",
            path.as_str(),
        ])
        .unwrap();
        assert_eq!(discovery_paths(&cli).unwrap(), vec!["admin", "backup.zip"]);
    }

    #[test]
    fn test_discovery_paths_missing_file_is_error() {
        let cli = Cli::try_parse_from([
            "rsweep",
            "example.com",
            "-W",
            "/nonexistent/rsweep/words.txt",
        ])
        .unwrap();
        assert!(discovery_paths(&cli).is_err());
    }
}
