// File: mod.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::Result;
use colored::*;

use crate::cli::Cli;

pub mod scan;

pub async fn handle_scan_command(cli: &Cli) -> Result<()> {
    scan::execute(cli).await
}

fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

fn format_duration(ms: u64) -> String {
    if ms >= 60000 {
        format!("{}m {:.1}s", ms / 60000, (ms % 60000) as f64 / 1000.0)
    } else if ms >= 1000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(250, "250ms")]
    #[case(1500, "1.50s")]
    #[case(61500, "1m 1.5s")]
    #[case(120000, "2m 0.0s")]
    fn test_format_duration(#[case] ms: u64, #[case] expected: &str) {
        assert_eq!(format_duration(ms), expected);
    }
}
