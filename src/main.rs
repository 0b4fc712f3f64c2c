// File: main.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use simple_logger::SimpleLogger;

use rsweep::cli::Cli;
use rsweep::commands;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    SimpleLogger::new()
        .with_level(cli.log_level()?)
        .init()
        .context("Failed to initialise logger")?;

    commands::handle_scan_command(&cli).await
}
