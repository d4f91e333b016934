//! 16 KiB page-size compatibility checker.
//!
//! Reports, for every shared object given on the command line, the largest
//! `PT_LOAD` alignment and whether it meets the minimum required to load on
//! devices with 16 KiB pages.
//!
//! Pipeline: collect inputs → analyse files in parallel → print reports
//!           in input order → exit status.

mod cli;
mod readelf;
mod report;
mod scan;
mod verbose;
mod worker;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::{Cli, Format};
use crate::readelf::{NoteLister, Readelf};
use crate::report::{FileReport, Options};
use crate::verbose::{Verbosity, vprintln};

fn main() -> ExitCode {
    let cli = Cli::parse();
    // Keep stdout parseable in JSON mode.
    verbose::init(match cli.format {
        Format::Json => Verbosity::Quiet,
        Format::Text => Verbosity::from_flags(cli.quiet, cli.verbose),
    });

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(true)` if every file was analysed and is compliant.
fn run(cli: &Cli) -> Result<bool> {
    let inputs = scan::collect_inputs(&cli.paths)?;

    let readelf = Readelf::new();
    let opts = Options {
        threshold: cli.min_align,
        lister: cli.readelf.then_some(&readelf as &dyn NoteLister),
    };

    let reports =
        worker::map_ordered(&inputs, cli.jobs, |path| report::analyze_file(path, &opts));

    match cli.format {
        Format::Json => {
            let json = serde_json::to_string_pretty(&reports).context("serializing report")?;
            println!("{json}");
        }
        Format::Text => print_text(&reports),
    }

    Ok(reports.iter().all(FileReport::is_compliant))
}

fn print_text(reports: &[FileReport]) {
    for (i, report) in reports.iter().enumerate() {
        if verbose::enabled(Verbosity::Default) {
            if i > 0 {
                println!();
            }
            print!("{}", report::summary(report));
        } else if report.error.is_some() {
            print!("{}", report::summary(report));
        }
        vprintln!("{}", report::details(report).trim_end());
    }

    let total = reports.len();
    let compliant = reports.iter().filter(|r| r.is_compliant()).count();
    let errors = reports.iter().filter(|r| r.error.is_some()).count();
    let summary = format!(
        "Checked {total} file(s): {compliant} compliant, {} non-compliant, {errors} error(s)",
        total - compliant - errors
    );

    match verbose::level() {
        Verbosity::Quiet => println!("{summary}"),
        _ if total > 1 => println!("\n{summary}"),
        _ => {}
    }
}
