//! maat CLI: convert a human rule file to canonical JSON.
//!
//! Reads a rule file, optionally lints it against a specification file, and
//! writes the canonical JSON rule array to stdout. Diagnostics go to stderr,
//! one per line, sorted by source line and then by message.
//!
//! Exit codes are part of the interface:
//! 0 success, 1 usage, 2 input not found, 3 lint spec not found,
//! 4 input read failed, 5 lint spec read failed, 6 lint spec decode failed,
//! 7 parse failed, 8 invalid rules, 9 encoding failed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use maat::codec;
use maat::error::LintError;
use maat::lint::{lint, LintSpec};
use maat::parse::parse_rules;

#[derive(Parser)]
#[command(
    name = "maat",
    version,
    about = "Convert a human rule file to canonical JSON, linting it on the way"
)]
struct Cli {
    /// The human rule file to convert.
    rules_file: PathBuf,

    /// Optional linter specification (JSON with lhs/rhs constraints).
    lint_spec_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    ExitCode::from(run())
}

fn run() -> u8 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            // The exit-code table reserves 1 for usage errors; clap's own
            // exit would use 2, which means "input not found" here.
            eprintln!("{error}");
            return 1;
        }
    };

    if !cli.rules_file.exists() {
        eprintln!("rules file not found: {}", cli.rules_file.display());
        return 2;
    }
    if let Some(spec_path) = &cli.lint_spec_file {
        if !spec_path.exists() {
            eprintln!("lint specification not found: {}", spec_path.display());
            return 3;
        }
    }

    let input = match std::fs::read_to_string(&cli.rules_file) {
        Ok(input) => input,
        Err(error) => {
            eprintln!("failed to read {}: {error}", cli.rules_file.display());
            return 4;
        }
    };

    let spec = match &cli.lint_spec_file {
        None => None,
        Some(spec_path) => {
            let raw = match std::fs::read_to_string(spec_path) {
                Ok(raw) => raw,
                Err(error) => {
                    eprintln!("failed to read {}: {error}", spec_path.display());
                    return 5;
                }
            };
            match serde_json::from_str::<LintSpec>(&raw) {
                Ok(spec) => Some(spec),
                Err(source) => {
                    let error = LintError::DecodeFailed {
                        path: spec_path.display().to_string(),
                        source,
                    };
                    eprintln!("{error}");
                    return 6;
                }
            }
        }
    };

    let rules = match parse_rules(&input) {
        Ok(rules) => rules,
        Err(mut errors) => {
            errors.sort_by_key(|e| (e.line(), e.to_string()));
            for error in &errors {
                eprintln!("{error}");
            }
            return 7;
        }
    };

    let issues = lint(&rules, spec.as_ref());
    if !issues.is_empty() {
        for issue in &issues {
            eprintln!("{issue}");
        }
        return 8;
    }

    tracing::debug!(rules = rules.len(), "emitting canonical rules");
    let bare: Vec<_> = rules.into_iter().map(|parsed| parsed.rule).collect();
    let encoded = match codec::encode_rules(&bare) {
        Ok(encoded) => encoded,
        Err(error) => {
            eprintln!("{error}");
            return 9;
        }
    };

    println!("{encoded:#}");
    0
}
