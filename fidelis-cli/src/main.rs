//! Fidelis CLI - WebAuthn attestation and FIDO metadata tooling.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use fidelis_core::Aaguid;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error
  65  Invalid or unverifiable data
  66  Input file not found or unreadable
  69  Metadata service unavailable
  74  I/O error
  78  Configuration error";

#[derive(Parser)]
#[command(name = "fidelis")]
#[command(author, version, about = "WebAuthn attestation and FIDO metadata tooling", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode an attestation object and print what it carries
    Inspect {
        /// Attestation object as raw CBOR, base64 or base64url
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Verify a signed metadata TOC against a root certificate
    VerifyToc {
        /// TOC as a compact JWS
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// PEM root certificate the TOC signing chain must lead to
        #[arg(long, value_name = "PEM")]
        root: PathBuf,
    },

    /// Resolve metadata for an AAGUID through the configured providers
    Metadata {
        /// Authenticator AAGUID, e.g. cb69481e-8ff7-4039-93ec-0a2729a154a8
        #[arg(value_name = "AAGUID", value_parser = parse_aaguid)]
        aaguid: Aaguid,
    },
}

fn parse_aaguid(value: &str) -> std::result::Result<Aaguid, String> {
    Aaguid::parse_string(value).map_err(|e| e.to_string())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Inspect { file, json } => commands::inspect::execute(file, json),
        Commands::VerifyToc { file, root } => commands::verify_toc::execute(file, root),
        Commands::Metadata { aaguid } => commands::metadata::execute(aaguid),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit = match run(cli) {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
