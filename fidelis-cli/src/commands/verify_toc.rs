//! Verify-toc command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use fidelis_core::pki::SignatureChainValidator;
use fidelis_core::{MetadataToc, TrustPathValidator, X509Certificate};
use tracing::{info, warn};

use super::read_input;

/// Execute the verify-toc command.
pub fn execute(file: PathBuf, root: PathBuf) -> Result<()> {
    let token = String::from_utf8(read_input(&file)?)
        .with_context(|| format!("TOC file is not UTF-8: {}", file.display()))?;
    let root_pem = String::from_utf8(read_input(&root)?)
        .with_context(|| format!("Root certificate is not UTF-8: {}", root.display()))?;
    let root_cert = X509Certificate::from_pem(&root_pem)
        .with_context(|| format!("Failed to parse root certificate: {}", root.display()))?;

    let validator = TrustPathValidator::new(Arc::new(SignatureChainValidator::new()));
    let toc = MetadataToc::verify(&token, &root_cert, &validator)
        .context("Failed to verify metadata TOC")?;
    info!(no = toc.no, entries = toc.entries.len(), "TOC verified");

    let stale = toc.next_update_time()? <= Utc::now();
    if stale {
        warn!(next_update = %toc.next_update, "TOC is past its nextUpdate date");
    }

    println!();
    println!("   {} {}", "Signature:".dimmed(), "Valid".green().bold());
    println!("   {} {}", "Serial:".dimmed(), toc.no);
    if stale {
        println!(
            "   {} {} {}",
            "Next update:".dimmed(),
            toc.next_update,
            "(stale)".yellow()
        );
    } else {
        println!("   {} {}", "Next update:".dimmed(), toc.next_update);
    }
    println!("   {} {}", "Entries:".dimmed(), toc.entries.len());
    Ok(())
}
