//! Metadata command implementation.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use fidelis_core::{Aaguid, FidelisConfig, MetadataIdentifier};
use tracing::{debug, info};

/// Execute the metadata command.
pub fn execute(aaguid: Aaguid) -> Result<()> {
    let config = FidelisConfig::from_env().context("Invalid FIDELIS_* configuration")?;
    let resolver = config.metadata_resolver()?;
    debug!(providers = ?resolver.provider_names(), "Resolver configured");

    let identifier = MetadataIdentifier::Aaguid(aaguid);
    let Some(metadata) = resolver.get_metadata_for(&identifier) else {
        bail!("No metadata found for {identifier}");
    };
    info!(%identifier, description = %metadata.description, "Metadata resolved");

    let attestation_types = metadata
        .attestation_types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    println!();
    println!("   {} {}", "Description:".dimmed(), metadata.description.bold());
    println!("   {} {}", "AAGUID:".dimmed(), aaguid);
    println!(
        "   {} {}",
        "Attestation types:".dimmed(),
        if attestation_types.is_empty() {
            "none declared".to_string()
        } else {
            attestation_types.join(", ")
        }
    );
    println!(
        "   {} {}",
        "Root certificates:".dimmed(),
        metadata.trust_anchors.anchors().len()
    );

    match metadata.undesired_status() {
        Some(report) => println!(
            "   {} {}",
            "Status:".dimmed(),
            report.status.to_string().red().bold()
        ),
        None => {
            let latest = metadata.status_reports.last().map(|report| report.status.to_string());
            println!(
                "   {} {}",
                "Status:".dimmed(),
                latest.unwrap_or_else(|| "no reports".to_string()).green()
            );
        }
    }
    Ok(())
}
