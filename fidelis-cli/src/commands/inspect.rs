//! Inspect command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use fidelis_core::cbor::CborMap;
use fidelis_core::{AttestationObject, AuthenticatorData, ByteBuffer, X509Certificate};
use serde::Serialize;
use tracing::{debug, info};

use super::read_input;

#[derive(Debug, Serialize)]
struct InspectReport {
    format: String,
    rp_id_hash: String,
    flags: FlagsReport,
    sign_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    aaguid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_algorithm: Option<String>,
    certificates: Vec<String>,
}

#[derive(Debug, Serialize)]
struct FlagsReport {
    raw: u8,
    user_present: bool,
    user_verified: bool,
    backup_eligible: bool,
    backed_up: bool,
    attested_credential_data: bool,
    extension_data: bool,
}

/// Execute the inspect command.
pub fn execute(file: PathBuf, json: bool) -> Result<()> {
    let input = read_input(&file)?;
    info!(path = %file.display(), bytes = input.len(), "Read attestation object");

    let buffer = decode_input(input)?;
    let object = AttestationObject::parse(&buffer).context("Failed to parse attestation object")?;
    let report = build_report(&object)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Raw CBOR is never valid UTF-8 (a map header is a continuation byte), so
/// text input is taken to be base64url or base64.
fn decode_input(input: Vec<u8>) -> Result<ByteBuffer> {
    match String::from_utf8(input) {
        Ok(text) => {
            let text = text.trim();
            debug!(chars = text.len(), "Decoding text input");
            ByteBuffer::from_base64_url(text)
                .or_else(|_| ByteBuffer::from_base64(text))
                .context("Input is text but neither base64url nor base64")
        }
        Err(raw) => Ok(ByteBuffer::new(raw.into_bytes())),
    }
}

fn build_report(object: &AttestationObject) -> Result<InspectReport> {
    let auth_data = object.auth_data();
    let (aaguid, credential_id, key_algorithm) = if auth_data.has_attested_credential_data() {
        (
            Some(auth_data.aaguid()?.to_string()),
            Some(auth_data.credential_id()?.to_hex()),
            Some(auth_data.credential_public_key()?.algorithm().name().to_string()),
        )
    } else {
        (None, None, None)
    };

    Ok(InspectReport {
        format: object.format().to_string(),
        rp_id_hash: auth_data.rp_id_hash().to_hex(),
        flags: flags_report(auth_data),
        sign_count: auth_data.sign_count(),
        aaguid,
        credential_id,
        key_algorithm,
        certificates: certificate_subjects(object.statement())?,
    })
}

fn flags_report(auth_data: &AuthenticatorData) -> FlagsReport {
    FlagsReport {
        raw: auth_data.flags(),
        user_present: auth_data.is_user_present(),
        user_verified: auth_data.is_user_verified(),
        backup_eligible: auth_data.is_backup_eligible(),
        backed_up: auth_data.is_backed_up(),
        attested_credential_data: auth_data.has_attested_credential_data(),
        extension_data: auth_data.has_extension_data(),
    }
}

/// Subjects of the statement's `x5c` chain, leaf first.
fn certificate_subjects(statement: &CborMap) -> Result<Vec<String>> {
    let Some(entries) = statement.get_text_key("x5c").and_then(|v| v.as_array()) else {
        return Ok(Vec::new());
    };
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let der = entry
                .as_bytes()
                .with_context(|| format!("x5c[{index}] is not a byte string"))?;
            let certificate = X509Certificate::from_der(der.as_slice().to_vec())
                .with_context(|| format!("Failed to parse x5c[{index}]"))?;
            Ok(certificate.subject_display()?)
        })
        .collect()
}

fn print_report(report: &InspectReport) {
    let yes_no = |set: bool| if set { "yes".green() } else { "no".dimmed() };

    println!();
    println!("   {} {}", "Format:".dimmed(), report.format.bold());
    println!("   {} {}", "RP ID hash:".dimmed(), report.rp_id_hash);
    println!("   {} 0x{:02x}", "Flags:".dimmed(), report.flags.raw);
    println!("     {} {}", "user present:".dimmed(), yes_no(report.flags.user_present));
    println!("     {} {}", "user verified:".dimmed(), yes_no(report.flags.user_verified));
    println!("     {} {}", "backup eligible:".dimmed(), yes_no(report.flags.backup_eligible));
    println!("     {} {}", "backed up:".dimmed(), yes_no(report.flags.backed_up));
    println!("   {} {}", "Sign count:".dimmed(), report.sign_count);

    if let Some(aaguid) = &report.aaguid {
        println!("   {} {}", "AAGUID:".dimmed(), aaguid);
    }
    if let Some(credential_id) = &report.credential_id {
        println!("   {} {}", "Credential ID:".dimmed(), credential_id);
    }
    if let Some(algorithm) = &report.key_algorithm {
        println!("   {} {}", "Key algorithm:".dimmed(), algorithm);
    }

    if report.certificates.is_empty() {
        println!("   {} {}", "Certificates:".dimmed(), "none".dimmed());
    } else {
        println!("   {}", "Certificates:".dimmed());
        for (index, subject) in report.certificates.iter().enumerate() {
            println!("     [{index}] {subject}");
        }
    }
}
