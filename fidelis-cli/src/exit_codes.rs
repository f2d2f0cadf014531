//! Exit codes following sysexits.h conventions.
//!
//! Failures are classified by the [`FidelisError`] found in the error chain,
//! so scripts can tell bad input data from an unreachable metadata service.

use fidelis_core::{ErrorKind, FidelisError};

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
#[allow(dead_code)]
pub const USAGE_ERROR: i32 = 64;

/// Data format error (malformed CBOR, failed signature, untrusted chain).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Metadata service unavailable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// I/O error (cache directory not writable).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Invalid `FIDELIS_*` configuration.
/// Maps to EX_CONFIG from sysexits.h.
pub const CONFIG_ERROR: i32 = 78;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let kind = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<FidelisError>())
            .map(FidelisError::kind);

        let code = match kind {
            Some(kind) => code_for_kind(kind),
            None if message.starts_with("Failed to read") => INPUT_ERROR,
            None => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

fn code_for_kind(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Parse
        | ErrorKind::Verification
        | ErrorKind::Unsupported
        | ErrorKind::FormatNotSupported => DATA_ERROR,
        ErrorKind::Remote | ErrorKind::NotAvailable => NETWORK_ERROR,
        ErrorKind::Cache => IO_ERROR,
        ErrorKind::Configuration => CONFIG_ERROR,
    }
}
