//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use markproof_core::WatermarkError;

/// Successful execution.
pub const SUCCESS: u8 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: u8 = 1;

/// Command line usage error (invalid payload, wavelet or option).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: u8 = 64;

/// Data format error (undecodable image, no capacity, payload mismatch).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: u8 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: u8 = 66;

/// Decoder artifacts missing or unusable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const UNAVAILABLE: u8 = 69;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: u8 = 74;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: u8,
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

        // Core errors anywhere in the chain decide first
        let core = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<WatermarkError>());

        let code = match core {
            Some(
                WatermarkError::InvalidInput(_) | WatermarkError::UnsupportedWavelet(_),
            ) => USAGE_ERROR,
            Some(WatermarkError::InvalidImage(_) | WatermarkError::InsufficientCapacity { .. }) => {
                DATA_ERROR
            }
            Some(WatermarkError::FatalLoad { .. } | WatermarkError::NotReady(_)) => UNAVAILABLE,
            Some(WatermarkError::Processing(_)) => GENERAL_ERROR,
            None if message.contains("Failed to read file") => INPUT_ERROR,
            None if message.contains("Failed to write") => IO_ERROR,
            None if message.contains("Invalid payload") => USAGE_ERROR,
            None if message.contains("mismatch") => DATA_ERROR,
            None => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }
}
