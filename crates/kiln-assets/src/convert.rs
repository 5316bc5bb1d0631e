//! Offline PNG → KTX2 conversion.
//!
//! PNG is never uploaded directly; it is converted ahead of time with the
//! external `toktx` tool from the KTX-Software package. This module is glue
//! around that process, not a decoder.

use crate::error::{AssetError, Result};
use std::path::Path;
use std::process::Command;

const CONVERTER: &str = "toktx";

/// Convert a PNG file to a mipmapped KTX2 file by spawning `toktx`.
pub fn png_to_ktx2(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    let result = Command::new(CONVERTER)
        .arg("--genmipmap")
        .arg("--t2")
        .arg(output)
        .arg(input)
        .output();

    let command_output = match result {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AssetError::Conversion(format!(
                "'{CONVERTER}' not found on PATH; install KTX-Software to convert PNG inputs"
            )));
        }
        Err(e) => {
            return Err(AssetError::Conversion(format!(
                "failed to spawn '{CONVERTER}': {e}"
            )));
        }
    };

    if !command_output.status.success() {
        return Err(AssetError::Conversion(format!(
            "'{CONVERTER}' exited with {}: {}",
            command_output.status,
            String::from_utf8_lossy(&command_output.stderr).trim()
        )));
    }

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        "converted PNG to KTX2"
    );
    Ok(())
}
