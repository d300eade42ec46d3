use std::fs;

use anyhow::{Context, Result};
use shared::config::{ClientConfig, ConfigFormat};

/// Writes a default configuration file to the current directory.
///
/// # Errors
/// Returns an error if the format is unsupported or if writing the file fails.
pub fn generate_config(format: &str) -> Result<()> {
    let format: ConfigFormat = format.parse()?;
    let config = ClientConfig::with_defaults();
    let serialized = config.render(format)?;
    let file_name = format.file_name();

    fs::write(file_name, serialized)
        .with_context(|| format!("failed to write configuration file '{file_name}'"))?;

    println!("Configuration file '{file_name}' generated successfully.");
    Ok(())
}
