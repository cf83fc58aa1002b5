use super::CliError;
use anyhow::Context;
use mplace_core::common::MplaceConfig;
use mplace_core::modules::serialization::{normalize_text_artifact, write_text_artifact};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` overrides
/// the default `warn` level.
pub(super) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

pub(super) fn load_config(path: Option<&Path>) -> Result<MplaceConfig, CliError> {
    let Some(path) = path else {
        return Ok(MplaceConfig::default());
    };

    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config '{}'", path.display()))?;
    let config = MplaceConfig::from_json_str(&content)
        .map_err(|error| error.with_context(path.display().to_string()))?;
    info!(path = %path.display(), "loaded configuration");
    Ok(config)
}

pub(super) fn read_input_file(path: &Path, what: &str) -> Result<String, CliError> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read {} '{}'", what, path.display()))
        .map_err(CliError::from)
}

/// Writes `content` to `path`, or to stdout when no path is given.
pub(super) fn emit_text(path: Option<&Path>, content: &str) -> Result<(), CliError> {
    match path {
        Some(path) => {
            write_text_artifact(path, content)?;
            info!(path = %path.display(), bytes = content.len(), "wrote output file");
        }
        None => print!("{}", normalize_text_artifact(content)),
    }
    Ok(())
}

pub(super) fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?;
    println!("{}", rendered);
    Ok(())
}
