//! Dumps the OpenAPI document of the telemetry endpoints (auth, data,
//! health) without starting the server or touching the database.
//!
//!   generate_openapi                      # pretty JSON on stdout
//!   generate_openapi --output api.json    # write to a file

use std::{fs, io::Write, path::PathBuf};

use anyhow::{bail, Context, Result};
use telemetry_service::api::handlers::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<()> {
    let output = output_path(std::env::args().skip(1))?;
    let document = ApiDoc::openapi()
        .to_pretty_json()
        .context("failed to serialise OpenAPI document")?;

    match output {
        Some(path) => {
            fs::write(&path, &document)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("OpenAPI document written to {}", path.display());
        }
        None => std::io::stdout()
            .lock()
            .write_all(document.as_bytes())
            .context("failed to write OpenAPI document to stdout")?,
    }
    Ok(())
}

/// Accepts no arguments or exactly `--output <path>`.
fn output_path(mut args: impl Iterator<Item = String>) -> Result<Option<PathBuf>> {
    match (args.next().as_deref(), args.next(), args.next()) {
        (None, _, _) => Ok(None),
        (Some("--output"), Some(path), None) => Ok(Some(PathBuf::from(path))),
        _ => bail!("usage: generate_openapi [--output <path>]"),
    }
}
