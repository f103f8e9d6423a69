//! The `prism process` command: one local file through the full pipeline.

use anyhow::Context;
use clap::Args;
use prism_core::{Config, ImageStatus, Prism, Upload};
use std::path::{Path, PathBuf};

/// Arguments for the `process` command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Image file to process
    #[arg(required = true)]
    pub input: PathBuf,

    /// Declared content type (guessed from the extension when omitted)
    #[arg(long)]
    pub content_type: Option<String>,
}

/// Execute the process command.
///
/// Submits the file exactly as an upload would be, waits for the worker and
/// prints the terminal record as JSON on stdout.
pub async fn execute(config: Config, args: ProcessArgs) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let content_type = args
        .content_type
        .unwrap_or_else(|| guess_content_type(&args.input).to_string());
    let original_name = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.input.display().to_string());

    let prism = Prism::new(config)?;
    let receipt = prism
        .submit(Upload {
            bytes,
            content_type,
            original_name,
        })
        .await?;

    prism.wait_idle().await;

    let record = prism.get(receipt.image_id).await?;
    if record.status == ImageStatus::Failed {
        tracing::warn!(
            image_id = %record.id,
            "Processing failed: {}",
            record.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}
