//! Plain-text run summary.

use crate::batch::BatchReport;
use crate::error::Result;
use crate::image::{ImageProvider, ImageProviderKind};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 50;

/// Run details printed above the totals.
#[derive(Debug, Clone)]
pub struct ReportContext {
    /// Provider display name.
    pub provider: String,
    /// Model id sent to the vendor.
    pub model: String,
    /// Vendor size string, when one was configured.
    pub size: Option<String>,
    /// Whether the provider submits tasks and polls.
    pub asynchronous: bool,
    /// Spreadsheet the prompts came from.
    pub source: Option<PathBuf>,
    /// Where images were written.
    pub output_dir: PathBuf,
    /// When the report was produced.
    pub generated_at: DateTime<Local>,
}

impl ReportContext {
    /// Context for `provider`, timestamped now.
    pub fn new(provider: &dyn ImageProvider, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider: provider.name().to_string(),
            model: provider.model().to_string(),
            size: None,
            asynchronous: provider.kind() == ImageProviderKind::Wan,
            source: None,
            output_dir: output_dir.into(),
            generated_at: Local::now(),
        }
    }

    /// Records the input spreadsheet.
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Records the configured size.
    pub fn with_size(mut self, size: Option<String>) -> Self {
        self.size = size;
        self
    }
}

/// Renders the summary text.
pub fn render_report(report: &BatchReport, ctx: &ReportContext) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let mut lines = vec![
        format!("{} batch image generation report", ctx.provider),
        heavy,
    ];

    if let Some(source) = &ctx.source {
        lines.push(format!("Source file: {}", source.display()));
    }
    lines.push(format!(
        "Generated at: {}",
        ctx.generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    lines.push(format!("Output directory: {}", ctx.output_dir.display()));
    lines.push(format!("Model: {}", ctx.model));
    if let Some(size) = &ctx.size {
        lines.push(format!("Image size: {size}"));
    }
    if ctx.asynchronous {
        lines.push("Mode: asynchronous (submit and poll)".to_string());
    }
    lines.push(light.clone());
    lines.push(format!("Total rows: {}", report.total));
    lines.push(format!("Succeeded: {}", report.success_count));
    lines.push(format!("Failed: {}", report.failed_count));
    lines.push(light);

    if report.success_count > 0 {
        lines.push("Succeeded rows:".to_string());
        lines.extend(report.successes().map(|outcome| {
            let file = outcome
                .file_path
                .as_deref()
                .and_then(Path::file_name)
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("  row {}: {}", outcome.row_number, file)
        }));
    }

    if report.failed_count > 0 {
        lines.push("Failed rows:".to_string());
        lines.extend(report.failures().map(|outcome| match &outcome.failure_reason {
            Some(reason) => format!("  row {}: {}", outcome.row_number, reason),
            None => format!("  row {}", outcome.row_number),
        }));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Renders the summary and writes it to `path`.
pub fn write_report(
    path: impl AsRef<Path>,
    report: &BatchReport,
    ctx: &ReportContext,
) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, render_report(report, ctx))?;
    tracing::info!(path = %path.display(), "report written");
    Ok(())
}
