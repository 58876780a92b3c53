//! Sequential batch driver.

use crate::image::{GenerationRequest, ImageProvider};
use crate::output::OutputDir;
use crate::retry::{generate_with_retry, RetryPolicy};
use crate::rows::PromptRow;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Final result for one row after all retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    /// Row this outcome belongs to.
    pub row_number: u32,
    /// Whether an image was generated and saved.
    pub success: bool,
    /// Saved image, on success.
    pub file_path: Option<PathBuf>,
    /// Last error seen, on failure.
    pub failure_reason: Option<String>,
}

impl GenerationOutcome {
    /// A saved image.
    pub fn succeeded(row_number: u32, file_path: PathBuf) -> Self {
        Self {
            row_number,
            success: true,
            file_path: Some(file_path),
            failure_reason: None,
        }
    }

    /// A row that produced no image.
    pub fn failed(row_number: u32, reason: impl Into<String>) -> Self {
        Self {
            row_number,
            success: false,
            file_path: None,
            failure_reason: Some(reason.into()),
        }
    }
}

/// Totals and per-row outcomes of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Rows processed.
    pub total: usize,
    /// Rows with a saved image.
    pub success_count: usize,
    /// Rows without one.
    pub failed_count: usize,
    /// Successful row numbers, in processing order.
    pub success_rows: Vec<u32>,
    /// Failed row numbers, in processing order.
    pub failed_rows: Vec<u32>,
    /// Every outcome, in processing order.
    pub outcomes: Vec<GenerationOutcome>,
}

impl BatchReport {
    /// Derives totals from outcomes.
    pub fn from_outcomes(outcomes: Vec<GenerationOutcome>) -> Self {
        let (success_rows, failed_rows): (Vec<_>, Vec<_>) =
            outcomes.iter().partition(|o| o.success);
        let success_rows: Vec<u32> = success_rows.iter().map(|o| o.row_number).collect();
        let failed_rows: Vec<u32> = failed_rows.iter().map(|o| o.row_number).collect();

        Self {
            total: outcomes.len(),
            success_count: success_rows.len(),
            failed_count: failed_rows.len(),
            success_rows,
            failed_rows,
            outcomes,
        }
    }

    /// Outcomes of successful rows.
    pub fn successes(&self) -> impl Iterator<Item = &GenerationOutcome> {
        self.outcomes.iter().filter(|o| o.success)
    }

    /// Outcomes of failed rows.
    pub fn failures(&self) -> impl Iterator<Item = &GenerationOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }
}

/// Knobs for [`run_batch`].
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Pause between rows. Not applied after the last row.
    pub delay: Duration,
    /// Per-row retry schedule.
    pub retry: RetryPolicy,
    /// Shared request settings; prompt and row number are filled per row.
    pub request: GenerationRequest,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            retry: RetryPolicy::default(),
            request: GenerationRequest::default(),
        }
    }
}

/// Generates every row in order, one at a time.
///
/// A failing row is recorded and the batch moves on; the run itself
/// cannot fail.
pub async fn run_batch(
    rows: &[PromptRow],
    provider: &dyn ImageProvider,
    options: &BatchOptions,
    output: &OutputDir,
) -> BatchReport {
    tracing::info!(
        rows = rows.len(),
        provider = provider.name(),
        model = provider.model(),
        output = %output.path().display(),
        "starting batch"
    );

    let mut outcomes = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        tracing::info!(
            row = row.row_number,
            progress = format_args!("{}/{}", i + 1, rows.len()),
            prompt = %crate::rows::preview_text(&row.text, 50),
            "processing row"
        );

        let outcome =
            generate_with_retry(provider, row, &options.request, &options.retry, output).await;
        if !outcome.success {
            tracing::warn!(
                row = row.row_number,
                reason = outcome.failure_reason.as_deref().unwrap_or("unknown"),
                "row failed"
            );
        }
        outcomes.push(outcome);

        if i + 1 < rows.len() && !options.delay.is_zero() {
            tracing::debug!(delay_secs = options.delay.as_secs_f64(), "waiting before next row");
            tokio::time::sleep(options.delay).await;
        }
    }

    let report = BatchReport::from_outcomes(outcomes);
    tracing::info!(
        total = report.total,
        succeeded = report.success_count,
        failed = report.failed_count,
        "batch finished"
    );
    report
}
