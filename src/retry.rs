//! Per-row retry loop.
//!
//! Each attempt is one adapter call plus the PNG write. Failures are
//! classified with [`FailureKind`]:
//!
//! - rate limited: wait the vendor's `Retry-After`, or `10 * (attempt + 1)`
//!   seconds, then try again
//! - unauthorized / bad request: stop immediately
//! - timeout / anything else: exponential backoff (`2^attempt` seconds)
//!
//! Every path ends in a [`GenerationOutcome`]; nothing is returned as an
//! error.

use crate::batch::GenerationOutcome;
use crate::error::Result;
use crate::image::{GenerationRequest, ImageProvider};
use crate::output::OutputDir;
use crate::rows::PromptRow;
use std::path::PathBuf;
use std::time::Duration;

pub use crate::error::FailureKind;

/// Attempt budget and wait schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per row, including the first.
    pub max_attempts: u32,
    /// Rate-limit wait grows by this much per attempt.
    pub rate_limit_step: Duration,
    /// Backoff for the first retry; doubles each attempt.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_step: Duration::from_secs(10),
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Default schedule with a different attempt budget.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Wait after a rate-limited attempt (0-based) when the vendor gave no hint.
    pub fn rate_limit_wait(&self, attempt: u32) -> Duration {
        self.rate_limit_step.saturating_mul(attempt + 1)
    }

    /// Wait after a transient failure on `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Builds the request for one row from the shared template.
pub fn request_for_row(template: &GenerationRequest, row: &PromptRow) -> GenerationRequest {
    let mut request = template.clone();
    request.prompt = row.text.clone();
    request.row_number = Some(row.row_number);
    request
}

/// Generates and saves one row's image, retrying per `policy`.
pub async fn generate_with_retry(
    provider: &dyn ImageProvider,
    row: &PromptRow,
    template: &GenerationRequest,
    policy: &RetryPolicy,
    output: &OutputDir,
) -> GenerationOutcome {
    let request = request_for_row(template, row);
    let max_attempts = policy.max_attempts.max(1);
    let mut last_failure = String::from("no attempt made");

    for attempt in 0..max_attempts {
        tracing::debug!(
            row = row.row_number,
            attempt = attempt + 1,
            max_attempts,
            provider = provider.name(),
            "generating"
        );

        let err = match attempt_once(provider, &request, row.row_number, output).await {
            Ok(path) => {
                tracing::info!(row = row.row_number, path = %path.display(), "image saved");
                return GenerationOutcome::succeeded(row.row_number, path);
            }
            Err(err) => err,
        };

        let kind = err.failure_kind();
        last_failure = err.to_string();
        let is_last = attempt + 1 == max_attempts;

        if !kind.is_retryable() {
            tracing::warn!(row = row.row_number, kind = ?kind, error = %err, "not retrying");
            break;
        }
        if is_last {
            tracing::warn!(row = row.row_number, kind = ?kind, error = %err, "attempts exhausted");
            break;
        }

        let wait = match kind {
            FailureKind::RateLimited => err
                .retry_after()
                .unwrap_or_else(|| policy.rate_limit_wait(attempt)),
            _ => policy.backoff(attempt),
        };
        tracing::warn!(
            row = row.row_number,
            attempt = attempt + 1,
            kind = ?kind,
            wait_secs = wait.as_secs_f64(),
            error = %err,
            "attempt failed, retrying"
        );
        tokio::time::sleep(wait).await;
    }

    GenerationOutcome::failed(row.row_number, last_failure)
}

async fn attempt_once(
    provider: &dyn ImageProvider,
    request: &GenerationRequest,
    row_number: u32,
    output: &OutputDir,
) -> Result<PathBuf> {
    let image = provider.generate(request).await?;
    output.save_row_image(row_number, &image)
}
