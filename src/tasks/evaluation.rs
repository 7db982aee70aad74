use std::sync::Arc;

use serde::Deserialize;

use crate::db::types::{SubmissionStatus, TaskKind};
use crate::services::content_generation::{clean_response, ContentGenerator};
use crate::services::errors::{ServiceError, UpstreamError};
use crate::services::prompts;
use crate::services::record_store::{RecordStore, SubmissionOutcome};

/// Minimum noises score that counts as solved.
const NOISES_PASS_SCORE: i32 = 100;

#[derive(Debug, Clone)]
pub(crate) struct EvaluationJob {
    pub(crate) submission_id: i64,
    pub(crate) task_alias: String,
    pub(crate) answers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SkipHint {
    index: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SkipsVerdict {
    status: String,
    #[serde(default)]
    hints: Vec<SkipHint>,
}

#[derive(Debug, Deserialize)]
struct NoisesVerdict {
    score: i32,
    #[serde(default)]
    hints: Vec<String>,
}

/// Grades one `Pending` submission and moves it to `Success` or `Failed`.
#[derive(Clone)]
pub(crate) struct SubmissionWorker {
    records: Arc<dyn RecordStore>,
    generator: Arc<dyn ContentGenerator>,
}

impl SubmissionWorker {
    pub(crate) fn new(records: Arc<dyn RecordStore>, generator: Arc<dyn ContentGenerator>) -> Self {
        Self { records, generator }
    }

    pub(crate) async fn run(&self, job: EvaluationJob) {
        let outcome = match self.evaluate(&job).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(
                    submission_id = job.submission_id,
                    task_alias = %job.task_alias,
                    error = %err,
                    "Submission evaluation failed"
                );
                SubmissionOutcome::failed()
            }
        };

        self.finalize(job.submission_id, outcome).await;
    }

    async fn evaluate(&self, job: &EvaluationJob) -> Result<SubmissionOutcome, ServiceError> {
        let task = self
            .records
            .find_task(&job.task_alias)
            .await?
            .ok_or(ServiceError::NotFound("task"))?;

        match task.kind {
            TaskKind::Skips => {
                let request =
                    prompts::skips_check_request(&task.task_code, &task.answers, &job.answers)?;
                let raw = self.generator.send(prompts::SKIPS_CHECK_PROMPT, &request).await?;
                Ok(skips_outcome(parse_verdict(&raw)?))
            }
            TaskKind::Noises => {
                let submitted = job
                    .answers
                    .first()
                    .ok_or_else(|| ServiceError::Validation("answer is empty".to_string()))?;
                let request =
                    prompts::noises_check_request(&task.original_code, &task.task_code, submitted);
                let raw = self.generator.send(prompts::NOISES_CHECK_PROMPT, &request).await?;
                Ok(noises_outcome(parse_verdict(&raw)?))
            }
        }
    }

    /// Single terminal step: write the outcome, fall back to a bare `Failed`,
    /// and leave the row to the stale sweep if both writes fail.
    async fn finalize(&self, submission_id: i64, outcome: SubmissionOutcome) {
        let status = outcome.status;
        let err = match self.records.complete_submission(submission_id, &outcome).await {
            Ok(true) => {
                metrics::counter!("submission_jobs_total", "status" => status.as_str())
                    .increment(1);
                tracing::info!(submission_id, status = status.as_str(), "Submission evaluated");
                return;
            }
            Ok(false) => {
                tracing::warn!(submission_id, "Submission was already terminal; outcome dropped");
                return;
            }
            Err(err) => err,
        };

        tracing::error!(submission_id, error = %err, "Failed to store submission outcome");

        match self.records.force_fail_submission(submission_id).await {
            Ok(_) => {
                metrics::counter!(
                    "submission_jobs_total",
                    "status" => SubmissionStatus::Failed.as_str()
                )
                .increment(1);
            }
            Err(force_err) => {
                metrics::counter!("submission_finalize_failures_total").increment(1);
                tracing::error!(
                    submission_id,
                    error = %force_err,
                    "Failed to force-fail submission; leaving it to the stale sweep"
                );
            }
        }
    }
}

fn parse_verdict<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, UpstreamError> {
    serde_json::from_str(clean_response(raw))
        .map_err(|err| UpstreamError::MalformedContent(err.to_string()))
}

fn skips_outcome(verdict: SkipsVerdict) -> SubmissionOutcome {
    if verdict.status == "ok" {
        return SubmissionOutcome { status: SubmissionStatus::Success, score: None, hints: Vec::new() };
    }

    let hints = verdict
        .hints
        .into_iter()
        .map(|hint| format!("{}'th skip: {}", hint.index, hint.message))
        .collect();

    SubmissionOutcome { status: SubmissionStatus::Failed, score: None, hints }
}

fn noises_outcome(verdict: NoisesVerdict) -> SubmissionOutcome {
    if verdict.score >= NOISES_PASS_SCORE {
        return SubmissionOutcome {
            status: SubmissionStatus::Success,
            score: Some(verdict.score),
            hints: Vec::new(),
        };
    }

    SubmissionOutcome {
        status: SubmissionStatus::Failed,
        score: Some(verdict.score),
        hints: verdict.hints,
    }
}
