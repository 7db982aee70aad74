use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::db::types::TaskKind;
use crate::services::content_generation::{clean_response, ContentGenerator};
use crate::services::errors::{ServiceError, UpstreamError};
use crate::services::prompts;
use crate::services::record_store::{GeneratedContent, NewTask, RecordStore};
use crate::services::status_cache::{StatusCache, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GenerationParams {
    Skips { count: u32 },
    Noises { level: u8 },
}

impl GenerationParams {
    pub(crate) fn kind(self) -> TaskKind {
        match self {
            GenerationParams::Skips { .. } => TaskKind::Skips,
            GenerationParams::Noises { .. } => TaskKind::Noises,
        }
    }
}

/// Whether a run creates a new task or replaces content of an existing one.
#[derive(Debug, Clone)]
pub(crate) enum GenerationTarget {
    Create { user_id: String, language_id: i32 },
    Regenerate,
}

#[derive(Debug, Clone)]
pub(crate) struct GenerationJob {
    pub(crate) alias: String,
    pub(crate) target: GenerationTarget,
    pub(crate) params: GenerationParams,
    pub(crate) language: String,
    pub(crate) source_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkipsDraft {
    skips_code: String,
    #[serde(default)]
    answers: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoisesDraft {
    noised_code: String,
    #[serde(default)]
    description: Option<String>,
}

/// Drives one alias from `Processing` to `Done` or `Error`.
#[derive(Clone)]
pub(crate) struct GenerationWorker {
    records: Arc<dyn RecordStore>,
    statuses: Arc<dyn StatusCache>,
    generator: Arc<dyn ContentGenerator>,
}

impl GenerationWorker {
    pub(crate) fn new(
        records: Arc<dyn RecordStore>,
        statuses: Arc<dyn StatusCache>,
        generator: Arc<dyn ContentGenerator>,
    ) -> Self {
        Self { records, statuses, generator }
    }

    pub(crate) async fn run(&self, job: GenerationJob) {
        let timer = Instant::now();
        let kind = job.params.kind();

        let status = match self.generate_and_store(&job).await {
            Ok(task_code) => {
                tracing::info!(task_alias = %job.alias, kind = kind.as_str(), "Task generated");
                TaskStatus::Done { result: task_code }
            }
            Err(err) => {
                tracing::warn!(task_alias = %job.alias, kind = kind.as_str(), error = %err, "Task generation failed");
                TaskStatus::Error { error: err.to_string() }
            }
        };

        metrics::counter!(
            "generation_jobs_total",
            "kind" => kind.as_str(),
            "status" => status.label()
        )
        .increment(1);
        metrics::histogram!("generation_duration_seconds", "kind" => kind.as_str())
            .record(timer.elapsed().as_secs_f64());

        if let Err(err) = self.statuses.set(&job.alias, &status).await {
            tracing::error!(
                task_alias = %job.alias,
                status = status.label(),
                error = %err,
                "Failed to record generation status"
            );
        }
    }

    /// Generates content and commits it. Returns the generated code only after
    /// the durable write succeeded.
    async fn generate_and_store(&self, job: &GenerationJob) -> Result<String, ServiceError> {
        let content = self.generate(job).await?;

        match &job.target {
            GenerationTarget::Create { user_id, language_id } => {
                let task = NewTask {
                    user_id: user_id.clone(),
                    kind: job.params.kind(),
                    task_code: content.task_code.clone(),
                    original_code: job.source_code.clone(),
                    answers: content.answers,
                    language_id: *language_id,
                    description: content.description,
                };
                self.records.save_task_with_alias(task, &job.alias).await?;
            }
            GenerationTarget::Regenerate => {
                if !self.records.replace_task_content(&job.alias, &content).await? {
                    return Err(ServiceError::NotFound("task"));
                }
            }
        }

        Ok(content.task_code)
    }

    async fn generate(&self, job: &GenerationJob) -> Result<GeneratedContent, ServiceError> {
        match job.params {
            GenerationParams::Skips { count } => {
                let request =
                    prompts::skips_generation_request(&job.language, count, &job.source_code);
                let raw = self.generator.send(prompts::SKIPS_GENERATION_PROMPT, &request).await?;
                Ok(parse_skips(&raw, count)?)
            }
            GenerationParams::Noises { level } => {
                let request =
                    prompts::noises_generation_request(&job.language, level, &job.source_code);
                let raw = self.generator.send(prompts::NOISES_GENERATION_PROMPT, &request).await?;
                Ok(parse_noises(&raw, &job.source_code)?)
            }
        }
    }
}

fn parse_skips(raw: &str, expected: u32) -> Result<GeneratedContent, UpstreamError> {
    let draft: SkipsDraft = serde_json::from_str(clean_response(raw))
        .map_err(|err| UpstreamError::MalformedContent(err.to_string()))?;

    if draft.skips_code.trim().is_empty() {
        return Err(UpstreamError::MalformedContent("skipsCode is empty".to_string()));
    }
    if draft.answers.len() != expected as usize {
        return Err(UpstreamError::MalformedContent(format!(
            "expected {expected} answers, got {}",
            draft.answers.len()
        )));
    }

    Ok(GeneratedContent {
        task_code: draft.skips_code,
        answers: draft.answers,
        description: non_empty(draft.description),
    })
}

/// The canonical answer to a noises task is always the untouched source.
fn parse_noises(raw: &str, original: &str) -> Result<GeneratedContent, UpstreamError> {
    let draft: NoisesDraft = serde_json::from_str(clean_response(raw))
        .map_err(|err| UpstreamError::MalformedContent(err.to_string()))?;

    if draft.noised_code.trim().is_empty() {
        return Err(UpstreamError::MalformedContent("noisedCode is empty".to_string()));
    }

    Ok(GeneratedContent {
        task_code: draft.noised_code,
        answers: vec![original.to_string()],
        description: non_empty(draft.description),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|text| text.trim().to_string()).filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::errors::UpstreamError;
    use crate::test_support::{InMemoryRecordStore, InMemoryStatusCache, ScriptedGenerator};

    struct Harness {
        records: Arc<InMemoryRecordStore>,
        statuses: Arc<InMemoryStatusCache>,
        generator: Arc<ScriptedGenerator>,
        worker: GenerationWorker,
    }

    fn harness() -> Harness {
        let records = Arc::new(InMemoryRecordStore::default());
        let statuses = Arc::new(InMemoryStatusCache::default());
        let generator = Arc::new(ScriptedGenerator::default());
        let worker = GenerationWorker::new(records.clone(), statuses.clone(), generator.clone());
        Harness { records, statuses, generator, worker }
    }

    fn create_job(h: &Harness, alias: &str, params: GenerationParams, source: &str) -> GenerationJob {
        let user = h.records.seed_user("owner@example.com");
        GenerationJob {
            alias: alias.to_string(),
            target: GenerationTarget::Create { user_id: user.id, language_id: 1 },
            params,
            language: "python".to_string(),
            source_code: source.to_string(),
        }
    }

    #[tokio::test]
    async fn skips_job_persists_task_then_marks_done() {
        let h = harness();
        h.generator.push_ok(r#"```json
{"description": "adds", "skipsCode": "a___b", "answers": ["+"]}
```"#);
        h.statuses.seed("abc", TaskStatus::Processing);

        h.worker.run(create_job(&h, "abc", GenerationParams::Skips { count: 1 }, "a+b")).await;

        assert_eq!(h.statuses.peek("abc"), Some(TaskStatus::Done { result: "a___b".into() }));
        let task = h.records.task("abc").expect("task stored");
        assert_eq!(task.kind, TaskKind::Skips);
        assert_eq!(task.answers, vec!["+".to_string()]);
        assert_eq!(task.original_code, "a+b");
        assert_eq!(task.description.as_deref(), Some("adds"));

        let prompts = h.generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].1.contains("Число пропусков = 1"));
    }

    #[tokio::test]
    async fn skips_answer_count_mismatch_is_an_error() {
        let h = harness();
        h.generator.push_ok(r#"{"skipsCode": "___ ___", "answers": ["a"]}"#);

        h.worker.run(create_job(&h, "abc", GenerationParams::Skips { count: 2 }, "a b")).await;

        let Some(TaskStatus::Error { error }) = h.statuses.peek("abc") else {
            panic!("expected error status");
        };
        assert!(error.contains("expected 2 answers"));
        assert!(h.records.task("abc").is_none());
    }

    #[tokio::test]
    async fn noises_answers_are_the_original_source() {
        let h = harness();
        h.generator.push_ok(r#"{"noisedCode": "x = 1\nif False: pass\nprint(x)", "answers": ["ignored"]}"#);

        let source = "x = 1\nprint(x)";
        h.worker.run(create_job(&h, "noisy", GenerationParams::Noises { level: 4 }, source)).await;

        let task = h.records.task("noisy").expect("task stored");
        assert_eq!(task.kind, TaskKind::Noises);
        assert_eq!(task.answers, vec![source.to_string()]);
        assert!(matches!(h.statuses.peek("noisy"), Some(TaskStatus::Done { .. })));
    }

    #[tokio::test]
    async fn unparseable_answer_leaves_no_rows() {
        let h = harness();
        h.generator.push_ok("Sorry, I cannot help with that.");

        h.worker.run(create_job(&h, "bad", GenerationParams::Skips { count: 1 }, "a+b")).await;

        assert!(matches!(h.statuses.peek("bad"), Some(TaskStatus::Error { .. })));
        assert_eq!(h.records.task_count(), 0);
    }

    #[tokio::test]
    async fn empty_upstream_answer_is_an_error() {
        let h = harness();
        h.generator.push_err(UpstreamError::EmptyAnswer);

        h.worker.run(create_job(&h, "empty", GenerationParams::Noises { level: 1 }, "x")).await;

        let Some(TaskStatus::Error { error }) = h.statuses.peek("empty") else {
            panic!("expected error status");
        };
        assert!(error.contains("empty answer"));
        assert_eq!(h.records.task_count(), 0);
    }

    #[tokio::test]
    async fn failed_commit_never_reports_done() {
        let h = harness();
        h.generator.push_ok(r#"{"skipsCode": "a___b", "answers": ["+"]}"#);
        h.records.fail_writes();

        h.worker.run(create_job(&h, "abc", GenerationParams::Skips { count: 1 }, "a+b")).await;

        assert!(matches!(h.statuses.peek("abc"), Some(TaskStatus::Error { .. })));
    }

    #[tokio::test]
    async fn regenerate_replaces_content_in_place() {
        let h = harness();
        h.generator.push_ok(r#"{"skipsCode": "a___b", "answers": ["+"]}"#);
        h.worker.run(create_job(&h, "abc", GenerationParams::Skips { count: 1 }, "a+b")).await;

        h.generator.push_ok(r#"{"skipsCode": "___+___", "answers": ["a", "b"], "description": "sum"}"#);
        h.worker
            .run(GenerationJob {
                alias: "abc".to_string(),
                target: GenerationTarget::Regenerate,
                params: GenerationParams::Skips { count: 2 },
                language: "python".to_string(),
                source_code: "a+b".to_string(),
            })
            .await;

        let task = h.records.task("abc").expect("task");
        assert_eq!(task.task_code, "___+___");
        assert_eq!(task.answers, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(h.records.task_count(), 1);
        assert_eq!(h.statuses.peek("abc"), Some(TaskStatus::Done { result: "___+___".into() }));
    }

    #[test]
    fn parse_skips_drops_blank_description() {
        let content = parse_skips(r#"{"skipsCode": "_", "answers": ["x"], "description": "  "}"#, 1)
            .expect("content");
        assert_eq!(content.description, None);
    }
}
