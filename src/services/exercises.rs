use crate::core::state::AppState;
use crate::db::models::{Submission, Task, User};
use crate::db::types::TaskKind;
use crate::services::errors::ServiceError;
use crate::services::record_store::RecordStore;
use crate::services::status_cache::TaskStatus;
use crate::tasks::evaluation::EvaluationJob;
use crate::tasks::generation::{GenerationJob, GenerationParams, GenerationTarget};

/// Highest accepted noise level.
pub(crate) const MAX_NOISE_LEVEL: u8 = 10;

#[derive(Debug, Clone)]
pub(crate) struct GenerationRequest {
    pub(crate) source_code: String,
    pub(crate) language: String,
    pub(crate) params: GenerationParams,
}

/// Parameters a regeneration may carry; only the one matching the task kind is used.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RegenerationRequest {
    pub(crate) skips_number: Option<u32>,
    pub(crate) noise_level: Option<u8>,
}

#[derive(Debug, Clone)]
pub(crate) enum SolutionAnswer {
    Skips(Vec<String>),
    Noises(String),
}

impl SolutionAnswer {
    fn kind(&self) -> TaskKind {
        match self {
            SolutionAnswer::Skips(_) => TaskKind::Skips,
            SolutionAnswer::Noises(_) => TaskKind::Noises,
        }
    }

    fn into_answers(self) -> Vec<String> {
        match self {
            SolutionAnswer::Skips(answers) => answers,
            SolutionAnswer::Noises(answer) => vec![answer],
        }
    }
}

/// Validates the request, claims an alias and hands the work to the job runner.
/// Returns the alias immediately; the task itself appears once the job commits.
pub(crate) async fn start_generation(
    state: &AppState,
    owner: &User,
    request: GenerationRequest,
) -> Result<String, ServiceError> {
    check_source(state, &request.source_code)?;
    check_params(state, request.params)?;

    let language = state
        .records()
        .find_language(&request.language)
        .await?
        .ok_or_else(|| {
            ServiceError::Validation(format!(
                "unsupported programming language: {}",
                request.language.trim()
            ))
        })?;

    let slot = state.jobs().reserve()?;
    let alias = state.aliases().allocate(state.settings().generation().alias_length).await?;

    let job = GenerationJob {
        alias: alias.clone(),
        target: GenerationTarget::Create { user_id: owner.id.clone(), language_id: language.id },
        params: request.params,
        language: language.name,
        source_code: request.source_code,
    };
    let worker = state.generation_worker();
    slot.spawn("generation", async move { worker.run(job).await });

    tracing::info!(
        task_alias = %alias,
        user_id = %owner.id,
        kind = request.params.kind().as_str(),
        "Generation accepted"
    );
    Ok(alias)
}

/// Regenerates an existing task from its stored source. Only the owner may do this.
pub(crate) async fn start_regeneration(
    state: &AppState,
    owner: &User,
    alias: &str,
    request: RegenerationRequest,
) -> Result<(), ServiceError> {
    let task = find_task(state, alias).await?;
    if task.user_id != owner.id {
        return Err(ServiceError::Forbidden("Only the task owner can regenerate it"));
    }

    let params = match task.kind {
        TaskKind::Skips => request
            .skips_number
            .map(|count| GenerationParams::Skips { count })
            .ok_or_else(|| ServiceError::Validation("skipsNumber is required".to_string()))?,
        TaskKind::Noises => request
            .noise_level
            .map(|level| GenerationParams::Noises { level })
            .ok_or_else(|| ServiceError::Validation("noiseLevel is required".to_string()))?,
    };
    check_params(state, params)?;

    let slot = state.jobs().reserve()?;
    state.statuses().set(alias, &TaskStatus::Processing).await?;

    let job = GenerationJob {
        alias: alias.to_string(),
        target: GenerationTarget::Regenerate,
        params,
        language: task.language,
        source_code: task.original_code,
    };
    let worker = state.generation_worker();
    slot.spawn("regeneration", async move { worker.run(job).await });

    tracing::info!(task_alias = %alias, user_id = %owner.id, "Regeneration accepted");
    Ok(())
}

/// Records a `Pending` submission and schedules its evaluation.
pub(crate) async fn submit_solution(
    state: &AppState,
    alias: &str,
    answer: SolutionAnswer,
) -> Result<i64, ServiceError> {
    let task = find_task(state, alias).await?;

    if task.kind != answer.kind() {
        return Err(ServiceError::Validation(format!(
            "task {alias} is a {} task",
            task.kind.as_str()
        )));
    }
    if let SolutionAnswer::Skips(answers) = &answer {
        if answers.len() != task.answers.len() {
            return Err(ServiceError::Validation(format!(
                "expected {} answers, got {}",
                task.answers.len(),
                answers.len()
            )));
        }
    }

    let slot = state.jobs().reserve()?;
    let answers = answer.into_answers();
    let submission_id = state.records().create_pending_submission(alias, &answers).await?;

    let job = EvaluationJob { submission_id, task_alias: alias.to_string(), answers };
    let worker = state.submission_worker();
    slot.spawn("evaluation", async move { worker.run(job).await });

    tracing::info!(submission_id, task_alias = %alias, "Submission accepted");
    Ok(submission_id)
}

pub(crate) async fn task_status(state: &AppState, alias: &str) -> Result<TaskStatus, ServiceError> {
    state.statuses().get(alias).await?.ok_or(ServiceError::NotFound("task status"))
}

pub(crate) async fn submission(state: &AppState, id: i64) -> Result<Submission, ServiceError> {
    state.records().find_submission(id).await?.ok_or(ServiceError::NotFound("submission"))
}

pub(crate) async fn find_task(state: &AppState, alias: &str) -> Result<Task, ServiceError> {
    state.records().find_task(alias).await?.ok_or(ServiceError::NotFound("task"))
}

fn check_source(state: &AppState, source_code: &str) -> Result<(), ServiceError> {
    if source_code.trim().is_empty() {
        return Err(ServiceError::Validation("sourceCode must not be empty".to_string()));
    }
    let limit = state.settings().generation().max_source_code_bytes;
    if source_code.len() > limit {
        return Err(ServiceError::Validation(format!(
            "sourceCode exceeds {limit} bytes"
        )));
    }
    Ok(())
}

fn check_params(state: &AppState, params: GenerationParams) -> Result<(), ServiceError> {
    match params {
        GenerationParams::Skips { count } => {
            let max = state.settings().generation().max_skips;
            if count == 0 || count > max {
                return Err(ServiceError::Validation(format!(
                    "skipsNumber must be between 1 and {max}"
                )));
            }
        }
        GenerationParams::Noises { level } => {
            if level > MAX_NOISE_LEVEL {
                return Err(ServiceError::Validation(format!(
                    "noiseLevel must be between 0 and {MAX_NOISE_LEVEL}"
                )));
            }
        }
    }
    Ok(())
}
