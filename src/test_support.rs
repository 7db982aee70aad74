use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use rand::seq::SliceRandom;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::api;
use crate::core::{config::Settings, redis::RedisHandle, security, state::AppState, time::now_utc};
use crate::db::models::{ProgrammingLanguage, Submission, Task, User};
use crate::db::types::{SubmissionStatus, TaskKind};
use crate::services::content_generation::ContentGenerator;
use crate::services::errors::{CacheError, StoreError, UpstreamError};
use crate::services::record_store::{
    GeneratedContent, NewTask, Page, RecordStore, SubmissionOutcome,
};
use crate::services::status_cache::{StatusCache, TaskStatus};

const TEST_SECRET_KEY: &str = "test-secret";
pub(crate) const TEST_PASSWORD: &str = "correct-horse";

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) records: Arc<InMemoryRecordStore>,
    pub(crate) statuses: Arc<InMemoryStatusCache>,
    pub(crate) generator: Arc<ScriptedGenerator>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("CODULAR_ENV", "test");
    std::env::set_var("CODULAR_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::set_var("MAX_CONCURRENT_JOBS", "2");
    std::env::set_var("MAX_QUEUED_JOBS", "4");
    for key in [
        "ALIAS_LENGTH",
        "ALIAS_MAX_ATTEMPTS",
        "AI_BASE_URL",
        "MAX_SKIPS",
        "MAX_SOURCE_CODE_BYTES",
        "TASK_STATUS_TTL_SECONDS",
        "STALE_SUBMISSION_MINUTES",
        "AI_REQUEST_TIMEOUT",
        "API_V1_STR",
        "ACCESS_TOKEN_EXPIRE_MINUTES",
        "REFRESH_TOKEN_EXPIRE_DAYS",
        "ALGORITHM",
    ] {
        std::env::remove_var(key);
    }
}

/// App state backed by in-memory fakes. Redis is never connected, so rate
/// limiting is a no-op.
pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let redis = RedisHandle::new(settings.redis().redis_url());

    let records = Arc::new(InMemoryRecordStore::default());
    let statuses = Arc::new(InMemoryStatusCache::default());
    let generator = Arc::new(ScriptedGenerator::default());

    let state =
        AppState::new(settings, redis, records.clone(), statuses.clone(), generator.clone());
    let app = api::router::router(state.clone());

    TestContext { state, app, records, statuses, generator, _guard: guard }
}

#[derive(Default)]
struct StoreState {
    users: Vec<User>,
    refresh_tokens: Vec<StoredRefreshToken>,
    tasks: Vec<Task>,
    submissions: Vec<Submission>,
    next_task_id: i64,
    next_submission_id: i64,
}

struct StoredRefreshToken {
    id: String,
    user_id: String,
    expires_at: OffsetDateTime,
}

/// Record store kept in process memory, with switches for injecting failures.
pub(crate) struct InMemoryRecordStore {
    state: StdMutex<StoreState>,
    languages: Vec<ProgrammingLanguage>,
    every_alias_taken: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_outcome_writes: AtomicBool,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        let languages = ["python", "go", "java", "javascript", "rust"]
            .iter()
            .zip(1..)
            .map(|(name, id)| ProgrammingLanguage { id, name: name.to_string() })
            .collect();

        Self {
            state: StdMutex::new(StoreState::default()),
            languages,
            every_alias_taken: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_outcome_writes: AtomicBool::new(false),
        }
    }
}

impl InMemoryRecordStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().expect("store lock")
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }

    pub(crate) fn seed_user(&self, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            hashed_password: security::hash_password(TEST_PASSWORD).expect("hash password"),
            created_at: now_utc(),
        };
        self.lock().users.push(user.clone());
        user
    }

    pub(crate) fn task(&self, alias: &str) -> Option<Task> {
        self.lock().tasks.iter().find(|task| task.alias == alias).cloned()
    }

    pub(crate) fn task_count(&self) -> usize {
        self.lock().tasks.len()
    }

    pub(crate) fn submission(&self, id: i64) -> Option<Submission> {
        self.lock().submissions.iter().find(|submission| submission.id == id).cloned()
    }

    pub(crate) fn backdate_submission(&self, id: i64, by: time::Duration) {
        let mut state = self.lock();
        if let Some(submission) = state.submissions.iter_mut().find(|s| s.id == id) {
            submission.submitted_at -= by;
        }
    }

    pub(crate) fn treat_every_alias_as_taken(&self) {
        self.every_alias_taken.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn refresh_token_count(&self) -> usize {
        self.lock().refresh_tokens.len()
    }

    /// Makes `complete_submission` fail while `force_fail_submission` still works.
    pub(crate) fn fail_outcome_writes(&self) {
        self.fail_outcome_writes.store(true, Ordering::SeqCst);
    }
}

fn page(mut tasks: Vec<Task>, offset: i64, limit: i64) -> Page<Task> {
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    let total = tasks.len() as i64;
    let items = tasks
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect();
    Page { items, total }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_read()
    }

    async fn alias_exists(&self, alias: &str) -> Result<bool, StoreError> {
        self.check_read()?;
        if self.every_alias_taken.load(Ordering::SeqCst) {
            return Ok(true);
        }
        Ok(self.lock().tasks.iter().any(|task| task.alias == alias))
    }

    async fn find_language(&self, name: &str) -> Result<Option<ProgrammingLanguage>, StoreError> {
        self.check_read()?;
        let name = name.trim().to_lowercase();
        Ok(self.languages.iter().find(|language| language.name == name).cloned())
    }

    async fn save_task_with_alias(&self, task: NewTask, alias: &str) -> Result<i64, StoreError> {
        self.check_write()?;
        let language = self
            .languages
            .iter()
            .find(|language| language.id == task.language_id)
            .ok_or_else(|| StoreError::Unavailable("unknown language id".into()))?;

        let mut state = self.lock();
        if state.tasks.iter().any(|existing| existing.alias == alias) {
            return Err(StoreError::Duplicate("alias"));
        }
        state.next_task_id += 1;
        let id = state.next_task_id;
        state.tasks.push(Task {
            id,
            alias: alias.to_string(),
            user_id: task.user_id,
            kind: task.kind,
            task_code: task.task_code,
            original_code: task.original_code,
            answers: task.answers,
            language: language.name.clone(),
            description: task.description,
            public: false,
            created_at: now_utc(),
        });
        Ok(id)
    }

    async fn replace_task_content(
        &self,
        alias: &str,
        content: &GeneratedContent,
    ) -> Result<bool, StoreError> {
        self.check_write()?;
        let mut state = self.lock();
        let Some(task) = state.tasks.iter_mut().find(|task| task.alias == alias) else {
            return Ok(false);
        };
        task.task_code = content.task_code.clone();
        task.answers = content.answers.clone();
        task.description = content.description.clone();
        Ok(true)
    }

    async fn find_task(&self, alias: &str) -> Result<Option<Task>, StoreError> {
        self.check_read()?;
        Ok(self.task(alias))
    }

    async fn set_task_public(&self, alias: &str, public: bool) -> Result<bool, StoreError> {
        self.check_write()?;
        let mut state = self.lock();
        let Some(task) = state.tasks.iter_mut().find(|task| task.alias == alias) else {
            return Ok(false);
        };
        task.public = public;
        Ok(true)
    }

    async fn list_public_tasks(
        &self,
        kind: Option<TaskKind>,
        offset: i64,
        limit: i64,
    ) -> Result<Page<Task>, StoreError> {
        self.check_read()?;
        let tasks = self
            .lock()
            .tasks
            .iter()
            .filter(|task| task.public && kind.map_or(true, |kind| task.kind == kind))
            .cloned()
            .collect();
        Ok(page(tasks, offset, limit))
    }

    async fn list_user_tasks(
        &self,
        user_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Page<Task>, StoreError> {
        self.check_read()?;
        let tasks =
            self.lock().tasks.iter().filter(|task| task.user_id == user_id).cloned().collect();
        Ok(page(tasks, offset, limit))
    }

    async fn random_public_alias(&self) -> Result<Option<String>, StoreError> {
        self.check_read()?;
        let state = self.lock();
        let public: Vec<&Task> = state.tasks.iter().filter(|task| task.public).collect();
        Ok(public.choose(&mut rand::thread_rng()).map(|task| task.alias.clone()))
    }

    async fn create_pending_submission(
        &self,
        alias: &str,
        answers: &[String],
    ) -> Result<i64, StoreError> {
        self.check_write()?;
        let mut state = self.lock();
        state.next_submission_id += 1;
        let id = state.next_submission_id;
        state.submissions.push(Submission {
            id,
            task_alias: alias.to_string(),
            submission_code: answers.to_vec(),
            status: SubmissionStatus::Pending,
            score: None,
            hints: Vec::new(),
            submitted_at: now_utc(),
            completed_at: None,
        });
        Ok(id)
    }

    async fn find_submission(&self, id: i64) -> Result<Option<Submission>, StoreError> {
        self.check_read()?;
        Ok(self.submission(id))
    }

    async fn complete_submission(
        &self,
        id: i64,
        outcome: &SubmissionOutcome,
    ) -> Result<bool, StoreError> {
        self.check_write()?;
        if self.fail_outcome_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("outcome writes disabled".into()));
        }
        let mut state = self.lock();
        let Some(submission) = state
            .submissions
            .iter_mut()
            .find(|s| s.id == id && s.status == SubmissionStatus::Pending)
        else {
            return Ok(false);
        };
        submission.status = outcome.status;
        submission.score = outcome.score;
        submission.hints = outcome.hints.clone();
        submission.completed_at = Some(now_utc());
        Ok(true)
    }

    async fn force_fail_submission(&self, id: i64) -> Result<bool, StoreError> {
        self.check_write()?;
        let mut state = self.lock();
        let Some(submission) = state
            .submissions
            .iter_mut()
            .find(|s| s.id == id && s.status == SubmissionStatus::Pending)
        else {
            return Ok(false);
        };
        submission.status = SubmissionStatus::Failed;
        submission.completed_at = Some(now_utc());
        Ok(true)
    }

    async fn fail_stale_submissions(
        &self,
        submitted_before: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        self.check_write()?;
        let now = now_utc();
        let mut failed = 0;
        for submission in self.lock().submissions.iter_mut() {
            if submission.status == SubmissionStatus::Pending
                && submission.submitted_at < submitted_before
            {
                submission.status = SubmissionStatus::Failed;
                submission.completed_at = Some(now);
                failed += 1;
            }
        }
        Ok(failed)
    }

    async fn create_user(&self, email: &str, hashed_password: String) -> Result<User, StoreError> {
        self.check_write()?;
        let mut state = self.lock();
        if state.users.iter().any(|user| user.email.eq_ignore_ascii_case(email)) {
            return Err(StoreError::Duplicate("email"));
        }
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            hashed_password,
            created_at: now_utc(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.check_read()?;
        Ok(self.lock().users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.check_read()?;
        Ok(self.lock().users.iter().find(|user| user.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn save_refresh_token(
        &self,
        id: &str,
        user_id: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        self.lock().refresh_tokens.push(StoredRefreshToken {
            id: id.to_string(),
            user_id: user_id.to_string(),
            expires_at,
        });
        Ok(())
    }

    async fn consume_refresh_token(&self, id: &str) -> Result<Option<String>, StoreError> {
        self.check_write()?;
        let now = now_utc();
        let mut state = self.lock();
        let Some(index) = state.refresh_tokens.iter().position(|token| token.id == id) else {
            return Ok(None);
        };
        if state.refresh_tokens[index].expires_at <= now {
            return Ok(None);
        }
        Ok(Some(state.refresh_tokens.remove(index).user_id))
    }

    async fn revoke_refresh_token(&self, id: &str) -> Result<bool, StoreError> {
        self.check_write()?;
        let mut state = self.lock();
        let before = state.refresh_tokens.len();
        state.refresh_tokens.retain(|token| token.id != id);
        Ok(state.refresh_tokens.len() < before)
    }

    async fn purge_expired_refresh_tokens(&self) -> Result<u64, StoreError> {
        self.check_write()?;
        let now = now_utc();
        let mut state = self.lock();
        let before = state.refresh_tokens.len();
        state.refresh_tokens.retain(|token| token.expires_at > now);
        Ok((before - state.refresh_tokens.len()) as u64)
    }
}

/// Status cache kept in process memory. Entries never expire.
#[derive(Default)]
pub(crate) struct InMemoryStatusCache {
    entries: StdMutex<HashMap<String, TaskStatus>>,
}

impl InMemoryStatusCache {
    pub(crate) fn seed(&self, alias: &str, status: TaskStatus) {
        self.entries.lock().expect("status lock").insert(alias.to_string(), status);
    }

    pub(crate) fn peek(&self, alias: &str) -> Option<TaskStatus> {
        self.entries.lock().expect("status lock").get(alias).cloned()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.lock().expect("status lock").is_empty()
    }
}

#[async_trait]
impl StatusCache for InMemoryStatusCache {
    async fn set(&self, alias: &str, status: &TaskStatus) -> Result<(), CacheError> {
        self.seed(alias, status.clone());
        Ok(())
    }

    async fn get(&self, alias: &str) -> Result<Option<TaskStatus>, CacheError> {
        Ok(self.peek(alias))
    }

    async fn set_if_absent(&self, alias: &str, status: &TaskStatus) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().expect("status lock");
        if entries.contains_key(alias) {
            return Ok(false);
        }
        entries.insert(alias.to_string(), status.clone());
        Ok(true)
    }
}

/// Replays queued answers in order and records every prompt it was sent.
/// An exhausted script answers with `EmptyAnswer`.
#[derive(Default)]
pub(crate) struct ScriptedGenerator {
    answers: StdMutex<VecDeque<Result<String, UpstreamError>>>,
    prompts: StdMutex<Vec<(String, String)>>,
}

impl ScriptedGenerator {
    pub(crate) fn push_ok(&self, answer: &str) {
        self.answers.lock().expect("script lock").push_back(Ok(answer.to_string()));
    }

    pub(crate) fn push_err(&self, err: UpstreamError) {
        self.answers.lock().expect("script lock").push_back(Err(err));
    }

    pub(crate) fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().expect("prompt lock").clone()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn send(&self, system: &str, user: &str) -> Result<String, UpstreamError> {
        self.prompts.lock().expect("prompt lock").push((system.to_string(), user.to_string()));
        self.answers
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(Err(UpstreamError::EmptyAnswer))
    }
}

/// State over fresh fakes, for tests that build their own `Settings`.
pub(crate) fn fake_state(settings: Settings) -> AppState {
    let redis = RedisHandle::new(settings.redis().redis_url());
    AppState::new(
        settings,
        redis,
        Arc::new(InMemoryRecordStore::default()),
        Arc::new(InMemoryStatusCache::default()),
        Arc::new(ScriptedGenerator::default()),
    )
}

/// Polls `condition` until it holds, panicking after two seconds.
pub(crate) async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub(crate) fn bearer_token(user_id: &str, settings: &Settings) -> String {
    security::create_access_token(user_id, settings, None).expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
