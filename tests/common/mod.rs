#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use ai_medical_reports::{
    AppState, Config,
    llm::{GenerateRequest, GenerateResponse, LlmClient, Provider},
    models::{NewReport, PageCursor, Report, ReportChanges, ReportSummary, User},
    pipeline::{ContentDispatcher, ReportPipeline},
    prompts::BuiltinPromptResolver,
    repository::{ReportStore, UserStore},
    services::{AuthService, ReportService},
    storage::{BlobStore, PutOptions, RetryPolicy, VerifiedWriter},
};

pub const JWT_SECRET: &str = "integration-test-secret";

#[derive(Default)]
pub struct MemoryReports {
    rows: Mutex<HashMap<Uuid, Report>>,
    clock: Mutex<Option<DateTime<Utc>>>,
    frozen_clock: Mutex<bool>,
    fail_inserts: Mutex<bool>,
}

impl MemoryReports {
    pub fn get(&self, id: Uuid) -> Option<Report> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Every later write gets the same timestamp.
    pub fn set_frozen_clock(&self, on: bool) {
        *self.frozen_clock.lock().unwrap() = on;
    }

    pub fn set_fail_inserts(&self, on: bool) {
        *self.fail_inserts.lock().unwrap() = on;
    }

    /// Strictly increasing timestamps unless the clock is frozen.
    fn tick(&self) -> DateTime<Utc> {
        let frozen = *self.frozen_clock.lock().unwrap();
        let mut clock = self.clock.lock().unwrap();
        let next = match *clock {
            Some(last) if frozen => last,
            Some(last) => last + chrono::Duration::milliseconds(1),
            None => Utc::now(),
        };
        *clock = Some(next);
        next
    }
}

#[async_trait::async_trait]
impl ReportStore for MemoryReports {
    async fn insert(&self, report: &NewReport<'_>) -> Result<Report, sqlx::Error> {
        if *self.fail_inserts.lock().unwrap() {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let now = self.tick();
        let row = Report {
            id: report.id,
            user_id: report.user_id,
            title: report.title.to_string(),
            report_type: report.report_type.to_string(),
            subject_name: report.inputs.subject_name.clone(),
            subject_info: report.inputs.subject_info.clone(),
            notes: report.inputs.notes.clone(),
            blob_key: report.blob_key.to_string(),
            blob_url: report.blob_url.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Report>, sqlx::Error> {
        Ok(self.get(id).filter(|r| r.user_id == user_id))
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        changes: &ReportChanges,
    ) -> Result<Option<Report>, sqlx::Error> {
        let now = self.tick();
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&id).filter(|r| r.user_id == user_id) else {
            return Ok(None);
        };

        if let Some(v) = &changes.title {
            row.title = v.clone();
        }
        if let Some(v) = &changes.report_type {
            row.report_type = v.clone();
        }
        if let Some(v) = &changes.subject_name {
            row.subject_name = v.clone();
        }
        if let Some(v) = &changes.subject_info {
            row.subject_info = v.clone();
        }
        if let Some(v) = &changes.notes {
            row.notes = v.clone();
        }
        if let Some(v) = &changes.blob_url {
            row.blob_url = v.clone();
        }
        row.updated_at = now;

        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<Option<Report>, sqlx::Error> {
        let mut rows = self.rows.lock().unwrap();
        if rows.get(&id).is_some_and(|r| r.user_id == user_id) {
            Ok(rows.remove(&id))
        } else {
            Ok(None)
        }
    }

    async fn list_by_owner(
        &self,
        user_id: Uuid,
        cursor: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<ReportSummary>, sqlx::Error> {
        let mut owned: Vec<Report> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| (b.updated_at, b.id).cmp(&(a.updated_at, a.id)));

        let limit = limit as usize;
        let page: Vec<Report> = match cursor {
            None => owned.into_iter().take(limit).collect(),
            Some(PageCursor::After(at, id)) => owned
                .into_iter()
                .filter(|r| (r.updated_at, r.id) < (at, id))
                .take(limit)
                .collect(),
            Some(PageCursor::Before(at, id)) => {
                let mut newer: Vec<Report> = owned
                    .into_iter()
                    .filter(|r| (r.updated_at, r.id) > (at, id))
                    .rev()
                    .take(limit)
                    .collect();
                newer.reverse();
                newer
            }
        };

        Ok(page
            .into_iter()
            .map(|r| ReportSummary {
                id: r.id,
                title: r.title,
                report_type: r.report_type,
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<HashMap<Uuid, User>>,
}

#[async_trait::async_trait]
impl UserStore for MemoryUsers {
    async fn create(
        &self,
        first_name: &str,
        last_name: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        let user = User {
            id: Uuid::new_v4(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        self.users.lock().unwrap().insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.first_name == first_name && u.last_name == last_name)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }
}

/// Blob store backed by a map. Each put bumps a version suffix on the returned
/// URL, and `mangle_reads` makes every read come back far too short.
#[derive(Default)]
pub struct MemoryBlobs {
    blobs: Mutex<HashMap<String, String>>,
    version: AtomicU32,
    pub puts: AtomicU32,
    pub reads: AtomicU32,
    mangle_reads: Mutex<bool>,
    fail_reads: Mutex<bool>,
}

impl MemoryBlobs {
    pub fn set_mangle_reads(&self, on: bool) {
        *self.mangle_reads.lock().unwrap() = on;
    }

    pub fn set_fail_reads(&self, on: bool) {
        *self.fail_reads.lock().unwrap() = on;
    }

    pub fn content_at(&self, url: &str) -> Option<String> {
        self.blobs.lock().unwrap().get(key_of(url)).cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }
}

fn key_of(url: &str) -> &str {
    let path = url.strip_prefix("mem://").unwrap_or(url);
    path.split('?').next().unwrap_or(path)
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobs {
    async fn put(&self, key: &str, content: &str, options: PutOptions) -> anyhow::Result<String> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let mut blobs = self.blobs.lock().unwrap();
        if blobs.contains_key(key) && !options.overwrite {
            anyhow::bail!("blob already exists: {key}");
        }
        blobs.insert(key.to_string(), content.to_string());
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("mem://{key}?v={version}"))
    }

    async fn get(&self, url: &str) -> anyhow::Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if *self.fail_reads.lock().unwrap() {
            anyhow::bail!("503 blob store unavailable");
        }
        let content = self
            .content_at(url)
            .ok_or_else(|| anyhow::anyhow!("404 blob not found: {url}"))?;
        if *self.mangle_reads.lock().unwrap() {
            return Ok(String::new());
        }
        Ok(content)
    }

    async fn delete(&self, url: &str) -> anyhow::Result<()> {
        self.blobs.lock().unwrap().remove(key_of(url));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Generative backend stub: replies with a fixed text, or numbered replies when
/// `numbered` is set, and counts calls.
pub struct StubProvider {
    reply: String,
    numbered: bool,
    fail: bool,
    pub calls: AtomicU32,
    pub prompts: Mutex<Vec<String>>,
}

impl StubProvider {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            numbered: false,
            fail: false,
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn numbered(reply: &str) -> Self {
        Self {
            numbered: true,
            ..Self::replying(reply)
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::replying("")
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Provider for StubProvider {
    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push(req.prompt.clone());
        if self.fail {
            anyhow::bail!("503 model overloaded");
        }
        let content = if self.numbered {
            format!("{} #{call}", self.reply)
        } else {
            self.reply.clone()
        };
        Ok(GenerateResponse {
            content,
            model: req.model.clone(),
            input_tokens: 12,
            output_tokens: 4,
            finish_reason: "stop".to_string(),
            provider: String::new(),
        })
    }

    fn name(&self) -> &str {
        "google"
    }
}

pub struct Harness {
    pub reports: Arc<MemoryReports>,
    pub users: Arc<MemoryUsers>,
    pub blobs: Arc<MemoryBlobs>,
    pub provider: Arc<StubProvider>,
    pub pipeline: Arc<ReportPipeline>,
    pub state: AppState,
}

pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        initial_delay: Duration::from_millis(1),
        multiplier: 2.0,
        max_delay: Duration::from_millis(10),
        tolerance: 10,
    }
}

pub fn test_config() -> Config {
    Config {
        jwt_secret: JWT_SECRET.to_string(),
        ..Config::default()
    }
}

pub fn harness(provider: StubProvider) -> Harness {
    harness_with(provider, test_config())
}

pub fn harness_with(provider: StubProvider, config: Config) -> Harness {
    let reports = Arc::new(MemoryReports::default());
    let users = Arc::new(MemoryUsers::default());
    let blobs = Arc::new(MemoryBlobs::default());
    let provider = Arc::new(provider);

    let llm = Arc::new(LlmClient::new(provider.clone(), &config));
    let dispatcher = ContentDispatcher::new(Arc::new(BuiltinPromptResolver::new()), llm, &config);
    let writer = VerifiedWriter::new(blobs.clone(), fast_policy());
    let pipeline = Arc::new(ReportPipeline::new(
        reports.clone(),
        blobs.clone(),
        writer,
        dispatcher,
    ));

    let state = AppState {
        auth_service: AuthService::new(users.clone(), &config),
        report_service: ReportService::new(reports.clone(), blobs.clone(), pipeline.clone()),
    };

    Harness {
        reports,
        users,
        blobs,
        provider,
        pipeline,
        state,
    }
}
