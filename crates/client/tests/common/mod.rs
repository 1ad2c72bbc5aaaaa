//! In-process stub of the KevCal service for integration tests.
//!
//! Each test builds a [`StubService`] with scripted job and mockup
//! responses, then calls [`spawn`] to serve it on an ephemeral port.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use kevcal_client::events::SessionEvent;
use kevcal_client::poller::PollConfig;
use kevcal_client::session::SessionConfig;
use kevcal_core::upload::{CandidateFile, DEFAULT_MAX_UPLOAD_BYTES};
use serde_json::{json, Value};
use tokio::sync::broadcast;

/// Scripted responses plus call counters.
pub struct StubService {
    /// Successive `GET /api/job/{id}` bodies; the last one repeats.
    job_script: Mutex<VecDeque<Value>>,
    /// Successive mockup-status bodies; the last one repeats.
    mockup_script: Mutex<VecDeque<Value>>,
    generate_status: Mutex<StatusCode>,
    mockup_status_code: Mutex<StatusCode>,
    create_product: Mutex<(StatusCode, Value)>,
    pub job_calls: AtomicU32,
    pub mockup_calls: AtomicU32,
    pub upload_calls: AtomicU32,
    pub last_source_file_id: Mutex<Option<String>>,
    pub last_product_job_id: Mutex<Option<String>>,
}

impl Default for StubService {
    fn default() -> Self {
        Self {
            job_script: Mutex::new(VecDeque::from([completed_job(12)])),
            mockup_script: Mutex::new(VecDeque::from([completed_mockup(&["https://cdn/m1.png"])])),
            generate_status: Mutex::new(StatusCode::OK),
            mockup_status_code: Mutex::new(StatusCode::OK),
            create_product: Mutex::new((StatusCode::OK, json!({"task_key": "task-1"}))),
            job_calls: AtomicU32::new(0),
            mockup_calls: AtomicU32::new(0),
            upload_calls: AtomicU32::new(0),
            last_source_file_id: Mutex::new(None),
            last_product_job_id: Mutex::new(None),
        }
    }
}

impl StubService {
    pub fn with_job_script(self, script: Vec<Value>) -> Self {
        *self.job_script.lock().unwrap() = script.into();
        self
    }

    pub fn with_mockup_script(self, script: Vec<Value>) -> Self {
        *self.mockup_script.lock().unwrap() = script.into();
        self
    }

    pub fn with_generate_status(self, status: StatusCode) -> Self {
        *self.generate_status.lock().unwrap() = status;
        self
    }

    /// Answer every mockup-status request with `status`.
    pub fn with_mockup_status_code(self, status: StatusCode) -> Self {
        *self.mockup_status_code.lock().unwrap() = status;
        self
    }

    pub fn with_create_product(self, status: StatusCode, body: Value) -> Self {
        *self.create_product.lock().unwrap() = (status, body);
        self
    }

    pub fn job_calls(&self) -> u32 {
        self.job_calls.load(Ordering::SeqCst)
    }

    pub fn mockup_calls(&self) -> u32 {
        self.mockup_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> u32 {
        self.upload_calls.load(Ordering::SeqCst)
    }
}

fn next_scripted(script: &Mutex<VecDeque<Value>>) -> Value {
    let mut script = script.lock().unwrap();
    if script.len() > 1 {
        script.pop_front().unwrap()
    } else {
        script.front().cloned().unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Response builders
// ---------------------------------------------------------------------------

pub fn processing_job(progress: u32, step: &str) -> Value {
    json!({"status": "processing", "progress": progress, "current_step": step})
}

pub fn completed_job(months: u32) -> Value {
    let images: Vec<Value> = (1..=months)
        .map(|m| json!({"url": format!("/static/month_{m}.jpg"), "month": m, "theme": format!("Theme {m}")}))
        .collect();
    json!({"status": "completed", "progress": 100, "images": images})
}

pub fn failed_job(error: &str) -> Value {
    json!({"status": "failed", "progress": 20, "error": error})
}

pub fn pending_mockup() -> Value {
    json!({"mockup_data": {"result": {"status": "pending"}}})
}

pub fn failed_mockup() -> Value {
    json!({"mockup_data": {"result": {"status": "failed"}}})
}

pub fn completed_mockup(urls: &[&str]) -> Value {
    let mockups: Vec<Value> = urls.iter().map(|u| json!({"mockup_url": u})).collect();
    json!({"mockup_data": {"result": {"status": "completed", "mockups": mockups}}})
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

type Stub = Arc<StubService>;

async fn upload(State(stub): State<Stub>, mut multipart: Multipart) -> impl IntoResponse {
    let n = stub.upload_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let mut filename = String::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or_default().to_string();
            let _ = field.bytes().await;
        }
    }
    Json(json!({"file_id": format!("file-{n}"), "filename": filename}))
}

async fn generate(
    State(stub): State<Stub>,
    Form(form): Form<std::collections::HashMap<String, String>>,
) -> impl IntoResponse {
    *stub.last_source_file_id.lock().unwrap() = form.get("source_file_id").cloned();
    let status = *stub.generate_status.lock().unwrap();
    if status.is_success() {
        (status, Json(json!({"job_id": "job-1"})))
    } else {
        (status, Json(json!({"detail": "generation refused"})))
    }
}

async fn job_status(State(stub): State<Stub>, Path(_id): Path<String>) -> impl IntoResponse {
    stub.job_calls.fetch_add(1, Ordering::SeqCst);
    Json(next_scripted(&stub.job_script))
}

async fn create_product(State(stub): State<Stub>, mut multipart: Multipart) -> impl IntoResponse {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("job_id") {
            let job_id = field.text().await.ok();
            *stub.last_product_job_id.lock().unwrap() = job_id;
        }
    }
    let (status, body) = stub.create_product.lock().unwrap().clone();
    (status, Json(body))
}

async fn mockup_status(State(stub): State<Stub>, Path(_key): Path<String>) -> impl IntoResponse {
    stub.mockup_calls.fetch_add(1, Ordering::SeqCst);
    let status = *stub.mockup_status_code.lock().unwrap();
    if status.is_success() {
        (status, Json(next_scripted(&stub.mockup_script)))
    } else {
        (status, Json(json!({"detail": "Printful unavailable"})))
    }
}

async fn verify() -> impl IntoResponse {
    Json(json!({"connected": true}))
}

async fn project_status() -> impl IntoResponse {
    Json(json!({"project_id": 3, "status": "generating", "months": {"1": "completed"}}))
}

async fn static_image(Path(name): Path<String>) -> impl IntoResponse {
    format!("jpeg bytes for {name}").into_bytes()
}

/// Serve `stub` on an ephemeral localhost port and return its base URL.
pub async fn spawn(stub: Stub) -> String {
    let app = Router::new()
        .route("/api/upload", post(upload))
        .route("/api/generate", post(generate))
        .route("/api/job/{id}", get(job_status))
        .route("/api/printful/create-product", post(create_product))
        .route("/api/printful/mockup-status/{task_key}", get(mockup_status))
        .route("/api/printful/verify", get(verify))
        .route("/api/project/status", get(project_status))
        .route("/static/{name}", get(static_image))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });

    format!("http://{addr}")
}

// ---------------------------------------------------------------------------
// Session helpers
// ---------------------------------------------------------------------------

/// Session config with millisecond poll intervals.
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        job_poll: PollConfig {
            interval: Duration::from_millis(5),
            max_attempts: None,
        },
        mockup_poll: PollConfig {
            interval: Duration::from_millis(5),
            max_attempts: Some(30),
        },
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    }
}

/// Write `names` as small image files under `dir`.
pub fn image_files(dir: &std::path::Path, names: &[&str]) -> Vec<CandidateFile> {
    names
        .iter()
        .map(|name| {
            let path: PathBuf = dir.join(name);
            std::fs::write(&path, b"\xFF\xD8\xFF fake jpeg").expect("write test image");
            CandidateFile::from_path(&path).expect("stat test image")
        })
        .collect()
}

/// Drain every event currently buffered on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Messages of every notice in `events`.
pub fn notices(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Notice { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}
