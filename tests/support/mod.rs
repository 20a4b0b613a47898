#![allow(dead_code)]

use std::io::Read as _;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use lms_canonical::remote::{CourseSource, RemoteCourse, RemoteError};

pub fn remote_course(id: &str, title: &str, status: &str, tags: &[&str]) -> RemoteCourse {
    RemoteCourse {
        id: id.into(),
        title: title.into(),
        description: String::new(),
        video_url: None,
        status: status.into(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        created_by: None,
        created_at: None,
        updated_at: Some("2025-05-20T12:00:00Z".parse().expect("timestamp")),
    }
}

/// In-process course source with switchable failure and an optional delay.
#[derive(Default)]
pub struct FakeSource {
    courses: Mutex<Vec<RemoteCourse>>,
    fail: AtomicBool,
    calls: AtomicUsize,
    last_limit: AtomicUsize,
    delay: Duration,
}

impl FakeSource {
    pub fn new(courses: Vec<RemoteCourse>) -> Arc<Self> {
        Arc::new(FakeSource {
            courses: Mutex::new(courses),
            ..Default::default()
        })
    }

    pub fn slow(courses: Vec<RemoteCourse>, delay: Duration) -> Arc<Self> {
        Arc::new(FakeSource {
            courses: Mutex::new(courses),
            delay,
            ..Default::default()
        })
    }

    pub fn set_courses(&self, courses: Vec<RemoteCourse>) {
        *self.courses.lock().unwrap() = courses;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_limit(&self) -> usize {
        self.last_limit.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CourseSource for FakeSource {
    async fn list_courses(&self, limit: usize) -> Result<Vec<RemoteCourse>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_limit.store(limit, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: 503,
                body: "service unavailable".into(),
            });
        }
        let courses = self.courses.lock().unwrap().clone();
        Ok(courses.into_iter().take(limit).collect())
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub body: String,
}

/// A tiny_http stand-in for the remote course API.
pub struct CourseApiStub {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CourseApiStub {
    /// `list_body` is served verbatim for `GET /courses`; `None` serves a 500.
    pub fn spawn(list_body: Option<String>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start course api stub");
        let base_url = format!("http://{}/api", server.server_addr());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };

            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let method = request.method().to_string().to_uppercase();
            let url = request.url().to_string();
            recorded.lock().unwrap().push(Recorded {
                method: method.clone(),
                url: url.clone(),
                body: body.clone(),
            });

            let path = url.split('?').next().unwrap_or(&url).to_string();
            let (status, payload) = match (method.as_str(), path.as_str()) {
                ("GET", "/api/courses") => match &list_body {
                    Some(b) => (200, b.clone()),
                    None => (500, r#"{"error":"boom"}"#.to_string()),
                },
                ("POST", "/api/courses") => (201, echo_course("501", &body, true)),
                ("PATCH", p) if p.starts_with("/api/courses/") => {
                    let id = p.trim_start_matches("/api/courses/");
                    (200, echo_course(id, &body, false))
                }
                ("DELETE", p) if p.starts_with("/api/courses/") => (204, String::new()),
                _ => (404, "not found".to_string()),
            };

            let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                .expect("header");
            let _ = request.respond(
                tiny_http::Response::from_string(payload)
                    .with_status_code(status)
                    .with_header(header),
            );
        });

        CourseApiStub {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for CourseApiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn echo_course(id: &str, body: &str, wrapped: bool) -> String {
    let sent: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    let course = serde_json::json!({
        "id": id.parse::<i64>().map(serde_json::Value::from).unwrap_or_else(|_| id.into()),
        "title": sent.get("title").cloned().unwrap_or_else(|| "untitled".into()),
        "status": sent.get("status").cloned().unwrap_or_else(|| "draft".into()),
        "tags": sent.get("tags").cloned().unwrap_or_default(),
        "createdAt": "2025-05-01T09:00:00Z",
        "updatedAt": "2025-05-21T09:00:00Z",
    });
    if wrapped {
        serde_json::json!({ "course": course }).to_string()
    } else {
        course.to_string()
    }
}
