use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use url::Url;

use crate::auth::Credentials;
use crate::client::{MonitorApi, TrackerAction};
use crate::error::FetchError;
use crate::models::{ProjectId, TrackedSession, TrackerStatus};

#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    sessions: HashMap<ProjectId, (TrackerStatus, u64)>,
    failures: VecDeque<FetchError>,
    calls: Vec<(TrackerAction, ProjectId)>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeApi::default())
    }

    pub fn set_session(&self, project: ProjectId, status: TrackerStatus, total_seconds: u64) {
        self.state
            .lock()
            .unwrap()
            .sessions
            .insert(project, (status, total_seconds));
    }

    pub fn fail_next(&self, err: FetchError) {
        self.state.lock().unwrap().failures.push_back(err);
    }

    pub fn calls(&self) -> Vec<(TrackerAction, ProjectId)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }
}

impl MonitorApi for FakeApi {
    fn session(
        &self,
        action: TrackerAction,
        creds: &Credentials,
    ) -> Result<TrackedSession, FetchError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((action, creds.project));
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }

        let entry = state
            .sessions
            .entry(creds.project)
            .or_insert((TrackerStatus::Paused, 0));
        match action {
            TrackerAction::Status => {}
            TrackerAction::Start => entry.0 = TrackerStatus::Active,
            TrackerAction::Stop => entry.0 = TrackerStatus::Paused,
        }

        Ok(TrackedSession {
            member: Some(1),
            project: Some(creds.project),
            status: entry.0,
            total_seconds: entry.1,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }
}

pub struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown: Arc<AtomicBool>,
}

impl StubServer {
    pub fn serve(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let recorded = Arc::clone(&requests);
        let stop = Arc::clone(&shutdown);
        thread::spawn(move || {
            let mut queue: VecDeque<(u16, String)> = responses.into();
            for stream in listener.incoming() {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                let Some(request) = read_request(&stream) else { continue };
                recorded.lock().unwrap().push(request);
                let (status, body) = queue
                    .pop_front()
                    .unwrap_or((500, r#"{"detail": "no stubbed response"}"#.to_string()));
                write_response(stream, status, &body);
            }
        });

        StubServer { addr, requests, shutdown }
    }

    pub fn base_url(&self) -> Url {
        crate::config::parse_api_base(&format!("http://{}/api/", self.addr)).unwrap()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake the accept loop so it can observe the flag.
        let _ = TcpStream::connect(self.addr);
    }
}

fn read_request(stream: &TcpStream) -> Option<RecordedRequest> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).ok()?;

    Some(RecordedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn write_response(mut stream: TcpStream, status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        _ => "Error",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
