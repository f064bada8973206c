use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::auth::Credentials;
use crate::error::FetchError;
use crate::models::{
    BreakPolicy, BreakSession, BreakStopOutcome, LoginResponse, MemberStatus, NewBreakPolicy,
    TrackedSession,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerAction {
    Status,
    Start,
    Stop,
}

impl TrackerAction {
    pub fn path(self) -> &'static str {
        match self {
            TrackerAction::Status => "monitor/status/",
            TrackerAction::Start => "monitor/start/",
            TrackerAction::Stop => "monitor/stop/",
        }
    }

    fn is_mutation(self) -> bool {
        !matches!(self, TrackerAction::Status)
    }
}

impl fmt::Display for TrackerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerAction::Status => f.write_str("status"),
            TrackerAction::Start => f.write_str("start"),
            TrackerAction::Stop => f.write_str("stop"),
        }
    }
}

pub trait MonitorApi: Send + Sync {
    fn session(&self, action: TrackerAction, creds: &Credentials)
        -> Result<TrackedSession, FetchError>;
}

pub struct HttpMonitorClient {
    http: Client,
    base: Url,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct BreakStartBody {
    policy_id: i64,
}

impl HttpMonitorClient {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(HttpMonitorClient { http, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path)
            .map_err(|e| FetchError::Network(format!("invalid endpoint '{}': {}", path, e)))
    }

    fn authorized(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder
            .header("Authorization", format!("Token {}", token))
            .header("Content-Type", "application/json")
    }

    pub fn login(&self, username: &str, password: &str) -> Result<LoginResponse, FetchError> {
        let url = self.endpoint("auth/login/")?;
        debug!(%url, username, "POST login");
        let response = self
            .http
            .post(url)
            .json(&LoginBody { username, password })
            .send()?;
        decode(response)
    }

    pub fn members_status(&self, token: &str) -> Result<Vec<MemberStatus>, FetchError> {
        let url = self.endpoint("monitor/members-status/")?;
        debug!(%url, "GET members status");
        let response = self.authorized(self.http.get(url), token).send()?;
        decode(response)
    }

    pub fn break_status(&self, token: &str) -> Result<BreakSession, FetchError> {
        let url = self.endpoint("monitor/break/status/")?;
        debug!(%url, "GET break status");
        let response = self.authorized(self.http.get(url), token).send()?;
        decode(response)
    }

    pub fn break_policies(&self, token: &str) -> Result<Vec<BreakPolicy>, FetchError> {
        let url = self.endpoint("monitor/break/policies/")?;
        debug!(%url, "GET break policies");
        let response = self.authorized(self.http.get(url), token).send()?;
        decode(response)
    }

    pub fn break_policy_create(
        &self,
        token: &str,
        policy: &NewBreakPolicy,
    ) -> Result<BreakPolicy, FetchError> {
        let url = self.endpoint("monitor/break/policies/")?;
        debug!(%url, name = %policy.name, "POST break policy");
        let response = self
            .authorized(self.http.post(url), token)
            .json(policy)
            .send()?;
        decode(response)
    }

    pub fn break_policy_delete(&self, token: &str, policy_id: i64) -> Result<(), FetchError> {
        let url = self.endpoint(&format!("monitor/break/policies/{}/", policy_id))?;
        debug!(%url, policy_id, "DELETE break policy");
        let response = self.authorized(self.http.delete(url), token).send()?;
        successful_body(response).map(|_| ())
    }

    pub fn break_start(&self, token: &str, policy_id: i64) -> Result<BreakSession, FetchError> {
        let url = self.endpoint("monitor/break/start/")?;
        debug!(%url, policy_id, "POST break start");
        let response = self
            .authorized(self.http.post(url), token)
            .json(&BreakStartBody { policy_id })
            .send()?;
        decode(response)
    }

    pub fn break_stop(&self, token: &str) -> Result<BreakStopOutcome, FetchError> {
        let url = self.endpoint("monitor/break/stop/")?;
        debug!(%url, "POST break stop");
        let response = self.authorized(self.http.post(url), token).send()?;
        decode(response)
    }
}

impl MonitorApi for HttpMonitorClient {
    fn session(
        &self,
        action: TrackerAction,
        creds: &Credentials,
    ) -> Result<TrackedSession, FetchError> {
        if creds.token.trim().is_empty() {
            return Err(FetchError::MissingAuth);
        }
        if creds.project <= 0 {
            return Err(FetchError::MissingProject);
        }

        let mut url = self.endpoint(action.path())?;
        url.query_pairs_mut()
            .append_pair("project", &creds.project.to_string());

        let builder = if action.is_mutation() {
            self.http.post(url.clone())
        } else {
            self.http.get(url.clone())
        };
        debug!(%url, %action, "calling monitor API");

        let response = self.authorized(builder, &creds.token).send()?;
        let mut session: TrackedSession = decode(response)?;
        session.project = Some(creds.project);
        Ok(session)
    }
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
    let body = successful_body(response)?;
    Ok(serde_json::from_str(&body)?)
}

fn successful_body(response: Response) -> Result<String, FetchError> {
    let status = response.status();
    let body = response.text()?;

    if !status.is_success() {
        warn!(status = status.as_u16(), "monitor API rejected request");
        return Err(FetchError::Http {
            status: status.as_u16(),
            body: truncate(&body, 200),
        });
    }
    Ok(body)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
