use anyhow::{bail, Result};
use tracing::info;

use crate::auth::selected_project;
use crate::bus::{EventBus, EventKind, TrackerEvent};
use crate::client::HttpMonitorClient;
use crate::commands::{api_error, require_token};
use crate::db::Database;
use crate::format::{format_compact, format_hms};
use crate::models::{BreakKind, BreakPolicy, BreakSession, BreakStopOutcome, NewBreakPolicy};

pub fn status(db: &Database, client: &HttpMonitorClient) -> Result<BreakSession> {
    let token = require_token(db)?;
    let session = client
        .break_status(&token)
        .map_err(|e| api_error(e, "Failed to fetch break status"))?;
    println!("{}", describe_break(&session));
    Ok(session)
}

pub fn policies(db: &Database, client: &HttpMonitorClient) -> Result<Vec<BreakPolicy>> {
    let token = require_token(db)?;
    let policies = client
        .break_policies(&token)
        .map_err(|e| api_error(e, "Failed to fetch break policies"))?;

    if policies.is_empty() {
        println!("No break policies apply to you.");
    }
    for p in &policies {
        println!("{}", describe_policy(p));
    }

    Ok(policies)
}

pub fn add_policy(
    db: &Database,
    client: &HttpMonitorClient,
    name: &str,
    kind: &str,
    max_minutes_per_day: u32,
    members: &[i64],
    apply_to_new: bool,
) -> Result<BreakPolicy> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Policy name cannot be empty");
    }
    let kind: BreakKind = match kind.parse() {
        Ok(k) => k,
        Err(msg) => bail!("{}", msg),
    };
    if let Some(bad) = members.iter().find(|m| **m <= 0) {
        bail!("Member id must be positive, got {}", bad);
    }

    let token = require_token(db)?;
    let request = NewBreakPolicy {
        name: name.to_string(),
        members: members.to_vec(),
        apply_to_new,
        max_minutes_per_day,
        kind,
    };
    let policy = client
        .break_policy_create(&token, &request)
        .map_err(|e| api_error(e, &format!("Failed to create break policy '{}'", name)))?;

    info!(policy_id = policy.id, "break policy created");
    println!("Created break policy {}", describe_policy(&policy));
    Ok(policy)
}

pub fn remove_policy(db: &Database, client: &HttpMonitorClient, policy_id: i64) -> Result<()> {
    if policy_id <= 0 {
        bail!("Policy id must be positive, got {}", policy_id);
    }
    let token = require_token(db)?;
    client
        .break_policy_delete(&token, policy_id)
        .map_err(|e| api_error(e, &format!("Failed to delete break policy #{}", policy_id)))?;

    info!(policy_id, "break policy deleted");
    println!("Deleted break policy #{}", policy_id);
    Ok(())
}

pub fn start(
    db: &Database,
    client: &HttpMonitorClient,
    bus: Option<&EventBus>,
    policy_id: i64,
) -> Result<BreakSession> {
    if policy_id <= 0 {
        bail!("Policy id must be positive, got {}", policy_id);
    }
    let token = require_token(db)?;
    let session = client
        .break_start(&token, policy_id)
        .map_err(|e| api_error(e, &format!("Failed to start break with policy #{}", policy_id)))?;

    info!(policy_id, "break started");
    if let Some(bus) = bus {
        announce(db, bus)?;
    }
    println!("Break started: {}", describe_break(&session));
    Ok(session)
}

pub fn stop(
    db: &Database,
    client: &HttpMonitorClient,
    bus: Option<&EventBus>,
) -> Result<BreakStopOutcome> {
    let token = require_token(db)?;
    let outcome = client
        .break_stop(&token)
        .map_err(|e| api_error(e, "Failed to end break"))?;

    info!("break ended");
    if let Some(bus) = bus {
        announce(db, bus)?;
    }
    println!("Break ended: {}", describe_break(&outcome.break_session));
    println!(
        "Work session {} at {}",
        outcome.work_session.status,
        format_hms(outcome.work_session.total_seconds)
    );
    Ok(outcome)
}

fn announce(db: &Database, bus: &EventBus) -> Result<()> {
    let project = selected_project(db)?;
    bus.publish(TrackerEvent {
        origin: None,
        kind: EventKind::BreakChanged { project },
    });
    Ok(())
}

fn describe_policy(p: &BreakPolicy) -> String {
    let kind = match p.kind {
        BreakKind::Paid => "paid",
        BreakKind::Unpaid => "unpaid",
    };
    let limit = if p.max_minutes_per_day == 0 {
        "no daily limit".to_string()
    } else {
        format!("{} min/day", p.max_minutes_per_day)
    };
    format!("#{:<4} {:<20} {:<7} {}", p.id, p.name, kind, limit)
}

fn describe_break(session: &BreakSession) -> String {
    let policy = if session.policy_name.is_empty() {
        "no policy"
    } else {
        session.policy_name.as_str()
    };
    format!(
        "{} ({}), {} today",
        session.status,
        policy,
        format_compact(session.total_seconds)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{select_project, SessionContext, TokenStore};
    use crate::models::TrackerStatus;
    use crate::test_support::{FakeApi, StubServer};
    use crate::widget::{Mount, Phase};
    use std::time::Duration;
    use tempfile::tempdir;

    fn setup_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("storage.db")).unwrap();
        TokenStore::new(&db).write("tok").unwrap();
        (db, dir)
    }

    fn client_for(server: &StubServer) -> HttpMonitorClient {
        HttpMonitorClient::new(server.base_url(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_describe_break() {
        let session = BreakSession {
            member: Some(1),
            policy_name: "Lunch".to_string(),
            status: TrackerStatus::Active,
            total_seconds: 600,
        };
        assert_eq!(describe_break(&session), "active (Lunch), 10m 0s today");
    }

    #[test]
    fn test_start_sends_policy_and_announces() {
        let (db, _dir) = setup_test_db();
        select_project(&db, 42).unwrap();
        let server = StubServer::serve(vec![(
            200,
            r#"{"member": 1, "policy_name": "Lunch", "status": "active", "total_seconds": 0}"#
                .to_string(),
        )]);
        let bus = EventBus::new();

        let session = start(&db, &client_for(&server), Some(&bus), 3).unwrap();
        assert!(session.status.is_active());

        let requests = server.requests();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].target, "/api/monitor/break/start/");
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["policy_id"], 3);

        assert_eq!(
            bus.latest().map(|e| e.kind),
            Some(EventKind::BreakChanged { project: Some(42) })
        );
    }

    #[test]
    fn test_failed_start_does_not_announce() {
        let (db, _dir) = setup_test_db();
        let server = StubServer::serve(vec![(400, r#"{"detail": "limit reached"}"#.to_string())]);
        let bus = EventBus::new();

        assert!(start(&db, &client_for(&server), Some(&bus), 3).is_err());
        assert!(bus.latest().is_none());
    }

    #[test]
    fn test_start_rejects_bad_policy_id() {
        let (db, _dir) = setup_test_db();
        let server = StubServer::serve(vec![]);
        assert!(start(&db, &client_for(&server), None, 0).is_err());
        assert!(server.requests().is_empty());
    }

    #[test]
    fn test_stop_resyncs_mounted_tracker() {
        let (db, _dir) = setup_test_db();
        select_project(&db, 42).unwrap();
        let api = FakeApi::new();
        let bus = EventBus::new();
        let widget = Mount::new(
            "monitor",
            SessionContext::load(&db).unwrap(),
            api.clone(),
            bus.clone(),
        )
        .mount();
        assert_eq!(widget.phase(), Phase::Paused);

        // The server resumes work when the break ends.
        api.set_session(42, TrackerStatus::Active, 1200);
        let server = StubServer::serve(vec![(
            200,
            r#"{"work_session": {"member": 1, "status": "active", "total_seconds": 1200},
                "break_session": {"member": 1, "policy_name": "Lunch", "status": "paused", "total_seconds": 900}}"#
                .to_string(),
        )]);

        let outcome = stop(&db, &client_for(&server), Some(&bus)).unwrap();
        assert!(outcome.work_session.status.is_active());
        assert_eq!(widget.phase(), Phase::Active);
        assert_eq!(api.call_count(), 2);
        widget.unmount();
    }

    #[test]
    fn test_status_requires_login() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("storage.db")).unwrap();
        let server = StubServer::serve(vec![]);
        assert!(status(&db, &client_for(&server)).is_err());
    }

    #[test]
    fn test_add_policy_posts_new_policy() {
        let (db, _dir) = setup_test_db();
        let server = StubServer::serve(vec![(
            201,
            r#"{"id": 5, "name": "Tea", "members": [3], "apply_to_new": false,
                "max_minutes_per_day": 20, "type": "Unpaid", "created_at": null}"#
                .to_string(),
        )]);

        let policy = add_policy(&db, &client_for(&server), " Tea ", "unpaid", 20, &[3], false).unwrap();
        assert_eq!(policy.id, 5);

        let requests = server.requests();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].target, "/api/monitor/break/policies/");
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["name"], "Tea");
        assert_eq!(body["type"], "Unpaid");
        assert_eq!(body["members"], serde_json::json!([3]));
    }

    #[test]
    fn test_add_policy_validates_before_request() {
        let (db, _dir) = setup_test_db();
        let server = StubServer::serve(vec![]);
        let client = client_for(&server);

        assert!(add_policy(&db, &client, "  ", "paid", 10, &[], false).is_err());
        let msg = add_policy(&db, &client, "Tea", "free", 10, &[], false)
            .unwrap_err()
            .to_string();
        assert!(msg.contains("Invalid break type"));
        assert!(add_policy(&db, &client, "Tea", "paid", 10, &[0], false).is_err());
        assert!(server.requests().is_empty());
    }

    #[test]
    fn test_remove_policy_sends_delete() {
        let (db, _dir) = setup_test_db();
        let server = StubServer::serve(vec![(204, String::new())]);

        remove_policy(&db, &client_for(&server), 5).unwrap();
        let requests = server.requests();
        assert_eq!(requests[0].method, "DELETE");
        assert_eq!(requests[0].target, "/api/monitor/break/policies/5/");
        assert_eq!(requests[0].header("authorization").as_deref(), Some("Token tok"));
    }

    #[test]
    fn test_remove_missing_policy_fails() {
        let (db, _dir) = setup_test_db();
        let server = StubServer::serve(vec![(404, r#"{"detail": "Not found."}"#.to_string())]);
        let msg = remove_policy(&db, &client_for(&server), 77).unwrap_err().to_string();
        assert!(msg.contains("Failed to delete break policy #77"));
    }
}
