use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ProjectId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerStatus {
    Active,
    Paused,
}

impl TrackerStatus {
    pub fn is_active(self) -> bool {
        self == TrackerStatus::Active
    }
}

impl fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerStatus::Active => f.write_str("active"),
            TrackerStatus::Paused => f.write_str("paused"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSession {
    #[serde(default)]
    pub member: Option<i64>,
    /// Filled in client-side from the request; the server never echoes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectId>,
    pub status: TrackerStatus,
    pub total_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberStatus {
    pub id: i64,
    pub name: String,
    pub status: TrackerStatus,
    pub total_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakKind {
    Paid,
    Unpaid,
}

impl FromStr for BreakKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paid" => Ok(BreakKind::Paid),
            "unpaid" => Ok(BreakKind::Unpaid),
            other => Err(format!("Invalid break type '{}'. Must be paid or unpaid", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakPolicy {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub members: Vec<i64>,
    #[serde(default)]
    pub apply_to_new: bool,
    #[serde(default)]
    pub max_minutes_per_day: u32,
    #[serde(rename = "type")]
    pub kind: BreakKind,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewBreakPolicy {
    pub name: String,
    pub members: Vec<i64>,
    pub apply_to_new: bool,
    pub max_minutes_per_day: u32,
    #[serde(rename = "type")]
    pub kind: BreakKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakSession {
    #[serde(default)]
    pub member: Option<i64>,
    #[serde(default)]
    pub policy_name: String,
    pub status: TrackerStatus,
    pub total_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakStopOutcome {
    pub work_session: TrackedSession,
    pub break_session: BreakSession,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_payload() {
        let session: TrackedSession =
            serde_json::from_str(r#"{"member": 3, "status": "active", "total_seconds": 120}"#)
                .unwrap();
        assert_eq!(session.member, Some(3));
        assert_eq!(session.project, None);
        assert_eq!(session.status, TrackerStatus::Active);
        assert_eq!(session.total_seconds, 120);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result: Result<TrackedSession, _> =
            serde_json::from_str(r#"{"member": 3, "status": "running", "total_seconds": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_seconds_are_rejected() {
        let result: Result<TrackedSession, _> =
            serde_json::from_str(r#"{"member": 3, "status": "paused", "total_seconds": -5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_break_policy() {
        let policy: BreakPolicy = serde_json::from_str(
            r#"{"id": 1, "name": "Tea", "members": [2, 3], "apply_to_new": false,
                "max_minutes_per_day": 30, "type": "Paid", "created_at": null}"#,
        )
        .unwrap();
        assert_eq!(policy.kind, BreakKind::Paid);
        assert_eq!(policy.members, vec![2, 3]);
        assert_eq!(policy.max_minutes_per_day, 30);
    }

    #[test]
    fn test_parse_break_stop_outcome() {
        let outcome: BreakStopOutcome = serde_json::from_str(
            r#"{"work_session": {"member": 1, "status": "active", "total_seconds": 60},
                "break_session": {"member": 9, "policy_name": "Meal", "status": "paused", "total_seconds": 900}}"#,
        )
        .unwrap();
        assert!(outcome.work_session.status.is_active());
        assert_eq!(outcome.break_session.policy_name, "Meal");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TrackerStatus::Active.to_string(), "active");
        assert_eq!(TrackerStatus::Paused.to_string(), "paused");
    }

    #[test]
    fn test_break_kind_from_str() {
        assert_eq!("paid".parse::<BreakKind>(), Ok(BreakKind::Paid));
        assert_eq!(" Unpaid ".parse::<BreakKind>(), Ok(BreakKind::Unpaid));
        assert!("free".parse::<BreakKind>().is_err());
    }
}
