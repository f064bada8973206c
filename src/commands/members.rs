use anyhow::Result;

use crate::client::HttpMonitorClient;
use crate::commands::{api_error, require_token};
use crate::db::Database;
use crate::format::format_compact;
use crate::models::MemberStatus;

pub fn run(db: &Database, client: &HttpMonitorClient, json: bool) -> Result<Vec<MemberStatus>> {
    let token = require_token(db)?;
    let members = client
        .members_status(&token)
        .map_err(|e| api_error(e, "Failed to fetch member statuses"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&members)?);
    } else {
        print!("{}", members_table(&members));
    }

    Ok(members)
}

fn members_table(members: &[MemberStatus]) -> String {
    if members.is_empty() {
        return "No members found.\n".to_string();
    }

    let width = members
        .iter()
        .map(|m| m.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);

    let mut out = String::new();
    for m in members {
        out.push_str(&format!(
            "#{:<4} {:<width$} {:<7} {}\n",
            m.id,
            m.name,
            m.status,
            format_compact(m.total_seconds),
            width = width
        ));
    }
    let active = members.iter().filter(|m| m.status.is_active()).count();
    out.push_str(&format!("{} of {} active\n", active, members.len()));
    out
}
