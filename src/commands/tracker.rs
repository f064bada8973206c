use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::SessionContext;
use crate::bus::EventBus;
use crate::client::MonitorApi;
use crate::db::Database;
use crate::format::render_line;
use crate::models::ProjectId;
use crate::widget::{Disabled, Mount, Phase, TrackerView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerCommand {
    Status,
    Start,
    Stop,
    Toggle,
}

#[derive(Serialize)]
struct StatusJson<'a> {
    project: Option<ProjectId>,
    status: &'a str,
    total_seconds: u64,
    display: &'a str,
    last_sync: Option<DateTime<Utc>>,
}

pub fn run(
    db: &Database,
    api: Arc<dyn MonitorApi>,
    command: TrackerCommand,
    project: Option<ProjectId>,
    json: bool,
) -> Result<TrackerView> {
    let context = SessionContext::load(db)?.with_project(project);
    let widget = Mount::new("tracker", context, api, EventBus::new()).mount();

    let view = match command {
        TrackerCommand::Status => widget.view(),
        TrackerCommand::Start => widget.start(),
        TrackerCommand::Stop => widget.stop(),
        TrackerCommand::Toggle => widget.toggle(),
    };
    let rejected = widget
        .last_error()
        .is_some_and(|err| err.is_auth_rejection());
    widget.unmount();

    match view.phase {
        Phase::Disabled(Disabled::NotAuthenticated) => {
            bail!("Not logged in. Run 'timepulse login <username>' first.")
        }
        Phase::Disabled(Disabled::NoProject) => {
            bail!("No project selected. Run 'timepulse select <project>' or pass --project.")
        }
        _ => {}
    }

    if json {
        let out = StatusJson {
            project: view.project,
            status: if view.is_active() { "active" } else { "paused" },
            total_seconds: view.seconds,
            display: &view.display,
            last_sync: view.last_sync,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", render_line(&view));
    }

    if rejected {
        bail!("Stored token was rejected by the server. Run 'timepulse login <username>' again.");
    }
    if let Some(err) = &view.error {
        bail!("{} failed: {}", describe(command), err);
    }

    Ok(view)
}

fn describe(command: TrackerCommand) -> &'static str {
    match command {
        TrackerCommand::Status => "Status fetch",
        TrackerCommand::Start => "Start",
        TrackerCommand::Stop => "Stop",
        TrackerCommand::Toggle => "Toggle",
    }
}
