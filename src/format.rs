use crate::widget::{Affordance, Disabled, Phase, TrackerView};

pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

pub fn format_compact(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, total_seconds % 60)
    } else {
        format!("{}s", total_seconds)
    }
}

fn state_text(view: &TrackerView) -> &'static str {
    match view.phase {
        Phase::Disabled(Disabled::NotAuthenticated) => "log in to track",
        Phase::Disabled(Disabled::NoProject) => "select a project",
        Phase::Uninitialized | Phase::Loading => "loading...",
        Phase::Active => "running",
        Phase::Paused => "paused",
        Phase::Stopped => "stopped",
    }
}

fn affordance_text(affordance: Affordance) -> &'static str {
    match affordance {
        Affordance::Start => "[start]",
        Affordance::Pause => "[pause]",
        Affordance::Busy => "[...]",
        Affordance::Unavailable => "[--]",
    }
}

pub fn render_line(view: &TrackerView) -> String {
    let project = view
        .project
        .map(|p| format!("#{}", p))
        .unwrap_or_else(|| "-".to_string());

    let mut line = format!(
        "{:<8} {:<5} {} {:<15} {}",
        view.label,
        project,
        view.display,
        state_text(view),
        affordance_text(view.affordance)
    );
    if let Some(err) = &view.error {
        line.push_str("  ! ");
        line.push_str(err);
    }
    line
}
