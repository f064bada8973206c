use anyhow::{bail, Result};

use crate::auth::{clear_project, select_project, selected_project};
use crate::db::{Database, SELECTED_PROJECT_KEY};
use crate::models::ProjectId;

pub fn select(db: &Database, project: ProjectId) -> Result<()> {
    if project <= 0 {
        bail!("Project id must be positive, got {}", project);
    }
    select_project(db, project)?;
    println!("Selected project #{}", project);
    Ok(())
}

pub fn clear(db: &Database) -> Result<()> {
    if clear_project(db)? {
        println!("Cleared project selection.");
    } else {
        println!("No project was selected.");
    }
    Ok(())
}

pub fn show(db: &Database) -> Result<()> {
    match selected_project(db)? {
        Some(project) => match db.get_entry(SELECTED_PROJECT_KEY)? {
            Some(entry) => println!(
                "Selected project: #{} (since {})",
                project,
                entry.updated_at.format("%Y-%m-%d %H:%M UTC")
            ),
            None => println!("Selected project: #{}", project),
        },
        None => println!("No project selected. Run 'timepulse select <project>'."),
    }
    Ok(())
}
