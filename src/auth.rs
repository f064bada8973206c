use anyhow::{Context, Result};

use crate::db::{Database, SELECTED_PROJECT_KEY, TOKEN_KEY};
use crate::models::ProjectId;

pub struct TokenStore<'a> {
    db: &'a Database,
}

impl<'a> TokenStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        TokenStore { db }
    }

    pub fn read(&self) -> Result<Option<String>> {
        let token = self.db.get_item(TOKEN_KEY)?;
        Ok(token.filter(|t| !t.trim().is_empty()))
    }

    pub fn write(&self, token: &str) -> Result<()> {
        self.db.set_item(TOKEN_KEY, token)
    }

    pub fn clear(&self) -> Result<bool> {
        self.db.remove_item(TOKEN_KEY)
    }
}

pub fn selected_project(db: &Database) -> Result<Option<ProjectId>> {
    let raw = db.get_item(SELECTED_PROJECT_KEY)?;
    // Unparseable or non-positive values count as "nothing selected".
    Ok(raw
        .and_then(|v| v.trim().parse::<ProjectId>().ok())
        .filter(|id| *id > 0))
}

pub fn select_project(db: &Database, project: ProjectId) -> Result<()> {
    db.set_item(SELECTED_PROJECT_KEY, &project.to_string())
        .context("Failed to persist selected project")
}

pub fn clear_project(db: &Database) -> Result<bool> {
    db.remove_item(SELECTED_PROJECT_KEY)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    token: Option<String>,
    project: Option<ProjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub project: ProjectId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready(Credentials),
    MissingAuth,
    MissingProject,
}

impl SessionContext {
    pub fn new(token: Option<String>, project: Option<ProjectId>) -> Self {
        SessionContext {
            token: token.filter(|t| !t.trim().is_empty()),
            project: project.filter(|p| *p > 0),
        }
    }

    pub fn load(db: &Database) -> Result<Self> {
        Ok(SessionContext::new(
            TokenStore::new(db).read()?,
            selected_project(db)?,
        ))
    }

    pub fn with_project(mut self, project: Option<ProjectId>) -> Self {
        if let Some(p) = project.filter(|p| *p > 0) {
            self.project = Some(p);
        }
        self
    }

    pub fn project(&self) -> Option<ProjectId> {
        self.project
    }

    pub fn readiness(&self) -> Readiness {
        match (&self.token, self.project) {
            (None, _) => Readiness::MissingAuth,
            (Some(_), None) => Readiness::MissingProject,
            (Some(token), Some(project)) => Readiness::Ready(Credentials {
                token: token.clone(),
                project,
            }),
        }
    }
}
