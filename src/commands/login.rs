use anyhow::{bail, Context, Result};
use tracing::info;

use crate::auth::TokenStore;
use crate::client::HttpMonitorClient;
use crate::db::Database;
use crate::error::FetchError;

pub fn login(db: &Database, client: &HttpMonitorClient, username: &str, password: &str) -> Result<()> {
    if username.trim().is_empty() {
        bail!("Username cannot be empty");
    }
    if password.is_empty() {
        bail!("Password cannot be empty");
    }

    let response = match client.login(username, password) {
        Ok(r) => r,
        Err(FetchError::Http { status: 400, .. }) => bail!("Invalid credentials for '{}'", username),
        Err(e) => return Err(e).context("Login failed"),
    };

    TokenStore::new(db).write(&response.token)?;
    info!(user_id = response.user.id, "stored new token");
    println!("Logged in as {}", response.user.username);

    Ok(())
}

pub fn logout(db: &Database) -> Result<()> {
    if TokenStore::new(db).clear()? {
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}
