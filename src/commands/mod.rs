pub mod breaks;
pub mod login;
pub mod members;
pub mod select;
pub mod tracker;
pub mod watch;

use anyhow::{anyhow, bail, Result};

use crate::auth::TokenStore;
use crate::db::Database;
use crate::error::FetchError;

pub(crate) fn require_token(db: &Database) -> Result<String> {
    match TokenStore::new(db).read()? {
        Some(token) => Ok(token),
        None => bail!("Not logged in. Run 'timepulse login <username>' first."),
    }
}

pub(crate) fn api_error(err: FetchError, what: &str) -> anyhow::Error {
    if err.is_auth_rejection() {
        anyhow!(
            "Stored token was rejected ({}). Run 'timepulse login <username>' again.",
            err
        )
    } else {
        anyhow::Error::new(err).context(what.to_string())
    }
}
