pub mod auth;
pub mod bus;
pub mod client;
pub mod clock;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod models;
pub mod ticker;
pub mod widget;

#[cfg(test)]
pub(crate) mod test_support;
