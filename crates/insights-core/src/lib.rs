//! Shared types, configuration and collaborator traits for the insights
//! search backend.
//!
//! Settings are merged by Figment from `config.toml` + `config.<env>.toml` +
//! `APP_*` env vars. The traits in [`traits`] are the seams the query,
//! store, embedding and LLM crates plug into.
#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use config::Settings;
pub use error::{Error, Result};
