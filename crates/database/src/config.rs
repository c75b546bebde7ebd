//! Environment-style engine configuration.
//!
//! Four options, each read from a named environment variable with typed
//! parsing: an unset or unparsable variable logs a warning and falls back to
//! its default; a valid override logs at info level. This is a one-shot read
//! at process start, so it stays a plain function rather than a long-lived
//! loader type.

use std::path::PathBuf;

const DATA_DIR_VAR: &str = "INFINITEDB_DATA_DIR";
const CACHE_SIZE_VAR: &str = "INFINITEDB_CACHE_SIZE";
const WORKERS_VAR: &str = "INFINITEDB_WORKERS";
const REQUEST_LOGGING_VAR: &str = "INFINITEDB_REQUEST_LOGGING";

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_CACHE_SIZE: usize = 10_000;
const DEFAULT_REQUEST_LOGGING: bool = false;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub cache_size: usize,
    pub workers: usize,
    pub request_logging: bool,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            data_dir: string_var(DATA_DIR_VAR, DEFAULT_DATA_DIR).into(),
            cache_size: parsed_var(CACHE_SIZE_VAR, DEFAULT_CACHE_SIZE),
            workers: parsed_var(WORKERS_VAR, num_cpus::get()),
            request_logging: parsed_var(REQUEST_LOGGING_VAR, DEFAULT_REQUEST_LOGGING),
        }
    }
}

fn string_var(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) => {
            tracing::info!(var = name, value, "configuration overridden by environment");
            value
        },
        Err(_) => default.to_string(),
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => {
                tracing::info!(var = name, value = raw, "configuration overridden by environment");
                value
            },
            Err(_) => {
                tracing::warn!(var = name, value = raw, "could not parse environment override, using default");
                default
            },
        },
        Err(_) => default,
    }
}
