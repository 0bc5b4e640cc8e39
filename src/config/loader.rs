//! Configuration loading from disk.
//!
//! The configuration document is JSON (spec'd in `config/schema.rs`). Every
//! string leaf is passed through `${NAME}` environment-variable
//! substitution before the document is deserialized, so env references can
//! appear inside nested objects and arrays alike.

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};
use serde_json::Value;
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, environment-substitute, and validate configuration from a JSON file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut raw: Value = serde_json::from_str(&content)?;
    substitute_env(&mut raw);

    let config: ServerConfig = serde_json::from_value(raw)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a JSON document already read into memory (used by the watcher,
/// which re-reads the file itself to compare mtimes first).
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let mut raw: Value = serde_json::from_str(content)?;
    substitute_env(&mut raw);
    let config: ServerConfig = serde_json::from_value(raw)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Recursively replace `${NAME}` substrings in every string leaf with
/// `std::env::var("NAME")`. A missing variable leaves the literal in place
/// (per spec §6).
fn substitute_env(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(replaced) = substitute_env_str(s) {
                *s = replaced;
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute_env(item);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                substitute_env(v);
            }
        }
        _ => {}
    }
}

fn substitute_env_str(input: &str) -> Option<String> {
    if !input.contains("${") {
        return None;
    }
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    let mut changed = false;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = input[i + 2..].find('}') {
                let name = &input[i + 2..i + 2 + end];
                match std::env::var(name) {
                    Ok(val) => {
                        out.push_str(&val);
                        changed = true;
                    }
                    Err(_) => out.push_str(&input[i..i + 3 + end]),
                }
                i += 3 + end;
                continue;
            }
        }
        out.push(input[i..].chars().next().unwrap());
        i += input[i..].chars().next().unwrap().len_utf8();
    }
    if changed {
        Some(out)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_env_var() {
        std::env::set_var("FLEETFRONT_TEST_VAR", "backend.internal");
        let mut v = Value::String("http://${FLEETFRONT_TEST_VAR}:8080".to_string());
        substitute_env(&mut v);
        assert_eq!(v, Value::String("http://backend.internal:8080".to_string()));
    }

    #[test]
    fn leaves_unknown_var_literal() {
        std::env::remove_var("FLEETFRONT_DOES_NOT_EXIST");
        let mut v = Value::String("${FLEETFRONT_DOES_NOT_EXIST}".to_string());
        substitute_env(&mut v);
        assert_eq!(v, Value::String("${FLEETFRONT_DOES_NOT_EXIST}".to_string()));
    }

    #[test]
    fn parses_minimal_document() {
        let cfg = parse_config("{}").unwrap();
        assert_eq!(cfg.listener.bind_address, "0.0.0.0:8080");
    }
}
