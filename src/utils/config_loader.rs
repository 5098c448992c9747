use dotenvy::dotenv;
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::{env, fs};
use thiserror::Error;

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Pattern error: {0}")]
    PatternError(#[from] regex::Error),
}

pub async fn load_from_file<T: DeserializeOwned>(file_name: impl AsRef<Path>) -> Result<T, LoadConfigError> {
    dotenv().ok();
    let contents = tokio::fs::read_to_string(file_name).await?;
    parse_expanded(&contents, |name| env::var(name).ok())
}

pub fn load_from_file_sync<T: DeserializeOwned>(file_name: impl AsRef<Path>) -> Result<T, LoadConfigError> {
    dotenv().ok();
    let contents = fs::read_to_string(file_name)?;
    parse_expanded(&contents, |name| env::var(name).ok())
}

/// Parse TOML after substituting `${VAR}` placeholders through `lookup`
pub fn parse_expanded<T, F>(raw_config: &str, lookup: F) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
    F: Fn(&str) -> Option<String>,
{
    let contents = expand_vars(raw_config, lookup)?;
    Ok(toml::from_str(&contents)?)
}

// Unknown variables are left in place
fn expand_vars<F>(raw_config: &str, lookup: F) -> Result<String, regex::Error>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{([a-zA-Z_][0-9a-zA-Z_]*)\}")?;
    Ok(re
        .replace_all(raw_config, |caps: &Captures| match lookup(&caps[1]) {
            Some(val) => val,
            None => caps[0].to_string(),
        })
        .to_string())
}
