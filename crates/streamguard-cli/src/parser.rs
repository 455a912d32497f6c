use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use streamguard_core::CheckParams;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Name shown in reports, the source file stem when absent.
    pub name: Option<String>,
    pub source: Source,
    #[serde(default, rename = "check")]
    pub checks: Vec<Check>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Source {
    pub path: String,
    pub format: Option<String>,
    pub batch_size: Option<usize>,
    pub delimiter: Option<char>,
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Full,
    Sampled,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Check {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub mode: Mode,
    pub sample_size: Option<usize>,
    pub seed: Option<u64>,
    pub tolerance: Option<f64>,
    #[serde(default)]
    pub params: CheckParams,
}

pub fn parse_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn parse_str(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}
