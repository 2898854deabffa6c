use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::categorize::patterns::PatternSet;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_PATTERNS_FILE: &str = "patterns.toml";
const DEFAULT_COOKIE_FILE: &str = "session_cookies.json";
pub const DEFAULT_LLM_MODEL: &str = "claude-sonnet-4-20250514";

/// Settings read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub network_id: Option<String>,
    /// `Cookie` header value for an authenticated Piazza session.
    pub cookies: Option<String>,
    /// Read only when a command needs a session.
    pub cookie_file: PathBuf,
    pub anthropic_api_key: Option<String>,
    pub llm_model: String,
    pub data_dir: PathBuf,
    pub patterns_file: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // A missing .env is fine; variables may come from the shell.
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            network_id: get("PIAZZA_NETWORK_ID"),
            cookies: get("PIAZZA_COOKIES"),
            cookie_file: get("PIAZZA_COOKIE_FILE")
                .unwrap_or_else(|| DEFAULT_COOKIE_FILE.into())
                .into(),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            llm_model: get("FEEDBACK_LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.into()),
            data_dir: get("FEEDBACK_DATA_DIR")
                .unwrap_or_else(|| DEFAULT_DATA_DIR.into())
                .into(),
            patterns_file: get("FEEDBACK_PATTERNS")
                .unwrap_or_else(|| DEFAULT_PATTERNS_FILE.into())
                .into(),
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("forum.sqlite")
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn analysis_dir(&self) -> PathBuf {
        self.data_dir.join("analysis")
    }

    pub fn require_network_id(&self) -> Result<&str> {
        self.network_id
            .as_deref()
            .ok_or_else(|| anyhow!("PIAZZA_NETWORK_ID must be set (in .env or the environment)"))
    }

    /// Session cookie header: `PIAZZA_COOKIES` if set, else the cookie file.
    pub fn require_cookies(&self) -> Result<String> {
        if let Some(c) = &self.cookies {
            return Ok(c.clone());
        }
        load_cookie_file(&self.cookie_file)?.ok_or_else(|| {
            anyhow!(
                "No Piazza session: set PIAZZA_COOKIES or provide {}",
                self.cookie_file.display()
            )
        })
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.anthropic_api_key
            .as_deref()
            .ok_or_else(|| anyhow!("ANTHROPIC_API_KEY must be set to run the analyzer"))
    }

    /// Patterns from the pattern file, or the built-in defaults when it does not exist.
    pub fn load_patterns(&self) -> Result<PatternSet> {
        if !self.patterns_file.exists() {
            debug!("No pattern file at {}, using defaults", self.patterns_file.display());
            return Ok(PatternSet::default());
        }
        let src = std::fs::read_to_string(&self.patterns_file)
            .with_context(|| format!("Failed to read {}", self.patterns_file.display()))?;
        let set = PatternSet::from_toml(&src)
            .with_context(|| format!("Bad pattern file {}", self.patterns_file.display()))?;
        info!(
            "Loaded {} assignment / {} problem patterns from {}",
            set.assignment.len(),
            set.problem.len(),
            self.patterns_file.display()
        );
        Ok(set)
    }
}

/// A cookie file is either a name → value object or a browser export
/// (`[{"name": .., "value": ..}, ..]`).
#[derive(Deserialize)]
#[serde(untagged)]
enum CookieFile {
    Map(BTreeMap<String, String>),
    List(Vec<CookieEntry>),
}

#[derive(Deserialize)]
struct CookieEntry {
    name: String,
    value: String,
}

/// Read a cookie file and render it as a `Cookie` header.
fn load_cookie_file(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cookie file {}", path.display()))?;
    let cookies = match serde_json::from_str(&raw)
        .with_context(|| format!("Invalid JSON in cookie file {}", path.display()))?
    {
        CookieFile::Map(map) => map,
        CookieFile::List(entries) => entries.into_iter().map(|c| (c.name, c.value)).collect(),
    };
    debug!("Loaded {} cookies from {}", cookies.len(), path.display());
    Ok(Some(cookie_header(&cookies)).filter(|h| !h.is_empty()))
}

pub fn cookie_header(cookies: &BTreeMap<String, String>) -> String {
    cookies
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}
