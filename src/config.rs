use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_projects_dir")]
    pub projects_dir: PathBuf,
    #[serde(default = "default_exports_dir")]
    pub exports_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            projects_dir: default_projects_dir(),
            exports_dir: default_exports_dir(),
        }
    }
}

fn default_projects_dir() -> PathBuf {
    PathBuf::from("projects")
}
fn default_exports_dir() -> PathBuf {
    PathBuf::from("exports")
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_limit")]
    pub default_limit: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
        }
    }
}

fn default_search_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_workstream")]
    pub default_workstream: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_workstream: default_workstream(),
        }
    }
}

fn default_workstream() -> String {
    "research".to_string()
}

impl Config {
    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.workspace.projects_dir.join(project)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    if config.search.default_limit < 1 {
        anyhow::bail!("search.default_limit must be >= 1");
    }

    if config.ingest.default_workstream.trim().is_empty() {
        anyhow::bail!("ingest.default_workstream must not be empty");
    }

    Ok(config)
}
