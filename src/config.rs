use std::{env, path::PathBuf};

use thiserror::Error;

pub const DEFAULT_LOG_PATH: &str = "/var/log/ansible-monitoring";
pub const DEFAULT_UNIT_DIR: &str = "/etc/systemd/system";
pub const DEFAULT_INVENTORY: &str = "inventory.yml";

#[derive(Debug, Clone)]
pub struct Config {
    pub project_path: PathBuf,
    pub log_path: PathBuf,
    pub unit_dir: PathBuf,
    pub template_dir: Option<PathBuf>,
    pub inventory: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is set but empty")]
    EmptyValue(&'static str),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str| -> Result<Option<String>, ConfigError> {
            match lookup(key).map(|value| value.trim().to_string()) {
                Some(value) if value.is_empty() => Err(ConfigError::EmptyValue(key)),
                other => Ok(other),
            }
        };

        let project_path = read("MONITORING_PROJECT_PATH")?
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let log_path = read("MONITORING_LOG_PATH")?
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH));
        let unit_dir = read("MONITORING_UNIT_DIR")?
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UNIT_DIR));
        let template_dir = read("MONITORING_TEMPLATE_DIR")?.map(PathBuf::from);
        let inventory =
            read("MONITORING_INVENTORY")?.unwrap_or_else(|| DEFAULT_INVENTORY.to_string());

        Ok(Self {
            project_path,
            log_path,
            unit_dir,
            template_dir,
            inventory,
        })
    }

    pub fn with_project_path(mut self, project_path: impl Into<PathBuf>) -> Self {
        self.project_path = project_path.into();
        self
    }

    pub fn roles_path(&self) -> PathBuf {
        self.project_path.join("roles")
    }

    pub fn playbooks_path(&self) -> PathBuf {
        self.project_path.join("playbooks")
    }

    pub fn unit_path(&self, file_name: &str) -> PathBuf {
        self.unit_dir.join(file_name)
    }
}
