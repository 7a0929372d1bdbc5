use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;
use tracing::{debug, error, info};

use super::{
    decode_section, file_name, lenient_bool, load_yaml, mapping_section, sorted_entries,
    Candidate, CandidateOutcome, DiscoveryReport,
};
use crate::{
    domain::definition::{
        DefinitionKind, ScheduleDefinition, DEFAULT_INVENTORY_GROUP, DEFAULT_PLAYBOOK_ARGS,
        DEFAULT_RETRY_COUNT, DEFAULT_SCHEDULE, DEFAULT_TIMEOUT_SECONDS,
    },
    errors::AppError,
    naming::derive_service_name,
};

/// Wrapper and utility roles that are never scheduled on their own.
pub const EXCLUDED_ROLES: [&str; 3] = ["servicenow_itsm", "common", "base"];
pub const DEFAULTS_FILES: [&str; 2] = ["main.yml", "main.yaml"];
pub const MONITORING_SECTION: &str = "monitoring_config";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MonitoringConfig {
    #[serde(deserialize_with = "lenient_bool")]
    enabled: bool,
    description: Option<String>,
    default_schedule: Option<String>,
    inventory_groups: Option<Vec<String>>,
    timeout: Option<i64>,
    retry_count: Option<u32>,
    playbook_args: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RoleDiscovery {
    roles_path: PathBuf,
}

impl RoleDiscovery {
    pub fn new(roles_path: impl Into<PathBuf>) -> Self {
        Self {
            roles_path: roles_path.into(),
        }
    }

    pub fn discover(&self) -> DiscoveryReport {
        if !self.roles_path.is_dir() {
            error!(path = %self.roles_path.display(), "roles path does not exist");
            return DiscoveryReport::default();
        }

        info!(path = %self.roles_path.display(), "scanning roles directory");
        let entries = match sorted_entries(&self.roles_path) {
            Ok(entries) => entries,
            Err(err) => {
                error!(error = %err, "failed to list roles directory");
                return DiscoveryReport::default();
            }
        };

        let candidates: Vec<Candidate> = entries
            .into_iter()
            .filter(|path| path.is_dir())
            .map(|role_dir| {
                let name = file_name(&role_dir);
                let outcome = self.resolve_role(&role_dir);
                match &outcome {
                    CandidateOutcome::Found(_) => info!(role = %name, "discovered monitoring role"),
                    CandidateOutcome::NotApplicable(reason) => {
                        debug!(role = %name, reason = %reason, "role not configured for monitoring")
                    }
                    CandidateOutcome::ParseError(detail) => {
                        error!(role = %name, error = %detail, "failed to read role config")
                    }
                }
                Candidate {
                    name,
                    path: role_dir,
                    outcome,
                }
            })
            .collect();

        let report = DiscoveryReport::from_candidates(candidates);
        info!(count = report.definitions.len(), "role discovery complete");
        report
    }

    pub fn resolve_role(&self, role_dir: &Path) -> CandidateOutcome {
        let name = file_name(role_dir);
        if EXCLUDED_ROLES.contains(&name.as_str()) {
            return CandidateOutcome::NotApplicable("excluded role".to_string());
        }

        let Some(defaults_file) = defaults_file(role_dir) else {
            return CandidateOutcome::NotApplicable("no defaults file".to_string());
        };

        match resolve_defaults(&name, role_dir, &defaults_file) {
            Ok(outcome) => outcome,
            Err(err) => CandidateOutcome::ParseError(err.to_string()),
        }
    }
}

pub(crate) fn defaults_file(role_dir: &Path) -> Option<PathBuf> {
    DEFAULTS_FILES
        .iter()
        .map(|file| role_dir.join("defaults").join(file))
        .find(|path| path.is_file())
}

fn resolve_defaults(
    name: &str,
    role_dir: &Path,
    defaults_file: &Path,
) -> Result<CandidateOutcome, AppError> {
    let document = match load_yaml(defaults_file)? {
        Value::Null => return Ok(CandidateOutcome::NotApplicable("empty defaults".to_string())),
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(AppError::parse(
                defaults_file,
                "defaults must be a mapping at top level",
            ))
        }
    };

    let section = mapping_section(&document, MONITORING_SECTION)
        .map_err(|message| AppError::parse(defaults_file, message))?;
    let Some(section) = section else {
        return Ok(CandidateOutcome::NotApplicable(format!(
            "no {MONITORING_SECTION} section"
        )));
    };

    let config: MonitoringConfig = decode_section(section, MONITORING_SECTION)
        .map_err(|message| AppError::parse(defaults_file, message))?;
    if !config.enabled {
        return Ok(CandidateOutcome::NotApplicable("monitoring disabled".to_string()));
    }

    Ok(CandidateOutcome::Found(ScheduleDefinition {
        name: name.to_string(),
        origin_path: role_dir.to_path_buf(),
        raw_config: Value::Mapping(section.clone()),
        description: config
            .description
            .unwrap_or_else(|| ScheduleDefinition::default_description(name)),
        schedule: config
            .default_schedule
            .unwrap_or_else(|| DEFAULT_SCHEDULE.to_string()),
        inventory_groups: config
            .inventory_groups
            .unwrap_or_else(|| vec![DEFAULT_INVENTORY_GROUP.to_string()]),
        service_name: derive_service_name(name),
        timeout_seconds: config.timeout.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        enabled: config.enabled,
        kind: DefinitionKind::Role {
            retry_count: config.retry_count.unwrap_or(DEFAULT_RETRY_COUNT),
            playbook_args: config
                .playbook_args
                .unwrap_or_else(|| DEFAULT_PLAYBOOK_ARGS.to_string()),
        },
    }))
}
