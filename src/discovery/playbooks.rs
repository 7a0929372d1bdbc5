//! Playbook discovery with role-default inheritance
//!
//! A playbook schedules itself through `vars.playbook_schedule` on its first
//! play. Without one, the first role-inclusion task whose role declares a
//! non-empty `default_schedule_config` supplies the schedule. Later roles are
//! never consulted and configs are never merged.
//!
//! Only the first play of a playbook is read.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, error, info, warn};

use super::{
    decode_section, file_name, lenient_bool, load_yaml, mapping_section, roles::defaults_file,
    sorted_entries, Candidate, CandidateOutcome, DiscoveryReport,
};
use crate::{
    domain::definition::{
        DefinitionKind, ScheduleDefinition, DEFAULT_INVENTORY_GROUP, DEFAULT_SCHEDULE,
        DEFAULT_TIMEOUT_SECONDS,
    },
    errors::AppError,
    naming::derive_service_name,
};

pub const PLAYBOOK_EXTENSIONS: [&str; 2] = ["yml", "yaml"];
pub const PLAYBOOK_SCHEDULE_VAR: &str = "playbook_schedule";
pub const INHERITABLE_SECTION: &str = "default_schedule_config";
pub const ROLE_INCLUSION_KEYS: [&str; 4] = [
    "include_role",
    "import_role",
    "ansible.builtin.include_role",
    "ansible.builtin.import_role",
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlaybookSchedule {
    #[serde(deserialize_with = "lenient_bool")]
    enabled: bool,
    description: Option<String>,
    schedule: Option<String>,
    inventory_groups: Option<Vec<String>>,
    timeout: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InheritableSchedule {
    description: Option<String>,
    schedule: Option<String>,
    inventory_groups: Option<Vec<String>>,
    timeout: Option<i64>,
}

/// Role defaults loaded during one discovery pass, keyed by role name.
///
/// Entries are never invalidated; a role whose defaults are missing or
/// unreadable is cached as empty.
#[derive(Debug)]
pub struct RoleDefaultsCache {
    roles_path: PathBuf,
    entries: HashMap<String, Mapping>,
}

impl RoleDefaultsCache {
    pub fn new(roles_path: impl Into<PathBuf>) -> Self {
        Self {
            roles_path: roles_path.into(),
            entries: HashMap::new(),
        }
    }

    pub fn defaults(&mut self, role_name: &str) -> &Mapping {
        let roles_path = &self.roles_path;
        self.entries
            .entry(role_name.to_string())
            .or_insert_with(|| load_role_defaults(roles_path, role_name))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

fn load_role_defaults(roles_path: &Path, role_name: &str) -> Mapping {
    let Some(path) = defaults_file(&roles_path.join(role_name)) else {
        debug!(role = %role_name, "no defaults file for role");
        return Mapping::new();
    };

    match load_yaml(&path) {
        Ok(Value::Mapping(mapping)) => {
            debug!(role = %role_name, "loaded role defaults");
            mapping
        }
        Ok(_) => Mapping::new(),
        Err(err) => {
            warn!(role = %role_name, error = %err, "failed to load role defaults");
            Mapping::new()
        }
    }
}

struct Inherited {
    role: String,
    raw: Mapping,
    schedule: InheritableSchedule,
}

#[derive(Debug, Clone)]
pub struct PlaybookDiscovery {
    playbooks_path: PathBuf,
    roles_path: PathBuf,
}

impl PlaybookDiscovery {
    pub fn new(playbooks_path: impl Into<PathBuf>, roles_path: impl Into<PathBuf>) -> Self {
        Self {
            playbooks_path: playbooks_path.into(),
            roles_path: roles_path.into(),
        }
    }

    pub fn discover(&self) -> DiscoveryReport {
        let mut cache = RoleDefaultsCache::new(&self.roles_path);
        self.discover_with_cache(&mut cache)
    }

    pub fn discover_with_cache(&self, cache: &mut RoleDefaultsCache) -> DiscoveryReport {
        if !self.playbooks_path.is_dir() {
            error!(path = %self.playbooks_path.display(), "playbooks path does not exist");
            return DiscoveryReport::default();
        }

        info!(path = %self.playbooks_path.display(), "scanning playbooks directory");
        let entries = match sorted_entries(&self.playbooks_path) {
            Ok(entries) => entries,
            Err(err) => {
                error!(error = %err, "failed to list playbooks directory");
                return DiscoveryReport::default();
            }
        };

        let candidates: Vec<Candidate> = entries
            .into_iter()
            .filter(|path| path.is_file() && is_playbook_file(path))
            .map(|path| {
                let name = playbook_name(&path);
                let outcome = self.resolve_playbook(&path, cache);
                match &outcome {
                    CandidateOutcome::Found(_) => {
                        info!(playbook = %name, "discovered schedulable playbook")
                    }
                    CandidateOutcome::NotApplicable(reason) => {
                        debug!(playbook = %name, reason = %reason, "playbook not configured for scheduling")
                    }
                    CandidateOutcome::ParseError(detail) => {
                        error!(playbook = %name, error = %detail, "failed to read playbook config")
                    }
                }
                Candidate {
                    name,
                    path,
                    outcome,
                }
            })
            .collect();

        let report = DiscoveryReport::from_candidates(candidates);
        info!(count = report.definitions.len(), "playbook discovery complete");
        report
    }

    pub fn resolve_playbook(&self, path: &Path, cache: &mut RoleDefaultsCache) -> CandidateOutcome {
        match resolve_playbook_file(path, cache) {
            Ok(outcome) => outcome,
            Err(err) => CandidateOutcome::ParseError(err.to_string()),
        }
    }
}

fn is_playbook_file(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| PLAYBOOK_EXTENSIONS.contains(&extension))
}

fn playbook_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name(path))
}

fn resolve_playbook_file(
    path: &Path,
    cache: &mut RoleDefaultsCache,
) -> Result<CandidateOutcome, AppError> {
    let name = playbook_name(path);
    let document = load_yaml(path)?;

    let Some(plays) = document.as_sequence() else {
        return Ok(CandidateOutcome::NotApplicable(
            "not a list of plays".to_string(),
        ));
    };
    let Some(first_play) = plays.first() else {
        return Ok(CandidateOutcome::NotApplicable("no plays".to_string()));
    };
    let Some(play) = first_play.as_mapping() else {
        return Err(AppError::parse(path, "first play must be a mapping"));
    };

    let vars = mapping_section(play, "vars").map_err(|message| AppError::parse(path, message))?;
    let declared = match vars {
        Some(vars) => mapping_section(vars, PLAYBOOK_SCHEDULE_VAR)
            .map_err(|message| AppError::parse(path, message))?
            .filter(|section| !section.is_empty()),
        None => None,
    };

    if let Some(section) = declared {
        let schedule: PlaybookSchedule = decode_section(section, PLAYBOOK_SCHEDULE_VAR)
            .map_err(|message| AppError::parse(path, message))?;
        if !schedule.enabled {
            return Ok(CandidateOutcome::NotApplicable(
                "playbook schedule disabled".to_string(),
            ));
        }

        return Ok(CandidateOutcome::Found(ScheduleDefinition {
            description: schedule
                .description
                .unwrap_or_else(|| ScheduleDefinition::default_description(&name)),
            schedule: schedule
                .schedule
                .unwrap_or_else(|| DEFAULT_SCHEDULE.to_string()),
            inventory_groups: schedule
                .inventory_groups
                .unwrap_or_else(|| play_hosts(play)),
            service_name: derive_service_name(&name),
            timeout_seconds: schedule.timeout.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            enabled: true,
            kind: DefinitionKind::Playbook {
                inherited_from: None,
            },
            raw_config: Value::Mapping(section.clone()),
            origin_path: path.to_path_buf(),
            name,
        }));
    }

    let Some(inherited) = inherit_from_roles(play, cache, path)? else {
        return Ok(CandidateOutcome::NotApplicable(
            "no playbook schedule and no inheritable role schedule".to_string(),
        ));
    };

    info!(playbook = %name, role = %inherited.role, "inheriting schedule from role");
    let role_description = inherited
        .schedule
        .description
        .unwrap_or_else(|| "monitoring".to_string());

    Ok(CandidateOutcome::Found(ScheduleDefinition {
        description: format!("Inherited from {}: {role_description}", inherited.role),
        schedule: inherited
            .schedule
            .schedule
            .unwrap_or_else(|| DEFAULT_SCHEDULE.to_string()),
        inventory_groups: inherited
            .schedule
            .inventory_groups
            .unwrap_or_else(|| vec![DEFAULT_INVENTORY_GROUP.to_string()]),
        service_name: derive_service_name(&name),
        timeout_seconds: inherited.schedule.timeout.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        enabled: true,
        kind: DefinitionKind::Playbook {
            inherited_from: Some(inherited.role),
        },
        raw_config: Value::Mapping(inherited.raw),
        origin_path: path.to_path_buf(),
        name,
    }))
}

fn inherit_from_roles(
    play: &Mapping,
    cache: &mut RoleDefaultsCache,
    path: &Path,
) -> Result<Option<Inherited>, AppError> {
    let Some(tasks) = play.get("tasks").and_then(Value::as_sequence) else {
        return Ok(None);
    };

    for role in tasks.iter().filter_map(included_role) {
        let defaults = cache.defaults(&role);
        let section = mapping_section(defaults, INHERITABLE_SECTION)
            .map_err(|message| AppError::parse(path, format!("role {role}: {message}")))?;
        let Some(section) = section.filter(|section| !section.is_empty()) else {
            continue;
        };

        let schedule: InheritableSchedule = decode_section(section, INHERITABLE_SECTION)
            .map_err(|message| AppError::parse(path, format!("role {role}: {message}")))?;
        return Ok(Some(Inherited {
            raw: section.clone(),
            role,
            schedule,
        }));
    }

    Ok(None)
}

/// Role referenced by a task, in either `include_role: name` or
/// `include_role: { name: ... }` form.
fn included_role(task: &Value) -> Option<String> {
    let task = task.as_mapping()?;
    ROLE_INCLUSION_KEYS.iter().find_map(|key| {
        let role = match task.get(*key)? {
            Value::String(role) => role.as_str(),
            Value::Mapping(directive) => directive.get("name")?.as_str()?,
            _ => return None,
        };
        let role = role.trim();
        (!role.is_empty()).then(|| role.to_string())
    })
}

fn play_hosts(play: &Mapping) -> Vec<String> {
    match play.get("hosts") {
        Some(Value::String(hosts)) => vec![hosts.clone()],
        Some(Value::Sequence(hosts)) => hosts
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => vec![DEFAULT_INVENTORY_GROUP.to_string()],
    }
}
