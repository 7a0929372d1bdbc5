//! Discovery of schedulable roles and playbooks
//!
//! Each candidate on disk resolves to a [`CandidateOutcome`]; the enabled
//! definitions are then checked for service-identity collisions before they
//! are handed to the orchestrator.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::{domain::definition::ScheduleDefinition, errors::AppError};

pub mod playbooks;
pub mod roles;

pub use playbooks::{PlaybookDiscovery, RoleDefaultsCache};
pub use roles::RoleDiscovery;

#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Found(ScheduleDefinition),
    NotApplicable(String),
    ParseError(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub path: PathBuf,
    pub outcome: CandidateOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub service_name: String,
    pub kept: String,
    pub dropped: String,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub candidates: Vec<Candidate>,
    pub definitions: Vec<ScheduleDefinition>,
    pub collisions: Vec<Collision>,
}

impl DiscoveryReport {
    pub fn from_candidates(candidates: Vec<Candidate>) -> Self {
        let found = candidates
            .iter()
            .filter_map(|candidate| match &candidate.outcome {
                CandidateOutcome::Found(definition) if definition.enabled => {
                    Some(definition.clone())
                }
                _ => None,
            })
            .collect();
        let (definitions, collisions) = remove_colliding(found);

        Self {
            candidates,
            definitions,
            collisions,
        }
    }

    /// Combine two passes and re-check identities over the joint set.
    pub fn merge(self, other: DiscoveryReport) -> Self {
        let mut candidates = self.candidates;
        candidates.extend(other.candidates);
        Self::from_candidates(candidates)
    }

    pub fn parse_errors(&self) -> impl Iterator<Item = (&Candidate, &str)> {
        self.candidates
            .iter()
            .filter_map(|candidate| match &candidate.outcome {
                CandidateOutcome::ParseError(detail) => Some((candidate, detail.as_str())),
                _ => None,
            })
    }
}

/// Keeps the first definition claiming each service identity.
pub fn remove_colliding(
    definitions: Vec<ScheduleDefinition>,
) -> (Vec<ScheduleDefinition>, Vec<Collision>) {
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut kept = Vec::with_capacity(definitions.len());
    let mut collisions = Vec::new();

    for definition in definitions {
        if let Some(owner) = owners.get(&definition.service_name) {
            warn!(
                service = %definition.service_name,
                kept = %owner,
                dropped = %definition.name,
                "service identity collision, excluding later definition"
            );
            collisions.push(Collision {
                service_name: definition.service_name.clone(),
                kept: owner.clone(),
                dropped: definition.name,
            });
            continue;
        }

        owners.insert(definition.service_name.clone(), definition.name.clone());
        kept.push(definition);
    }

    (kept, collisions)
}

pub(crate) fn load_yaml(path: &Path) -> Result<Value, AppError> {
    let content = fs::read_to_string(path).map_err(|err| AppError::io(path, err))?;
    serde_yaml::from_str(&content).map_err(|err| AppError::parse(path, err.to_string()))
}

/// Nested mapping under `key`. Missing or null is `None`; any other
/// non-mapping value is an error.
pub(crate) fn mapping_section<'a>(
    parent: &'a Mapping,
    key: &str,
) -> Result<Option<&'a Mapping>, String> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Mapping(mapping)) => Ok(Some(mapping)),
        Some(_) => Err(format!("'{key}' must be a mapping")),
    }
}

pub(crate) fn decode_section<T: DeserializeOwned>(
    section: &Mapping,
    key: &str,
) -> Result<T, String> {
    serde_yaml::from_value(Value::Mapping(section.clone()))
        .map_err(|err| format!("invalid '{key}': {err}"))
}

/// YAML 1.1 style flag: `true`, `yes`, `on` (any case, quoted or not) are
/// true. Anything else, including values of other types, is false.
pub(crate) fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::String(word) => matches!(
            word.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "y" | "on"
        ),
        _ => false,
    })
}

/// Entries of `root` in path order.
pub(crate) fn sorted_entries(root: &Path) -> Result<Vec<PathBuf>, AppError> {
    let entries = fs::read_dir(root).map_err(|err| AppError::io(root, err))?;
    let mut paths = entries
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| AppError::io(root, err))?;
    paths.sort();
    Ok(paths)
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
