use std::collections::{BTreeMap, BTreeSet};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::domain::definition::ScheduleDefinition;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub enabled: usize,
    pub role_types: BTreeMap<String, usize>,
    pub inventory_groups: Vec<String>,
    pub schedules: BTreeMap<String, usize>,
    pub inherited_configs: usize,
    pub generated_at_utc: String,
}

pub fn summarize(definitions: &[ScheduleDefinition]) -> Summary {
    let mut role_types = BTreeMap::new();
    let mut inventory_groups = BTreeSet::new();
    let mut schedules = BTreeMap::new();
    let mut inherited_configs = 0;

    for definition in definitions {
        if definition.is_role() {
            *role_types
                .entry(definition.role_type().to_string())
                .or_insert(0) += 1;
        }
        if definition.inherited_from().is_some() {
            inherited_configs += 1;
        }

        inventory_groups.extend(definition.inventory_groups.iter().cloned());
        *schedules.entry(definition.schedule.clone()).or_insert(0) += 1;
    }

    Summary {
        total: definitions.len(),
        enabled: definitions.iter().filter(|definition| definition.enabled).count(),
        role_types,
        inventory_groups: inventory_groups.into_iter().collect(),
        schedules,
        inherited_configs,
        generated_at_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}
