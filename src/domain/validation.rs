//! Structural checks applied before a definition is installed

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::definition::ScheduleDefinition;

pub const SCHEDULE_FIELD_COUNT: usize = 5;

#[allow(clippy::expect_used)]
static SERVICE_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+$").expect("constant regex pattern is valid")
});

/// Returns every problem found; an empty list means the definition is usable.
///
/// Field values inside the schedule are not interpreted, only counted.
pub fn validate_definition(definition: &ScheduleDefinition) -> Vec<String> {
    let mut errors = Vec::new();

    if definition.name.trim().is_empty() {
        errors.push("name is required".to_string());
    }

    let schedule = definition.schedule.trim();
    if schedule.is_empty() {
        errors.push("schedule is required".to_string());
    } else {
        let fields = schedule.split_whitespace().count();
        if fields != SCHEDULE_FIELD_COUNT {
            errors.push(format!(
                "invalid cron schedule format: '{schedule}' has {fields} fields, expected {SCHEDULE_FIELD_COUNT}"
            ));
        }
    }

    if definition.inventory_groups.is_empty() {
        errors.push("at least one inventory group is required".to_string());
    }

    if !SERVICE_NAME_PATTERN.is_match(&definition.service_name) {
        errors.push(format!(
            "invalid systemd service name: '{}'",
            definition.service_name
        ));
    }

    if definition.timeout_seconds <= 0 {
        errors.push(format!(
            "timeout must be greater than 0, got {}",
            definition.timeout_seconds
        ));
    }

    errors
}
