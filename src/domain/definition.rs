use std::path::PathBuf;

use serde::Serialize;

pub const DEFAULT_SCHEDULE: &str = "*/10 * * * *";
pub const DEFAULT_INVENTORY_GROUP: &str = "all";
pub const DEFAULT_TIMEOUT_SECONDS: i64 = 300;
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_PLAYBOOK_ARGS: &str = "--limit={{inventory_group}}";
pub const UNKNOWN_ROLE_TYPE: &str = "unknown";

/// A resolved scheduling record for one role or playbook.
///
/// Built fresh on every discovery pass and never mutated afterwards.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduleDefinition {
    pub name: String,
    pub origin_path: PathBuf,
    pub raw_config: serde_yaml::Value,
    pub description: String,
    pub schedule: String,
    pub inventory_groups: Vec<String>,
    pub service_name: String,
    pub timeout_seconds: i64,
    pub enabled: bool,
    pub kind: DefinitionKind,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefinitionKind {
    Role {
        retry_count: u32,
        playbook_args: String,
    },
    Playbook {
        inherited_from: Option<String>,
    },
}

impl ScheduleDefinition {
    pub fn default_description(name: &str) -> String {
        format!("{name} monitoring")
    }

    /// `role_type` tag from the declared config, `unknown` when absent.
    pub fn role_type(&self) -> &str {
        self.raw_config
            .get("role_type")
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or(UNKNOWN_ROLE_TYPE)
    }

    pub fn inherited_from(&self) -> Option<&str> {
        match &self.kind {
            DefinitionKind::Playbook { inherited_from } => inherited_from.as_deref(),
            DefinitionKind::Role { .. } => None,
        }
    }

    pub fn is_role(&self) -> bool {
        matches!(self.kind, DefinitionKind::Role { .. })
    }

    pub fn service_unit(&self) -> String {
        format!("{}.service", self.service_name)
    }

    pub fn timer_unit(&self) -> String {
        format!("{}.timer", self.service_name)
    }

    /// Command-line arguments for the playbook run, with the inventory
    /// placeholder expanded to the definition's groups.
    pub fn expanded_playbook_args(&self) -> String {
        match &self.kind {
            DefinitionKind::Role { playbook_args, .. } => {
                playbook_args.replace("{{inventory_group}}", &self.inventory_groups.join(":"))
            }
            DefinitionKind::Playbook { .. } => {
                format!("--limit={}", self.inventory_groups.join(":"))
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures;

    #[test]
    fn role_type_reads_raw_config() {
        let mut definition = fixtures::role("disk_usage", "*/5 * * * *");
        assert_eq!(definition.role_type(), "unknown");

        definition.raw_config =
            serde_yaml::from_str("role_type: infrastructure").expect("valid yaml");
        assert_eq!(definition.role_type(), "infrastructure");
    }

    #[test]
    fn playbook_args_expand_inventory_groups() {
        let mut definition = fixtures::role("disk_usage", "*/5 * * * *");
        definition.inventory_groups = vec!["web".to_string(), "db".to_string()];
        assert_eq!(definition.expanded_playbook_args(), "--limit=web:db");
    }

    #[test]
    fn playbooks_are_limited_to_their_groups() {
        let mut definition = fixtures::playbook("backup_db", None);
        definition.inventory_groups = vec!["databases".to_string(), "replicas".to_string()];
        assert_eq!(definition.expanded_playbook_args(), "--limit=databases:replicas");
    }

    #[test]
    fn only_playbooks_carry_inheritance() {
        assert_eq!(fixtures::role("a", "* * * * *").inherited_from(), None);
        assert_eq!(
            fixtures::playbook("patching", Some("os_patch")).inherited_from(),
            Some("os_patch")
        );
    }
}
