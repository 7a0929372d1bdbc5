use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;

use super::calendar::{translate_calendar, CalendarTranslation};
use crate::{
    domain::definition::{DefinitionKind, ScheduleDefinition},
    errors::AppError,
};

pub const SERVICE_TEMPLATE_FILE: &str = "systemd_service.tmpl";
pub const TIMER_TEMPLATE_FILE: &str = "systemd_timer.tmpl";
/// Spreads timers that share a calendar across this many seconds.
pub const RANDOMIZED_DELAY_SEC: u32 = 30;
pub const ACCURACY_SEC: u32 = 10;

const BUILTIN_SERVICE_TEMPLATE: &str = include_str!("../../templates/systemd_service.tmpl");
const BUILTIN_TIMER_TEMPLATE: &str = include_str!("../../templates/systemd_timer.tmpl");

#[allow(clippy::expect_used)]
static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-z_][a-z0-9_]*)\}").expect("constant regex pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTemplates {
    pub service: String,
    pub timer: String,
}

impl UnitTemplates {
    pub fn builtin() -> Self {
        Self {
            service: BUILTIN_SERVICE_TEMPLATE.to_string(),
            timer: BUILTIN_TIMER_TEMPLATE.to_string(),
        }
    }

    /// Templates from `dir`, falling back to the built-in ones per file.
    pub fn load(dir: Option<&Path>) -> Result<Self, AppError> {
        let Some(dir) = dir else {
            return Ok(Self::builtin());
        };

        let read = |file: &str, builtin: &str| -> Result<String, AppError> {
            let path = dir.join(file);
            if path.is_file() {
                fs::read_to_string(&path).map_err(|err| AppError::io(path, err))
            } else {
                Ok(builtin.to_string())
            }
        };

        Ok(Self {
            service: read(SERVICE_TEMPLATE_FILE, BUILTIN_SERVICE_TEMPLATE)?,
            timer: read(TIMER_TEMPLATE_FILE, BUILTIN_TIMER_TEMPLATE)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedUnit {
    pub service: String,
    pub timer: String,
    pub calendar: CalendarTranslation,
}

#[derive(Debug, Clone)]
pub struct UnitRenderer {
    templates: UnitTemplates,
    project_path: PathBuf,
    log_path: PathBuf,
}

impl UnitRenderer {
    pub fn new(
        templates: UnitTemplates,
        project_path: impl Into<PathBuf>,
        log_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            templates,
            project_path: project_path.into(),
            log_path: log_path.into(),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn render(
        &self,
        definition: &ScheduleDefinition,
        inventory_file: &str,
    ) -> Result<RenderedUnit, AppError> {
        let calendar = translate_calendar(&definition.schedule);
        let retry_count = match &definition.kind {
            DefinitionKind::Role { retry_count, .. } => *retry_count,
            DefinitionKind::Playbook { .. } => 0,
        };

        let vars = HashMap::from([
            ("name", definition.name.clone()),
            ("service_name", definition.service_name.clone()),
            ("description", definition.description.replace('\n', " ")),
            ("project_path", self.project_path.display().to_string()),
            ("inventory_file", inventory_file.to_string()),
            ("playbook_file", playbook_file(definition, &self.project_path)),
            ("playbook_args", definition.expanded_playbook_args()),
            ("log_path", self.log_path.display().to_string()),
            ("on_calendar", calendar.on_calendar.to_string()),
            ("randomized_delay", RANDOMIZED_DELAY_SEC.to_string()),
            ("accuracy_sec", ACCURACY_SEC.to_string()),
            ("timeout", definition.timeout_seconds.to_string()),
            ("retry_count", retry_count.to_string()),
        ]);

        Ok(RenderedUnit {
            service: interpolate("service", &self.templates.service, &vars)?,
            timer: interpolate("timer", &self.templates.timer, &vars)?,
            calendar,
        })
    }
}

/// Roles run through a `run_<role>.yml` wrapper in the project root.
/// Playbooks run themselves, addressed relative to the project root when
/// they live beneath it.
pub fn playbook_file(definition: &ScheduleDefinition, project_path: &Path) -> String {
    match &definition.kind {
        DefinitionKind::Role { .. } => format!("run_{}.yml", definition.name),
        DefinitionKind::Playbook { .. } => definition
            .origin_path
            .strip_prefix(project_path)
            .unwrap_or(&definition.origin_path)
            .display()
            .to_string(),
    }
}

fn interpolate(
    template_name: &'static str,
    template: &str,
    vars: &HashMap<&str, String>,
) -> Result<String, AppError> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for captures in VAR_PATTERN.captures_iter(template) {
        let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let value = vars.get(key.as_str()).ok_or_else(|| {
            AppError::render(template_name, format!("unknown variable '{}'", key.as_str()))
        })?;
        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(value);
        last = whole.end();
    }

    rendered.push_str(&template[last..]);
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::domain::definition::fixtures;

    fn renderer() -> UnitRenderer {
        UnitRenderer::new(
            UnitTemplates::builtin(),
            "/srv/ansible",
            "/var/log/ansible-monitoring",
        )
    }

    #[test]
    fn renders_role_units() {
        let definition = fixtures::role("disk_usage", "*/10 * * * *");
        let unit = renderer()
            .render(&definition, "inventory/prod.yml")
            .expect("render");

        assert!(unit.service.contains("Description=disk_usage monitoring"));
        assert!(unit.service.contains("WorkingDirectory=/srv/ansible"));
        assert!(unit.service.contains(
            "ExecStart=/usr/bin/ansible-playbook -i inventory/prod.yml run_disk_usage.yml --limit=web"
        ));
        assert!(unit.service.contains("TimeoutStartSec=300"));
        assert!(unit
            .service
            .contains("StandardOutput=append:/var/log/ansible-monitoring/disk-usage-monitor.log"));
        assert!(unit.timer.contains("OnCalendar=*:0/10"));
        assert!(unit.timer.contains("RandomizedDelaySec=30"));
        assert!(unit.timer.contains("AccuracySec=10"));
        assert!(unit.timer.contains("Unit=disk-usage-monitor.service"));
        assert!(!unit.calendar.approximated);
    }

    #[test]
    fn playbooks_run_their_own_file() {
        let definition = fixtures::playbook("patching", Some("os_patch"));
        let unit = renderer().render(&definition, "hosts.yml").expect("render");

        assert!(unit.service.contains(
            "ExecStart=/usr/bin/ansible-playbook -i hosts.yml playbooks/patching.yml --limit=all\n"
        ));
        assert_eq!(
            playbook_file(&definition, Path::new("/srv/ansible")),
            "playbooks/patching.yml"
        );
    }

    #[test]
    fn playbooks_outside_project_keep_absolute_path() {
        let definition = fixtures::playbook("patching", None);
        assert_eq!(
            playbook_file(&definition, Path::new("/opt/elsewhere")),
            "/srv/ansible/playbooks/patching.yml"
        );
    }

    #[test]
    fn rendering_is_pure() {
        let definition = fixtures::role("disk_usage", "*/7 * * * *");
        let first = renderer().render(&definition, "hosts.yml").expect("render");
        let second = renderer().render(&definition, "hosts.yml").expect("render");

        assert_eq!(first, second);
        assert!(first.calendar.approximated);
        assert!(first.timer.contains("OnCalendar=hourly"));
    }

    #[test]
    fn unknown_variable_is_a_render_error() {
        let templates = UnitTemplates {
            service: "ExecStart=${missing_var}".to_string(),
            timer: String::new(),
        };
        let renderer = UnitRenderer::new(templates, "/srv/ansible", "/var/log");

        let error = renderer
            .render(&fixtures::role("x", "0 * * * *"), "hosts.yml")
            .expect_err("expected render error");
        assert!(matches!(error, AppError::Render { template: "service", .. }));
    }

    #[test]
    fn template_dir_overrides_individual_files() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join(TIMER_TEMPLATE_FILE), "OnCalendar=${on_calendar}\n")
            .expect("write template");

        let templates = UnitTemplates::load(Some(dir.path())).expect("load templates");
        assert_eq!(templates.timer, "OnCalendar=${on_calendar}\n");
        assert_eq!(templates.service, UnitTemplates::builtin().service);
    }
}
