//! Lifecycle orchestration
//!
//! Turns discovered definitions into installed timer units and reports on
//! their state. Units are handled one at a time; a failure on one unit is
//! logged and never stops the rest of the run.

use std::{path::PathBuf, sync::Arc};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    discovery::{DiscoveryReport, PlaybookDiscovery, RoleDiscovery},
    domain::{
        definition::ScheduleDefinition,
        summary::{summarize, Summary},
        validation::validate_definition,
    },
    errors::AppError,
    systemd_client::UnitController,
    units::{UnitRenderer, UnitTemplates},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DefinitionSource {
    #[default]
    Roles,
    Playbooks,
    All,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InstallOutcome {
    pub service_name: String,
    pub service_path: PathBuf,
    pub timer_path: PathBuf,
    pub dry_run: bool,
    pub approximated_calendar: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunReport {
    pub total: usize,
    pub installed: Vec<InstallOutcome>,
    pub invalid: Vec<(String, Vec<String>)>,
    pub failed: Vec<(String, String)>,
}

impl RunReport {
    pub fn success_count(&self) -> usize {
        self.installed.len()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServiceStatus {
    pub service_name: String,
    pub service_active: bool,
    pub service_output: String,
    pub timer_active: bool,
    pub timer_output: String,
    pub error: Option<String>,
    pub checked_at_utc: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DefinitionStatus {
    pub name: String,
    pub description: String,
    pub schedule: String,
    pub status: ServiceStatus,
}

pub struct Scheduler {
    config: Config,
    renderer: UnitRenderer,
    controller: Arc<dyn UnitController>,
}

impl Scheduler {
    pub fn new(config: Config, controller: Arc<dyn UnitController>) -> Result<Self, AppError> {
        let templates = UnitTemplates::load(config.template_dir.as_deref())?;
        let renderer = UnitRenderer::new(templates, &config.project_path, &config.log_path);
        Ok(Self {
            config,
            renderer,
            controller,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn discover(&self, source: DefinitionSource) -> DiscoveryReport {
        let roles = || RoleDiscovery::new(self.config.roles_path()).discover();
        let playbooks = || {
            PlaybookDiscovery::new(self.config.playbooks_path(), self.config.roles_path())
                .discover()
        };

        match source {
            DefinitionSource::Roles => roles(),
            DefinitionSource::Playbooks => playbooks(),
            DefinitionSource::All => roles().merge(playbooks()),
        }
    }

    pub fn summary(&self, source: DefinitionSource) -> Summary {
        summarize(&self.discover(source).definitions)
    }

    /// Render and install one definition.
    ///
    /// A dry run renders the units and reports their paths without touching
    /// the filesystem or systemd.
    pub async fn install(
        &self,
        definition: &ScheduleDefinition,
        inventory_file: &str,
        dry_run: bool,
    ) -> Result<InstallOutcome, AppError> {
        let unit = self.renderer.render(definition, inventory_file)?;
        let service_path = self.config.unit_path(&definition.service_unit());
        let timer_path = self.config.unit_path(&definition.timer_unit());
        let outcome = InstallOutcome {
            service_name: definition.service_name.clone(),
            service_path,
            timer_path,
            dry_run,
            approximated_calendar: unit.calendar.approximated,
        };

        if dry_run {
            info!(path = %outcome.service_path.display(), "dry run: would create service file");
            info!(path = %outcome.timer_path.display(), "dry run: would create timer file");
            return Ok(outcome);
        }

        let log_path = self.renderer.log_path();
        tokio::fs::create_dir_all(log_path)
            .await
            .map_err(|err| AppError::io(log_path, err))?;

        tokio::fs::write(&outcome.service_path, &unit.service)
            .await
            .map_err(|err| AppError::io(&outcome.service_path, err))?;
        info!(path = %outcome.service_path.display(), "created service file");

        tokio::fs::write(&outcome.timer_path, &unit.timer)
            .await
            .map_err(|err| AppError::io(&outcome.timer_path, err))?;
        info!(path = %outcome.timer_path.display(), "created timer file");

        let timer_unit = definition.timer_unit();
        self.controller.daemon_reload().await?;
        self.controller.enable_unit(&timer_unit).await?;
        self.controller.start_unit(&timer_unit).await?;

        info!(service = %definition.service_name, "installed and started timer");
        Ok(outcome)
    }

    pub async fn create_timers(
        &self,
        inventory_file: &str,
        dry_run: bool,
        source: DefinitionSource,
    ) -> RunReport {
        let definitions = self.discover(source).definitions;
        let mut report = RunReport {
            total: definitions.len(),
            ..RunReport::default()
        };

        if definitions.is_empty() {
            warn!("no schedulable definitions discovered");
            return report;
        }

        info!(count = definitions.len(), dry_run, "creating timers");
        for definition in &definitions {
            info!(name = %definition.name, "processing definition");

            let errors = validate_definition(definition);
            if !errors.is_empty() {
                error!(
                    name = %definition.name,
                    errors = %errors.join(", "),
                    "definition has validation errors"
                );
                report.invalid.push((definition.name.clone(), errors));
                continue;
            }

            match self.install(definition, inventory_file, dry_run).await {
                Ok(outcome) => report.installed.push(outcome),
                Err(err) => {
                    error!(name = %definition.name, error = %err, "failed to install timer");
                    report.failed.push((definition.name.clone(), err.to_string()));
                }
            }
        }

        info!(
            succeeded = report.success_count(),
            total = report.total,
            "timer creation finished"
        );
        report
    }

    /// Query both units of a service. Query failures are folded into the
    /// result with both units reported inactive.
    pub async fn service_status(&self, service_name: &str) -> ServiceStatus {
        let checked_at_utc = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let states = async {
            let service = self
                .controller
                .unit_state(&format!("{service_name}.service"))
                .await?;
            let timer = self
                .controller
                .unit_state(&format!("{service_name}.timer"))
                .await?;
            Ok::<_, AppError>((service, timer))
        };

        match states.await {
            Ok((service, timer)) => ServiceStatus {
                service_name: service_name.to_string(),
                service_active: service.active,
                service_output: service.output,
                timer_active: timer.active,
                timer_output: timer.output,
                error: None,
                checked_at_utc,
            },
            Err(err) => {
                warn!(service = %service_name, error = %err, "status query failed");
                ServiceStatus {
                    service_name: service_name.to_string(),
                    service_active: false,
                    service_output: String::new(),
                    timer_active: false,
                    timer_output: String::new(),
                    error: Some(err.to_string()),
                    checked_at_utc,
                }
            }
        }
    }

    pub async fn status(&self, source: DefinitionSource) -> Vec<DefinitionStatus> {
        let mut statuses = Vec::new();
        for definition in self.discover(source).definitions {
            let status = self.service_status(&definition.service_name).await;
            statuses.push(DefinitionStatus {
                name: definition.name,
                description: definition.description,
                schedule: definition.schedule,
                status,
            });
        }
        statuses
    }
}


#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use tempfile::TempDir;

    use super::{testing::RecordingController, *};
    use crate::domain::definition::fixtures;

    struct Harness {
        root: TempDir,
        controller: Arc<RecordingController>,
        scheduler: Scheduler,
    }

    fn config(root: &Path) -> Config {
        Config {
            project_path: root.join("project"),
            log_path: root.join("logs"),
            unit_dir: root.join("units"),
            template_dir: None,
            inventory: "inventory.yml".to_string(),
        }
    }

    fn harness(controller: RecordingController) -> Harness {
        let root = TempDir::new().expect("tempdir");
        fs::create_dir_all(root.path().join("units")).expect("unit dir");
        fs::create_dir_all(root.path().join("project/roles")).expect("roles dir");
        let controller = Arc::new(controller);
        let scheduler = Scheduler::new(config(root.path()), controller.clone())
            .expect("scheduler should build");
        Harness {
            root,
            controller,
            scheduler,
        }
    }

    fn write_role(root: &Path, role: &str, config: &str) {
        let defaults = root.join("project/roles").join(role).join("defaults");
        fs::create_dir_all(&defaults).expect("defaults dir");
        fs::write(defaults.join("main.yml"), config).expect("write defaults");
    }

    #[tokio::test]
    async fn dry_run_touches_nothing() {
        let harness = harness(RecordingController::default());
        let definition = fixtures::role("disk_usage", "*/5 * * * *");

        let outcome = harness
            .scheduler
            .install(&definition, "hosts.yml", true)
            .await
            .expect("dry run succeeds");

        assert!(outcome.dry_run);
        assert_eq!(
            outcome.service_path,
            harness.root.path().join("units/disk-usage-monitor.service")
        );
        assert!(!outcome.service_path.exists());
        assert!(!outcome.timer_path.exists());
        assert!(!harness.root.path().join("logs").exists());
        assert!(harness.controller.calls().is_empty());
    }

    #[tokio::test]
    async fn install_writes_units_and_starts_timer() {
        let harness = harness(RecordingController::default());
        let definition = fixtures::role("disk_usage", "*/5 * * * *");

        let outcome = harness
            .scheduler
            .install(&definition, "hosts.yml", false)
            .await
            .expect("install succeeds");

        let service = fs::read_to_string(&outcome.service_path).expect("service file");
        let timer = fs::read_to_string(&outcome.timer_path).expect("timer file");
        assert!(service.contains("run_disk_usage.yml"));
        assert!(timer.contains("OnCalendar=*:0/5"));
        assert!(harness.root.path().join("logs").is_dir());
        assert_eq!(
            harness.controller.calls(),
            vec![
                "daemon-reload",
                "enable disk-usage-monitor.timer",
                "start disk-usage-monitor.timer",
            ]
        );
    }

    #[tokio::test]
    async fn install_overwrites_previous_units() {
        let harness = harness(RecordingController::default());
        let stale = harness.root.path().join("units/disk-usage-monitor.timer");
        fs::write(&stale, "stale").expect("write stale timer");

        harness
            .scheduler
            .install(&fixtures::role("disk_usage", "0 0 * * *"), "hosts.yml", false)
            .await
            .expect("install succeeds");

        let timer = fs::read_to_string(&stale).expect("timer file");
        assert!(timer.contains("OnCalendar=daily"));
    }

    #[tokio::test]
    async fn create_timers_isolates_failures() {
        let harness = harness(RecordingController {
            fail_start_for: Some("alpha-monitor.timer".to_string()),
            ..RecordingController::default()
        });
        let root = harness.root.path();
        write_role(root, "alpha", "monitoring_config:\n  enabled: true\n");
        write_role(
            root,
            "bravo",
            "monitoring_config:\n  enabled: true\n  default_schedule: \"*/5 * * *\"\n",
        );
        write_role(root, "charlie", "monitoring_config:\n  enabled: true\n");

        let report = harness
            .scheduler
            .create_timers("hosts.yml", false, DefinitionSource::Roles)
            .await;

        assert_eq!(report.total, 3);
        assert_eq!(report.success_count(), 1);
        assert_eq!(report.installed[0].service_name, "charlie-monitor");
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "alpha");
        assert_eq!(report.invalid.len(), 1);
        assert_eq!(report.invalid[0].0, "bravo");
        assert!(report.invalid[0].1[0].contains("schedule"));
        assert!(!root.join("units/bravo-monitor.service").exists());
    }

    #[tokio::test]
    async fn create_timers_dry_run_reports_every_valid_unit() {
        let harness = harness(RecordingController::default());
        write_role(harness.root.path(), "alpha", "monitoring_config:\n  enabled: true\n");
        write_role(harness.root.path(), "bravo", "monitoring_config:\n  enabled: true\n");

        let report = harness
            .scheduler
            .create_timers("hosts.yml", true, DefinitionSource::Roles)
            .await;

        assert_eq!(report.success_count(), 2);
        assert_eq!(report.total, 2);
        assert!(harness.controller.calls().is_empty());
        assert!(fs::read_dir(harness.root.path().join("units"))
            .expect("unit dir")
            .next()
            .is_none());
    }

    #[tokio::test]
    async fn status_reports_both_units() {
        let harness = harness(RecordingController {
            active_units: vec!["disk-usage-monitor.timer".to_string()],
            ..RecordingController::default()
        });

        let status = harness.scheduler.service_status("disk-usage-monitor").await;

        assert!(!status.service_active);
        assert!(status.timer_active);
        assert!(status.timer_output.starts_with("disk-usage-monitor.timer"));
        assert_eq!(status.error, None);
    }

    #[tokio::test]
    async fn status_query_failure_is_structured() {
        let harness = harness(RecordingController {
            unreachable: true,
            ..RecordingController::default()
        });

        let status = harness.scheduler.service_status("disk-usage-monitor").await;

        assert!(!status.service_active);
        assert!(!status.timer_active);
        assert!(status
            .error
            .as_deref()
            .is_some_and(|error| error.contains("bus unreachable")));
    }

    #[tokio::test]
    async fn missing_roots_yield_empty_run() {
        let harness = harness(RecordingController::default());
        fs::remove_dir_all(harness.root.path().join("project/roles")).expect("remove roles");

        let report = harness
            .scheduler
            .create_timers("hosts.yml", false, DefinitionSource::All)
            .await;

        assert_eq!(report.total, 0);
        assert_eq!(report.success_count(), 0);
    }
}
