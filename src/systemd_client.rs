use async_trait::async_trait;
use serde::Serialize;
use zbus::{zvariant::OwnedObjectPath, Connection, Proxy};

use crate::errors::AppError;

const SYSTEMD_DESTINATION: &str = "org.freedesktop.systemd1";
const MANAGER_PATH: &str = "/org/freedesktop/systemd1";
const MANAGER_INTERFACE: &str = "org.freedesktop.systemd1.Manager";
const UNIT_INTERFACE: &str = "org.freedesktop.systemd1.Unit";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UnitState {
    pub name: String,
    pub active: bool,
    pub output: String,
}

#[derive(Debug, Clone)]
struct RawUnitState {
    name: String,
    description: String,
    load_state: String,
    active_state: String,
    sub_state: String,
}

/// Control surface of the host's unit supervisor.
#[async_trait]
pub trait UnitController: Send + Sync {
    async fn daemon_reload(&self) -> Result<(), AppError>;
    async fn enable_unit(&self, unit: &str) -> Result<(), AppError>;
    async fn start_unit(&self, unit: &str) -> Result<(), AppError>;
    async fn unit_state(&self, unit: &str) -> Result<UnitState, AppError>;
}

pub fn ensure_systemd_available() -> Result<(), AppError> {
    match systemd::daemon::booted() {
        Ok(true) => Ok(()),
        Ok(false) => Err(AppError::control(
            "connect",
            "host was not booted with systemd",
        )),
        Err(err) => Err(AppError::control(
            "connect",
            format!("failed to detect systemd: {err}"),
        )),
    }
}

#[derive(Debug, Default)]
pub struct DbusSystemdClient;

impl DbusSystemdClient {
    pub fn new() -> Self {
        Self
    }

    async fn connect(&self, operation: &'static str) -> Result<Connection, AppError> {
        ensure_systemd_available()?;
        Connection::system().await.map_err(|err| {
            AppError::control(operation, format!("failed to connect to system dbus: {err}"))
        })
    }

    async fn manager<'a>(
        &self,
        connection: &'a Connection,
        operation: &'static str,
    ) -> Result<Proxy<'a>, AppError> {
        Proxy::new(
            connection,
            SYSTEMD_DESTINATION,
            MANAGER_PATH,
            MANAGER_INTERFACE,
        )
        .await
        .map_err(|err| {
            AppError::control(operation, format!("failed to create systemd dbus proxy: {err}"))
        })
    }
}

#[async_trait]
impl UnitController for DbusSystemdClient {
    async fn daemon_reload(&self) -> Result<(), AppError> {
        let connection = self.connect("daemon-reload").await?;
        let manager = self.manager(&connection, "daemon-reload").await?;
        manager
            .call::<_, _, ()>("Reload", &())
            .await
            .map_err(|err| AppError::control("daemon-reload", err.to_string()))
    }

    async fn enable_unit(&self, unit: &str) -> Result<(), AppError> {
        let connection = self.connect("enable").await?;
        let manager = self.manager(&connection, "enable").await?;
        let _: (bool, Vec<(String, String, String)>) = manager
            .call("EnableUnitFiles", &(vec![unit], false, true))
            .await
            .map_err(|err| AppError::control("enable", format!("{unit}: {err}")))?;
        Ok(())
    }

    async fn start_unit(&self, unit: &str) -> Result<(), AppError> {
        let connection = self.connect("start").await?;
        let manager = self.manager(&connection, "start").await?;
        let _: OwnedObjectPath = manager
            .call("StartUnit", &(unit, "replace"))
            .await
            .map_err(|err| AppError::control("start", format!("{unit}: {err}")))?;
        Ok(())
    }

    async fn unit_state(&self, unit: &str) -> Result<UnitState, AppError> {
        let connection = self.connect("status").await?;
        let manager = self.manager(&connection, "status").await?;
        let unit_path: OwnedObjectPath = manager
            .call("LoadUnit", &(unit,))
            .await
            .map_err(|err| AppError::control("status", format!("{unit}: {err}")))?;

        let proxy = Proxy::new(
            &connection,
            SYSTEMD_DESTINATION,
            unit_path.as_str(),
            UNIT_INTERFACE,
        )
        .await
        .map_err(|err| AppError::control("status", format!("{unit}: {err}")))?;

        let raw = RawUnitState {
            name: unit.to_string(),
            description: unit_property(&proxy, unit, "Description").await?,
            load_state: unit_property(&proxy, unit, "LoadState").await?,
            active_state: unit_property(&proxy, unit, "ActiveState").await?,
            sub_state: unit_property(&proxy, unit, "SubState").await?,
        };

        Ok(map_unit_state(raw))
    }
}

async fn unit_property(
    proxy: &Proxy<'_>,
    unit: &str,
    property: &'static str,
) -> Result<String, AppError> {
    proxy
        .get_property::<String>(property)
        .await
        .map_err(|err| AppError::control("status", format!("{unit} {property}: {err}")))
}

fn map_unit_state(raw: RawUnitState) -> UnitState {
    let mut output = raw.name.clone();
    if !raw.description.trim().is_empty() {
        output.push_str(&format!(" - {}", raw.description));
    }
    output.push_str(&format!(
        "\n     Loaded: {}\n     Active: {} ({})",
        raw.load_state, raw.active_state, raw.sub_state
    ));

    UnitState {
        active: raw.active_state == "active",
        name: raw.name,
        output,
    }
}

#[cfg(test)]
mod tests {
    use super::{map_unit_state, RawUnitState};

    fn raw(active_state: &str, sub_state: &str) -> RawUnitState {
        RawUnitState {
            name: "disk-usage-monitor.timer".to_string(),
            description: "Timer for disk_usage monitoring".to_string(),
            load_state: "loaded".to_string(),
            active_state: active_state.to_string(),
            sub_state: sub_state.to_string(),
        }
    }

    #[test]
    fn active_unit_is_reported_active() {
        let state = map_unit_state(raw("active", "waiting"));
        assert!(state.active);
        assert_eq!(
            state.output,
            "disk-usage-monitor.timer - Timer for disk_usage monitoring\n     Loaded: loaded\n     Active: active (waiting)"
        );
    }

    #[test]
    fn failed_or_missing_units_are_inactive() {
        assert!(!map_unit_state(raw("failed", "failed")).active);
        assert!(!map_unit_state(raw("inactive", "dead")).active);

        let mut missing = raw("inactive", "dead");
        missing.description.clear();
        missing.load_state = "not-found".to_string();
        let state = map_unit_state(missing);
        assert!(!state.active);
        assert!(state.output.starts_with("disk-usage-monitor.timer\n"));
    }
}
