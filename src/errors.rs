use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("failed to render {template} template: {message}")]
    Render {
        template: &'static str,
        message: String,
    },
    #[error("systemd {operation} failed: {message}")]
    Control {
        operation: &'static str,
        message: String,
    },
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn render(template: &'static str, message: impl Into<String>) -> Self {
        Self::Render {
            template,
            message: message.into(),
        }
    }

    pub fn control(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Control {
            operation,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn parse_error_names_the_file() {
        let error = AppError::parse("/srv/roles/web/defaults/main.yml", "bad indentation");
        assert_eq!(
            error.to_string(),
            "failed to parse /srv/roles/web/defaults/main.yml: bad indentation"
        );
    }

    #[test]
    fn control_error_names_the_operation() {
        let error = AppError::control("daemon-reload", "bus unreachable");
        assert_eq!(
            error.to_string(),
            "systemd daemon-reload failed: bus unreachable"
        );
    }
}
