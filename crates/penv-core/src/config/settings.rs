use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use penv_domain::{ProjectSettings, DEFAULT_MAX_DEPTH};

pub const USE_SYSTEM_ENV: &str = "PENV_USE_SYSTEM";
pub const VENV_IN_PROJECT_ENV: &str = "PENV_VENV_IN_PROJECT";
pub const IGNORE_VIRTUALENVS_ENV: &str = "PENV_IGNORE_VIRTUALENVS";
pub const PIPFILE_ENV: &str = "PENV_PIPFILE";
pub const MAX_DEPTH_ENV: &str = "PENV_MAX_DEPTH";
pub const PYPI_MIRROR_ENV: &str = "PENV_PYPI_MIRROR";
pub const DEFAULT_PYTHON_ENV: &str = "PENV_DEFAULT_PYTHON_VERSION";

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn flag_is_enabled(&self, key: &str) -> bool {
        matches!(self.var(key), Some("1"))
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    fn non_empty(&self, key: &str) -> Option<&str> {
        self.var(key).map(str::trim).filter(|value| !value.is_empty())
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) project: ProjectSettings,
    pub(crate) network: NetworkConfig,
    pub(crate) python: PythonConfig,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        let active_virtualenv = if snapshot.flag_is_enabled(IGNORE_VIRTUALENVS_ENV) {
            None
        } else {
            snapshot.non_empty("VIRTUAL_ENV").map(PathBuf::from)
        };
        Self {
            project: ProjectSettings {
                use_system: snapshot.flag_is_enabled(USE_SYSTEM_ENV),
                venv_in_project: snapshot.non_empty(VENV_IN_PROJECT_ENV).map(|value| {
                    let lowered = value.to_ascii_lowercase();
                    !matches!(lowered.as_str(), "0" | "false" | "no" | "off")
                }),
                virtualenv_home: snapshot.non_empty("WORKON_HOME").map(PathBuf::from),
                active_virtualenv,
                pipfile_override: snapshot.non_empty(PIPFILE_ENV).map(PathBuf::from),
                max_depth: snapshot
                    .non_empty(MAX_DEPTH_ENV)
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(DEFAULT_MAX_DEPTH),
            },
            network: NetworkConfig {
                pypi_mirror: snapshot.non_empty(PYPI_MIRROR_ENV).map(ToOwned::to_owned),
            },
            python: PythonConfig {
                default_version: snapshot.non_empty(DEFAULT_PYTHON_ENV).map(ToOwned::to_owned),
            },
        }
    }

    #[must_use]
    pub fn project(&self) -> &ProjectSettings {
        &self.project
    }

    #[must_use]
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    #[must_use]
    pub fn python(&self) -> &PythonConfig {
        &self.python
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkConfig {
    pub pypi_mirror: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PythonConfig {
    pub default_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = Config::from_snapshot(&EnvSnapshot::testing(&[]));
        assert!(!config.project().use_system);
        assert_eq!(config.project().venv_in_project, None);
        assert_eq!(config.project().max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.project().active_virtualenv.is_none());
        assert!(config.network().pypi_mirror.is_none());
        assert!(config.python().default_version.is_none());
    }

    #[test]
    fn use_system_requires_exact_flag() {
        let config = Config::from_snapshot(&EnvSnapshot::testing(&[(USE_SYSTEM_ENV, "1")]));
        assert!(config.project().use_system);
        let config = Config::from_snapshot(&EnvSnapshot::testing(&[(USE_SYSTEM_ENV, "yes")]));
        assert!(!config.project().use_system);
    }

    #[test]
    fn venv_in_project_handles_common_falsey_values() {
        for value in ["0", "false", "No", "off"] {
            let snapshot = EnvSnapshot::testing(&[(VENV_IN_PROJECT_ENV, value)]);
            assert_eq!(
                Config::from_snapshot(&snapshot).project().venv_in_project,
                Some(false),
                "{value}"
            );
        }
        let snapshot = EnvSnapshot::testing(&[(VENV_IN_PROJECT_ENV, "1")]);
        assert_eq!(
            Config::from_snapshot(&snapshot).project().venv_in_project,
            Some(true)
        );
        let snapshot = EnvSnapshot::testing(&[(VENV_IN_PROJECT_ENV, "")]);
        assert_eq!(Config::from_snapshot(&snapshot).project().venv_in_project, None);
    }

    #[test]
    fn active_virtualenv_can_be_ignored() {
        let snapshot = EnvSnapshot::testing(&[("VIRTUAL_ENV", "/envs/app")]);
        assert_eq!(
            Config::from_snapshot(&snapshot).project().active_virtualenv,
            Some(PathBuf::from("/envs/app"))
        );
        let snapshot = EnvSnapshot::testing(&[
            ("VIRTUAL_ENV", "/envs/app"),
            (IGNORE_VIRTUALENVS_ENV, "1"),
        ]);
        assert!(Config::from_snapshot(&snapshot)
            .project()
            .active_virtualenv
            .is_none());
    }

    #[test]
    fn max_depth_falls_back_on_garbage() {
        let snapshot = EnvSnapshot::testing(&[(MAX_DEPTH_ENV, "7")]);
        assert_eq!(Config::from_snapshot(&snapshot).project().max_depth, 7);
        let snapshot = EnvSnapshot::testing(&[(MAX_DEPTH_ENV, "deep")]);
        assert_eq!(
            Config::from_snapshot(&snapshot).project().max_depth,
            DEFAULT_MAX_DEPTH
        );
    }

    #[test]
    fn mirror_and_default_python_are_read() {
        let snapshot = EnvSnapshot::testing(&[
            (PYPI_MIRROR_ENV, "https://mirror.example/simple"),
            (DEFAULT_PYTHON_ENV, "3.12"),
        ]);
        let config = Config::from_snapshot(&snapshot);
        assert_eq!(
            config.network().pypi_mirror.as_deref(),
            Some("https://mirror.example/simple")
        );
        assert_eq!(config.python().default_version.as_deref(), Some("3.12"));
    }
}
