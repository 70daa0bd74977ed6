use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use penv_domain::Project;
use penv_python::find_python;
use tracing::{debug, info};

use crate::effects::{VirtualenvProvisioner, VirtualenvRequest};

#[cfg(windows)]
const PIP_CONFIG_NAME: &str = "pip.ini";
#[cfg(not(windows))]
const PIP_CONFIG_NAME: &str = "pip.conf";

/// Builds environments with the interpreter's own `venv` module.
pub struct SystemVirtualenv {
    default_python: Option<String>,
}

impl SystemVirtualenv {
    #[must_use]
    pub fn new(default_python: Option<String>) -> Self {
        Self { default_python }
    }

    /// Explicit request first, then the Pipfile pin, then the configured default.
    fn interpreter_for(
        &self,
        project: &Project,
        request: &VirtualenvRequest<'_>,
    ) -> Result<PathBuf> {
        let wanted = request
            .python
            .map(ToOwned::to_owned)
            .or_else(|| project.required_python_version())
            .or_else(|| self.default_python.clone());
        find_python(wanted.as_deref())
    }
}

impl VirtualenvProvisioner for SystemVirtualenv {
    fn ensure(&self, project: &Project, request: &VirtualenvRequest<'_>) -> Result<()> {
        let location = project.virtualenv_location();
        if project.virtualenv_exists() && !request.clear {
            debug!(location = %location.display(), "virtual environment already present");
            return Ok(());
        }

        let python = self.interpreter_for(project, request)?;
        info!(
            python = %python.display(),
            location = %location.display(),
            "creating virtual environment"
        );
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let output = Command::new(&python)
            .args(venv_args(&location, request))
            .output()
            .with_context(|| format!("failed to run {}", python.display()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "failed to create virtual environment at {}: {}",
                location.display(),
                stderr.trim()
            );
        }

        if let Some(mirror) = request.pypi_mirror {
            let config = write_pip_config(&location, mirror)?;
            debug!(config = %config.display(), "pinned package index for environment");
        }
        Ok(())
    }
}

fn venv_args(location: &Path, request: &VirtualenvRequest<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-m".into(), "venv".into()];
    if request.site_packages == Some(true) {
        args.push("--system-site-packages".into());
    }
    if request.clear {
        args.push("--clear".into());
    }
    args.push(location.as_os_str().to_os_string());
    args
}

/// pip reads this file for every command run inside the environment.
fn write_pip_config(location: &Path, mirror: &str) -> Result<PathBuf> {
    let path = location.join(PIP_CONFIG_NAME);
    fs::write(&path, format!("[global]\nindex-url = {mirror}\n"))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use penv_domain::ProjectSettings;
    use tempfile::{tempdir, TempDir};

    fn in_project(root: &TempDir) -> Project {
        let settings = ProjectSettings {
            venv_in_project: Some(true),
            ..ProjectSettings::default()
        };
        Project::at(root.path(), settings)
    }

    #[test]
    fn venv_args_reflect_request() {
        let location = Path::new("/tmp/env");
        let plain = venv_args(location, &VirtualenvRequest::default());
        assert_eq!(plain, vec!["-m", "venv", "/tmp/env"]);

        let request = VirtualenvRequest {
            site_packages: Some(true),
            clear: true,
            ..VirtualenvRequest::default()
        };
        assert_eq!(
            venv_args(location, &request),
            vec!["-m", "venv", "--system-site-packages", "--clear", "/tmp/env"]
        );

        let request = VirtualenvRequest {
            site_packages: Some(false),
            ..VirtualenvRequest::default()
        };
        assert_eq!(venv_args(location, &request).len(), 3);
    }

    #[test]
    fn pip_config_points_at_mirror() {
        let dir = tempdir().unwrap();
        let path = write_pip_config(dir.path(), "https://mirror.example/simple").unwrap();
        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(
            contents,
            "[global]\nindex-url = https://mirror.example/simple\n"
        );
    }

    #[test]
    fn existing_environment_is_left_alone() {
        let root = tempdir().unwrap();
        let project = in_project(&root);
        let location = project.virtualenv_location();
        fs::create_dir_all(&location).unwrap();
        fs::write(location.join("pyvenv.cfg"), "home = /usr/bin\n").unwrap();

        let request = VirtualenvRequest {
            python: Some("/nonexistent/python"),
            ..VirtualenvRequest::default()
        };
        SystemVirtualenv::new(None)
            .ensure(&project, &request)
            .expect("no-op");
    }

    #[cfg(unix)]
    fn fake_python(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-python");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn creates_environment_and_pins_mirror() {
        let root = tempdir().unwrap();
        let tools = tempdir().unwrap();
        let python = fake_python(
            tools.path(),
            r#"for last; do :; done
mkdir -p "$last"
echo "home = /usr/bin" > "$last/pyvenv.cfg""#,
        );
        let project = in_project(&root);
        let request = VirtualenvRequest {
            python: python.to_str(),
            pypi_mirror: Some("https://mirror.example/simple"),
            ..VirtualenvRequest::default()
        };

        SystemVirtualenv::new(None)
            .ensure(&project, &request)
            .expect("create env");
        assert!(project.virtualenv_exists());
        assert!(project
            .virtualenv_location()
            .join(PIP_CONFIG_NAME)
            .is_file());
    }

    #[cfg(unix)]
    #[test]
    fn reports_interpreter_failure() {
        let root = tempdir().unwrap();
        let tools = tempdir().unwrap();
        let python = fake_python(tools.path(), "echo 'venv: boom' >&2\nexit 1");
        let project = in_project(&root);
        let request = VirtualenvRequest {
            python: python.to_str(),
            ..VirtualenvRequest::default()
        };

        let err = SystemVirtualenv::new(None)
            .ensure(&project, &request)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("failed to create virtual environment"), "{message}");
        assert!(message.contains("venv: boom"), "{message}");
        assert!(!project.virtualenv_exists());
    }
}
