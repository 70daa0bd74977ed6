use std::path::{Path, PathBuf};

use penv_domain::Project;
use penv_python::{
    detect_interpreter, distribution_version, python_version, which_in, which_on_path,
};

use crate::effects::{BuildToolProbe, InterpreterLocator, VersionReader};

/// Resolves executables inside the project's environment, or on `PATH` when
/// the system interpreter is in use.
pub struct SystemInterpreterLocator;

impl InterpreterLocator for SystemInterpreterLocator {
    fn which(&self, project: &Project, name: &str) -> Option<PathBuf> {
        if project.uses_system_python() {
            return which_on_path(name);
        }
        which_in(name, &[project.scripts_dir()])
    }

    fn python(&self, project: &Project, system: bool) -> Option<PathBuf> {
        if system || project.uses_system_python() {
            return detect_interpreter().ok();
        }
        self.which(project, "python")
    }
}

pub struct SystemVersionReader;

impl VersionReader for SystemVersionReader {
    fn version_of(&self, python: &Path) -> Option<String> {
        python_version(python)
    }
}

/// Asks the default interpreter which setuptools it has installed.
pub struct SystemBuildTools;

impl BuildToolProbe for SystemBuildTools {
    fn setuptools_version(&self) -> Option<String> {
        let python = detect_interpreter().ok()?;
        distribution_version(&python, "setuptools")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use penv_domain::ProjectSettings;
    use tempfile::tempdir;

    #[test]
    fn missing_environment_has_no_python() {
        let root = tempdir().unwrap();
        let settings = ProjectSettings {
            venv_in_project: Some(true),
            ..ProjectSettings::default()
        };
        let project = Project::at(root.path(), settings);
        assert!(SystemInterpreterLocator.which(&project, "python").is_none());
        assert!(SystemInterpreterLocator.python(&project, false).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn finds_python_in_project_environment() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let root = tempdir().unwrap();
        let settings = ProjectSettings {
            venv_in_project: Some(true),
            ..ProjectSettings::default()
        };
        let project = Project::at(root.path(), settings);
        let bin = project.scripts_dir();
        fs::create_dir_all(&bin).unwrap();
        let python = bin.join("python");
        fs::write(&python, "#!/bin/sh\necho 3.11.4\n").unwrap();
        fs::set_permissions(&python, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(
            SystemInterpreterLocator.python(&project, false),
            Some(python.clone())
        );
        assert!(SystemInterpreterLocator.which(&project, "py").is_none());
    }
}
