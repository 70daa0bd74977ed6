//! Project handle, Pipfile manifest model, and virtual environment location rules.

pub(crate) mod pipfile;
pub(crate) mod pyproject;
pub(crate) mod requirements;

use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

pub use pipfile::{
    category_section, Pipfile, PipfileInitializer, PipfileSource, DEFAULT_CATEGORIES,
    DEFAULT_SOURCE_URL, PIPFILE_NAME,
};
pub use pyproject::ensure_build_system;
pub use requirements::{read_requirements_file, RequirementFile, REQUIREMENTS_NAME};

pub const DEFAULT_MAX_DEPTH: usize = 3;

const IN_PROJECT_VENV: &str = ".venv";

/// Operator-level knobs that shape where a project lives and which
/// interpreter it uses.
#[derive(Clone, Debug)]
pub struct ProjectSettings {
    /// Forces the system interpreter; virtual environment creation is skipped.
    pub use_system: bool,
    /// `Some(true)` keeps the environment in `<root>/.venv`, `Some(false)`
    /// keeps it under the virtualenv home, `None` picks `.venv` only when it
    /// already exists.
    pub venv_in_project: Option<bool>,
    pub virtualenv_home: Option<PathBuf>,
    /// An already activated environment; it wins over every other location.
    pub active_virtualenv: Option<PathBuf>,
    pub pipfile_override: Option<PathBuf>,
    pub max_depth: usize,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            use_system: false,
            venv_in_project: None,
            virtualenv_home: None,
            active_virtualenv: None,
            pipfile_override: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Project {
    root: PathBuf,
    pipfile_path: PathBuf,
    settings: ProjectSettings,
}

impl Project {
    pub fn at(root: impl Into<PathBuf>, settings: ProjectSettings) -> Self {
        let root = root.into();
        let pipfile_path = settings
            .pipfile_override
            .clone()
            .unwrap_or_else(|| root.join(PIPFILE_NAME));
        Self {
            root,
            pipfile_path,
            settings,
        }
    }

    /// Walk up from `start` looking for a `Pipfile`, at most
    /// `settings.max_depth` parents deep.
    pub fn discover(start: &Path, settings: ProjectSettings) -> Result<Option<Self>> {
        if let Some(pipfile) = settings.pipfile_override.clone() {
            let pipfile = if pipfile.is_absolute() {
                pipfile
            } else {
                start.join(pipfile)
            };
            let root = pipfile
                .parent()
                .map_or_else(|| start.to_path_buf(), Path::to_path_buf);
            let settings = ProjectSettings {
                pipfile_override: Some(pipfile),
                ..settings
            };
            return Ok(Some(Self::at(root, settings)));
        }

        let mut dir = start.to_path_buf();
        for _ in 0..=settings.max_depth {
            if dir.join(PIPFILE_NAME).is_file() {
                return Ok(Some(Self::at(dir, settings)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// The project owning the working directory, or a fresh one rooted there
    /// when no `Pipfile` is found.
    pub fn from_current_dir(settings: ProjectSettings) -> Result<Self> {
        let cwd = env::current_dir().context("unable to determine project root")?;
        match Self::discover(&cwd, settings.clone())? {
            Some(project) => Ok(project),
            None => Ok(Self::at(cwd, settings)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn name(&self) -> String {
        let raw = self
            .root
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("project");
        sanitize_project_name(raw)
    }

    pub fn uses_system_python(&self) -> bool {
        self.settings.use_system
    }

    pub fn pipfile_path(&self) -> &Path {
        &self.pipfile_path
    }

    pub fn pipfile_exists(&self) -> bool {
        self.pipfile_path.is_file()
    }

    pub fn requirements_path(&self) -> PathBuf {
        self.root.join(REQUIREMENTS_NAME)
    }

    pub fn requirements_exists(&self) -> bool {
        self.requirements_path().is_file()
    }

    /// The Python version the Pipfile pins under `[requires]`, if any.
    ///
    /// An unreadable Pipfile reports no requirement; manifest validation is
    /// where parse failures surface.
    pub fn required_python_version(&self) -> Option<String> {
        if !self.pipfile_exists() {
            return None;
        }
        match Pipfile::read(&self.pipfile_path) {
            Ok(pipfile) => pipfile.required_python_version(),
            Err(err) => {
                tracing::debug!(
                    %err,
                    pipfile = %self.pipfile_path.display(),
                    "unable to read python requirement"
                );
                None
            }
        }
    }

    /// `<sanitized dir name>-<8 hex chars of the root path digest>`.
    pub fn virtualenv_name(&self) -> String {
        let digest = Sha256::digest(self.root.to_string_lossy().as_bytes());
        let hash = hex::encode(digest);
        format!("{}-{}", self.name(), &hash[..8])
    }

    pub fn virtualenv_location(&self) -> PathBuf {
        if let Some(active) = &self.settings.active_virtualenv {
            return active.clone();
        }
        let in_project = self.root.join(IN_PROJECT_VENV);
        let use_in_project = self
            .settings
            .venv_in_project
            .unwrap_or_else(|| in_project.is_dir());
        if use_in_project {
            return in_project;
        }
        self.settings
            .virtualenv_home
            .clone()
            .unwrap_or_else(default_virtualenv_home)
            .join(self.virtualenv_name())
    }

    pub fn virtualenv_exists(&self) -> bool {
        self.virtualenv_location().join("pyvenv.cfg").is_file()
    }

    pub fn scripts_dir(&self) -> PathBuf {
        let location = self.virtualenv_location();
        if cfg!(windows) {
            location.join("Scripts")
        } else {
            location.join("bin")
        }
    }
}

fn default_virtualenv_home() -> PathBuf {
    if let Some(data) = dirs_next::data_dir() {
        return data.join("virtualenvs");
    }
    dirs_next::home_dir()
        .map_or_else(|| PathBuf::from(".virtualenvs"), |home| home.join(".virtualenvs"))
}

#[must_use]
pub fn sanitize_project_name(raw: &str) -> String {
    let mut result = String::new();
    let mut last_was_sep = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            result.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            result.push('_');
            last_was_sep = true;
        }
    }
    let trimmed = result.trim_matches('_');
    if trimmed.is_empty() {
        "project".to_string()
    } else {
        trimmed.chars().take(42).collect()
    }
}
