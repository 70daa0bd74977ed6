use anyhow::Result;
use penv_domain::{
    ensure_build_system, read_requirements_file, Pipfile, PipfileInitializer, PipfileSource,
    Project,
};
use penv_python::normalize_channel;
use tracing::{debug, info};

use crate::backend::resolve_default_build_backend;
use crate::effects::{InterpreterLocator, ManifestManager, ManifestRequest, VersionReader};
use crate::interpreter::{SystemBuildTools, SystemInterpreterLocator, SystemVersionReader};

pub struct SystemManifest {
    locator: SystemInterpreterLocator,
    versions: SystemVersionReader,
    build_tools: SystemBuildTools,
}

impl SystemManifest {
    #[must_use]
    pub fn new() -> Self {
        Self {
            locator: SystemInterpreterLocator,
            versions: SystemVersionReader,
            build_tools: SystemBuildTools,
        }
    }

    fn python_channel(&self, project: &Project, system: bool) -> Option<String> {
        let python = self.locator.python(project, system)?;
        let version = self.versions.version_of(&python)?;
        normalize_channel(&version).ok()
    }
}

impl Default for SystemManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestManager for SystemManifest {
    fn ensure(&self, project: &Project, request: &ManifestRequest<'_>) -> Result<()> {
        ensure_manifest(
            project,
            request,
            || self.python_channel(project, request.system),
            || resolve_default_build_backend(&self.build_tools),
        )
    }
}

/// Create the Pipfile when absent (importing `requirements.txt` unless told
/// not to), validate it when present, then make sure requested categories
/// exist.
pub(crate) fn ensure_manifest(
    project: &Project,
    request: &ManifestRequest<'_>,
    python_channel: impl FnOnce() -> Option<String>,
    backend: impl FnOnce() -> &'static str,
) -> Result<()> {
    let path = project.pipfile_path();
    if project.pipfile_exists() {
        if request.validate {
            Pipfile::read(path)?.validate(request.categories)?;
            debug!(pipfile = %path.display(), "Pipfile validated");
        }
    } else {
        let python = python_channel();
        if project.requirements_exists() && !request.skip_requirements {
            let imported = import_requirements(project, python.as_deref())?;
            info!(
                pipfile = %path.display(),
                count = imported,
                "created Pipfile from requirements.txt"
            );
        } else {
            PipfileInitializer::scaffold(path, python.as_deref())?;
            info!(pipfile = %path.display(), python = ?python, "created Pipfile");
        }
        if ensure_build_system(project.root(), backend)? {
            info!(root = %project.root().display(), "added [build-system] to pyproject.toml");
        }
    }

    if let Some(categories) = request.categories {
        let mut pipfile = Pipfile::read(path)?;
        if pipfile.ensure_categories(categories) {
            pipfile.save()?;
        }
    }
    Ok(())
}

fn import_requirements(project: &Project, python: Option<&str>) -> Result<usize> {
    let parsed = read_requirements_file(&project.requirements_path())?;
    // nothing touches disk until every requirement converted
    let mut pipfile = PipfileInitializer::build(project.pipfile_path(), python);
    for index in &parsed.index_urls {
        pipfile.add_source(&PipfileSource::from_index_url(index)?);
    }
    let added = pipfile.add_requirements("default", &parsed.specs)?;
    pipfile.save()?;
    Ok(added)
}
