//! Guarantees a project has a usable interpreter and a Pipfile before any
//! dependency work starts.

mod compliance;

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::anyhow;
use penv_domain::Project;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::context::BootstrapContext;
use crate::effects::{ManifestRequest, VirtualenvRequest};

pub use compliance::VersionCompliance;

/// Environment variable child processes read the resolved interpreter from.
pub const PYTHON_PATH_ENV: &str = "PIP_PYTHON_PATH";

/// Mode flags for a single bootstrap run. Missing fields deserialize to
/// their [`Default`] values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsureOptions {
    /// Interpreter path, version, or executable name for a new environment.
    pub python: Option<String>,
    pub validate: bool,
    /// Use the system interpreter instead of a virtual environment.
    pub system: bool,
    pub warn: bool,
    pub site_packages: Option<bool>,
    /// Strict mode: a missing Pipfile or interpreter mismatch is fatal.
    pub deploy: bool,
    pub skip_requirements: bool,
    pub pypi_mirror: Option<String>,
    pub clear: bool,
    pub pipfile_categories: Option<BTreeSet<String>>,
}

impl Default for EnsureOptions {
    fn default() -> Self {
        Self {
            python: None,
            validate: true,
            system: false,
            warn: true,
            site_packages: None,
            deploy: false,
            skip_requirements: false,
            pypi_mirror: None,
            clear: false,
            pipfile_categories: None,
        }
    }
}

/// What a successful bootstrap resolved, for callers that spawn tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectReady {
    pub python: PathBuf,
    pub created_virtualenv: bool,
    pub compliance: VersionCompliance,
}

#[derive(Debug, thiserror::Error)]
pub enum EnsureError {
    #[error("Pipfile not found at {}; deploy mode requires one", .path.display())]
    PipfileNotFound { path: PathBuf },
    #[error(
        "Pipfile requires python {required}, but {} reports {}; aborting deploy",
        .python.display(),
        .actual.as_deref().unwrap_or("an unknown version")
    )]
    Deploy {
        required: String,
        actual: Option<String>,
        python: PathBuf,
    },
    /// Provisioner, manifest, or locator failure, passed through untouched.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

/// Make sure `project` has a virtual environment (unless the system
/// interpreter is in use) and a valid Pipfile, then publish the resolved
/// interpreter in [`PYTHON_PATH_ENV`].
///
/// # Errors
///
/// [`EnsureError::PipfileNotFound`] when deploying without a Pipfile,
/// [`EnsureError::Deploy`] when deploying with a mismatched interpreter, and
/// [`EnsureError::Collaborator`] for anything the provisioners report.
pub fn ensure_project(
    ctx: &BootstrapContext,
    project: &Project,
    options: &EnsureOptions,
) -> Result<ProjectReady, EnsureError> {
    let effects = ctx.effects();
    let system_or_exists =
        project.uses_system_python() || project.virtualenv_exists() || options.system;

    if options.deploy && !project.pipfile_exists() {
        return Err(EnsureError::PipfileNotFound {
            path: project.pipfile_path().to_path_buf(),
        });
    }

    let mut created_virtualenv = false;
    let mut compliance = VersionCompliance::NotChecked;
    if system_or_exists {
        debug!(
            root = %project.root().display(),
            system = options.system,
            "skipping virtual environment creation"
        );
    } else {
        let request = VirtualenvRequest {
            python: options.python.as_deref(),
            site_packages: options.site_packages,
            pypi_mirror: options
                .pypi_mirror
                .as_deref()
                .or(ctx.config().network().pypi_mirror.as_deref()),
            clear: options.clear,
        };
        debug!(?request, "ensuring virtual environment");
        effects.virtualenv().ensure(project, &request)?;
        created_virtualenv = true;

        if options.warn {
            compliance = compliance::check(project, effects.interpreters(), effects.versions());
            if let VersionCompliance::Mismatch {
                required,
                actual,
                python,
            } = &compliance
            {
                warn!(
                    %required,
                    actual = actual.as_deref().unwrap_or("unknown"),
                    python = %python.display(),
                    deploy = options.deploy,
                    "python version mismatch"
                );
                effects.diagnostics().emit(&compliance::mismatch_warning(
                    required,
                    actual.as_deref(),
                    python,
                    options.deploy,
                ));
                if options.deploy {
                    return Err(EnsureError::Deploy {
                        required: required.clone(),
                        actual: actual.clone(),
                        python: python.clone(),
                    });
                }
            }
        }
    }

    let manifest = ManifestRequest {
        validate: options.validate,
        skip_requirements: options.skip_requirements,
        system: options.system,
        categories: options.pipfile_categories.as_ref(),
    };
    debug!(?manifest, "ensuring Pipfile");
    effects.manifest().ensure(project, &manifest)?;

    let python = effects
        .interpreters()
        .python(project, options.system)
        .ok_or_else(|| anyhow!("no python interpreter found for {}", project.root().display()))?;
    effects
        .environment()
        .publish(PYTHON_PATH_ENV, python.as_os_str());
    debug!(python = %python.display(), "project ready");

    Ok(ProjectReady {
        python,
        created_virtualenv,
        compliance,
    })
}
