use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use penv_domain::Project;

use crate::config::Config;
use crate::diagnostics::{StderrSink, StyledLine};
use crate::interpreter::{SystemBuildTools, SystemInterpreterLocator, SystemVersionReader};
use crate::manifest::SystemManifest;
use crate::virtualenv::SystemVirtualenv;

/// What the environment provisioner is asked to produce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VirtualenvRequest<'a> {
    pub python: Option<&'a str>,
    pub site_packages: Option<bool>,
    pub pypi_mirror: Option<&'a str>,
    pub clear: bool,
}

/// What the manifest manager is asked to guarantee.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ManifestRequest<'a> {
    pub validate: bool,
    pub skip_requirements: bool,
    pub system: bool,
    pub categories: Option<&'a BTreeSet<String>>,
}

pub trait VirtualenvProvisioner: Send + Sync {
    /// Creates or locates the project's environment; afterwards an
    /// interpreter must be resolvable inside it.
    fn ensure(&self, project: &Project, request: &VirtualenvRequest<'_>) -> Result<()>;
}

pub trait ManifestManager: Send + Sync {
    /// Creates the manifest when absent, validates it when requested.
    fn ensure(&self, project: &Project, request: &ManifestRequest<'_>) -> Result<()>;
}

pub trait InterpreterLocator: Send + Sync {
    fn which(&self, project: &Project, name: &str) -> Option<PathBuf>;
    /// The interpreter used for `system` mode, or the project's own one.
    fn python(&self, project: &Project, system: bool) -> Option<PathBuf>;
}

pub trait VersionReader: Send + Sync {
    fn version_of(&self, python: &Path) -> Option<String>;
}

pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, lines: &[StyledLine]);
}

pub trait ProcessEnvironment: Send + Sync {
    fn publish(&self, key: &str, value: &OsStr);
}

pub trait BuildToolProbe: Send + Sync {
    /// Installed setuptools version, if any.
    fn setuptools_version(&self) -> Option<String>;
}

pub trait Effects: Send + Sync {
    fn virtualenv(&self) -> &dyn VirtualenvProvisioner;
    fn manifest(&self) -> &dyn ManifestManager;
    fn interpreters(&self) -> &dyn InterpreterLocator;
    fn versions(&self) -> &dyn VersionReader;
    fn diagnostics(&self) -> &dyn DiagnosticSink;
    fn environment(&self) -> &dyn ProcessEnvironment;
    fn build_tools(&self) -> &dyn BuildToolProbe;
}

pub struct SystemEffects {
    virtualenv: Arc<SystemVirtualenv>,
    manifest: Arc<SystemManifest>,
    interpreters: Arc<SystemInterpreterLocator>,
    versions: Arc<SystemVersionReader>,
    diagnostics: Arc<StderrSink>,
    environment: Arc<SystemEnvironment>,
    build_tools: Arc<SystemBuildTools>,
}

impl SystemEffects {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            virtualenv: Arc::new(SystemVirtualenv::new(
                config.python().default_version.clone(),
            )),
            manifest: Arc::new(SystemManifest::new()),
            interpreters: Arc::new(SystemInterpreterLocator),
            versions: Arc::new(SystemVersionReader),
            diagnostics: Arc::new(StderrSink::detect()),
            environment: Arc::new(SystemEnvironment),
            build_tools: Arc::new(SystemBuildTools),
        }
    }
}

impl Effects for SystemEffects {
    fn virtualenv(&self) -> &dyn VirtualenvProvisioner {
        self.virtualenv.as_ref()
    }

    fn manifest(&self) -> &dyn ManifestManager {
        self.manifest.as_ref()
    }

    fn interpreters(&self) -> &dyn InterpreterLocator {
        self.interpreters.as_ref()
    }

    fn versions(&self) -> &dyn VersionReader {
        self.versions.as_ref()
    }

    fn diagnostics(&self) -> &dyn DiagnosticSink {
        self.diagnostics.as_ref()
    }

    fn environment(&self) -> &dyn ProcessEnvironment {
        self.environment.as_ref()
    }

    fn build_tools(&self) -> &dyn BuildToolProbe {
        self.build_tools.as_ref()
    }
}

/// Writes straight into the process environment table.
struct SystemEnvironment;

impl ProcessEnvironment for SystemEnvironment {
    fn publish(&self, key: &str, value: &OsStr) {
        std::env::set_var(key, value);
    }
}

pub type SharedEffects = Arc<dyn Effects>;
