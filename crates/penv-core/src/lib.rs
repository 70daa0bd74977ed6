#![deny(clippy::all, warnings)]

mod backend;
mod bootstrap;
pub mod config;
pub mod diagnostics;
pub mod effects;
mod interpreter;
mod manifest;
mod virtualenv;

pub use crate::backend::{
    backend_for_version, resolve_default_build_backend, SETUPTOOLS_BACKEND,
    SETUPTOOLS_LEGACY_BACKEND,
};
pub use crate::bootstrap::{
    ensure_project, EnsureError, EnsureOptions, ProjectReady, VersionCompliance, PYTHON_PATH_ENV,
};
pub use crate::config::context::BootstrapContext;
pub use crate::config::{Config, NetworkConfig, PythonConfig};
pub use crate::effects::{
    BuildToolProbe, DiagnosticSink, Effects, InterpreterLocator, ManifestManager, ManifestRequest,
    ProcessEnvironment, SharedEffects, SystemEffects, VersionReader, VirtualenvProvisioner,
    VirtualenvRequest,
};
pub use crate::interpreter::{SystemBuildTools, SystemInterpreterLocator, SystemVersionReader};
pub use crate::manifest::SystemManifest;
pub use crate::virtualenv::SystemVirtualenv;
pub use penv_domain::{Project, ProjectSettings};
