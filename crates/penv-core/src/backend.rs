//! Default PEP 517 build backend selection for generated manifests.

use std::str::FromStr;

use pep440_rs::Version;

use crate::effects::BuildToolProbe;

pub const SETUPTOOLS_BACKEND: &str = "setuptools.build_meta";
pub const SETUPTOOLS_LEGACY_BACKEND: &str = "setuptools.build_meta:__legacy__";

/// First setuptools release shipping `build_meta:__legacy__`.
const LEGACY_BACKEND_MIN_VERSION: &str = "40.8.0";

/// Picks the backend for whatever setuptools the probe can see.
#[must_use]
pub fn resolve_default_build_backend(probe: &dyn BuildToolProbe) -> &'static str {
    let version = probe.setuptools_version();
    let backend = backend_for_version(version.as_deref());
    tracing::debug!(setuptools = ?version, backend, "resolved default build backend");
    backend
}

/// Missing and unparsable versions both get the baseline backend.
#[must_use]
pub fn backend_for_version(setuptools: Option<&str>) -> &'static str {
    let Some(installed) = setuptools.and_then(|raw| Version::from_str(raw.trim()).ok()) else {
        return SETUPTOOLS_BACKEND;
    };
    match Version::from_str(LEGACY_BACKEND_MIN_VERSION) {
        Ok(threshold) if installed >= threshold => SETUPTOOLS_LEGACY_BACKEND,
        _ => SETUPTOOLS_BACKEND,
    }
}
