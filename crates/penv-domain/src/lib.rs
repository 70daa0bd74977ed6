#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod project;

pub use project::{
    category_section, ensure_build_system, read_requirements_file, sanitize_project_name,
    Pipfile, PipfileInitializer, PipfileSource, Project, ProjectSettings, RequirementFile,
    DEFAULT_CATEGORIES, DEFAULT_MAX_DEPTH, DEFAULT_SOURCE_URL, PIPFILE_NAME, REQUIREMENTS_NAME,
};
