use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use penv_domain::Project;

use crate::config::Config;
use crate::effects::{Effects, SharedEffects, SystemEffects};

/// Configuration plus the collaborators a bootstrap run talks to.
pub struct BootstrapContext {
    config: Config,
    effects: SharedEffects,
}

impl BootstrapContext {
    #[must_use]
    pub fn new(config: Config, effects: SharedEffects) -> Self {
        Self { config, effects }
    }

    /// Reads configuration from the process environment and wires the real
    /// collaborators.
    #[must_use]
    pub fn from_env() -> Self {
        let config = Config::from_env();
        let effects: SharedEffects = Arc::new(SystemEffects::new(&config));
        Self::new(config, effects)
    }

    pub fn effects(&self) -> &dyn Effects {
        self.effects.as_ref()
    }

    pub fn shared_effects(&self) -> SharedEffects {
        self.effects.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The project owning the working directory.
    ///
    /// # Errors
    /// Returns an error if the working directory cannot be determined.
    pub fn current_project(&self) -> Result<Project> {
        Project::from_current_dir(self.config.project().clone())
    }

    /// A project rooted exactly at `root`, without walking up for a Pipfile.
    pub fn project_at(&self, root: impl Into<PathBuf>) -> Project {
        Project::at(root, self.config.project().clone())
    }
}
