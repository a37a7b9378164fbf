//! Config loader: builds a `PlannerConfig` from the layered sources.

use super::merge::merge_policy;
use super::sources::{environment, explicit_file, global_file};
use super::PlannerConfig;
use crate::error::PlanError;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults, the global config file if present, then environment overrides.
    pub fn load() -> Result<PlannerConfig, PlanError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = environment::add_to_builder(builder);
        Self::finish(builder)
    }

    /// Load defaults, `path`, then environment overrides. The global file is skipped.
    pub fn load_from_file(path: &Path) -> Result<PlannerConfig, PlanError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = explicit_file::add_to_builder(builder, path)?;
        let builder = environment::add_to_builder(builder);
        Self::finish(builder)
    }

    /// Defaults only, ignoring files and environment.
    pub fn defaults() -> Result<PlannerConfig, PlanError> {
        Self::finish(merge_policy::builder_with_defaults()?)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<PlannerConfig, PlanError> {
        let config: PlannerConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            PlanError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }
}
