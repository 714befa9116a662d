//! Product configuration trait for the CLI binary
//!
//! The binary implements [`ProductConfig`] to supply its identity, template
//! source, documentation links and the instructions printed after a project
//! has been generated.

use crate::config::settings::{DEFAULT_LANGUAGE_CODE, DEFAULT_TIME_ZONE};
use crate::features::FeatureSelection;
use crate::planner::ProjectDescriptor;
use crate::runtime::check::Runtime;
use crate::runtime::invoker::DEFAULT_TOOL_TIMEOUT;
use std::time::Duration;

/// Values used when neither a flag nor an environment variable sets them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub tool_timeout: Duration,
    pub language_code: &'static str,
    pub time_zone: &'static str,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            language_code: DEFAULT_LANGUAGE_CODE,
            time_zone: DEFAULT_TIME_ZONE,
        }
    }
}

/// Configuration trait for the CLI product
pub trait ProductConfig: Clone + Send + Sync + 'static {
    /// Internal product name (used for the command and env vars)
    fn name(&self) -> &'static str;

    /// Human-readable display name
    fn display_name(&self) -> &'static str;

    /// Remote template pack used when no other source is given
    fn default_template_url(&self) -> Option<&'static str> {
        None
    }

    /// Environment variable overriding the template pack URL
    fn template_url_env(&self) -> &'static str;

    /// Install documentation for a runtime
    fn docs_url(&self, runtime: Runtime) -> &'static str;

    /// Upgrade/install command shown in version warnings
    fn upgrade_command(&self) -> &'static str;

    /// Generate the "next steps" instructions after project creation
    fn next_steps(&self, project: &ProjectDescriptor, selection: &FeatureSelection) -> Vec<String>;

    fn defaults(&self) -> Defaults {
        Defaults::default()
    }

    /// User agent string for HTTP requests
    fn user_agent(&self) -> &'static str {
        self.name()
    }
}
