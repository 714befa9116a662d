//! djforge core - Django project generation
//!
//! This library turns a feature selection and a deployment profile into a
//! runnable Django project. It drives the external toolchain (`venv`, `pip`,
//! `django-admin`, `create-next-app`), patches the generated settings and
//! arranges the result for the chosen deployment target.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Layer 1: Core Operations** - feature selection, directory planning,
//!   tool invocation, the config patch engine and templates
//! - **Layer 2: Workflow Orchestration** - the step [`pipeline`], deployment
//!   assembly and [`generate()`] which ties them together
//! - **Layer 3: CLI/TUI Interface** - optional cliclack-based prompts
//!   (feature-gated)
//!
//! # Feature Flags
//!
//! - `tui` (default): Enables the cliclack-based TUI prompts module
//!
//! # Example Usage (without TUI)
//!
//! ```ignore
//! use djforge_core::{features::FeatureSelector, planner, pipeline::ProjectRequest};
//!
//! let selection = FeatureSelector::default().select(&[Feature::CrossOrigin], &["requests"])?;
//! let project = planner::plan(&cwd, "shop", DeploymentProfile::Standalone)?;
//! let request = ProjectRequest::new(project, selection);
//! let generated = djforge_core::generate(
//!     &request,
//!     &ProcessInvoker::default(),
//!     &Templates::bundled(),
//!     &mut NoopObserver,
//! )
//! .await?;
//! ```

pub mod config;
pub mod deploy;
pub mod error;
pub mod features;
pub mod generate;
pub mod pipeline;
pub mod planner;
pub mod product;
pub mod runtime;
pub mod templates;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export main types for convenience
pub use error::{Error, Result, UserInputError};
pub use features::{Feature, FeatureSelection, FeatureSelector};
pub use generate::{generate, Generated};
pub use pipeline::{Executor, PipelineReport, ProjectRequest, StepObserver};
pub use planner::{DeploymentProfile, ProjectDescriptor};
pub use product::{Defaults, ProductConfig};
pub use runtime::{check_runtimes_with_advisory, ProcessInvoker, Runtime, RuntimeInfo, ToolInvoker};
pub use templates::{TemplateFetcher, TemplateProvider, TemplateSource, Templates};

#[cfg(feature = "tui")]
pub use tui::run;

/// CLI version - used for template compatibility checking
/// The binary passes its own version, this is the fallback
pub const DEFAULT_CLI_VERSION: &str = "0.1.0";
