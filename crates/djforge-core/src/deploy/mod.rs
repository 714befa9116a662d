//! Deployment layout assembly
//!
//! Runs after the pipeline. Each [`DeploymentProfile`] has one [`Assembler`]
//! that rearranges the generated tree and writes the profile's artifacts.

pub mod container;
pub mod hosting;

use crate::error::{Error, Result};
use crate::features::{Feature, FeatureSelection};
use crate::pipeline::ProjectRequest;
use crate::planner::DeploymentProfile;
use crate::templates::TemplateProvider;
use std::path::PathBuf;

pub use container::ContainerAssembler;
pub use hosting::HostingAssembler;

/// Profile/feature pairs that cannot be generated together
pub const UNSUPPORTED: &[(DeploymentProfile, Feature)] = &[];

pub trait Assembler {
    fn profile(&self) -> DeploymentProfile;

    /// Rearrange the project and return the files written
    fn assemble(
        &self,
        request: &ProjectRequest,
        templates: &dyn TemplateProvider,
    ) -> Result<Vec<PathBuf>>;
}

/// Leaves the generated tree as it is
#[derive(Debug, Default)]
pub struct StandaloneAssembler;

impl Assembler for StandaloneAssembler {
    fn profile(&self) -> DeploymentProfile {
        DeploymentProfile::Standalone
    }

    fn assemble(
        &self,
        _request: &ProjectRequest,
        _templates: &dyn TemplateProvider,
    ) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

pub fn assembler_for(profile: DeploymentProfile) -> Box<dyn Assembler> {
    match profile {
        DeploymentProfile::Standalone => Box::new(StandaloneAssembler),
        DeploymentProfile::Containerized => Box::new(ContainerAssembler),
        DeploymentProfile::SharedHostingPlatform => Box::new(HostingAssembler),
    }
}

/// Check `selection` against the built-in capability matrix
pub fn check_support(profile: DeploymentProfile, selection: &FeatureSelection) -> Result<()> {
    check_support_with(UNSUPPORTED, profile, selection)
}

pub fn check_support_with(
    unsupported: &[(DeploymentProfile, Feature)],
    profile: DeploymentProfile,
    selection: &FeatureSelection,
) -> Result<()> {
    match selection
        .features()
        .find(|feature| unsupported.contains(&(profile, *feature)))
    {
        Some(feature) => Err(Error::UnsupportedProfileCombination { profile, feature }),
        None => Ok(()),
    }
}
