//! Passenger-style shared hosting layout

use super::Assembler;
use crate::config::{patch, settings};
use crate::error::Result;
use crate::pipeline::{self, ProjectRequest};
use crate::planner::{DeploymentProfile, DJANGO_PROJECT_PACKAGE};
use crate::templates::{render, TemplateProvider, HOSTING_SHIM};
use std::path::PathBuf;

/// Directory the hosting panel serves static files from
pub const PUBLIC_DIR: &str = "public_html";

pub const SHIM_FILE: &str = "passenger_wsgi.py";

/// Assembler for [`DeploymentProfile::SharedHostingPlatform`]
#[derive(Debug, Default)]
pub struct HostingAssembler;

impl Assembler for HostingAssembler {
    fn profile(&self) -> DeploymentProfile {
        DeploymentProfile::SharedHostingPlatform
    }

    fn assemble(
        &self,
        request: &ProjectRequest,
        templates: &dyn TemplateProvider,
    ) -> Result<Vec<PathBuf>> {
        let project = request.project();

        let settings_path = project.deployed_settings_path();
        patch::apply_to_file(&settings_path, &settings::public_root_patches(PUBLIC_DIR))?;

        let wsgi_module = format!("{}.wsgi", DJANGO_PROJECT_PACKAGE);
        let shim = render(
            &templates.get_text(HOSTING_SHIM)?,
            &[("wsgi_module", wsgi_module.as_str())],
        );
        let shim_path = project.deploy_root().join(SHIM_FILE);
        pipeline::write_file(&shim_path, shim.as_bytes(), false)?;

        tracing::info!(root = %project.deploy_root().display(), "shared hosting layout assembled");
        Ok(vec![settings_path, shim_path])
    }
}
