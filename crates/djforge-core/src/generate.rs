//! End-to-end project generation without prompts

use crate::deploy;
use crate::error::Result;
use crate::pipeline::{build_plan, Executor, PipelineReport, ProjectRequest, StepObserver};
use crate::runtime::invoker::ToolInvoker;
use crate::templates::TemplateProvider;
use std::path::PathBuf;

/// What a generation run produced
#[derive(Debug)]
pub struct Generated {
    pub report: PipelineReport,
    /// Files written by the deployment assembler; empty when the pipeline aborted
    pub artifacts: Vec<PathBuf>,
}

impl Generated {
    pub fn succeeded(&self) -> bool {
        self.report.succeeded()
    }

    pub fn exit_code(&self) -> i32 {
        self.report.exit_code()
    }
}

/// Check support, run the standard plan, then assemble the deployment layout.
///
/// Errors raised before the pipeline starts (unsupported combination, target
/// directory precondition) and assembly errors are returned as `Err`. A
/// pipeline abort is reported through [`Generated::report`].
pub async fn generate<I: ToolInvoker>(
    request: &ProjectRequest,
    invoker: &I,
    templates: &dyn TemplateProvider,
    observer: &mut dyn StepObserver,
) -> Result<Generated> {
    let profile = request.project().profile();
    deploy::check_support(profile, request.selection())?;

    let plan = build_plan(request)?;
    let report = Executor::new(invoker, templates).run(&plan, observer).await;
    if !report.succeeded() {
        return Ok(Generated {
            report,
            artifacts: Vec::new(),
        });
    }

    let artifacts = deploy::assembler_for(profile).assemble(request, templates)?;
    tracing::info!(%profile, artifacts = artifacts.len(), "project generated");
    Ok(Generated { report, artifacts })
}
