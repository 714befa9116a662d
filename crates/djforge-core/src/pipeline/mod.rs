//! Sequential, fail-fast step execution
//!
//! A [`Plan`] is an ordered list of [`Step`]s. The [`Executor`] runs them one at
//! a time; the first failing fatal step aborts the run and every step after it
//! is reported as [`StepState::Skipped`]. Non-fatal failures are logged and the
//! run continues.

pub mod plan;

use crate::config::{self, env, PatchSet};
use crate::error::{Error, Result};
use crate::runtime::invoker::{Invocation, ToolInvoker};
use crate::templates::{self, TemplateProvider};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub use plan::{build_plan, ProjectRequest};

/// What a step does
#[derive(Debug, Clone)]
pub enum StepAction {
    /// Remove everything inside a directory, keeping the directory
    ClearDirectory(PathBuf),
    CreateDirectory(PathBuf),
    Invoke(Invocation),
    /// Write the template `key`, or every template under it when it ends in
    /// `/`, to `dest`
    InstallTemplate {
        key: String,
        dest: PathBuf,
        vars: Vec<(String, String)>,
        executable: bool,
    },
    WriteFile {
        path: PathBuf,
        contents: String,
    },
    SetEnv {
        path: PathBuf,
        entries: Vec<(String, String)>,
    },
    Patch {
        target: PathBuf,
        patches: PatchSet,
    },
}

/// One unit of work in a [`Plan`]
#[derive(Debug, Clone)]
pub struct Step {
    pub id: String,
    pub action: StepAction,
    /// A failing fatal step aborts the pipeline
    pub fatal: bool,
}

impl Step {
    pub fn new(id: &str, action: StepAction) -> Self {
        Self {
            id: id.to_string(),
            action,
            fatal: true,
        }
    }

    pub fn non_fatal(mut self) -> Self {
        self.fatal = false;
        self
    }

    /// Short human-readable description for progress output
    pub fn describe(&self) -> String {
        match &self.action {
            StepAction::ClearDirectory(path) => format!("Clearing {}", path.display()),
            StepAction::CreateDirectory(path) => format!("Creating {}", path.display()),
            StepAction::Invoke(invocation) => format!("Running {}", invocation),
            StepAction::InstallTemplate { dest, .. } => format!("Writing {}", dest.display()),
            StepAction::WriteFile { path, .. } => format!("Writing {}", path.display()),
            StepAction::SetEnv { path, .. } => format!("Updating {}", path.display()),
            StepAction::Patch { target, patches } => {
                format!("Patching {} ({} edits)", target.display(), patches.len())
            }
        }
    }
}

/// Ordered steps
#[derive(Debug, Clone, Default)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepState::Pending => "pending",
            StepState::Running => "running",
            StepState::Succeeded => "succeeded",
            StepState::Failed => "failed",
            StepState::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// Final record of one step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub id: String,
    pub fatal: bool,
    pub state: StepState,
    pub error: Option<String>,
    pub elapsed: Duration,
}

/// Result of a pipeline run
#[derive(Debug)]
pub struct PipelineReport {
    pub state: PipelineState,
    pub outcomes: Vec<StepOutcome>,
    /// The step that aborted the run and why
    pub failure: Option<(String, Error)>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Completed
    }

    pub fn exit_code(&self) -> i32 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }

    pub fn outcome(&self, id: &str) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }

    /// Ids of steps that actually ran, in order
    pub fn executed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, StepState::Succeeded | StepState::Failed))
            .map(|o| o.id.as_str())
            .collect()
    }

    /// Turn an aborted run into its error
    pub fn into_result(self) -> Result<Vec<StepOutcome>> {
        match self.failure {
            Some((_, error)) => Err(error),
            None => Ok(self.outcomes),
        }
    }
}

/// Progress hook, called around every step
pub trait StepObserver {
    fn step_started(&mut self, _step: &Step, _index: usize, _total: usize) {}
    fn step_finished(&mut self, _step: &Step, _outcome: &StepOutcome) {}
}

/// Observer that ignores everything
#[derive(Debug, Default)]
pub struct NoopObserver;

impl StepObserver for NoopObserver {}

/// Runs a [`Plan`]
pub struct Executor<'a, I: ToolInvoker> {
    invoker: &'a I,
    templates: &'a dyn TemplateProvider,
    state: PipelineState,
}

impl<'a, I: ToolInvoker> Executor<'a, I> {
    pub fn new(invoker: &'a I, templates: &'a dyn TemplateProvider) -> Self {
        Self {
            invoker,
            templates,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub async fn run(&mut self, plan: &Plan, observer: &mut dyn StepObserver) -> PipelineReport {
        self.state = PipelineState::Running;
        let total = plan.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut failure = None;

        for (index, step) in plan.steps().iter().enumerate() {
            if failure.is_some() {
                tracing::debug!(step = %step.id, "step skipped");
                outcomes.push(StepOutcome {
                    id: step.id.clone(),
                    fatal: step.fatal,
                    state: StepState::Skipped,
                    error: None,
                    elapsed: Duration::ZERO,
                });
                continue;
            }

            observer.step_started(step, index, total);
            tracing::info!(step = %step.id, state = %StepState::Running, "{}", step.describe());
            let started = Instant::now();
            let result = self.execute(&step.action).await;
            let elapsed = started.elapsed();

            let outcome = match result {
                Ok(()) => {
                    tracing::info!(step = %step.id, state = %StepState::Succeeded, elapsed_ms = elapsed.as_millis() as u64, "step finished");
                    StepOutcome {
                        id: step.id.clone(),
                        fatal: step.fatal,
                        state: StepState::Succeeded,
                        error: None,
                        elapsed,
                    }
                }
                Err(error) => {
                    let message = error.to_string();
                    let outcome = StepOutcome {
                        id: step.id.clone(),
                        fatal: step.fatal,
                        state: StepState::Failed,
                        error: Some(message.clone()),
                        elapsed,
                    };
                    if step.fatal {
                        tracing::error!(step = %step.id, state = %StepState::Failed, error = %message, "step failed, aborting");
                        failure = Some((step.id.clone(), error));
                    } else {
                        tracing::warn!(step = %step.id, state = %StepState::Failed, error = %message, "non-fatal step failed, continuing");
                    }
                    outcome
                }
            };
            observer.step_finished(step, &outcome);
            outcomes.push(outcome);
        }

        self.state = if failure.is_some() {
            PipelineState::Aborted
        } else {
            PipelineState::Completed
        };

        PipelineReport {
            state: self.state,
            outcomes,
            failure,
        }
    }

    async fn execute(&self, action: &StepAction) -> Result<()> {
        match action {
            StepAction::ClearDirectory(path) => clear_directory(path),
            StepAction::CreateDirectory(path) => std::fs::create_dir_all(path)
                .map_err(|e| Error::io(format!("creating {}", path.display()), e)),
            StepAction::Invoke(invocation) => {
                let command = invocation.display_command();
                let status = self
                    .invoker
                    .invoke(invocation)
                    .await
                    .map_err(|source| Error::ToolSpawn {
                        command: command.clone(),
                        source,
                    })?;
                if status.success() {
                    Ok(())
                } else {
                    Err(Error::ExternalTool { command, status })
                }
            }
            StepAction::InstallTemplate {
                key,
                dest,
                vars,
                executable,
            } => self.install_template(key, dest, vars, *executable),
            StepAction::WriteFile { path, contents } => write_file(path, contents.as_bytes(), false),
            StepAction::SetEnv { path, entries } => env::set_entries(path, entries)
                .map_err(|e| Error::io(format!("writing {}", path.display()), e)),
            StepAction::Patch { target, patches } => {
                let changed = config::patch::apply_to_file(target, patches)?;
                tracing::debug!(target = %target.display(), changed, "patch set applied");
                Ok(())
            }
        }
    }

    fn install_template(
        &self,
        key: &str,
        dest: &Path,
        vars: &[(String, String)],
        executable: bool,
    ) -> Result<()> {
        let vars: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let render = |raw: std::borrow::Cow<'_, [u8]>| -> Vec<u8> {
            if vars.is_empty() {
                raw.into_owned()
            } else {
                templates::render(&String::from_utf8_lossy(&raw), &vars).into_bytes()
            }
        };

        if key.ends_with('/') {
            let keys = self.templates.list(key);
            if keys.is_empty() {
                return Err(Error::TemplateNotFound(key.to_string()));
            }
            for entry in keys {
                let relative = &entry[key.len()..];
                let raw = self.templates.get(&entry)?;
                write_file(&dest.join(relative), &render(raw), executable)?;
            }
            Ok(())
        } else {
            let raw = self.templates.get(key)?;
            write_file(dest, &render(raw), executable)
        }
    }
}

fn clear_directory(path: &Path) -> Result<()> {
    let precondition = |reason: String| Error::FilesystemPrecondition {
        path: path.to_path_buf(),
        reason,
    };
    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(precondition(format!("cannot be read: {}", e))),
    };
    for entry in entries {
        let entry = entry.map_err(|e| precondition(e.to_string()))?;
        let child = entry.path();
        let removed = if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            std::fs::remove_dir_all(&child)
        } else {
            std::fs::remove_file(&child)
        };
        removed.map_err(|e| precondition(format!("cannot remove {}: {}", child.display(), e)))?;
    }
    Ok(())
}

pub(crate) fn write_file(path: &Path, contents: &[u8], executable: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::io(format!("creating {}", parent.display()), e))?;
    }
    std::fs::write(path, contents).map_err(|e| Error::io(format!("writing {}", path.display()), e))?;

    #[cfg(unix)]
    if executable {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| Error::io(format!("chmod {}", path.display()), e))?;
    }
    #[cfg(not(unix))]
    let _ = executable;

    Ok(())
}
