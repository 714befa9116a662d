//! The standard project plan

use super::{Plan, Step, StepAction};
use crate::config::{routes, settings, SettingsOptions};
use crate::error::{Error, Result};
use crate::features::{Feature, FeatureSelection};
use crate::planner::{self, ProjectDescriptor, DJANGO_PROJECT_PACKAGE, FRONTEND_DIR};
use crate::runtime::check::Runtime;
use crate::runtime::invoker::Invocation;
use crate::templates;
use std::path::{Path, PathBuf};

/// Everything needed to generate one project, fixed before the pipeline runs
#[derive(Debug, Clone)]
pub struct ProjectRequest {
    project: ProjectDescriptor,
    selection: FeatureSelection,
    settings: SettingsOptions,
    overwrite: bool,
    secret_key: String,
    system_python: PathBuf,
}

impl ProjectRequest {
    pub fn new(project: ProjectDescriptor, selection: FeatureSelection) -> Self {
        Self {
            project,
            selection,
            settings: SettingsOptions::default(),
            overwrite: false,
            secret_key: generate_secret_key(),
            system_python: PathBuf::from(Runtime::Python.program()),
        }
    }

    pub fn with_settings(mut self, settings: SettingsOptions) -> Self {
        self.settings = settings;
        self
    }

    /// Allow clearing a non-empty target directory
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = secret_key.into();
        self
    }

    /// Interpreter used to create the virtual environment
    pub fn with_system_python(mut self, python: impl Into<PathBuf>) -> Self {
        self.system_python = python.into();
        self
    }

    pub fn project(&self) -> &ProjectDescriptor {
        &self.project
    }

    pub fn selection(&self) -> &FeatureSelection {
        &self.selection
    }

    pub fn settings(&self) -> &SettingsOptions {
        &self.settings
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

/// 64 hex characters from two random UUIDs
pub fn generate_secret_key() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

fn npx() -> &'static str {
    if cfg!(windows) {
        "npx.cmd"
    } else {
        "npx"
    }
}

/// Shell snippet the dev launcher uses to start the frontend
fn frontend_command() -> String {
    format!("(cd {} && npm run dev) &", FRONTEND_DIR)
}

/// `path` relative to the project root, with forward slashes
fn relative_to_root(project: &ProjectDescriptor, path: &Path) -> String {
    let rel = path.strip_prefix(project.root()).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

/// Template variables for the dev launcher, relative to the project root
fn dev_launcher_vars(project: &ProjectDescriptor) -> Vec<(String, String)> {
    let manage_py = relative_to_root(project, &project.deploy_root().join("manage.py"));
    vec![
        ("name".into(), project.name().to_string()),
        ("python".into(), relative_to_root(project, &project.python())),
        ("manage_py".into(), manage_py),
        ("frontend_command".into(), frontend_command()),
    ]
}

/// Derive the ordered step list for `request`.
///
/// Fails with [`Error::FilesystemPrecondition`] when the target directory has
/// content and overwriting was not requested.
pub fn build_plan(request: &ProjectRequest) -> Result<Plan> {
    let project = request.project();
    let selection = request.selection();
    let root = project.root();
    let app_root = project.app_root();
    let mut steps = Vec::new();

    if !planner::is_empty_dir(root) {
        if !request.overwrite() {
            return Err(Error::FilesystemPrecondition {
                path: root.to_path_buf(),
                reason: "directory is not empty; pass --overwrite to replace its contents".into(),
            });
        }
        steps.push(Step::new(
            "clear-target",
            StepAction::ClearDirectory(root.to_path_buf()),
        ));
    }

    steps.push(Step::new(
        "create-root",
        StepAction::CreateDirectory(root.to_path_buf()),
    ));

    steps.push(Step::new(
        "create-venv",
        StepAction::Invoke(
            Invocation::new(&request.system_python)
                .args(["-m", "venv"])
                .arg(project.venv_root())
                .current_dir(root),
        ),
    ));

    let python = project.python();
    steps.push(
        Step::new(
            "upgrade-pip",
            StepAction::Invoke(
                Invocation::new(&python)
                    .args(["-m", "pip", "install", "--upgrade", "pip"])
                    .current_dir(root),
            ),
        )
        .non_fatal(),
    );

    steps.push(Step::new(
        "install-packages",
        StepAction::Invoke(
            Invocation::new(&python)
                .args(["-m", "pip", "install"])
                .args(selection.packages().iter().cloned())
                .current_dir(root),
        ),
    ));

    steps.push(Step::new(
        "start-project",
        StepAction::Invoke(
            Invocation::new(&python)
                .args(["-m", "django", "startproject", DJANGO_PROJECT_PACKAGE, "."])
                .current_dir(app_root),
        ),
    ));

    if selection.has(Feature::CustomUserModel) {
        steps.push(Step::new(
            "install-users-app",
            StepAction::InstallTemplate {
                key: templates::CUSTOM_USER_MODULE.to_string(),
                dest: app_root.join("users"),
                vars: Vec::new(),
                executable: false,
            },
        ));
    }

    steps.push(Step::new(
        "write-env",
        StepAction::SetEnv {
            path: project.env_path(),
            entries: settings::env_entries(selection, request.secret_key()),
        },
    ));

    steps.push(Step::new(
        "patch-settings",
        StepAction::Patch {
            target: project.settings_path(),
            patches: settings::settings_patches(selection, request.settings()),
        },
    ));

    let route_patches = routes::routes_patches(selection);
    if !route_patches.is_empty() {
        steps.push(Step::new(
            "patch-urls",
            StepAction::Patch {
                target: project.urls_path(),
                patches: route_patches,
            },
        ));
    }

    let mut requirements = selection.packages().join("\n");
    requirements.push('\n');
    steps.push(Step::new(
        "write-requirements",
        StepAction::WriteFile {
            path: project.requirements_path(),
            contents: requirements,
        },
    ));

    if selection.has(Feature::Frontend) {
        steps.push(Step::new(
            "scaffold-frontend",
            StepAction::Invoke(
                Invocation::new(npx())
                    .args(["--yes", "create-next-app@latest", FRONTEND_DIR, "--yes", "--use-npm"])
                    .current_dir(root),
            ),
        ));
        steps.push(Step::new(
            "write-dev-launcher",
            StepAction::InstallTemplate {
                key: templates::DEV_LAUNCHER.to_string(),
                dest: root.join("dev.sh"),
                vars: dev_launcher_vars(project),
                executable: true,
            },
        ));
    }

    tracing::debug!(steps = steps.len(), root = %root.display(), "plan built");
    Ok(Plan::new(steps))
}
