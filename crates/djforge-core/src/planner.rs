//! Directory planning for generated projects
//!
//! [`plan`] maps a project name and deployment profile onto a
//! [`ProjectDescriptor`]. The planner only computes paths; clearing an existing
//! directory is a separate pipeline step.

use crate::error::{Result, UserInputError};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Name of the Django project package created by `startproject`
pub const DJANGO_PROJECT_PACKAGE: &str = "config";

/// Directory the application moves into for container deployments
pub const CONTAINER_BACKEND_DIR: &str = "backend";

pub const FRONTEND_DIR: &str = "frontend";
pub const VENV_DIR: &str = "venv";

/// Target hosting/runtime shape of the generated project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum DeploymentProfile {
    /// Files stay where they were generated
    Standalone,
    /// Backend and frontend as separate container services
    Containerized,
    /// Passenger-style shared hosting
    #[value(name = "shared-hosting", alias = "shared-hosting-platform")]
    SharedHostingPlatform,
}

impl DeploymentProfile {
    pub const ALL: [DeploymentProfile; 3] = [
        DeploymentProfile::Standalone,
        DeploymentProfile::Containerized,
        DeploymentProfile::SharedHostingPlatform,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            DeploymentProfile::Standalone => "Standalone",
            DeploymentProfile::Containerized => "Containerized (Docker Compose)",
            DeploymentProfile::SharedHostingPlatform => "Shared hosting (Passenger)",
        }
    }
}

impl fmt::Display for DeploymentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Immutable path layout of one generated project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    name: String,
    profile: DeploymentProfile,
    root: PathBuf,
    app_root: PathBuf,
    venv_root: PathBuf,
    deploy_root: PathBuf,
    frontend_root: PathBuf,
}

impl ProjectDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> DeploymentProfile {
        self.profile
    }

    /// Top-level project directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the framework project is generated
    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    /// Virtual environment directory
    pub fn venv_root(&self) -> &Path {
        &self.venv_root
    }

    /// Where the application lives once the deployment layout is assembled
    pub fn deploy_root(&self) -> &Path {
        &self.deploy_root
    }

    pub fn frontend_root(&self) -> &Path {
        &self.frontend_root
    }

    pub fn settings_path(&self) -> PathBuf {
        self.app_root.join(DJANGO_PROJECT_PACKAGE).join("settings.py")
    }

    pub fn urls_path(&self) -> PathBuf {
        self.app_root.join(DJANGO_PROJECT_PACKAGE).join("urls.py")
    }

    pub fn env_path(&self) -> PathBuf {
        self.app_root.join(".env")
    }

    pub fn requirements_path(&self) -> PathBuf {
        self.app_root.join("requirements.txt")
    }

    /// Settings file location after assembly
    pub fn deployed_settings_path(&self) -> PathBuf {
        self.deploy_root
            .join(DJANGO_PROJECT_PACKAGE)
            .join("settings.py")
    }

    fn venv_bin(&self) -> PathBuf {
        if cfg!(windows) {
            self.venv_root.join("Scripts")
        } else {
            self.venv_root.join("bin")
        }
    }

    /// Python interpreter inside the virtual environment
    pub fn python(&self) -> PathBuf {
        if cfg!(windows) {
            self.venv_bin().join("python.exe")
        } else {
            self.venv_bin().join("python")
        }
    }

    pub fn pip(&self) -> PathBuf {
        if cfg!(windows) {
            self.venv_bin().join("pip.exe")
        } else {
            self.venv_bin().join("pip")
        }
    }
}

/// Compute the layout for `name` under `base_dir`.
///
/// A name of `.` (or an empty name) targets `base_dir` itself, which is only
/// allowed while that directory is empty.
pub fn plan(base_dir: &Path, name: &str, profile: DeploymentProfile) -> Result<ProjectDescriptor> {
    let trimmed = name.trim();
    let invalid = |reason: &str| UserInputError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let (root, project_name) = if trimmed.is_empty() || trimmed == "." {
        if !is_empty_dir(base_dir) {
            return Err(invalid("the current directory is not empty").into());
        }
        let project_name = base_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("project")
            .to_string();
        (base_dir.to_path_buf(), project_name)
    } else {
        let mut components = Path::new(trimmed).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(invalid("expected a single directory name").into()),
        }
        (base_dir.join(trimmed), trimmed.to_string())
    };

    let deploy_root = match profile {
        DeploymentProfile::Containerized => root.join(CONTAINER_BACKEND_DIR),
        DeploymentProfile::Standalone | DeploymentProfile::SharedHostingPlatform => root.clone(),
    };

    Ok(ProjectDescriptor {
        name: project_name,
        profile,
        app_root: root.clone(),
        venv_root: root.join(VENV_DIR),
        frontend_root: root.join(FRONTEND_DIR),
        deploy_root,
        root,
    })
}

/// Missing directories count as empty
pub(crate) fn is_empty_dir(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => !path.exists(),
    }
}
