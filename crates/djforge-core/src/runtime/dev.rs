//! Development server launcher
//!
//! Starts `manage.py runserver` and, when the project has a frontend, the
//! frontend dev script side by side. Both inherit the terminal and the launcher
//! returns once every server has exited.

use super::invoker::{Invocation, ToolStatus};
use crate::error::{Error, Result};
use crate::planner::{CONTAINER_BACKEND_DIR, FRONTEND_DIR, VENV_DIR};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command as TokioCommand;
use tokio::task::JoinSet;

/// JavaScript package managers, keyed by the lockfile they leave behind
const JS_RUNNERS: &[(&str, &str)] = &[
    ("bun.lockb", "bun"),
    ("bun.lock", "bun"),
    ("pnpm-lock.yaml", "pnpm"),
    ("yarn.lock", "yarn"),
];

/// Where the pieces of a generated project live on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevLayout {
    pub backend_dir: PathBuf,
    pub python: PathBuf,
    pub frontend_dir: Option<PathBuf>,
}

impl DevLayout {
    /// Layout for explicitly chosen directories.
    ///
    /// The interpreter comes from a `venv` next to or above the backend,
    /// falling back to the system python.
    pub fn from_dirs(backend_dir: impl Into<PathBuf>, frontend_dir: Option<PathBuf>) -> Self {
        let backend_dir = backend_dir.into();
        let python = find_python(
            [Some(backend_dir.as_path()), backend_dir.parent()]
                .into_iter()
                .flatten(),
        );
        Self {
            backend_dir,
            python,
            frontend_dir,
        }
    }
}

fn venv_python(root: &Path) -> PathBuf {
    if cfg!(windows) {
        root.join(VENV_DIR).join("Scripts").join("python.exe")
    } else {
        root.join(VENV_DIR).join("bin").join("python")
    }
}

fn find_python<'a>(candidates: impl IntoIterator<Item = &'a Path>) -> PathBuf {
    let mut searched = None;
    for dir in candidates {
        let python = venv_python(dir);
        if python.is_file() {
            return python;
        }
        searched.get_or_insert(python);
    }
    if let Some(python) = searched {
        tracing::warn!("no virtual environment at {}, using system python", python.display());
    }
    PathBuf::from(super::check::Runtime::Python.program())
}

/// Locate the backend, interpreter and frontend of the project at `root`
pub fn detect(root: &Path) -> Result<DevLayout> {
    let backend_dir = [root.join(CONTAINER_BACKEND_DIR), root.to_path_buf()]
        .into_iter()
        .find(|dir| dir.join("manage.py").is_file())
        .ok_or_else(|| Error::FilesystemPrecondition {
            path: root.to_path_buf(),
            reason: "no manage.py found; is this a generated project?".into(),
        })?;

    let python = find_python([root]);

    let frontend_dir = Some(root.join(FRONTEND_DIR)).filter(|dir| dir.join("package.json").is_file());

    Ok(DevLayout {
        backend_dir,
        python,
        frontend_dir,
    })
}

/// Package manager for the frontend at `dir`, `npm` unless a lockfile says otherwise
pub fn detect_js_runner(dir: &Path) -> &'static str {
    JS_RUNNERS
        .iter()
        .find(|(lockfile, _)| dir.join(lockfile).exists())
        .map(|(_, runner)| *runner)
        .unwrap_or("npm")
}

/// Commands the launcher starts, backend first
pub fn dev_invocations(layout: &DevLayout) -> Vec<Invocation> {
    let mut invocations = vec![Invocation::new(&layout.python)
        .args(["manage.py", "runserver"])
        .current_dir(&layout.backend_dir)];
    if let Some(frontend) = &layout.frontend_dir {
        invocations.push(
            Invocation::new(detect_js_runner(frontend))
                .args(["run", "dev"])
                .current_dir(frontend),
        );
    }
    invocations
}

/// Run the dev servers of the project at `root` until they all exit
pub async fn run_dev_servers(root: &Path) -> Result<()> {
    serve(&detect(root)?).await
}

/// Start every server in `layout` and wait for all of them
pub async fn serve(layout: &DevLayout) -> Result<()> {
    if !layout.backend_dir.join("manage.py").is_file() {
        return Err(Error::FilesystemPrecondition {
            path: layout.backend_dir.clone(),
            reason: "no manage.py found".into(),
        });
    }
    let mut servers = JoinSet::new();

    for invocation in dev_invocations(layout) {
        let command = invocation.display_command();
        tracing::info!(%command, "starting dev server");

        let mut cmd = TokioCommand::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }
        let mut child = cmd.spawn().map_err(|source| Error::ToolSpawn {
            command: command.clone(),
            source,
        })?;

        servers.spawn(async move { (command, child.wait().await) });
    }

    let mut first_error = None;
    while let Some(joined) = servers.join_next().await {
        let Ok((command, waited)) = joined else {
            continue;
        };
        let status = match waited {
            Ok(status) => ToolStatus::from(status),
            Err(e) => return Err(Error::io(format!("waiting for `{}`", command), e)),
        };
        tracing::info!(%command, %status, "dev server exited");
        if !status.success() && first_error.is_none() {
            first_error = Some(Error::ExternalTool { command, status });
        }
    }

    first_error.map_or(Ok(()), Err)
}
