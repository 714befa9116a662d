//! Runtime detection for Python, Node.js and Docker

use crate::error::{Error, Result};
use crate::features::{Feature, FeatureSelection};
use crate::planner::DeploymentProfile;
use std::fmt;
use std::process::Command;

/// External runtimes a generated project may need
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Runtime {
    Python,
    Node,
    Docker,
}

impl Runtime {
    pub fn display_name(&self) -> &'static str {
        match self {
            Runtime::Python => "Python 3",
            Runtime::Node => "Node.js",
            Runtime::Docker => "Docker",
        }
    }

    /// Executable probed with `--version`
    pub fn program(&self) -> &'static str {
        match self {
            Runtime::Python if cfg!(windows) => "python",
            Runtime::Python => "python3",
            Runtime::Node => "node",
            Runtime::Docker => "docker",
        }
    }

    fn install_hint(&self) -> &'static str {
        match self {
            Runtime::Python => "install from https://python.org",
            Runtime::Node => "install from https://nodejs.org",
            Runtime::Docker => "install from https://docs.docker.com/get-docker/",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Runtime detection result
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub name: &'static str,
    pub version: Option<String>,
    pub available: bool,
}

/// Run `program --version` and report what came back
pub fn probe(runtime: Runtime) -> RuntimeInfo {
    let output = Command::new(runtime.program()).arg("--version").output();

    match output {
        Ok(out) if out.status.success() => {
            // Python 2 and some docker builds print the version on stderr
            let raw = if out.stdout.is_empty() {
                out.stderr
            } else {
                out.stdout
            };
            RuntimeInfo {
                name: runtime.display_name(),
                version: Some(String::from_utf8_lossy(&raw).trim().to_string()),
                available: true,
            }
        }
        _ => RuntimeInfo {
            name: runtime.display_name(),
            version: None,
            available: false,
        },
    }
}

/// Required and advisory runtimes for one project
pub fn runtimes_for(
    selection: &FeatureSelection,
    profile: DeploymentProfile,
) -> (Vec<Runtime>, Vec<Runtime>) {
    let mut required = vec![Runtime::Python];
    if selection.has(Feature::Frontend) {
        required.push(Runtime::Node);
    }
    let advisory = match profile {
        DeploymentProfile::Containerized => vec![Runtime::Docker],
        _ => Vec::new(),
    };
    (required, advisory)
}

/// Check runtimes; entries in `advisory` are reported but never fail the check
pub fn check_runtimes_with_advisory(
    required: &[Runtime],
    advisory: &[Runtime],
) -> Result<Vec<RuntimeInfo>> {
    check_with(required, advisory, probe)
}

fn check_with(
    required: &[Runtime],
    advisory: &[Runtime],
    probe: impl Fn(Runtime) -> RuntimeInfo,
) -> Result<Vec<RuntimeInfo>> {
    let mut results = Vec::new();
    let mut missing = Vec::new();

    for &runtime in required {
        let info = probe(runtime);
        if !info.available {
            missing.push(format!("{} ({})", runtime, runtime.install_hint()));
        }
        results.push(info);
    }
    for runtime in advisory.iter().filter(|r| !required.contains(r)) {
        let info = probe(*runtime);
        if !info.available {
            tracing::warn!("{} not found; {}", runtime, runtime.install_hint());
        }
        results.push(info);
    }

    if !missing.is_empty() {
        return Err(Error::MissingRuntimes(
            missing
                .iter()
                .map(|m| format!("  - {}", m))
                .collect::<Vec<_>>()
                .join("\n"),
        ));
    }

    Ok(results)
}
