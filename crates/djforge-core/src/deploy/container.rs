//! Docker Compose layout
//!
//! The Django project moves under `backend/`, each service gets a Dockerfile
//! and a single `docker-compose.yml` at the root ties them together.

use super::Assembler;
use crate::error::{Error, Result};
use crate::features::{Feature, FeatureSelection};
use crate::pipeline::{self, ProjectRequest};
use crate::planner::{DeploymentProfile, ProjectDescriptor, CONTAINER_BACKEND_DIR, FRONTEND_DIR, VENV_DIR};
use crate::templates::{
    self, TemplateProvider, BACKEND_CONTAINER, BACKEND_CONTAINER_IGNORE, FRONTEND_CONTAINER,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const COMPOSE_FILE: &str = "docker-compose.yml";

/// Root entries that stay where they are
const KEEP_AT_ROOT: &[&str] = &[VENV_DIR, FRONTEND_DIR, CONTAINER_BACKEND_DIR, "dev.sh"];

const DB_SERVICE: &str = "db";
const DB_VOLUME: &str = "pgdata";
/// Credentials shared by the database service and the backend
const DB_CREDENTIALS: &[(&str, &str, &str)] = &[
    ("POSTGRES_DB", "DB_NAME", "app"),
    ("POSTGRES_USER", "DB_USER", "app"),
    ("POSTGRES_PASSWORD", "DB_PASSWORD", "app"),
];

#[derive(Debug, Default, Serialize)]
struct ComposeFile {
    services: BTreeMap<String, Service>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    volumes: BTreeMap<String, Volume>,
}

#[derive(Debug, Default, Serialize)]
struct Service {
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env_file: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
struct Volume {}

fn compose_file(selection: &FeatureSelection) -> ComposeFile {
    let mut compose = ComposeFile::default();
    let postgres = selection.has(Feature::Postgres);

    let mut backend = Service {
        build: Some(format!("./{}", CONTAINER_BACKEND_DIR)),
        ports: vec!["8000:8000".into()],
        env_file: vec![format!("./{}/.env", CONTAINER_BACKEND_DIR)],
        ..Default::default()
    };

    if postgres {
        let mut db = Service {
            image: Some("postgres:16".into()),
            volumes: vec![format!("{}:/var/lib/postgresql/data", DB_VOLUME)],
            ..Default::default()
        };
        for (postgres_var, django_var, value) in DB_CREDENTIALS {
            db.environment.insert(postgres_var.to_string(), value.to_string());
            backend.environment.insert(django_var.to_string(), value.to_string());
        }
        backend.environment.insert("DB_HOST".into(), DB_SERVICE.into());
        backend.depends_on.push(DB_SERVICE.into());
        compose.services.insert(DB_SERVICE.into(), db);
        compose.volumes.insert(DB_VOLUME.into(), Volume {});
    }

    compose.services.insert("backend".into(), backend);

    if selection.has(Feature::Frontend) {
        compose.services.insert(
            "frontend".into(),
            Service {
                build: Some(format!("./{}", FRONTEND_DIR)),
                ports: vec!["3000:3000".into()],
                depends_on: vec!["backend".into()],
                ..Default::default()
            },
        );
    }

    compose
}

/// Build dependencies of psycopg2, which has no wheel for the slim image
const POSTGRES_BUILD_PACKAGES: &str = "\
RUN apt-get update \\
    && apt-get install -y --no-install-recommends gcc libpq-dev \\
    && rm -rf /var/lib/apt/lists/*
";

/// Fill the backend Dockerfile's `{{system_packages}}` placeholder
pub fn render_backend_dockerfile(template: &str, selection: &FeatureSelection) -> String {
    let system_packages = if selection.has(Feature::Postgres) {
        format!("\n{}", POSTGRES_BUILD_PACKAGES)
    } else {
        String::new()
    };
    templates::render(template, &[("system_packages", system_packages.as_str())])
}

/// Render the compose file for `selection`
pub fn render_compose(selection: &FeatureSelection) -> Result<String> {
    serde_yaml::to_string(&compose_file(selection))
        .map_err(|e| Error::io(format!("serializing {}", COMPOSE_FILE), std::io::Error::other(e)))
}

/// Move the application out of the project root into `backend/`
fn move_application(project: &ProjectDescriptor) -> Result<()> {
    let root = project.root();
    let backend = project.deploy_root();
    std::fs::create_dir_all(backend)
        .map_err(|e| Error::io(format!("creating {}", backend.display()), e))?;

    let entries = std::fs::read_dir(root)
        .map_err(|e| Error::io(format!("reading {}", root.display()), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(format!("reading {}", root.display()), e))?;
        let name = entry.file_name();
        if name.to_str().is_some_and(|n| KEEP_AT_ROOT.contains(&n)) {
            continue;
        }
        let target = backend.join(&name);
        tracing::debug!(from = %entry.path().display(), to = %target.display(), "moving");
        std::fs::rename(entry.path(), &target).map_err(|e| Error::FilesystemPrecondition {
            path: entry.path(),
            reason: format!("cannot move into {}: {}", backend.display(), e),
        })?;
    }
    Ok(())
}

fn install(
    templates: &dyn TemplateProvider,
    key: &str,
    dest: &Path,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    let content = templates.get(key)?;
    pipeline::write_file(dest, &content, false)?;
    written.push(dest.to_path_buf());
    Ok(())
}

/// Assembler for [`DeploymentProfile::Containerized`]
#[derive(Debug, Default)]
pub struct ContainerAssembler;

impl Assembler for ContainerAssembler {
    fn profile(&self) -> DeploymentProfile {
        DeploymentProfile::Containerized
    }

    fn assemble(
        &self,
        request: &ProjectRequest,
        templates: &dyn TemplateProvider,
    ) -> Result<Vec<PathBuf>> {
        let project = request.project();
        let selection = request.selection();
        let backend = project.deploy_root();
        let mut written = Vec::new();

        move_application(project)?;

        let dockerfile = backend.join("Dockerfile");
        let content = render_backend_dockerfile(&templates.get_text(BACKEND_CONTAINER)?, selection);
        pipeline::write_file(&dockerfile, content.as_bytes(), false)?;
        written.push(dockerfile);
        install(
            templates,
            BACKEND_CONTAINER_IGNORE,
            &backend.join(".dockerignore"),
            &mut written,
        )?;

        if selection.has(Feature::Frontend) {
            install(
                templates,
                FRONTEND_CONTAINER,
                &project.frontend_root().join("Dockerfile"),
                &mut written,
            )?;
        }

        let compose_path = project.root().join(COMPOSE_FILE);
        pipeline::write_file(&compose_path, render_compose(selection)?.as_bytes(), false)?;
        written.push(compose_path);

        tracing::info!(root = %project.root().display(), files = written.len(), "container layout assembled");
        Ok(written)
    }
}
