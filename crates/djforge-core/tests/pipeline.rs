//! Whole-pipeline tests against a fake toolchain
//!
//! `FakeToolchain` records every invocation and emulates `startproject` by
//! writing the fixture project, so the real settings patches run against real
//! Django output without Python being installed.

use djforge_core::config::{patch, settings, SettingsOptions};
use djforge_core::pipeline::{NoopObserver, PipelineState, StepState};
use djforge_core::runtime::{Invocation, ToolStatus};
use djforge_core::templates::{PackManifest, TemplatePack, HOSTING_SHIM};
use djforge_core::{
    generate, planner, DeploymentProfile, Feature, FeatureSelector, Generated, ProjectRequest,
    Templates, ToolInvoker,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

const SETTINGS: &str = include_str!("fixtures/settings.py");
const URLS: &str = include_str!("fixtures/urls.py");
const SECRET: &str = "integration-secret";

#[derive(Default)]
struct FakeToolchain {
    calls: RefCell<Vec<String>>,
    /// Invocations whose command line contains this fail with exit code 1
    fail_on: Option<&'static str>,
    /// Settings file written by `startproject`
    settings: Option<String>,
}

impl FakeToolchain {
    fn failing_on(needle: &'static str) -> Self {
        Self {
            fail_on: Some(needle),
            ..Default::default()
        }
    }

    fn with_settings(settings: String) -> Self {
        Self {
            settings: Some(settings),
            ..Default::default()
        }
    }

    fn ran(&self, needle: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.contains(needle))
    }

    fn start_project(&self, dir: &Path) -> io::Result<()> {
        let package = dir.join("config");
        std::fs::create_dir_all(&package)?;
        std::fs::write(dir.join("manage.py"), "#!/usr/bin/env python\n")?;
        std::fs::write(package.join("__init__.py"), "")?;
        std::fs::write(
            package.join("settings.py"),
            self.settings.as_deref().unwrap_or(SETTINGS),
        )?;
        std::fs::write(package.join("urls.py"), URLS)?;
        std::fs::write(package.join("wsgi.py"), "application = None\n")?;
        Ok(())
    }
}

impl ToolInvoker for FakeToolchain {
    async fn invoke(&self, invocation: &Invocation) -> io::Result<ToolStatus> {
        let command = invocation.display_command();
        self.calls.borrow_mut().push(command.clone());

        if self.fail_on.is_some_and(|needle| command.contains(needle)) {
            return Ok(ToolStatus::Exited(1));
        }

        let cwd = invocation
            .cwd
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap());
        if command.contains("startproject") {
            self.start_project(&cwd)?;
        } else if command.contains("create-next-app") {
            std::fs::create_dir_all(cwd.join("frontend"))?;
            std::fs::write(cwd.join("frontend/package.json"), "{}")?;
        }
        Ok(ToolStatus::Exited(0))
    }
}

fn request(base: &Path, profile: DeploymentProfile, features: &[Feature]) -> ProjectRequest {
    let extras: &[&str] = &[];
    let selection = FeatureSelector::default().select(features, extras).unwrap();
    let project = planner::plan(base, "shop", profile).unwrap();
    ProjectRequest::new(project, selection).with_secret_key(SECRET)
}

async fn run(request: &ProjectRequest, toolchain: &FakeToolchain) -> Generated {
    generate(request, toolchain, &Templates::bundled(), &mut NoopObserver)
        .await
        .unwrap()
}

fn count_files(root: &Path, name: &str) -> usize {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && e.file_name() == name)
        .count()
}

fn block<'a>(text: &'a str, start: &str) -> &'a str {
    let begin = text.find(start).unwrap();
    let end = begin + text[begin..].find("\n}\n").unwrap() + 3;
    &text[begin..end]
}

#[tokio::test]
async fn test_cors_and_custom_user_standalone() {
    let tmp = TempDir::new().unwrap();
    let request = request(
        tmp.path(),
        DeploymentProfile::Standalone,
        &[Feature::CrossOrigin, Feature::CustomUserModel],
    );
    let toolchain = FakeToolchain::default();

    let generated = run(&request, &toolchain).await;
    assert!(generated.succeeded());
    assert_eq!(generated.exit_code(), 0);
    assert!(generated.artifacts.is_empty());

    let root = tmp.path().join("shop");
    let text = std::fs::read_to_string(root.join("config/settings.py")).unwrap();

    assert_eq!(text.matches("MIDDLEWARE = [").count(), 1);
    let first_middleware = text
        .split("MIDDLEWARE = [\n")
        .nth(1)
        .and_then(|rest| rest.lines().next())
        .unwrap();
    assert_eq!(
        first_middleware,
        "    'corsheaders.middleware.CorsMiddleware',"
    );

    assert_eq!(text.matches("AUTH_USER_MODEL").count(), 1);
    assert!(text.contains("AUTH_USER_MODEL = 'users.User'"));
    assert_eq!(
        block(&text, "DATABASES = {"),
        block(SETTINGS, "DATABASES = {")
    );
    assert!(text.contains("    'users',\n    'corsheaders',\n"));
    assert!(text.contains("SECRET_KEY = config('SECRET_KEY')"));

    // The users app is in place before settings reference it
    assert!(root.join("users/models.py").is_file());
    assert!(root.join("users/migrations/__init__.py").is_file());

    let env = std::fs::read_to_string(root.join(".env")).unwrap();
    assert!(env.contains(&format!("SECRET_KEY={}", SECRET)));
    assert!(!env.contains("DB_NAME"));

    let requirements = std::fs::read_to_string(root.join("requirements.txt")).unwrap();
    assert_eq!(requirements, "django\npython-decouple\ndjango-cors-headers\n");

    // No API router or token auth, so urls.py is untouched
    assert_eq!(std::fs::read_to_string(root.join("config/urls.py")).unwrap(), URLS);
}

#[tokio::test]
async fn test_install_failure_aborts_pipeline() {
    let tmp = TempDir::new().unwrap();
    let request = request(tmp.path(), DeploymentProfile::Standalone, &[Feature::CrossOrigin]);
    let toolchain = FakeToolchain::failing_on("pip install django");

    let generated = run(&request, &toolchain).await;
    let report = &generated.report;

    assert_eq!(report.state, PipelineState::Aborted);
    assert_eq!(generated.exit_code(), 1);
    assert_eq!(
        report.executed(),
        ["create-root", "create-venv", "upgrade-pip", "install-packages"]
    );
    let (step, error) = report.failure.as_ref().unwrap();
    assert_eq!(step, "install-packages");
    assert!(error.to_string().contains("exit code 1"));

    assert_eq!(
        report.outcome("start-project").unwrap().state,
        StepState::Skipped
    );
    assert!(!toolchain.ran("startproject"));
    assert!(!tmp.path().join("shop/.env").exists());
    assert!(generated.artifacts.is_empty());
}

#[tokio::test]
async fn test_non_fatal_pip_upgrade_failure_continues() {
    let tmp = TempDir::new().unwrap();
    let request = request(tmp.path(), DeploymentProfile::Standalone, &[]);
    let toolchain = FakeToolchain::failing_on("--upgrade pip");

    let generated = run(&request, &toolchain).await;
    assert!(generated.succeeded());
    assert_eq!(
        generated.report.outcome("upgrade-pip").unwrap().state,
        StepState::Failed
    );
    assert!(toolchain.ran("startproject"));
}

#[tokio::test]
async fn test_containerized_with_frontend() {
    let tmp = TempDir::new().unwrap();
    let request = request(
        tmp.path(),
        DeploymentProfile::Containerized,
        &[Feature::Frontend, Feature::Postgres],
    );
    let toolchain = FakeToolchain::default();

    let generated = run(&request, &toolchain).await;
    assert!(generated.succeeded());

    let root = tmp.path().join("shop");
    assert_eq!(count_files(&root, "docker-compose.yml"), 1);
    assert_eq!(count_files(&root, "Dockerfile"), 2);
    assert!(root.join("docker-compose.yml").is_file());
    assert!(root.join("backend/Dockerfile").is_file());
    assert!(root.join("frontend/Dockerfile").is_file());

    // The application moved, the launcher and frontend stayed
    assert!(root.join("backend/manage.py").is_file());
    assert!(root.join("backend/config/settings.py").is_file());
    assert!(root.join("backend/.env").is_file());
    assert!(!root.join("manage.py").exists());
    assert!(root.join("dev.sh").is_file());
    assert!(root.join("frontend/package.json").is_file());

    let launcher = std::fs::read_to_string(root.join("dev.sh")).unwrap();
    assert!(launcher.contains("backend/manage.py"));

    let settings = std::fs::read_to_string(root.join("backend/config/settings.py")).unwrap();
    assert!(settings.contains("'ENGINE': 'django.db.backends.postgresql'"));

    // psycopg2 builds from source inside the slim image
    let dockerfile = std::fs::read_to_string(root.join("backend/Dockerfile")).unwrap();
    assert!(dockerfile.contains("apt-get install -y --no-install-recommends gcc libpq-dev"));
    assert!(!dockerfile.contains("{{"));
}

#[tokio::test]
async fn test_containerized_without_frontend() {
    let tmp = TempDir::new().unwrap();
    let request = request(tmp.path(), DeploymentProfile::Containerized, &[]);
    let toolchain = FakeToolchain::default();

    let generated = run(&request, &toolchain).await;
    assert!(generated.succeeded());

    let root = tmp.path().join("shop");
    assert_eq!(count_files(&root, "docker-compose.yml"), 1);
    assert_eq!(count_files(&root, "Dockerfile"), 1);
    assert!(!root.join("frontend").exists());

    let dockerfile = std::fs::read_to_string(root.join("backend/Dockerfile")).unwrap();
    assert!(!dockerfile.contains("libpq-dev"));
    assert!(!dockerfile.contains("{{"));
    assert!(!toolchain.ran("create-next-app"));
}

#[tokio::test]
async fn test_shared_hosting_layout() {
    let tmp = TempDir::new().unwrap();
    let request = request(tmp.path(), DeploymentProfile::SharedHostingPlatform, &[]);
    let toolchain = FakeToolchain::default();

    let generated = run(&request, &toolchain).await;
    assert!(generated.succeeded());

    let root = tmp.path().join("shop");
    let shim = std::fs::read_to_string(root.join("passenger_wsgi.py")).unwrap();
    assert!(shim.contains("from config.wsgi import application"));

    let settings = std::fs::read_to_string(root.join("config/settings.py")).unwrap();
    assert!(settings.contains("STATIC_ROOT = os.path.join(BASE_DIR, 'public_html', 'static')"));
    assert!(settings.contains("MEDIA_ROOT = os.path.join(BASE_DIR, 'public_html', 'media')"));
    assert_eq!(settings.matches("STATIC_ROOT").count(), 1);
}

#[tokio::test]
async fn test_template_pack_overrides_bundled_shim() {
    let tmp = TempDir::new().unwrap();
    let request = request(tmp.path(), DeploymentProfile::SharedHostingPlatform, &[]);
    let toolchain = FakeToolchain::default();

    let files = HashMap::from([(
        HOSTING_SHIM.to_string(),
        b"from {{wsgi_module}} import application as app\n".to_vec(),
    )]);
    let templates = Templates::with_pack(TemplatePack::new(PackManifest::default(), files));

    let generated = generate(&request, &toolchain, &templates, &mut NoopObserver)
        .await
        .unwrap();
    assert!(generated.succeeded());

    let shim = std::fs::read_to_string(tmp.path().join("shop/passenger_wsgi.py")).unwrap();
    assert_eq!(shim, "from config.wsgi import application as app\n");
}

#[tokio::test]
async fn test_patch_failure_leaves_settings_untouched() {
    let tmp = TempDir::new().unwrap();
    let request = request(tmp.path(), DeploymentProfile::Standalone, &[Feature::CrossOrigin]);
    // No MIDDLEWARE anchor for the CORS patch
    let unexpected = SETTINGS.replace("MIDDLEWARE = [", "MIDDLEWARE_CLASSES = [");
    let toolchain = FakeToolchain::with_settings(unexpected.clone());

    let generated = run(&request, &toolchain).await;
    let (step, _) = generated.report.failure.as_ref().unwrap();
    assert_eq!(step, "patch-settings");
    assert_eq!(
        generated.report.outcome("write-requirements").unwrap().state,
        StepState::Skipped
    );

    let on_disk = std::fs::read(tmp.path().join("shop/config/settings.py")).unwrap();
    assert_eq!(on_disk, unexpected.as_bytes());
}

#[tokio::test]
async fn test_patching_generated_settings_again_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    let features = [
        Feature::ApiRouter,
        Feature::AuthToken,
        Feature::CrossOrigin,
        Feature::CustomUserModel,
        Feature::Postgres,
    ];
    let request = request(tmp.path(), DeploymentProfile::Standalone, &features);
    let toolchain = FakeToolchain::default();
    assert!(run(&request, &toolchain).await.succeeded());

    let settings_path = tmp.path().join("shop/config/settings.py");
    let before = std::fs::read_to_string(&settings_path).unwrap();
    let changed = patch::apply_to_file(
        &settings_path,
        &settings::settings_patches(request.selection(), &SettingsOptions::default()),
    )
    .unwrap();
    assert!(!changed);
    assert_eq!(std::fs::read_to_string(&settings_path).unwrap(), before);

    let urls = std::fs::read_to_string(tmp.path().join("shop/config/urls.py")).unwrap();
    assert_eq!(urls.matches("api = NinjaAPI()").count(), 1);
}

#[tokio::test]
async fn test_rerun_with_overwrite_is_reproducible() {
    let tmp = TempDir::new().unwrap();
    let features = [Feature::CrossOrigin, Feature::CustomUserModel];
    let first = request(tmp.path(), DeploymentProfile::Standalone, &features);
    assert!(run(&first, &FakeToolchain::default()).await.succeeded());

    let settings_path = tmp.path().join("shop/config/settings.py");
    let before = std::fs::read_to_string(&settings_path).unwrap();
    std::fs::write(tmp.path().join("shop/stray.txt"), "left over").unwrap();

    let second = request(tmp.path(), DeploymentProfile::Standalone, &features).with_overwrite(true);
    let generated = run(&second, &FakeToolchain::default()).await;
    assert!(generated.succeeded());
    assert_eq!(generated.report.executed()[0], "clear-target");

    assert_eq!(std::fs::read_to_string(&settings_path).unwrap(), before);
    assert!(!tmp.path().join("shop/stray.txt").exists());
}

#[tokio::test]
async fn test_non_empty_target_without_overwrite_fails_before_running() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("shop")).unwrap();
    std::fs::write(tmp.path().join("shop/keep.txt"), "mine").unwrap();

    let request = request(tmp.path(), DeploymentProfile::Standalone, &[]);
    let toolchain = FakeToolchain::default();
    let err = generate(&request, &toolchain, &Templates::bundled(), &mut NoopObserver)
        .await
        .unwrap_err();

    assert!(matches!(err, djforge_core::Error::FilesystemPrecondition { .. }));
    assert!(toolchain.calls.borrow().is_empty());
    assert!(tmp.path().join("shop/keep.txt").exists());
}
