//! djforge CLI - Django project generation

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use djforge_core::runtime::dev::{self, DevLayout};
use djforge_core::tui::CreateArgs;
use djforge_core::{
    DeploymentProfile, Feature, FeatureSelection, ProductConfig, ProjectDescriptor, Runtime,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// CLI version
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// djforge product configuration
#[derive(Clone)]
pub struct DjforgeConfig;

impl ProductConfig for DjforgeConfig {
    fn name(&self) -> &'static str {
        "djforge"
    }

    fn display_name(&self) -> &'static str {
        "djforge"
    }

    fn template_url_env(&self) -> &'static str {
        "DJFORGE_TEMPLATE_URL"
    }

    fn docs_url(&self, runtime: Runtime) -> &'static str {
        match runtime {
            Runtime::Python => "https://www.python.org/downloads/",
            Runtime::Node => "https://nodejs.org/en/download",
            Runtime::Docker => "https://docs.docker.com/get-docker/",
        }
    }

    fn upgrade_command(&self) -> &'static str {
        "cargo install djforge --force"
    }

    fn next_steps(&self, project: &ProjectDescriptor, selection: &FeatureSelection) -> Vec<String> {
        let mut steps = Vec::new();
        let current = std::env::current_dir().ok();

        // Step 1: cd to directory if not current
        if current.as_deref() != Some(project.root()) {
            steps.push(format!("cd {}", project.root().display()));
        }

        match project.profile() {
            DeploymentProfile::Containerized => {
                steps.push("docker compose up --build".to_string());
                steps.push(
                    "docker compose exec backend python manage.py migrate".to_string(),
                );
            }
            profile => {
                steps.push(if cfg!(windows) {
                    "venv\\Scripts\\activate".to_string()
                } else {
                    "source venv/bin/activate".to_string()
                });
                steps.push("python manage.py migrate".to_string());
                steps.push("python manage.py createsuperuser".to_string());

                if profile == DeploymentProfile::SharedHostingPlatform {
                    steps.push("python manage.py collectstatic".to_string());
                    steps.push(
                        "Upload the project and point the Passenger app root at it".to_string(),
                    );
                } else if selection.has(Feature::Frontend) {
                    steps.push("./dev.sh".to_string());
                } else {
                    steps.push("python manage.py runserver".to_string());
                }
            }
        }

        steps
    }
}

#[derive(Parser, Debug)]
#[command(name = "djforge")]
#[command(about = "Generate Django projects with optional API, auth, CORS, PostgreSQL and Next.js frontend")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new Django project
    #[command(alias = "create")]
    CreateProject(CliCreateArgs),
    /// Build container images for a generated project (not implemented yet)
    DockerBuild,
    /// Run the development servers of an existing project
    Dev(DevArgs),
}

#[derive(Parser, Debug)]
pub struct CliCreateArgs {
    /// Project name (use `.` for the current directory)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Directory the project is created in
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Deployment target
    #[arg(short, long, value_enum)]
    pub profile: Option<DeploymentProfile>,

    /// Features to enable (comma-separated: api-router,auth-token,cors,custom-user,postgres,frontend)
    #[arg(short, long, value_delimiter = ',')]
    pub features: Option<Vec<Feature>>,

    /// Extra pip package to install (repeatable)
    #[arg(long = "package")]
    pub packages: Vec<String>,

    /// LANGUAGE_CODE written to settings.py
    #[arg(long)]
    pub language_code: Option<String>,

    /// TIME_ZONE written to settings.py
    #[arg(long)]
    pub time_zone: Option<String>,

    /// Replace the contents of a non-empty project directory
    #[arg(long)]
    pub overwrite: bool,

    /// Auto-confirm all prompts (non-interactive mode)
    #[arg(short, long)]
    pub yes: bool,

    /// Local template pack, a directory or a zip file (for development use)
    #[arg(long = "template-dir")]
    pub template_dir: Option<PathBuf>,

    /// Remote template pack (zip), DJFORGE_TEMPLATE_URL when unset
    #[arg(long = "template-url")]
    pub template_url: Option<String>,

    /// Seconds before an external tool is killed
    #[arg(long = "tool-timeout", env = "DJFORGE_TOOL_TIMEOUT")]
    pub tool_timeout: Option<u64>,

    /// Start the dev servers after generating the project
    #[arg(long)]
    pub serve: bool,

    /// Skip the Python/Node.js/Docker check
    #[arg(long)]
    pub skip_runtime_check: bool,
}

impl From<CliCreateArgs> for CreateArgs {
    fn from(args: CliCreateArgs) -> Self {
        CreateArgs {
            name: args.name,
            directory: args.directory,
            profile: args.profile,
            features: args.features,
            packages: args.packages,
            language_code: args.language_code,
            time_zone: args.time_zone,
            overwrite: args.overwrite,
            yes: args.yes,
            template_dir: args.template_dir,
            template_url: args.template_url,
            tool_timeout: args.tool_timeout.map(Duration::from_secs),
            serve: args.serve,
            skip_runtime_check: args.skip_runtime_check,
        }
    }
}

#[derive(Parser, Debug)]
pub struct DevArgs {
    /// Project root; used when --backend is not given
    pub directory: Option<PathBuf>,

    /// Directory containing manage.py
    #[arg(long)]
    pub backend: Option<PathBuf>,

    /// Frontend directory started with `<runner> run dev`
    #[arg(long)]
    pub frontend: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DJFORGE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // Prompts own stdout
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run_dev(args: DevArgs) -> Result<()> {
    let layout = match args.backend {
        Some(backend) => DevLayout::from_dirs(backend, args.frontend),
        None => {
            let root = match args.directory {
                Some(dir) => dir,
                None => std::env::current_dir().context("cannot read the current directory")?,
            };
            let mut layout = dev::detect(&root)?;
            if args.frontend.is_some() {
                layout.frontend_dir = args.frontend;
            }
            layout
        }
    };

    dev::serve(&layout).await?;
    Ok(())
}

async fn create(config: &DjforgeConfig, create_args: CreateArgs) -> Result<()> {
    // Run the TUI application with the create args
    let result = djforge_core::run(config, create_args, CLI_VERSION).await;

    // Ensure cursor is visible on normal exit
    let _ = console::Term::stderr().show_cursor();

    result
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // Ensure terminal cursor is restored on panic
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = console::Term::stderr().show_cursor();
        default_panic(info);
    }));

    // Handle Ctrl+C gracefully
    ctrlc::set_handler(move || {
        let _ = console::Term::stderr().show_cursor();
        std::process::exit(130);
    })
    .ok();

    let args = Args::parse();
    let config = DjforgeConfig;
    tracing::debug!(version = CLI_VERSION, command = ?args.command, "starting");

    // Handle subcommands
    match args.command {
        Some(Command::CreateProject(create_args)) => create(&config, create_args.into()).await,
        Some(Command::DockerBuild) => {
            println!("docker-build is not implemented yet.");
            println!("Generate a project with `--profile containerized` and run `docker compose build` in it.");
            Ok(())
        }
        Some(Command::Dev(dev_args)) => run_dev(dev_args).await,
        None => {
            // No subcommand provided, default to create behavior (interactive mode)
            create(&config, CreateArgs::default()).await
        }
    }
}
