//! Charm-style CLI prompts using cliclack

use crate::config::SettingsOptions;
use crate::features::{Feature, FeatureSelection, FeatureSelector};
use crate::generate::generate;
use crate::pipeline::{ProjectRequest, Step, StepObserver, StepOutcome, StepState};
use crate::planner::{self, DeploymentProfile, ProjectDescriptor};
use crate::product::ProductConfig;
use crate::runtime::check::{self, Runtime};
use crate::runtime::{dev, ProcessInvoker};
use crate::templates::{version, TemplateFetcher, TemplateSource, Templates};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI arguments for the create command
#[derive(Debug, Clone, Default)]
pub struct CreateArgs {
    /// Project name, also the directory created under `directory`
    pub name: Option<String>,

    /// Directory the project is created in (defaults to the current one)
    pub directory: Option<PathBuf>,

    pub profile: Option<DeploymentProfile>,

    /// Features to enable; `None` asks for each one
    pub features: Option<Vec<Feature>>,

    /// Extra pip packages
    pub packages: Vec<String>,

    pub language_code: Option<String>,

    pub time_zone: Option<String>,

    /// Clear a non-empty project directory
    pub overwrite: bool,

    /// Auto-confirm all prompts (non-interactive mode)
    pub yes: bool,

    /// Local template pack (directory or zip)
    pub template_dir: Option<PathBuf>,

    /// Remote template pack
    pub template_url: Option<String>,

    pub tool_timeout: Option<Duration>,

    /// Start the dev servers once the project is generated
    pub serve: bool,

    pub skip_runtime_check: bool,
}

/// Run the CLI with interactive prompts
pub async fn run<C: ProductConfig>(config: &C, args: CreateArgs, cli_version: &str) -> Result<()> {
    cliclack::intro(config.display_name())?;

    // Step 1: Load templates
    let templates = load_templates(config, &args, cli_version).await?;

    // Step 2: Project name and layout
    let base_dir = select_base_dir(&args)?;
    let profile = select_profile(&args)?;
    let project = select_project(&args, &base_dir, profile)?;

    // Step 3: Features
    let selection = select_features(&args)?;

    // Step 4: Runtimes
    if args.skip_runtime_check {
        cliclack::log::info("Skipping runtime check")?;
    } else {
        check_runtimes(config, &args, &selection, profile)?;
    }

    // Step 5: Confirm overwriting existing files
    let overwrite = confirm_overwrite(&args, &project)?;

    let defaults = config.defaults();
    let settings = SettingsOptions {
        language_code: args
            .language_code
            .clone()
            .unwrap_or_else(|| defaults.language_code.to_string()),
        time_zone: args
            .time_zone
            .clone()
            .unwrap_or_else(|| defaults.time_zone.to_string()),
    };
    let request = ProjectRequest::new(project, selection)
        .with_settings(settings)
        .with_overwrite(overwrite);

    // Step 6: Generate
    let invoker = ProcessInvoker::new(args.tool_timeout.unwrap_or(defaults.tool_timeout));
    let mut observer = ProgressObserver;
    let generated = generate(&request, &invoker, &templates, &mut observer).await?;

    if let Some((step, error)) = generated.report.failure {
        cliclack::outro_cancel(format!("Step '{}' failed", step))?;
        return Err(anyhow::Error::new(error).context(format!("step '{}' failed", step)));
    }

    for artifact in &generated.artifacts {
        cliclack::log::info(format!("Wrote {}", artifact.display()))?;
    }
    cliclack::log::success(format!(
        "Created {} in {}",
        request.project().name(),
        request.project().root().display()
    ))?;

    // Step 7: Show next steps
    print_next_steps(config, &request)?;

    if args.serve {
        serve(request.project()).await;
    }

    Ok(())
}

async fn load_templates<C: ProductConfig>(
    config: &C,
    args: &CreateArgs,
    cli_version: &str,
) -> Result<Templates> {
    let source = match (&args.template_dir, &args.template_url) {
        (Some(dir), _) => Some(TemplateSource::local(dir)),
        (None, Some(url)) => Some(TemplateSource::remote(url)?),
        (None, None) => {
            let from_env = std::env::var(config.template_url_env())
                .ok()
                .filter(|url| !url.trim().is_empty());
            match from_env.as_deref().or(config.default_template_url()) {
                Some(url) => Some(TemplateSource::remote(url)?),
                None => None,
            }
        }
    };

    let Some(source) = source else {
        tracing::debug!("using bundled templates only");
        return Ok(Templates::bundled());
    };

    let spinner = cliclack::spinner();
    spinner.start(format!("Loading templates from {}...", source.location()));

    let fetcher = TemplateFetcher::new(config.user_agent());
    let pack = match fetcher.fetch(&source).await {
        Ok(pack) => pack,
        Err(e) => {
            spinner.stop("Failed to load templates");
            return Err(e.into());
        }
    };

    let manifest = pack.manifest();
    let label = if manifest.name.is_empty() {
        source.location()
    } else {
        manifest.name.clone()
    };
    spinner.stop(format!("Templates: {} ({} files)", label, pack.len()));

    // Check version compatibility
    if let Some(pack_version) = &manifest.version {
        if let Some(warning) =
            version::check_compatibility(cli_version, pack_version, config.upgrade_command())
        {
            cliclack::log::warning(format!("Version warning: {}", warning))?;
        }
    }

    Ok(Templates::with_pack(pack))
}

fn select_base_dir(args: &CreateArgs) -> Result<PathBuf> {
    let current_dir = std::env::current_dir().context("cannot read the current directory")?;

    let path = match &args.directory {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => current_dir.join(dir),
        None => return Ok(current_dir),
    };

    if !path.is_dir() {
        bail!("Directory does not exist: {}", path.display());
    }
    cliclack::log::info(format!("Using directory: {}", path.display()))?;
    Ok(path)
}

fn select_profile(args: &CreateArgs) -> Result<DeploymentProfile> {
    if let Some(profile) = args.profile {
        return Ok(profile);
    }
    if args.yes {
        return Ok(DeploymentProfile::Standalone);
    }

    let mut select = cliclack::select("Deployment target");
    for profile in DeploymentProfile::ALL {
        select = select.item(profile, profile.display_name(), "");
    }
    Ok(select.interact()?)
}

/// Ask for a name until the planner accepts it
fn select_project(
    args: &CreateArgs,
    base_dir: &Path,
    profile: DeploymentProfile,
) -> Result<ProjectDescriptor> {
    if let Some(name) = &args.name {
        return Ok(planner::plan(base_dir, name, profile)?);
    }
    if args.yes {
        bail!("--name is required with --yes");
    }

    loop {
        let name: String = cliclack::input("Project name")
            .placeholder("my-project")
            .interact()?;

        match planner::plan(base_dir, &name, profile) {
            Ok(project) => return Ok(project),
            Err(e) if e.is_user_input() => cliclack::log::error(e.to_string())?,
            Err(e) => return Err(e.into()),
        }
    }
}

fn select_features(args: &CreateArgs) -> Result<FeatureSelection> {
    let requested: Vec<Feature> = match &args.features {
        Some(features) => features.clone(),
        None if args.yes => Feature::ALL
            .into_iter()
            .filter(Feature::default_enabled)
            .collect(),
        None => {
            let mut chosen = Vec::new();
            for feature in Feature::ALL {
                let enabled: bool = cliclack::confirm(feature.prompt())
                    .initial_value(feature.default_enabled())
                    .interact()?;
                if enabled {
                    chosen.push(feature);
                }
            }
            chosen
        }
    };

    let selection = FeatureSelector::default().select(&requested, args.packages.as_slice())?;

    let names: Vec<&str> = selection.features().map(|f| f.flag()).collect();
    if names.is_empty() {
        cliclack::log::success("Features: none")?;
    } else {
        cliclack::log::success(format!("Features: {}", names.join(", ")))?;
    }
    cliclack::log::info(format!("Packages: {}", selection.packages().join(" ")))?;

    Ok(selection)
}

fn check_runtimes<C: ProductConfig>(
    config: &C,
    args: &CreateArgs,
    selection: &FeatureSelection,
    profile: DeploymentProfile,
) -> Result<()> {
    let (required, advisory) = check::runtimes_for(selection, profile);

    let spinner = cliclack::spinner();
    spinner.start("Checking runtimes...");

    let error = match check::check_runtimes_with_advisory(&required, &advisory) {
        Ok(runtimes) => {
            let runtime_info: Vec<String> = runtimes
                .iter()
                .map(|r| {
                    if r.available {
                        format!("{} ({})", r.name, r.version.as_deref().unwrap_or("unknown"))
                    } else {
                        format!("{} (not installed)", r.name)
                    }
                })
                .collect();
            spinner.stop(format!("Detected runtimes: {}", runtime_info.join(", ")));
            return Ok(());
        }
        Err(e) => e,
    };

    spinner.stop("Missing runtimes");
    cliclack::log::error(error.to_string())?;

    if !args.yes {
        let missing: Vec<Runtime> = required
            .into_iter()
            .filter(|r| !check::probe(*r).available)
            .collect();

        let open_docs: bool = cliclack::confirm("Open the installation docs?")
            .initial_value(true)
            .interact()?;
        if open_docs {
            for runtime in missing {
                let url = config.docs_url(runtime);
                if let Err(e) = open::that(url) {
                    cliclack::log::warning(format!("Could not open {}: {}", url, e))?;
                }
            }
        }
    }

    bail!("Please install the missing runtimes and try again.");
}

fn confirm_overwrite(args: &CreateArgs, project: &ProjectDescriptor) -> Result<bool> {
    let root = project.root();
    let count = std::fs::read_dir(root).map(|e| e.count()).unwrap_or(0);
    if count == 0 {
        return Ok(false);
    }

    cliclack::log::warning(format!(
        "{} has {} existing items",
        root.display(),
        count
    ))?;
    if args.overwrite {
        return Ok(true);
    }
    if args.yes {
        bail!("{} is not empty; pass --overwrite to replace it", root.display());
    }

    let confirm: bool = cliclack::confirm("Delete them and continue?")
        .initial_value(false)
        .interact()?;
    if !confirm {
        bail!("Setup cancelled.");
    }
    Ok(true)
}

/// Logs every step as it runs; tool output streams in between
struct ProgressObserver;

impl StepObserver for ProgressObserver {
    fn step_started(&mut self, step: &Step, index: usize, total: usize) {
        let _ = cliclack::log::step(format!("[{}/{}] {}", index + 1, total, step.describe()));
    }

    fn step_finished(&mut self, step: &Step, outcome: &StepOutcome) {
        let elapsed = outcome.elapsed.as_secs_f32();
        let _ = match (&outcome.state, &outcome.error) {
            (StepState::Failed, Some(error)) if step.fatal => {
                cliclack::log::error(format!("{}: {}", step.id, error))
            }
            (StepState::Failed, Some(error)) => {
                cliclack::log::warning(format!("{} (continuing): {}", step.id, error))
            }
            _ => cliclack::log::success(format!("{} ({:.1}s)", step.id, elapsed)),
        };
    }
}

fn print_next_steps<C: ProductConfig>(config: &C, request: &ProjectRequest) -> Result<()> {
    let steps = config.next_steps(request.project(), request.selection());

    println!();
    println!("  Next steps");
    println!();

    for (i, step) in steps.iter().enumerate() {
        println!("  {}.  {}", i + 1, step);
    }

    cliclack::outro("Happy coding!")?;

    Ok(())
}

/// Dev server failures never fail the command
async fn serve(project: &ProjectDescriptor) {
    println!();
    println!("  Starting dev servers, press Ctrl+C to stop");
    println!();
    if let Err(e) = dev::run_dev_servers(project.root()).await {
        tracing::warn!(error = %e, "dev servers stopped");
        eprintln!("Dev servers stopped: {}", e);
    }
}
