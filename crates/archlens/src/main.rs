use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use archlens::{
    config::{Config, DEFAULT_CONFIG_FILE},
    model_builder::build_model,
    render::{OutputFormat, Renderer},
    view::{apply_labels, diff, filter_view, validate_view_spec},
};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{LevelFilter, debug, error, info};

#[derive(Debug, Parser)]
#[command(name = "archlens")]
#[command(version, about = "Architecture views, policies and diffs for Python projects")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output format; overrides `format` in the configuration file
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

impl ConfigArgs {
    fn load(&self) -> Result<Config> {
        let mut config = Config::load(&self.config)?;
        if let Some(format) = self.format {
            config.format = format;
        }
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render every configured view
    Render(ConfigArgs),
    /// Render the views that differ from another checkout of the project
    Diff {
        #[command(flatten)]
        args: ConfigArgs,
        /// Root of the baseline checkout
        #[arg(long)]
        base: PathBuf,
    },
    /// Check the configured policies; exits with 1 on any violation
    Validate(ConfigArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Render(args) => render(&args),
        Command::Diff { args, base } => render_diff(&args, &base),
        Command::Validate(args) => validate(&args),
    };
    result.unwrap_or_else(|err| {
        error!("{err:#}");
        ExitCode::FAILURE
    })
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn output_path(config: &Config, stem: &str, renderer: &dyn Renderer) -> PathBuf {
    config.save_location.join(format!(
        "{}-{stem}.{}",
        config.name,
        renderer.extension()
    ))
}

fn write_diagram(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn render(args: &ConfigArgs) -> Result<ExitCode> {
    let config = args.load()?;
    let model = build_model(&config)?;
    let renderer = config.format.renderer(&config);

    for (view_name, spec) in &config.views {
        validate_view_spec(&model, view_name, spec)?;
        let view = filter_view(&model, spec);
        let content = renderer.render(view_name, &view)?;
        write_diagram(&output_path(&config, view_name, renderer.as_ref()), &content)?;
    }
    Ok(ExitCode::SUCCESS)
}

#[allow(clippy::print_stdout)]
fn render_diff(args: &ConfigArgs, base: &Path) -> Result<ExitCode> {
    let config = args.load()?;
    let config_dir = args.config.parent().unwrap_or_else(|| Path::new(""));
    let baseline = config.rebased(config_dir, base);

    let local = build_model(&config).context("Failed to build the local model")?;
    let remote = build_model(&baseline).context("Failed to build the baseline model")?;
    let renderer = config.format.renderer(&config);

    for (view_name, spec) in &config.views {
        validate_view_spec(&local, view_name, spec)?;
        let mut result = diff(&filter_view(&local, spec), &filter_view(&remote, spec));
        if !result.has_changes() {
            debug!("View {view_name} has no architectural changes");
            continue;
        }
        for change in result.changes() {
            debug!("{view_name}: {change:?}");
        }

        apply_labels(result.packages_mut(), spec.use_package_path_as_label());
        let content = renderer.render(view_name, result.packages())?;
        let stem = format!("diff-{view_name}");
        write_diagram(&output_path(&config, &stem, renderer.as_ref()), &content)?;
        println!("{view_name}");
    }
    Ok(ExitCode::SUCCESS)
}

#[allow(clippy::print_stdout)]
fn validate(args: &ConfigArgs) -> Result<ExitCode> {
    let config = args.load()?;
    let model = build_model(&config)?;

    let violations = model.violations();
    if violations.is_empty() {
        info!("{} policies hold", model.policies().len());
        return Ok(ExitCode::SUCCESS);
    }
    for violation in &violations {
        println!("{}", violation.describe(&model));
    }
    Ok(ExitCode::from(1))
}
