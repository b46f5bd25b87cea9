//! SBP command line
//!
//! Command definitions and handlers for the `sbp` binary. Handlers write to
//! any [`Write`] sink and return the process exit code, so they can be driven
//! from tests without spawning the binary.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgGroup, ArgMatches, Command};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use sbp_model::{AccountId, Partition, ProjectIdentifier, Region};
use sbp_policy::{check_projects, BootstrapConfig, BootstrapPlan, Extension, RoleCreationGuard};

/// Exit code for success
pub const EXIT_OK: i32 = 0;

/// Exit code for a failed check
pub const EXIT_FAILED: i32 = 1;

/// Build the command tree
#[must_use]
pub fn cli() -> Command {
    Command::new("sbp")
        .version(sbp_policy::VERSION)
        .about("Scoped bootstrap permissions for self-service CI/CD pipelines")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON on stderr"),
        )
        .subcommand(
            Command::new("synth")
                .about("Synthesize the bootstrap role template")
                .arg(project_arg().required(false))
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Config file (.toml, .yaml, .yml, .json)"),
                )
                .group(ArgGroup::new("source").args(["project", "config"]).required(true))
                .arg(Arg::new("region").long("region").help("Region; deferred when absent"))
                .arg(Arg::new("account").long("account").help("Account id; deferred when absent"))
                .arg(Arg::new("partition").long("partition").help("ARN partition"))
                .arg(
                    Arg::new("format")
                        .long("format")
                        .default_value("json")
                        .value_parser(["json", "yaml"])
                        .help("Output format"),
                )
                .arg(extension_arg()),
        )
        .subcommand(
            Command::new("validate")
                .about("Check a project identifier")
                .arg(Arg::new("id").required(true).help("Project identifier")),
        )
        .subcommand(
            Command::new("isolation")
                .about("Cross-check two projects for overlapping grants")
                .arg(Arg::new("a").required(true).help("First project"))
                .arg(Arg::new("b").required(true).help("Second project"))
                .arg(extension_arg()),
        )
        .subcommand(
            Command::new("guard")
                .about("Evaluate a child template or print the role guard rules")
                .arg(project_arg())
                .arg(
                    Arg::new("template")
                        .long("template")
                        .value_parser(value_parser!(PathBuf))
                        .help("Child template (.json, .yaml, .yml)"),
                )
                .arg(
                    Arg::new("rules")
                        .long("rules")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("template")
                        .help("Print cloudformation-guard rules"),
                ),
        )
        .subcommand(
            Command::new("fingerprint")
                .about("Print the plan fingerprint")
                .arg(project_arg())
                .arg(extension_arg())
                .arg(
                    Arg::new("short")
                        .long("short")
                        .action(ArgAction::SetTrue)
                        .help("Print the first 16 hex characters only"),
                ),
        )
        .subcommand(Command::new("schema").about("Print the JSON schema of the config file"))
}

fn project_arg() -> Arg {
    Arg::new("project")
        .long("project")
        .short('p')
        .required(true)
        .help("Project identifier")
}

fn extension_arg() -> Arg {
    Arg::new("extension")
        .long("extension")
        .short('e')
        .action(ArgAction::Append)
        .help("Executor extension: build-logs, test-reports, parameters, image-pull, private-registry=<secret>")
}

/// Install the stderr subscriber
///
/// `RUST_LOG` overrides the default `warn` filter.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()
    };
    // An earlier subscriber wins; logging still reaches it.
    if let Err(e) = installed {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
}

/// Dispatch parsed arguments
///
/// # Errors
/// Invalid input, unreadable files and rendering failures.
pub fn run(matches: &ArgMatches, out: &mut impl Write) -> Result<i32> {
    match matches.subcommand() {
        Some(("synth", args)) => synth(args, out),
        Some(("validate", args)) => validate(args, out),
        Some(("isolation", args)) => isolation(args, out),
        Some(("guard", args)) => guard(args, out),
        Some(("fingerprint", args)) => fingerprint(args, out),
        Some(("schema", _)) => schema(out),
        Some((other, _)) => bail!("unknown command '{other}'"),
        None => bail!("no command given"),
    }
}

fn synth(args: &ArgMatches, out: &mut impl Write) -> Result<i32> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => BootstrapConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BootstrapConfig::new(project(args)?),
    };
    if let Some(region) = args.get_one::<String>("region") {
        config = config.with_region(Region::parse(region)?);
    }
    if let Some(account) = args.get_one::<String>("account") {
        config = config.with_account(AccountId::parse(account)?);
    }
    if let Some(partition) = args.get_one::<String>("partition") {
        config = config.with_partition(Partition::parse(partition)?);
    }
    for extension in extensions(args)? {
        config = config.with_extension(extension);
    }

    let plan = BootstrapPlan::build(&config)?;
    let ctx = config.render_context();
    let rendered = match args.get_one::<String>("format").map(String::as_str) {
        Some("yaml") => plan.to_yaml_string(&ctx)?,
        _ => plan.to_json_string(&ctx)?,
    };
    tracing::info!(project = %plan.project(), fingerprint = %plan.fingerprint().short(), "synthesized");
    writeln!(out, "{}", rendered.trim_end())?;
    Ok(EXIT_OK)
}

fn validate(args: &ArgMatches, out: &mut impl Write) -> Result<i32> {
    let id = args.get_one::<String>("id").map(String::as_str).unwrap_or_default();
    match ProjectIdentifier::parse(id) {
        Ok(project) => {
            writeln!(out, "{project}: valid")?;
            Ok(EXIT_OK)
        }
        Err(e) => {
            writeln!(out, "{e}")?;
            Ok(EXIT_FAILED)
        }
    }
}

fn isolation(args: &ArgMatches, out: &mut impl Write) -> Result<i32> {
    let extensions = extensions(args)?;
    let plan_for = |key: &str| -> Result<BootstrapPlan> {
        let id = args.get_one::<String>(key).map(String::as_str).unwrap_or_default();
        let config = extensions
            .iter()
            .cloned()
            .fold(BootstrapConfig::new(ProjectIdentifier::parse(id)?), BootstrapConfig::with_extension);
        Ok(BootstrapPlan::build(&config)?)
    };
    let a = plan_for("a")?;
    let b = plan_for("b")?;

    let report = check_projects(&a, &b);
    writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(if report.is_isolated() { EXIT_OK } else { EXIT_FAILED })
}

fn guard(args: &ArgMatches, out: &mut impl Write) -> Result<i32> {
    let guard = RoleCreationGuard::new(project(args)?);
    if args.get_flag("rules") {
        write!(out, "{}", guard.render_rules())?;
        return Ok(EXIT_OK);
    }

    let Some(path) = args.get_one::<PathBuf>("template") else {
        bail!("either --template or --rules is required");
    };
    let template = read_template(path)?;
    let violations = guard.evaluate(&template);
    for violation in &violations {
        writeln!(out, "{violation}")?;
    }
    if violations.is_empty() {
        writeln!(out, "{}: no violations", path.display())?;
        Ok(EXIT_OK)
    } else {
        Ok(EXIT_FAILED)
    }
}

fn fingerprint(args: &ArgMatches, out: &mut impl Write) -> Result<i32> {
    let config = extensions(args)?
        .into_iter()
        .fold(BootstrapConfig::new(project(args)?), BootstrapConfig::with_extension);
    let fingerprint = BootstrapPlan::build(&config)?.fingerprint();
    if args.get_flag("short") {
        writeln!(out, "{}", fingerprint.short())?;
    } else {
        writeln!(out, "{fingerprint}")?;
    }
    Ok(EXIT_OK)
}

fn schema(out: &mut impl Write) -> Result<i32> {
    let schema = schemars::schema_for!(BootstrapConfig);
    writeln!(out, "{}", serde_json::to_string_pretty(&schema)?)?;
    Ok(EXIT_OK)
}

fn project(args: &ArgMatches) -> Result<ProjectIdentifier> {
    let id = args
        .get_one::<String>("project")
        .context("--project is required")?;
    Ok(ProjectIdentifier::parse(id)?)
}

fn extensions(args: &ArgMatches) -> Result<Vec<Extension>> {
    args.get_many::<String>("extension")
        .into_iter()
        .flatten()
        .map(|flag| Extension::parse_flag(flag).with_context(|| format!("--extension {flag}")))
        .collect()
}

fn read_template(path: &Path) -> Result<serde_json::Value> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let parsed = if is_yaml {
        serde_yaml::from_str(&text).map_err(anyhow::Error::from)
    } else {
        serde_json::from_str(&text).map_err(anyhow::Error::from)
    };
    parsed.with_context(|| format!("parsing {}", path.display()))
}
