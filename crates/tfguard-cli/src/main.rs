//! CLI entry point for tfguard.
//!
//! This module is intentionally thin: it handles argument parsing, I/O, logging setup and
//! exit codes. All business logic lives in the `tfguard-app` crate.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use tfguard_app::{
    BUILTIN_RULES, ScanInput, error_exit_code, format_rule_list, report_schema, run_scan,
    serialize_report, verdict_exit_code,
};
use tfguard_settings::{CliOverrides, parse_override_list};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive; wins over `-v`.
const LOG_ENV: &str = "TFGUARD_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "tfguard",
    version,
    about = "Reference-resolving security auditor for Terraform configurations"
)]
struct Cli {
    /// Directory holding the root module.
    #[arg(long, default_value = ".")]
    root: Utf8PathBuf,

    /// Path to tfguard config TOML, relative to the root.
    #[arg(long, default_value = "tfguard.toml")]
    config: Utf8PathBuf,

    /// More log output on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load, resolve and audit the configuration (default).
    Scan(ScanArgs),

    /// List the built-in rules.
    Rules,

    /// Print the JSON schema of the scan report.
    Schema,
}

#[derive(Args, Debug, Default)]
struct ScanArgs {
    /// Variable override `key=value`; bare keys mean `var.<key>`. Repeatable.
    #[arg(long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,

    /// `.tfvars` or `.json` variable file, relative to the root. Repeatable.
    #[arg(long = "var-file", value_name = "PATH")]
    var_files: Vec<String>,

    /// JSON file with waivers: `[["rule", "resource"], ["rule", "resource", "RR-123"]]`.
    #[arg(long, value_name = "PATH")]
    overrides: Option<Utf8PathBuf>,

    /// Only run rules whose id matches this glob (e.g. `public_exposure.*`).
    #[arg(long, value_name = "GLOB")]
    rules: Option<String>,

    /// Report a failure when a selected property is absent.
    #[arg(long)]
    fail_on_missing: bool,

    /// Skip paths matching this glob, relative to the root. Repeatable.
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Write the JSON report here instead of stdout.
    #[arg(long, value_name = "PATH")]
    report_out: Option<Utf8PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.cmd {
        Some(Commands::Rules) => {
            print!("{}", format_rule_list(BUILTIN_RULES));
            Ok(0)
        }
        Some(Commands::Schema) => report_schema().map(|schema| {
            println!("{schema}");
            0
        }),
        Some(Commands::Scan(ref args)) => cmd_scan(&cli.root, &cli.config, args),
        None => cmd_scan(&cli.root, &cli.config, &ScanArgs::default()),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("tfguard error: {err:#}");
            std::process::exit(error_exit_code(&err));
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_scan(root: &Utf8Path, config: &Utf8Path, args: &ScanArgs) -> anyhow::Result<i32> {
    if !root.exists() {
        anyhow::bail!("root does not exist: {root}");
    }

    // Missing config file is allowed (defaults apply).
    let config_path = root.join(config);
    let config_text = std::fs::read_to_string(&config_path).unwrap_or_default();

    let overrides = match &args.overrides {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read overrides: {path}"))?;
            parse_override_list(&text).with_context(|| format!("parse overrides: {path}"))?
        }
        None => Vec::new(),
    };

    let cli_overrides = CliOverrides {
        fail_on_missing: args.fail_on_missing.then_some(true),
        exclude: args.exclude.clone(),
        variables: args.vars.clone(),
        variable_files: args.var_files.clone(),
        overrides,
        rules: args.rules.clone(),
    };

    let output = run_scan(ScanInput {
        root,
        config_text: &config_text,
        overrides: cli_overrides,
    })?;
    let report = output.report;
    tracing::info!(
        failures = report.summary.failures_total,
        waived = report.summary.failures_waived,
        errors = report.summary.errors_total,
        "scan finished"
    );

    let data = serialize_report(&report)?;
    match &args.report_out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create directory: {parent}"))?;
            }
            std::fs::write(path, data).with_context(|| format!("write report: {path}"))?;
        }
        None => {
            println!("{}", String::from_utf8_lossy(&data));
        }
    }

    Ok(verdict_exit_code(report.verdict))
}
