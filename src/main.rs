//! Tanuki ACL command line
//!
//! Loads a permissions description and answers access queries against it.

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tanuki_acl::{
    Acl,
    config::{AppConfig, LogFormat, load_config},
    loader::{PermissionsDescription, read_permissions_file},
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Tanuki ACL - query role and resource permissions
#[derive(Parser, Debug)]
#[command(name = "tanuki-acl")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "TANUKI_ACL_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TANUKI_ACL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Permissions description (JSON), overrides permissions.file
    #[arg(short, long, env = "TANUKI_ACL_PERMISSIONS")]
    permissions: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether a role holds a privilege on a resource
    Check {
        /// Role to check (all roles when omitted)
        #[arg(long)]
        role: Option<String>,

        /// Resource to check (all resources when omitted)
        #[arg(long)]
        resource: Option<String>,

        /// Privilege to check (all privileges when omitted)
        #[arg(long)]
        privilege: Option<String>,
    },

    /// List roles with their parents
    Roles,

    /// List resources with their parent
    Resources,

    /// Load the permissions description and report what it contains
    Validate,
}

fn init_logging(args: &Args, config: &AppConfig) {
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

/// Build the ACL from the configured description
///
/// In non-strict mode a failing load is logged and whatever was applied
/// before the failure is kept.
fn build_acl(description: &PermissionsDescription, strict: bool) -> anyhow::Result<Acl> {
    let mut acl = Acl::new();
    match acl.load(description) {
        Ok(_) => Ok(acl),
        Err(e) if !strict => {
            warn!(error = %e, "Permissions partially loaded");
            Ok(acl)
        }
        Err(e) => Err(e.into()),
    }
}

fn run(args: &Args, config: &AppConfig) -> anyhow::Result<ExitCode> {
    let path = args
        .permissions
        .clone()
        .or_else(|| config.permissions.file_path())
        .ok_or_else(|| anyhow::anyhow!("No permissions file given (use --permissions)"))?;

    let description = read_permissions_file(&path)
        .inspect_err(|e| error!(error = %e, path = %path, "Failed to read permissions"))?;
    let acl = build_acl(&description, config.permissions.strict)?;

    match &args.command {
        Command::Check {
            role,
            resource,
            privilege,
        } => {
            let allowed =
                acl.is_allowed(role.as_deref(), resource.as_deref(), privilege.as_deref())?;
            println!("{}", if allowed { "allowed" } else { "denied" });
            return Ok(if allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Command::Roles => {
            let registry = acl.role_registry();
            for role in registry.iter() {
                let parents: Vec<&str> = registry
                    .get_parents(role)?
                    .into_iter()
                    .map(|parent| parent.id())
                    .collect();
                if parents.is_empty() {
                    println!("{role}");
                } else {
                    println!("{role} < {}", parents.join(", "));
                }
            }
        }
        Command::Resources => {
            for resource in acl.resources() {
                match acl.get_resource_parent(resource)? {
                    Some(parent) => println!("{resource} < {parent}"),
                    None => println!("{resource}"),
                }
            }
        }
        Command::Validate => {
            println!(
                "{} roles, {} resources, {} rules",
                acl.roles().len(),
                acl.resources().len(),
                description.rules.len()
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> anyhow::Result<ExitCode> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = load_config(args.config.as_deref())?;

    // Initialize logging
    init_logging(&args, &config);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting tanuki-acl");

    run(&args, &config).inspect_err(|e| error!(error = %e, "Command failed"))
}
