mod cli;
mod navigation;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::debug;
use tabhost_core::HostConfig;
use tabhost_core::kernel::constants::{APP_NAME, APP_VERSION, DEFAULT_CONFIG_FILE, ENVIRONMENTS_FILE};
use tabhost_core::runtime_env::{ModuleEntry, ModuleType};
use tracing_subscriber::EnvFilter;

/// Tabhost: a tabbed shell for discovered panel plugins
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Print "pong" and exit, for a quick liveness check
    #[arg(long)]
    ping: bool,

    /// Host configuration file (JSON, YAML or TOML)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Plugin discovery root, overriding the configuration
    #[arg(long)]
    plugins_dir: Option<PathBuf>,

    /// Runtime environments root, overriding the configuration
    #[arg(long)]
    runtime_dir: Option<PathBuf>,

    /// Log filter such as `debug` or `tabhost_core=trace`
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect and activate plugins
    Plugin {
        #[command(subcommand)]
        command: PluginCommand,
    },
    /// Manage runtime environments
    Env {
        #[command(subcommand)]
        command: EnvCommand,
    },
}

#[derive(Subcommand, Debug)]
enum PluginCommand {
    /// List discovered plugins in priority order
    List {},
    /// Print the navigation tree
    Tree {
        /// Also resolve each plugin's `icon.<ext>` file, rasterizing eps/emf
        #[arg(long)]
        icons: bool,
    },
    /// Activate plugins by name
    Activate {
        /// Names of the plugins to activate
        #[arg(required = true)]
        names: Vec<String>,
        /// Runtime environment to activate first (repeatable)
        #[arg(long = "env")]
        envs: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum EnvCommand {
    /// List known and active environments
    List {},
    /// Activate an environment
    Activate {
        /// The environment to activate
        name: String,
    },
    /// Deactivate an environment
    Deactivate {
        /// The environment to deactivate
        name: String,
    },
    /// Create an empty environment and its directory
    Create { name: String },
    /// Remove an environment from the catalog, keeping its directory
    Delete { name: String },
    /// Record a module directory in an environment
    AddModule {
        env: String,
        module: String,
        /// Module directory, relative to the environment directory unless absolute
        path: PathBuf,
        /// Also expose the module on the executable path
        #[arg(long)]
        common: bool,
        #[arg(long)]
        module_version: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Forget a module recorded in an environment
    RemoveModule { env: String, module: String },
}

/// `--log-level`, then the config's `log_level`, then `RUST_LOG`, then `info`.
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|e| {
            eprintln!("Invalid log filter '{}': {}, falling back to info", level, e);
            EnvFilter::new("info")
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    // With the `tracing-log` feature, `try_init` also routes `log` records
    // from tabhost-core through the subscriber.
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("Failed to install log subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    let mut config = match HostConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(args.log_level.as_deref().or(config.log_level.as_deref()));
    debug!("{} {} using configuration {}", APP_NAME, APP_VERSION, args.config.display());

    if let Some(dir) = args.plugins_dir {
        config.plugins_dir = dir;
    }
    if let Some(dir) = args.runtime_dir {
        config.environments_file = dir.join(ENVIRONMENTS_FILE);
        config.runtime_dir = dir;
    }

    match args.command {
        Some(Commands::Plugin { command }) => match command {
            PluginCommand::List {} => cli::list_plugins(&config).await,
            PluginCommand::Tree { icons } => cli::print_tree(&config, icons).await,
            PluginCommand::Activate { names, envs } => cli::activate_plugins(&config, &names, &envs).await,
        },
        Some(Commands::Env { command }) => match command {
            EnvCommand::List {} => cli::list_environments(&config),
            EnvCommand::Activate { name } => cli::activate_environment(&config, &name),
            EnvCommand::Deactivate { name } => cli::deactivate_environment(&config, &name),
            EnvCommand::Create { name } => cli::create_environment(&config, &name),
            EnvCommand::Delete { name } => cli::delete_environment(&config, &name),
            EnvCommand::AddModule {
                env,
                module,
                path,
                common,
                module_version,
                description,
            } => {
                let entry = ModuleEntry {
                    kind: if common { ModuleType::Common } else { ModuleType::Package },
                    path,
                    version: module_version,
                    description,
                };
                cli::add_module(&config, &env, &module, entry)
            }
            EnvCommand::RemoveModule { env, module } => cli::remove_module(&config, &env, &module),
        },
        None => cli::run_session(&config).await,
    }
}
