//! hmbridge-cli - diagnostics for the Hidemaru macro bridge
//!
//! # Usage
//!
//! ```bash
//! # Code page of a host encoding id
//! hmbridge-cli encoding 6
//!
//! # Export table, and what a 8.85 host would bind
//! hmbridge-cli exports --version 885
//!
//! # Load a host executable and report which exports resolved
//! hmbridge-cli probe --host 'C:\Program Files\Hidemaru\Hidemaru.exe'
//!
//! # Show the exchange script for a variable
//! hmbridge-cli script set '$greeting'
//! hmbridge-cli script get 'strlen($greeting)'
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use hmbridge::config::BridgeConfig;
use hmbridge::encoding::Encoding;
use hmbridge::native::NativeHost;
use hmbridge::symbols::{plan, HIDEMARU_EXPORTS};
use hmbridge::var::{get_script, set_script};
use hmbridge::AccessorLocator;
use hmbridge_host::{HostExports, HostVersion};

#[derive(Parser)]
#[command(name = "hmbridge-cli")]
#[command(version = "0.1.0")]
#[command(about = "Diagnostics for the Hidemaru macro bridge", long_about = None)]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the Windows code page of a host encoding id
    Encoding {
        /// Host encoding id
        id: i32,
    },

    /// List the host exports the bridge binds
    Exports {
        /// Host version to gate against, e.g. 890 for 8.90
        #[arg(long)]
        version: Option<f64>,
    },

    /// Load a host executable and report which exports resolved
    Probe {
        /// Host executable (overrides the configuration)
        #[arg(long)]
        host: Option<PathBuf>,

        /// Bridge configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the macro text the bridge sends for a variable
    Script {
        #[command(subcommand)]
        action: ScriptAction,

        /// Bridge configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ScriptAction {
    /// Assign the exchange slot's value to a variable
    Set {
        /// Variable name, `#name` or `$name`
        name: String,
    },
    /// Evaluate an expression into the exchange slot
    Get {
        /// Variable name or read expression
        expression: String,
    },
}

fn main() {
    let cli = Cli::parse();

    hmbridge::logging::init_with_config(&hmbridge::config::LogConfig {
        level: cli.log.clone(),
        file: None,
    });

    let result = match cli.command {
        Commands::Encoding { id } => {
            show_encoding(id);
            Ok(())
        }
        Commands::Exports { version } => {
            show_exports(version);
            Ok(())
        }
        Commands::Probe { host, config } => probe(host, config),
        Commands::Script { action, config } => show_script(action, config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_config(path: Option<PathBuf>) -> Result<BridgeConfig, String> {
    match path {
        Some(path) => BridgeConfig::load(&path).map_err(|e| e.to_string()),
        None => Ok(BridgeConfig::default()),
    }
}

fn show_encoding(id: i32) {
    let encoding = Encoding::from_hm_encode(id);
    if encoding.ms_code_page == 0 {
        println!("{}: no code page", id);
    } else {
        println!("{}: code page {}", id, encoding.ms_code_page);
    }
}

fn show_exports(version: Option<f64>) {
    match version {
        None => {
            for desc in HIDEMARU_EXPORTS {
                println!(
                    "{:45} {:22} {}",
                    desc.symbol,
                    desc.module.unwrap_or("(host)"),
                    availability(desc.required, desc.introduced_in)
                );
            }
        }
        Some(v) => {
            let version = HostVersion(v);
            println!("host {}:", version);
            for (desc, bound) in plan(version) {
                let mark = if bound { "bind" } else { "skip" };
                println!("  {} {}", mark, desc.symbol);
            }
        }
    }
}

fn availability(required: bool, introduced_in: u32) -> String {
    match (required, introduced_in) {
        (true, _) => "required".to_string(),
        (false, 0) => "optional".to_string(),
        (false, v) => format!("optional, since {:.2}", f64::from(v) / 100.0),
    }
}

fn probe(host: Option<PathBuf>, config: Option<PathBuf>) -> Result<(), String> {
    let mut config = load_config(config)?;
    if host.is_some() {
        config.host_path = host;
    }
    let Some(path) = config.host_path.clone() else {
        return Err("no host executable given (use --host or host-path)".to_string());
    };
    if !path.exists() {
        return Err(format!("{} does not exist", path.display()));
    }

    let native = NativeHost::bind(&config);
    let bound = native.binding().bound_symbols();
    println!("{} (version {})", path.display(), native.version());
    for desc in HIDEMARU_EXPORTS {
        let mark = if bound.contains(&desc.symbol) { "ok" } else { "--" };
        println!("  {} {}", mark, desc.symbol);
    }
    println!("{} of {} exports bound", bound.len(), HIDEMARU_EXPORTS.len());
    Ok(())
}

fn show_script(action: ScriptAction, config: Option<PathBuf>) -> Result<(), String> {
    let config = load_config(config)?;
    let assembly = config
        .accessor
        .assembly_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("hmbridge.dll"));
    let locator = AccessorLocator::new(assembly, &config.accessor);

    let script = match action {
        ScriptAction::Set { name } => {
            if !name.starts_with('#') && !name.starts_with('$') {
                return Err(format!("'{}' is not a macro variable name", name));
            }
            set_script(&locator, &name)
        }
        ScriptAction::Get { expression } => get_script(&locator, &expression),
    };
    println!("{}", script);
    Ok(())
}
