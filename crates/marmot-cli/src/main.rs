mod demo;
mod logging;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use marmot_script_clockwork::clockwork_factory;
use marmot_script_host::{ContentHash, HostConfig, ScriptIdent, ScriptManager};

#[derive(Parser)]
#[command(version, about = "Game Script console for the marmot simulation", long_about = None)]
struct Cli {
    /// Also write logs to the marmot data directory
    #[arg(long)]
    log_file: bool,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available Game Scripts
    List {
        /// Show every version instead of only the newest per script
        #[arg(long)]
        all: bool,
    },
    /// List available Game Script libraries
    Libraries,
    /// Check whether a script is available locally, optionally verifying
    /// its content hash
    Verify {
        name: String,
        version: u32,
        /// Expected BLAKE3 content hash, hex encoded
        #[arg(long)]
        hash: Option<String>,
        /// Check the library registry instead of the script registry
        #[arg(long)]
        library: bool,
    },
    /// Run the demo simulation loop against the clockwork engine
    Run(demo::RunArgs),
    /// Install a sample script into the script directory and select it
    InstallDemo,
    /// Clear the persisted script selection
    ResetConfig,
}

/// Write a minimal runnable script package, so `marmot run` works out of
/// the box on a fresh machine.
fn install_demo_script(mut config: HostConfig) -> anyhow::Result<()> {
    let dir = config.script_dir().join("clockwork-demo");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating {}", dir.display()))?;

    let manifest = r#"name = "clockwork-demo"
version = 1
author = "Marmot contributors"
description = "Counts settlements and seasons; the reference Game Script"
entry = "main.mscr"
capabilities = ["persists-state", "admin-commands"]
"#;
    std::fs::write(dir.join("script.toml"), manifest)?;
    std::fs::write(
        dir.join("main.mscr"),
        "// Interpreted by the clockwork engine, which ignores it.\n",
    )?;

    config.script.name = Some("clockwork-demo".to_string());
    config.script.version = None;
    config.save()?;

    println!("Demo script installed in {}", dir.display());
    println!("Try: marmot run --ticks 400");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = logging::init_logging("marmot", cli.log_file)?;

    let config = match &cli.config {
        Some(path) => HostConfig::load_from(path)?,
        None => HostConfig::load()?,
    };

    match cli.command {
        Command::List { all } => {
            let manager = ScriptManager::new(config, clockwork_factory)?;
            let mut listing = String::new();
            manager.write_console_list(&mut listing, !all)?;
            print!("{}", listing);
        }
        Command::Libraries => {
            let manager = ScriptManager::new(config, clockwork_factory)?;
            let mut listing = String::new();
            manager.write_console_library_list(&mut listing)?;
            print!("{}", listing);
        }
        Command::Verify {
            name,
            version,
            hash,
            library,
        } => {
            let manager = ScriptManager::new(config, clockwork_factory)?;
            let expected = hash
                .map(|h| ContentHash::from_hex(&h).context("--hash is not a valid BLAKE3 hex digest"))
                .transpose()?;
            let ident = ScriptIdent::new(name, version);
            let available = if library {
                manager.has_library(&ident, expected.as_ref())
            } else {
                manager.has_script(&ident, expected.as_ref())
            };

            if available {
                println!("{} is available.", ident);
            } else {
                println!("{} is NOT available.", ident);
                std::process::exit(1);
            }
        }
        Command::Run(args) => demo::run(config, args)?,
        Command::InstallDemo => install_demo_script(config)?,
        Command::ResetConfig => {
            let mut manager = ScriptManager::new(config, clockwork_factory)?;
            manager.reset_config()?;
            println!("Script selection cleared.");
        }
    }

    Ok(())
}
