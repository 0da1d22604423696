//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for sandscript
#[derive(Parser, Debug)]
#[command(name = "sandscript")]
#[command(author, version, about = "Sandboxed script engine host")]
#[command(long_about = r#"
sandscript hosts region scripts inside a sandboxed engine.

Scripts are compiled through a chain of front ends (select one with a
first line such as `//slang`; the default is Lua) and run one VM per
script with a time slice, a memory limit and capability-gated host calls.

Configuration files are loaded from (in priority order):
1. SANDSCRIPT_<SECTION>__<KEY> environment variables
2. --config <path>       Explicit config file
3. ./sandscript.toml     Project-level config
4. ~/.config/sandscript/config.toml   Global config

Example:
  sandscript compile door.lua
  sandscript run door.slang --event touch:1 --event reset
  sandscript config --validate
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, value_name = "DIR", global = true)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the registered script engines
    Engines,

    /// Compile a script and print the result or its diagnostics
    Compile {
        /// Script source file
        file: PathBuf,

        /// Print the compiled unit (or error) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load a script into a scratch region and deliver events to it
    Run {
        /// Script source file
        file: PathBuf,

        /// Event to deliver, as NAME or NAME:ARG,ARG (repeatable)
        #[arg(short, long = "event", value_name = "EVENT")]
        events: Vec<String>,

        /// Name of the scratch region
        #[arg(long, default_value = "Sandbox")]
        region: String,

        /// Make the script owner an estate owner of the region
        #[arg(long)]
        privileged: bool,

        /// Seconds to wait for the script to drain its events
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },

    /// Show configuration sources and the merged configuration
    Config {
        /// Report configuration problems and fail if any is an error
        #[arg(long)]
        validate: bool,
    },
}
