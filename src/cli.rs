use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;

use crate::{config::Config, error::Error, serial::serial_port};

/// The command line interface for the gauge hub driver.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a configuration file
    pub config: Option<PathBuf>,

    /// Which hub of the configuration to control
    #[arg(long, default_value_t = 1)]
    pub index: u32,

    /// Talk to a simulated hub instead of a serial port
    #[arg(long)]
    pub simulate: bool,

    /// Log level on the console
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Also log to daily rotated files in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Commands available in the command line interface.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Examples for user convenience.
    #[clap(subcommand)]
    Examples(Examples),

    /// List the serial ports on this machine.
    Ports,
}

/// Helpful examples for users.
#[derive(Subcommand, Debug, Clone)]
pub enum Examples {
    /// Show an example of a configuration file's contents.
    Config,
}

/// Run a subcommand to completion.
pub fn handle_command(command: Commands) -> Result<(), Error> {
    match command {
        Commands::Examples(Examples::Config) => {
            println!("{}", Config::example().serialize_pretty()?);
        }
        Commands::Ports => {
            let ports = serial_port::available_ports()?;

            if ports.is_empty() {
                println!("No serial ports found");
            }

            for port in ports {
                println!("{port}");
            }
        }
    }

    Ok(())
}
