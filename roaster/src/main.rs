//! Beast roaster control.
//!
//! One invocation, one command: the record in `roaster.json` remembers the
//! last heat/fan setting so the tool can be re-run to query or change it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use roaster::command::{CommandOutcome, RoasterCommand, execute};
use roaster::controller::Controller;
use roaster::error::CommandError;
use roaster::exit_codes;
use roaster::io::actuator::{Actuator, ReadOnly, open_actuator};
use roaster::io::config::{DEFAULT_CONFIG_FILE, load_config};
use roaster::io::state_store::FileStateStore;
use roaster::logging;

#[derive(Parser)]
#[command(
    name = "roaster",
    version,
    about = "--- B E A S T  Roaster Control ---"
)]
struct Cli {
    /// Configuration file (TOML). A missing file means built-in defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Roaster record location; overrides `state_path` from the config.
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the status of the roaster (fan and heat).
    #[command(name = "get_status", visible_alias = "status")]
    GetStatus {
        /// Print the full record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Change fan level, values allowed are in [0-15].
    #[command(name = "set_fan")]
    SetFan {
        #[arg(allow_negative_numbers = true)]
        level: i64,
    },
    /// Change heat level, values allowed are in [0-100].
    #[command(name = "set_heat")]
    SetHeat {
        #[arg(allow_negative_numbers = true)]
        level: i64,
    },
    /// Set the fan, then the heat.
    Preheat {
        #[arg(allow_negative_numbers = true)]
        heat: i64,
        #[arg(allow_negative_numbers = true)]
        fan: i64,
    },
    /// Stop the heat and set the fan to maximum.
    Cool,
    /// Stop fan and heat and release the outputs.
    Stop,
}

impl Command {
    fn to_roaster_command(&self) -> RoasterCommand {
        match self {
            Command::GetStatus { .. } => RoasterCommand::Status,
            Command::SetFan { level } => RoasterCommand::SetFan(*level),
            Command::SetHeat { level } => RoasterCommand::SetHeat(*level),
            Command::Preheat { heat, fan } => RoasterCommand::Preheat {
                heat: *heat,
                fan: *fan,
            },
            Command::Cool => RoasterCommand::Cool,
            Command::Stop => RoasterCommand::Stop,
        }
    }
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(()) => exit_codes::OK,
        Err(err) => report(&err),
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<()> {
    let cfg = load_config(&cli.config)?;
    let state_path = match &cli.state {
        Some(path) => path.clone(),
        None => cfg.resolved_state_path(cli.config.parent().unwrap_or(Path::new(""))),
    };
    let command = cli.command.to_roaster_command();

    // Hardware is opened before the record is touched so a missing driver
    // fails the command instead of leaving a saved but unapplied state.
    let mut actuator: Box<dyn Actuator> = if command.mutates() {
        open_actuator(&cfg).context("open roaster outputs")?
    } else {
        Box::new(ReadOnly)
    };
    let store = FileStateStore::open(&state_path)
        .with_context(|| format!("open roaster record {}", state_path.display()))?;
    let mut controller = Controller::from_config(store, &cfg);

    announce(command);
    let outcome = execute(command, &mut controller, actuator.as_mut())?;
    print_outcome(&cli.command, &outcome)
}

fn announce(command: RoasterCommand) {
    match command {
        RoasterCommand::SetFan(level) => println!("New fan level {}", level),
        RoasterCommand::SetHeat(level) => println!("New heat level {}", level),
        RoasterCommand::Preheat { heat, fan } => {
            println!("Preheating: fan level {} then heat level {}", fan, heat);
        }
        RoasterCommand::Cool => println!("Cranking up fan to cool"),
        RoasterCommand::Stop => println!("Stopping the roaster"),
        RoasterCommand::Status => {}
    }
}

fn print_outcome(command: &Command, outcome: &CommandOutcome) -> Result<()> {
    if let Command::GetStatus { json: true } = command {
        let payload =
            serde_json::to_string_pretty(&outcome.state).context("serialize roaster record")?;
        println!("{}", payload);
        return Ok(());
    }
    println!(
        "Fan level:{} Heat level:{}",
        outcome.state.fan_level, outcome.state.heat_level
    );
    Ok(())
}

fn report(err: &anyhow::Error) -> i32 {
    eprintln!("{:#}", err);
    match err.downcast_ref::<CommandError>() {
        Some(CommandError::Control(control)) if control.is_rejection() => exit_codes::REJECTED,
        Some(CommandError::Diverged { state, .. }) => {
            eprintln!(
                "warning: roaster outputs may not match the recorded state (fan {}, heat {}); check the hardware",
                state.fan_level, state.heat_level
            );
            exit_codes::DIVERGED
        }
        _ => exit_codes::FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_get_status_and_alias() {
        let cli = Cli::parse_from(["roaster", "get_status"]);
        assert!(matches!(cli.command, Command::GetStatus { json: false }));
        let cli = Cli::parse_from(["roaster", "status", "--json"]);
        assert!(matches!(cli.command, Command::GetStatus { json: true }));
    }

    #[test]
    fn parse_negative_level_reaches_controller() {
        let cli = Cli::parse_from(["roaster", "set_fan", "-1"]);
        assert_eq!(cli.command.to_roaster_command(), RoasterCommand::SetFan(-1));
    }

    #[test]
    fn parse_preheat_orders_heat_then_fan() {
        let cli = Cli::parse_from(["roaster", "preheat", "100", "1"]);
        assert_eq!(
            cli.command.to_roaster_command(),
            RoasterCommand::Preheat { heat: 100, fan: 1 }
        );
    }

    #[test]
    fn parse_global_paths_after_subcommand() {
        let cli = Cli::parse_from(["roaster", "cool", "--config", "/etc/roaster.toml"]);
        assert_eq!(cli.config, PathBuf::from("/etc/roaster.toml"));
        assert!(cli.state.is_none());
    }

    #[test]
    fn unknown_command_is_a_usage_error() {
        let err = Cli::try_parse_from(["roaster", "explode"])
            .err()
            .expect("unknown command must fail");
        assert_eq!(err.exit_code(), exit_codes::USAGE);
    }
}
