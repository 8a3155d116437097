//! ---
//! sky_section: "01-core-functionality"
//! sky_subsection: "binary"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Interactive stdin console for the Skylink daemon."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use skylink_core::{ServerHandle, SimulatorCommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

const HELP: &str = "commands: pause | resume | reset | step | run_for <seconds> | status | \
stream add <addr> <period_seconds> | stream remove <addr> | quit";

/// One parsed console line.
#[derive(Debug, PartialEq)]
pub enum ConsoleInput {
    Command(SimulatorCommand),
    Help,
    Empty,
}

pub fn parse_line(line: &str) -> Result<ConsoleInput> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let command = match words.as_slice() {
        [] => return Ok(ConsoleInput::Empty),
        ["help" | "?"] => return Ok(ConsoleInput::Help),
        ["pause"] => SimulatorCommand::Pause,
        ["resume"] => SimulatorCommand::Resume,
        ["reset"] => SimulatorCommand::Reset,
        ["step"] => SimulatorCommand::Step,
        ["status"] => SimulatorCommand::Status,
        ["quit" | "exit" | "shutdown"] => SimulatorCommand::Shutdown,
        ["run_for" | "run", seconds] => SimulatorCommand::RunFor(
            seconds
                .parse()
                .with_context(|| format!("invalid duration '{seconds}'"))?,
        ),
        ["stream", "add", addr, period] => {
            let seconds: f64 = period
                .parse()
                .with_context(|| format!("invalid period '{period}'"))?;
            let period = Duration::try_from_secs_f64(seconds)
                .map_err(|_| anyhow!("period must be a non-negative number of seconds"))?;
            SimulatorCommand::AddDestination {
                addr: parse_addr(addr)?,
                period,
            }
        }
        ["stream", "remove", addr] => SimulatorCommand::RemoveDestination {
            addr: parse_addr(addr)?,
        },
        _ => bail!("unrecognised command '{}'", line.trim()),
    };
    Ok(ConsoleInput::Command(command))
}

fn parse_addr(addr: &str) -> Result<SocketAddr> {
    addr.parse()
        .with_context(|| format!("invalid socket address '{addr}'"))
}

/// Read commands from stdin until `quit` or end of input.
pub async fn run(handle: ServerHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");
    while let Some(line) = lines.next_line().await? {
        let command = match parse_line(&line) {
            Ok(ConsoleInput::Command(command)) => command,
            Ok(ConsoleInput::Help) => {
                println!("{HELP}");
                continue;
            }
            Ok(ConsoleInput::Empty) => continue,
            Err(err) => {
                println!("error: {err:#}");
                continue;
            }
        };
        let quitting = command == SimulatorCommand::Shutdown;
        debug!(command = command.name(), "console command");
        let reply = handle.send(command).await?;
        println!("{}", serde_json::to_string(&reply)?);
        if quitting {
            return Ok(());
        }
    }
    warn!("console input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(line: &str) -> SimulatorCommand {
        match parse_line(line).expect("parse") {
            ConsoleInput::Command(command) => command,
            other => panic!("expected a command, got {other:?}"),
        }
    }

    #[test]
    fn parses_clock_commands() {
        assert_eq!(command("pause"), SimulatorCommand::Pause);
        assert_eq!(command("  step "), SimulatorCommand::Step);
        assert_eq!(command("run_for 2.5"), SimulatorCommand::RunFor(2.5));
        assert_eq!(command("quit"), SimulatorCommand::Shutdown);
        assert_eq!(parse_line("").expect("empty"), ConsoleInput::Empty);
        assert_eq!(parse_line("help").expect("help"), ConsoleInput::Help);
    }

    #[test]
    fn parses_stream_commands() {
        let addr: SocketAddr = "127.0.0.1:10302".parse().expect("addr");
        assert_eq!(
            command("stream add 127.0.0.1:10302 0.05"),
            SimulatorCommand::AddDestination {
                addr,
                period: Duration::from_millis(50),
            }
        );
        assert_eq!(
            command("stream remove 127.0.0.1:10302"),
            SimulatorCommand::RemoveDestination { addr }
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("run_for soon").is_err());
        assert!(parse_line("stream add nowhere 1").is_err());
        assert!(parse_line("stream add 127.0.0.1:1 -1").is_err());
        assert!(parse_line("fly").is_err());
    }
}
