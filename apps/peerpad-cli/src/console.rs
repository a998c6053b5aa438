//! Line commands read from stdin.

use std::path::PathBuf;

use peerpad_netplay::InputSampler;
use peerpad_netproto::{Button, ControllerSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Load(PathBuf),
    Platform(String),
    Volume(f32),
    Restart,
    Save,
    Restore,
    /// Guest: replace the held button set.
    Hold(ControllerSnapshot),
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  load <path>       load a ROM (host)
  platform <id>     switch platform
  volume <0..1>     set output volume
  restart | save | restore
  hold <buttons..>  hold buttons, e.g. `hold a left` (guest)
  release           release every button (guest)
  quit";

/// Parse one line. Held buttons go through the local key table so the guest
/// console behaves like a keyboard.
pub fn parse(line: &str, sampler: &InputSampler) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".into());
    };
    let rest: Vec<&str> = words.collect();

    match (verb, rest.as_slice()) {
        ("load", [path]) => Ok(ConsoleCommand::Load(PathBuf::from(path))),
        ("platform", [id]) => Ok(ConsoleCommand::Platform((*id).to_string())),
        ("volume", [v]) => v
            .parse()
            .map(ConsoleCommand::Volume)
            .map_err(|_| format!("not a number: {v}")),
        ("restart", []) => Ok(ConsoleCommand::Restart),
        ("save", []) => Ok(ConsoleCommand::Save),
        ("restore", []) => Ok(ConsoleCommand::Restore),
        ("hold", names) => {
            let map = sampler.key_map();
            let codes = names
                .iter()
                .map(|name| {
                    name.to_ascii_lowercase()
                        .parse::<Button>()
                        .map(|b| map.identity(b).code)
                        .map_err(|_| format!("unknown button: {name}"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ConsoleCommand::Hold(sampler.sample(codes)))
        }
        ("release", []) => Ok(ConsoleCommand::Hold(ControllerSnapshot::default())),
        ("help", _) => Ok(ConsoleCommand::Help),
        ("quit" | "exit", []) => Ok(ConsoleCommand::Quit),
        _ => Err(format!("unrecognized command: {line}")),
    }
}
