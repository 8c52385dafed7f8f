//! Line commands for the interactive binary

use crate::error::{Error, Result};
use std::str::FromStr;
use ytmp_common::{RepeatMode, TrackId};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play(TrackId),
    Toggle,
    /// Fraction of the track, 0.0..=1.0
    Seek(f64),
    Repeat(RepeatMode),
    Shuffle,
    Volume(f64),
    Width(u32),
    Status,
    Quit,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| Error::InvalidInput("empty command".to_string()))?
            .to_ascii_lowercase();
        let arg = parts.next();

        let missing = |what: &str| Error::InvalidInput(format!("{} requires {}", verb, what));

        let command = match verb.as_str() {
            "play" => Command::Play(TrackId::new(arg.ok_or_else(|| missing("a track id"))?)),
            "toggle" | "p" => Command::Toggle,
            "seek" => {
                let raw = arg.ok_or_else(|| missing("a position"))?;
                let fraction: f64 = raw
                    .parse()
                    .map_err(|_| Error::InvalidInput(format!("bad seek position '{}'", raw)))?;
                if !(0.0..=1.0).contains(&fraction) {
                    return Err(Error::InvalidInput(format!(
                        "seek position must be 0..1, got {}",
                        fraction
                    )));
                }
                Command::Seek(fraction)
            }
            "repeat" => Command::Repeat(arg.ok_or_else(|| missing("off|all|single"))?.parse()?),
            "shuffle" => Command::Shuffle,
            "volume" => {
                let raw = arg.ok_or_else(|| missing("a multiplier"))?;
                Command::Volume(
                    raw.parse()
                        .map_err(|_| Error::InvalidInput(format!("bad volume '{}'", raw)))?,
                )
            }
            "width" => {
                let raw = arg.ok_or_else(|| missing("a pixel width"))?;
                Command::Width(
                    raw.parse()
                        .map_err(|_| Error::InvalidInput(format!("bad width '{}'", raw)))?,
                )
            }
            "status" | "s" => Command::Status,
            "quit" | "q" | "exit" => Command::Quit,
            other => return Err(Error::InvalidInput(format!("unknown command '{}'", other))),
        };

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("play abc".parse::<Command>().unwrap(), Command::Play(TrackId::new("abc")));
        assert_eq!("toggle".parse::<Command>().unwrap(), Command::Toggle);
        assert_eq!("  SEEK 0.5 ".parse::<Command>().unwrap(), Command::Seek(0.5));
        assert_eq!(
            "repeat single".parse::<Command>().unwrap(),
            Command::Repeat(RepeatMode::Single)
        );
        assert_eq!("volume 0.8".parse::<Command>().unwrap(), Command::Volume(0.8));
        assert_eq!("width 320".parse::<Command>().unwrap(), Command::Width(320));
        assert_eq!("q".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_errors() {
        for line in ["", "play", "seek", "seek 1.5", "seek abc", "repeat sometimes", "width -3", "dance"] {
            assert!(line.parse::<Command>().is_err(), "accepted '{}'", line);
        }
    }
}
