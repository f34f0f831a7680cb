//! Line commands accepted by `tonegen play` on stdin.

/// One parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Set the tone frequency in Hz.
    Frequency(f64),
    /// Set the volume, `0.0..=1.0`.
    Volume(f64),
    /// Silence the output.
    Mute,
    /// Resume the tone.
    Unmute,
    /// Flip mute.
    Toggle,
    /// Switch device selector; empty means no device.
    Device(String),
    /// Print parameters and render state.
    Status,
    /// List output devices.
    Devices,
    /// Print the command list.
    Help,
    /// Stop playback and exit.
    Quit,
}

pub const HELP: &str = "\
Commands:
  freq <hz>        set frequency (f)
  vol <0..1>       set volume (v)
  mute | unmute    silence or resume the tone
  toggle           flip mute (m)
  device [name]    switch device; 'default' follows the system, empty idles (d)
  status           show parameters and device state (s)
  devices          list output devices
  help             show this list (h, ?)
  quit             stop and exit (q, exit)";

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "freq" | "frequency" | "f" => Command::Frequency(parse_number(rest, "frequency")?),
        "vol" | "volume" | "v" => Command::Volume(parse_number(rest, "volume")?),
        "mute" => Command::Mute,
        "unmute" => Command::Unmute,
        "toggle" | "m" => Command::Toggle,
        "device" | "d" => Command::Device(rest.to_string()),
        "status" | "s" => Command::Status,
        "devices" => Command::Devices,
        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };
    Ok(Some(command))
}

fn parse_number(text: &str, what: &str) -> Result<f64, String> {
    if text.is_empty() {
        return Err(format!("missing {what} value"));
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("invalid {what} '{text}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_commands() {
        assert_eq!(
            parse_command("freq 440").unwrap(),
            Some(Command::Frequency(440.0))
        );
        assert_eq!(
            parse_command("  V 0.25 ").unwrap(),
            Some(Command::Volume(0.25))
        );
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(parse_command("freq").is_err());
        assert!(parse_command("vol loud").is_err());
        assert!(parse_command("freq NaN").is_err());
    }

    #[test]
    fn device_keeps_full_name() {
        assert_eq!(
            parse_command("device Speakers (USB Audio)").unwrap(),
            Some(Command::Device("Speakers (USB Audio)".into()))
        );
        assert_eq!(
            parse_command("device").unwrap(),
            Some(Command::Device(String::new()))
        );
    }

    #[test]
    fn simple_commands_and_aliases() {
        assert_eq!(parse_command("mute").unwrap(), Some(Command::Mute));
        assert_eq!(parse_command("m").unwrap(), Some(Command::Toggle));
        assert_eq!(parse_command("exit").unwrap(), Some(Command::Quit));
        assert_eq!(parse_command("?").unwrap(), Some(Command::Help));
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn unknown_command_is_error() {
        let err = parse_command("louder").unwrap_err();
        assert!(err.contains("louder"));
    }
}
