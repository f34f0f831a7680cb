//! Tone playback command with an interactive console.

use super::common::{engine_config, load_settings, print_endpoints};
use crate::console::{Command, HELP, parse_command};
use clap::Args;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tonegen_core::ToneParameters;
use tonegen_io::{CpalBackend, ToneEngine};

#[derive(Args)]
pub struct PlayArgs {
    /// Tone frequency in Hz (0 to 24000)
    #[arg(short, long)]
    frequency: Option<f64>,

    /// Volume (0.0 to 1.0)
    #[arg(long)]
    volume: Option<f64>,

    /// Output device: "default", a full or partial name, or "" for none
    #[arg(short, long)]
    device: Option<String>,

    /// Start muted
    #[arg(long)]
    muted: bool,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<f64>,

    /// Do not read commands from stdin
    #[arg(long)]
    no_console: bool,
}

pub fn run(args: PlayArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let mut settings = load_settings(config)?;
    if let Some(frequency) = args.frequency {
        settings.tone.frequency_hz = frequency;
    }
    if let Some(volume) = args.volume {
        settings.tone.volume = volume;
    }
    if let Some(device) = args.device {
        settings.tone.device = device;
    }
    if args.muted {
        settings.tone.muted = true;
    }
    settings.validate()?;

    let duration = match args.duration {
        Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(secs) => anyhow::bail!("invalid duration: {secs}"),
        None => None,
    };

    let params = Arc::new(settings.tone.to_parameters());
    let engine_config = engine_config(&settings.engine);
    let backend = CpalBackend::with_default_poll(engine_config.default_poll);

    println!(
        "Playing {} Hz at volume {:.2}{}",
        params.frequency(),
        params.volume(),
        if params.is_muted() { " (muted)" } else { "" }
    );
    println!("  Device: {}", display_selector(&params.device_selector()));
    if args.no_console {
        println!("\nPress Ctrl+C to stop...\n");
    } else {
        println!("\nType 'help' for commands, Ctrl+C or 'quit' to stop.\n");
    }

    let engine = Arc::new(ToneEngine::start(
        Box::new(backend),
        Arc::clone(&params),
        engine_config,
    )?);

    let (stop_tx, stop_rx) = bounded::<()>(1);
    let ctrlc_tx = stop_tx.clone();
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        let _ = ctrlc_tx.try_send(());
    })?;

    if !args.no_console {
        spawn_console(Arc::clone(&engine), stop_tx)?;
    }

    wait_for_stop(&stop_rx, duration);
    engine.shutdown()?;
    println!("Done!");
    Ok(())
}

fn wait_for_stop(stop: &Receiver<()>, duration: Option<Duration>) {
    match duration {
        Some(duration) => {
            let _ = stop.recv_timeout(duration);
        }
        None => {
            let _ = stop.recv();
        }
    }
}

/// Read commands from stdin on a background thread.
///
/// End of input closes the console but keeps playing; the thread is never
/// joined because it may be blocked in a read when the process exits.
fn spawn_console(engine: Arc<ToneEngine>, stop: Sender<()>) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("tonegen-console".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line) {
                    Ok(Some(Command::Quit)) => {
                        let _ = stop.try_send(());
                        break;
                    }
                    Ok(Some(command)) => apply(&engine, command),
                    Ok(None) => {}
                    Err(message) => println!("{message}"),
                }
            }
            tracing::debug!("console closed");
        })?;
    Ok(())
}

fn apply(engine: &ToneEngine, command: Command) {
    let params = engine.params();
    match command {
        Command::Frequency(hz) => {
            params.set_frequency(hz);
            println!("frequency: {} Hz", params.frequency());
        }
        Command::Volume(volume) => {
            params.set_volume(volume);
            println!("volume: {:.2}", params.volume());
        }
        Command::Mute => {
            params.set_muted(true);
            println!("muted");
        }
        Command::Unmute => {
            params.set_muted(false);
            println!("unmuted");
        }
        Command::Toggle => {
            let muted = params.toggle_muted();
            println!("{}", if muted { "muted" } else { "unmuted" });
        }
        Command::Device(selector) => {
            println!("device: {}", display_selector(&selector));
            params.set_device_selector(selector);
        }
        Command::Status => print_status(engine, params),
        Command::Devices => {
            if let Err(e) = print_endpoints(&CpalBackend::new()) {
                println!("failed to list devices: {e}");
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

fn print_status(engine: &ToneEngine, params: &ToneParameters) {
    let tone = params.snapshot();
    let render = engine.render_status();
    println!(
        "tone:   {} Hz, volume {:.2}{}",
        tone.frequency_hz,
        tone.volume,
        if tone.muted { ", muted" } else { "" }
    );
    println!("device: {}", display_selector(&tone.device_selector));
    println!(
        "state:  {}{}",
        render.state,
        render
            .endpoint
            .map(|name| format!(" on '{name}'"))
            .unwrap_or_default()
    );
    println!(
        "        {} session(s), {} rebuild(s), {} failed lookup(s), {} failed open(s)",
        render.sessions_opened, render.rebuilds, render.resolve_failures, render.open_failures
    );
}

fn display_selector(selector: &str) -> &str {
    if selector.trim().is_empty() {
        "(none)"
    } else {
        selector
    }
}
