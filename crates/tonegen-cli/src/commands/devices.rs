//! Output device listing command.

use super::common::print_endpoints;
use clap::Args;
use tonegen_io::CpalBackend;

#[derive(Args)]
pub struct DevicesArgs {}

pub fn run(_args: DevicesArgs) -> anyhow::Result<()> {
    let backend = CpalBackend::new();
    print_endpoints(&backend)?;
    println!();
    println!("Tip: pass a full or partial name with --device:");
    println!("  tonegen play --device \"USB\"");
    Ok(())
}
