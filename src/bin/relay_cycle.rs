//! Relay exerciser: toggles the inlet and outlet channels alternately
//! until Ctrl-C, then drives everything to off. Useful for checking the
//! wiring and off-levels before trusting the control loop with a tyre.

use anyhow::Context;
use auto_compressor::core::relays::{RelayBank, INLET, OUTLET};
use auto_compressor::core::ConfigProvider;
use auto_compressor::hardware::sim::{SimOptions, SimulatedTyre};
use auto_compressor::utils::{logger, validation::Validate};
use auto_compressor::{Gpio, TomlConfig};
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "relay-cycle")]
#[command(about = "Toggle the relay channels alternately until interrupted")]
struct RelayCycleArgs {
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[arg(long, help = "Run against the simulated rig instead of hardware")]
    simulate: bool,

    #[arg(long, default_value = "0.8", help = "Seconds to hold each relay on")]
    on_secs: f64,

    #[arg(long, default_value = "2.0", help = "Seconds between toggles")]
    pause_secs: f64,

    #[arg(long, help = "Enable verbose output")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = RelayCycleArgs::parse();

    let config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config))?;
    config.validate().context("invalid configuration")?;
    logger::init_cli_logger(args.verbose, config.log_level());

    if args.simulate {
        let rig = SimulatedTyre::new(
            20.0,
            config.calibration(),
            config.relay_layout(),
            SimOptions::default(),
        );
        cycle(&args, &config, rig.gpio()).await
    } else {
        cycle_hardware(&args, &config).await
    }
}

#[cfg(feature = "hardware")]
async fn cycle_hardware(args: &RelayCycleArgs, config: &TomlConfig) -> anyhow::Result<()> {
    use auto_compressor::hardware::rpi::PiGpio;

    cycle(args, config, PiGpio::new()?).await
}

#[cfg(not(feature = "hardware"))]
async fn cycle_hardware(_args: &RelayCycleArgs, _config: &TomlConfig) -> anyhow::Result<()> {
    anyhow::bail!("built without the 'hardware' feature; re-run with --simulate");
}

async fn cycle<G: Gpio>(args: &RelayCycleArgs, config: &TomlConfig, gpio: G) -> anyhow::Result<()> {
    let mut bank = RelayBank::from_layout(gpio, &config.relay_layout())?;
    let on_time = Duration::from_secs_f64(args.on_secs.max(0.0));
    let pause = Duration::from_secs_f64(args.pause_secs.max(0.0));

    let channels = [INLET, OUTLET];
    let mut index = 0;
    loop {
        let name = channels[index % channels.len()];
        index += 1;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            result = toggle(&mut bank, name, on_time, pause) => result?,
        }
    }

    tracing::info!("Setting all relays to off");
    bank.all_off()?;
    Ok(())
}

async fn toggle<G: Gpio>(
    bank: &mut RelayBank<G>,
    name: &str,
    on_time: Duration,
    pause: Duration,
) -> anyhow::Result<()> {
    tracing::info!("Toggling relay '{}'", name);
    bank.set_on(name)?;
    tokio::time::sleep(on_time).await;
    bank.set_off(name)?;
    tokio::time::sleep(pause).await;
    Ok(())
}
