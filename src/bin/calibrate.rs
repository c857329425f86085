//! Calibration tool.
//!
//! Sensor mode walks through reference pressures read from stdin, captures
//! a sample batch at each, fits the linear transfer function and saves it.
//! Flow mode (--flow) runs the deflation flow-rate survey and writes the
//! samples as CSV, plus a suggested linear outflow model.

use anyhow::{bail, Context};
use auto_compressor::core::calibration::{fit_line, write_flow_samples, CalibrationSample};
use auto_compressor::core::{gas, ConfigProvider};
use auto_compressor::hardware::sim::{SimOptions, SimulatedTyre};
use auto_compressor::utils::{logger, validation::Validate};
use auto_compressor::{
    Adc, Calibration, CalibrationStore, Compressor, Gpio, LocalStorage, TomlConfig,
};
use clap::Parser;
use std::io::{BufRead, Write};
use std::time::Duration;

const SAMPLE_DURATION: Duration = Duration::from_secs(3);
const SAMPLE_COUNT: usize = 30;

#[derive(Debug, Parser)]
#[command(name = "calibrate")]
#[command(about = "Sensor and flow-rate calibration for the auto-compressor")]
struct CalibrateArgs {
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[arg(long, default_value = "calibrationData")]
    out_dir: String,

    #[arg(long, help = "Run against the simulated rig instead of hardware")]
    simulate: bool,

    #[arg(long, default_value = "20.0")]
    sim_pressure: f64,

    #[arg(long, help = "Enable verbose output")]
    verbose: bool,

    #[arg(long, help = "Survey the bleed valve flow rate instead")]
    flow: bool,

    #[arg(long, default_value = "40.0")]
    flow_start: f64,

    #[arg(long, default_value = "20.0")]
    flow_end: f64,

    #[arg(long, default_value = "5.0", help = "Deflation step in seconds")]
    flow_interval: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CalibrateArgs::parse();

    let config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config))?;
    config.validate().context("invalid configuration")?;
    logger::init_cli_logger(args.verbose, config.log_level());

    if args.simulate {
        let rig = SimulatedTyre::new(
            args.sim_pressure,
            config.calibration(),
            config.relay_layout(),
            SimOptions {
                flow_in_lps: config.compressor.flow_rate_in,
                flow_out_m: config.compressor.flow_rate_out_m,
                flow_out_c: config.compressor.flow_rate_out_c,
                temperature_c: config.compressor.temperature,
                ..SimOptions::default()
            },
        );
        run(&args, &config, rig.adc(), rig.gpio()).await
    } else {
        run_hardware(&args, &config).await
    }
}

#[cfg(feature = "hardware")]
async fn run_hardware(args: &CalibrateArgs, config: &TomlConfig) -> anyhow::Result<()> {
    use auto_compressor::hardware::rpi::{Mcp3008, PiGpio};

    let adc = Mcp3008::new(config.sensor.channel)?;
    let gpio = PiGpio::new()?;
    run(args, config, adc, gpio).await
}

#[cfg(not(feature = "hardware"))]
async fn run_hardware(_args: &CalibrateArgs, _config: &TomlConfig) -> anyhow::Result<()> {
    bail!("built without the 'hardware' feature; re-run with --simulate");
}

async fn run<A: Adc, G: Gpio>(
    args: &CalibrateArgs,
    config: &TomlConfig,
    adc: A,
    gpio: G,
) -> anyhow::Result<()> {
    if args.flow {
        calibrate_flow(args, config, adc, gpio).await
    } else {
        calibrate_sensor(args, config, adc).await
    }
}

async fn calibrate_sensor<A: Adc>(
    args: &CalibrateArgs,
    config: &TomlConfig,
    mut adc: A,
) -> anyhow::Result<()> {
    let units = config.sensor.units.clone();
    let storage = LocalStorage::new(args.out_dir.clone());
    let store = CalibrationStore::new(storage.clone());

    println!("Starting calibration ({} readings per point)...", SAMPLE_COUNT);

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    let mut readings = Vec::new();
    let mut pressures = Vec::new();

    loop {
        print!("Next reference pressure in {} (or 'stop'): ", units);
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?.trim().to_string();
        if line.eq_ignore_ascii_case("stop") {
            println!("No more readings to be taken");
            break;
        }

        let pressure: f64 = match line.parse() {
            Ok(value) => value,
            Err(_) => {
                println!("{} is not a number. Try again...", line);
                continue;
            }
        };

        let label = format!("{}{}", pressure, units);
        println!("Set air pressure to {}. Press enter once ready to read.", label);
        if lines.next().is_none() {
            break;
        }

        let sample = CalibrationSample::capture(&label, &mut adc, SAMPLE_DURATION, SAMPLE_COUNT)
            .await
            .context("sample capture failed")?;
        println!("Average raw reading was {:.4} (std dev {:.4})", sample.avg, sample.std_dev);
        sample
            .save(&storage, &format!("{}_data.json", label))
            .await
            .context("failed to save sample batch")?;

        readings.push(sample.avg);
        pressures.push(pressure);
    }

    if readings.len() < 2 {
        bail!("need at least two calibration points, got {}", readings.len());
    }

    println!(
        "Calculating linear equation from\n\tx: {:?}\n\ty: {:?}",
        readings, pressures
    );
    let (m, c) = fit_line(&readings, &pressures)?;

    let calibration = Calibration { m, c, units };
    println!("Calculated {}", calibration.equation());
    store.save("calibration.json", &calibration).await?;
    println!(
        "Saved to {}/calibration.json; copy m and c into [sensor] of {}",
        args.out_dir, args.config
    );

    Ok(())
}

async fn calibrate_flow<A: Adc, G: Gpio>(
    args: &CalibrateArgs,
    config: &TomlConfig,
    adc: A,
    gpio: G,
) -> anyhow::Result<()> {
    if args.flow_start <= args.flow_end {
        bail!(
            "--flow-start ({}) must be above --flow-end ({})",
            args.flow_start,
            args.flow_end
        );
    }

    let mut compressor = Compressor::from_config(adc, gpio, config)?;
    let samples = compressor
        .calibrate_flow_rate(
            args.flow_start,
            args.flow_end,
            Duration::from_secs_f64(args.flow_interval),
        )
        .await?;
    compressor.shutdown()?;

    if samples.is_empty() {
        bail!("the survey produced no samples; is the system already below --flow-end?");
    }

    std::fs::create_dir_all(&args.out_dir)?;
    let csv_path = format!("{}/flow_rate.csv", args.out_dir);
    let file = std::fs::File::create(&csv_path)?;
    write_flow_samples(file, &samples)?;
    println!("Wrote {} samples to {}", samples.len(), csv_path);

    // Fit the linear outflow model the controller consumes:
    // outflow(L/s) = -(m * p + c), with the observed mol/s mapped back to L/s.
    let pressures: Vec<f64> = samples.iter().map(|s| s.pressure_pa).collect();
    let outflows_lps: Vec<f64> = samples
        .iter()
        .map(|s| -(s.flow_rate_mols / gas::MOLES_PER_M3))
        .collect();
    let (m, c) = fit_line(&pressures, &outflows_lps)?;
    println!(
        "Suggested [compressor] values: flow_rate_out_m = {:e}, flow_rate_out_c = {:.4}",
        m, c
    );

    Ok(())
}
