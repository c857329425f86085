use auto_compressor::core::ConfigProvider;
use auto_compressor::hardware::sim::{SimOptions, SimulatedTyre};
use auto_compressor::utils::{logger, validation::Validate};
use auto_compressor::{
    Adc, CliConfig, Compressor, ControlEngine, Gpio, Result, TargetReport, TomlConfig,
};
use clap::Parser;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // Config comes first so the logger can honor the [logging] section.
    let config = match TomlConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            report_failure(&e);
            std::process::exit(exit_code(&e));
        }
    };
    if let Err(e) = config.validate() {
        report_failure(&e);
        std::process::exit(exit_code(&e));
    }

    if config.log_stdout() {
        logger::init_cli_logger(cli.verbose, config.log_level());
    } else {
        logger::init_service_logger(config.log_level());
    }

    tracing::info!("Starting auto-compressor");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = cli.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }
    let Some(target) = cli.target else {
        // validate() has already rejected a missing target.
        std::process::exit(1);
    };

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let result = if cli.simulate {
        run_simulated(&cli, &config, target).await
    } else {
        run_hardware(&cli, &config, target).await
    };

    match result {
        Ok(report) => {
            tracing::info!("✅ Target pressure reached");
            println!(
                "✅ Reached {:.2}{} (target {}{}) in {} rounds",
                report.final_pressure,
                config.sensor.units,
                report.target,
                config.sensor.units,
                report.rounds
            );
        }
        Err(e) => {
            tracing::error!(
                "❌ Pressure control failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let code = exit_code(&e);
            if code > 0 {
                std::process::exit(code);
            }
        }
    }

    Ok(())
}

async fn run_simulated(cli: &CliConfig, config: &TomlConfig, target: f64) -> Result<TargetReport> {
    tracing::info!(
        "Running against the simulated rig from {}{}",
        cli.sim_pressure,
        config.sensor.units
    );

    let rig = SimulatedTyre::new(
        cli.sim_pressure,
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

    run_rig(rig.adc(), rig.gpio(), config, target, cli.monitor).await
}

#[cfg(feature = "hardware")]
async fn run_hardware(cli: &CliConfig, config: &TomlConfig, target: f64) -> Result<TargetReport> {
    use auto_compressor::hardware::rpi::{Mcp3008, PiGpio};

    let adc = Mcp3008::new(config.sensor.channel)?;
    let gpio = PiGpio::new()?;
    run_rig(adc, gpio, config, target, cli.monitor).await
}

#[cfg(not(feature = "hardware"))]
async fn run_hardware(_cli: &CliConfig, _config: &TomlConfig, _target: f64) -> Result<TargetReport> {
    Err(auto_compressor::CompressorError::HardwareError {
        message: "built without the 'hardware' feature; re-run with --simulate".to_string(),
    })
}

async fn run_rig<A: Adc, G: Gpio>(
    adc: A,
    gpio: G,
    config: &TomlConfig,
    target: f64,
    monitor: bool,
) -> Result<TargetReport> {
    let compressor = Compressor::from_config(adc, gpio, config)?;
    let mut engine = ControlEngine::new_with_monitoring(compressor, monitor);

    let outcome = tokio::select! {
        run = engine.run(target) => Some(run),
        _ = tokio::signal::ctrl_c() => None,
    };

    // Whatever happened, leave the pump and bleed valve closed.
    engine.controller_mut().shutdown()?;

    match outcome {
        Some(run) => run,
        None => {
            tracing::info!("Interrupted, valves closed");
            std::process::exit(0);
        }
    }
}

// The logger is not up yet when the config fails to load.
fn report_failure(e: &auto_compressor::CompressorError) {
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
}

fn exit_code(e: &auto_compressor::CompressorError) -> i32 {
    match e.severity() {
        auto_compressor::utils::error::ErrorSeverity::Low => 0,
        auto_compressor::utils::error::ErrorSeverity::Medium => 2,
        auto_compressor::utils::error::ErrorSeverity::High => 1,
        auto_compressor::utils::error::ErrorSeverity::Critical => 3,
    }
}
