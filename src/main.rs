mod config;
mod frame;
mod modem;
mod position;
mod predict;
mod scheduler;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::config::{Config, PositionConfig};
use crate::frame::{encode_payload, ArgosFrame};
use crate::modem::{pad_payload, Kim1, ModemError, SysfsGpio, SystemSerial};
use crate::position::{GnssTool, PositionSource, StaticPosition};
use crate::predict::{satellite_name, CommandPredictor};
use crate::scheduler::{Runner, Scheduler, WakeHandle};

#[derive(Parser)]
#[command(name = "argos-beacon")]
#[command(about = "ARGOS beacon uplink scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transmit the beacon position during satellite passes
    Run { config: String },
    /// Validate a configuration file
    Validate { config: String },
    /// Apply the radio settings and print the modem identity
    Configure {
        config: String,
        /// Program a new beacon identifier (5 or 7 hex digits)
        #[arg(long)]
        argos_id: Option<String>,
    },
    /// Encode one position report and print the frame
    Encode {
        #[arg(long)]
        day: u8,
        #[arg(long)]
        hour: u8,
        #[arg(long)]
        minute: u8,
        /// East longitude, degrees [0, 360]
        #[arg(long)]
        longitude: f64,
        #[arg(long, allow_negative_numbers = true)]
        latitude: f64,
        /// Meters
        #[arg(long, default_value_t = 0.0)]
        altitude: f64,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(&config),
        Commands::Validate { config } => validate(&config),
        Commands::Configure { config, argos_id } => configure(&config, argos_id.as_deref()),
        Commands::Encode {
            day,
            hour,
            minute,
            longitude,
            latitude,
            altitude,
        } => encode(day, hour, minute, longitude, latitude, altitude),
    }
}

fn load_config(path: &str) -> Option<Config> {
    match Config::from_file(path) {
        Ok(c) => Some(c),
        Err(e) => {
            eprintln!("Config error: {}", e);
            None
        }
    }
}

fn build_modem(config: &Config) -> Kim1 {
    let gpio = SysfsGpio::new(
        config.gpio.base.clone(),
        config.gpio.power_pin,
        config.gpio.reset_pin,
        config.gpio.settle,
    );
    let serial = SystemSerial::new(config.modem.baud_rate);
    Kim1::new(Box::new(gpio), Box::new(serial)).with_base_timeout(config.modem.base_timeout)
}

fn build_position(config: &Config) -> Box<dyn PositionSource> {
    match &config.position {
        PositionConfig::Gnss {
            program,
            poll_period,
            fix_timeout,
        } => Box::new(GnssTool::new(program.clone(), *poll_period, *fix_timeout)),
        PositionConfig::Static {
            latitude,
            longitude,
            altitude,
        } => Box::new(StaticPosition {
            latitude: *latitude,
            longitude: *longitude,
            altitude: *altitude,
        }),
    }
}

fn validate(path: &str) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    let tx = &config.modem.tx;
    println!("Config is valid");
    println!(
        "  modem: {} @ {} baud, {} mW, band B{}, offset {} kHz",
        config.modem.port, config.modem.baud_rate, tx.power_mw, tx.band, tx.frequency_offset_khz
    );
    println!(
        "  cadence: every {} in a pass, startup lead {}, {} startup attempts",
        humantime::format_duration(config.schedule.tx_interval),
        humantime::format_duration(config.schedule.startup_lead),
        config.schedule.startup_attempts
    );
    println!("  predictor: {}", config.predictor.program.display());

    let table = config.satellite_table();
    let source = if config.satellites.is_empty() {
        "built-in"
    } else {
        "configured"
    };
    println!("  satellites ({} {}):", table.len(), source);
    for sat in &table {
        println!(
            "    {} (0x{:X}) uplink {:?} bulletin {}",
            satellite_name(sat.sat_hex_id),
            sat.sat_hex_id,
            sat.uplink,
            sat.bulletin_epoch
        );
    }
    ExitCode::SUCCESS
}

fn run(path: &str) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    let predictor = CommandPredictor::new(
        config.predictor.program.clone(),
        config.predictor.args.clone(),
    );
    let scheduler = Scheduler::new(
        build_modem(&config),
        build_position(&config),
        Box::new(predictor),
        &config,
    );

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    log::info!("Starting beacon scheduler at {}", chrono::Utc::now());
    let runner = Runner::new(scheduler);
    let result = runtime.block_on(async {
        forward_wake_signal(runner.handle());
        runner.run().await
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Scheduler stopped: {}", e);
            eprintln!("Scheduler stopped: {}. Restart required.", e);
            ExitCode::FAILURE
        }
    }
}

/// SIGUSR1 requests an immediate cycle.
#[cfg(unix)]
fn forward_wake_signal(handle: WakeHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut usr1 = match signal(SignalKind::user_defined1()) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Cannot listen for SIGUSR1: {}", e);
                return;
            }
        };
        while usr1.recv().await.is_some() {
            log::info!("SIGUSR1 received");
            handle.wake();
        }
    });
}

#[cfg(not(unix))]
fn forward_wake_signal(_handle: WakeHandle) {}

fn configure(path: &str, argos_id: Option<&str>) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    let mut kim = build_modem(&config);
    if let Err(e) = kim.open(&config.modem.port) {
        eprintln!("Cannot open modem on {}: {}", config.modem.port, e);
        return ExitCode::FAILURE;
    }

    let result = configure_session(&mut kim, &config, argos_id);
    let closed = kim.close();

    match result.and(closed) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Modem error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn configure_session(
    kim: &mut Kim1,
    config: &Config,
    argos_id: Option<&str>,
) -> Result<(), ModemError> {
    kim.configure(&config.modem.tx)?;
    if let Some(id) = argos_id {
        println!("ID set: {}", kim.set_argos_id(id)?);
    }

    println!("Firmware: {}", kim.firmware_version()?);
    println!("Serial number: {}", kim.serial_number()?);
    println!("Argos ID: {}", kim.argos_id()?);
    println!("Power: {}", kim.power()?);
    println!("Band: {}", kim.band()?);
    println!("Frequency: {}", kim.frequency()?);
    Ok(())
}

fn encode(day: u8, hour: u8, minute: u8, longitude: f64, latitude: f64, altitude: f64) -> ExitCode {
    let payload = match encode_payload(day, hour, minute, longitude, latitude, altitude) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Encode error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let frame = ArgosFrame::new(payload);
    let hex = frame.to_hex();
    println!("Checksum: {:04X}", frame.checksum());
    println!("Frame: {}", hex);
    match pad_payload(&hex) {
        Ok(padded) => println!("AT+TX={}", padded),
        Err(e) => eprintln!("Cannot pad frame: {}", e),
    }
    ExitCode::SUCCESS
}
