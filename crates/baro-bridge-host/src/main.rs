//! Desktop host for a BMP180 behind the serial I2C bridge.
//!
//! Opens the serial port, resynchronises the bridge, waits for the attached
//! device to announce itself and then prints temperature and pressure until
//! interrupted with Ctrl+C.
//!
//! Configuration is layered (defaults, TOML file, environment, CLI); see
//! [`config`] for the keys.

mod config;
mod delay;
mod serial;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::Parser;
use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use baro_bridge_core::{
    Bmp180, BridgeError, CancellationToken, Encoding, FrameCodec, I2cBridge, KnownDevice, Monitor,
    Reading, Transport, TransportError,
};

use crate::config::{CliOverrides, Config, find_config_file};
use crate::delay::StdDelay;
use crate::serial::SerialTransport;

/// Read a BMP180 through the serial I2C bridge
#[derive(Parser, Debug)]
#[command(name = "baro-bridge", version, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port (e.g. /dev/ttyUSB0 or COM3)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate (default: 9600)
    #[arg(short, long)]
    baud: Option<u32>,

    /// Wire encoding spoken by the bridge firmware: "text" or "binary"
    #[arg(short, long, value_parser = parse_encoding)]
    encoding: Option<Encoding>,

    /// Pressure oversampling level, 0..=3
    #[arg(short, long)]
    oversampling: Option<u8>,

    /// List available serial ports and exit
    #[arg(long, default_value_t = false)]
    list_ports: bool,

    /// Enable verbose logging (wire frames included)
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            port: self.port.clone(),
            baud_rate: self.baud,
            encoding: self.encoding,
            oversampling: self.oversampling,
        }
    }
}

fn parse_encoding(value: &str) -> Result<Encoding, String> {
    value.parse().map_err(|e| format!("{e}"))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    if args.list_ports {
        list_ports();
        return Ok(());
    }

    let config = load_config(&args)?;
    let port_name = config.resolve_port(&available_port_names())?;

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        info!("Shutdown signal received...");
        handler_token.cancel();
    })?;

    info!(
        "Opening {port_name} at {} baud ({} encoding)",
        config.serial.baud_rate,
        config.bridge.encoding.label()
    );
    let transport = SerialTransport::open(&port_name, config.serial.baud_rate, config.timeout())
        .with_context(|| format!("Failed to open serial port {port_name}"))?;

    let mut bridge = I2cBridge::new(
        transport,
        config.bridge.encoding.codec(),
        StdDelay,
        config.timeout(),
    )
    .map_err(|e| anyhow!("Failed to set up bridge: {e}"))?;

    clear_buffer(&mut bridge, config.bridge.clear_attempts);

    info!("Awaiting I2C device connection...");
    let Some(address) = await_device(&mut bridge, &config, &token)? else {
        info!("Cancelled before a device was detected");
        return Ok(());
    };

    let device = KnownDevice::from_address(address)
        .ok_or_else(|| anyhow!("Unknown device at address {address:#04x}"))?;
    info!("Detected {} at {address:#04x}", device.name());

    match device {
        KnownDevice::Bmp180 => run_bmp180(bridge, &config, &token)?,
    }

    info!("Shutdown complete");
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let env = |key: &str| env::var(key).ok();

    let path = find_config_file(args.config.as_deref(), env)?;
    let mut config = Config::load(path.as_deref())?;
    config.apply_environment_overrides(env)?;
    config.apply_cli_overrides(&args.overrides());
    config.validate()?;

    debug!("Effective configuration: {config:?}");
    Ok(config)
}

/// Resynchronise the bridge, tolerating a missing acknowledgement.
fn clear_buffer<T, D, C>(bridge: &mut I2cBridge<T, D, C>, attempts: u32)
where
    T: Transport,
    D: DelayNs,
    C: FrameCodec,
{
    for attempt in 1..=attempts {
        match bridge.clear_buffer() {
            Ok(()) => {
                debug!("Bridge buffer cleared (attempt {attempt})");
                return;
            }
            Err(e) => warn!("Buffer clear attempt {attempt}/{attempts} failed: {e}"),
        }
    }
    warn!("Continuing without a buffer clear acknowledgement");
}

/// Block until the bridge reports a device or `token` is cancelled.
fn await_device<T, D, C>(
    bridge: &mut I2cBridge<T, D, C>,
    config: &Config,
    token: &CancellationToken,
) -> anyhow::Result<Option<u8>>
where
    T: Transport,
    D: DelayNs,
    C: FrameCodec,
{
    let mut delay = StdDelay;

    while !token.is_cancelled() {
        match bridge.detect_device_presence() {
            Ok(Some(address)) => return Ok(Some(address)),
            Ok(None) => {
                debug!("No device attached yet");
                delay.delay_ms(millis(config.retry_interval()));
            }
            Err(BridgeError::Transport(TransportError::Timeout)) => {
                debug!("No presence report before timeout");
            }
            Err(e) => {
                error!("Presence detection failed: {e}");
                return Err(anyhow!("Presence detection failed: {e}"));
            }
        }
    }
    Ok(None)
}

fn run_bmp180<T, C>(
    bridge: I2cBridge<T, StdDelay, C>,
    config: &Config,
    token: &CancellationToken,
) -> anyhow::Result<()>
where
    T: Transport,
    C: FrameCodec,
{
    println!("BMP180!");

    let monitor = Monitor::new(config.monitor_settings()?);
    let mut sensor = Bmp180::new(bridge, StdDelay);

    let readings = monitor.run(&mut sensor, &mut StdDelay, token, print_reading);
    debug!("{readings} readings taken");
    Ok(())
}

fn print_reading(reading: Reading) {
    println!("Temperature = {:.3}°C", reading.temperature);
    if let Some(pressure) = reading.pressure {
        println!("Pressure    = {pressure:.3} milliBar");
    }
}

fn available_port_names() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|port| port.port_name).collect(),
        Err(e) => {
            warn!("Could not enumerate serial ports: {e}");
            Vec::new()
        }
    }
}

fn list_ports() {
    println!("Available serial ports:");
    match serialport::available_ports() {
        Ok(ports) => {
            if ports.is_empty() {
                println!("  (none)");
            }
            for port in ports {
                print!("  {}", port.port_name);
                match &port.port_type {
                    serialport::SerialPortType::UsbPort(info) => {
                        println!(" - USB (VID: 0x{:04x}, PID: 0x{:04x})", info.vid, info.pid);
                        if let Some(product) = &info.product {
                            println!("      Product: {product}");
                        }
                    }
                    serialport::SerialPortType::BluetoothPort => println!(" - Bluetooth"),
                    serialport::SerialPortType::PciPort => println!(" - PCI"),
                    serialport::SerialPortType::Unknown => println!(" - Unknown"),
                }
            }
        }
        Err(e) => eprintln!("Error listing ports: {e}"),
    }
}

fn millis(duration: std::time::Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}
