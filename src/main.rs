#![deny(clippy::unwrap_used)]

use clap::{arg, command, value_parser};
use log::LevelFilter;
use std::io::ErrorKind;
use std::process::exit;
use std::{path::PathBuf, time::Duration};

use tp8236ctrl::device::list_ports;
use tp8236ctrl::proto::{self, conv::pretty_ts, Result};
use tp8236ctrl::{
    Device, Measurement, Sampler, SamplerConfig, DEFAULT_BAUDRATE, DEFAULT_CAPACITY,
    DEFAULT_INTERVAL, DEFAULT_TIMEOUT, DEFAULT_TTY,
};

#[tokio::main]
async fn main() {
    let matches = command!() // requires `cargo` feature
        .arg(
            arg!(
                -p --device <PORT> "Port for USB adapter"
            )
            .default_value(DEFAULT_TTY)
            .required(false)
            .value_parser(value_parser!(PathBuf)),
        )
        .arg(arg!(
            -d --debug ... "Turn debugging information on"
        ))
        .arg(
            arg!(
                -b --baudrate <BAUDRATE> "Baudrate"
            )
            .default_value(DEFAULT_BAUDRATE.to_string())
            .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(
                -t --timeout <MS> "Maximum wait for a frame in milliseconds"
            )
            .default_value(DEFAULT_TIMEOUT.as_millis().to_string())
            .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(
                -N --name <NAME> "Name printed with every sample of this meter"
            )
            .required(false),
        )
        .subcommand(clap::Command::new("ports").about("List available serial ports"))
        .subcommand(clap::Command::new("read").about("Read the display once"))
        .subcommand(
            clap::Command::new("watch")
                .about("Sample continuously")
                .arg(
                    arg!(-i --interval <MS> "Sampling interval in milliseconds")
                        .default_value(DEFAULT_INTERVAL.as_millis().to_string())
                        .value_parser(value_parser!(u64)),
                )
                .arg(
                    arg!(-c --capacity <N> "Number of samples kept in history")
                        .default_value(DEFAULT_CAPACITY.to_string())
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    arg!(-n --count <N> "Stop after N samples")
                        .required(false)
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand_required(true)
        .get_matches();

    let level = match matches.get_count("debug") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = handle_args(&matches).await {
        let port = matches
            .get_one::<PathBuf>("device")
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        match e {
            proto::ProtoError::Serial(err) => {
                if err.kind() == tokio_serial::ErrorKind::NoDevice
                    || matches!(err.kind(), tokio_serial::ErrorKind::Io(ErrorKind::NotFound))
                {
                    eprintln!("{}: File not found", port);
                } else {
                    eprintln!("I/O Error: {} [device: {}]", err, port);
                }
            }
            proto::ProtoError::Io(err) => {
                if err.kind() == ErrorKind::NotFound {
                    eprintln!("{}: File not found", port);
                } else {
                    eprintln!("I/O Error: {} [device: {}]", err, port);
                }
            }
            proto::ProtoError::Timeout(_) => {
                eprintln!("No data from device, is the meter switched on and in USB mode?");
            }
            err => {
                eprintln!("Error: {}", err);
            }
        }
        exit(-1);
    }
}

async fn handle_args(matches: &clap::ArgMatches) -> Result<()> {
    let baud_rate = matches
        .get_one::<u32>("baudrate")
        .unwrap_or(&DEFAULT_BAUDRATE);
    let timeout = matches
        .get_one::<u64>("timeout")
        .map(|ms| Duration::from_millis(*ms))
        .unwrap_or(DEFAULT_TIMEOUT);

    if let Some(("ports", _args)) = matches.subcommand() {
        let ports = list_ports()?;
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            println!("{}", port);
        }
        return Ok(());
    }

    if let Some(port_path) = matches.get_one::<PathBuf>("device") {
        let mut device = Device::new(port_path.to_string_lossy().to_string(), *baud_rate)?;
        if let Some(name) = matches.get_one::<String>("name") {
            device = device.with_name(name);
        }
        eprintln!("Connected to: {}\n", port_path.display());

        let sampler = Sampler::new(device, timeout);

        match matches.subcommand() {
            Some(("read", _args)) => {
                let mea = sampler.read_once().await?;
                pretty_measurement(&mea);
            }
            Some(("watch", args)) => {
                let config = SamplerConfig {
                    interval: args
                        .get_one::<u64>("interval")
                        .map(|ms| Duration::from_millis(*ms))
                        .unwrap_or(DEFAULT_INTERVAL),
                    capacity: *args.get_one::<usize>("capacity").unwrap_or(&DEFAULT_CAPACITY),
                };
                let count = args.get_one::<usize>("count").copied();
                watch(&sampler, &config, count).await?;
            }
            _ => {
                unreachable!("subcommand is required")
            }
        }
    }

    Ok(())
}

async fn watch(sampler: &Sampler, config: &SamplerConfig, count: Option<usize>) -> Result<()> {
    sampler.start_with(config)?;

    let mut last_seen = None;
    let mut seen = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(config.interval / 2) => {}
        }
        if let Some(mea) = sampler.latest() {
            if last_seen != Some(mea.instant) {
                last_seen = Some(mea.instant);
                seen += 1;
                pretty_measurement(&mea);
            }
        }
        if count.map_or(false, |n| seen >= n) {
            break;
        }
    }
    sampler.stop().await;

    let history = sampler.history();
    let values: Vec<f64> = history.iter().filter_map(Measurement::base_value).collect();
    println!(
        "\n{} samples in history, {} with a value",
        history.len(),
        values.len()
    );
    if let (Some(min), Some(max)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) {
        println!("Min: {}  Max: {} (base unit)", min, max);
    }
    Ok(())
}

fn pretty_measurement(mea: &Measurement) {
    let mut marks = Vec::new();
    if mea.flags.auto_range {
        marks.push("AUTO");
    }
    if mea.flags.min {
        marks.push("MIN");
    }
    if mea.flags.max {
        marks.push("MAX");
    }
    if mea.flags.relative {
        marks.push("REL");
    }
    if mea.flags.low_battery {
        marks.push("BAT");
    }
    println!(
        "{} {}{:>16} bar {:>2}/60 {}",
        pretty_ts(&mea.ts),
        mea.device.as_deref().map(|n| format!("[{}] ", n)).unwrap_or_default(),
        mea.to_string(),
        mea.range_bar,
        marks.join(" ")
    );
    for anomaly in &mea.anomalies {
        println!("    ! {}", anomaly);
    }
}
