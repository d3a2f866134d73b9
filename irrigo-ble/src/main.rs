//! BLE remote for irrigation controllers
//!
//! Connects to the controller, runs one command, and disconnects.
//!
//! Usage:
//!   irrigo-ble scan
//!   irrigo-ble status
//!   irrigo-ble start --zone 2 --duration 15
//!   irrigo-ble stop
//!   irrigo-ble program get --zone 1
//!   irrigo-ble program set --zone 1 --start 06:00 --days SM-W-F- --duration 15
//!   irrigo-ble sync-time
//!   irrigo-ble clock
//!   irrigo-ble monitor --interval 5

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use irrigo_ble_controller::proto::{DaysMask, Program, Response, StartTime, SystemStatus};
use irrigo_ble_controller::{
    BtleTransport, Client, ClientConfig, ConnectionState, RtcSample, Transport,
};

#[derive(Parser)]
#[command(name = "irrigo-ble")]
#[command(about = "Operate an irrigation controller over BLE")]
struct Cli {
    /// Advertised device name to connect to
    #[arg(short, long, global = true, env = "IRRIGO_DEVICE", default_value = "Irrigation Controller")]
    device: String,
    /// How long to wait for each response, in milliseconds
    #[arg(long, global = true, env = "IRRIGO_TIMEOUT_MS", default_value = "5000")]
    timeout_ms: u64,
    /// Scan duration in seconds
    #[arg(long, global = true, default_value = "5")]
    scan_secs: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List nearby BLE devices
    Scan,
    /// Show which zone is running and the controller's clock
    Status,
    /// Start watering a zone
    Start {
        #[arg(short, long)]
        zone: u8,
        /// Minutes to run
        #[arg(short, long)]
        duration: u32,
    },
    /// Stop watering
    Stop,
    /// Read or write a zone's program
    Program {
        #[command(subcommand)]
        action: ProgramCommands,
    },
    /// Set the controller's clock (defaults to this machine's local time)
    SyncTime {
        /// YYYY-MM-DDTHH:MM:SS
        #[arg(short, long)]
        time: Option<NaiveDateTime>,
    },
    /// Compare the controller's clock with local time
    Clock,
    /// Poll status and print every response until interrupted
    Monitor {
        /// Seconds between status polls
        #[arg(short, long, default_value = "5")]
        interval: u64,
    },
}

#[derive(Subcommand)]
enum ProgramCommands {
    /// Show a program slot
    Get {
        #[arg(short, long)]
        zone: u8,
        #[arg(short, long, default_value = "0")]
        prog: u8,
    },
    /// Write a program slot
    Set {
        #[arg(short, long)]
        zone: u8,
        #[arg(short, long, default_value = "0")]
        prog: u8,
        /// HH:MM, or "none"
        #[arg(short, long)]
        start: StartTime,
        /// 7 characters Sun..Sat, "-" for off, e.g. SM-W-F-
        #[arg(long, default_value = "SMTWTFS")]
        days: DaysMask,
        /// Minutes to run
        #[arg(short, long)]
        duration: u32,
        /// Store the program disabled
        #[arg(long)]
        disabled: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = ClientConfig::default()
        .with_device_name(cli.device)
        .with_response_timeout(Duration::from_millis(cli.timeout_ms))
        .with_scan_duration(Duration::from_secs(cli.scan_secs));
    log::debug!("config: {:?}", config);

    let transport = BtleTransport::new(config.scan_duration).await;

    if let Commands::Scan = cli.command {
        return scan_devices(&transport, &config).await;
    }

    let client = Client::new(transport, &config);

    println!("Connecting to {}...", config.device_name);
    client.connect().await?;
    println!("Connected to {}", client.device_name().unwrap_or_default());

    let result = run(&client, cli.command).await;

    client.disconnect().await;
    result
}

async fn scan_devices(
    transport: &BtleTransport,
    config: &ClientConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scanning for devices ({} seconds)...", config.scan_duration.as_secs());
    let devices = transport.scan().await?;

    println!("\nFound {} devices:", devices.len());
    for device in devices {
        let rssi = device.rssi.map(|r| format!("{} dBm", r)).unwrap_or_else(|| "N/A".to_string());
        let marker = if device.is_controller { " [CONTROLLER]" } else { "" };
        println!("  {} ({}) RSSI: {}{}", device.name, device.address, rssi, marker);
    }
    Ok(())
}

async fn run(
    client: &Client<BtleTransport>,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Scan => {}
        Commands::Status => {
            let status = client.get_status().await?;
            println!("{}", describe_status(&status));
        }
        Commands::Start { zone, duration } => {
            client.start_zone(zone, duration).await?;
            println!("Zone {} started for {} min", zone, duration);
        }
        Commands::Stop => {
            client.stop().await?;
            println!("Watering stopped");
        }
        Commands::Program { action: ProgramCommands::Get { zone, prog } } => {
            let program = client.get_program(zone, prog).await?;
            println!("Zone {} program {}: {}", zone, prog, describe_program(&program));
        }
        Commands::Program {
            action: ProgramCommands::Set { zone, prog, start, days, duration, disabled },
        } => {
            let program = Program {
                enabled: !disabled,
                start,
                days,
                duration_minutes: duration,
            };
            client.set_program(zone, prog, &program).await?;
            println!("Zone {} program {} saved: {}", zone, prog, describe_program(&program));
        }
        Commands::SyncTime { time } => {
            let sent = client.set_time(time).await?;
            println!("Controller clock set to {}", sent);
        }
        Commands::Clock => match client.clock_drift().await? {
            Some(drift) => println!("RTC drift: {} ({:.1}s)", drift, drift.seconds),
            None => println!("RTC unavailable"),
        },
        Commands::Monitor { interval } => {
            let ctrl_c = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            monitor(client, Duration::from_secs(interval), ctrl_c).await?
        }
    }
    Ok(())
}

/// Runs until `shutdown` completes or the device disconnects
async fn monitor<T: Transport>(
    client: &Client<T>,
    interval: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut responses = client.subscribe_responses();
    let printer = tokio::spawn(async move {
        while let Ok(response) = responses.recv().await {
            println!("<- {}", describe_response(&response));
        }
    });

    let mut states = client.subscribe_state();
    let mut ticker = tokio::time::interval(interval);
    // polled across iterations so a signal during a status poll is kept
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match client.get_status().await {
                    Ok(status) => println!("{}", describe_status(&status)),
                    Err(e) => log::warn!("status poll failed: {e}"),
                }
            }
            changed = states.changed() => {
                if changed.is_err() || states.borrow().state == ConnectionState::Disconnected {
                    println!("Device disconnected");
                    break;
                }
            }
            _ = &mut shutdown => break,
        }
    }

    printer.abort();
    Ok(())
}

fn describe_status(status: &SystemStatus) -> String {
    let zone = if status.is_idle() {
        "Idle".to_string()
    } else {
        let mode = if status.manual { "manual" } else { "scheduled" };
        match status.duration_minutes {
            Some(d) => format!("Zone {} running ({} min, {})", status.active_zone, d, mode),
            None => format!("Zone {} running ({})", status.active_zone, mode),
        }
    };

    let rtc = match status.rtc_time.as_deref() {
        Some(raw) => match RtcSample::received_now(raw) {
            Some(sample) => format!("RTC {} [{}]", raw, sample.drift()),
            None => format!("RTC {}", raw),
        },
        None => "RTC unavailable".to_string(),
    };

    format!("{zone} | {rtc}")
}

fn describe_program(program: &Program) -> String {
    format!(
        "{} start {} days {} for {} min",
        if program.enabled { "enabled" } else { "disabled" },
        program.start,
        program.days,
        program.duration_minutes
    )
}

fn describe_response(response: &Response) -> String {
    let verb = response.verb().map(|v| v.as_str()).unwrap_or("?");
    match response {
        Response::Ok { .. } => format!("{verb}: ok"),
        Response::Error { message, .. } => {
            format!("{verb}: error: {}", message.as_deref().unwrap_or("Unknown error"))
        }
    }
}
