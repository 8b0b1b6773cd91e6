//! unifying CLI: inspect Logitech Unifying receivers and paired devices.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;
use unifying_core::config::Timeouts;
use unifying_core::device::HidapiTransport;
use unifying_core::dispatch::{self, Disposition, ResponseFilter};
use unifying_core::error::Error;
use unifying_core::hidpp::{Message, MAX_DEVICES, RECEIVER_INDEX};
use unifying_core::hidpp10::{self, NOTIF_DEV_CONNECT, NOTIF_DEV_DISCONNECT};
use unifying_core::hidpp20;
use unifying_core::{comm, transport::HidTransport};

/// Never matches: every frame is shown as a notification.
struct WatchAll;

impl ResponseFilter for WatchAll {
    fn classify(&self, _msg: &Message) -> Disposition {
        Disposition::Notification
    }
}

#[derive(Parser)]
#[command(
    name = "unifying",
    version,
    about = "Inspect Logitech Unifying receivers over HID++"
)]
struct Cli {
    /// JSON file with channel timeouts.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// hidraw path of the receiver (default: first one found).
    #[arg(long, global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected receivers.
    List,
    /// Number of devices currently connected to the receiver.
    Connected,
    /// Show the HID++ version of paired devices.
    Version {
        /// Device slot (1-6); all slots when omitted.
        #[arg(short, long)]
        index: Option<u8>,
    },
    /// Show the HID++ 2.0 feature table of a device.
    Features {
        /// Device slot (1-6).
        #[arg(short, long)]
        index: u8,
        /// Print the table as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Enable or disable wireless connect/disconnect notifications.
    Notifications {
        state: Toggle,
    },
    /// Read a HID++ 1.0 register.
    ReadRegister {
        /// Register address, e.g. 0xB5 or 181.
        #[arg(value_parser = parse_byte)]
        address: u8,
        /// Device slot (1-6); the receiver when omitted.
        #[arg(short, long)]
        index: Option<u8>,
        /// Read a long (16-byte) register.
        #[arg(long)]
        long: bool,
    },
    /// Print incoming frames until the time runs out.
    Watch {
        /// How long to listen, in seconds.
        #[arg(short, long, default_value_t = 10)]
        seconds: u64,
    },
}

fn parse_byte(s: &str) -> std::result::Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid byte '{s}': {e}"))
}

fn open_receiver(cli: &Cli) -> Result<HidapiTransport> {
    let timeouts = match &cli.config {
        Some(path) => Timeouts::from_json_file(path)?,
        None => Timeouts::default(),
    };
    debug!(?timeouts, "Channel timeouts");
    let transport = match &cli.device {
        Some(path) => HidapiTransport::open(path, timeouts)?,
        None => HidapiTransport::open_first(timeouts)?,
    };
    Ok(transport)
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe_frame(msg: &Message) -> String {
    let kind = match msg.register().sub_id {
        NOTIF_DEV_CONNECT if msg.is_hidpp() => "device connect",
        NOTIF_DEV_DISCONNECT if msg.is_hidpp() => "device disconnect",
        hidpp10::NOTIF_RECV_LOCK_CHANGE if msg.is_hidpp() => "receiver lock change",
        _ => "frame",
    };
    let selector = msg.selector();
    format!(
        "[{:02X}] ix={:02X} {:02X} {:02X} | {} ({kind})",
        msg.report_id(),
        msg.device_index(),
        selector[0],
        selector[1],
        hex(msg.params())
    )
}

fn print_version(transport: &dyn HidTransport, index: u8) -> Result<()> {
    let version = hidpp20::get_version(transport, index)?;
    if version.is_known() {
        println!("Device {index}: HID++ {version}");
    } else {
        println!("Device {index}: not responding");
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            let receivers = unifying_core::device::discover_receivers()?;
            if receivers.is_empty() {
                println!("No Logitech Unifying receiver found.");
                println!("Ensure the hid-logitech-dj driver is loaded and hidraw is enabled.");
            } else {
                for rcv in &receivers {
                    println!(
                        "{} (VID: 0x{:04X}, PID: 0x{:04X}, path: {})",
                        rcv.model.name(),
                        rcv.vid,
                        rcv.pid,
                        rcv.path
                    );
                }
            }
        }
        Commands::Connected => {
            let transport = open_receiver(&cli)?;
            let count = hidpp10::connected_devices(&transport)?;
            println!("Connected devices: {count}");
        }
        Commands::Version { index } => {
            let transport = open_receiver(&cli)?;
            match index {
                Some(ix) => print_version(&transport, ix)?,
                None => {
                    for ix in 1..=MAX_DEVICES {
                        print_version(&transport, ix)?;
                    }
                }
            }
        }
        Commands::Features { index, json } => {
            let transport = open_receiver(&cli)?;
            let table = comm::with_retry(comm::MAX_RETRIES, || {
                hidpp20::get_features(&transport, index)
            })
            .with_context(|| format!("reading feature table of device {index}"))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                for info in &table {
                    let mut flags = Vec::new();
                    if info.is_obsolete() {
                        flags.push("obsolete");
                    }
                    if info.is_hidden() {
                        flags.push("hidden");
                    }
                    if info.is_engineering() {
                        flags.push("engineering");
                    }
                    println!(
                        "{:3}: 0x{:04X} {:<24} {}",
                        info.feature_index,
                        info.feature_id,
                        info.name().unwrap_or("?"),
                        flags.join(",")
                    );
                }
            }
        }
        Commands::Notifications { state } => {
            let transport = open_receiver(&cli)?;
            let enabled = matches!(state, Toggle::On);
            hidpp10::enable_wireless_notifications(&transport, enabled)?;
            println!(
                "Wireless notifications {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        Commands::ReadRegister {
            address,
            index,
            long,
        } => {
            let transport = open_receiver(&cli)?;
            let ix = index.unwrap_or(RECEIVER_INDEX);
            let value = if long {
                hidpp10::read_long_register(&transport, ix, address)?.to_vec()
            } else {
                hidpp10::read_register(&transport, ix, address)?.to_vec()
            };
            println!("Register 0x{address:02X} @ 0x{ix:02X}: {}", hex(&value));
        }
        Commands::Watch { seconds } => {
            let transport = open_receiver(&cli)?;
            println!("Listening for {seconds} s...");
            let mut sink = |msg: &Message| println!("{}", describe_frame(msg));
            match dispatch::read_matching(&transport, seconds * 1000, &WatchAll, &mut sink) {
                Ok(_) | Err(Error::Timeout(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
