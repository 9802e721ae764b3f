//! kwlog - K-line datalogger for ME7 ECUs
//!
//! Slow-inits a KWP2000 session over an FTDI K-line cable, configures
//! the DDLI indirection tables and streams engine RPM to stdout until
//! interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kwlog_core::protocol::{list_ports, open_first_port, open_port, Session, SessionConfig};

#[derive(Parser)]
#[command(name = "kwlog")]
#[command(author, version, about = "KWP2000 K-line datalogger for ME7 ECUs")]
struct Cli {
    /// Serial port name (default: first enumerated port)
    #[arg(short, long, env = "KWLOG_PORT")]
    port: Option<String>,

    /// Slow-init target address (0x11 = KWP2000, 0x33 = ISO 9141)
    #[arg(short, long, value_parser = parse_hex_byte, default_value = "0x11")]
    address: u8,

    /// Stop after this many samples (0 = run until Ctrl-C)
    #[arg(short, long, default_value_t = 0)]
    count: u64,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

fn parse_hex_byte(s: &str) -> Result<u8, String> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid address '{}': {}", s, e))
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if cli.list_ports {
        let ports = list_ports();
        if ports.is_empty() {
            bail!("no serial ports found");
        }
        for p in ports {
            match (p.manufacturer.as_deref(), p.product.as_deref()) {
                (Some(mfg), Some(product)) => println!("{}  {} {}", p.name, mfg, product),
                _ => println!("{}", p.name),
            }
        }
        return Ok(());
    }

    let transport = match &cli.port {
        Some(name) => open_port(name).with_context(|| format!("opening {}", name))?,
        None => open_first_port().context("no K-line interface found")?,
    };

    let config = SessionConfig {
        address: cli.address,
        ..SessionConfig::default()
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .context("installing Ctrl-C handler")?;
    }

    let mut session = Session::new(transport, config);

    info!("connecting (slow init takes ~2.1 s)");
    session.connect().context("slow-init handshake failed")?;
    session.configure().context("session configuration failed")?;
    info!("tables configured, polling engine RPM");

    let mut remaining = cli.count;
    session.poll(&running, |value| {
        println!("{}", value);
        if cli.count != 0 {
            remaining -= 1;
            if remaining == 0 {
                running.store(false, Ordering::SeqCst);
            }
        }
    })?;

    Ok(())
}
