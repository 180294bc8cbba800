// CLASSIFICATION: COMMUNITY
// Filename: main.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

mod fabric;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use cohesix_fsi::config;
use cohesix_fsi::sim::SimFabric;
use cohesix_fsi::{
    enable_irq, handle_error, register_driver, register_master, registered_masters,
    start_ipoll, stop_ipoll, unregister_master, DeviceId, Engine, EngineDriver, FsiResult,
    Master,
};
use log::info;

use crate::fabric::FabricSpec;

#[derive(Parser)]
#[command(author, version, about = "Drive a simulated FSI fabric")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate the fabric and print the master tree
    Scan { fabric: PathBuf },
    /// Enable every engine interrupt and run the poller
    Poll {
        fabric: PathBuf,
        #[arg(long, default_value_t = 10)]
        ticks: u32,
        #[arg(long)]
        period_ms: Option<u32>,
    },
    /// One raw-window access on a root slave
    Raw {
        fabric: PathBuf,
        #[arg(long, default_value_t = 0)]
        link: u8,
        #[arg(long, value_parser = parse_u64)]
        offset: u64,
        #[arg(long, value_parser = parse_u32)]
        value: Option<u32>,
    },
    /// Run bus error recovery and print the transaction log
    Recover {
        fabric: PathBuf,
        #[arg(long, value_parser = parse_u32)]
        addr: u32,
    },
}

fn parse_u64(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("{s}: {e}"))
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let v = parse_u64(s)?;
    u32::try_from(v).map_err(|_| format!("{s}: does not fit 32 bits"))
}

/// Logs and counts every interrupt it receives.
struct LogDriver {
    ids: Vec<DeviceId>,
    hits: Arc<AtomicUsize>,
}

impl EngineDriver for LogDriver {
    fn name(&self) -> &str {
        "fsictl-log"
    }

    fn id_table(&self) -> &[DeviceId] {
        &self.ids
    }

    fn probe(&self, engine: &Arc<Engine>) -> FsiResult<()> {
        let hits = Arc::clone(&self.hits);
        engine.set_irq_handler(Arc::new(move |e: &Engine| {
            hits.fetch_add(1, Ordering::SeqCst);
            info!("{}: interrupt", e.name());
        }));
        Ok(())
    }
}

fn load(path: &PathBuf) -> Result<(FabricSpec, Arc<SimFabric>)> {
    let spec = FabricSpec::load(path)?;
    let fabric = spec.build()?;
    Ok((spec, fabric))
}

fn print_master(master: &Master, depth: usize) {
    let pad = "  ".repeat(depth);
    println!(
        "{pad}{} links={} ipoll={:#010x}",
        master.name(),
        master.n_links(),
        master.ipoll()
    );
    for slave in master.slaves() {
        println!("{pad}  {} chip_id={:#010x}", slave.name(), slave.chip_id());
        for e in slave.engines() {
            println!(
                "{pad}    {} type={:#04x} v{} addr={:#x} size={:#x} si1s_bit={} driver={}",
                e.name(),
                e.engine_type(),
                e.version(),
                e.addr(),
                e.size(),
                e.si1s_bit(),
                e.driver_name().unwrap_or_else(|| "-".into())
            );
        }
        if let Some(hub) = slave.hub() {
            print_master(&hub, depth + 2);
        }
    }
}

fn scan(path: &PathBuf) -> Result<()> {
    let (spec, fabric) = load(path)?;
    let root = Master::new_root(spec.links, fabric);
    register_master(&root)?;
    print_master(&root, 0);
    unregister_master(&root)?;
    Ok(())
}

fn poll(path: &PathBuf, ticks: u32, period_ms: Option<u32>) -> Result<()> {
    if let Some(ms) = period_ms {
        config::set_ipoll_period_ms(ms)?;
    }
    let hits = Arc::new(AtomicUsize::new(0));
    register_driver(Arc::new(LogDriver {
        ids: (1..=0xffu8).map(DeviceId::any_version).collect(),
        hits: Arc::clone(&hits),
    }))?;

    let (spec, fabric) = load(path)?;
    let root = Master::new_root(spec.links, fabric);
    register_master(&root)?;
    for master in registered_masters() {
        for slave in master.slaves() {
            for engine in slave.engines() {
                enable_irq(&engine)?;
            }
        }
    }

    start_ipoll(&root)?;
    let period = u64::from(config::ipoll_period_ms());
    thread::sleep(Duration::from_millis(period * u64::from(ticks)));
    stop_ipoll();

    println!("{} interrupts in {ticks} ticks", hits.load(Ordering::SeqCst));
    unregister_master(&root)?;
    Ok(())
}

fn raw(path: &PathBuf, link: u8, offset: u64, value: Option<u32>) -> Result<()> {
    let (spec, fabric) = load(path)?;
    let root = Master::new_root(spec.links, fabric);
    register_master(&root)?;
    let slave = root
        .slaves()
        .into_iter()
        .find(|s| s.link() == link)
        .ok_or_else(|| anyhow!("no slave on link {link}"))?;
    match value {
        Some(v) => {
            slave.raw_write(offset, &v.to_be_bytes())?;
            println!("{}[{offset:#x}] <- {v:#010x}", slave.name());
        }
        None => {
            let mut buf = [0u8; 4];
            slave.raw_read(offset, &mut buf)?;
            println!("{}[{offset:#x}] = {:#010x}", slave.name(), u32::from_be_bytes(buf));
        }
    }
    unregister_master(&root)?;
    Ok(())
}

fn recover(path: &PathBuf, addr: u32) -> Result<()> {
    let (spec, fabric) = load(path)?;
    let root = Master::new_root(spec.links, fabric.clone());
    if !handle_error(&root, addr) {
        println!("recovery already in progress");
        return Ok(());
    }
    let events = fabric.events();
    let Some(start) = events.first().map(|e| e.at) else {
        return Ok(());
    };
    for e in events {
        println!("{:>8}us {:?}", e.at.duration_since(start).as_micros(), e.op);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Scan { fabric } => scan(&fabric),
        Command::Poll {
            fabric,
            ticks,
            period_ms,
        } => poll(&fabric, ticks, period_ms),
        Command::Raw {
            fabric,
            link,
            offset,
            value,
        } => raw(&fabric, link, offset, value),
        Command::Recover { fabric, addr } => recover(&fabric, addr),
    }
}
