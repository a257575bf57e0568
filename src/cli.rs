//! Command-line entry points (SPEC_FULL.md §4), grounded in `blri::main`'s
//! `clap` derive layout and its `inquire::Select` fallback for picking a
//! serial port when `--port` is not given.

use std::fs;

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use inquire::Select;

use crate::chip::StaticCatalogue;
use crate::config::ToolConfig;
use crate::error::PpmError;
use crate::hex::IhexImage;
use crate::orchestrator::{self, Action, Memory, NoPower};
use crate::session_defaults::SessionTemplate;
use crate::transport::SerialTransport;

#[derive(Parser)]
#[clap(name = "ppm-prog")]
#[clap(about = "Driver for the PPM bootloader protocol")]
pub struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Program a memory region from an Intel-HEX image.
    Program(MemoryOp),
    /// Verify a memory region against an Intel-HEX image.
    Verify(MemoryOp),
    /// Print the built-in session timing defaults for every session kind.
    DumpDefaults,
}

#[derive(clap::Args)]
struct MemoryOp {
    /// Path to the Intel-HEX image.
    image: String,
    /// Which memory region to target.
    #[clap(value_enum)]
    memory: CliMemory,
    /// The serial port to use. If not provided, a list of available ports is shown.
    #[clap(short, long)]
    port: Option<String>,
    /// Bitrate to switch to after entering programming mode.
    #[clap(short, long)]
    bitrate: Option<u32>,
    /// Address every connected device instead of requesting per-device acks.
    #[clap(long)]
    broadcast: bool,
    /// Assume the chip's power rail is already under manual control.
    #[clap(long)]
    manual_power: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliMemory {
    Flash,
    FlashCs,
    Nvram,
}

impl From<CliMemory> for Memory {
    fn from(value: CliMemory) -> Self {
        match value {
            CliMemory::Flash => Memory::Flash,
            CliMemory::FlashCs => Memory::FlashCs,
            CliMemory::Nvram => Memory::NvRam,
        }
    }
}

pub fn run() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Program(op) => run_action(op, Action::Program),
        Commands::Verify(op) => run_action(op, Action::Verify),
        Commands::DumpDefaults => dump_defaults(),
    }
}

fn pick_port(requested: Option<String>, remembered: Option<String>) -> String {
    if let Some(port) = requested {
        return port;
    }
    if let Some(port) = remembered {
        return port;
    }
    let ports = serialport::available_ports().expect("list serial ports");
    let mut names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
    names.sort();
    Select::new("select a serial port", names)
        .prompt()
        .expect("select serial port")
}

fn run_action(op: MemoryOp, action: Action) {
    let mut config = ToolConfig::load();
    let port = pick_port(op.port, config.port.clone());
    let bitrate = op.bitrate.unwrap_or(config.bitrate);

    let image_text = fs::read_to_string(&op.image).expect("read hex image");
    let hex_image = match IhexImage::parse(&image_text) {
        Ok(image) => image,
        Err(_) => {
            eprintln!("{}", "error: malformed intel-hex image".bright_red().bold());
            std::process::exit(PpmError::InvHex.code());
        }
    };

    let mut transport = SerialTransport::open(&port, 19200).expect("open serial port");
    let catalogue = StaticCatalogue::with_demo_chip();
    let mut power = NoPower;

    let verb = match action {
        Action::Program => "programming",
        Action::Verify => "verifying",
    };
    println!(
        "{} {} via {}",
        verb.bright_blue().bold(),
        format!("{:?}", Memory::from(op.memory)).to_lowercase(),
        port.bright_white()
    );

    let result = orchestrator::do_action(
        &mut transport,
        &catalogue,
        &mut power,
        op.manual_power,
        op.broadcast,
        bitrate,
        op.memory.into(),
        action,
        &hex_image,
    );

    match result {
        Ok(()) => {
            println!("{}", "done".bright_green().bold());
            config.port = Some(port);
            config.bitrate = bitrate;
            let _ = config.save();
        }
        Err(err) => {
            eprintln!("{} {}", "error:".bright_red().bold(), err);
            std::process::exit(err.code());
        }
    }
}

fn dump_defaults() {
    for tmpl in SessionTemplate::ALL {
        let cfg = tmpl.default_config();
        println!(
            "{:<24} page_size={:<4} retry={:<3} page0={:<5} pagex={:<5} session={:<5}",
            tmpl.name().bright_cyan(),
            cfg.page_size_words,
            cfg.page_retry,
            cfg.page0_ack_timeout_ms,
            cfg.pagex_ack_timeout_ms,
            cfg.session_ack_timeout_ms,
        );
    }
}
