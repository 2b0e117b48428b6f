//! `hakomari-cli`: a thin command-line front-end over the library,
//! kept subcommand-compatible with the original `aya` reference tool.

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use hakomari::auth::PassphraseScreen;
use hakomari::device::{self, Device};
use hakomari::error::Result;
use hakomari::transport::SerialTransport;
use hakomari::{AuthContext, AuthHandler, Context};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;

/// Path the passphrase screen bitmap is rendered to before prompting
/// for pointer events, matching `aya`'s own scratch-file convention.
const PASSPHRASE_SCREEN_PATH: &str = "hakomari-passphrase.pgm";

#[derive(Parser)]
#[command(name = "hakomari-cli", about = "Talk to a hakomari USB device")]
struct Cli {
    /// Target a device by index, when multiple are plugged in.
    #[arg(short, long)]
    device: Option<usize>,

    /// Fail instead of prompting for a passphrase when one is required.
    #[arg(long)]
    no_input: bool,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every detected hakomari device.
    ListDevices,
    /// List the endpoints of the selected device.
    List,
    /// Create an endpoint.
    Create { kind: String, name: String },
    /// Destroy an endpoint.
    Destroy { kind: String, name: String },
    /// Issue a verb against an endpoint, streaming stdin as payload.
    Query {
        kind: String,
        name: String,
        verb: String,
    },
}

/// Reads one line of the form `x y down` at a time from stdin as a
/// pointer event, stopping on a blank line.
struct StdinAuthHandler {
    no_input: bool,
}

/// Writes `screen` out as a binary-grayscale PGM (`P5`) bitmap: one
/// byte per pixel, 0 for a set bit and 255 for a clear one.
fn write_passphrase_screen_pgm(path: &Path, screen: &PassphraseScreen) -> io::Result<()> {
    let mut file = File::create(path)?;
    write!(file, "P5\n{} {}\n255\n", screen.width, screen.height)?;
    let mut row = vec![0u8; screen.width as usize];
    for y in 0..screen.height {
        for (x, pixel) in row.iter_mut().enumerate() {
            *pixel = if screen.pixel(x as u32, y) { 0 } else { 255 };
        }
        file.write_all(&row)?;
    }
    Ok(())
}

impl AuthHandler<SerialTransport> for StdinAuthHandler {
    fn ask_passphrase(&mut self, ctx: &mut AuthContext<'_, SerialTransport>) -> Result<()> {
        if self.no_input {
            return Ok(());
        }

        let screen = ctx.inspect_passphrase_screen();
        let path = Path::new(PASSPHRASE_SCREEN_PATH);
        write_passphrase_screen_pgm(path, screen)?;
        eprintln!(
            "passphrase screen ({}x{}) written to {}; enter pointer events as 'x y down', blank line to finish",
            screen.width,
            screen.height,
            path.display()
        );

        let stdin = io::stdin();
        loop {
            let mut line = String::new();
            if stdin.read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                break;
            }

            let mut parts = line.split_whitespace();
            let (Some(x), Some(y), Some(down)) = (parts.next(), parts.next(), parts.next()) else {
                eprintln!("expected 'x y down'");
                continue;
            };
            let (Ok(x), Ok(y), Ok(down)) = (x.parse(), y.parse(), down.parse()) else {
                eprintln!("expected 'x y down'");
                continue;
            };
            ctx.input_pointer(x, y, down)?;
        }

        Ok(())
    }
}

fn select_device(ctx: &mut Context, device_index: Option<usize>) -> Result<Device<SerialTransport>> {
    let count = ctx.enumerate_devices()?;
    if count == 0 {
        return Err(hakomari::Error::invalid("No device detected"));
    }
    let index = match device_index {
        Some(i) => i,
        None if count == 1 => 0,
        None => {
            return Err(hakomari::Error::invalid(
                "Multiple devices detected, please specify one with --device",
            ))
        }
    };
    ctx.open_device(index)
}

fn run(cli: Cli) -> Result<()> {
    let mut ctx = Context::new();

    if matches!(cli.command, Command::ListDevices) {
        let count = ctx.enumerate_devices()?;
        for i in 0..count {
            let desc = ctx.inspect_device(i)?;
            println!("{}: {}", i, desc.user_name);
        }
        return Ok(());
    }

    let mut device = select_device(&mut ctx, cli.device)?;

    match cli.command {
        Command::ListDevices => unreachable!(),
        Command::List => {
            let count = device.enumerate_endpoints()?;
            for i in 0..count {
                let ep = device.inspect_endpoint(i)?;
                println!("- type: {}\n  name: {}", ep.kind, ep.name);
            }
        }
        Command::Create { kind, name } => {
            device.create_endpoint(&device::endpoint(&kind, &name)?)?;
        }
        Command::Destroy { kind, name } => {
            device.destroy_endpoint(&device::endpoint(&kind, &name)?)?;
        }
        Command::Query { kind, name, verb } => {
            let ep = device::endpoint(&kind, &name)?;
            let mut stdin = io::stdin();
            ctx.set_auth_handler(StdinAuthHandler {
                no_input: cli.no_input,
            });
            let mut reply = ctx.query_endpoint(
                &mut device,
                &ep,
                &verb,
                Some(&mut stdin as &mut dyn Read),
            )?;
            io::copy(&mut reply, &mut io::stdout())?;
            io::stdout().flush()?;
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity.tracing_level_filter())
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hakomari-cli: {e}");
            ExitCode::FAILURE
        }
    }
}
