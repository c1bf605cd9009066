//! Command-line interface for exercising a MOTION instrument from a shell.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use motion_host::config::HostConfig;
use motion_host::dfu::{DfuSupervisor, DfuSupervisorConfig};
use motion_host::dispatcher::Dispatcher;
use motion_host::fpga::FpgaPageProgrammer;
use motion_host::proxy::console::ConsoleProxy;
use motion_host::transport::usb::UsbTransport;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "ping" => cmd_ping()?,
        "version" => cmd_version()?,
        "fpga-program" => cmd_fpga_program(&args[2..])?,
        "dfu" => cmd_dfu(&args[2..])?,
        "release" => cmd_release(&args[2..]).await?,
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Logs to stderr always, and additionally to the systemd journal when one is
/// reachable, matching the dual sink the daemon binary logs through.
fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let registry = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer());

    match tracing_journald::layer() {
        Ok(layer) => registry.with(layer).init(),
        Err(_) => registry.init(),
    }
}

fn print_usage() {
    eprintln!("Usage: motion-cli <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  ping                              Ping the console board");
    eprintln!("  version                           Print console firmware version");
    eprintln!("  fpga-program <channel> <jedec>    Program one FPGA channel from a .jed file");
    eprintln!("  dfu <firmware.bin>                Flash firmware via DFU");
    eprintln!("  release latest <owner> <repo>     Show the latest GitHub release");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  MOTION_CONSOLE_VID, MOTION_CONSOLE_PID    console board identity (hex, default 0000:0000)");
}

fn console_vid_pid() -> Result<(u16, u16)> {
    let vid = env::var("MOTION_CONSOLE_VID").unwrap_or_else(|_| "0000".to_string());
    let pid = env::var("MOTION_CONSOLE_PID").unwrap_or_else(|_| "0000".to_string());
    Ok((
        u16::from_str_radix(&vid, 16).context("MOTION_CONSOLE_VID is not valid hex")?,
        u16::from_str_radix(&pid, 16).context("MOTION_CONSOLE_PID is not valid hex")?,
    ))
}

fn connect_console() -> Result<ConsoleProxy> {
    let config = HostConfig::default();
    let (vid, pid) = console_vid_pid()?;
    let transport = Arc::new(UsbTransport::new(vid, pid, None, 0, 0x81, 0x01));
    transport.connect().map_err(|e| anyhow!("connecting to console board: {e}"))?;
    let dispatcher = Arc::new(Dispatcher::new(transport, config.command_timeout));
    Ok(ConsoleProxy::new(dispatcher))
}

fn cmd_ping() -> Result<()> {
    let console = connect_console()?;
    console.ping()?;
    println!("ok");
    Ok(())
}

fn cmd_version() -> Result<()> {
    let console = connect_console()?;
    let (major, minor, patch) = console.get_version()?;
    println!("{major}.{minor}.{patch}");
    Ok(())
}

fn cmd_fpga_program(args: &[String]) -> Result<()> {
    let [channel, jedec_path] = args else {
        return Err(anyhow!("usage: motion-cli fpga-program <channel> <jedec-path>"));
    };
    let channel: u8 = channel.parse().context("channel must be a number 0..255")?;
    let config = HostConfig::default();
    let (vid, pid) = console_vid_pid()?;
    let transport = Arc::new(UsbTransport::new(vid, pid, None, 0, 0x81, 0x01));
    transport.connect().map_err(|e| anyhow!("connecting to sensor board: {e}"))?;
    let dispatcher = Arc::new(Dispatcher::new(transport, config.command_timeout));
    let programmer = FpgaPageProgrammer::new(dispatcher);

    let mut last_percent = 0;
    programmer.program_from_jedec(
        channel,
        &PathBuf::from(jedec_path),
        Some(&mut |done, total| {
            let percent = done * 100 / total.max(1);
            if percent != last_percent {
                println!("programming: {percent}% ({done}/{total} pages)");
                last_percent = percent;
            }
        }),
    )?;
    println!("done");
    Ok(())
}

fn cmd_dfu(args: &[String]) -> Result<()> {
    let [firmware_path] = args else {
        return Err(anyhow!("usage: motion-cli dfu <firmware.bin>"));
    };
    let config = HostConfig::default();
    let (vid, pid) = console_vid_pid()?;
    let transport = Arc::new(UsbTransport::new(vid, pid, None, 0, 0x81, 0x01));
    transport.connect().map_err(|e| anyhow!("connecting to board: {e}"))?;
    let dispatcher = Arc::new(Dispatcher::new(transport, config.command_timeout));
    let supervisor = DfuSupervisor::new(dispatcher, DfuSupervisorConfig::default());

    let dfu_vid_pid = config.dfu_vid_pid.unwrap_or((vid, pid));
    let state = supervisor.run(
        &PathBuf::from(firmware_path),
        || motion_host::transport::usb::find_device(dfu_vid_pid.0, dfu_vid_pid.1, None).is_some(),
        Some(|progress: &motion_host::dfu::DfuProgress| {
            if let Some(percent) = progress.percent {
                println!("{:?}: {percent}%", progress.phase.unwrap_or(motion_host::dfu::DfuPhase::Download));
            }
        }),
    )?;
    println!("{state:?}");
    Ok(())
}

async fn cmd_release(args: &[String]) -> Result<()> {
    use motion_host::release::GitHubReleases;

    let [subcommand, owner, repo, rest @ ..] = args else {
        return Err(anyhow!("usage: motion-cli release <latest|notes> <owner> <repo> [tag]"));
    };
    let client = GitHubReleases::new(owner, repo)?;

    match subcommand.as_str() {
        "latest" => {
            let release = client.get_latest_release(false).await?;
            println!("{} ({})", release.tag_name, release.name.unwrap_or_default());
            for asset in &release.assets {
                println!("  {} ({} bytes)", asset.name, asset.size);
            }
        }
        "notes" => {
            let tag = rest.first().ok_or_else(|| anyhow!("usage: motion-cli release notes <owner> <repo> <tag>"))?;
            let notes = client.get_release_notes(tag).await?;
            println!("{}", notes.unwrap_or_else(|| "(no release notes)".to_string()));
        }
        other => return Err(anyhow!("unknown release subcommand: {other}")),
    }

    Ok(())
}
