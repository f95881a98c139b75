// SPDX-License-Identifier: MPL-2.0

mod animated;
mod bridge;
mod draw;
mod engine;
mod pidfile;
mod scaler;
mod surface;
mod wallpaper;

use std::path::PathBuf;

use calloop::EventLoop;
use clap::{Parser, Subcommand};
use eyre::{WrapErr, eyre};
use neumowall_config::WallpaperTarget;
use nix::sys::signal::Signal;
use sctk::{
    compositor::CompositorState,
    output::OutputState,
    reexports::{
        calloop_wayland_source::WaylandSource,
        client::{Connection, globals::registry_queue_init},
    },
    registry::RegistryState,
    shell::wlr_layer::LayerShell,
    shm::Shm,
};
use tracing_subscriber::EnvFilter;

use crate::{
    bridge::{DesktopHost, RequestedKind, SetWallpaperRequest},
    wallpaper::LiveWallpaper,
};

/// Animated live wallpapers for Wayland desktops.
#[derive(Debug, Parser)]
#[command(name = "neumowall", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the wallpaper daemon (default).
    Daemon,
    /// Set a wallpaper from a video, GIF or image file; prints whether it was applied.
    Set {
        file: PathBuf,
        /// Screen a still image is applied to.
        #[arg(long, default_value = "home")]
        target: WallpaperTarget,
        /// Treat the file as this kind instead of guessing from its extension.
        #[arg(long)]
        kind: Option<RequestedKind>,
    },
    /// Resume the running daemon's wallpaper.
    Show,
    /// Pause the running daemon's wallpaper.
    Hide,
    /// Make the running daemon reload its preferences.
    Reload,
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    initialise_tracing();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Daemon) {
        Command::Daemon => run_daemon(),

        Command::Set { file, target, kind } => {
            let mut host = DesktopHost::new()?;
            let request = SetWallpaperRequest {
                file_path: file,
                target,
                media_kind: kind,
            };

            match bridge::set_wallpaper(&mut host, &request) {
                Ok(applied) => {
                    println!("{applied}");
                    Ok(())
                }
                Err(why) => Err(eyre!("{}: {}", why.code(), why)),
            }
        }

        Command::Show => pidfile::signal_daemon(Signal::SIGUSR2),
        Command::Hide => pidfile::signal_daemon(Signal::SIGUSR1),
        Command::Reload => pidfile::signal_daemon(Signal::SIGHUP),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_daemon() -> eyre::Result<()> {
    let _pid_file = pidfile::PidFile::create()?;

    let conn = Connection::connect_to_env().wrap_err("failed to connect to Wayland")?;

    let mut event_loop: EventLoop<'static, LiveWallpaper> = EventLoop::try_new()?;

    let (globals, event_queue) = registry_queue_init(&conn)?;
    let qh = event_queue.handle();

    WaylandSource::new(conn, event_queue)
        .insert(event_loop.handle())
        .map_err(|why| eyre!("failed to insert Wayland source: {}", why.error))?;

    let mut wallpaper = LiveWallpaper::new(
        RegistryState::new(&globals),
        OutputState::new(&globals, &qh),
        CompositorState::bind(&globals, &qh).wrap_err("wl_compositor not available")?,
        Shm::bind(&globals, &qh).wrap_err("wl_shm not available")?,
        LayerShell::bind(&globals, &qh).wrap_err("wlr-layer-shell not available")?,
        qh,
        event_loop.handle(),
    )?;

    tracing::info!("wallpaper daemon started");

    loop {
        event_loop.dispatch(None, &mut wallpaper)?;

        if wallpaper.exit {
            break;
        }
    }

    Ok(())
}
