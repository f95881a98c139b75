// SPDX-License-Identifier: MPL-2.0

//! Wayland background surface hosting one live wallpaper engine.

use std::time::Instant;

use calloop::{
    LoopHandle, RegistrationToken,
    channel::{self, Sender, SyncSender},
    signals::{Signal, Signals},
    timer::{TimeoutAction, Timer},
};
use image::RgbaImage;
use neumowall_config::Preferences;
use sctk::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_layer, delegate_output, delegate_registry, delegate_shm,
    output::{OutputHandler, OutputState},
    reexports::client::{
        Connection, QueueHandle,
        protocol::{wl_output, wl_surface},
    },
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    shell::{
        WaylandSurface,
        wlr_layer::{
            Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
            LayerSurfaceConfigure,
        },
    },
    shm::{Shm, ShmHandler, slot::SlotPool},
};
use tracing::{debug, error, info, warn};

use crate::{
    animated::{DefaultBackend, PlayerMessage, TICK_INTERVAL},
    engine::{self, TickScheduler, WallpaperEngine},
    surface::{DrawSurface, PixelFormat, SpareBuffer},
};

/// Frames allowed in flight between the decoder and the event loop.
const FRAME_BACKLOG: usize = 2;

/// The background layer surface the engine paints on.
#[derive(Debug)]
pub struct WallpaperLayer {
    pub layer: LayerSurface,
    pool: Option<SlotPool>,
    size: (u32, u32),
    format: PixelFormat,
    spare: SpareBuffer,
    configured: bool,
}

impl DrawSurface for WallpaperLayer {
    fn set_format(&mut self, format: PixelFormat) {
        self.format = format;
    }

    fn acquire_buffer(&mut self) -> Option<RgbaImage> {
        let (width, height) = self.size;
        if !self.configured || self.pool.is_none() || width == 0 || height == 0 {
            return None;
        }

        Some(self.spare.take(width, height))
    }

    fn present(&mut self, buffer: RgbaImage) {
        let Some(pool) = self.pool.as_mut() else {
            return;
        };

        let (width, height) = buffer.dimensions();
        match crate::draw::canvas(pool, &buffer, self.format) {
            Ok(wl_buffer) => {
                crate::draw::layer_surface(self, &wl_buffer, (width as i32, height as i32));
            }
            Err(why) => error!(?why, "wallpaper could not be drawn"),
        }

        self.spare.put_back(buffer);
    }
}

/// Arms the engine tick on the event loop.
struct LoopTicker<'a> {
    handle: &'a LoopHandle<'static, LiveWallpaper>,
    token: &'a mut Option<RegistrationToken>,
}

impl TickScheduler for LoopTicker<'_> {
    fn schedule(&mut self, delay: std::time::Duration) {
        self.cancel();

        *self.token = self
            .handle
            .insert_source(Timer::from_duration(delay), |_, _, state| state.tick())
            .map_err(|why| error!(?why, "failed to arm wallpaper tick"))
            .ok();
    }

    fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            self.handle.remove(token);
        }
    }
}

pub struct LiveWallpaper {
    registry_state: RegistryState,
    output_state: OutputState,
    compositor_state: CompositorState,
    shm: Shm,
    layer_shell: LayerShell,
    qh: QueueHandle<LiveWallpaper>,
    loop_handle: LoopHandle<'static, LiveWallpaper>,

    engine: WallpaperEngine<DefaultBackend>,
    layer: Option<WallpaperLayer>,
    tick: Option<RegistrationToken>,
    visible: bool,

    player_events: Sender<PlayerMessage>,
    player_frames: SyncSender<PlayerMessage>,

    pub exit: bool,
}

impl LiveWallpaper {
    pub fn new(
        registry_state: RegistryState,
        output_state: OutputState,
        compositor_state: CompositorState,
        shm: Shm,
        layer_shell: LayerShell,
        qh: QueueHandle<LiveWallpaper>,
        loop_handle: LoopHandle<'static, LiveWallpaper>,
    ) -> eyre::Result<Self> {
        let (player_events, events_rx) = channel::channel();
        let (player_frames, frames_rx) = channel::sync_channel(FRAME_BACKLOG);

        loop_handle
            .insert_source(events_rx, |event, _, state: &mut LiveWallpaper| {
                if let channel::Event::Msg(message) = event {
                    state.on_player_message(message);
                }
            })
            .map_err(|why| eyre::eyre!("failed to listen for player events: {}", why.error))?;

        loop_handle
            .insert_source(frames_rx, |event, _, state: &mut LiveWallpaper| {
                if let channel::Event::Msg(message) = event {
                    state.on_player_message(message);
                }
            })
            .map_err(|why| eyre::eyre!("failed to listen for video frames: {}", why.error))?;

        let signals = Signals::new(&[
            Signal::SIGUSR1,
            Signal::SIGUSR2,
            Signal::SIGHUP,
            Signal::SIGINT,
            Signal::SIGTERM,
        ])?;

        loop_handle
            .insert_source(signals, |event, _, state: &mut LiveWallpaper| {
                match event.signal() {
                    Signal::SIGUSR1 => state.set_visible(false),
                    Signal::SIGUSR2 => state.set_visible(true),
                    Signal::SIGHUP => state.reload(),
                    _ => state.shutdown(),
                }
            })
            .map_err(|why| eyre::eyre!("failed to listen for signals: {}", why.error))?;

        let mut wallpaper = Self {
            registry_state,
            output_state,
            compositor_state,
            shm,
            layer_shell,
            qh,
            loop_handle,
            engine: WallpaperEngine::Null,
            layer: None,
            tick: None,
            visible: false,
            player_events,
            player_frames,
            exit: false,
        };

        wallpaper.engine = engine::select(&load_preferences(), wallpaper.backend());
        wallpaper.create_layer();

        Ok(wallpaper)
    }

    fn backend(&self) -> DefaultBackend {
        DefaultBackend::new(self.player_events.clone(), self.player_frames.clone())
    }

    fn create_layer(&mut self) {
        let surface = self.compositor_state.create_surface(&self.qh);

        let layer = self.layer_shell.create_layer_surface(
            &self.qh,
            surface,
            Layer::Background,
            Some("neumowall"),
            None,
        );

        layer.set_anchor(Anchor::all());
        layer.set_exclusive_zone(-1);
        layer.set_keyboard_interactivity(KeyboardInteractivity::None);
        layer.set_size(0, 0);
        layer.commit();

        self.layer = Some(WallpaperLayer {
            layer,
            pool: None,
            size: (0, 0),
            format: PixelFormat::default(),
            spare: SpareBuffer::default(),
            configured: false,
        });
    }

    fn tick(&mut self) -> TimeoutAction {
        let span = tracing::debug_span!("LiveWallpaper::tick");
        let _handle = span.enter();

        let outcome = match self.layer.as_mut() {
            Some(layer) => self.engine.on_tick(layer, Instant::now()),
            None => engine::TickOutcome::Stop,
        };

        match outcome {
            engine::TickOutcome::Continue if self.visible => {
                TimeoutAction::ToDuration(TICK_INTERVAL)
            }
            _ => {
                // calloop drops the source itself.
                self.tick = None;
                TimeoutAction::Drop
            }
        }
    }

    fn on_player_message(&mut self, message: PlayerMessage) {
        if let Some(layer) = self.layer.as_mut() {
            self.engine.on_player_message(message, layer);
        }
    }

    fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }

        info!(visible, "wallpaper visibility changed");
        self.visible = visible;

        let now = Instant::now();
        let mut ticker = LoopTicker {
            handle: &self.loop_handle,
            token: &mut self.tick,
        };
        self.engine.on_visibility_changed(visible, now, &mut ticker);
    }

    /// Replace the engine with one built from freshly loaded preferences.
    fn reload(&mut self) {
        let span = tracing::debug_span!("LiveWallpaper::reload");
        let _handle = span.enter();

        {
            let mut ticker = LoopTicker {
                handle: &self.loop_handle,
                token: &mut self.tick,
            };
            self.engine.on_engine_destroyed(&mut ticker);
        }

        self.engine = engine::select(&load_preferences(), self.backend());
        info!(kind = ?self.engine.kind(), "wallpaper engine recreated");

        let Some(layer) = self.layer.as_mut().filter(|layer| layer.configured) else {
            return;
        };

        let now = Instant::now();
        let mut ticker = LoopTicker {
            handle: &self.loop_handle,
            token: &mut self.tick,
        };
        layer.set_format(PixelFormat::default());
        self.engine.on_surface_ready(layer, now, &mut ticker);
        self.engine.on_visibility_changed(self.visible, now, &mut ticker);
    }

    fn shutdown(&mut self) {
        info!("shutting down");

        let mut ticker = LoopTicker {
            handle: &self.loop_handle,
            token: &mut self.tick,
        };
        self.engine.on_engine_destroyed(&mut ticker);
        self.exit = true;
    }
}

fn load_preferences() -> Preferences {
    Preferences::load().unwrap_or_else(|why| {
        warn!(?why, "failed to load wallpaper preferences, using defaults");
        Preferences::default()
    })
}

impl CompositorHandler for LiveWallpaper {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for LiveWallpaper {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }
}

impl LayerShellHandler for LiveWallpaper {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _layer: &LayerSurface) {
        info!("wallpaper surface closed");

        let mut ticker = LoopTicker {
            handle: &self.loop_handle,
            token: &mut self.tick,
        };
        self.engine.on_surface_destroyed(&mut ticker);
        self.layer = None;
        self.exit = true;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        let Some(w_layer) = self.layer.as_mut().filter(|l| &l.layer == layer) else {
            return;
        };

        let (w, h) = configure.new_size;
        debug!(width = w, height = h, "wallpaper surface configured");
        w_layer.size = (w, h);

        let len = w as usize * h as usize * 4;
        if let Some(pool) = w_layer.pool.as_mut() {
            if let Err(why) = pool.resize(len) {
                error!(?why, "failed to resize the shm pool");
            }
        } else {
            match SlotPool::new(len.max(4), &self.shm) {
                Ok(pool) => w_layer.pool = Some(pool),
                Err(why) => error!(?why, "failed to create the shm pool"),
            }
        }

        if w_layer.configured {
            return;
        }
        w_layer.configured = true;

        let now = Instant::now();
        let mut ticker = LoopTicker {
            handle: &self.loop_handle,
            token: &mut self.tick,
        };
        self.engine.on_surface_ready(w_layer, now, &mut ticker);

        self.set_visible(true);
    }
}

impl ShmHandler for LiveWallpaper {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

delegate_compositor!(LiveWallpaper);
delegate_output!(LiveWallpaper);
delegate_shm!(LiveWallpaper);

delegate_layer!(LiveWallpaper);

delegate_registry!(LiveWallpaper);

impl ProvidesRegistryState for LiveWallpaper {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }
    registry_handlers![OutputState];
}
