use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use percload_core::{ExperimentError, Phase, Trial};
use percload_experiment::{ExperimentConfig, KeyClass, Resolution, ResponseEvent};
use percload_render::{FontVec, Screen, SkiaRenderer, load_font};
use percload_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::session::{Finished, Sequencer, Session, THANKS, instructions};

/// Where the current trial is on screen
#[derive(Debug, Clone, Copy, PartialEq)]
enum TrialDisplay {
    Fixation { until_ns: u64 },
    /// Fixation is over; the next frame carries the search display.
    Onset,
    Search { letters_until_ns: u64 },
}

/// Winit key code to the key names used in the configuration and log.
pub fn key_name(code: KeyCode) -> Option<&'static str> {
    use KeyCode::*;
    Some(match code {
        KeyA => "a",
        KeyB => "b",
        KeyC => "c",
        KeyD => "d",
        KeyE => "e",
        KeyF => "f",
        KeyG => "g",
        KeyH => "h",
        KeyI => "i",
        KeyJ => "j",
        KeyK => "k",
        KeyL => "l",
        KeyM => "m",
        KeyN => "n",
        KeyO => "o",
        KeyP => "p",
        KeyQ => "q",
        KeyR => "r",
        KeyS => "s",
        KeyT => "t",
        KeyU => "u",
        KeyV => "v",
        KeyW => "w",
        KeyX => "x",
        KeyY => "y",
        KeyZ => "z",
        Digit0 => "0",
        Digit1 => "1",
        Digit2 => "2",
        Digit3 => "3",
        Digit4 => "4",
        Digit5 => "5",
        Digit6 => "6",
        Digit7 => "7",
        Digit8 => "8",
        Digit9 => "9",
        Space => "space",
        Enter => "return",
        Escape => "escape",
        ArrowLeft => "left",
        ArrowRight => "right",
        ArrowUp => "up",
        ArrowDown => "down",
        Slash => "slash",
        Period => "period",
        Comma => "comma",
        _ => return None,
    })
}

fn screen_for<'a>(
    phase: Phase,
    display: Option<TrialDisplay>,
    sequencer: &'a Sequencer,
    instructions: &'a str,
    now_ns: u64,
) -> Screen<'a> {
    match phase {
        Phase::Instructions => Screen::Instructions(instructions),
        Phase::Debrief => Screen::Thanks(THANKS),
        Phase::Trials => {
            let Some(trial) = sequencer.current_trial() else {
                return Screen::Blank;
            };
            let search = Screen::Search {
                background: &trial.background_asset,
                letters: &trial.letter_string,
            };
            match display {
                Some(TrialDisplay::Fixation { .. }) => Screen::Fixation,
                Some(TrialDisplay::Onset) => search,
                Some(TrialDisplay::Search { letters_until_ns }) if now_ns < letters_until_ns => {
                    search
                }
                Some(TrialDisplay::Search { .. }) => Screen::Background(&trial.background_asset),
                None => Screen::Blank,
            }
        }
    }
}

/// One refresh interval, if the monitor reports its rate.
fn frame_budget(refresh_rate: Option<f64>) -> Option<Duration> {
    refresh_rate
        .filter(|hz| hz.is_finite() && *hz > 0.0)
        .map(|hz| Duration::from_secs_f64(1.0 / hz))
}

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    font: Option<FontVec>,

    session: Session,
    sequencer: Sequencer,
    timer: HighPrecisionTimer,
    instructions: String,

    phase: Phase,
    display: Option<TrialDisplay>,
    thanks_until_ns: Option<u64>,
    failure: Option<ExperimentError>,

    current_size: Option<PhysicalSize<u32>>,
    scale_factor: f64,
    refresh_rate: Option<f64>,
    should_exit: bool,
}

impl App {
    pub fn new(session: Session, sequencer: Sequencer) -> Result<Self> {
        let font = load_font(&session.config.font_path)?;
        let instructions = instructions(&session.config);
        Ok(Self {
            window: None,
            pixels: None,
            renderer: None,
            font: Some(font),
            session,
            sequencer,
            timer: HighPrecisionTimer::new(),
            instructions,
            phase: Phase::Instructions,
            display: None,
            thanks_until_ns: None,
            failure: None,
            current_size: None,
            scale_factor: 1.0,
            refresh_rate: None,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<(Session, Finished)> {
        let event_loop = EventLoop::new()?;
        info!("Platform: {} ({})", std::env::consts::OS, std::env::consts::ARCH);
        info!(
            "Press {} to start or {} to exit.",
            self.session.config.start_key.to_uppercase(),
            self.session.config.quit_key.to_uppercase()
        );

        let result = event_loop.run_app(&mut self);

        // Closing the window mid-session counts as quitting.
        if !self.sequencer.is_finished() {
            if let Err(e) = self.sequencer.abort() {
                error!("Failed to flush results: {}", e);
            }
        }
        self.log_frame_stats();
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        result?;

        let App {
            session,
            sequencer,
            failure,
            ..
        } = self;
        Ok((
            session,
            Finished {
                sequencer,
                error: failure,
            },
        ))
    }

    fn config(&self) -> &ExperimentConfig {
        &self.session.config
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("No monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title("Perceptual load")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor.clone()))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        self.current_size = Some(physical_size);
        self.scale_factor = window.scale_factor();

        info!(
            "Display: {}x{}, scale {:.2}, refresh {}",
            physical_size.width,
            physical_size.height,
            self.scale_factor,
            self.refresh_rate
                .map(|hz| format!("{hz:.1} Hz"))
                .unwrap_or_else(|| "unknown".into())
        );

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);

        let font = self
            .font
            .take()
            .ok_or_else(|| anyhow!("renderer already created"))?;
        self.renderer = Some(SkiaRenderer::new(
            physical_size.width,
            physical_size.height,
            font,
            self.config().background_size,
        )?);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    /// Loads the trial's background and letters ahead of its fixation so the
    /// search display goes up in one frame.
    fn begin_trial(&mut self, trial: Trial) {
        let path = self.session.pool.path_of(&trial.background_asset);
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        if let Err(e) = renderer.load_background(&trial.background_asset, &path) {
            self.fail(e);
            return;
        }
        renderer.prepare_letters(&trial.letter_string);

        let until_ns = self.timer.now() + Duration::from_millis(trial.fixation_ms).as_nanos() as u64;
        self.display = Some(TrialDisplay::Fixation { until_ns });
        debug!("Trial {} fixation {} ms", trial.index, trial.fixation_ms);
    }

    fn start_trials(&mut self) {
        if let Some(next) = self.phase.next() {
            self.phase = next;
        }
        match self.sequencer.start().cloned() {
            Some(trial) => self.begin_trial(trial),
            None => self.debrief(),
        }
    }

    fn after_response(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::KeepWaiting => {}
            Resolution::Quit => self.debrief(),
            Resolution::Completed(_) => match self.sequencer.advance().cloned() {
                Some(trial) => self.begin_trial(trial),
                None => self.debrief(),
            },
        }
    }

    fn respond(&mut self, event: ResponseEvent) {
        match self.sequencer.respond(event) {
            Ok(resolution) => self.after_response(resolution),
            Err(e) => self.fail(e),
        }
    }

    fn debrief(&mut self) {
        self.display = None;
        self.phase = Phase::Debrief;
        let hold = Duration::from_millis(self.config().thanks_duration_ms);
        self.thanks_until_ns = Some(self.timer.now() + hold.as_nanos() as u64);
    }

    /// Stops the session; rows already written stay on disk.
    fn fail(&mut self, e: ExperimentError) {
        error!("Session halted: {}", e);
        if let Err(flush) = self.sequencer.abort() {
            error!("Failed to flush results: {}", flush);
        }
        self.display = None;
        self.failure = Some(e);
        self.should_exit = true;
    }

    fn render(&mut self) -> Result<()> {
        let screen = screen_for(
            self.phase,
            self.display,
            &self.sequencer,
            &self.instructions,
            self.timer.now(),
        );
        let (Some(pix), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };

        let frame = pix.frame_mut();
        let stats = match renderer.render_frame(screen, frame, &mut self.timer) {
            Ok(stats) => stats,
            Err(e) => {
                self.fail(e);
                return Ok(());
            }
        };
        pix.render()?;

        if frame_budget(self.refresh_rate).is_some_and(|budget| stats.total > budget) {
            warn!(
                "Slow frame: draw {:.3} ms, copy {:.3} ms, total {:.3} ms",
                stats.draw.as_secs_f64() * 1e3,
                stats.copy.as_secs_f64() * 1e3,
                stats.total.as_secs_f64() * 1e3,
            );
        }

        // The search display is on screen once the frame has been handed over.
        if self.display == Some(TrialDisplay::Onset) {
            let onset_ns = self.timer.now();
            self.sequencer.stimulus_presented(onset_ns);
            let letters_for = Duration::from_millis(self.config().stimulus_duration_ms);
            self.display = Some(TrialDisplay::Search {
                letters_until_ns: onset_ns + letters_for.as_nanos() as u64,
            });
        }
        Ok(())
    }

    fn update(&mut self) {
        let now = self.timer.now();
        match (self.phase, self.display) {
            (Phase::Trials, Some(TrialDisplay::Fixation { until_ns })) if now >= until_ns => {
                self.display = Some(TrialDisplay::Onset);
            }
            (Phase::Trials, Some(TrialDisplay::Search { .. })) => {
                if self.sequencer.response_window_elapsed(now) {
                    self.respond(ResponseEvent::Timeout);
                }
            }
            (Phase::Debrief, _) => {
                if self.thanks_until_ns.is_some_and(|t| now >= t) {
                    self.should_exit = true;
                }
            }
            _ => {}
        }
    }

    fn handle_input(&mut self, key: PhysicalKey) {
        let PhysicalKey::Code(code) = key else {
            return;
        };
        let Some(name) = key_name(code) else {
            return;
        };
        let pressed_at = self.timer.now();
        let class = self.sequencer.rules().keys.classify(name);

        match self.phase {
            Phase::Instructions => {
                if class == KeyClass::Quit {
                    info!("Quit before the first trial");
                    if let Err(e) = self.sequencer.abort() {
                        self.fail(e);
                    }
                    self.should_exit = true;
                } else if name.eq_ignore_ascii_case(&self.config().start_key) {
                    self.start_trials();
                }
            }
            Phase::Trials => match self.display {
                Some(TrialDisplay::Search { .. }) => {
                    let rt = match self.sequencer.onset_ns() {
                        Some(onset) => Duration::from_nanos(pressed_at.saturating_sub(onset)),
                        None => Duration::ZERO,
                    };
                    self.respond(ResponseEvent::key(name, rt));
                }
                // Only quitting is possible before the stimulus is up.
                _ if class == KeyClass::Quit => {
                    if let Err(e) = self.sequencer.abort() {
                        self.fail(e);
                    } else {
                        self.debrief();
                    }
                }
                _ => {}
            },
            Phase::Debrief => {}
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        self.current_size = Some(new_size);
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                warn!("Failed to resize surface: {}", e);
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                warn!("Failed to resize buffer: {}", e);
            }
        }
        if let Some(renderer) = self.renderer.as_mut() {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                error!("Failed to resize renderer: {}", e);
            }
        }
        // Backgrounds are refitted to the new size.
        if let Some(trial) = self.sequencer.current_trial().cloned() {
            let path = self.session.pool.path_of(&trial.background_asset);
            if let Some(renderer) = self.renderer.as_mut() {
                if let Err(e) = renderer.load_background(&trial.background_asset, &path) {
                    self.fail(e);
                }
            }
        }
        info!("Display resized to {}x{}", new_size.width, new_size.height);
    }

    fn log_frame_stats(&self) {
        let stats = self.timer.frame_stats();
        if stats.samples == 0 {
            return;
        }
        info!(
            "Frames: {} samples, mean {:.3} ms, jitter {:.3} ms, min {:.3} ms, max {:.3} ms",
            stats.samples,
            stats.average_frame_time_ns / 1e6,
            stats.jitter_ns / 1e6,
            stats.min_frame_time_ns / 1e6,
            stats.max_frame_time_ns / 1e6,
        );
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!("Failed to create window and surface: {}", e);
                self.failure = Some(ExperimentError::Presentation(e.to_string()));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Window closed");
                self.should_exit = true;
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    self.fail(ExperimentError::Presentation(e.to_string()));
                }
                self.update();
                if let Some(win) = &self.window {
                    win.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed() && !event.repeat =>
            {
                self.handle_input(event.physical_key);
            }
            WindowEvent::Resized(sz) => self.handle_resize(sz),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.scale_factor = scale_factor;
                if let Some(window) = &self.window {
                    self.handle_resize(window.inner_size());
                }
            }
            _ => {}
        }
        if self.should_exit {
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}
