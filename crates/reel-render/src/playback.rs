//! Interactive playback.
//!
//! The clock is an explicit value advanced by [`PlaybackClock::tick`]; the
//! renderer never reads wall time. Export drives the same controller with
//! `seek` instead of `tick`.

use reel_ir::Scene;

use crate::renderer::{RenderOutput, SceneRenderer};

/// Seconds advanced by one playback tick.
pub const TICK_SECONDS: f64 = 0.016;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
}

/// Playback position within `[0, duration]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackClock {
    time: f64,
    duration: f64,
    state: PlayState,
}

impl PlaybackClock {
    pub fn new(duration: f64) -> Self {
        Self {
            time: 0.0,
            duration: duration.max(0.0),
            state: PlayState::Paused,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn play(&mut self) {
        self.state = PlayState::Playing;
    }

    pub fn pause(&mut self) {
        self.state = PlayState::Paused;
    }

    pub fn toggle(&mut self) {
        self.state = match self.state {
            PlayState::Playing => PlayState::Paused,
            PlayState::Paused => PlayState::Playing,
        };
    }

    /// Jump to `time`, clamped to the scene. Play state is unchanged.
    pub fn seek(&mut self, time: f64) {
        self.time = if time.is_nan() {
            0.0
        } else {
            time.clamp(0.0, self.duration)
        };
    }

    /// Advance one tick while playing. Reaching the end rewinds to zero and
    /// pauses.
    pub fn tick(&mut self) -> f64 {
        if self.state == PlayState::Playing {
            self.time += TICK_SECONDS;
            if self.time >= self.duration {
                self.time = 0.0;
                self.state = PlayState::Paused;
            }
        }
        self.time
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration.max(0.0);
        self.time = self.time.min(self.duration);
    }
}

/// A scene, a renderer and a clock. Preview and export both render through
/// [`PlaybackController::render_current`].
pub struct PlaybackController {
    scene: Scene,
    renderer: SceneRenderer,
    clock: PlaybackClock,
}

impl PlaybackController {
    pub fn new(scene: Scene, renderer: SceneRenderer) -> Self {
        let clock = PlaybackClock::new(scene.duration_seconds());
        Self {
            scene,
            renderer,
            clock,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Swap in an edited scene, keeping the playback position when it still
    /// fits.
    pub fn replace_scene(&mut self, scene: Scene) {
        self.clock.set_duration(scene.duration_seconds());
        self.scene = scene;
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut PlaybackClock {
        &mut self.clock
    }

    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    pub fn seek(&mut self, time: f64) {
        self.clock.seek(time);
    }

    pub fn tick(&mut self) -> f64 {
        self.clock.tick()
    }

    /// Render the current time at `width x height`, scaling pixel values by
    /// `width / native_width`.
    pub fn render_current(&mut self, width: u32, height: u32) -> RenderOutput {
        let scale = width as f64 / self.scene.native_width().max(1) as f64;
        let time = self.clock.time();
        tracing::debug!(time, width, height, "render");
        self.renderer
            .render(&self.scene, time, width, height, scale)
    }
}
