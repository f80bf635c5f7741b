#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Macroquad-backed rendering adapter for the monument engine.
//!
//! Macroquad's optional audio stack depends on native ALSA development
//! libraries, which are unavailable in the containerised CI environment.
//! To keep `cargo test` usable everywhere we depend on macroquad without its
//! default `audio` feature.
//!
//! Blocks are drawn as boxes sized by their shape's nominal extents; the
//! backend reads the retained scene and never touches engine state.

use anyhow::Result;
use macroquad::{
    camera::{set_camera, set_default_camera, Camera3D},
    input::{is_key_down, is_key_pressed, mouse_wheel, KeyCode},
    math::{vec2, vec3, Vec3 as MacroquadVec3},
};
use monument_rendering::{Color, FrameInput, Presentation, RenderingBackend, Scene};
use std::time::{Duration, Instant};

const GROUND_SIZE: f32 = 160.0;
const HUD_FONT_SIZE: f32 = 28.0;
const HUD_MARGIN: f32 = 16.0;

/// Snapshot of the keys and wheel observed during a single frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct KeyboardState {
    /// `Q` or `Escape` to quit the render loop.
    quit_requested: bool,
    /// `W` toggles block outlines.
    toggle_wireframe: bool,
    orbit_left: bool,
    orbit_right: bool,
    zoom_in: bool,
    zoom_out: bool,
    wheel: f32,
}

impl KeyboardState {
    fn poll() -> Self {
        Self {
            quit_requested: is_key_pressed(KeyCode::Escape) || is_key_pressed(KeyCode::Q),
            toggle_wireframe: is_key_pressed(KeyCode::W),
            orbit_left: is_key_down(KeyCode::Left),
            orbit_right: is_key_down(KeyCode::Right),
            zoom_in: is_key_down(KeyCode::Up),
            zoom_out: is_key_down(KeyCode::Down),
            wheel: mouse_wheel().1,
        }
    }

    fn frame_input(&self) -> FrameInput {
        let orbit = f32::from(u8::from(self.orbit_right)) - f32::from(u8::from(self.orbit_left));
        let keys = f32::from(u8::from(self.zoom_in)) - f32::from(u8::from(self.zoom_out));
        let zoom = (keys + self.wheel.signum() * f32::from(u8::from(self.wheel != 0.0)))
            .clamp(-1.0, 1.0);
        FrameInput { orbit, zoom }
    }
}

/// Rendering backend implemented on top of macroquad.
#[derive(Debug, Default)]
pub struct MacroquadBackend {
    swap_interval: Option<i32>,
    show_fps: bool,
    wireframe: bool,
}

impl MacroquadBackend {
    /// Returns a backend that requests the platform's default swap interval.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the backend to either synchronise presentation with the display refresh rate
    /// or render as fast as possible.
    #[must_use]
    pub fn with_vsync(mut self, enabled: bool) -> Self {
        self.swap_interval = Some(i32::from(enabled));
        self
    }

    /// Configures whether the backend logs frame timing metrics once per second.
    #[must_use]
    pub fn with_show_fps(mut self, show: bool) -> Self {
        self.show_fps = show;
        self
    }

    /// Configures whether block outlines are drawn from the first frame.
    #[must_use]
    pub fn with_wireframe(mut self, enabled: bool) -> Self {
        self.wireframe = enabled;
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct FrameBreakdown {
    frame: Duration,
    update: Duration,
    render: Duration,
}

/// Averages frame timings over one-second windows.
#[derive(Debug, Default)]
struct FpsCounter {
    elapsed: Duration,
    frames: u32,
    update_accum: Duration,
    render_accum: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct FpsMetrics {
    per_second: f32,
    avg_update: Duration,
    avg_render: Duration,
}

impl FpsCounter {
    /// Records a frame and returns averages once a second has elapsed.
    fn record_frame(&mut self, breakdown: FrameBreakdown) -> Option<FpsMetrics> {
        self.elapsed += breakdown.frame;
        self.frames = self.frames.saturating_add(1);
        self.update_accum += breakdown.update;
        self.render_accum += breakdown.render;

        if self.elapsed < Duration::from_secs(1) {
            return None;
        }

        let metrics = FpsMetrics {
            per_second: self.frames as f32 / self.elapsed.as_secs_f32(),
            avg_update: self.update_accum / self.frames,
            avg_render: self.render_accum / self.frames,
        };
        *self = Self::default();
        Some(metrics)
    }
}

impl RenderingBackend for MacroquadBackend {
    fn run<F>(self, presentation: Presentation, mut update_scene: F) -> Result<()>
    where
        F: FnMut(Duration, FrameInput, &mut Scene) + 'static,
    {
        let Self {
            swap_interval,
            show_fps,
            wireframe,
        } = self;

        let Presentation {
            window_title,
            clear_color,
            ground_color,
            camera,
            scene,
        } = presentation;

        let mut config = macroquad::window::Conf {
            window_title,
            window_width: 1280,
            window_height: 800,
            ..macroquad::window::Conf::default()
        };
        if let Some(swap_interval) = swap_interval {
            config.platform.swap_interval = Some(swap_interval);
        }

        macroquad::Window::from_config(config, async move {
            let mut scene = scene;
            let mut camera = camera;
            let mut wireframe = wireframe;
            let mut fps_counter = FpsCounter::default();
            let background = to_macroquad_color(clear_color);
            let ground = to_macroquad_color(ground_color);

            loop {
                let keyboard = KeyboardState::poll();
                if keyboard.quit_requested {
                    break;
                }
                if keyboard.toggle_wireframe {
                    wireframe = !wireframe;
                }

                let dt_seconds = macroquad::time::get_frame_time();
                let frame_dt = Duration::from_secs_f32(dt_seconds.max(0.0));
                let frame_input = keyboard.frame_input();

                let update_start = Instant::now();
                update_scene(frame_dt, frame_input, &mut scene);
                camera.advance(frame_dt, frame_input);
                let update_duration = update_start.elapsed();

                let render_start = Instant::now();
                macroquad::window::clear_background(background);
                set_camera(&Camera3D {
                    position: to_macroquad_vec3(camera.eye()),
                    target: to_macroquad_vec3(camera.focus),
                    up: vec3(0.0, 1.0, 0.0),
                    ..Camera3D::default()
                });
                macroquad::models::draw_plane(
                    vec3(0.0, 0.0, 0.0),
                    vec2(GROUND_SIZE, GROUND_SIZE),
                    None,
                    ground,
                );
                draw_blocks(&scene, wireframe);

                set_default_camera();
                let _ = macroquad::text::draw_text(
                    &scene.hud.caption(),
                    HUD_MARGIN,
                    HUD_MARGIN + HUD_FONT_SIZE,
                    HUD_FONT_SIZE,
                    macroquad::color::WHITE,
                );
                let render_duration = render_start.elapsed();

                let metrics = fps_counter.record_frame(FrameBreakdown {
                    frame: frame_dt,
                    update: update_duration,
                    render: render_duration,
                });
                if show_fps {
                    if let Some(metrics) = metrics {
                        log::info!(
                            "FPS: {:.2} | update: {:>6.2}ms render: {:>6.2}ms",
                            metrics.per_second,
                            metrics.avg_update.as_secs_f64() * 1_000.0,
                            metrics.avg_render.as_secs_f64() * 1_000.0,
                        );
                    }
                }

                macroquad::window::next_frame().await;
            }
        });

        Ok(())
    }
}

fn draw_blocks(scene: &Scene, wireframe: bool) {
    for batch in scene.batches() {
        let size = to_macroquad_vec3(batch.extents);
        for (position, color) in batch.instances() {
            let position = to_macroquad_vec3(position);
            macroquad::models::draw_cube(position, size, None, to_macroquad_color(color));
            if wireframe {
                macroquad::models::draw_cube_wires(
                    position,
                    size,
                    to_macroquad_color(color.lighten(0.35)),
                );
            }
        }
    }
}

fn to_macroquad_vec3(vector: glam::Vec3) -> MacroquadVec3 {
    vec3(vector.x, vector.y, vector.z)
}

fn to_macroquad_color(color: Color) -> macroquad::color::Color {
    macroquad::color::Color::new(color.red, color.green, color.blue, color.alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_channels_are_forwarded() {
        let converted = to_macroquad_color(Color::new(0.1, 0.2, 0.3, 0.4));
        assert_eq!(
            (converted.r, converted.g, converted.b, converted.a),
            (0.1, 0.2, 0.3, 0.4)
        );
    }

    #[test]
    fn arrow_keys_map_to_orbit_and_zoom() {
        let keyboard = KeyboardState {
            orbit_left: true,
            zoom_in: true,
            ..KeyboardState::default()
        };
        assert_eq!(
            keyboard.frame_input(),
            FrameInput {
                orbit: -1.0,
                zoom: 1.0
            }
        );
    }

    #[test]
    fn wheel_zoom_is_clamped() {
        let keyboard = KeyboardState {
            zoom_in: true,
            wheel: 3.0,
            ..KeyboardState::default()
        };
        assert_eq!(keyboard.frame_input().zoom, 1.0);

        let keyboard = KeyboardState {
            wheel: -0.5,
            ..KeyboardState::default()
        };
        assert_eq!(keyboard.frame_input().zoom, -1.0);
    }

    #[test]
    fn fps_counter_reports_once_per_second() {
        let mut counter = FpsCounter::default();
        let frame = FrameBreakdown {
            frame: Duration::from_millis(250),
            update: Duration::from_millis(2),
            render: Duration::from_millis(4),
        };
        assert!(counter.record_frame(frame).is_none());
        assert!(counter.record_frame(frame).is_none());
        assert!(counter.record_frame(frame).is_none());
        let metrics = counter.record_frame(frame).expect("a second elapsed");
        assert!((metrics.per_second - 4.0).abs() < 1e-4);
        assert_eq!(metrics.avg_update, Duration::from_millis(2));
        assert_eq!(metrics.avg_render, Duration::from_millis(4));
        assert!(counter.record_frame(frame).is_none());
    }
}
