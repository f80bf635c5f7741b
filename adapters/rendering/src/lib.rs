#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for monument adapters.
//!
//! The engine never issues draw calls. Backends keep a retained [`Scene`]
//! that mirrors the engine's instance batches: batches are attached and
//! detached from the event stream, and their buffers are copied only when the
//! batch reports a newer revision than the one last synced.

use anyhow::Result as AnyResult;
use glam::Vec3;
use monument_core::{BatchKey, Event, InstanceColor};
use monument_system_batching::{BatchManager, BatchRevision};
use std::{collections::BTreeMap, error::Error, f32::consts::TAU, fmt, time::Duration};

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Returns a new color lightened towards white by the provided amount.
    #[must_use]
    pub fn lighten(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);

        Self {
            red: lighten_channel(self.red, amount),
            green: lighten_channel(self.green, amount),
            blue: lighten_channel(self.blue, amount),
            alpha: self.alpha,
        }
    }
}

impl From<InstanceColor> for Color {
    fn from(color: InstanceColor) -> Self {
        Self::new(color.red, color.green, color.blue, 1.0)
    }
}

fn lighten_channel(channel: f32, amount: f32) -> f32 {
    channel + (1.0 - channel) * amount
}

/// Input snapshot gathered by adapters before updating the scene.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct FrameInput {
    /// Requested orbit direction, `-1.0..=1.0`.
    pub orbit: f32,
    /// Requested zoom direction, positive moves the camera closer.
    pub zoom: f32,
}

/// Camera circling a focus point at a fixed height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitCamera {
    /// Point the camera looks at.
    pub focus: Vec3,
    /// Horizontal distance from the focus.
    pub distance: f32,
    /// Height above the focus.
    pub height: f32,
    /// Current angle around the focus in radians.
    pub yaw: f32,
    /// Idle rotation in radians per second.
    pub orbit_speed: f32,
}

impl OrbitCamera {
    const MIN_DISTANCE: f32 = 4.0;
    const ZOOM_RATE: f32 = 0.8;

    /// Creates a camera, rejecting degenerate distances.
    pub fn new(
        focus: Vec3,
        distance: f32,
        height: f32,
        orbit_speed: f32,
    ) -> Result<Self, RenderingError> {
        if !(distance.is_finite() && distance >= Self::MIN_DISTANCE) {
            return Err(RenderingError::InvalidCameraDistance { distance });
        }
        Ok(Self {
            focus,
            distance,
            height,
            yaw: 0.0,
            orbit_speed,
        })
    }

    /// World-space camera position.
    #[must_use]
    pub fn eye(&self) -> Vec3 {
        let offset = Vec3::new(
            self.yaw.cos() * self.distance,
            self.height,
            self.yaw.sin() * self.distance,
        );
        self.focus + offset
    }

    /// Applies idle rotation and user input for one frame.
    pub fn advance(&mut self, dt: Duration, input: FrameInput) {
        let seconds = dt.as_secs_f32();
        self.yaw = (self.yaw + (self.orbit_speed + input.orbit) * seconds).rem_euclid(TAU);
        let zoom = 1.0 - input.zoom.clamp(-1.0, 1.0) * Self::ZOOM_RATE * seconds;
        self.distance = (self.distance * zoom).max(Self::MIN_DISTANCE);
    }
}

/// Retained copy of one engine batch.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneBatch {
    /// Key of the mirrored batch.
    pub key: BatchKey,
    /// Number of instances the batch can hold.
    pub capacity: usize,
    /// Nominal block size of the batch's shape.
    pub extents: Vec3,
    positions: Vec<Vec3>,
    colors: Vec<Color>,
    synced: Option<BatchRevision>,
}

impl SceneBatch {
    fn attached(key: BatchKey, capacity: usize) -> Self {
        Self {
            key,
            capacity,
            extents: key.shape.extents(),
            positions: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
            synced: None,
        }
    }

    /// Centres and colours of the mirrored instances.
    pub fn instances(&self) -> impl Iterator<Item = (Vec3, Color)> + '_ {
        self.positions
            .iter()
            .copied()
            .zip(self.colors.iter().copied())
    }

    /// Number of mirrored instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.positions.len().min(self.colors.len())
    }
}

/// Progress overlay shown above the scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Hud {
    /// Name of the structure under construction.
    pub active_name: Option<String>,
    /// Icon of the structure under construction.
    pub active_icon: Option<String>,
    /// Placed fraction of the structure under construction.
    pub active_progress: f32,
    /// Blocks committed across all structures.
    pub placed: usize,
    /// Slots across all structures.
    pub total: usize,
}

impl Hud {
    /// Single-line summary of the overlay.
    #[must_use]
    pub fn caption(&self) -> String {
        match (&self.active_icon, &self.active_name) {
            (Some(icon), Some(name)) => format!(
                "{icon} {name} {:.0}% | {}/{} blocks",
                self.active_progress * 100.0,
                self.placed,
                self.total
            ),
            _ => format!("Complete | {}/{} blocks", self.placed, self.total),
        }
    }
}

/// Retained scene mirroring the engine's batches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    batches: BTreeMap<BatchKey, SceneBatch>,
    /// Overlay refreshed by the host each frame.
    pub hud: Hud,
}

impl Scene {
    /// Creates an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches and detaches batches announced by the engine.
    pub fn apply_events(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::BatchAttached { key, capacity } => {
                    let _ = self
                        .batches
                        .entry(*key)
                        .or_insert_with(|| SceneBatch::attached(*key, *capacity));
                }
                Event::BatchesDetached { keys } => {
                    for key in keys {
                        let _ = self.batches.remove(key);
                    }
                }
                _ => {}
            }
        }
    }

    /// Copies every buffer whose batch revision moved since the last sync.
    ///
    /// Returns the number of buffers copied. Only attached batches are synced.
    pub fn sync(&mut self, manager: &BatchManager) -> usize {
        let mut uploads = 0;
        for (key, mirror) in &mut self.batches {
            let Some(batch) = manager.batch(*key) else {
                continue;
            };
            let revision = batch.revision();
            let previous = mirror.synced;

            if previous.map(|synced| synced.transforms) != Some(revision.transforms) {
                mirror.positions.clear();
                for transform in batch.transforms() {
                    mirror.positions.push(transform.translation());
                }
                uploads += 1;
            }
            if previous.map(|synced| synced.colors) != Some(revision.colors) {
                mirror.colors.clear();
                mirror
                    .colors
                    .extend(batch.colors().iter().copied().map(Color::from));
                uploads += 1;
            }
            mirror.synced = Some(revision);
        }
        uploads
    }

    /// Attached batches in key order.
    pub fn batches(&self) -> impl Iterator<Item = &SceneBatch> {
        self.batches.values()
    }

    /// Number of mirrored instances across every batch.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.batches.values().map(SceneBatch::instance_count).sum()
    }
}

/// Presentation descriptor consumed by rendering backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Title used by the created window.
    pub window_title: String,
    /// Solid color used to clear each frame.
    pub clear_color: Color,
    /// Color of the ground plane.
    pub ground_color: Color,
    /// Initial camera.
    pub camera: OrbitCamera,
    /// Scene content that should be displayed.
    pub scene: Scene,
}

impl Presentation {
    /// Constructs a new presentation descriptor.
    #[must_use]
    pub fn new<T>(window_title: T, clear_color: Color, camera: OrbitCamera, scene: Scene) -> Self
    where
        T: Into<String>,
    {
        Self {
            window_title: window_title.into(),
            clear_color,
            ground_color: clear_color.lighten(0.15),
            camera,
            scene,
        }
    }
}

/// Rendering backend capable of presenting monument scenes.
pub trait RenderingBackend {
    /// Runs the rendering backend until it is requested to exit.
    ///
    /// The provided `update_scene` closure receives the frame delta and the
    /// input captured by the adapter, and is expected to advance the engine
    /// and sync the scene before it is drawn.
    fn run<F>(self, presentation: Presentation, update_scene: F) -> AnyResult<()>
    where
        F: FnMut(Duration, FrameInput, &mut Scene) + 'static;
}

/// Errors that can occur when constructing rendering descriptors.
#[derive(Debug, PartialEq)]
pub enum RenderingError {
    /// The camera would sit inside the scene.
    InvalidCameraDistance {
        /// Provided distance that failed validation.
        distance: f32,
    },
}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCameraDistance { distance } => {
                write!(
                    f,
                    "camera distance must be at least {} (received {distance})",
                    OrbitCamera::MIN_DISTANCE
                )
            }
        }
    }
}

impl Error for RenderingError {}
