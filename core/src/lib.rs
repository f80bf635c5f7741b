#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the monument construction engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and the construction systems. Adapters submit
//! [`Command`] values describing progress updates, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! that audio, UI and rendering collaborators react to. The static data the
//! engine builds from (structure layouts and era visuals) and the GPU-facing
//! instance buffer element types also live here so that every crate agrees on
//! their shape.

use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Ordinal of a structure in build order.
///
/// The primary pyramid always occupies index zero; secondary structures from
/// the catalog follow in registry order starting at one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureIndex(u32);

impl StructureIndex {
    /// Build-order index of the primary stepped pyramid.
    pub const PYRAMID: Self = Self(0);

    /// Creates a new structure index with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Index of the catalog entry at the provided zero-based registry position.
    #[must_use]
    pub const fn catalog(position: u32) -> Self {
        Self(position + 1)
    }

    /// Retrieves the numeric representation of the index.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Zero-based catalog registry position, or `None` for the pyramid.
    #[must_use]
    pub const fn catalog_position(&self) -> Option<u32> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0 - 1)
        }
    }
}

/// Visual progression tier controlling block colour and material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EraIndex(u32);

impl EraIndex {
    /// The first era.
    pub const FIRST: Self = Self(0);

    /// Creates a new era index with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the era.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Clamps the era to the last row of a table holding `rows` entries.
    #[must_use]
    pub fn clamp_to(self, rows: usize) -> Self {
        let last = rows.saturating_sub(1);
        let last = u32::try_from(last).unwrap_or(u32::MAX);
        Self(self.0.min(last))
    }
}

/// Identifies a single slot within a structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotRef {
    /// Structure that owns the slot.
    pub structure: StructureIndex,
    /// Position of the slot within the structure's build sequence.
    pub slot: u32,
}

impl SlotRef {
    /// Creates a new slot reference.
    #[must_use]
    pub const fn new(structure: StructureIndex, slot: u32) -> Self {
        Self { structure, slot }
    }
}

/// Closed set of block silhouettes.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// Unit cube.
    #[default]
    Cube,
    /// Round column drum.
    Cylinder,
    /// Sloped ramp block.
    Wedge,
    /// Half-height cube.
    Half,
    /// Flared column capital.
    Capital,
    /// Thin, wide paving slab.
    Slab,
    /// Column drum with vertical flutes.
    FlutedCylinder,
    /// Cube with chamfered vertical edges.
    BeveledCube,
    /// Capital carved as an opening lotus.
    LotusCapital,
}

impl Shape {
    /// Every shape variant in declaration order.
    pub const ALL: [Shape; 9] = [
        Shape::Cube,
        Shape::Cylinder,
        Shape::Wedge,
        Shape::Half,
        Shape::Capital,
        Shape::Slab,
        Shape::FlutedCylinder,
        Shape::BeveledCube,
        Shape::LotusCapital,
    ];

    /// Reports whether the shape is a flat horizontal piece.
    #[must_use]
    pub const fn is_flat(self) -> bool {
        matches!(self, Self::Half | Self::Slab)
    }

    /// Nominal bounding size of the shape measured in block units.
    #[must_use]
    pub fn extents(self) -> Vec3 {
        match self {
            Self::Cube | Self::BeveledCube | Self::Wedge => Vec3::ONE,
            Self::Cylinder | Self::FlutedCylinder => Vec3::new(0.8, 1.0, 0.8),
            Self::Half => Vec3::new(1.0, 0.5, 1.0),
            Self::Capital => Vec3::new(1.2, 0.5, 1.2),
            Self::Slab => Vec3::new(1.0, 0.25, 1.0),
            Self::LotusCapital => Vec3::new(1.1, 0.6, 1.1),
        }
    }
}

/// One buildable position within a structure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockSlot {
    position: Vec3,
    shape: Shape,
    placed: bool,
}

impl BlockSlot {
    /// Creates an unplaced slot at the provided world position.
    #[must_use]
    pub const fn new(position: Vec3, shape: Shape) -> Self {
        Self {
            position,
            shape,
            placed: false,
        }
    }

    /// World-space resting position of the slot's block.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Silhouette of the slot's block.
    #[must_use]
    pub const fn shape(&self) -> Shape {
        self.shape
    }

    /// Reports whether the slot's block has been committed to a batch.
    #[must_use]
    pub const fn is_placed(&self) -> bool {
        self.placed
    }

    /// Marks the slot as placed, returning `false` when it already was.
    pub fn mark_placed(&mut self) -> bool {
        if self.placed {
            return false;
        }
        self.placed = true;
        true
    }
}

/// Catalog description of a single slot, relative to its structure's offset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotDescriptor {
    /// Position relative to the owning structure's world offset.
    pub position: Vec3,
    /// Optional silhouette; cubes are assumed when absent.
    #[serde(default)]
    pub shape: Option<Shape>,
}

impl SlotDescriptor {
    /// Creates a slot descriptor.
    #[must_use]
    pub const fn new(position: Vec3, shape: Option<Shape>) -> Self {
        Self { position, shape }
    }
}

/// Catalog description of a secondary structure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructureDescriptor {
    /// Stable identifier.
    pub id: String,
    /// Name shown while the structure is under construction.
    pub display_name: String,
    /// Short glyph shown next to the name.
    pub icon: String,
    /// Anchor of the structure in the shared world.
    pub world_offset: Vec3,
    /// Slots in build order.
    pub slots: Vec<SlotDescriptor>,
}

impl StructureDescriptor {
    /// Materialises the descriptor's slots at their world positions.
    #[must_use]
    pub fn block_slots(&self) -> Vec<BlockSlot> {
        self.slots
            .iter()
            .map(|slot| {
                BlockSlot::new(
                    self.world_offset + slot.position,
                    slot.shape.unwrap_or_default(),
                )
            })
            .collect()
    }
}

/// Contiguous range of cumulative block indices built during one era.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneBlockRange {
    /// First cumulative block index covered by the range.
    pub start_block: u64,
    /// Cumulative block index one past the end of the range.
    pub end_block: u64,
    /// Era active while the range's blocks were earned.
    pub era: EraIndex,
}

impl MilestoneBlockRange {
    /// Creates a new range covering `start_block..end_block`.
    #[must_use]
    pub const fn new(start_block: u64, end_block: u64, era: EraIndex) -> Self {
        Self {
            start_block,
            end_block,
            era,
        }
    }

    /// Reports whether the cumulative block index falls inside the range.
    #[must_use]
    pub const fn contains(&self, block: u64) -> bool {
        self.start_block <= block && block < self.end_block
    }
}

/// Resolves the era a historical block was earned in.
///
/// Returns `fallback` when no range covers the block.
#[must_use]
pub fn resolve_era(ranges: &[MilestoneBlockRange], block: u64, fallback: EraIndex) -> EraIndex {
    ranges
        .iter()
        .find(|range| range.contains(block))
        .map_or(fallback, |range| range.era)
}

/// Visual description of a single era.
///
/// Hue, saturation and lightness are expressed in the `0.0..=1.0` range; each
/// jitter value is the half-width of the uniform range sampled around its base.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EraVisual {
    /// Base hue in turns.
    pub hue: f32,
    /// Half-width of the per-block hue jitter.
    pub hue_jitter: f32,
    /// Base saturation.
    pub saturation: f32,
    /// Half-width of the per-block saturation jitter.
    pub saturation_jitter: f32,
    /// Base lightness.
    pub lightness: f32,
    /// Half-width of the per-block lightness jitter.
    pub lightness_jitter: f32,
    /// Surface roughness of the era's material.
    pub roughness: f32,
    /// Metalness of the era's material.
    pub metalness: f32,
    /// Emissive intensity of the era's material.
    pub emissive_intensity: f32,
}

/// Default five-era progression: mudbrick, limestone, granite, alabaster, gilded.
#[must_use]
pub fn default_era_table() -> Vec<EraVisual> {
    vec![
        EraVisual {
            hue: 0.075,
            hue_jitter: 0.015,
            saturation: 0.38,
            saturation_jitter: 0.06,
            lightness: 0.42,
            lightness_jitter: 0.06,
            roughness: 0.95,
            metalness: 0.0,
            emissive_intensity: 0.0,
        },
        EraVisual {
            hue: 0.11,
            hue_jitter: 0.01,
            saturation: 0.30,
            saturation_jitter: 0.05,
            lightness: 0.72,
            lightness_jitter: 0.05,
            roughness: 0.85,
            metalness: 0.0,
            emissive_intensity: 0.0,
        },
        EraVisual {
            hue: 0.02,
            hue_jitter: 0.02,
            saturation: 0.18,
            saturation_jitter: 0.05,
            lightness: 0.46,
            lightness_jitter: 0.08,
            roughness: 0.7,
            metalness: 0.05,
            emissive_intensity: 0.0,
        },
        EraVisual {
            hue: 0.12,
            hue_jitter: 0.01,
            saturation: 0.12,
            saturation_jitter: 0.03,
            lightness: 0.86,
            lightness_jitter: 0.03,
            roughness: 0.5,
            metalness: 0.05,
            emissive_intensity: 0.02,
        },
        EraVisual {
            hue: 0.13,
            hue_jitter: 0.01,
            saturation: 0.72,
            saturation_jitter: 0.06,
            lightness: 0.55,
            lightness_jitter: 0.06,
            roughness: 0.3,
            metalness: 0.85,
            emissive_intensity: 0.12,
        },
    ]
}

/// Identifies a shared draw batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchKey {
    /// Structure whose blocks the batch holds.
    pub structure: StructureIndex,
    /// Silhouette shared by every block in the batch.
    pub shape: Shape,
    /// Era shared by every block in the batch.
    pub era: EraIndex,
}

impl BatchKey {
    /// Creates a new batch key.
    #[must_use]
    pub const fn new(structure: StructureIndex, shape: Shape, era: EraIndex) -> Self {
        Self {
            structure,
            shape,
            era,
        }
    }
}

/// Column-major 4x4 per-instance transform, laid out for direct GPU upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceTransform {
    /// Matrix columns flattened in column-major order.
    pub columns: [f32; 16],
}

impl InstanceTransform {
    /// Builds a pure translation transform.
    #[must_use]
    pub fn from_translation(position: Vec3) -> Self {
        Self {
            columns: Mat4::from_translation(position).to_cols_array(),
        }
    }

    /// Translation component of the transform.
    #[must_use]
    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.columns[12], self.columns[13], self.columns[14])
    }
}

/// Linear RGB per-instance colour, laid out for direct GPU upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceColor {
    /// Red channel in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel in the range 0.0..=1.0.
    pub blue: f32,
}

impl InstanceColor {
    /// Creates a colour from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    /// Converts hue/saturation/lightness (all `0.0..=1.0`) into RGB.
    #[must_use]
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let hue = hue.rem_euclid(1.0);
        let saturation = saturation.clamp(0.0, 1.0);
        let lightness = lightness.clamp(0.0, 1.0);
        if saturation <= f32::EPSILON {
            return Self::new(lightness, lightness, lightness);
        }

        let q = if lightness < 0.5 {
            lightness * (1.0 + saturation)
        } else {
            lightness + saturation - lightness * saturation
        };
        let p = 2.0 * lightness - q;
        Self::new(
            hue_to_channel(p, q, hue + 1.0 / 3.0),
            hue_to_channel(p, q, hue),
            hue_to_channel(p, q, hue - 1.0 / 3.0),
        )
    }
}

fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

/// Commands accepted by the world from the event layer and the host loop.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Reports a new cumulative block total earned during the live session.
    QueueBlocks {
        /// Cumulative number of blocks earned so far.
        total: u64,
        /// Era active at the time of the update.
        era: EraIndex,
    },
    /// Instantly catches construction up to a persisted cumulative total.
    RestoreBlocks {
        /// Persisted cumulative number of blocks.
        total: u64,
        /// Historical mapping from cumulative block index to era.
        ranges: Vec<MilestoneBlockRange>,
    },
    /// Advances animations by the time elapsed since the previous frame.
    Tick {
        /// Duration elapsed since the previous tick.
        dt: Duration,
    },
    /// Releases every batch, geometry and material for scene teardown.
    DisposeAll,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A structure received its first block.
    StructureStarted {
        /// Structure that began construction.
        structure: StructureIndex,
    },
    /// A draw batch was allocated and should be attached to the scene graph.
    BatchAttached {
        /// Key of the allocated batch.
        key: BatchKey,
        /// Number of instances the batch can hold.
        capacity: usize,
    },
    /// Draw batches were released and should be removed from the scene graph.
    BatchesDetached {
        /// Keys of the released batches.
        keys: Vec<BatchKey>,
    },
    /// A queued block began its drop animation.
    BlockFalling {
        /// Slot receiving the block.
        slot: SlotRef,
    },
    /// A falling block settled at its resting position.
    BlockLanded {
        /// Slot that received the block.
        slot: SlotRef,
    },
    /// Blocks were placed instantly by a restore.
    BlocksRestored {
        /// Number of blocks placed by the restore.
        count: u64,
    },
}
