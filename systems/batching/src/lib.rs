#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Instance batch manager that groups placed blocks into shared draw batches.
//!
//! Blocks are grouped by `(structure, shape, era)` so the renderer issues one
//! draw call per [`InstanceBatch`] rather than one per block. Batches are
//! allocated lazily on first use of their key, sized to the number of slots
//! in the owning structure that share the batch's shape, and never destroyed
//! until [`BatchManager::dispose_all`] tears the whole scene down. The manager
//! also owns the shared per-shape meshes and the per-era materials.

pub mod color;
pub mod geometry;
pub mod material;

use std::collections::{BTreeMap, HashMap};

use glam::Vec3;
use monument_core::{
    BatchKey, BlockSlot, EraIndex, EraVisual, InstanceColor, InstanceTransform, Shape,
    StructureIndex,
};
use rand::Rng;

pub use self::color::sample_block_color;
pub use self::geometry::{GeometryRegistry, ShapeGeometry};
pub use self::material::{EraMaterial, MaterialRegistry};

/// Monotonic change counters for a batch's buffers.
///
/// Renderers remember the revision they last uploaded and re-upload a buffer
/// whenever the batch reports a newer one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BatchRevision {
    /// Incremented whenever any transform changes.
    pub transforms: u64,
    /// Incremented whenever a colour is written.
    pub colors: u64,
}

/// GPU-facing group of blocks sharing structure, shape and era.
#[derive(Clone, Debug)]
pub struct InstanceBatch {
    key: BatchKey,
    capacity: usize,
    transforms: Vec<InstanceTransform>,
    colors: Vec<InstanceColor>,
    revision: BatchRevision,
}

impl InstanceBatch {
    fn new(key: BatchKey, capacity: usize) -> Self {
        Self {
            key,
            capacity,
            transforms: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
            revision: BatchRevision::default(),
        }
    }

    /// Key identifying the batch.
    #[must_use]
    pub const fn key(&self) -> BatchKey {
        self.key
    }

    /// Maximum number of instances the batch can hold.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of instances written so far.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.transforms.len()
    }

    /// Live per-instance transforms.
    #[must_use]
    pub fn transforms(&self) -> &[InstanceTransform] {
        &self.transforms
    }

    /// Live per-instance colours.
    #[must_use]
    pub fn colors(&self) -> &[InstanceColor] {
        &self.colors
    }

    /// Raw bytes of the transform buffer, ready for upload.
    #[must_use]
    pub fn transform_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.transforms)
    }

    /// Raw bytes of the colour buffer, ready for upload.
    #[must_use]
    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }

    /// Current buffer revisions.
    #[must_use]
    pub const fn revision(&self) -> BatchRevision {
        self.revision
    }

    /// Appends an instance, returning its index, or `None` when the batch is full.
    pub fn write_instance(&mut self, position: Vec3, color: InstanceColor) -> Option<usize> {
        let index = self.transforms.len();
        debug_assert!(
            index < self.capacity,
            "batch {:?} overran its capacity of {}",
            self.key,
            self.capacity
        );
        if index >= self.capacity {
            return None;
        }

        self.transforms
            .push(InstanceTransform::from_translation(position));
        self.colors.push(color);
        self.revision.transforms += 1;
        self.revision.colors += 1;
        Some(index)
    }

    /// Moves an already written instance. Unknown indices are ignored.
    pub fn set_position(&mut self, instance: usize, position: Vec3) {
        if let Some(transform) = self.transforms.get_mut(instance) {
            *transform = InstanceTransform::from_translation(position);
            self.revision.transforms += 1;
        }
    }
}

/// Outcome of resolving a batch for a placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchHandle {
    /// Key of the resolved batch.
    pub key: BatchKey,
    /// Capacity of the resolved batch.
    pub capacity: usize,
    /// Whether the batch was allocated by this call.
    pub created: bool,
}

/// Registry of batches, shared meshes and per-era materials.
#[derive(Debug)]
pub struct BatchManager {
    eras: Vec<EraVisual>,
    shape_counts: HashMap<StructureIndex, HashMap<Shape, usize>>,
    batches: BTreeMap<BatchKey, InstanceBatch>,
    geometries: GeometryRegistry,
    materials: MaterialRegistry,
}

impl BatchManager {
    /// Creates a manager colouring blocks from the provided era table.
    #[must_use]
    pub fn new(eras: Vec<EraVisual>) -> Self {
        Self {
            eras,
            shape_counts: HashMap::new(),
            batches: BTreeMap::new(),
            geometries: GeometryRegistry::new(),
            materials: MaterialRegistry::new(),
        }
    }

    /// Records how many slots of each shape a structure holds.
    ///
    /// These counts size every batch later created for the structure.
    pub fn register_structure(&mut self, structure: StructureIndex, slots: &[BlockSlot]) {
        let mut counts: HashMap<Shape, usize> = HashMap::new();
        for slot in slots {
            *counts.entry(slot.shape()).or_insert(0) += 1;
        }
        let _ = self.shape_counts.insert(structure, counts);
    }

    /// Clamps an era to the configured table.
    #[must_use]
    pub fn resolve_era(&self, era: EraIndex) -> EraIndex {
        era.clamp_to(self.eras.len())
    }

    /// Visual row used for an era, clamped to the last row.
    #[must_use]
    pub fn era_visual(&self, era: EraIndex) -> Option<&EraVisual> {
        self.eras.get(self.resolve_era(era).get() as usize)
    }

    /// Returns the batch for the key, allocating it on first use.
    ///
    /// Returns `None` when the structure holds no slots of the requested shape
    /// or the era table is empty.
    pub fn get_or_create_batch(
        &mut self,
        structure: StructureIndex,
        shape: Shape,
        era: EraIndex,
    ) -> Option<BatchHandle> {
        let era = self.resolve_era(era);
        let key = BatchKey::new(structure, shape, era);
        if let Some(batch) = self.batches.get(&key) {
            return Some(BatchHandle {
                key,
                capacity: batch.capacity(),
                created: false,
            });
        }

        let capacity = self
            .shape_counts
            .get(&structure)
            .and_then(|counts| counts.get(&shape))
            .copied()
            .unwrap_or(0);
        if capacity == 0 {
            return None;
        }
        let visual = *self.eras.get(era.get() as usize)?;

        let _ = self.geometries.get_or_build(shape);
        let _ = self.materials.get_or_create(era, &visual);
        let _ = self.batches.insert(key, InstanceBatch::new(key, capacity));
        log::debug!("allocated batch {key:?} with capacity {capacity}");
        Some(BatchHandle {
            key,
            capacity,
            created: true,
        })
    }

    /// Appends an instance to an existing batch.
    pub fn write_instance(
        &mut self,
        key: BatchKey,
        position: Vec3,
        color: InstanceColor,
    ) -> Option<usize> {
        self.batches.get_mut(&key)?.write_instance(position, color)
    }

    /// Moves an instance of an existing batch.
    pub fn set_instance_position(&mut self, key: BatchKey, instance: usize, position: Vec3) {
        if let Some(batch) = self.batches.get_mut(&key) {
            batch.set_position(instance, position);
        }
    }

    /// Samples a block colour for the key's era and shape.
    pub fn sample_color<R>(&self, key: BatchKey, rng: &mut R) -> InstanceColor
    where
        R: Rng + ?Sized,
    {
        match self.era_visual(key.era) {
            Some(visual) => sample_block_color(visual, key.era, key.shape, rng),
            None => InstanceColor::new(1.0, 1.0, 1.0),
        }
    }

    /// Looks up a batch by key.
    #[must_use]
    pub fn batch(&self, key: BatchKey) -> Option<&InstanceBatch> {
        self.batches.get(&key)
    }

    /// Iterator over every live batch in key order.
    pub fn batches(&self) -> impl Iterator<Item = &InstanceBatch> {
        self.batches.values()
    }

    /// Number of live batches.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Shared meshes built so far.
    #[must_use]
    pub fn geometries(&self) -> &GeometryRegistry {
        &self.geometries
    }

    /// Shared materials created so far.
    #[must_use]
    pub fn materials(&self) -> &MaterialRegistry {
        &self.materials
    }

    /// Releases every batch, mesh and material, returning the detached batch keys.
    ///
    /// Structure registrations survive so that construction can resume.
    pub fn dispose_all(&mut self) -> Vec<BatchKey> {
        let keys: Vec<BatchKey> = self.batches.keys().copied().collect();
        self.batches.clear();
        self.geometries.clear();
        self.materials.clear();
        log::info!("disposed {} batches", keys.len());
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monument_core::default_era_table;

    fn slots(shapes: &[Shape]) -> Vec<BlockSlot> {
        shapes
            .iter()
            .enumerate()
            .map(|(index, shape)| BlockSlot::new(Vec3::new(index as f32, 0.0, 0.0), *shape))
            .collect()
    }

    #[test]
    fn capacity_counts_shapes_within_the_structure() {
        let mut manager = BatchManager::new(default_era_table());
        let structure = StructureIndex::catalog(0);
        manager.register_structure(
            structure,
            &slots(&[Shape::Cube, Shape::Slab, Shape::Cube, Shape::Cube]),
        );

        let cubes = manager
            .get_or_create_batch(structure, Shape::Cube, EraIndex::FIRST)
            .expect("cube batch");
        let slabs = manager
            .get_or_create_batch(structure, Shape::Slab, EraIndex::FIRST)
            .expect("slab batch");

        assert_eq!(cubes.capacity, 3);
        assert_eq!(slabs.capacity, 1);
        assert!(cubes.created && slabs.created);
    }

    #[test]
    fn batches_are_reused_per_key() {
        let mut manager = BatchManager::new(default_era_table());
        manager.register_structure(StructureIndex::PYRAMID, &slots(&[Shape::Cube; 4]));

        let first = manager
            .get_or_create_batch(StructureIndex::PYRAMID, Shape::Cube, EraIndex::new(1))
            .expect("batch");
        let second = manager
            .get_or_create_batch(StructureIndex::PYRAMID, Shape::Cube, EraIndex::new(1))
            .expect("batch");

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(manager.batch_count(), 1);
    }

    #[test]
    fn unknown_shape_yields_no_batch() {
        let mut manager = BatchManager::new(default_era_table());
        manager.register_structure(StructureIndex::PYRAMID, &slots(&[Shape::Cube]));
        assert!(manager
            .get_or_create_batch(StructureIndex::PYRAMID, Shape::Wedge, EraIndex::FIRST)
            .is_none());
        assert_eq!(manager.batch_count(), 0);
    }

    #[test]
    fn eras_beyond_the_table_share_the_last_material() {
        let mut manager = BatchManager::new(default_era_table());
        manager.register_structure(StructureIndex::PYRAMID, &slots(&[Shape::Cube; 2]));

        let handle = manager
            .get_or_create_batch(StructureIndex::PYRAMID, Shape::Cube, EraIndex::new(40))
            .expect("batch");
        assert_eq!(handle.key.era, EraIndex::new(4));
        assert!(manager.materials().get(EraIndex::new(4)).is_some());
    }

    #[test]
    fn materials_are_shared_across_structures() {
        let mut manager = BatchManager::new(default_era_table());
        manager.register_structure(StructureIndex::PYRAMID, &slots(&[Shape::Cube]));
        manager.register_structure(StructureIndex::catalog(0), &slots(&[Shape::Wedge]));

        let era = EraIndex::new(2);
        let _ = manager.get_or_create_batch(StructureIndex::PYRAMID, Shape::Cube, era);
        let _ = manager.get_or_create_batch(StructureIndex::catalog(0), Shape::Wedge, era);

        assert_eq!(manager.batch_count(), 2);
        assert_eq!(manager.materials().len(), 1);
        assert_eq!(manager.geometries().len(), 2);
    }

    #[test]
    fn writes_bump_revisions_and_stop_at_capacity_in_release() {
        let mut batch = InstanceBatch::new(
            BatchKey::new(StructureIndex::PYRAMID, Shape::Cube, EraIndex::FIRST),
            1,
        );
        let color = InstanceColor::new(0.5, 0.4, 0.3);

        assert_eq!(batch.write_instance(Vec3::Y, color), Some(0));
        assert_eq!(batch.instance_count(), 1);
        assert_eq!(
            batch.revision(),
            BatchRevision {
                transforms: 1,
                colors: 1
            }
        );

        batch.set_position(0, Vec3::ZERO);
        assert_eq!(batch.transforms()[0].translation(), Vec3::ZERO);
        assert_eq!(batch.revision().transforms, 2);
        assert_eq!(batch.revision().colors, 1, "moving never recolours");
        assert_eq!(batch.transform_bytes().len(), 64);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "overran its capacity"))]
    fn capacity_overrun_is_an_invariant_violation() {
        let mut batch = InstanceBatch::new(
            BatchKey::new(StructureIndex::PYRAMID, Shape::Cube, EraIndex::FIRST),
            0,
        );
        assert_eq!(
            batch.write_instance(Vec3::ZERO, InstanceColor::new(1.0, 1.0, 1.0)),
            None
        );
        assert_eq!(batch.instance_count(), 0);
    }

    #[test]
    fn dispose_all_releases_everything() {
        let mut manager = BatchManager::new(default_era_table());
        manager.register_structure(StructureIndex::PYRAMID, &slots(&[Shape::Cube, Shape::Half]));
        let cube = manager
            .get_or_create_batch(StructureIndex::PYRAMID, Shape::Cube, EraIndex::FIRST)
            .expect("batch");
        let half = manager
            .get_or_create_batch(StructureIndex::PYRAMID, Shape::Half, EraIndex::FIRST)
            .expect("batch");

        let detached = manager.dispose_all();
        assert_eq!(detached, vec![cube.key, half.key]);
        assert_eq!(manager.batch_count(), 0);
        assert!(manager.geometries().is_empty());
        assert!(manager.materials().is_empty());

        let again = manager
            .get_or_create_batch(StructureIndex::PYRAMID, Shape::Cube, EraIndex::FIRST)
            .expect("registrations survive teardown");
        assert!(again.created);
    }
}
