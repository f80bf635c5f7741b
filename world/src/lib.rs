#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative build state for the monument engine.
//!
//! The world owns the primary pyramid followed by the catalog structures, in
//! build order, together with the batch manager and the placement animator.
//! Adapters drive it exclusively through [`apply`] and observe it through the
//! [`query`] module and the emitted [`Event`] stream.

mod config;

use std::{fmt, time::Duration};

use glam::Vec3;
use monument_core::{
    resolve_era, BatchKey, BlockSlot, Command, EraIndex, Event, MilestoneBlockRange, SlotRef,
    StructureDescriptor, StructureIndex,
};
use monument_system_batching::BatchManager;
use monument_system_placement::{Claim, Placement, PlacementConfig, PlacementSite};
use monument_system_pyramid::{generate_slots, PyramidLayout};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub use config::{ConfigError, EngineConfig, PlacementSection, PyramidSection};

const PYRAMID_ID: &str = "great_pyramid";
const PYRAMID_NAME: &str = "Great Pyramid";
const PYRAMID_ICON: &str = "△";

/// A buildable monument and its construction bookkeeping.
///
/// `accounted` counts slots that were queued or placed; it only grows and is
/// what keeps repeated cumulative totals from queuing a slot twice. `placed`
/// counts slots committed to a batch and `landed` those at rest.
#[derive(Debug)]
pub struct Structure {
    id: String,
    display_name: String,
    icon: String,
    world_offset: Vec3,
    slots: Vec<BlockSlot>,
    accounted: usize,
    placed: usize,
    landed: usize,
}

impl Structure {
    fn new(
        id: &str,
        display_name: &str,
        icon: &str,
        world_offset: Vec3,
        slots: Vec<BlockSlot>,
    ) -> Self {
        Self {
            id: id.to_owned(),
            display_name: display_name.to_owned(),
            icon: icon.to_owned(),
            world_offset,
            slots,
            accounted: 0,
            placed: 0,
            landed: 0,
        }
    }

    fn from_descriptor(descriptor: StructureDescriptor) -> Self {
        let slots = descriptor.block_slots();
        Self {
            id: descriptor.id,
            display_name: descriptor.display_name,
            icon: descriptor.icon,
            world_offset: descriptor.world_offset,
            slots,
            accounted: 0,
            placed: 0,
            landed: 0,
        }
    }

    /// Stable identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name shown while under construction.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Short glyph shown next to the name.
    #[must_use]
    pub fn icon(&self) -> &str {
        &self.icon
    }

    /// Anchor in the shared world.
    #[must_use]
    pub const fn world_offset(&self) -> Vec3 {
        self.world_offset
    }

    /// Slots in build order, at world positions.
    #[must_use]
    pub fn slots(&self) -> &[BlockSlot] {
        &self.slots
    }

    /// Number of slots the structure holds.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots that were queued or placed.
    #[must_use]
    pub const fn accounted(&self) -> usize {
        self.accounted
    }

    /// Slots committed to a batch.
    #[must_use]
    pub const fn placed(&self) -> usize {
        self.placed
    }

    /// Slots whose block is at rest.
    #[must_use]
    pub const fn landed(&self) -> usize {
        self.landed
    }

    /// Reports whether every slot is placed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.placed >= self.slots.len()
    }

    /// Placed fraction in `0.0..=1.0`; empty structures count as complete.
    #[must_use]
    pub fn progress(&self) -> f32 {
        if self.slots.is_empty() {
            return 1.0;
        }
        self.placed as f32 / self.slots.len() as f32
    }
}

/// Synchronous observer lists, invoked in registration order.
#[derive(Default)]
struct Observers {
    block_land: Vec<Box<dyn FnMut()>>,
    structure_start: Vec<Box<dyn FnMut(StructureIndex)>>,
}

impl Observers {
    fn block_landed(&mut self) {
        for callback in &mut self.block_land {
            callback();
        }
    }

    fn structure_started(&mut self, structure: StructureIndex) {
        for callback in &mut self.structure_start {
            callback(structure);
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("block_land", &self.block_land.len())
            .field("structure_start", &self.structure_start.len())
            .finish()
    }
}

/// Represents the authoritative construction state.
#[derive(Debug)]
pub struct World {
    structures: Vec<Structure>,
    batches: BatchManager,
    placement: Placement,
    rng: ChaCha8Rng,
    current_era: EraIndex,
    observers: Observers,
}

impl World {
    /// Creates a world with the pyramid followed by `catalog` in build order.
    pub fn new(
        config: &EngineConfig,
        catalog: Vec<StructureDescriptor>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.resolved_seed());

        let layout = PyramidLayout::from(config.pyramid);
        let pyramid_slots = generate_slots(&layout, &mut rng);
        let mut structures = Vec::with_capacity(catalog.len() + 1);
        structures.push(Structure::new(
            PYRAMID_ID,
            PYRAMID_NAME,
            PYRAMID_ICON,
            Vec3::ZERO,
            pyramid_slots,
        ));
        structures.extend(catalog.into_iter().map(Structure::from_descriptor));

        let mut batches = BatchManager::new(config.eras.clone());
        for (position, structure) in structures.iter().enumerate() {
            batches.register_structure(StructureIndex::new(position as u32), &structure.slots);
        }

        log::info!(
            "world ready: {} structures, {} slots, {} eras",
            structures.len(),
            structures.iter().map(Structure::capacity).sum::<usize>(),
            config.eras.len()
        );

        Ok(Self {
            structures,
            batches,
            placement: Placement::new(PlacementConfig::from(config.placement)),
            rng,
            current_era: EraIndex::FIRST,
            observers: Observers::default(),
        })
    }

    /// Registers a callback fired once per block as it finishes falling.
    ///
    /// Restored blocks never trigger it.
    pub fn on_block_land<F>(&mut self, callback: F)
    where
        F: FnMut() + 'static,
    {
        self.observers.block_land.push(Box::new(callback));
    }

    /// Registers a callback fired when a structure receives its first block.
    pub fn on_structure_start<F>(&mut self, callback: F)
    where
        F: FnMut(StructureIndex) + 'static,
    {
        self.observers.structure_start.push(Box::new(callback));
    }

    fn accounted_total(&self) -> u64 {
        self.structures
            .iter()
            .map(|structure| structure.accounted as u64)
            .sum()
    }

    fn queue_blocks(&mut self, total: u64, era: EraIndex, out_events: &mut Vec<Event>) {
        if era > self.current_era {
            self.current_era = era;
        }
        let accounted = self.accounted_total();
        if total <= accounted {
            log::trace!("ignoring cumulative total {total}; {accounted} already accounted");
            return;
        }

        let mut remaining = total - accounted;
        for (position, structure) in self.structures.iter_mut().enumerate() {
            if remaining == 0 {
                break;
            }
            let available = structure.slots.len() - structure.accounted;
            let take = usize::try_from(remaining).map_or(available, |wanted| wanted.min(available));
            if take == 0 {
                continue;
            }

            let index = StructureIndex::new(position as u32);
            if structure.accounted == 0 {
                log::debug!("structure {} started", structure.id);
                out_events.push(Event::StructureStarted { structure: index });
                self.observers.structure_started(index);
            }
            for slot in structure.accounted..structure.accounted + take {
                self.placement.enqueue(SlotRef::new(index, slot as u32));
            }
            structure.accounted += take;
            remaining -= take as u64;
        }

        if remaining > 0 {
            log::debug!("trimmed {remaining} blocks beyond the total capacity");
        }
    }

    fn restore_blocks(
        &mut self,
        total: u64,
        ranges: &[MilestoneBlockRange],
        out_events: &mut Vec<Event>,
    ) {
        let mut offset = 0_u64;
        let mut restored = 0_u64;
        for (position, structure) in self.structures.iter_mut().enumerate() {
            let base = offset;
            offset += structure.slots.len() as u64;
            let start = base + structure.accounted as u64;
            let end = total.min(offset);
            if start >= end {
                continue;
            }

            let index = StructureIndex::new(position as u32);
            if structure.accounted == 0 {
                log::debug!("structure {} started by restore", structure.id);
                out_events.push(Event::StructureStarted { structure: index });
                self.observers.structure_started(index);
            }

            let first_slot = structure.accounted;
            let last_slot = (end - base) as usize;
            for (block_index, slot_index) in (start..end).zip(first_slot..last_slot) {
                let era = resolve_era(ranges, block_index, self.current_era);
                let slot = SlotRef::new(index, slot_index as u32);
                let block = &mut structure.slots[slot_index];
                let rest = block.position();
                let committed = commit_block(
                    &mut self.batches,
                    &mut self.rng,
                    slot,
                    block,
                    era,
                    rest,
                    out_events,
                );
                if committed.is_some() {
                    structure.placed += 1;
                    structure.landed += 1;
                    restored += 1;
                }
            }
            structure.accounted = last_slot;
        }

        if restored > 0 {
            log::info!("restored {restored} blocks up to cumulative total {total}");
            out_events.push(Event::BlocksRestored { count: restored });
        }
    }

    fn tick(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let mut site = Site {
            structures: &mut self.structures,
            batches: &mut self.batches,
            rng: &mut self.rng,
            era: self.current_era,
            attached: Vec::new(),
        };
        let mut frame = Vec::new();
        self.placement.update(dt, &mut site, &mut frame);
        out_events.append(&mut site.attached);

        for event in &frame {
            if let Event::BlockLanded { slot } = event {
                if let Some(structure) = self.structures.get_mut(slot.structure.get() as usize) {
                    structure.landed += 1;
                }
                self.observers.block_landed();
            }
        }
        out_events.append(&mut frame);
    }

    fn dispose_all(&mut self, out_events: &mut Vec<Event>) {
        self.placement.clear();
        let keys = self.batches.dispose_all();
        if !keys.is_empty() {
            out_events.push(Event::BatchesDetached { keys });
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::QueueBlocks { total, era } => world.queue_blocks(total, era, out_events),
        Command::RestoreBlocks { total, ranges } => {
            world.restore_blocks(total, &ranges, out_events);
        }
        Command::Tick { dt } => world.tick(dt, out_events),
        Command::DisposeAll => world.dispose_all(out_events),
    }
}

/// Commits a block to its batch at `position` and marks its slot placed.
///
/// Returns `None`, leaving the slot untouched, when the slot is already placed
/// or its batch cannot accept another instance.
fn commit_block<R>(
    batches: &mut BatchManager,
    rng: &mut R,
    slot: SlotRef,
    block: &mut BlockSlot,
    era: EraIndex,
    position: Vec3,
    out_events: &mut Vec<Event>,
) -> Option<(BatchKey, usize)>
where
    R: Rng + ?Sized,
{
    if block.is_placed() {
        return None;
    }
    let handle = batches.get_or_create_batch(slot.structure, block.shape(), era)?;
    if handle.created {
        out_events.push(Event::BatchAttached {
            key: handle.key,
            capacity: handle.capacity,
        });
    }
    let color = batches.sample_color(handle.key, rng);
    let instance = batches.write_instance(handle.key, position, color)?;
    let _ = block.mark_placed();
    Some((handle.key, instance))
}

/// Live placement view over the world's structures and batches.
struct Site<'a> {
    structures: &'a mut [Structure],
    batches: &'a mut BatchManager,
    rng: &'a mut ChaCha8Rng,
    era: EraIndex,
    attached: Vec<Event>,
}

impl PlacementSite for Site<'_> {
    fn claim(&mut self, slot: SlotRef, drop_height: f32) -> Option<Claim> {
        let structure = self.structures.get_mut(slot.structure.get() as usize)?;
        let block = structure.slots.get_mut(slot.slot as usize)?;
        let target = block.position();
        let (batch, instance) = commit_block(
            self.batches,
            &mut *self.rng,
            slot,
            block,
            self.era,
            target + Vec3::Y * drop_height,
            &mut self.attached,
        )?;
        structure.placed += 1;
        Some(Claim {
            batch,
            instance,
            target,
        })
    }

    fn move_instance(&mut self, batch: BatchKey, instance: usize, position: Vec3) {
        self.batches
            .set_instance_position(batch, instance, position);
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use monument_core::{EraIndex, StructureIndex};
    use monument_system_batching::BatchManager;
    use monument_system_placement::AnimatingBlock;

    use super::{Structure, World};

    /// Structures in build order; the pyramid comes first.
    #[must_use]
    pub fn structures(world: &World) -> &[Structure] {
        &world.structures
    }

    /// Looks up a structure by build-order index.
    #[must_use]
    pub fn structure(world: &World, index: StructureIndex) -> Option<&Structure> {
        world.structures.get(index.get() as usize)
    }

    /// Number of slots across every structure.
    #[must_use]
    pub fn total_slots(world: &World) -> usize {
        world.structures.iter().map(Structure::capacity).sum()
    }

    /// Number of slots committed to a batch across every structure.
    #[must_use]
    pub fn total_placed_count(world: &World) -> usize {
        world.structures.iter().map(Structure::placed).sum()
    }

    /// Number of blocks at rest, including restored blocks.
    #[must_use]
    pub fn landed_count(world: &World) -> usize {
        world.structures.iter().map(Structure::landed).sum()
    }

    /// Cumulative total already queued or placed.
    #[must_use]
    pub fn accounted_total(world: &World) -> u64 {
        world.accounted_total()
    }

    /// Number of queued slots that have not started falling.
    #[must_use]
    pub fn pending_count(world: &World) -> usize {
        world.placement.pending_len()
    }

    /// Blocks currently in flight.
    #[must_use]
    pub fn falling(world: &World) -> &[AnimatingBlock] {
        world.placement.falling()
    }

    /// Reports whether no block is queued or falling.
    #[must_use]
    pub fn is_settled(world: &World) -> bool {
        world.placement.is_idle()
    }

    /// Era applied to live placements.
    #[must_use]
    pub fn current_era(world: &World) -> EraIndex {
        world.current_era
    }

    /// Batches, meshes and materials for rendering.
    #[must_use]
    pub fn batch_manager(world: &World) -> &BatchManager {
        &world.batches
    }

    /// First structure in build order that is not fully placed.
    #[must_use]
    pub fn active_structure(world: &World) -> Option<(StructureIndex, &Structure)> {
        world
            .structures
            .iter()
            .enumerate()
            .find(|(_, structure)| !structure.is_complete())
            .map(|(position, structure)| (StructureIndex::new(position as u32), structure))
    }

    /// Display name of the structure under construction.
    #[must_use]
    pub fn active_structure_name(world: &World) -> Option<&str> {
        active_structure(world).map(|(_, structure)| structure.display_name())
    }

    /// Icon of the structure under construction.
    #[must_use]
    pub fn active_structure_icon(world: &World) -> Option<&str> {
        active_structure(world).map(|(_, structure)| structure.icon())
    }

    /// Placed fraction of the structure under construction.
    #[must_use]
    pub fn active_structure_progress(world: &World) -> Option<f32> {
        active_structure(world).map(|(_, structure)| structure.progress())
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    fn small_world() -> World {
        let config = EngineConfig {
            seed: Some(11),
            pyramid: PyramidSection {
                base_size: 2,
                ..PyramidSection::default()
            },
            ..EngineConfig::default()
        };
        let hut = StructureDescriptor {
            id: "hut".to_owned(),
            display_name: "Hut".to_owned(),
            icon: "h".to_owned(),
            world_offset: Vec3::new(10.0, 0.0, 0.0),
            slots: vec![
                monument_core::SlotDescriptor::new(Vec3::new(0.0, 0.5, 0.0), None),
                monument_core::SlotDescriptor::new(Vec3::new(1.0, 0.5, 0.0), None),
            ],
        };
        World::new(&config, vec![hut]).expect("valid world")
    }

    #[test]
    fn pyramid_precedes_catalog_structures() {
        let world = small_world();
        let structures = query::structures(&world);
        assert_eq!(structures.len(), 2);
        assert_eq!(structures[0].id(), PYRAMID_ID);
        assert_eq!(structures[0].capacity(), 4);
        assert_eq!(
            structures[1].slots()[0].position(),
            Vec3::new(10.0, 0.5, 0.0)
        );
        assert_eq!(query::total_slots(&world), 6);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            eras: Vec::new(),
            ..EngineConfig::default()
        };
        assert!(matches!(World::new(&config, Vec::new()), Err(ConfigError::NoEras)));
    }

    #[test]
    fn structure_start_observers_fire_in_registration_order() {
        let mut world = small_world();
        let calls = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second"] {
            let calls = Rc::clone(&calls);
            world.on_structure_start(move |structure| calls.borrow_mut().push((tag, structure)));
        }

        let mut events = Vec::new();
        apply(
            &mut world,
            Command::QueueBlocks {
                total: 5,
                era: EraIndex::FIRST,
            },
            &mut events,
        );

        assert_eq!(
            *calls.borrow(),
            vec![
                ("first", StructureIndex::PYRAMID),
                ("second", StructureIndex::PYRAMID),
                ("first", StructureIndex::catalog(0)),
                ("second", StructureIndex::catalog(0)),
            ]
        );
    }

    #[test]
    fn active_structure_advances_and_finishes() {
        let mut world = small_world();
        assert_eq!(query::active_structure_name(&world), Some(PYRAMID_NAME));
        assert_eq!(query::active_structure_progress(&world), Some(0.0));

        let mut events = Vec::new();
        apply(
            &mut world,
            Command::RestoreBlocks {
                total: 5,
                ranges: Vec::new(),
            },
            &mut events,
        );
        assert_eq!(query::active_structure_name(&world), Some("Hut"));
        assert_eq!(query::active_structure_icon(&world), Some("h"));
        assert_eq!(query::active_structure_progress(&world), Some(0.5));

        apply(
            &mut world,
            Command::RestoreBlocks {
                total: 6,
                ranges: Vec::new(),
            },
            &mut events,
        );
        assert!(query::active_structure(&world).is_none());
    }

    #[test]
    fn dispose_detaches_every_batch() {
        let mut world = small_world();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::RestoreBlocks {
                total: 6,
                ranges: Vec::new(),
            },
            &mut events,
        );
        let attached = events
            .iter()
            .filter(|event| matches!(event, Event::BatchAttached { .. }))
            .count();
        events.clear();

        apply(&mut world, Command::DisposeAll, &mut events);

        match events.as_slice() {
            [Event::BatchesDetached { keys }] => assert_eq!(keys.len(), attached),
            other => panic!("unexpected events {other:?}"),
        }
        assert_eq!(query::batch_manager(&world).batch_count(), 0);
        assert!(query::batch_manager(&world).geometries().is_empty());
        assert!(query::batch_manager(&world).materials().is_empty());
    }
}
