use std::{collections::HashMap, time::Duration};

use glam::Vec3;
use monument_core::{BatchKey, EraIndex, Event, Shape, SlotRef, StructureIndex};
use monument_system_placement::{Claim, Placement, PlacementConfig, PlacementSite};

const FRAME: Duration = Duration::from_millis(16);

#[derive(Default)]
struct RecordingSite {
    slot_count: u32,
    placed: HashMap<SlotRef, usize>,
    positions: Vec<Vec3>,
    claims: Vec<SlotRef>,
}

impl RecordingSite {
    fn with_slots(slot_count: u32) -> Self {
        Self {
            slot_count,
            ..Self::default()
        }
    }

    fn key() -> BatchKey {
        BatchKey::new(StructureIndex::PYRAMID, Shape::Cube, EraIndex::FIRST)
    }

    fn target(slot: SlotRef) -> Vec3 {
        Vec3::new(slot.slot as f32, 0.5, 0.0)
    }
}

impl PlacementSite for RecordingSite {
    fn claim(&mut self, slot: SlotRef, drop_height: f32) -> Option<Claim> {
        if slot.slot >= self.slot_count || self.placed.contains_key(&slot) {
            return None;
        }
        let instance = self.positions.len();
        let target = Self::target(slot);
        self.positions.push(target + Vec3::Y * drop_height);
        let _ = self.placed.insert(slot, instance);
        self.claims.push(slot);
        Some(Claim {
            batch: Self::key(),
            instance,
            target,
        })
    }

    fn move_instance(&mut self, _batch: BatchKey, instance: usize, position: Vec3) {
        self.positions[instance] = position;
    }
}

fn slot(index: u32) -> SlotRef {
    SlotRef::new(StructureIndex::PYRAMID, index)
}

fn run_until_idle(placement: &mut Placement, site: &mut RecordingSite) -> (Vec<Event>, usize) {
    let mut events = Vec::new();
    let mut peak = 0;
    for _ in 0..10_000 {
        placement.update(FRAME, site, &mut events);
        peak = peak.max(placement.falling().len());
        if placement.is_idle() {
            break;
        }
    }
    (events, peak)
}

#[test]
fn concurrency_cap_limits_blocks_in_flight() {
    let mut placement = Placement::new(PlacementConfig::default());
    let mut site = RecordingSite::with_slots(10);
    for index in 0..10 {
        placement.enqueue(slot(index));
    }

    let (events, peak) = run_until_idle(&mut placement, &mut site);

    assert_eq!(peak, 3, "never more than three blocks falling at once");
    let landed: Vec<SlotRef> = events
        .iter()
        .filter_map(|event| match event {
            Event::BlockLanded { slot } => Some(*slot),
            _ => None,
        })
        .collect();
    assert_eq!(landed, (0..10).map(slot).collect::<Vec<_>>());
}

#[test]
fn at_most_one_block_starts_per_frame() {
    let mut placement = Placement::new(PlacementConfig::default());
    let mut site = RecordingSite::with_slots(4);
    for index in 0..4 {
        placement.enqueue(slot(index));
    }

    let mut events = Vec::new();
    placement.update(FRAME, &mut site, &mut events);

    assert_eq!(placement.falling().len(), 1);
    assert_eq!(placement.pending_len(), 3);
    assert_eq!(events, vec![Event::BlockFalling { slot: slot(0) }]);
}

#[test]
fn landed_blocks_snap_exactly_to_rest() {
    let mut placement = Placement::new(PlacementConfig::default());
    let mut site = RecordingSite::with_slots(2);
    placement.enqueue(slot(0));
    placement.enqueue(slot(1));

    let _ = run_until_idle(&mut placement, &mut site);

    assert_eq!(site.positions[0], RecordingSite::target(slot(0)));
    assert_eq!(site.positions[1], RecordingSite::target(slot(1)));
}

#[test]
fn falling_blocks_descend_from_drop_height() {
    let config = PlacementConfig::default();
    let mut placement = Placement::new(config);
    let mut site = RecordingSite::with_slots(1);
    placement.enqueue(slot(0));

    let mut events = Vec::new();
    placement.update(FRAME, &mut site, &mut events);
    let first = site.positions[0].y;
    placement.update(FRAME, &mut site, &mut events);
    let second = site.positions[0].y;

    let rest = RecordingSite::target(slot(0)).y;
    assert!(first < rest + config.drop_height);
    assert!(second < first);
    assert!(second > rest);
}

#[test]
fn requeued_and_out_of_range_slots_are_skipped() {
    let mut placement = Placement::new(PlacementConfig::default());
    let mut site = RecordingSite::with_slots(2);
    placement.enqueue(slot(0));
    placement.enqueue(slot(0));
    placement.enqueue(slot(7));
    placement.enqueue(slot(1));

    let (events, _) = run_until_idle(&mut placement, &mut site);

    assert_eq!(site.claims, vec![slot(0), slot(1)]);
    let landed = events
        .iter()
        .filter(|event| matches!(event, Event::BlockLanded { .. }))
        .count();
    assert_eq!(landed, 2);
}

#[test]
fn large_frames_land_immediately() {
    let mut placement = Placement::new(PlacementConfig::default());
    let mut site = RecordingSite::with_slots(1);
    placement.enqueue(slot(0));

    let mut events = Vec::new();
    placement.update(Duration::from_secs(5), &mut site, &mut events);

    assert!(placement.is_idle());
    assert_eq!(
        events,
        vec![
            Event::BlockFalling { slot: slot(0) },
            Event::BlockLanded { slot: slot(0) },
        ]
    );
}
