#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Frame-driven placement queue and drop animator.
//!
//! Slots move through `queued → falling → landed`. Queued slots wait in a FIFO
//! until fewer than [`PlacementConfig::max_concurrent`] blocks are falling; at
//! most one queued slot starts falling per frame. A falling block follows a
//! cubic ease-out from its drop height to its resting height, with a decaying
//! bounce over the final fifth of its flight, then snaps to rest and lands.
//!
//! The animator never touches slots or batches directly. It asks a
//! [`PlacementSite`] to commit a slot and to move in-flight instances, which
//! keeps the state machine independent of how blocks are stored.

use std::{collections::VecDeque, f32::consts::PI, time::Duration};

use glam::Vec3;
use monument_core::{BatchKey, Event, SlotRef};

/// Fraction of the flight, measured from the end, during which the block bounces.
const BOUNCE_WINDOW: f32 = 0.2;

/// Tuning for the drop animation and its concurrency cap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementConfig {
    /// Maximum number of blocks falling at once.
    pub max_concurrent: usize,
    /// Height above the resting position at which blocks appear.
    pub drop_height: f32,
    /// Flight progress gained per second; a flight lasts `1 / fall_speed` seconds.
    pub fall_speed: f32,
    /// Peak height of the settling bounce.
    pub bounce_amplitude: f32,
    /// Number of half-oscillations performed while settling.
    pub bounce_cycles: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            drop_height: 14.0,
            fall_speed: 1.6,
            bounce_amplitude: 0.35,
            bounce_cycles: 2.0,
        }
    }
}

/// Instance committed for a slot that is about to fall.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Claim {
    /// Batch that received the instance.
    pub batch: BatchKey,
    /// Index of the instance within the batch.
    pub instance: usize,
    /// Resting position of the block.
    pub target: Vec3,
}

/// Storage the animator commits blocks into.
pub trait PlacementSite {
    /// Marks the slot placed and writes its instance `drop_height` above rest.
    ///
    /// Returns `None` when the slot is unknown or already placed, in which
    /// case the animator skips it.
    fn claim(&mut self, slot: SlotRef, drop_height: f32) -> Option<Claim>;

    /// Moves an in-flight instance.
    fn move_instance(&mut self, batch: BatchKey, instance: usize, position: Vec3);
}

/// Transient record of a block in flight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimatingBlock {
    /// Slot receiving the block.
    pub slot: SlotRef,
    /// Batch holding the block's instance.
    pub batch: BatchKey,
    /// Index of the block's instance within the batch.
    pub instance: usize,
    /// Height at which the flight started.
    pub start_height: f32,
    /// Resting position.
    pub target: Vec3,
    /// Flight progress in `0.0..=1.0`.
    pub progress: f32,
    /// Progress gained per second.
    pub speed: f32,
}

/// Queue and animator for live placements.
#[derive(Debug)]
pub struct Placement {
    config: PlacementConfig,
    pending: VecDeque<SlotRef>,
    falling: Vec<AnimatingBlock>,
}

impl Placement {
    /// Creates an idle animator.
    #[must_use]
    pub fn new(config: PlacementConfig) -> Self {
        Self {
            config,
            pending: VecDeque::new(),
            falling: Vec::new(),
        }
    }

    /// Active tuning.
    #[must_use]
    pub const fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// Appends a slot to the back of the queue.
    pub fn enqueue(&mut self, slot: SlotRef) {
        self.pending.push_back(slot);
    }

    /// Number of queued slots that have not started falling.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Blocks currently in flight, oldest first.
    #[must_use]
    pub fn falling(&self) -> &[AnimatingBlock] {
        &self.falling
    }

    /// Reports whether nothing is queued or falling.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.falling.is_empty()
    }

    /// Forgets every queued and falling block.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.falling.clear();
    }

    /// Advances the state machine by one frame.
    ///
    /// Emits [`Event::BlockFalling`] for the slot that starts its drop and
    /// [`Event::BlockLanded`] for every block that settles, in flight order.
    pub fn update<S>(&mut self, dt: Duration, site: &mut S, out: &mut Vec<Event>)
    where
        S: PlacementSite + ?Sized,
    {
        if self.falling.len() < self.config.max_concurrent {
            self.start_next(site, out);
        }

        let elapsed = dt.as_secs_f32();
        let mut index = 0;
        while index < self.falling.len() {
            let block = &mut self.falling[index];
            block.progress += elapsed * block.speed;

            if block.progress >= 1.0 {
                let landed = self.falling.remove(index);
                site.move_instance(landed.batch, landed.instance, landed.target);
                out.push(Event::BlockLanded { slot: landed.slot });
                continue;
            }

            let height = flight_height(block, &self.config);
            let position = Vec3::new(block.target.x, height, block.target.z);
            site.move_instance(block.batch, block.instance, position);
            index += 1;
        }
    }

    fn start_next<S>(&mut self, site: &mut S, out: &mut Vec<Event>)
    where
        S: PlacementSite + ?Sized,
    {
        while let Some(slot) = self.pending.pop_front() {
            let Some(claim) = site.claim(slot, self.config.drop_height) else {
                log::trace!("skipping unplaceable slot {slot:?}");
                continue;
            };

            self.falling.push(AnimatingBlock {
                slot,
                batch: claim.batch,
                instance: claim.instance,
                start_height: claim.target.y + self.config.drop_height,
                target: claim.target,
                progress: 0.0,
                speed: self.config.fall_speed,
            });
            out.push(Event::BlockFalling { slot });
            return;
        }
    }
}

/// Cubic ease-out, `1 - (1 - t)^3`.
#[must_use]
pub fn ease_out_cubic(t: f32) -> f32 {
    let inverse = 1.0 - t.clamp(0.0, 1.0);
    1.0 - inverse * inverse * inverse
}

/// Upward offset of the settling bounce at flight progress `t`.
///
/// Zero outside the final bounce window and at `t == 1`.
#[must_use]
pub fn bounce_offset(t: f32, config: &PlacementConfig) -> f32 {
    let window_start = 1.0 - BOUNCE_WINDOW;
    if t <= window_start || t >= 1.0 {
        return 0.0;
    }
    let local = (t - window_start) / BOUNCE_WINDOW;
    let decay = 1.0 - local;
    config.bounce_amplitude * decay * (local * PI * config.bounce_cycles).sin().abs()
}

fn flight_height(block: &AnimatingBlock, config: &PlacementConfig) -> f32 {
    let eased = ease_out_cubic(block.progress);
    let height = block.start_height + (block.target.y - block.start_height) * eased;
    height + bounce_offset(block.progress, config)
}
