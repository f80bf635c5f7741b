use std::time::Duration;

use monument_core::{Command, EraIndex, MilestoneBlockRange};

use crate::snapshot_transfer::ProgressSnapshot;

/// Synthetic source of growing cumulative block totals.
///
/// Blocks are earned at a fixed rate and the era advances every
/// `blocks_per_era` blocks. The stream remembers which era each earned block
/// was reported in so that its progress can be persisted as a snapshot.
#[derive(Clone, Debug)]
pub(crate) struct BlockStream {
    rate: f64,
    blocks_per_era: u64,
    target: u64,
    carry: f64,
    snapshot: ProgressSnapshot,
}

impl BlockStream {
    /// Starts a stream from `snapshot` that stops at `target`.
    pub(crate) fn resume(
        snapshot: ProgressSnapshot,
        rate: f64,
        blocks_per_era: u64,
        target: u64,
    ) -> Self {
        Self {
            rate,
            blocks_per_era,
            target,
            carry: 0.0,
            snapshot,
        }
    }

    /// Cumulative total reported so far.
    pub(crate) fn total(&self) -> u64 {
        self.snapshot.total
    }

    /// Reports whether the target has been reached.
    pub(crate) fn is_finished(&self) -> bool {
        self.snapshot.total >= self.target
    }

    /// Progress reported so far.
    pub(crate) fn snapshot(&self) -> &ProgressSnapshot {
        &self.snapshot
    }

    /// Era in which the block at cumulative index `block` is earned.
    pub(crate) fn era_of_block(&self, block: u64) -> EraIndex {
        if self.blocks_per_era == 0 {
            return EraIndex::FIRST;
        }
        let era = block / self.blocks_per_era;
        EraIndex::new(u32::try_from(era).unwrap_or(u32::MAX))
    }

    /// Earns blocks for one frame, returning the update to send when the total grew.
    ///
    /// The update carries the era of the last block earned.
    pub(crate) fn advance(&mut self, dt: Duration) -> Option<Command> {
        if self.is_finished() {
            return None;
        }

        self.carry += self.rate * dt.as_secs_f64();
        let earned = self.carry.floor();
        if earned < 1.0 {
            return None;
        }
        self.carry -= earned;

        let previous = self.snapshot.total;
        let total = previous.saturating_add(earned as u64).min(self.target);
        self.record(previous, total);
        self.snapshot.total = total;
        Some(Command::QueueBlocks {
            total,
            era: self.era_of_block(total.saturating_sub(1)),
        })
    }

    /// Appends `start..end` to the era history, split at era boundaries.
    fn record(&mut self, start: u64, end: u64) {
        let mut cursor = start;
        while cursor < end {
            let era = self.era_of_block(cursor);
            let boundary = match self.blocks_per_era {
                0 => end,
                per_era => (cursor / per_era + 1).saturating_mul(per_era).min(end),
            };
            self.extend_history(cursor, boundary, era);
            cursor = boundary;
        }
    }

    fn extend_history(&mut self, start: u64, end: u64, era: EraIndex) {
        match self.snapshot.ranges.last_mut() {
            Some(last) if last.era == era && last.end_block == start => last.end_block = end,
            _ => self
                .snapshot
                .ranges
                .push(MilestoneBlockRange::new(start, end, era)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(rate: f64, blocks_per_era: u64, target: u64) -> BlockStream {
        BlockStream::resume(ProgressSnapshot::default(), rate, blocks_per_era, target)
    }

    #[test]
    fn fractional_rates_accumulate_across_frames() {
        let mut stream = stream(5.0, 100, 50);
        let frame = Duration::from_millis(100);

        assert_eq!(stream.advance(frame), None);
        assert_eq!(
            stream.advance(frame),
            Some(Command::QueueBlocks {
                total: 1,
                era: EraIndex::FIRST
            })
        );
        assert_eq!(stream.total(), 1);
    }

    #[test]
    fn totals_stop_at_the_target() {
        let mut stream = stream(1000.0, 100, 7);
        let command = stream.advance(Duration::from_secs(1));
        assert!(matches!(command, Some(Command::QueueBlocks { total: 7, .. })));
        assert!(stream.is_finished());
        assert_eq!(stream.advance(Duration::from_secs(1)), None);
    }

    #[test]
    fn era_history_merges_contiguous_updates() {
        let mut stream = stream(10.0, 25, 60);
        while !stream.is_finished() {
            let _ = stream.advance(Duration::from_secs(1));
        }

        assert_eq!(
            stream.snapshot().ranges,
            vec![
                MilestoneBlockRange::new(0, 25, EraIndex::new(0)),
                MilestoneBlockRange::new(25, 50, EraIndex::new(1)),
                MilestoneBlockRange::new(50, 60, EraIndex::new(2)),
            ]
        );
        assert_eq!(stream.snapshot().total, 60);
    }

    #[test]
    fn updates_crossing_an_era_boundary_split_the_history() {
        let mut stream = stream(1000.0, 10, 100);
        let command = stream.advance(Duration::from_millis(25));

        assert_eq!(
            command,
            Some(Command::QueueBlocks {
                total: 25,
                era: EraIndex::new(2)
            })
        );
        assert_eq!(
            stream.snapshot().ranges,
            vec![
                MilestoneBlockRange::new(0, 10, EraIndex::new(0)),
                MilestoneBlockRange::new(10, 20, EraIndex::new(1)),
                MilestoneBlockRange::new(20, 25, EraIndex::new(2)),
            ]
        );
    }

    #[test]
    fn the_last_block_of_an_era_keeps_its_era() {
        let mut stream = stream(10.0, 10, 100);
        let command = stream.advance(Duration::from_secs(1));

        assert_eq!(
            command,
            Some(Command::QueueBlocks {
                total: 10,
                era: EraIndex::FIRST
            })
        );
        assert_eq!(
            stream.snapshot().ranges,
            vec![MilestoneBlockRange::new(0, 10, EraIndex::FIRST)]
        );
    }

    #[test]
    fn resumed_streams_continue_from_the_snapshot() {
        let snapshot = ProgressSnapshot {
            total: 30,
            ranges: vec![MilestoneBlockRange::new(0, 30, EraIndex::new(1))],
        };
        let mut stream = BlockStream::resume(snapshot, 10.0, 25, 40);

        let command = stream.advance(Duration::from_secs(1));

        assert_eq!(
            command,
            Some(Command::QueueBlocks {
                total: 40,
                era: EraIndex::new(1)
            })
        );
        assert_eq!(
            stream.snapshot().ranges,
            vec![MilestoneBlockRange::new(0, 40, EraIndex::new(1))]
        );
    }
}
