#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Build-order generator for the primary stepped pyramid.
//!
//! Each layer is a square of unit cells that shrinks by a fixed step until the
//! apex is reached. Within a layer the perimeter cells and the interior cells
//! are shuffled independently, perimeter first. Layers are then interleaved
//! with a weighted round-robin so that wide lower layers advance faster than
//! narrow upper layers while every layer still makes progress each round.

use glam::Vec3;
use monument_core::{BlockSlot, Shape};
use rand::{seq::SliceRandom, Rng};

/// Dimensions and pacing of the stepped pyramid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PyramidLayout {
    /// Side length of the bottom layer measured in blocks.
    pub base_size: u32,
    /// Number of blocks removed from the side length per layer.
    pub step: u32,
    /// Edge length of a single block in world units.
    pub block_size: f32,
    /// Turns granted to the bottom layer in each round-robin round.
    ///
    /// Higher layers receive a share proportional to their cell count, never
    /// fewer than one turn.
    pub round_budget: u32,
}

impl Default for PyramidLayout {
    fn default() -> Self {
        Self {
            base_size: 20,
            step: 2,
            block_size: 1.0,
            round_budget: 8,
        }
    }
}

impl PyramidLayout {
    /// Side lengths of every layer, bottom first.
    #[must_use]
    pub fn layer_sizes(&self) -> Vec<u32> {
        if self.base_size == 0 {
            return Vec::new();
        }
        if self.step == 0 {
            return vec![self.base_size];
        }

        let mut sizes = Vec::new();
        let mut size = self.base_size;
        while size > 0 {
            sizes.push(size);
            size = size.saturating_sub(self.step);
        }
        sizes
    }

    /// Total number of slots the pyramid holds.
    #[must_use]
    pub fn total_slots(&self) -> usize {
        self.layer_sizes()
            .iter()
            .map(|size| (*size as usize) * (*size as usize))
            .sum()
    }
}

#[derive(Clone, Copy, Debug)]
struct LayerCell {
    position: Vec3,
    edge: bool,
}

/// Generates the pyramid's slots in build order.
///
/// The result is deterministic for a given layout and RNG state.
pub fn generate_slots<R>(layout: &PyramidLayout, rng: &mut R) -> Vec<BlockSlot>
where
    R: Rng + ?Sized,
{
    let layers: Vec<Vec<Vec3>> = layout
        .layer_sizes()
        .into_iter()
        .enumerate()
        .map(|(level, size)| ordered_layer(layout, level, size, rng))
        .collect();

    let order = interleave(&layers, layout.round_budget);
    log::debug!(
        "generated pyramid build order: {} layers, {} slots",
        layers.len(),
        order.len()
    );
    order
        .into_iter()
        .map(|position| BlockSlot::new(position, Shape::Cube))
        .collect()
}

fn layer_cells(layout: &PyramidLayout, level: usize, size: u32) -> Vec<LayerCell> {
    let half_span = (size as f32 - 1.0) * 0.5;
    let y = (level as f32 + 0.5) * layout.block_size;
    let mut cells = Vec::with_capacity((size as usize) * (size as usize));
    for row in 0..size {
        for column in 0..size {
            let edge = row == 0 || column == 0 || row + 1 == size || column + 1 == size;
            let position = Vec3::new(
                (column as f32 - half_span) * layout.block_size,
                y,
                (row as f32 - half_span) * layout.block_size,
            );
            cells.push(LayerCell { position, edge });
        }
    }
    cells
}

fn ordered_layer<R>(layout: &PyramidLayout, level: usize, size: u32, rng: &mut R) -> Vec<Vec3>
where
    R: Rng + ?Sized,
{
    let (mut edges, mut interior): (Vec<LayerCell>, Vec<LayerCell>) =
        layer_cells(layout, level, size)
            .into_iter()
            .partition(|cell| cell.edge);
    edges.shuffle(rng);
    interior.shuffle(rng);
    edges
        .into_iter()
        .chain(interior)
        .map(|cell| cell.position)
        .collect()
}

/// Turns each layer receives per round, proportional to its cell count.
fn round_weights(layers: &[Vec<Vec3>], round_budget: u32) -> Vec<usize> {
    let widest = layers.iter().map(Vec::len).max().unwrap_or(0).max(1);
    layers
        .iter()
        .map(|layer| {
            let share = round_budget as f32 * layer.len() as f32 / widest as f32;
            (share.round() as usize).max(1)
        })
        .collect()
}

fn interleave(layers: &[Vec<Vec3>], round_budget: u32) -> Vec<Vec3> {
    let weights = round_weights(layers, round_budget);
    let total: usize = layers.iter().map(Vec::len).sum();
    let mut cursors = vec![0usize; layers.len()];
    let mut order = Vec::with_capacity(total);

    while order.len() < total {
        for (level, layer) in layers.iter().enumerate() {
            let start = cursors[level];
            let end = (start + weights[level]).min(layer.len());
            order.extend_from_slice(&layer[start..end]);
            cursors[level] = end;
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(len: usize) -> Vec<Vec3> {
        vec![Vec3::ZERO; len]
    }

    #[test]
    fn default_layout_sums_even_squares_down_to_the_apex() {
        let layout = PyramidLayout::default();
        assert_eq!(
            layout.layer_sizes(),
            vec![20, 18, 16, 14, 12, 10, 8, 6, 4, 2]
        );
        let expected: usize = (1..=10).map(|half: usize| (2 * half) * (2 * half)).sum();
        assert_eq!(expected, 1540);
        assert_eq!(layout.total_slots(), expected);
    }

    #[test]
    fn zero_step_produces_single_layer() {
        let layout = PyramidLayout {
            step: 0,
            base_size: 3,
            ..PyramidLayout::default()
        };
        assert_eq!(layout.layer_sizes(), vec![3]);
        assert_eq!(layout.total_slots(), 9);
    }

    #[test]
    fn odd_step_reaches_single_block_apex() {
        let layout = PyramidLayout {
            base_size: 5,
            step: 2,
            ..PyramidLayout::default()
        };
        assert_eq!(layout.layer_sizes(), vec![5, 3, 1]);
    }

    #[test]
    fn weights_favour_wide_layers_with_floor_of_one() {
        let layers = vec![layer(400), layer(196), layer(16), layer(4)];
        assert_eq!(round_weights(&layers, 8), vec![8, 4, 1, 1]);
    }

    #[test]
    fn perimeter_detection_matches_square_ring() {
        let cells = layer_cells(&PyramidLayout::default(), 0, 4);
        let edges = cells.iter().filter(|cell| cell.edge).count();
        assert_eq!(edges, 12);
        assert_eq!(cells.len() - edges, 4);
    }
}
