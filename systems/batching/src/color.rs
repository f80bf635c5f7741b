//! Per-block colour sampling.
//!
//! Each block draws its colour once, at placement time, from its era's base
//! hue/saturation/lightness plus independent uniform jitter. A few shape and
//! era combinations receive a fixed adjustment on top of the jitter.

use monument_core::{EraIndex, EraVisual, InstanceColor, Shape};
use rand::Rng;

/// Hue that flat pieces drift toward in early eras, suggesting drifted sand.
const SAND_HUE: f32 = 0.1;
const SAND_HUE_PULL: f32 = 0.35;
const SAND_LIGHTNESS_BOOST: f32 = 0.06;
const SAND_SATURATION_BOOST: f32 = 0.04;
/// Last era in which flat pieces gather sand.
const SAND_LAST_ERA: EraIndex = EraIndex::new(1);
/// Lightness added to beveled blocks to suggest worn edges.
const BEVEL_LIGHTNESS_BOOST: f32 = 0.03;

/// Samples the colour of a single block.
pub fn sample_block_color<R>(
    visual: &EraVisual,
    era: EraIndex,
    shape: Shape,
    rng: &mut R,
) -> InstanceColor
where
    R: Rng + ?Sized,
{
    let mut hue = visual.hue + jitter(rng, visual.hue_jitter);
    let mut saturation = visual.saturation + jitter(rng, visual.saturation_jitter);
    let mut lightness = visual.lightness + jitter(rng, visual.lightness_jitter);

    if shape.is_flat() && era <= SAND_LAST_ERA {
        hue += (SAND_HUE - hue) * SAND_HUE_PULL;
        saturation += SAND_SATURATION_BOOST;
        lightness += SAND_LIGHTNESS_BOOST;
    }
    if shape == Shape::BeveledCube {
        lightness += BEVEL_LIGHTNESS_BOOST;
    }

    InstanceColor::from_hsl(hue, saturation.clamp(0.0, 1.0), lightness.clamp(0.0, 1.0))
}

fn jitter<R>(rng: &mut R, half_width: f32) -> f32
where
    R: Rng + ?Sized,
{
    if half_width <= 0.0 {
        return 0.0;
    }
    rng.gen_range(-half_width..=half_width)
}
