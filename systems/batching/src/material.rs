//! One shared material per era.

use std::collections::BTreeMap;

use monument_core::{EraIndex, EraVisual, InstanceColor};

/// Surface description shared by every batch of a single era.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EraMaterial {
    /// Era the material belongs to.
    pub era: EraIndex,
    /// Unjittered base colour of the era.
    pub base_color: InstanceColor,
    /// Surface roughness.
    pub roughness: f32,
    /// Metalness.
    pub metalness: f32,
    /// Emissive intensity.
    pub emissive_intensity: f32,
}

impl EraMaterial {
    /// Derives the material from its era's visual row.
    #[must_use]
    pub fn from_visual(era: EraIndex, visual: &EraVisual) -> Self {
        Self {
            era,
            base_color: InstanceColor::from_hsl(visual.hue, visual.saturation, visual.lightness),
            roughness: visual.roughness,
            metalness: visual.metalness,
            emissive_intensity: visual.emissive_intensity,
        }
    }
}

/// Lazily populated map from era to its shared material.
#[derive(Debug, Default)]
pub struct MaterialRegistry {
    materials: BTreeMap<EraIndex, EraMaterial>,
}

impl MaterialRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the material for `era`, creating it from `visual` on first use.
    pub fn get_or_create(&mut self, era: EraIndex, visual: &EraVisual) -> &EraMaterial {
        self.materials
            .entry(era)
            .or_insert_with(|| EraMaterial::from_visual(era, visual))
    }

    /// Returns the material for `era` if it exists.
    #[must_use]
    pub fn get(&self, era: EraIndex) -> Option<&EraMaterial> {
        self.materials.get(&era)
    }

    /// Iterator over the created materials in era order.
    pub fn iter(&self) -> impl Iterator<Item = &EraMaterial> {
        self.materials.values()
    }

    /// Number of materials created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Reports whether no material has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Drops every material.
    pub fn clear(&mut self) {
        self.materials.clear();
    }
}
