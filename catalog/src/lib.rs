#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Static layouts of the secondary structures built after the pyramid.
//!
//! The engine treats the catalog as read-only configuration: an ordered list
//! of [`StructureDescriptor`] values whose order is the build order. This crate
//! ships a reference catalog assembled from a few parametric layouts and can
//! load replacement catalogs from JSON.

use std::{collections::HashSet, fs, path::Path};

use glam::Vec3;
use monument_core::{Shape, SlotDescriptor, StructureDescriptor};
use thiserror::Error;

/// Errors raised while loading or validating a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("could not read catalog file: {0}")]
    Io(#[from] std::io::Error),
    /// The catalog contents were not valid JSON for the expected schema.
    #[error("could not parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    /// A structure was declared without an identifier.
    #[error("structure at registry position {position} has an empty id")]
    MissingId {
        /// Registry position of the offending structure.
        position: usize,
    },
    /// Two structures share an identifier.
    #[error("structure id '{0}' is declared more than once")]
    DuplicateId(String),
    /// A slot position or structure offset is NaN or infinite.
    #[error("structure '{0}' contains a non-finite coordinate")]
    NonFinite(String),
}

/// Parses and validates a JSON catalog.
pub fn from_json_str(contents: &str) -> Result<Vec<StructureDescriptor>, CatalogError> {
    let catalog: Vec<StructureDescriptor> = serde_json::from_str(contents)?;
    validate(&catalog)?;
    Ok(catalog)
}

/// Reads, parses and validates a JSON catalog file.
pub fn from_path(path: impl AsRef<Path>) -> Result<Vec<StructureDescriptor>, CatalogError> {
    let contents = fs::read_to_string(path)?;
    from_json_str(&contents)
}

/// Serialises a catalog to pretty-printed JSON.
pub fn to_json_string(catalog: &[StructureDescriptor]) -> Result<String, CatalogError> {
    Ok(serde_json::to_string_pretty(catalog)?)
}

/// Checks identifiers and coordinates of every structure.
pub fn validate(catalog: &[StructureDescriptor]) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for (position, structure) in catalog.iter().enumerate() {
        if structure.id.trim().is_empty() {
            return Err(CatalogError::MissingId { position });
        }
        if !seen.insert(structure.id.as_str()) {
            return Err(CatalogError::DuplicateId(structure.id.clone()));
        }
        let finite = structure.world_offset.is_finite()
            && structure.slots.iter().all(|slot| slot.position.is_finite());
        if !finite {
            return Err(CatalogError::NonFinite(structure.id.clone()));
        }
    }
    Ok(())
}

/// Reference catalog in registry order.
#[must_use]
pub fn reference_catalog() -> Vec<StructureDescriptor> {
    vec![
        mortuary_temple(),
        obelisk("east_obelisk", "East Obelisk", Vec3::new(20.0, 0.0, -6.0)),
        obelisk("west_obelisk", "West Obelisk", Vec3::new(-20.0, 0.0, -6.0)),
        colonnade(),
        mastaba(),
        sphinx_terrace(),
        causeway(),
    ]
}

/// Accumulates slots in build order. Heights are floor levels; blocks are
/// centred half a unit above the floor they stand on.
#[derive(Debug, Default)]
struct Layout {
    slots: Vec<SlotDescriptor>,
}

impl Layout {
    fn block(&mut self, x: f32, floor: f32, z: f32, shape: Shape) -> &mut Self {
        let shape = (shape != Shape::Cube).then_some(shape);
        self.slots
            .push(SlotDescriptor::new(Vec3::new(x, floor + 0.5, z), shape));
        self
    }

    /// Fills a `width` x `depth` rectangle centred on the origin, row by row.
    fn course(&mut self, width: u32, depth: u32, floor: f32, shape: Shape) -> &mut Self {
        let half_width = (width as f32 - 1.0) * 0.5;
        let half_depth = (depth as f32 - 1.0) * 0.5;
        for row in 0..depth {
            for column in 0..width {
                let _ = self.block(
                    column as f32 - half_width,
                    floor,
                    row as f32 - half_depth,
                    shape,
                );
            }
        }
        self
    }

    /// Stacks `drums` column drums topped by a capital.
    fn column(
        &mut self,
        x: f32,
        floor: f32,
        z: f32,
        drums: u32,
        drum: Shape,
        capital: Shape,
    ) -> &mut Self {
        for level in 0..drums {
            let _ = self.block(x, floor + level as f32, z, drum);
        }
        self.block(x, floor + drums as f32, z, capital)
    }

    fn finish(
        &mut self,
        id: &str,
        display_name: &str,
        icon: &str,
        world_offset: Vec3,
    ) -> StructureDescriptor {
        StructureDescriptor {
            id: id.to_owned(),
            display_name: display_name.to_owned(),
            icon: icon.to_owned(),
            world_offset,
            slots: std::mem::take(&mut self.slots),
        }
    }
}

fn mortuary_temple() -> StructureDescriptor {
    let mut layout = Layout::default();
    let _ = layout.course(14, 10, 0.0, Shape::Half);
    for side in [-3.5_f32, 3.5] {
        for step in 0..4 {
            let x = -4.5 + step as f32 * 3.0;
            let _ = layout.column(x, 0.5, side, 4, Shape::FlutedCylinder, Shape::LotusCapital);
        }
    }
    for side in [-3.5_f32, 3.5] {
        for column in 0..14 {
            let _ = layout.block(column as f32 - 6.5, 5.5, side, Shape::Slab);
        }
    }
    layout.finish(
        "mortuary_temple",
        "Mortuary Temple",
        "⛩",
        Vec3::new(0.0, 0.0, 26.0),
    )
}

fn obelisk(id: &str, display_name: &str, offset: Vec3) -> StructureDescriptor {
    let mut layout = Layout::default();
    for level in 0..9 {
        let _ = layout.course(2, 2, level as f32, Shape::BeveledCube);
    }
    let _ = layout.course(2, 2, 9.0, Shape::Wedge);
    layout.finish(id, display_name, "🗼", offset)
}

fn colonnade() -> StructureDescriptor {
    let mut layout = Layout::default();
    let _ = layout.course(22, 3, 0.0, Shape::Slab);
    for side in [-1.0_f32, 1.0] {
        for step in 0..11 {
            let x = -10.0 + step as f32 * 2.0;
            let _ = layout.column(x, 0.25, side, 3, Shape::Cylinder, Shape::Capital);
        }
    }
    let _ = layout.course(22, 3, 4.25, Shape::Slab);
    layout.finish(
        "colonnade",
        "Great Colonnade",
        "🏛",
        Vec3::new(0.0, 0.0, -24.0),
    )
}

fn mastaba() -> StructureDescriptor {
    let mut layout = Layout::default();
    let _ = layout
        .course(12, 8, 0.0, Shape::Cube)
        .course(10, 6, 1.0, Shape::Cube)
        .course(10, 6, 2.0, Shape::Half);
    layout.finish(
        "mastaba",
        "Mastaba of the Scribe",
        "▭",
        Vec3::new(34.0, 0.0, 18.0),
    )
}

fn sphinx_terrace() -> StructureDescriptor {
    let mut layout = Layout::default();
    let _ = layout.course(8, 16, 0.0, Shape::Cube);
    let _ = layout.course(6, 12, 1.0, Shape::BeveledCube);
    for column in 0..6 {
        let _ = layout.block(column as f32 - 2.5, 1.0, 6.5, Shape::Wedge);
    }
    let _ = layout.course(4, 4, 2.0, Shape::Cube);
    layout.finish(
        "sphinx_terrace",
        "Sphinx Terrace",
        "🦁",
        Vec3::new(-34.0, 0.0, 18.0),
    )
}

fn causeway() -> StructureDescriptor {
    let mut layout = Layout::default();
    for step in 0..30 {
        let z = step as f32;
        let _ = layout
            .block(-0.5, 0.0, z, Shape::Slab)
            .block(0.5, 0.0, z, Shape::Slab);
    }
    layout.finish(
        "causeway",
        "Processional Causeway",
        "═",
        Vec3::new(0.0, 0.0, 40.0),
    )
}
