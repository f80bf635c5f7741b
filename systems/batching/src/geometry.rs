//! Shared per-shape meshes.
//!
//! Every [`Shape`] variant has exactly one construction function. Meshes are
//! built on first request and cached for the lifetime of the registry. All
//! meshes are centred on the slot position and fit inside the unit cube;
//! flat shapes rest on the cube's floor.

use std::{collections::HashMap, f32::consts::TAU};

use glam::{Vec2, Vec3};
use monument_core::Shape;

const ROUND_SEGMENTS: usize = 16;
const FLUTE_COUNT: usize = 12;
const FLUTE_DEPTH: f32 = 0.08;
const BEVEL: f32 = 0.08;

/// Flat-shaded triangle mesh for a single block silhouette.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShapeGeometry {
    /// Vertex positions.
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex normals, one per position.
    pub normals: Vec<[f32; 3]>,
    /// Triangle list indices into `positions`.
    pub indices: Vec<u32>,
}

impl ShapeGeometry {
    /// Number of triangles in the mesh.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Raw bytes of the position buffer, ready for upload.
    #[must_use]
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Raw bytes of the index buffer, ready for upload.
    #[must_use]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    fn push_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) {
        let normal = (b - a).cross(c - a).normalize_or_zero().to_array();
        let base = self.positions.len() as u32;
        for vertex in [a, b, c] {
            self.positions.push(vertex.to_array());
            self.normals.push(normal);
        }
        self.indices.extend_from_slice(&[base, base + 1, base + 2]);
    }

    fn push_quad(&mut self, a: Vec3, b: Vec3, c: Vec3, d: Vec3) {
        self.push_triangle(a, b, c);
        self.push_triangle(a, c, d);
    }
}

/// Lazily populated cache of shape meshes.
#[derive(Debug, Default)]
pub struct GeometryRegistry {
    meshes: HashMap<Shape, ShapeGeometry>,
}

impl GeometryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mesh for `shape`, building it on first use.
    pub fn get_or_build(&mut self, shape: Shape) -> &ShapeGeometry {
        self.meshes.entry(shape).or_insert_with(|| build(shape))
    }

    /// Returns the mesh for `shape` if it has already been built.
    #[must_use]
    pub fn get(&self, shape: Shape) -> Option<&ShapeGeometry> {
        self.meshes.get(&shape)
    }

    /// Number of meshes currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Reports whether no mesh has been built yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Drops every cached mesh.
    pub fn clear(&mut self) {
        self.meshes.clear();
    }
}

/// Builds the mesh for a single shape.
#[must_use]
pub fn build(shape: Shape) -> ShapeGeometry {
    match shape {
        Shape::Cube => cube(),
        Shape::Cylinder => cylinder(),
        Shape::Wedge => wedge(),
        Shape::Half => half(),
        Shape::Capital => capital(),
        Shape::Slab => slab(),
        Shape::FlutedCylinder => fluted_cylinder(),
        Shape::BeveledCube => beveled_cube(),
        Shape::LotusCapital => lotus_capital(),
    }
}

fn square() -> Vec<Vec2> {
    vec![
        Vec2::new(0.5, -0.5),
        Vec2::new(0.5, 0.5),
        Vec2::new(-0.5, 0.5),
        Vec2::new(-0.5, -0.5),
    ]
}

fn cube() -> ShapeGeometry {
    extrude(&square(), -0.5, 0.5)
}

fn half() -> ShapeGeometry {
    extrude(&square(), -0.5, 0.0)
}

fn slab() -> ShapeGeometry {
    extrude(&square(), -0.5, -0.25)
}

fn cylinder() -> ShapeGeometry {
    extrude(&radial_outline(ROUND_SEGMENTS, |_| 0.4), -0.5, 0.5)
}

fn fluted_cylinder() -> ShapeGeometry {
    let outline = radial_outline(ROUND_SEGMENTS * 3, |angle| {
        let groove = 0.5 + 0.5 * (angle * FLUTE_COUNT as f32).cos();
        0.4 * (1.0 - FLUTE_DEPTH * groove)
    });
    extrude(&outline, -0.5, 0.5)
}

fn beveled_cube() -> ShapeGeometry {
    let inner = 0.5 - BEVEL;
    let outline = vec![
        Vec2::new(0.5, -inner),
        Vec2::new(0.5, inner),
        Vec2::new(inner, 0.5),
        Vec2::new(-inner, 0.5),
        Vec2::new(-0.5, inner),
        Vec2::new(-0.5, -inner),
        Vec2::new(-inner, -0.5),
        Vec2::new(inner, -0.5),
    ];
    extrude(&outline, -0.5, 0.5)
}

fn capital() -> ShapeGeometry {
    lathe(&[
        (0.32, -0.5),
        (0.36, -0.3),
        (0.52, -0.1),
        (0.6, -0.05),
        (0.6, 0.0),
    ])
}

fn lotus_capital() -> ShapeGeometry {
    lathe(&[
        (0.3, -0.5),
        (0.42, -0.38),
        (0.53, -0.2),
        (0.55, -0.05),
        (0.48, 0.1),
    ])
}

fn wedge() -> ShapeGeometry {
    // Full height along the back (-z) edge, sloping down to the front floor.
    let a = Vec3::new(-0.5, -0.5, -0.5);
    let b = Vec3::new(0.5, -0.5, -0.5);
    let c = Vec3::new(0.5, -0.5, 0.5);
    let d = Vec3::new(-0.5, -0.5, 0.5);
    let e = Vec3::new(-0.5, 0.5, -0.5);
    let f = Vec3::new(0.5, 0.5, -0.5);

    let mut mesh = ShapeGeometry::default();
    mesh.push_quad(a, b, c, d);
    mesh.push_quad(a, e, f, b);
    mesh.push_quad(e, d, c, f);
    mesh.push_triangle(a, d, e);
    mesh.push_triangle(b, f, c);
    mesh
}

/// Outline sampled at increasing angles in the xz plane.
fn radial_outline(segments: usize, radius: impl Fn(f32) -> f32) -> Vec<Vec2> {
    (0..segments)
        .map(|segment| {
            let angle = TAU * segment as f32 / segments as f32;
            Vec2::new(angle.cos(), angle.sin()) * radius(angle)
        })
        .collect()
}

/// Extrudes a closed xz outline (ordered by increasing angle) between two heights.
fn extrude(outline: &[Vec2], bottom: f32, top: f32) -> ShapeGeometry {
    let mut mesh = ShapeGeometry::default();
    let at = |point: Vec2, y: f32| Vec3::new(point.x, y, point.y);
    let bottom_center = Vec3::new(0.0, bottom, 0.0);
    let top_center = Vec3::new(0.0, top, 0.0);

    for (index, current) in outline.iter().enumerate() {
        let next = outline[(index + 1) % outline.len()];
        mesh.push_quad(
            at(*current, bottom),
            at(*current, top),
            at(next, top),
            at(next, bottom),
        );
        mesh.push_triangle(top_center, at(next, top), at(*current, top));
        mesh.push_triangle(bottom_center, at(*current, bottom), at(next, bottom));
    }
    mesh
}

/// Revolves a `(radius, height)` profile, listed bottom to top, around the y axis.
fn lathe(profile: &[(f32, f32)]) -> ShapeGeometry {
    let mut mesh = ShapeGeometry::default();
    let ring = |radius: f32, y: f32, segment: usize| {
        let angle = TAU * (segment % ROUND_SEGMENTS) as f32 / ROUND_SEGMENTS as f32;
        Vec3::new(angle.cos() * radius, y, angle.sin() * radius)
    };

    for pair in profile.windows(2) {
        let (lower_radius, lower_y) = pair[0];
        let (upper_radius, upper_y) = pair[1];
        for segment in 0..ROUND_SEGMENTS {
            mesh.push_quad(
                ring(lower_radius, lower_y, segment),
                ring(upper_radius, upper_y, segment),
                ring(upper_radius, upper_y, segment + 1),
                ring(lower_radius, lower_y, segment + 1),
            );
        }
    }

    if let (Some(&(bottom_radius, bottom_y)), Some(&(top_radius, top_y))) =
        (profile.first(), profile.last())
    {
        let bottom_center = Vec3::new(0.0, bottom_y, 0.0);
        let top_center = Vec3::new(0.0, top_y, 0.0);
        for segment in 0..ROUND_SEGMENTS {
            mesh.push_triangle(
                bottom_center,
                ring(bottom_radius, bottom_y, segment),
                ring(bottom_radius, bottom_y, segment + 1),
            );
            mesh.push_triangle(
                top_center,
                ring(top_radius, top_y, segment + 1),
                ring(top_radius, top_y, segment),
            );
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_faces_point_outward(shape: Shape) {
        let mesh = build(shape);
        for triangle in mesh.indices.chunks(3) {
            let corners: Vec<Vec3> = triangle
                .iter()
                .map(|index| Vec3::from(mesh.positions[*index as usize]))
                .collect();
            let centroid = (corners[0] + corners[1] + corners[2]) / 3.0;
            let normal = Vec3::from(mesh.normals[triangle[0] as usize]);
            assert!(
                normal.dot(centroid) >= -1e-4,
                "{shape:?} has an inward-facing triangle at {centroid:?}",
            );
        }
    }

    #[test]
    fn convex_shapes_wind_outward() {
        for shape in [Shape::Cube, Shape::Cylinder, Shape::BeveledCube] {
            assert_faces_point_outward(shape);
        }
    }

    #[test]
    fn cube_triangles_cover_sides_and_caps() {
        // Four side quads plus a four-triangle fan on each cap.
        assert_eq!(build(Shape::Cube).triangle_count(), 16);
    }

    #[test]
    fn wedge_slope_faces_up_and_forward() {
        let mesh = build(Shape::Wedge);
        let expected = Vec3::new(0.0, 1.0, 1.0).normalize();
        let has_slope = mesh
            .normals
            .iter()
            .any(|normal| Vec3::from(*normal).distance(expected) < 1e-4);
        assert!(has_slope, "wedge is missing its sloped face");
    }

    #[test]
    fn every_shape_fits_inside_its_extents() {
        for shape in Shape::ALL {
            let mesh = build(shape);
            assert!(mesh.triangle_count() > 0, "{shape:?} produced no triangles");
            let half = shape.extents() * 0.5 + Vec3::splat(1e-4);
            for position in &mesh.positions {
                let point = Vec3::from(*position);
                assert!(point.x.abs() <= half.x && point.z.abs() <= half.z);
                assert!(point.y >= -0.5 - 1e-4 && point.y <= 0.5 + 1e-4);
            }
        }
    }

    #[test]
    fn registry_builds_lazily_and_clears() {
        let mut registry = GeometryRegistry::new();
        assert!(registry.is_empty());
        let triangles = registry.get_or_build(Shape::Slab).triangle_count();
        assert_eq!(
            registry.get(Shape::Slab).map(ShapeGeometry::triangle_count),
            Some(triangles)
        );
        assert!(registry.get(Shape::Cube).is_none());
        registry.clear();
        assert_eq!(registry.len(), 0);
    }
}
