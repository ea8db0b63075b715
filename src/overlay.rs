//! Line geometry for the wireframe and bounding-box debug overlays.
//!
//! Both overlays are plain line lists in world space. The engine only has to
//! upload and draw them with [`OverlayKind::color`].

use crate::scene::Bounds;
use gltf::mesh::Mode;
use std::collections::HashSet;

/// Wireframes are pushed slightly outwards so they do not z-fight the surface.
pub const WIREFRAME_INFLATE: f32 = 1.01;

const BOX_EDGES: [u32; 24] = [
    0, 1, 1, 3, 3, 2, 2, 0, 4, 5, 5, 7, 7, 6, 6, 4, 0, 4, 2, 6, 1, 5, 3, 7,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OverlayKind {
    Wireframe,
    BoundingBox,
}

impl OverlayKind {
    pub const ALL: [OverlayKind; 2] = [OverlayKind::Wireframe, OverlayKind::BoundingBox];

    /// Linear RGBA.
    pub fn color(self) -> [f32; 4] {
        match self {
            OverlayKind::Wireframe => [0.0, 0.85, 1.0, 0.6],
            OverlayKind::BoundingBox => [1.0, 0.3, 0.3, 0.8],
        }
    }
}

/// Vertex positions plus index pairs, one pair per segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineMesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl LineMesh {
    pub fn segment_count(&self) -> usize {
        self.indices.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Appends a primitive whose `edges` index into `positions`.
    pub fn append(&mut self, positions: &[[f32; 3]], edges: &[u32]) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(positions);
        self.indices.extend(edges.iter().map(|index| base + index));
    }

    /// Scales every vertex about the centre of the vertex bounds.
    pub fn inflate(&mut self, factor: f32) {
        let Some(first) = self.positions.first().copied() else {
            return;
        };
        let (min, max) = self.positions.iter().fold((first, first), |(min, max), p| {
            (
                [min[0].min(p[0]), min[1].min(p[1]), min[2].min(p[2])],
                [max[0].max(p[0]), max[1].max(p[1]), max[2].max(p[2])],
            )
        });
        let center = [
            (min[0] + max[0]) * 0.5,
            (min[1] + max[1]) * 0.5,
            (min[2] + max[2]) * 0.5,
        ];
        for p in &mut self.positions {
            for axis in 0..3 {
                p[axis] = center[axis] + (p[axis] - center[axis]) * factor;
            }
        }
    }
}

/// Unique triangle edges of an indexed primitive, as index pairs. `None` for
/// non-triangle topologies or fewer than three indices.
pub fn wireframe_edges(indices: &[u32], mode: Mode) -> Option<Vec<u32>> {
    if indices.len() < 3 {
        return None;
    }
    let mut edges = Vec::new();
    let mut seen = HashSet::new();
    let mut add = |a: u32, b: u32| {
        if seen.insert((a.min(b), a.max(b))) {
            edges.push(a);
            edges.push(b);
        }
    };
    let mut triangle = |a: u32, b: u32, c: u32| {
        add(a, b);
        add(b, c);
        add(c, a);
    };
    match mode {
        Mode::Triangles => {
            for tri in indices.chunks_exact(3) {
                triangle(tri[0], tri[1], tri[2]);
            }
        }
        Mode::TriangleStrip => {
            for (i, w) in indices.windows(3).enumerate() {
                // Odd strip triangles are wound the other way.
                if i % 2 == 1 {
                    triangle(w[0], w[2], w[1]);
                } else {
                    triangle(w[0], w[1], w[2]);
                }
            }
        }
        Mode::TriangleFan => {
            for w in indices[1..].windows(2) {
                triangle(indices[0], w[0], w[1]);
            }
        }
        Mode::Points | Mode::Lines | Mode::LineLoop | Mode::LineStrip => return None,
    }
    Some(edges)
}

/// The twelve edges of `bounds`.
pub fn bounding_box_lines(bounds: &Bounds) -> LineMesh {
    let min = bounds.min.as_vec3().to_array();
    let max = bounds.max.as_vec3().to_array();
    let positions = (0..8)
        .map(|i| {
            [
                if i & 4 == 0 { min[0] } else { max[0] },
                if i & 2 == 0 { min[1] } else { max[1] },
                if i & 1 == 0 { min[2] } else { max[2] },
            ]
        })
        .collect();
    LineMesh {
        positions,
        indices: BOX_EDGES.to_vec(),
    }
}
