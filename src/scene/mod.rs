use crate::animation::AnimationTrack;
use crate::assets::ResourceMap;
use crate::overlay::LineMesh;
use glam::{DMat4, DVec3};

/// Axis-aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: DVec3,
    pub max: DVec3,
}

impl Bounds {
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extent(&self) -> DVec3 {
        (self.max - self.min) * 0.5
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Box enclosing all eight corners after `transform`.
    pub fn transformed(&self, transform: &DMat4) -> Bounds {
        let corners = (0..8).map(|i| {
            DVec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        });
        let mut out: Option<Bounds> = None;
        for corner in corners {
            let p = transform.transform_point3(corner);
            let point = Bounds { min: p, max: p };
            out = Some(match out {
                Some(acc) => acc.union(&point),
                None => point,
            });
        }
        out.unwrap_or(*self)
    }
}

/// A fully resolved model: the original blob, every resource it needed, and
/// what the viewer derived from them at commit time.
#[derive(Debug, Clone)]
pub struct CommittedScene {
    generation: u64,
    blob: Vec<u8>,
    resources: ResourceMap,
    bounds: Option<Bounds>,
    tracks: Vec<AnimationTrack>,
    wireframe: Option<LineMesh>,
}

impl CommittedScene {
    pub fn new(
        generation: u64,
        blob: Vec<u8>,
        resources: ResourceMap,
        bounds: Option<Bounds>,
        tracks: Vec<AnimationTrack>,
    ) -> Self {
        Self {
            generation,
            blob,
            resources,
            bounds,
            tracks,
            wireframe: None,
        }
    }

    pub fn set_wireframe(&mut self, wireframe: Option<LineMesh>) {
        self.wireframe = wireframe;
    }

    /// Increases with every successful commit on a viewer.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    pub fn resources(&self) -> &ResourceMap {
        &self.resources
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn tracks(&self) -> &[AnimationTrack] {
        &self.tracks
    }

    /// World-space triangle edges, present when the scene was committed or
    /// later refreshed with the wireframe overlay on.
    pub fn wireframe(&self) -> Option<&LineMesh> {
        self.wireframe.as_ref()
    }
}
