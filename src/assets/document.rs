//! Structural reader for glTF 2.0 models (JSON or GLB).
//!
//! Parsing only looks at the document: it is enough to list the external
//! resources a model needs and to reject node graphs that are not a forest.
//! Decoding at commit time checks those resources against the buffer
//! declarations and derives animation durations, world-space bounds and,
//! on request, the wireframe overlay.

use super::ResourceMap;
use crate::animation::AnimationTrack;
use crate::overlay::{self, LineMesh};
use crate::scene::Bounds;
use ::gltf::buffer::Source as BufferSource;
use ::gltf::image::Source as ImageSource;
use ::gltf::json::Value;
use ::gltf::{Gltf, Semantic};
use glam::{DMat4, DVec3, Mat4};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum GltfError {
    #[error("model blob is empty")]
    Empty,
    #[error("invalid glTF: {0}")]
    Invalid(#[from] ::gltf::Error),
    #[error("node {node} is a child of both node {first_parent} and node {second_parent}")]
    SharedNode {
        node: usize,
        first_parent: usize,
        second_parent: usize,
    },
    #[error("node {node} is part of a cycle in the node hierarchy")]
    NodeCycle { node: usize },
    #[error("buffer {index} references resource {uri} which was not supplied")]
    MissingBuffer { index: usize, uri: String },
    #[error("buffer {index} has a malformed data URI")]
    InvalidDataUri { index: usize },
    #[error("buffer {index} declares {declared} bytes but only {available} are available")]
    BufferTooShort {
        index: usize,
        declared: usize,
        available: usize,
    },
}

/// Everything derived from a model at commit time.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedModel {
    pub tracks: Vec<AnimationTrack>,
    pub bounds: Option<Bounds>,
    pub wireframe: Option<LineMesh>,
}

pub struct ModelDocument {
    gltf: Gltf,
    required: Vec<String>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl fmt::Debug for ModelDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDocument")
            .field("required", &self.required)
            .field("nodes", &self.children.len())
            .field("buffers", &self.gltf.buffers().len())
            .field("animations", &self.gltf.animations().len())
            .field("blob_len", &self.gltf.blob.as_ref().map(Vec::len))
            .finish()
    }
}

impl ModelDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, GltfError> {
        if bytes.is_empty() {
            return Err(GltfError::Empty);
        }
        let gltf = Gltf::from_slice(bytes)?;
        let children = node_forest(&gltf)?;
        let roots = scene_roots(&gltf, &children);
        let required = external_resources(&gltf);
        log::debug!(
            "parsed glTF: {} nodes, {} buffers, {} images, {} animations, {} external resources",
            children.len(),
            gltf.buffers().len(),
            gltf.images().len(),
            gltf.animations().len(),
            required.len()
        );
        Ok(Self {
            gltf,
            required,
            children,
            roots,
        })
    }

    /// External resource identifiers, buffers first then images, without
    /// duplicates.
    pub fn external_resources(&self) -> &[String] {
        &self.required
    }

    pub fn animation_count(&self) -> usize {
        self.gltf.animations().len()
    }

    pub fn decode(&self, resources: &ResourceMap, wireframe: bool) -> Result<DecodedModel, GltfError> {
        self.check_buffers(resources)?;
        let world = self.world_matrices();
        Ok(DecodedModel {
            tracks: self.animation_tracks(),
            bounds: self.bounds(&world),
            wireframe: if wireframe {
                self.wireframe(resources, &world)
            } else {
                None
            },
        })
    }

    fn check_buffers(&self, resources: &ResourceMap) -> Result<(), GltfError> {
        for buffer in self.gltf.buffers() {
            let index = buffer.index();
            let declared = buffer.length();
            let available = match buffer.source() {
                BufferSource::Bin => self.gltf.blob.as_ref().map_or(0, Vec::len),
                BufferSource::Uri(uri) if is_data_uri(uri) => {
                    data_uri_len(uri).ok_or(GltfError::InvalidDataUri { index })?
                }
                BufferSource::Uri(uri) => resources
                    .get(uri)
                    .map(<[u8]>::len)
                    .ok_or_else(|| GltfError::MissingBuffer {
                        index,
                        uri: uri.to_string(),
                    })?,
            };
            if available < declared {
                return Err(GltfError::BufferTooShort {
                    index,
                    declared,
                    available,
                });
            }
        }
        Ok(())
    }

    fn animation_tracks(&self) -> Vec<AnimationTrack> {
        self.gltf
            .animations()
            .map(|animation| {
                let duration = animation
                    .samplers()
                    .filter_map(|sampler| sampler.input().max())
                    .filter_map(|max| first_number(&max))
                    .filter(|value| value.is_finite())
                    .fold(0.0, f64::max);
                AnimationTrack {
                    index: animation.index(),
                    name: animation.name().map(str::to_owned),
                    duration,
                }
            })
            .collect()
    }

    /// World matrix of every node reachable from the displayed scene, each
    /// computed exactly once. Unreachable nodes are `None`.
    fn world_matrices(&self) -> Vec<Option<DMat4>> {
        let locals: Vec<DMat4> = self
            .gltf
            .nodes()
            .map(|node| Mat4::from_cols_array_2d(&node.transform().matrix()).as_dmat4())
            .collect();
        let mut world = vec![None; locals.len()];
        let mut stack: Vec<(usize, DMat4)> = self
            .roots
            .iter()
            .map(|&root| (root, DMat4::IDENTITY))
            .collect();
        while let Some((index, parent)) = stack.pop() {
            if world[index].is_some() {
                continue;
            }
            let matrix = parent * locals[index];
            world[index] = Some(matrix);
            stack.extend(self.children[index].iter().map(|&child| (child, matrix)));
        }
        world
    }

    fn bounds(&self, world: &[Option<DMat4>]) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        for node in self.gltf.nodes() {
            let (Some(mesh), Some(matrix)) = (node.mesh(), world[node.index()]) else {
                continue;
            };
            for primitive in mesh.primitives() {
                let Some(local) = primitive
                    .get(&Semantic::Positions)
                    .and_then(|accessor| position_box(accessor.min(), accessor.max()))
                else {
                    continue;
                };
                let placed = local.transformed(&matrix);
                bounds = Some(match bounds {
                    Some(acc) => acc.union(&placed),
                    None => placed,
                });
            }
        }
        bounds
    }

    /// Unique triangle edges of every reachable mesh in world space. Buffers
    /// embedded as `data:` URIs are skipped.
    fn wireframe(&self, resources: &ResourceMap, world: &[Option<DMat4>]) -> Option<LineMesh> {
        let buffers: Vec<Option<&[u8]>> = self
            .gltf
            .buffers()
            .map(|buffer| match buffer.source() {
                BufferSource::Bin => self.gltf.blob.as_deref(),
                BufferSource::Uri(uri) if is_data_uri(uri) => None,
                BufferSource::Uri(uri) => resources.get(uri),
            })
            .collect();

        let mut lines = LineMesh::default();
        for node in self.gltf.nodes() {
            let (Some(mesh), Some(matrix)) = (node.mesh(), world[node.index()]) else {
                continue;
            };
            for primitive in mesh.primitives() {
                let reader = primitive.reader(|buffer| buffers.get(buffer.index()).copied().flatten());
                let Some(read_positions) = reader.read_positions() else {
                    continue;
                };
                let positions: Vec<[f32; 3]> = read_positions
                    .map(|p| {
                        matrix
                            .transform_point3(DVec3::from(p.map(f64::from)))
                            .as_vec3()
                            .to_array()
                    })
                    .collect();
                if positions.is_empty() {
                    continue;
                }
                let indices: Vec<u32> = match reader.read_indices() {
                    Some(read) => read.into_u32().collect(),
                    None => (0..positions.len() as u32).collect(),
                };
                let Some(edges) = overlay::wireframe_edges(&indices, primitive.mode()) else {
                    continue;
                };
                if edges.iter().any(|&index| index as usize >= positions.len()) {
                    log::debug!(
                        "skipping wireframe for mesh {} primitive {}: index out of range",
                        mesh.index(),
                        primitive.index()
                    );
                    continue;
                }
                lines.append(&positions, &edges);
            }
        }
        if lines.is_empty() {
            return None;
        }
        lines.inflate(overlay::WIREFRAME_INFLATE);
        Some(lines)
    }
}

/// Child lists per node, after checking that every node has at most one
/// parent and that following parents always ends at a root.
fn node_forest(gltf: &Gltf) -> Result<Vec<Vec<usize>>, GltfError> {
    let count = gltf.nodes().len();
    let mut parents: Vec<Option<usize>> = vec![None; count];
    let mut children = vec![Vec::new(); count];
    for node in gltf.nodes() {
        for child in node.children() {
            let index = child.index();
            if let Some(first_parent) = parents[index] {
                return Err(GltfError::SharedNode {
                    node: index,
                    first_parent,
                    second_parent: node.index(),
                });
            }
            parents[index] = Some(node.index());
            children[node.index()].push(index);
        }
    }

    // With single parents, a node unreachable from every root sits on a cycle.
    let mut reached = vec![false; count];
    let mut stack: Vec<usize> = (0..count).filter(|&i| parents[i].is_none()).collect();
    while let Some(index) = stack.pop() {
        reached[index] = true;
        stack.extend(&children[index]);
    }
    if let Some(node) = reached.iter().position(|&r| !r) {
        return Err(GltfError::NodeCycle { node });
    }
    Ok(children)
}

/// Root nodes of the default scene, the first scene, or every parentless
/// node when the document has no scenes.
fn scene_roots(gltf: &Gltf, children: &[Vec<usize>]) -> Vec<usize> {
    if let Some(scene) = gltf.default_scene().or_else(|| gltf.scenes().next()) {
        return scene.nodes().map(|node| node.index()).collect();
    }
    let with_parent: HashSet<usize> = children.iter().flatten().copied().collect();
    (0..children.len()).filter(|i| !with_parent.contains(i)).collect()
}

fn external_resources(gltf: &Gltf) -> Vec<String> {
    let buffer_uris = gltf.buffers().filter_map(|buffer| match buffer.source() {
        BufferSource::Uri(uri) => Some(uri),
        BufferSource::Bin => None,
    });
    let image_uris = gltf.images().filter_map(|image| match image.source() {
        ImageSource::Uri { uri, .. } => Some(uri),
        ImageSource::View { .. } => None,
    });

    let mut seen = HashSet::new();
    buffer_uris
        .chain(image_uris)
        .filter(|uri| !is_data_uri(uri))
        .filter(|uri| seen.insert(*uri))
        .map(str::to_owned)
        .collect()
}

fn position_box(min: Option<Value>, max: Option<Value>) -> Option<Bounds> {
    Some(Bounds::new(vec3(&min?)?, vec3(&max?)?))
}

fn vec3(value: &Value) -> Option<DVec3> {
    match value.as_array()?.as_slice() {
        [x, y, z, ..] => Some(DVec3::new(x.as_f64()?, y.as_f64()?, z.as_f64()?)),
        _ => None,
    }
}

fn first_number(value: &Value) -> Option<f64> {
    match value {
        Value::Array(items) => items.first()?.as_f64(),
        other => other.as_f64(),
    }
}

fn is_data_uri(uri: &str) -> bool {
    uri.starts_with("data:")
}

/// Byte length a `data:` URI decodes to.
fn data_uri_len(uri: &str) -> Option<usize> {
    let (header, payload) = uri.strip_prefix("data:")?.split_once(',')?;
    if header.ends_with(";base64") {
        let digits = payload.trim_end_matches('=');
        if digits.len() % 4 == 1 {
            return None;
        }
        Some(digits.len() * 3 / 4)
    } else {
        Some(payload.len())
    }
}
