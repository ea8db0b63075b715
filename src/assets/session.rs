use super::{GltfError, LoadError, ModelDocument, ResourceMap};
use crate::scene::CommittedScene;

/// A parsed model waiting for the host to fetch its external resources.
///
/// Holding one never touches the live scene. `commit` consumes it whether it
/// succeeds or not, so a failed commit cannot leave half a model behind.
#[derive(Debug)]
pub struct PendingLoad {
    blob: Vec<u8>,
    document: ModelDocument,
}

impl PendingLoad {
    pub fn begin(blob: Vec<u8>) -> Result<Self, GltfError> {
        let document = ModelDocument::parse(&blob)?;
        Ok(Self { blob, document })
    }

    pub fn required(&self) -> &[String] {
        self.document.external_resources()
    }

    /// Required identifiers absent from `resources`, in request order.
    pub fn missing(&self, resources: &ResourceMap) -> Vec<String> {
        self.required()
            .iter()
            .filter(|id| !resources.contains(id))
            .cloned()
            .collect()
    }

    pub fn blob_len(&self) -> usize {
        self.blob.len()
    }

    pub fn animation_count(&self) -> usize {
        self.document.animation_count()
    }

    /// `wireframe` also extracts the overlay edges while decoding.
    pub fn commit(
        self,
        resources: ResourceMap,
        generation: u64,
        wireframe: bool,
    ) -> Result<CommittedScene, LoadError> {
        let missing = self.missing(&resources);
        if !missing.is_empty() {
            return Err(LoadError::MissingResources { missing, resources });
        }
        let decoded = match self.document.decode(&resources, wireframe) {
            Ok(decoded) => decoded,
            Err(source) => return Err(LoadError::Decode { source, resources }),
        };
        let mut scene = CommittedScene::new(
            generation,
            self.blob,
            resources,
            decoded.bounds,
            decoded.tracks,
        );
        scene.set_wireframe(decoded.wireframe);
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::PendingLoad;
    use crate::assets::fixtures::{self, BASE_TEXTURE, MESH_BUFFER};
    use crate::assets::{LoadError, ResourceMap};

    #[test]
    fn begin_lists_required_resources() {
        let pending = PendingLoad::begin(fixtures::textured_model([0.0; 3])).unwrap();
        assert_eq!(pending.required(), &[MESH_BUFFER, BASE_TEXTURE]);
        assert_eq!(pending.missing(&ResourceMap::new()), pending.required());
    }

    #[test]
    fn commit_with_missing_resource_fails_and_returns_map() {
        let pending = PendingLoad::begin(fixtures::textured_model([0.0; 3])).unwrap();
        let partial: ResourceMap = [(BASE_TEXTURE, vec![1u8, 2, 3])].into_iter().collect();
        let err = pending.commit(partial.clone(), 1, false).unwrap_err();
        match err {
            LoadError::MissingResources { missing, resources } => {
                assert_eq!(missing, vec![MESH_BUFFER.to_string()]);
                assert_eq!(resources, partial);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn commit_builds_scene_with_extra_resources_kept() {
        let pending = PendingLoad::begin(fixtures::textured_model([0.0; 3])).unwrap();
        let blob_len = pending.blob_len();
        let mut resources = fixtures::textured_resources();
        resources.insert("unused.bin", vec![0u8; 4]);
        let scene = pending.commit(resources, 7, false).unwrap();
        assert_eq!(scene.generation(), 7);
        assert!(scene.wireframe().is_none());
        assert_eq!(scene.blob().len(), blob_len);
        assert_eq!(scene.resources().len(), 3);
        assert_eq!(scene.tracks().len(), 2);
        assert!(scene.bounds().is_some());
    }

    #[test]
    fn commit_can_carry_the_wireframe() {
        let pending = PendingLoad::begin(fixtures::textured_model([0.0; 3])).unwrap();
        assert_eq!(pending.animation_count(), 2);
        let scene = pending.commit(fixtures::textured_resources(), 1, true).unwrap();
        assert_eq!(scene.wireframe().map(|lines| lines.segment_count()), Some(3));
    }

    #[test]
    fn decode_failure_is_reported_with_resources() {
        let pending = PendingLoad::begin(fixtures::textured_model([0.0; 3])).unwrap();
        let mut resources = fixtures::textured_resources();
        resources.insert(MESH_BUFFER, Vec::new());
        let err = pending.commit(resources, 1, true).unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
        assert_eq!(err.into_resources().map(|r| r.len()), Some(2));
    }
}
