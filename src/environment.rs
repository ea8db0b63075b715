use crate::engine::EnvironmentHandle;
use crate::error::ErrorKind;
use std::collections::HashMap;

const KTX1_IDENTIFIER: [u8; 12] = [
    0xAB, b'K', b'T', b'X', b' ', b'1', b'1', 0xBB, b'\r', b'\n', 0x1A, b'\n',
];
const KTX2_IDENTIFIER: [u8; 12] = [
    0xAB, b'K', b'T', b'X', b' ', b'2', b'0', 0xBB, b'\r', b'\n', 0x1A, b'\n',
];

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("environment payload is empty")]
    Empty,
    #[error("environment payload is not a KTX container")]
    NotKtx,
    #[error("failed to decode HDR image: {0}")]
    Hdr(#[from] image::ImageError),
    #[error("HDR environment must be a 2:1 equirectangular image, got {width}x{height}")]
    NotEquirect { width: u32, height: u32 },
}

impl EnvironmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EnvironmentError::Empty | EnvironmentError::NotEquirect { .. } => {
                ErrorKind::InvalidArgument
            }
            EnvironmentError::NotKtx | EnvironmentError::Hdr(_) => ErrorKind::Parse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KtxVersion {
    Ktx1,
    Ktx2,
}

/// Checks the container identifier only; the payload itself is the engine's
/// business.
pub fn validate_ktx(bytes: &[u8]) -> Result<KtxVersion, EnvironmentError> {
    if bytes.is_empty() {
        return Err(EnvironmentError::Empty);
    }
    if bytes.starts_with(&KTX1_IDENTIFIER) {
        Ok(KtxVersion::Ktx1)
    } else if bytes.starts_with(&KTX2_IDENTIFIER) {
        Ok(KtxVersion::Ktx2)
    } else {
        Err(EnvironmentError::NotKtx)
    }
}

/// Linear RGB equirectangular panorama, row-major from the top.
#[derive(Debug, Clone, PartialEq)]
pub struct EquirectImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 3]>,
}

pub fn decode_hdr(bytes: &[u8]) -> Result<EquirectImage, EnvironmentError> {
    if bytes.is_empty() {
        return Err(EnvironmentError::Empty);
    }
    let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Hdr)?.to_rgb32f();
    let (width, height) = decoded.dimensions();
    if width != height * 2 {
        return Err(EnvironmentError::NotEquirect { width, height });
    }
    let pixels = decoded.pixels().map(|pixel| pixel.0).collect();
    log::debug!("decoded HDR environment {width}x{height}");
    Ok(EquirectImage {
        width,
        height,
        pixels,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvironmentKind {
    IndirectLight,
    Skybox,
    Hdri,
}

#[derive(Debug)]
struct CacheEntry {
    key: Option<(EnvironmentKind, String)>,
    refs: usize,
}

/// Reference counts for engine environments, with optional reuse by key.
///
/// Every bound slot holds one reference. A keyed environment is shared by
/// every slot that asks for the same kind and key, so the payload is only
/// decoded and uploaded once. The engine handle is released when the count
/// reaches zero.
#[derive(Debug, Default)]
pub struct EnvironmentCache {
    entries: HashMap<EnvironmentHandle, CacheEntry>,
    keyed: HashMap<(EnvironmentKind, String), EnvironmentHandle>,
}

impl EnvironmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a reference to the environment stored under `key`, if any.
    pub fn lookup(&mut self, kind: EnvironmentKind, key: &str) -> Option<EnvironmentHandle> {
        let handle = *self.keyed.get(&(kind, key.to_owned()))?;
        self.retain(handle);
        Some(handle)
    }

    /// Registers a freshly created environment holding one reference.
    pub fn insert(&mut self, handle: EnvironmentHandle, kind: EnvironmentKind, key: Option<&str>) {
        let key = key.map(|key| (kind, key.to_owned()));
        if let Some(key) = &key {
            self.keyed.insert(key.clone(), handle);
        }
        self.entries.insert(handle, CacheEntry { key, refs: 1 });
    }

    pub fn retain(&mut self, handle: EnvironmentHandle) {
        if let Some(entry) = self.entries.get_mut(&handle) {
            entry.refs += 1;
        }
    }

    /// Drops one reference. Returns true when that was the last one and the
    /// engine handle should be released.
    pub fn release(&mut self, handle: EnvironmentHandle) -> bool {
        let Some(entry) = self.entries.get_mut(&handle) else {
            return false;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return false;
        }
        if let Some(entry) = self.entries.remove(&handle) {
            if let Some(key) = entry.key {
                self.keyed.remove(&key);
            }
        }
        true
    }

    /// Forgets every entry, returning the handles that were still live.
    pub fn clear(&mut self) -> Vec<EnvironmentHandle> {
        self.keyed.clear();
        self.entries.drain().map(|(handle, _)| handle).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ref_count(&self, handle: EnvironmentHandle) -> usize {
        self.entries.get(&handle).map_or(0, |entry| entry.refs)
    }
}
