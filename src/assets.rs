pub mod decode;
pub mod media;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{BoothError, BoothResult};
use media::VideoFeed;

/// Prepared raster image in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

#[derive(Clone, Debug)]
pub struct PreparedFont {
    pub bytes: Arc<Vec<u8>>,
}

pub enum PreparedAsset {
    Image(PreparedImage),
    Font(PreparedFont),
    Video(VideoFeed),
}

/// Load state of a registered asset. "Not yet loaded" is a steady,
/// recheckable state; draw paths skip the layer and try again next time.
pub enum AssetState {
    Loading,
    Ready(PreparedAsset),
    Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Font,
    Video,
}

struct Entry {
    kind: AssetKind,
    source: Option<String>,
    state: AssetState,
}

/// Name-keyed store of decorative assets (themes, filters, bubbles,
/// grain clips, fonts). Loading is explicit and fallible per entry; a
/// failed or pending entry never fails a draw.
pub struct AssetRegistry {
    root: PathBuf,
    entries: BTreeMap<String, Entry>,
}

impl AssetRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn register_image(&mut self, name: impl Into<String>, rel_path: impl Into<String>) {
        self.entries.insert(
            name.into(),
            Entry {
                kind: AssetKind::Image,
                source: Some(rel_path.into()),
                state: AssetState::Loading,
            },
        );
    }

    pub fn register_font(&mut self, name: impl Into<String>, rel_path: impl Into<String>) {
        self.entries.insert(
            name.into(),
            Entry {
                kind: AssetKind::Font,
                source: Some(rel_path.into()),
                state: AssetState::Loading,
            },
        );
    }

    pub fn register_video(&mut self, name: impl Into<String>, rel_path: impl Into<String>) {
        self.entries.insert(
            name.into(),
            Entry {
                kind: AssetKind::Video,
                source: Some(rel_path.into()),
                state: AssetState::Loading,
            },
        );
    }

    /// Register an already-prepared image (synthetic frames, test
    /// fixtures, the deterministic noise grain).
    pub fn insert_image(&mut self, name: impl Into<String>, image: PreparedImage) {
        self.entries.insert(
            name.into(),
            Entry {
                kind: AssetKind::Image,
                source: None,
                state: AssetState::Ready(PreparedAsset::Image(image)),
            },
        );
    }

    pub fn insert_font(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(
            name.into(),
            Entry {
                kind: AssetKind::Font,
                source: None,
                state: AssetState::Ready(PreparedAsset::Font(PreparedFont {
                    bytes: Arc::new(bytes),
                })),
            },
        );
    }

    /// Attempt every pending load. Each entry resolves to `Ready` or
    /// `Failed` independently; one broken file does not stop the rest.
    #[tracing::instrument(skip(self))]
    pub fn load_all(&mut self) {
        let root = self.root.clone();
        for (name, entry) in &mut self.entries {
            if !matches!(entry.state, AssetState::Loading) {
                continue;
            }
            let Some(source) = entry.source.clone() else {
                entry.state = AssetState::Failed("entry has no source path".to_string());
                continue;
            };
            entry.state = match load_entry(&root, entry.kind, &source) {
                Ok(prepared) => AssetState::Ready(prepared),
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "asset load failed");
                    AssetState::Failed(e.to_string())
                }
            };
        }
    }

    pub fn state(&self, name: &str) -> Option<&AssetState> {
        self.entries.get(name).map(|e| &e.state)
    }

    /// Natural pixel size of a ready image asset, if any.
    pub fn natural_size(&self, name: &str) -> Option<(u32, u32)> {
        match self.state(name)? {
            AssetState::Ready(PreparedAsset::Image(img)) => Some((img.width, img.height)),
            AssetState::Ready(PreparedAsset::Video(feed)) => {
                Some((feed.info.width, feed.info.height))
            }
            _ => None,
        }
    }

    /// Ready image lookup; `None` for pending, failed, or non-image
    /// entries. Callers treat `None` as "skip this layer".
    pub fn image(&self, name: &str) -> Option<&PreparedImage> {
        match self.state(name)? {
            AssetState::Ready(PreparedAsset::Image(img)) => Some(img),
            _ => None,
        }
    }

    pub fn font(&self, name: &str) -> Option<&PreparedFont> {
        match self.state(name)? {
            AssetState::Ready(PreparedAsset::Font(f)) => Some(f),
            _ => None,
        }
    }

    /// Current grain frame for a grain asset at `elapsed_sec`. Video
    /// grains decode (and loop) on demand; image grains are static.
    /// Decode errors degrade to `None` with a log line.
    pub fn grain_frame(&mut self, name: &str, elapsed_sec: f64) -> Option<PreparedImage> {
        let entry = self.entries.get_mut(name)?;
        match &mut entry.state {
            AssetState::Ready(PreparedAsset::Image(img)) => Some(img.clone()),
            AssetState::Ready(PreparedAsset::Video(feed)) => {
                match feed.frame_at(elapsed_sec) {
                    Ok(img) => Some(img),
                    Err(e) => {
                        tracing::warn!(name, error = %e, "grain frame decode failed");
                        None
                    }
                }
            }
            _ => None,
        }
    }
}

fn load_entry(root: &Path, kind: AssetKind, source: &str) -> BoothResult<PreparedAsset> {
    let norm = normalize_rel_path(source)?;
    let path = root.join(Path::new(&norm));
    match kind {
        AssetKind::Image => {
            let bytes = read_bytes(&path)?;
            Ok(PreparedAsset::Image(decode::decode_image(&bytes)?))
        }
        AssetKind::Font => {
            let bytes = read_bytes(&path)?;
            if bytes.is_empty() {
                return Err(BoothError::asset(format!(
                    "font file '{}' is empty",
                    path.display()
                )));
            }
            Ok(PreparedAsset::Font(PreparedFont {
                bytes: Arc::new(bytes),
            }))
        }
        AssetKind::Video => Ok(PreparedAsset::Video(VideoFeed::open(path)?)),
    }
}

fn read_bytes(path: &Path) -> BoothResult<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| BoothError::asset(format!("failed to read asset '{}': {e}", path.display())))
}

/// Normalize and validate registry-relative asset paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and
/// rejects absolute paths or parent traversals (`..`).
pub fn normalize_rel_path(source: &str) -> BoothResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(BoothError::validation("asset paths must be relative"));
    }
    if s.is_empty() {
        return Err(BoothError::validation("asset path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(BoothError::validation("asset paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(BoothError::validation(
            "asset path must contain a file name",
        ));
    }

    Ok(out.join("/"))
}
