use std::fs::File;
use std::io::{self, BufReader, Read};
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use image::metadata::Orientation;
use image::{ImageDecoder, ImageReader, RgbaImage};

use crate::config::{OrientationPolicy, SourceConfig, SourceKind};
use crate::media::transform::{FrameTransform, Rotation};
use crate::video::{MediaOpener, VideoDecodeEngine};

/// Read access to source locators.
pub trait SourceAccess: Send + Sync {
    fn open(&self, locator: &str) -> io::Result<Box<dyn Read + Send>>;

    /// Embedded orientation as (clockwise degrees, mirrored).
    fn orientation(&self, locator: &str) -> io::Result<(u16, bool)>;
}

/// Locators are local file paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileAccess;

impl SourceAccess for FileAccess {
    fn open(&self, locator: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(BufReader::new(File::open(locator)?)))
    }

    fn orientation(&self, locator: &str) -> io::Result<(u16, bool)> {
        let reader = ImageReader::new(BufReader::new(File::open(locator)?)).with_guessed_format()?;
        let mut decoder = reader.into_decoder().map_err(io::Error::other)?;
        let orientation = decoder.orientation().map_err(io::Error::other)?;
        Ok(orientation_pair(orientation))
    }
}

/// EXIF orientation as rotate-then-mirror.
pub fn orientation_pair(orientation: Orientation) -> (u16, bool) {
    match orientation {
        Orientation::NoTransforms => (0, false),
        Orientation::Rotate90 => (90, false),
        Orientation::Rotate180 => (180, false),
        Orientation::Rotate270 => (270, false),
        Orientation::FlipHorizontal => (0, true),
        Orientation::FlipVertical => (180, true),
        Orientation::Rotate90FlipH => (90, true),
        Orientation::Rotate270FlipH => (270, true),
    }
}

/// The loaded source.
pub enum DecodedSource {
    /// Pre-oriented still image.
    Still(Arc<RgbaImage>),
    /// Shared by every caller; the mutex serializes `next_frame`.
    Video(Mutex<VideoDecodeEngine>),
}

impl DecodedSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            DecodedSource::Still(_) => SourceKind::Image,
            DecodedSource::Video(_) => SourceKind::Video,
        }
    }

    pub fn release(&self) {
        if let DecodedSource::Video(engine) = self {
            engine.lock().unwrap_or_else(|e| e.into_inner()).release();
        }
    }
}

/// First openable locator among `preferred` and `proxy`.
pub fn resolve_locator(
    access: &dyn SourceAccess,
    preferred: &str,
    proxy: Option<&str>,
) -> Option<String> {
    for locator in std::iter::once(preferred).chain(proxy) {
        match access.open(locator) {
            Ok(_) => return Some(locator.to_string()),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                log::warn!("no permission to read {}: {}", locator, e)
            }
            Err(e) => log::warn!("cannot open {}: {}", locator, e),
        }
    }
    None
}

/// Loads the source `config` points at. Failures are logged and leave the
/// pipeline without a source.
pub fn resolve(
    config: &SourceConfig,
    access: &dyn SourceAccess,
    opener: &Arc<dyn MediaOpener>,
) -> Option<DecodedSource> {
    config.signature()?;
    let preferred = config.source_locator.as_deref()?.trim();
    let locator = resolve_locator(access, preferred, config.proxy_locator.as_deref())?;

    match config.source_kind {
        SourceKind::Image => match load_still(config, access, &locator) {
            Ok(image) => {
                log::info!(
                    "image source {} loaded, {}x{}",
                    locator,
                    image.width(),
                    image.height()
                );
                Some(DecodedSource::Still(Arc::new(image)))
            }
            Err(e) => {
                log::error!("image source {} unusable: {:#}", locator, e);
                None
            }
        },
        SourceKind::Video => {
            let mut engine = VideoDecodeEngine::new(
                opener.clone(),
                locator.clone(),
                config.decode_strategy,
                config.fps,
                config.hardware_decode,
            );
            match engine.start() {
                Ok(()) => Some(DecodedSource::Video(Mutex::new(engine))),
                Err(e) => {
                    log::error!("video source {} unusable: {:#}", locator, e);
                    None
                }
            }
        }
    }
}

/// Decodes a still and applies its orientation once.
pub fn load_still(
    config: &SourceConfig,
    access: &dyn SourceAccess,
    locator: &str,
) -> anyhow::Result<RgbaImage> {
    let mut bytes = Vec::new();
    access
        .open(locator)?
        .read_to_end(&mut bytes)
        .with_context(|| format!("read {}", locator))?;
    let image = image::load_from_memory(&bytes)
        .context("decode image")?
        .to_rgba8();

    let (degrees, metadata_mirror) = match config.orientation {
        OrientationPolicy::Auto => access.orientation(locator).unwrap_or_else(|e| {
            log::debug!("no orientation metadata for {}: {}", locator, e);
            (0, false)
        }),
        OrientationPolicy::Fixed(degrees) => (degrees, false),
    };
    let transform = FrameTransform::new(
        Rotation::from_degrees(degrees as i32),
        config.mirror ^ metadata_mirror,
    );
    if transform.is_identity() {
        return Ok(image);
    }
    Ok(transform.apply(&image))
}

#[cfg(test)]
#[path = "source_test.rs"]
mod source_test;

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::{HashMap, HashSet};
    use std::io::{self, Cursor, Read};
    use std::sync::Mutex;

    use image::{ImageFormat, RgbaImage};

    use super::SourceAccess;

    /// Locators served from memory.
    #[derive(Default)]
    pub struct MemoryAccess {
        files: Mutex<HashMap<String, Vec<u8>>>,
        orientations: Mutex<HashMap<String, (u16, bool)>>,
        denied: Mutex<HashSet<String>>,
    }

    impl MemoryAccess {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, locator: &str, bytes: Vec<u8>) {
            self.files
                .lock()
                .unwrap()
                .insert(locator.to_string(), bytes);
        }

        pub fn insert_png(&self, locator: &str, image: &RgbaImage) {
            let mut bytes = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .unwrap();
            self.insert(locator, bytes);
        }

        pub fn set_orientation(&self, locator: &str, degrees: u16, mirrored: bool) {
            self.orientations
                .lock()
                .unwrap()
                .insert(locator.to_string(), (degrees, mirrored));
        }

        pub fn deny(&self, locator: &str) {
            self.denied.lock().unwrap().insert(locator.to_string());
        }
    }

    impl SourceAccess for MemoryAccess {
        fn open(&self, locator: &str) -> io::Result<Box<dyn Read + Send>> {
            if self.denied.lock().unwrap().contains(locator) {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            match self.files.lock().unwrap().get(locator) {
                Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
                None => Err(io::Error::from(io::ErrorKind::NotFound)),
            }
        }

        fn orientation(&self, locator: &str) -> io::Result<(u16, bool)> {
            self.orientations
                .lock()
                .unwrap()
                .get(locator)
                .copied()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no exif"))
        }
    }
}
