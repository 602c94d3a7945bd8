// src/db/image.rs
// Image payloads: data URL parsing, MIME allow-list, on-disk files

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{MinervaError, Result};

/// MIME types accepted for image turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageMime {
    Png,
    Jpeg,
    Webp,
}

impl ImageMime {
    /// Parse a MIME string against the allow-list. `image/jpg` is accepted
    /// as an alias for `image/jpeg`.
    pub fn parse(mime: &str) -> Result<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Ok(Self::Png),
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            "image/webp" => Ok(Self::Webp),
            other => Err(MinervaError::UnsupportedMime(other.to_string())),
        }
    }

    /// Guess from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let guess = mime_guess::from_path(path)
            .first_raw()
            .ok_or_else(|| MinervaError::UnsupportedMime(path.display().to_string()))?;
        Self::parse(guess)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }
}

impl fmt::Display for ImageMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw image bytes recovered from a data URL
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub mime: ImageMime,
    pub bytes: Vec<u8>,
}

/// Image re-encoded for transport, produced on read from the file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime: ImageMime,
    /// Standard base64 of the file contents
    pub base64: String,
}

impl InlineImage {
    pub fn from_bytes(mime: ImageMime, bytes: &[u8]) -> Self {
        Self {
            mime,
            base64: STANDARD.encode(bytes),
        }
    }

    /// `data:<mime>;base64,<payload>`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64)
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(&self.base64)?)
    }
}

/// Build a data URL from raw bytes
pub fn encode_data_url(mime: ImageMime, bytes: &[u8]) -> String {
    InlineImage::from_bytes(mime, bytes).data_url()
}

/// Parse `<mime-descriptor>,<encoded-payload>` where the descriptor is
/// `data:<mime>;base64` (the `data:` prefix is optional).
pub fn parse_data_url(content: &str) -> Result<DecodedImage> {
    let (descriptor, payload) = content
        .split_once(',')
        .ok_or_else(|| MinervaError::MalformedImage("missing ',' separator".into()))?;

    let descriptor = descriptor.trim();
    let descriptor = descriptor.strip_prefix("data:").unwrap_or(descriptor);
    let (mime, encoding) = descriptor
        .split_once(';')
        .ok_or_else(|| MinervaError::MalformedImage("descriptor has no encoding".into()))?;

    if !encoding.trim().eq_ignore_ascii_case("base64") {
        return Err(MinervaError::MalformedImage(format!(
            "unsupported encoding '{}'",
            encoding.trim()
        )));
    }

    let mime = ImageMime::parse(mime)?;

    let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(cleaned)?;
    if bytes.is_empty() {
        return Err(MinervaError::MalformedImage("empty payload".into()));
    }

    Ok(DecodedImage { mime, bytes })
}

/// Write image bytes under a session- and timestamp-qualified unique name.
///
/// The file is opened with `create_new` so an existing file is never
/// overwritten.
pub fn write_image_file(
    dir: &Path,
    session_id: i64,
    timestamp: i64,
    image: &DecodedImage,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let suffix = rand::random::<u64>() & 0xffff_ffff_ffff;
    let name = format!(
        "img_{}_{}_{:012x}.{}",
        session_id,
        timestamp,
        suffix,
        image.mime.extension()
    );
    let path = dir.join(name);

    let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
    write_or_remove(&path, &mut file, &image.bytes)?;
    Ok(path)
}

/// Write all bytes to a freshly created file; on failure the partial file
/// at `path` is removed so no untracked file is left behind.
fn write_or_remove(path: &Path, out: &mut impl Write, bytes: &[u8]) -> Result<()> {
    let written = out.write_all(bytes).and_then(|()| out.flush());
    if let Err(e) = written {
        if let Err(rm) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %rm, "Failed to remove partial image file");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Read an image file back and re-encode it for transport
pub fn read_inline_image(path: &Path, mime: ImageMime) -> Result<InlineImage> {
    let bytes = std::fs::read(path)?;
    Ok(InlineImage::from_bytes(mime, &bytes))
}
