//! files picked for import or upload
pub mod import;
pub mod preview;
pub mod validate;

use {
    crate::error::Result,
    std::{
        io::SeekFrom,
        path::{Path, PathBuf},
        sync::Arc,
    },
    tokio::io::{AsyncReadExt, AsyncSeekExt},
};

/// the mime type used when nothing better is known
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// known extensions and the mime types they map to
const MIME_TABLE: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("avif", "image/avif"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("csv", "text/csv"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mov", "video/quicktime"),
];

/// the mime type an extension maps to, if it's a known one
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.').to_lowercase();
    MIME_TABLE
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

/// the lowercase extension of a file name, without the dot
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_lowercase())
}

/// guess a mime type from a file name
pub fn guess_mime(name: &str) -> &'static str {
    extension_of(name)
        .and_then(|ext| mime_for_extension(&ext))
        .unwrap_or(FALLBACK_MIME)
}

/// where the bytes of a blob live
#[derive(Debug, Clone)]
pub enum BlobSource {
    /// bytes already in memory
    Memory(Arc<[u8]>),
    /// a file on disk, read lazily
    Path(PathBuf),
}

/// a picked file: a name, a size, a declared mime type and a way to get at the bytes
#[derive(Debug, Clone)]
pub struct FileBlob {
    /// the file name, without any directories
    pub name: String,
    /// the size in bytes
    pub size: u64,
    /// the declared mime type
    pub mime: String,
    /// the bytes
    pub source: BlobSource,
}

impl FileBlob {
    /// wrap in-memory bytes; the mime type is guessed from the name when not given
    pub fn from_bytes(name: impl Into<String>, mime: Option<&str>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let bytes: Arc<[u8]> = bytes.into();

        Self {
            mime: mime.map(String::from).unwrap_or_else(|| guess_mime(&name).to_string()),
            size: bytes.len() as u64,
            name,
            source: BlobSource::Memory(bytes),
        }
    }

    /// describe a file on disk
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            mime: guess_mime(&name).to_string(),
            size: meta.len(),
            name,
            source: BlobSource::Path(path.to_path_buf()),
        })
    }

    /// the lowercase extension, without the dot
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }

    /// whether the declared mime type is an image one
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    /// read the bytes in `start..end`, clamped to the blob
    pub async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        let end = end.min(self.size);
        let start = start.min(end);

        match &self.source {
            BlobSource::Memory(bytes) => Ok(bytes[start as usize..end as usize].to_vec()),
            BlobSource::Path(path) => {
                let mut file = tokio::fs::File::open(path).await?;
                file.seek(SeekFrom::Start(start)).await?;

                let mut buf = Vec::with_capacity((end - start) as usize);
                file.take(end - start).read_to_end(&mut buf).await?;
                Ok(buf)
            }
        }
    }

    /// read every byte
    pub async fn read_all(&self) -> Result<Vec<u8>> {
        self.read_range(0, self.size).await
    }

    /// how many chunks of `chunk_size` the blob splits into (at least one)
    pub fn chunk_count(&self, chunk_size: u64) -> u64 {
        self.size.div_ceil(chunk_size.max(1)).max(1)
    }
}
