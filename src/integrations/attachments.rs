use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;

use super::IntegrationError;

/// Largest attachment accepted from the booking form.
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// Destination folders in the attachment store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Folder {
    Requisitions,
    Reports,
}

impl Folder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requisitions => "requisitions",
            Self::Reports => "reports",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requisitions" => Some(Self::Requisitions),
            "reports" => Some(Self::Reports),
            _ => None,
        }
    }
}

/// Result of an upload: a store id and a link staff can open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: String,
    pub link: String,
}

pub trait AttachmentStore: Send + Sync {
    fn upload(&self, bytes: &[u8], name: &str, folder: Folder) -> Result<StoredFile, IntegrationError>;

    /// File contents, or `None` if nothing is stored under that name.
    fn read(&self, folder: Folder, name: &str) -> Result<Option<Vec<u8>>, IntegrationError>;
}

/// Stores files under `<root>/<folder>/<name>`; links point at the
/// authenticated file route of this service.
pub struct LocalAttachmentStore {
    root: PathBuf,
    public_url: String,
}

impl LocalAttachmentStore {
    pub fn new(root: &Path, public_url: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    fn link_for(&self, folder: Folder, id: &str) -> String {
        format!("{}/api/files/{}/{}", self.public_url, folder.as_str(), id)
    }
}

impl AttachmentStore for LocalAttachmentStore {
    fn upload(&self, bytes: &[u8], name: &str, folder: Folder) -> Result<StoredFile, IntegrationError> {
        let dir = self.root.join(folder.as_str());
        fs::create_dir_all(&dir)?;

        let mut id = sanitize_file_name(name);
        if dir.join(&id).exists() {
            let prefix = uuid::Uuid::new_v4().simple().to_string();
            id = format!("{}-{id}", &prefix[..8]);
        }

        // Write to a staging name first so readers never see a partial file.
        let staging = dir.join(format!(".{id}.part"));
        fs::write(&staging, bytes)?;
        fs::rename(&staging, dir.join(&id))?;

        tracing::debug!(folder = folder.as_str(), id = %id, size = bytes.len(), "Stored attachment");
        Ok(StoredFile {
            link: self.link_for(folder, &id),
            id,
        })
    }

    fn read(&self, folder: Folder, name: &str) -> Result<Option<Vec<u8>>, IntegrationError> {
        if name.is_empty() || name != sanitize_file_name(name) || name.starts_with('.') {
            return Ok(None);
        }
        match fs::read(self.root.join(folder.as_str()).join(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keep a file name to `[A-Za-z0-9._-]`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "file".into()
    } else {
        cleaned
    }
}

/// A decoded `data:<mime>;base64,<payload>` upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrlFile {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Decode a base64 data URL. A bare base64 string is accepted too.
pub fn decode_data_url(data_url: &str) -> Result<DataUrlFile, String> {
    let (header, payload) = match data_url.find(',') {
        Some(idx) => (&data_url[..idx], &data_url[idx + 1..]),
        None => ("", data_url),
    };

    let content_type = header
        .strip_prefix("data:")
        .and_then(|rest| rest.split(';').next())
        .filter(|mime| !mime.is_empty())
        .map(str::to_string);

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("Base64 decode failed: {e}"))?;

    Ok(DataUrlFile { content_type, bytes })
}
