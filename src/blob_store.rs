// Copyright (C) 2022 Cendyne.
// This file is part of Cendyne Media-Server.

// Cendyne Media-Server is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.

// Cendyne Media-Server is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use ct_codecs::{Base64UrlSafeNoPadding, Encoder};
use std::fs::{self, create_dir_all};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ConfigError;

pub const IMAGE_FOLDER_NAME: &str = "gallery_images";

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob {0} not found")]
    NotFound(String),

    #[error("Blob path {0} is not allowed")]
    InvalidPath(String),

    #[error("Blob storage failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Blob storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for image bytes, addressed by a relative path.
pub trait BlobStore: Send + Sync {
    /// Writes `content` at `path`, replacing whatever was there.
    fn put(&self, path: &str, content: &[u8], content_type: &str) -> Result<(), BlobError>;
    fn get(&self, path: &str) -> Result<Vec<u8>, BlobError>;
    fn delete(&self, path: &str) -> Result<(), BlobError>;
}

/// Storage path of a stored image. Derived from the id only, never from a
/// user supplied file name.
pub fn image_blob_path(id: &str) -> String {
    format!("{}/{}", IMAGE_FOLDER_NAME, id)
}

pub fn hash_bytes(input_bytes: &[u8]) -> String {
    let hash = blake3::hash(input_bytes);
    // Encoding into a String cannot exceed the output buffer
    Base64UrlSafeNoPadding::encode_to_string(hash.as_bytes()).unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn open(path: &str) -> Result<Self, ConfigError> {
        let upload_error = |source| ConfigError::UploadPath {
            path: path.to_string(),
            source,
        };
        create_dir_all(path).map_err(upload_error)?;
        let root = Path::new(path).canonicalize().map_err(upload_error)?;
        tracing::info!(root = %root.display(), "Blob storage directory ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(path);
        let only_normal = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if path.is_empty() || !only_normal {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for FileBlobStore {
    fn put(&self, path: &str, content: &[u8], _content_type: &str) -> Result<(), BlobError> {
        let destination = self.resolve(path)?;
        let io_error = |source| BlobError::Io {
            path: path.to_string(),
            source,
        };
        if let Some(parent) = destination.parent() {
            create_dir_all(parent).map_err(io_error)?;
        }
        // Write beside the destination and rename over it so readers never
        // observe a half written blob
        let staging = destination.with_file_name(format!(".{}.partial", Uuid::new_v4()));
        let written = fs::File::create(&staging).and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        });
        if let Err(err) = written.and_then(|_| fs::rename(&staging, &destination)) {
            let _ = fs::remove_file(&staging);
            return Err(io_error(err));
        }
        tracing::debug!(path, bytes = content.len(), "Wrote blob");
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        let source = self.resolve(path)?;
        fs::read(source).map_err(|err| match err.kind() {
            ErrorKind::NotFound => BlobError::NotFound(path.to_string()),
            _ => BlobError::Io {
                path: path.to_string(),
                source: err,
            },
        })
    }

    fn delete(&self, path: &str) -> Result<(), BlobError> {
        let target = self.resolve(path)?;
        match fs::remove_file(target) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(BlobError::Io {
                path: path.to_string(),
                source: err,
            }),
        }
    }
}

enum Undo {
    Remove(String),
    Restore {
        path: String,
        content: Vec<u8>,
        content_type: String,
    },
}

/// Records blob writes made inside a database transaction so they can be
/// reverted if the transaction does not commit.
pub struct BlobJournal<'a> {
    store: &'a dyn BlobStore,
    undo: Vec<Undo>,
}

impl<'a> BlobJournal<'a> {
    pub fn new(store: &'a dyn BlobStore) -> Self {
        Self {
            store,
            undo: Vec::new(),
        }
    }

    pub fn store(&self) -> &'a dyn BlobStore {
        self.store
    }

    /// Writes a blob. `replaces` carries the content type of the blob
    /// currently stored at `path`, if any.
    pub fn put(
        &mut self,
        path: &str,
        content: &[u8],
        content_type: &str,
        replaces: Option<&str>,
    ) -> Result<(), BlobError> {
        let undo = match replaces {
            None => Undo::Remove(path.to_string()),
            Some(previous_type) => match self.store.get(path) {
                Ok(previous) => Undo::Restore {
                    path: path.to_string(),
                    content: previous,
                    content_type: previous_type.to_string(),
                },
                Err(err) => {
                    tracing::warn!(path, error = %err, "Previous blob unreadable, it cannot be restored on rollback");
                    Undo::Remove(path.to_string())
                }
            },
        };
        self.store.put(path, content, content_type)?;
        self.undo.push(undo);
        Ok(())
    }

    pub fn commit(mut self) {
        self.undo.clear();
    }

    /// Reverts every journaled write, newest first. Failures are logged.
    pub fn rollback(mut self) {
        while let Some(undo) = self.undo.pop() {
            let (path, result) = match &undo {
                Undo::Remove(path) => (path, self.store.delete(path)),
                Undo::Restore {
                    path,
                    content,
                    content_type,
                } => (path, self.store.put(path, content, content_type)),
            };
            if let Err(err) = result {
                tracing::warn!(path = %path, error = %err, "Could not roll back blob write");
            }
        }
    }
}
