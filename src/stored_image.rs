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

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::time::SystemTime;
use uuid::Uuid;

use crate::blob_store::{hash_bytes, image_blob_path, BlobJournal, BlobStore};
use crate::error::GalleryError;
use crate::image_resizer::read_dimensions;
use crate::models::{NewStoredImage, StoredImage, StoredImageResponse, UpdateStoredImage};

/// An image identity that may not have content yet. The id exists before
/// any blob is written because the blob path is derived from it.
#[derive(Debug, Clone)]
pub struct ImageSlot {
    id: String,
    current: Option<StoredImage>,
}

impl ImageSlot {
    pub fn create(id_hint: Option<Uuid>) -> Self {
        let id = id_hint.unwrap_or_else(Uuid::new_v4).to_string();
        Self { id, current: None }
    }

    pub fn existing(image: StoredImage) -> Self {
        Self {
            id: image.id.clone(),
            current: Some(image),
        }
    }

    /// Reuses `image` when present, otherwise allocates a new identity.
    pub fn reuse_or_create(image: Option<StoredImage>) -> Self {
        match image {
            Some(image) => Self::existing(image),
            None => Self::create(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn blob_path(&self) -> String {
        image_blob_path(&self.id)
    }
}

impl StoredImage {
    pub fn blob_path(&self) -> String {
        image_blob_path(&self.id)
    }

    pub fn url(&self, media_url: &str) -> String {
        format!("{}/{}", media_url.trim_end_matches('/'), self.blob_path())
    }

    pub fn to_response(&self, media_url: &str) -> StoredImageResponse {
        StoredImageResponse {
            id: self.id.clone(),
            url: self.url(media_url),
            width: self.width,
            height: self.height,
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

pub fn find_stored_image(
    conn: &SqliteConnection,
    image_id: &str,
) -> Result<Option<StoredImage>, GalleryError> {
    use crate::schema::stored_image::dsl::*;
    let result = stored_image
        .filter(id.eq(image_id))
        .first(conn)
        .optional()?;
    Ok(result)
}

pub fn find_stored_images(
    conn: &SqliteConnection,
    ids: &[&str],
) -> Result<Vec<StoredImage>, GalleryError> {
    use crate::schema::stored_image::dsl::*;
    let result = stored_image.filter(id.eq_any(ids)).load(conn)?;
    Ok(result)
}

/// Writes `content` to the slot's blob path and records it, overwriting any
/// previous content of the same identity. Dimensions come from decoding the
/// content header.
pub fn save_blob(
    conn: &SqliteConnection,
    journal: &mut BlobJournal<'_>,
    slot: ImageSlot,
    content: &[u8],
    content_type: &str,
) -> Result<StoredImage, GalleryError> {
    use crate::schema::stored_image;

    let (width, height) = read_dimensions(content)?;
    let content_hash = hash_bytes(content);
    let length = content.len() as i64;
    let now = unix_now();
    let path = slot.blob_path();

    journal.put(
        &path,
        content,
        content_type,
        slot.current.as_ref().map(|image| image.content_type.as_str()),
    )?;

    match &slot.current {
        Some(_) => {
            diesel::update(stored_image::table.find(&slot.id))
                .set(&UpdateStoredImage {
                    width: width as i32,
                    height: height as i32,
                    content_type,
                    content_hash: &content_hash,
                    length,
                    modified: now,
                })
                .execute(conn)?;
        }
        None => {
            diesel::insert_into(stored_image::table)
                .values(&NewStoredImage {
                    id: &slot.id,
                    width: width as i32,
                    height: height as i32,
                    content_type,
                    content_hash: &content_hash,
                    length,
                    created: now,
                    modified: now,
                })
                .execute(conn)?;
        }
    }
    tracing::debug!(id = %slot.id, width, height, "Saved stored image");

    find_stored_image(conn, &slot.id)?
        .ok_or_else(|| GalleryError::NotFound(format!("Stored image {}", slot.id)))
}

/// Removes the blob, then the record. A blob that cannot be removed is
/// logged and left behind; the record is deleted regardless.
pub fn delete_stored_image(
    conn: &SqliteConnection,
    blobs: &dyn BlobStore,
    image: &StoredImage,
) -> Result<(), GalleryError> {
    use crate::schema::stored_image;

    let path = image.blob_path();
    if let Err(err) = blobs.delete(&path) {
        tracing::warn!(id = %image.id, path = %path, error = %err, "Could not delete image blob");
    }
    diesel::delete(stored_image::table.find(&image.id)).execute(conn)?;
    Ok(())
}
