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

use diesel::sqlite::SqliteConnection;
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::io::Cursor;
use std::time::{Duration, UNIX_EPOCH};

use crate::blob_store::{BlobError, BlobStore};
use crate::error::GalleryError;
use crate::models::StoredImage;
use crate::stored_image::find_stored_image;

pub const IMAGE_CACHE_MAX_AGE: u32 = 86400;

/// The bytes of one stored image together with the headers that describe
/// them.
#[derive(Debug)]
pub struct ImageContent {
    bytes: Vec<u8>,
    image: StoredImage,
}

impl ImageContent {
    pub fn load(
        conn: &SqliteConnection,
        blobs: &dyn BlobStore,
        image_id: &str,
    ) -> Result<Self, GalleryError> {
        let image = find_stored_image(conn, image_id)?
            .ok_or_else(|| GalleryError::NotFound(format!("Image {}", image_id)))?;
        let bytes = match blobs.get(&image.blob_path()) {
            Ok(bytes) => bytes,
            Err(BlobError::NotFound(_)) => {
                tracing::warn!(id = image_id, "Stored image has no blob");
                return Err(GalleryError::NotFound(format!("Image {}", image_id)));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Self { bytes, image })
    }

    pub fn etag(&self) -> String {
        format!("\"{}\"", self.image.content_hash)
    }

    pub fn last_modified(&self) -> String {
        let modified = UNIX_EPOCH + Duration::from_secs(self.image.modified.max(0) as u64);
        httpdate::fmt_http_date(modified)
    }
}

impl<'r> Responder<'r, 'static> for ImageContent {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'static> {
        let etag = self.etag();
        let last_modified = self.last_modified();
        let mut response_builder = Response::build();
        response_builder.sized_body(self.bytes.len(), Cursor::new(self.bytes));
        response_builder.raw_header("Content-Type", self.image.content_type);
        response_builder.raw_header("x-content-type-options", "nosniff");
        response_builder.raw_header("ETag", etag);
        response_builder.raw_header("Last-Modified", last_modified);
        response_builder.raw_header(
            "Cache-Control",
            format!("public, max-age={}", IMAGE_CACHE_MAX_AGE),
        );
        response_builder.ok()
    }
}
