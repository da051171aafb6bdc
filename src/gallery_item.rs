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

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::blob_store::{BlobJournal, BlobStore};
use crate::content_type::sniff_image_content_type;
use crate::error::GalleryError;
use crate::image_resizer::ImageResizer;
use crate::models::{GalleryItemRecord, GalleryItemResponse, GalleryItemRow, ItemTag, StoredImage};
use crate::stored_image::{delete_stored_image, find_stored_image, find_stored_images, save_blob, ImageSlot};
use crate::tag::{find_tags_for_items, replace_item_tags};

/// Largest side of a thumbnail, in pixels.
pub const THUMBNAIL_SIZE_PX: u32 = 300;
/// Largest side of a large derivative, in pixels.
pub const LARGE_SIZE_PX: u32 = 1000;
pub const REDUCED_IMAGE_COMPRESSION_QUALITY: u8 = 85;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemDetails {
    pub title: String,
    pub artist_name: String,
    pub created_date: Option<NaiveDate>,
    pub description: String,
    pub media_description: String,
    pub size_description: String,
}

impl ItemDetails {
    fn validate(&self) -> Result<(), GalleryError> {
        if self.title.trim().is_empty() {
            return Err(GalleryError::validation("A title is required"));
        }
        if self.artist_name.trim().is_empty() {
            return Err(GalleryError::validation("An artist name is required"));
        }
        Ok(())
    }
}

/// Original image bytes submitted by a caller, checked to be a supported
/// image format.
#[derive(Debug)]
pub struct UploadedImage {
    content: Vec<u8>,
    content_type: &'static str,
}

impl UploadedImage {
    pub fn from_bytes(content: Vec<u8>, max_bytes: usize) -> Result<Self, GalleryError> {
        if content.is_empty() {
            return Err(GalleryError::validation("The original image is empty"));
        }
        if content.len() > max_bytes {
            return Err(GalleryError::validation(format!(
                "The original image is {} bytes, the limit is {} bytes",
                content.len(),
                max_bytes
            )));
        }
        let content_type = sniff_image_content_type(&content).ok_or_else(|| {
            GalleryError::validation("The original image is not a supported image format")
        })?;
        Ok(Self {
            content,
            content_type,
        })
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }
}

#[derive(Clone, Copy, Debug)]
enum Derivative {
    Thumbnail,
    Large,
}

impl Derivative {
    fn box_size(self) -> u32 {
        match self {
            Derivative::Thumbnail => THUMBNAIL_SIZE_PX,
            Derivative::Large => LARGE_SIZE_PX,
        }
    }
}

struct SavedImages {
    original: StoredImage,
    thumbnail: StoredImage,
    large: StoredImage,
}

/// A gallery item with its original image and the two derivatives made
/// from it. The derivatives can only be produced by [`GalleryItem::persist`].
#[derive(Debug)]
pub struct GalleryItem {
    id: String,
    details: ItemDetails,
    tags: BTreeSet<String>,
    original: Option<StoredImage>,
    thumbnail: Option<StoredImage>,
    large: Option<StoredImage>,
    staged_original: Option<UploadedImage>,
}

impl GalleryItem {
    pub fn new(details: ItemDetails) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            details,
            tags: BTreeSet::new(),
            original: None,
            thumbnail: None,
            large: None,
            staged_original: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn details(&self) -> &ItemDetails {
        &self.details
    }

    pub fn details_mut(&mut self) -> &mut ItemDetails {
        &mut self.details
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
    }

    pub fn original(&self) -> Option<&StoredImage> {
        self.original.as_ref()
    }

    pub fn thumbnail(&self) -> Option<&StoredImage> {
        self.thumbnail.as_ref()
    }

    pub fn large(&self) -> Option<&StoredImage> {
        self.large.as_ref()
    }

    /// Attaches or replaces the original image. Nothing is written and no
    /// derivative is produced until the next [`GalleryItem::persist`].
    pub fn set_original_image(&mut self, upload: UploadedImage) {
        self.staged_original = Some(upload);
    }

    /// Writes the item. The original is decoded once, both derivatives are
    /// regenerated from it, and all image and item records are committed in
    /// one immediate transaction. Any failure rolls back the records and the
    /// blob writes made so far.
    pub fn persist(
        &mut self,
        conn: &SqliteConnection,
        blobs: &dyn BlobStore,
    ) -> Result<(), GalleryError> {
        self.details.validate()?;
        for tag in &self.tags {
            crate::tag::validate_tag_name(tag)?;
        }
        let mut journal = BlobJournal::new(blobs);
        let result = conn.immediate_transaction::<_, GalleryError, _>(|| {
            self.persist_in_transaction(conn, &mut journal)
        });
        match result {
            Ok(saved) => {
                journal.commit();
                tracing::info!(
                    id = %self.id,
                    original = %saved.original.id,
                    thumbnail = %saved.thumbnail.id,
                    large = %saved.large.id,
                    "Persisted gallery item"
                );
                self.original = Some(saved.original);
                self.thumbnail = Some(saved.thumbnail);
                self.large = Some(saved.large);
                self.staged_original = None;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(id = %self.id, error = %err, "Gallery item was not persisted");
                journal.rollback();
                Err(err)
            }
        }
    }

    fn persist_in_transaction(
        &self,
        conn: &SqliteConnection,
        journal: &mut BlobJournal<'_>,
    ) -> Result<SavedImages, GalleryError> {
        use crate::schema::gallery_item;

        // Current state is re-read inside the transaction so regeneration
        // works from whichever original was committed last
        let existing = find_gallery_item_record(conn, &self.id)?;
        let (current_original, current_thumbnail, current_large) = match &existing {
            Some(record) => (
                find_stored_image(conn, &record.original_image_id)?,
                find_stored_image(conn, &record.thumbnail_image_id)?,
                find_stored_image(conn, &record.large_image_id)?,
            ),
            None => (None, None, None),
        };

        let original_bytes: Cow<'_, [u8]> = match (&self.staged_original, &current_original) {
            (Some(upload), _) => Cow::Borrowed(&upload.content),
            (None, Some(original)) => Cow::Owned(journal.store().get(&original.blob_path())?),
            (None, None) => {
                return Err(GalleryError::validation("An original image is required"));
            }
        };

        // Decoding happens before any write so a corrupt original leaves
        // nothing behind. A staged upload that cannot be decoded is the
        // caller's fault; a committed one that cannot is ours.
        let resizer = match ImageResizer::open(&original_bytes) {
            Ok(resizer) => resizer,
            Err(err) if self.staged_original.is_some() => {
                return Err(GalleryError::validation(format!(
                    "The original image could not be read: {}",
                    err
                )));
            }
            Err(err) => return Err(err.into()),
        };

        let original = match (&self.staged_original, current_original) {
            (Some(upload), current) => save_blob(
                conn,
                journal,
                ImageSlot::reuse_or_create(current),
                &upload.content,
                upload.content_type,
            )?,
            (None, Some(current)) => current,
            (None, None) => {
                return Err(GalleryError::validation("An original image is required"));
            }
        };

        let thumbnail = self.regenerate(
            conn,
            journal,
            &resizer,
            Derivative::Thumbnail,
            current_thumbnail,
        )?;
        let large = self.regenerate(conn, journal, &resizer, Derivative::Large, current_large)?;
        drop(resizer);

        let row = GalleryItemRow {
            id: &self.id,
            original_image_id: &original.id,
            thumbnail_image_id: &thumbnail.id,
            large_image_id: &large.id,
            title: &self.details.title,
            artist_name: &self.details.artist_name,
            created_date: self.details.created_date,
            description: &self.details.description,
            media_description: &self.details.media_description,
            size_description: &self.details.size_description,
        };
        if existing.is_some() {
            diesel::update(gallery_item::table.find(&self.id))
                .set(&row)
                .execute(conn)?;
        } else {
            diesel::insert_into(gallery_item::table)
                .values(&row)
                .execute(conn)?;
        }
        replace_item_tags(conn, &self.id, &self.tags)?;

        Ok(SavedImages {
            original,
            thumbnail,
            large,
        })
    }

    fn regenerate(
        &self,
        conn: &SqliteConnection,
        journal: &mut BlobJournal<'_>,
        resizer: &ImageResizer,
        derivative: Derivative,
        current: Option<StoredImage>,
    ) -> Result<StoredImage, GalleryError> {
        let encoded =
            resizer.shrink_to_box(derivative.box_size(), REDUCED_IMAGE_COMPRESSION_QUALITY)?;
        let stored = save_blob(
            conn,
            journal,
            ImageSlot::reuse_or_create(current),
            &encoded.bytes,
            encoded.content_type(),
        )?;
        tracing::debug!(
            item = %self.id,
            ?derivative,
            width = stored.width,
            height = stored.height,
            "Regenerated derivative"
        );
        Ok(stored)
    }

    /// Deletes the item and its three images. Image blobs that cannot be
    /// removed are logged; every record is still deleted.
    pub fn delete(self, conn: &SqliteConnection, blobs: &dyn BlobStore) -> Result<(), GalleryError> {
        delete_gallery_item(conn, blobs, &self.id)
    }

    pub fn to_response(&self, media_url: &str) -> Option<GalleryItemResponse> {
        let (original, thumbnail, large) = (self.original()?, self.thumbnail()?, self.large()?);
        Some(GalleryItemResponse {
            id: self.id.clone(),
            original_image: original.to_response(media_url),
            large_image: large.to_response(media_url),
            thumbnail_image: thumbnail.to_response(media_url),
            title: self.details.title.clone(),
            created_date: self.details.created_date,
            description: self.details.description.clone(),
            media_description: self.details.media_description.clone(),
            size_description: self.details.size_description.clone(),
            artist_name: self.details.artist_name.clone(),
            tags: self
                .tags
                .iter()
                .map(|name| ItemTag { name: name.clone() })
                .collect(),
        })
    }
}

fn find_gallery_item_record(
    conn: &SqliteConnection,
    item_id: &str,
) -> Result<Option<GalleryItemRecord>, GalleryError> {
    use crate::schema::gallery_item::dsl::*;
    let result = gallery_item.filter(id.eq(item_id)).first(conn).optional()?;
    Ok(result)
}

fn assemble_items(
    conn: &SqliteConnection,
    records: Vec<GalleryItemRecord>,
) -> Result<Vec<GalleryItem>, GalleryError> {
    let image_ids: Vec<&str> = records
        .iter()
        .flat_map(|r| {
            [
                r.original_image_id.as_str(),
                r.thumbnail_image_id.as_str(),
                r.large_image_id.as_str(),
            ]
        })
        .collect();
    let mut images: HashMap<String, StoredImage> = find_stored_images(conn, &image_ids)?
        .into_iter()
        .map(|image| (image.id.clone(), image))
        .collect();
    let item_ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    let mut tags = find_tags_for_items(conn, &item_ids)?;

    let items = records
        .into_iter()
        .map(|record| GalleryItem {
            original: images.remove(&record.original_image_id),
            thumbnail: images.remove(&record.thumbnail_image_id),
            large: images.remove(&record.large_image_id),
            tags: tags.remove(&record.id).unwrap_or_default(),
            details: ItemDetails {
                title: record.title,
                artist_name: record.artist_name,
                created_date: record.created_date,
                description: record.description,
                media_description: record.media_description,
                size_description: record.size_description,
            },
            id: record.id,
            staged_original: None,
        })
        .collect();
    Ok(items)
}

pub fn find_gallery_item(
    conn: &SqliteConnection,
    item_id: &str,
) -> Result<Option<GalleryItem>, GalleryError> {
    match find_gallery_item_record(conn, item_id)? {
        Some(record) => Ok(assemble_items(conn, vec![record])?.pop()),
        None => Ok(None),
    }
}

pub fn list_gallery_items(conn: &SqliteConnection) -> Result<Vec<GalleryItem>, GalleryError> {
    use crate::schema::gallery_item::dsl::*;
    let records: Vec<GalleryItemRecord> = gallery_item.order((title.asc(), id.asc())).load(conn)?;
    assemble_items(conn, records)
}

pub fn delete_gallery_item(
    conn: &SqliteConnection,
    blobs: &dyn BlobStore,
    item_id: &str,
) -> Result<(), GalleryError> {
    use crate::schema::{gallery_item, gallery_item_tag};
    conn.immediate_transaction::<_, GalleryError, _>(|| {
        let record = find_gallery_item_record(conn, item_id)?
            .ok_or_else(|| GalleryError::NotFound(format!("Gallery item {}", item_id)))?;
        diesel::delete(gallery_item_tag::table.filter(gallery_item_tag::gallery_item_id.eq(item_id)))
            .execute(conn)?;
        diesel::delete(gallery_item::table.find(item_id)).execute(conn)?;
        let images = find_stored_images(
            conn,
            &[
                record.original_image_id.as_str(),
                record.thumbnail_image_id.as_str(),
                record.large_image_id.as_str(),
            ],
        )?;
        for image in &images {
            delete_stored_image(conn, blobs, image)?;
        }
        tracing::info!(id = item_id, images = images.len(), "Deleted gallery item");
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{png_bytes, test_connection, MemoryBlobStore};

    fn details() -> ItemDetails {
        ItemDetails {
            title: "Harbour at dusk".to_string(),
            artist_name: "A. Painter".to_string(),
            created_date: NaiveDate::from_ymd_opt(2019, 3, 31),
            description: "Oil on canvas".to_string(),
            ..ItemDetails::default()
        }
    }

    fn upload(width: u32, height: u32) -> UploadedImage {
        UploadedImage::from_bytes(png_bytes(width, height), 50 * 1024 * 1024).unwrap()
    }

    fn dims(image: Option<&StoredImage>) -> (i32, i32) {
        let image = image.unwrap();
        (image.width, image.height)
    }

    fn saved_item(conn: &SqliteConnection, store: &MemoryBlobStore) -> GalleryItem {
        let mut item = GalleryItem::new(details());
        item.set_original_image(upload(1200, 600));
        item.persist(conn, store).unwrap();
        item
    }

    #[test]
    fn large_original_gets_both_derivatives() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        let mut item = GalleryItem::new(details());
        item.set_original_image(upload(4000, 2000));
        item.persist(&conn, &store).unwrap();

        let loaded = find_gallery_item(&conn, item.id()).unwrap().unwrap();
        assert_eq!((4000, 2000), dims(loaded.original()));
        assert_eq!((300, 150), dims(loaded.thumbnail()));
        assert_eq!((1000, 500), dims(loaded.large()));
        assert_eq!("image/png", loaded.original().unwrap().content_type);
        assert_eq!("image/jpeg", loaded.thumbnail().unwrap().content_type);
        assert_eq!("image/jpeg", loaded.large().unwrap().content_type);
        assert_eq!(3, store.len());
    }

    #[test]
    fn small_original_is_not_upscaled() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        let mut item = GalleryItem::new(details());
        item.set_original_image(upload(200, 120));
        item.persist(&conn, &store).unwrap();
        assert_eq!((200, 120), dims(item.thumbnail()));
        assert_eq!((200, 120), dims(item.large()));
    }

    #[test]
    fn three_distinct_images_are_owned() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        let item = saved_item(&conn, &store);
        let ids: BTreeSet<&str> = [item.original(), item.thumbnail(), item.large()]
            .iter()
            .map(|image| image.unwrap().id.as_str())
            .collect();
        assert_eq!(3, ids.len());
    }

    #[test]
    fn resaving_keeps_identities_and_regenerates() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        let mut item = saved_item(&conn, &store);
        let original_id = item.original().unwrap().id.clone();
        let thumbnail_id = item.thumbnail().unwrap().id.clone();
        let large_id = item.large().unwrap().id.clone();

        item.details_mut().title = "Harbour at dawn".to_string();
        item.details_mut().created_date = None;
        item.persist(&conn, &store).unwrap();
        assert_eq!(thumbnail_id, item.thumbnail().unwrap().id);

        item.set_original_image(upload(500, 2000));
        item.persist(&conn, &store).unwrap();

        let loaded = find_gallery_item(&conn, item.id()).unwrap().unwrap();
        assert_eq!("Harbour at dawn", loaded.details().title);
        assert_eq!(None, loaded.details().created_date);
        assert_eq!(original_id, loaded.original().unwrap().id);
        assert_eq!(thumbnail_id, loaded.thumbnail().unwrap().id);
        assert_eq!(large_id, loaded.large().unwrap().id);
        assert_eq!((500, 2000), dims(loaded.original()));
        assert_eq!((75, 300), dims(loaded.thumbnail()));
        assert_eq!((250, 1000), dims(loaded.large()));
        assert_eq!(3, store.len());
    }

    #[test]
    fn corrupt_original_leaves_committed_item_untouched() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        let mut item = saved_item(&conn, &store);
        let before = find_gallery_item(&conn, item.id()).unwrap().unwrap();
        let original_blob = store.get(&before.original().unwrap().blob_path()).unwrap();

        let mut truncated = png_bytes(800, 800);
        truncated.truncate(truncated.len() / 2);
        item.set_original_image(UploadedImage::from_bytes(truncated, usize::MAX).unwrap());
        let err = item.persist(&conn, &store).unwrap_err();
        assert!(matches!(err, GalleryError::Validation(_)), "{:?}", err);

        let after = find_gallery_item(&conn, item.id()).unwrap().unwrap();
        assert_eq!(before.original(), after.original());
        assert_eq!(before.thumbnail(), after.thumbnail());
        assert_eq!(before.large(), after.large());
        assert_eq!(
            original_blob,
            store.get(&after.original().unwrap().blob_path()).unwrap()
        );
    }

    #[test]
    fn corrupt_new_upload_is_a_validation_error() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        let mut truncated = png_bytes(800, 800);
        truncated.truncate(truncated.len() / 2);
        let upload = UploadedImage::from_bytes(truncated, usize::MAX).unwrap();

        let mut item = GalleryItem::new(details());
        item.set_original_image(upload);
        let err = item.persist(&conn, &store).unwrap_err();
        assert!(matches!(err, GalleryError::Validation(_)), "{:?}", err);
        assert_eq!(rocket::http::Status::BadRequest, err.status());
        assert!(find_gallery_item(&conn, item.id()).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn committed_original_that_no_longer_decodes_is_a_server_error() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        let mut item = saved_item(&conn, &store);
        let original_path = item.original().unwrap().blob_path();
        store.put(&original_path, b"\x89PNG\r\n\x1a\nbroken", "image/png").unwrap();

        item.details_mut().title = "Retitled".to_string();
        let err = item.persist(&conn, &store).unwrap_err();
        assert!(matches!(err, GalleryError::Image(_)), "{:?}", err);
        assert_eq!(rocket::http::Status::InternalServerError, err.status());
        let loaded = find_gallery_item(&conn, item.id()).unwrap().unwrap();
        assert_eq!("Harbour at dusk", loaded.details().title);
    }

    #[test]
    fn failed_derivative_write_rolls_everything_back() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        // original and thumbnail succeed, the large derivative fails
        store.fail_puts_after(2);
        let mut item = GalleryItem::new(details());
        item.set_original_image(upload(1200, 600));
        assert!(matches!(
            item.persist(&conn, &store),
            Err(GalleryError::Blob(_))
        ));
        assert!(find_gallery_item(&conn, item.id()).unwrap().is_none());
        let stored: i64 = crate::schema::stored_image::table
            .count()
            .get_result(&conn)
            .unwrap();
        assert_eq!(0, stored);
        assert!(store.is_empty());
        assert!(item.original().is_none());
    }

    #[test]
    fn failed_resave_restores_overwritten_blobs() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        let mut item = saved_item(&conn, &store);
        let thumbnail_path = item.thumbnail().unwrap().blob_path();
        let thumbnail_blob = store.get(&thumbnail_path).unwrap();

        store.fail_puts_after(2);
        item.set_original_image(upload(300, 900));
        assert!(item.persist(&conn, &store).is_err());

        assert_eq!(thumbnail_blob, store.get(&thumbnail_path).unwrap());
        let loaded = find_gallery_item(&conn, item.id()).unwrap().unwrap();
        assert_eq!((1200, 600), dims(loaded.original()));
    }

    #[test]
    fn an_original_is_required() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        let mut item = GalleryItem::new(details());
        assert!(matches!(
            item.persist(&conn, &store),
            Err(GalleryError::Validation(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn missing_title_is_rejected() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        let mut item = GalleryItem::new(ItemDetails {
            title: " ".to_string(),
            ..details()
        });
        item.set_original_image(upload(10, 10));
        assert!(matches!(
            item.persist(&conn, &store),
            Err(GalleryError::Validation(_))
        ));
    }

    #[test]
    fn uploads_are_validated() {
        assert!(matches!(
            UploadedImage::from_bytes(Vec::new(), 10),
            Err(GalleryError::Validation(_))
        ));
        assert!(matches!(
            UploadedImage::from_bytes(png_bytes(10, 10), 10),
            Err(GalleryError::Validation(_))
        ));
        assert!(matches!(
            UploadedImage::from_bytes(b"GIF? no".to_vec(), 1000),
            Err(GalleryError::Validation(_))
        ));
        assert_eq!(
            "image/png",
            UploadedImage::from_bytes(png_bytes(10, 10), 100_000)
                .unwrap()
                .content_type()
        );
    }

    #[test]
    fn tags_are_saved_and_replaced() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        let mut item = GalleryItem::new(details());
        item.set_original_image(upload(50, 50));
        item.set_tags(["oil", "landscape"]);
        item.persist(&conn, &store).unwrap();

        item.set_tags(["oil", "coastal"]);
        item.persist(&conn, &store).unwrap();

        let loaded = find_gallery_item(&conn, item.id()).unwrap().unwrap();
        let tags: Vec<&str> = loaded.tags().iter().map(String::as_str).collect();
        assert_eq!(vec!["coastal", "oil"], tags);
        let all: Vec<String> = crate::tag::list_tags(&conn)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(vec!["coastal", "landscape", "oil"], all);
    }

    #[test]
    fn delete_removes_all_three_images_despite_blob_failure() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        let mut item = saved_item(&conn, &store);
        item.set_tags(["oil"]);
        item.persist(&conn, &store).unwrap();
        let paths: Vec<String> = [item.original(), item.thumbnail(), item.large()]
            .iter()
            .map(|image| image.unwrap().blob_path())
            .collect();
        let ids: Vec<String> = [item.original(), item.thumbnail(), item.large()]
            .iter()
            .map(|image| image.unwrap().id.clone())
            .collect();
        store.fail_deletes_of(&paths[1]);

        let item_id = item.id().to_string();
        item.delete(&conn, &store).unwrap();

        assert!(find_gallery_item(&conn, &item_id).unwrap().is_none());
        for id in &ids {
            assert!(find_stored_image(&conn, id).unwrap().is_none());
        }
        assert!(!store.contains(&paths[0]));
        assert!(store.contains(&paths[1]));
        assert!(!store.contains(&paths[2]));
        assert!(crate::tag::find_tag(&conn, "oil").unwrap().is_some());
    }

    #[test]
    fn deleting_unknown_item_is_not_found() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        assert!(matches!(
            delete_gallery_item(&conn, &store, "missing"),
            Err(GalleryError::NotFound(_))
        ));
    }

    #[test]
    fn listing_is_ordered_and_serializable() {
        let conn = test_connection();
        let store = MemoryBlobStore::default();
        for title in ["Zebra", "Apple"] {
            let mut item = GalleryItem::new(ItemDetails {
                title: title.to_string(),
                ..details()
            });
            item.set_original_image(upload(40, 20));
            item.persist(&conn, &store).unwrap();
        }
        let items = list_gallery_items(&conn).unwrap();
        let titles: Vec<&str> = items.iter().map(|i| i.details().title.as_str()).collect();
        assert_eq!(vec!["Apple", "Zebra"], titles);

        let response = items[0].to_response("/media").unwrap();
        assert_eq!(
            format!("/media/gallery_images/{}", items[0].thumbnail().unwrap().id),
            response.thumbnail_image.url
        );
        assert_eq!(40, response.large_image.width);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!("2019-03-31", json["created_date"]);
    }

    #[test]
    fn unsaved_items_have_no_response() {
        let mut item = GalleryItem::new(details());
        item.set_original_image(upload(10, 10));
        assert!(item.to_response("/media").is_none());
    }
}
