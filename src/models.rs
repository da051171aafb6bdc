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

use super::schema::{
    contact_enquiry, gallery_item, gallery_item_tag, item_tag, social_media_links, stored_image,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A persisted image blob. Width and height are only ever written from
/// the decoded content, see [`crate::stored_image::save_blob`].
#[derive(Queryable, Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub id: String,
    pub width: i32,
    pub height: i32,
    pub content_type: String,
    pub content_hash: String,
    pub length: i64,
    pub created: i64,
    pub modified: i64,
}

#[derive(Insertable)]
#[table_name = "stored_image"]
pub struct NewStoredImage<'a> {
    pub id: &'a str,
    pub width: i32,
    pub height: i32,
    pub content_type: &'a str,
    pub content_hash: &'a str,
    pub length: i64,
    pub created: i64,
    pub modified: i64,
}

#[derive(AsChangeset)]
#[table_name = "stored_image"]
pub struct UpdateStoredImage<'a> {
    pub width: i32,
    pub height: i32,
    pub content_type: &'a str,
    pub content_hash: &'a str,
    pub length: i64,
    pub modified: i64,
}

#[derive(Queryable, Debug, Clone)]
pub struct GalleryItemRecord {
    pub id: String,
    pub original_image_id: String,
    pub thumbnail_image_id: String,
    pub large_image_id: String,
    pub title: String,
    pub artist_name: String,
    pub created_date: Option<NaiveDate>,
    pub description: String,
    pub media_description: String,
    pub size_description: String,
}

#[derive(Insertable, AsChangeset)]
#[table_name = "gallery_item"]
#[changeset_options(treat_none_as_null = "true")]
pub struct GalleryItemRow<'a> {
    pub id: &'a str,
    pub original_image_id: &'a str,
    pub thumbnail_image_id: &'a str,
    pub large_image_id: &'a str,
    pub title: &'a str,
    pub artist_name: &'a str,
    pub created_date: Option<NaiveDate>,
    pub description: &'a str,
    pub media_description: &'a str,
    pub size_description: &'a str,
}

#[derive(Queryable, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemTag {
    pub name: String,
}

#[derive(Insertable)]
#[table_name = "item_tag"]
pub struct NewItemTag<'a> {
    pub name: &'a str,
}

#[derive(Insertable)]
#[table_name = "gallery_item_tag"]
pub struct GalleryItemTagRelation<'a> {
    pub gallery_item_id: &'a str,
    pub tag_name: &'a str,
}

#[derive(Queryable, Debug, Clone, Serialize)]
pub struct ContactEnquiry {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub body: String,
    pub email_error: Option<String>,
    pub created_time: NaiveDateTime,
}

#[derive(Insertable)]
#[table_name = "contact_enquiry"]
pub struct NewContactEnquiry<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
    pub email_error: Option<&'a str>,
    pub created_time: NaiveDateTime,
}

#[derive(Queryable, Insertable, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[table_name = "social_media_links"]
pub struct SocialMediaLinks {
    #[serde(skip)]
    pub id: i32,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct StoredImageResponse {
    pub id: String,
    pub url: String,
    pub width: i32,
    pub height: i32,
}

#[derive(Serialize, Debug)]
pub struct GalleryItemResponse {
    pub id: String,
    pub original_image: StoredImageResponse,
    pub large_image: StoredImageResponse,
    pub thumbnail_image: StoredImageResponse,
    pub title: String,
    pub created_date: Option<NaiveDate>,
    pub description: String,
    pub media_description: String,
    pub size_description: String,
    pub artist_name: String,
    pub tags: Vec<ItemTag>,
}

#[derive(Serialize, Debug)]
pub struct ContactEnquiryResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub body: String,
    pub email_sent_ok: bool,
    pub created_time: NaiveDateTime,
}
