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
use std::collections::{BTreeSet, HashMap};

use crate::error::GalleryError;
use crate::models::{GalleryItemTagRelation, ItemTag, NewItemTag};

pub const TAG_NAME_MAX_LENGTH: usize = 32;

pub fn validate_tag_name(name: &str) -> Result<(), GalleryError> {
    let length = name.chars().count();
    if length == 0 || length > TAG_NAME_MAX_LENGTH {
        return Err(GalleryError::validation(format!(
            "Tag names must be between 1 and {} characters",
            TAG_NAME_MAX_LENGTH
        )));
    }
    Ok(())
}

pub fn create_tag(conn: &SqliteConnection, tag_name: &str) -> Result<ItemTag, GalleryError> {
    use crate::schema::item_tag;
    validate_tag_name(tag_name)?;
    if find_tag(conn, tag_name)?.is_some() {
        return Err(GalleryError::validation(format!(
            "Tag \"{}\" already exists",
            tag_name
        )));
    }
    diesel::insert_into(item_tag::table)
        .values(&NewItemTag { name: tag_name })
        .execute(conn)?;
    Ok(ItemTag {
        name: tag_name.to_string(),
    })
}

pub fn find_tag(conn: &SqliteConnection, tag_name: &str) -> Result<Option<ItemTag>, GalleryError> {
    use crate::schema::item_tag::dsl::*;
    let result = item_tag.filter(name.eq(tag_name)).first(conn).optional()?;
    Ok(result)
}

pub fn list_tags(conn: &SqliteConnection) -> Result<Vec<ItemTag>, GalleryError> {
    use crate::schema::item_tag::dsl::*;
    let result = item_tag.order(name.asc()).load(conn)?;
    Ok(result)
}

/// Deletes a tag and detaches it from every gallery item.
pub fn delete_tag(conn: &SqliteConnection, tag_name: &str) -> Result<(), GalleryError> {
    use crate::schema::{gallery_item_tag, item_tag};
    conn.transaction::<_, GalleryError, _>(|| {
        diesel::delete(gallery_item_tag::table.filter(gallery_item_tag::tag_name.eq(tag_name)))
            .execute(conn)?;
        let count = diesel::delete(item_tag::table.find(tag_name)).execute(conn)?;
        if count == 0 {
            return Err(GalleryError::NotFound(format!("Tag \"{}\"", tag_name)));
        }
        tracing::info!(tag = tag_name, "Deleted tag");
        Ok(())
    })
}

pub fn find_tags_for_items(
    conn: &SqliteConnection,
    item_ids: &[&str],
) -> Result<HashMap<String, BTreeSet<String>>, GalleryError> {
    use crate::schema::gallery_item_tag::dsl::*;
    let rows: Vec<(String, String)> = gallery_item_tag
        .filter(gallery_item_id.eq_any(item_ids))
        .select((gallery_item_id, tag_name))
        .load(conn)?;
    let mut result: HashMap<String, BTreeSet<String>> = HashMap::new();
    for (item_id, tag) in rows {
        result.entry(item_id).or_default().insert(tag);
    }
    Ok(result)
}

/// Makes the item's tag set exactly `tags`, creating tags that do not exist.
pub fn replace_item_tags(
    conn: &SqliteConnection,
    item_id: &str,
    tags: &BTreeSet<String>,
) -> Result<(), GalleryError> {
    use crate::schema::{gallery_item_tag, item_tag};
    for tag in tags {
        validate_tag_name(tag)?;
    }
    let new_tags: Vec<NewItemTag> = tags.iter().map(|tag| NewItemTag { name: tag }).collect();
    if !new_tags.is_empty() {
        diesel::insert_or_ignore_into(item_tag::table)
            .values(&new_tags)
            .execute(conn)?;
    }

    let has = find_tags_for_items(conn, &[item_id])?
        .remove(item_id)
        .unwrap_or_default();
    let to_remove: Vec<&String> = has.difference(tags).collect();
    if !to_remove.is_empty() {
        diesel::delete(
            gallery_item_tag::table
                .filter(gallery_item_tag::gallery_item_id.eq(item_id))
                .filter(gallery_item_tag::tag_name.eq_any(to_remove)),
        )
        .execute(conn)?;
    }
    let relations: Vec<GalleryItemTagRelation> = tags
        .difference(&has)
        .map(|tag| GalleryItemTagRelation {
            gallery_item_id: item_id,
            tag_name: tag,
        })
        .collect();
    if !relations.is_empty() {
        diesel::insert_into(gallery_item_tag::table)
            .values(&relations)
            .execute(conn)?;
    }
    Ok(())
}
