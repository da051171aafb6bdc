use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::error::GalleryError;
use crate::models::SocialMediaLinks;

/// The only row the links table may hold.
pub const SOCIAL_LINKS_ID: i32 = 1;
pub const LINK_MAX_LENGTH: usize = 200;

fn normalize_link(field: &str, link: &Option<String>) -> Result<Option<String>, GalleryError> {
    let link = match link.as_deref().map(str::trim) {
        None | Some("") => return Ok(None),
        Some(link) => link,
    };
    let lower = link.to_ascii_lowercase();
    let has_host = ["http://", "https://"]
        .iter()
        .find_map(|scheme| lower.strip_prefix(scheme))
        .map_or(false, |rest| {
            let host = rest.split(&['/', '?', '#'][..]).next().unwrap_or_default();
            !host.is_empty() && !host.contains(char::is_whitespace)
        });
    if !has_host || link.len() > LINK_MAX_LENGTH {
        return Err(GalleryError::validation(format!(
            "{} must be an http or https URL of at most {} characters",
            field, LINK_MAX_LENGTH
        )));
    }
    Ok(Some(link.to_string()))
}

/// `None` until the links have been saved once.
pub fn load_social_links(conn: &SqliteConnection) -> Result<Option<SocialMediaLinks>, GalleryError> {
    use crate::schema::social_media_links::dsl::*;
    let result = social_media_links
        .filter(id.eq(SOCIAL_LINKS_ID))
        .first(conn)
        .optional()?;
    Ok(result)
}

pub fn save_social_links(
    conn: &SqliteConnection,
    links: &SocialMediaLinks,
) -> Result<SocialMediaLinks, GalleryError> {
    use crate::schema::social_media_links;
    let row = SocialMediaLinks {
        id: SOCIAL_LINKS_ID,
        facebook: normalize_link("facebook", &links.facebook)?,
        instagram: normalize_link("instagram", &links.instagram)?,
        linkedin: normalize_link("linkedin", &links.linkedin)?,
    };
    diesel::replace_into(social_media_links::table)
        .values(&row)
        .execute(conn)?;
    tracing::info!("Saved social media links");
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_connection;

    #[test]
    fn links_are_absent_until_saved() {
        let conn = test_connection();
        assert_eq!(None, load_social_links(&conn).unwrap());
    }

    #[test]
    fn saving_twice_keeps_one_row() {
        let conn = test_connection();
        save_social_links(
            &conn,
            &SocialMediaLinks {
                facebook: Some("https://facebook.com/gallery".to_string()),
                ..SocialMediaLinks::default()
            },
        )
        .unwrap();
        save_social_links(
            &conn,
            &SocialMediaLinks {
                id: 7,
                instagram: Some(" https://instagram.com/gallery ".to_string()),
                linkedin: Some(String::new()),
                ..SocialMediaLinks::default()
            },
        )
        .unwrap();

        let links = load_social_links(&conn).unwrap().unwrap();
        assert_eq!(SOCIAL_LINKS_ID, links.id);
        assert_eq!(None, links.facebook);
        assert_eq!(Some("https://instagram.com/gallery".to_string()), links.instagram);
        assert_eq!(None, links.linkedin);
        let rows: i64 = crate::schema::social_media_links::table
            .count()
            .get_result(&conn)
            .unwrap();
        assert_eq!(1, rows);
    }

    #[test]
    fn non_http_links_are_rejected() {
        let conn = test_connection();
        for link in ["javascript:alert(1)", "ftp://example.com", "https://", "instagram.com"] {
            let links = SocialMediaLinks {
                linkedin: Some(link.to_string()),
                ..SocialMediaLinks::default()
            };
            assert!(
                matches!(save_social_links(&conn, &links), Err(GalleryError::Validation(_))),
                "{}",
                link
            );
        }
        assert_eq!(None, load_social_links(&conn).unwrap());
    }

    #[test]
    fn serialization_omits_the_row_id() {
        let links = SocialMediaLinks {
            id: SOCIAL_LINKS_ID,
            facebook: Some("https://facebook.com/gallery".to_string()),
            ..SocialMediaLinks::default()
        };
        let json = serde_json::to_value(&links).unwrap();
        assert!(json.get("id").is_none());
        assert!(json["instagram"].is_null());
    }
}
