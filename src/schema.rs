table! {
    stored_image (id) {
        id -> Text,
        width -> Integer,
        height -> Integer,
        content_type -> Text,
        content_hash -> Text,
        length -> BigInt,
        created -> BigInt,
        modified -> BigInt,
    }
}

table! {
    gallery_item (id) {
        id -> Text,
        original_image_id -> Text,
        thumbnail_image_id -> Text,
        large_image_id -> Text,
        title -> Text,
        artist_name -> Text,
        created_date -> Nullable<Date>,
        description -> Text,
        media_description -> Text,
        size_description -> Text,
    }
}

table! {
    item_tag (name) {
        name -> Text,
    }
}

table! {
    gallery_item_tag (gallery_item_id, tag_name) {
        gallery_item_id -> Text,
        tag_name -> Text,
    }
}

table! {
    contact_enquiry (id) {
        id -> Text,
        name -> Text,
        email -> Text,
        subject -> Text,
        body -> Text,
        email_error -> Nullable<Text>,
        created_time -> Timestamp,
    }
}

table! {
    social_media_links (id) {
        id -> Integer,
        facebook -> Nullable<Text>,
        instagram -> Nullable<Text>,
        linkedin -> Nullable<Text>,
    }
}

joinable!(gallery_item_tag -> gallery_item (gallery_item_id));
joinable!(gallery_item_tag -> item_tag (tag_name));

allow_tables_to_appear_in_same_query!(
    stored_image,
    gallery_item,
    item_tag,
    gallery_item_tag,
    contact_enquiry,
    social_media_links,
);
