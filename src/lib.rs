#[macro_use]
extern crate diesel;
extern crate dotenv;

pub mod blob_store;
pub mod contact;
pub mod content_type;
pub mod error;
pub mod gallery_item;
pub mod image_content;
pub mod image_resizer;
pub mod models;
pub mod schema;
pub mod settings;
pub mod social_links;
pub mod sqlite;
pub mod stored_image;
pub mod tag;

#[cfg(test)]
mod test_helpers;

pub use blob_store::{BlobStore, FileBlobStore};
pub use contact::{create_enquiry, list_enquiries, DisabledMailer, EnquiryRequest, Mailer, SmtpMailer};
pub use error::{ConfigError, GalleryError};
pub use gallery_item::{
    delete_gallery_item, find_gallery_item, list_gallery_items, GalleryItem, ItemDetails,
    UploadedImage,
};
pub use image_content::ImageContent;
pub use image_resizer::ImageSemaphore;
pub use settings::Settings;
pub use social_links::{load_social_links, save_social_links};
pub use sqlite::{connect_pool, run_migrations, Pool};
pub use tag::{create_tag, delete_tag, find_tag, list_tags};
