#[macro_use]
extern crate rocket;
extern crate gallery_server;

use chrono::NaiveDate;
use gallery_server::models::{
    ContactEnquiryResponse, GalleryItemResponse, ItemTag, SocialMediaLinks,
};
use gallery_server::*;
use rocket::data::{Limits, ToByteUnit};
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::tokio::io::AsyncReadExt;
use rocket::{Build, Rocket, State};
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

type SharedBlobs = Arc<dyn BlobStore>;
type SharedMailer = Arc<dyn Mailer>;

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not open the database: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Could not create the schema: {0}")]
    Schema(#[from] diesel::result::Error),
}

/// Runs database and image work off the async executor.
async fn run_blocking<T, F>(work: F) -> Result<T, GalleryError>
where
    F: FnOnce() -> Result<T, GalleryError> + Send + 'static,
    T: Send + 'static,
{
    rocket::tokio::task::spawn_blocking(work).await?
}

#[derive(FromForm)]
struct GalleryItemForm<'r> {
    original_image: TempFile<'r>,
    title: String,
    artist_name: String,
    created_date: Option<String>,
    description: Option<String>,
    media_description: Option<String>,
    size_description: Option<String>,
    tags: Vec<String>,
}

fn parse_created_date(value: Option<String>) -> Result<Option<NaiveDate>, GalleryError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| GalleryError::validation("created_date must be YYYY-MM-DD")),
    }
}

#[post("/gallery-items", data = "<form>")]
async fn create_gallery_item(
    form: Form<GalleryItemForm<'_>>,
    pool: &State<Pool>,
    blobs: &State<SharedBlobs>,
    images: &State<ImageSemaphore>,
    settings: &State<Settings>,
) -> Result<(Status, Json<GalleryItemResponse>), GalleryError> {
    let form = form.into_inner();
    let max_upload_bytes = settings.max_upload_bytes;
    let upload_length = form.original_image.len();
    if upload_length > max_upload_bytes as u64 {
        return Err(GalleryError::validation(format!(
            "The original image is {} bytes, the limit is {} bytes",
            upload_length, max_upload_bytes
        )));
    }
    let mut content = Vec::with_capacity(upload_length as usize);
    {
        let reader = form
            .original_image
            .open()
            .await
            .map_err(GalleryError::Upload)?;
        rocket::tokio::pin!(reader);
        reader
            .read_to_end(&mut content)
            .await
            .map_err(GalleryError::Upload)?;
    }

    let details = ItemDetails {
        title: form.title,
        artist_name: form.artist_name,
        created_date: parse_created_date(form.created_date)?,
        description: form.description.unwrap_or_default(),
        media_description: form.media_description.unwrap_or_default(),
        size_description: form.size_description.unwrap_or_default(),
    };
    let tags = form.tags;
    let pool = pool.inner().clone();
    let blobs = Arc::clone(blobs.inner());
    let media_url = settings.media_url.clone();

    let _permit = images.acquire().await;
    let response = run_blocking(move || {
        let upload = UploadedImage::from_bytes(content, max_upload_bytes)?;
        let mut item = GalleryItem::new(details);
        item.set_original_image(upload);
        item.set_tags(tags);
        let conn = pool.get()?;
        item.persist(&conn, blobs.as_ref())?;
        item.to_response(&media_url)
            .ok_or_else(|| GalleryError::NotFound(format!("Gallery item {}", item.id())))
    })
    .await?;
    Ok((Status::Created, Json(response)))
}

#[get("/gallery-items")]
async fn list_items(
    pool: &State<Pool>,
    settings: &State<Settings>,
) -> Result<Json<Vec<GalleryItemResponse>>, GalleryError> {
    let pool = pool.inner().clone();
    let media_url = settings.media_url.clone();
    let items = run_blocking(move || {
        let conn = pool.get()?;
        Ok(list_gallery_items(&conn)?
            .iter()
            .filter_map(|item| item.to_response(&media_url))
            .collect())
    })
    .await?;
    Ok(Json(items))
}

#[get("/gallery-items/<id>")]
async fn get_item(
    id: String,
    pool: &State<Pool>,
    settings: &State<Settings>,
) -> Result<Json<GalleryItemResponse>, GalleryError> {
    let pool = pool.inner().clone();
    let media_url = settings.media_url.clone();
    let item = run_blocking(move || {
        let conn = pool.get()?;
        find_gallery_item(&conn, &id)?
            .and_then(|item| item.to_response(&media_url))
            .ok_or_else(|| GalleryError::NotFound(format!("Gallery item {}", id)))
    })
    .await?;
    Ok(Json(item))
}

#[get("/image-tags")]
async fn get_tags(pool: &State<Pool>) -> Result<Json<Vec<ItemTag>>, GalleryError> {
    let pool = pool.inner().clone();
    let tags = run_blocking(move || list_tags(&*pool.get()?)).await?;
    Ok(Json(tags))
}

#[get("/image-tags/<name>")]
async fn get_tag(name: String, pool: &State<Pool>) -> Result<Json<ItemTag>, GalleryError> {
    let pool = pool.inner().clone();
    let tag = run_blocking(move || {
        find_tag(&*pool.get()?, &name)?
            .ok_or_else(|| GalleryError::NotFound(format!("Tag \"{}\"", name)))
    })
    .await?;
    Ok(Json(tag))
}

#[post("/contact", data = "<body>")]
async fn create_contact(
    body: Json<EnquiryRequest>,
    pool: &State<Pool>,
    mailer: &State<SharedMailer>,
) -> Result<(Status, Json<ContactEnquiryResponse>), GalleryError> {
    let request = body.into_inner();
    let pool = pool.inner().clone();
    let mailer = Arc::clone(mailer.inner());
    let enquiry = run_blocking(move || {
        let conn = pool.get()?;
        create_enquiry(&conn, mailer.as_ref(), &request)
    })
    .await?;
    Ok((Status::Created, Json(enquiry.to_response())))
}

#[get("/social-media-links")]
async fn get_social_links(pool: &State<Pool>) -> Result<Json<SocialMediaLinks>, GalleryError> {
    let pool = pool.inner().clone();
    let links = run_blocking(move || {
        load_social_links(&*pool.get()?)?
            .ok_or_else(|| GalleryError::NotFound("Social media links".to_string()))
    })
    .await?;
    Ok(Json(links))
}

#[get("/gallery_images/<id>")]
async fn serve_image(
    id: String,
    pool: &State<Pool>,
    blobs: &State<SharedBlobs>,
) -> Result<ImageContent, GalleryError> {
    let pool = pool.inner().clone();
    let blobs = Arc::clone(blobs.inner());
    run_blocking(move || ImageContent::load(&*pool.get()?, blobs.as_ref(), &id)).await
}

#[get("/robots.txt")]
async fn robots_txt() -> &'static str {
    "User-agent: *\nDisallow: /media/"
}

fn build() -> Result<Rocket<Build>, StartupError> {
    let settings = Settings::from_env()?;
    let pool = connect_pool(&settings.database_url)?;
    run_migrations(&*pool.get()?)?;

    let blobs: SharedBlobs = Arc::new(FileBlobStore::open(&settings.upload_path)?);
    let mailer: SharedMailer = match &settings.mail {
        Some(mail) => Arc::new(SmtpMailer::from_settings(mail)?),
        None => {
            tracing::warn!("EMAIL_HOST is not set, contact notifications are disabled");
            Arc::new(DisabledMailer)
        }
    };
    let images = ImageSemaphore::new(settings.image_workers);

    // Leave room for the text fields next to the original image
    let max_upload_bytes = settings.max_upload_bytes;
    let limits = Limits::default()
        .limit("file", max_upload_bytes.bytes())
        .limit("data-form", (max_upload_bytes + 1024 * 1024).bytes())
        .limit("json", 64.kibibytes());
    let figment = rocket::Config::figment().merge(("limits", limits));

    tracing::info!(
        workers = settings.image_workers,
        max_upload_bytes,
        media_url = %settings.media_url,
        "Gallery server configured"
    );

    Ok(rocket::custom(figment)
        .manage(pool)
        .manage(blobs)
        .manage(mailer)
        .manage(images)
        .manage(settings)
        .mount(
            "/api",
            routes![
                create_gallery_item,
                list_items,
                get_item,
                get_tags,
                get_tag,
                create_contact,
                get_social_links,
            ],
        )
        .mount("/media", routes![serve_image])
        .mount("/", routes![robots_txt])
        .attach(rocket::shield::Shield::new()))
}

#[rocket::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let rocket = match build() {
        Ok(rocket) => rocket,
        Err(err) => {
            tracing::error!(error = %err, "Could not start the gallery server");
            std::process::exit(1);
        }
    };
    if let Err(err) = rocket.launch().await {
        tracing::error!(error = %err, "Gallery server stopped");
        std::process::exit(1);
    }
}
