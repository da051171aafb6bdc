use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde::Serialize;
use thiserror::Error;

use crate::blob_store::BlobError;
use crate::image_resizer::ImageError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),

    #[error("Environment variable {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("Upload directory {path} is unusable: {source}")]
    UploadPath {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Could not read the uploaded image: {0}")]
    Upload(#[source] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl GalleryError {
    pub fn validation(message: impl Into<String>) -> Self {
        GalleryError::Validation(message.into())
    }

    pub fn status(&self) -> Status {
        match self {
            GalleryError::Validation(_) => Status::BadRequest,
            GalleryError::NotFound(_) => Status::NotFound,
            _ => Status::InternalServerError,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl<'r> Responder<'r, 'static> for GalleryError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status == Status::InternalServerError {
            tracing::error!(error = %self, "Request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).respond_to(req)
    }
}
