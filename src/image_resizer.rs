use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::{ColorType, DynamicImage, GenericImageView, ImageBuffer, Rgb, RgbImage};
use std::io::Cursor;
use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit};

pub const DERIVATIVE_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Could not decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Could not encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Target size must be positive")]
    InvalidTarget,
}

/// A resized and re-encoded copy of a source image.
#[derive(Debug)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn content_type(&self) -> &'static str {
        DERIVATIVE_CONTENT_TYPE
    }
}

/// Dimensions that fit `(width, height)` inside a `target` square while
/// keeping the aspect ratio. Never larger than the input.
pub fn box_fit_dimensions(width: u32, height: u32, target: u32) -> (u32, u32) {
    let largest = width.max(height);
    if target >= largest {
        return (width, height);
    }
    let scale = target as f64 / largest as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);
    if largest == height {
        (scaled(width), target)
    } else {
        (target, scaled(height))
    }
}

/// Holds one decoded source image, already in a JPEG compatible colour
/// mode, so several derivatives can be produced without decoding or
/// converting again. The pixels are released when the resizer is dropped.
pub struct ImageResizer {
    image: RgbImage,
}

impl ImageResizer {
    pub fn open(content: &[u8]) -> Result<Self, ImageError> {
        let decoded = ImageReader::new(Cursor::new(content))
            .with_guessed_format()
            .map_err(|e| ImageError::Decode(image::ImageError::IoError(e)))?
            .decode()
            .map_err(ImageError::Decode)?;
        let (width, height) = decoded.dimensions();
        tracing::debug!(width, height, color = ?decoded.color(), "Decoded source image");
        Ok(Self {
            image: jpeg_compatible(decoded),
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Shrinks a copy of the source so its largest side is at most `target`
    /// and encodes it as JPEG.
    pub fn shrink_to_box(&self, target: u32, quality: u8) -> Result<EncodedImage, ImageError> {
        if target == 0 {
            return Err(ImageError::InvalidTarget);
        }
        let (width, height) = self.image.dimensions();
        let (new_width, new_height) = box_fit_dimensions(width, height, target);
        let bytes = if (new_width, new_height) == (width, height) {
            encode_jpeg(&self.image, quality)?
        } else {
            let resized =
                image::imageops::resize(&self.image, new_width, new_height, FilterType::CatmullRom);
            encode_jpeg(&resized, quality)?
        };
        tracing::debug!(
            target,
            width = new_width,
            height = new_height,
            bytes = bytes.len(),
            "Encoded derivative"
        );
        Ok(EncodedImage {
            bytes,
            width: new_width,
            height: new_height,
        })
    }
}

/// JPEG has no alpha and no palette. Transparent pixels are flattened onto
/// white, everything else is widened or narrowed to 8 bit RGB.
fn jpeg_compatible(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return match image {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        };
    }
    let rgba = image.to_rgba8();
    ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |channel: u8| ((channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .map_err(ImageError::Encode)?;
    Ok(buffer)
}

/// Reads only the header of `content` to find its pixel dimensions.
pub fn read_dimensions(content: &[u8]) -> Result<(u32, u32), ImageError> {
    ImageReader::new(Cursor::new(content))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(image::ImageError::IoError(e)))?
        .into_dimensions()
        .map_err(ImageError::Decode)
}

/// Bounds how many image pipelines run at once.
pub struct ImageSemaphore {
    semaphore: Semaphore,
}

impl ImageSemaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            semaphore: Semaphore::new(permits.max(1)),
        }
    }

    pub async fn acquire(&self) -> Option<SemaphorePermit<'_>> {
        self.semaphore.acquire().await.ok()
    }
}
