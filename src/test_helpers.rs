use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use image::codecs::gif::GifEncoder;
use image::{
    ColorType, DynamicImage, ImageBuffer, ImageOutputFormat, LumaA, Rgb, RgbImage, Rgba,
    RgbaImage,
};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Mutex;

use crate::blob_store::{BlobError, BlobStore};
use crate::sqlite::{run_migrations, ConnectionOptions};

pub fn test_connection() -> SqliteConnection {
    let conn = SqliteConnection::establish(":memory:").unwrap();
    ConnectionOptions::default().apply(&conn).unwrap();
    run_migrations(&conn).unwrap();
    conn
}

fn encode_png(image: DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([200, 120, 40]));
    encode_png(DynamicImage::ImageRgb8(image))
}

pub fn rgba_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, _| Rgba([10, 90, 200, (x % 256) as u8]));
    encode_png(DynamicImage::ImageRgba8(image))
}

/// Paletted GIF whose left half uses the transparent palette entry and whose
/// right half is opaque red.
pub fn transparent_gif_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([220, 0, 0, 255])
        }
    });
    let mut bytes = Vec::new();
    GifEncoder::new(&mut bytes)
        .encode(image.as_raw(), width, height, ColorType::Rgba8)
        .unwrap();
    bytes
}

pub fn luma_alpha_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = ImageBuffer::from_fn(width, height, |x, _| {
        LumaA([120u8, if x % 2 == 0 { 0 } else { 255 }])
    });
    encode_png(DynamicImage::ImageLumaA8(image))
}

pub fn luma_alpha16_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = ImageBuffer::from_fn(width, height, |_, y| {
        LumaA([40_000u16, (y as u16).wrapping_mul(997)])
    });
    encode_png(DynamicImage::ImageLumaA16(image))
}

pub fn rgb16_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x as u16).wrapping_mul(331), (y as u16).wrapping_mul(523), 65_535u16])
    });
    encode_png(DynamicImage::ImageRgb16(image))
}

/// Blob store kept in memory, with switches to make writes and deletes fail.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    failing_deletes: Mutex<HashSet<String>>,
    puts_allowed: Mutex<Option<usize>>,
}

impl MemoryBlobStore {
    pub fn contains(&self, path: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fail_deletes_of(&self, path: &str) {
        self.failing_deletes.lock().unwrap().insert(path.to_string());
    }

    /// Lets `count` more puts succeed, then fails every put after them.
    pub fn fail_puts_after(&self, count: usize) {
        *self.puts_allowed.lock().unwrap() = Some(count);
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, path: &str, content: &[u8], _content_type: &str) -> Result<(), BlobError> {
        {
            let mut allowed = self.puts_allowed.lock().unwrap();
            if *allowed == Some(0) {
                // Fails once; later puts such as rollback restores work again
                *allowed = None;
                return Err(BlobError::Unavailable(path.to_string()));
            }
            if let Some(remaining) = allowed.as_mut() {
                *remaining -= 1;
            }
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    fn delete(&self, path: &str) -> Result<(), BlobError> {
        if self.failing_deletes.lock().unwrap().contains(path) {
            return Err(BlobError::Unavailable(path.to_string()));
        }
        self.blobs.lock().unwrap().remove(path);
        Ok(())
    }
}
