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

use phf::phf_map;

/// Image formats accepted as originals, keyed by the extensions the image
/// crate reports for a sniffed format.
pub const IMAGE_EXTENSION_CONTENT_TYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "jpg" => "image/jpeg",
    "jpeg" => "image/jpeg",
    "png" => "image/png",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "tif" => "image/tiff",
    "tiff" => "image/tiff",
    "bmp" => "image/bmp",
};

/// Finds the content type of an uploaded image from its leading bytes.
/// The client supplied content type and file name are never consulted.
pub fn sniff_image_content_type(content: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(content).ok()?;
    format
        .extensions_str()
        .iter()
        .find_map(|ext| IMAGE_EXTENSION_CONTENT_TYPES.get(ext))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::png_bytes;

    #[test]
    fn png_is_recognised() {
        assert_eq!(Some("image/png"), sniff_image_content_type(&png_bytes(4, 4)));
    }

    #[test]
    fn jpeg_magic_is_recognised() {
        let header = [0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];
        assert_eq!(Some("image/jpeg"), sniff_image_content_type(&header));
    }

    #[test]
    fn unknown_bytes_are_rejected() {
        assert_eq!(None, sniff_image_content_type(b"<svg></svg>"));
        assert_eq!(None, sniff_image_content_type(b""));
    }
}
