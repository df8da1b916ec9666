//! In-memory image decoding and PNG encoding
//!
//! Images never touch the filesystem: the source object is decoded from the
//! downloaded buffer and the result is encoded into the upload buffer.

use crate::error::Result;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, ImageReader, Limits, RgbaImage};
use std::io::Cursor;

/// Content type attached to uploaded results
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Decoder/encoder pair with per-function decoding limits
#[derive(Debug, Clone, Default)]
pub struct ImageCodec {
    max_dimension: Option<u32>,
}

impl ImageCodec {
    /// Create a codec rejecting images wider or taller than `max_dimension`
    #[must_use]
    pub fn new(max_dimension: Option<u32>) -> Self {
        Self { max_dimension }
    }

    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = self.max_dimension;
        limits.max_image_height = self.max_dimension;
        limits
    }

    /// Decode encoded bytes into an RGBA8 buffer
    ///
    /// The format is sniffed from content, never from the object key. Sources
    /// without alpha gain an opaque channel; RGBA8 sources keep their alpha.
    ///
    /// # Errors
    /// - Unrecognized or corrupt image data
    /// - Dimensions above the configured limit
    pub fn decode_rgba(&self, bytes: &[u8]) -> Result<RgbaImage> {
        let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        reader.limits(self.limits());

        let format = reader.format();
        let image = reader.decode()?;
        tracing::debug!(
            format = ?format,
            color = ?image.color(),
            width = image.width(),
            height = image.height(),
            "decoded source image"
        );

        Ok(image.into_rgba8())
    }

    /// Encode an RGBA8 buffer as PNG
    ///
    /// # Errors
    /// - Encoder failure
    pub fn encode_png(&self, image: &RgbaImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        PngEncoder::new(&mut buffer).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )?;
        Ok(buffer)
    }

    /// Guess the format of encoded bytes without decoding them
    #[must_use]
    pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }
}
