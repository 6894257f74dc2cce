use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

pub const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum PictureError {
    #[error("picture is not valid base64")]
    Base64(#[from] base64::DecodeError),

    #[error("picture could not be decoded: {0}")]
    Image(#[from] image::ImageError),
}

/// Decodes a cropped picture sent as raw base64 or a `data:` URL and
/// re-encodes it as a JPEG at [`JPEG_QUALITY`].
///
/// CPU-bound; callers on the async runtime go through `spawn_blocking`.
pub fn transcode_to_jpeg(encoded: &str) -> Result<Vec<u8>, PictureError> {
    let raw = decode_payload(encoded)?;
    let decoded = image::load_from_memory(&raw)?;
    // JPEG carries no alpha channel.
    let rgb = decoded.to_rgb8();

    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(out.into_inner())
}

fn decode_payload(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact)
}
