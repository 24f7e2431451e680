use image::{codecs::jpeg::JpegEncoder, DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::config::ImageConfig;

/// MIME types accepted for extraction. Close variants (`image/jpg`) are
/// included because browsers and screenshot tools disagree on the canonical
/// spelling.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/webp",
    "image/heic",
    "image/heif",
];

/// PNGs above this size transcode to JPEG; lossless recompression rarely
/// gets a large screenshot under budget.
const PNG_TRANSCODE_THRESHOLD: usize = 500 * 1024;
const JPEG_QUALITY_STEP: u8 = 20;
const JPEG_QUALITY_FLOOR: u8 = 50;

pub fn is_supported_mime(mime: &str) -> bool {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or(mime)
        .trim()
        .to_ascii_lowercase();
    SUPPORTED_MIME_TYPES.contains(&essence.as_str())
}

#[derive(Debug, Clone)]
pub struct ImageOptions {
    pub max_bytes: usize,
    pub max_dimension: u32,
    pub quality: u8,
}

impl From<&ImageConfig> for ImageOptions {
    fn from(config: &ImageConfig) -> Self {
        Self {
            max_bytes: config.max_bytes,
            max_dimension: config.max_dimension,
            quality: config.quality,
        }
    }
}

/// An image buffer conditioned for upload. `width`/`height` are 0 when the
/// buffer could not be decoded (fallback path).
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub width: u32,
    pub height: u32,
}

/// Outcome of [`normalize`]. Normalization is best-effort: a buffer that
/// cannot be processed is passed through untouched with the reason recorded,
/// so callers and tests can observe that fallback occurred.
#[derive(Debug, Clone)]
pub enum Normalization {
    Processed(NormalizedImage),
    Unchanged { image: NormalizedImage, reason: String },
}

impl Normalization {
    pub fn image(&self) -> &NormalizedImage {
        match self {
            Normalization::Processed(image) => image,
            Normalization::Unchanged { image, .. } => image,
        }
    }

    pub fn into_image(self) -> NormalizedImage {
        match self {
            Normalization::Processed(image) => image,
            Normalization::Unchanged { image, .. } => image,
        }
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            Normalization::Processed(_) => None,
            Normalization::Unchanged { reason, .. } => Some(reason),
        }
    }
}

/// Condition an image buffer to fit the configured byte and dimension
/// budgets.
///
/// A buffer already within both budgets is returned as-is. Oversized buffers
/// are resized to fit `max_dimension` on both axes (aspect ratio preserved,
/// never upscaled) and re-encoded per format policy: large PNGs and
/// HEIC/HEIF become JPEG, JPEG/WebP are re-encoded lossily at the target
/// quality. If the first pass still exceeds `max_bytes` and quality is above
/// the floor, one more pass runs at `quality - 20` (floor 50).
///
/// Never fails: any decode/encode error degrades to
/// [`Normalization::Unchanged`] with the original buffer.
pub fn normalize(bytes: &[u8], mime: &str, options: &ImageOptions) -> Normalization {
    match try_normalize(bytes, mime, options) {
        Ok(image) => Normalization::Processed(image),
        Err(reason) => Normalization::Unchanged {
            image: NormalizedImage {
                bytes: bytes.to_vec(),
                mime: mime.to_string(),
                width: 0,
                height: 0,
            },
            reason,
        },
    }
}

fn try_normalize(
    bytes: &[u8],
    mime: &str,
    options: &ImageOptions,
) -> std::result::Result<NormalizedImage, String> {
    let reader = ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| format!("failed to read image: {e}"))?;

    let decoded = reader
        .decode()
        .map_err(|e| format!("failed to decode image: {e}"))?;

    let (width, height) = decoded.dimensions();
    if bytes.len() <= options.max_bytes
        && width <= options.max_dimension
        && height <= options.max_dimension
    {
        return Ok(NormalizedImage {
            bytes: bytes.to_vec(),
            mime: mime.to_string(),
            width,
            height,
        });
    }

    let resized = resize_to_fit(decoded, options.max_dimension);
    let (width, height) = resized.dimensions();

    let format = target_format(mime, bytes.len());
    let (encoded, _quality) = encode_to_budget(&resized, format, options)?;

    Ok(NormalizedImage {
        bytes: encoded,
        mime: format_mime(format).to_string(),
        width,
        height,
    })
}

/// Resize so both axes fit `max_dim`, preserving aspect ratio. Never
/// upscales. Lanczos3 for quality, matching what vision models see best.
fn resize_to_fit(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_dim && height <= max_dim {
        return img;
    }

    let ratio = if width > height {
        max_dim as f32 / width as f32
    } else {
        max_dim as f32 / height as f32
    };

    let new_width = ((width as f32 * ratio) as u32).max(1);
    let new_height = ((height as f32 * ratio) as u32).max(1);

    img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
}

fn target_format(mime: &str, input_len: usize) -> ImageFormat {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or(mime)
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/png" if input_len <= PNG_TRANSCODE_THRESHOLD => ImageFormat::Png,
        // HEIC/HEIF always transcode: vision APIs typically reject them.
        // WebP re-encodes lossily via JPEG since the `image` crate only
        // writes lossless WebP.
        _ => ImageFormat::Jpeg,
    }
}

fn format_mime(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::WebP => "image/webp",
        _ => "image/jpeg",
    }
}

/// Encode at the target quality, and if the result still exceeds the byte
/// budget, make exactly one more lossy pass at reduced quality. Returns the
/// bytes and the quality actually used (the second value lets tests observe
/// the reduced pass).
fn encode_to_budget(
    img: &DynamicImage,
    format: ImageFormat,
    options: &ImageOptions,
) -> std::result::Result<(Vec<u8>, u8), String> {
    let first = encode(img, format, options.quality)?;
    if first.len() <= options.max_bytes || options.quality <= JPEG_QUALITY_FLOOR {
        return Ok((first, options.quality));
    }

    let reduced = options
        .quality
        .saturating_sub(JPEG_QUALITY_STEP)
        .max(JPEG_QUALITY_FLOOR);
    let second = encode(img, ImageFormat::Jpeg, reduced)?;
    Ok((second, reduced))
}

fn encode(
    img: &DynamicImage,
    format: ImageFormat,
    quality: u8,
) -> std::result::Result<Vec<u8>, String> {
    let mut output = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha; flatten to RGB before encoding.
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let mut cursor = std::io::Cursor::new(&mut output);
            let encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
            rgb.write_with_encoder(encoder)
                .map_err(|e| format!("failed to encode JPEG: {e}"))?;
        }
        other => {
            img.write_to(&mut std::io::Cursor::new(&mut output), other)
                .map_err(|e| format!("failed to encode image: {e}"))?;
        }
    }
    Ok(output)
}
