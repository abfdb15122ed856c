//! Bytes-in image decoding under size, dimension and time limits.

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::config::LimitsConfig;
use crate::error::{PipelineError, PipelineResult};

const MIB: u64 = 1024 * 1024;

/// Decodes fetched source objects, enforcing [`LimitsConfig`].
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// A decoded source image and the format it was stored in.
pub struct DecodedImage {
    pub image: DynamicImage,
    /// Reused when re-encoding
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Size of the encoded source object in bytes
    pub file_size: u64,
}

impl ImageDecoder {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Decode `bytes` fetched from `key`.
    ///
    /// The format is sniffed from the content; the key's extension is only
    /// consulted when sniffing finds nothing. Decoding runs on the blocking
    /// pool under `decode_timeout_ms`.
    pub async fn decode_from_bytes(&self, bytes: Vec<u8>, key: &str) -> PipelineResult<DecodedImage> {
        self.check_file_size(bytes.len() as u64, key)?;

        let budget = Duration::from_millis(self.limits.decode_timeout_ms);
        let owned_key = key.to_string();
        let task = tokio::task::spawn_blocking(move || sniff_and_decode(bytes, &owned_key));

        let decoded = match tokio::time::timeout(budget, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => {
                return Err(PipelineError::Decode {
                    key: key.to_string(),
                    message: format!("decode task failed: {}", join_error),
                })
            }
            Err(_) => {
                return Err(PipelineError::Timeout {
                    key: key.to_string(),
                    stage: "decode".to_string(),
                    timeout_ms: self.limits.decode_timeout_ms,
                })
            }
        };

        self.check_dimensions(&decoded, key)?;
        Ok(decoded)
    }

    fn check_file_size(&self, size: u64, key: &str) -> PipelineResult<()> {
        let max_mb = self.limits.max_file_size_mb;
        if size > max_mb.saturating_mul(MIB) {
            return Err(PipelineError::FileTooLarge {
                key: key.to_string(),
                size_mb: size / MIB,
                max_mb,
            });
        }
        Ok(())
    }

    fn check_dimensions(&self, decoded: &DecodedImage, key: &str) -> PipelineResult<()> {
        let max_dim = self.limits.max_image_dimension;
        if decoded.width > max_dim || decoded.height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                key: key.to_string(),
                width: decoded.width,
                height: decoded.height,
                max_dim,
            });
        }
        Ok(())
    }
}

fn sniff_and_decode(bytes: Vec<u8>, key: &str) -> PipelineResult<DecodedImage> {
    let file_size = bytes.len() as u64;
    let decode_error = |message: String| PipelineError::Decode {
        key: key.to_string(),
        message,
    };

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_error(format!("cannot read image header: {}", e)))?;
    let format = match reader.format() {
        Some(format) => format,
        None => {
            let format = format_from_key(key)?;
            reader.set_format(format);
            format
        }
    };

    let image = reader.decode().map_err(|e| decode_error(e.to_string()))?;
    let (width, height) = image.dimensions();
    Ok(DecodedImage {
        image,
        format,
        width,
        height,
        file_size,
    })
}

fn format_from_key(key: &str) -> PipelineResult<ImageFormat> {
    ImageFormat::from_path(key).map_err(|_| PipelineError::UnsupportedFormat {
        key: key.to_string(),
        format: Path::new(key)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("none")
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_format_detected_by_content() {
        // PNG bytes under a .jpg key are still a PNG
        let bytes = encode(&DynamicImage::new_rgb8(16, 8), ImageFormat::Png);
        let result = sniff_and_decode(bytes, "misnamed.jpg").unwrap();
        assert_eq!(result.format, ImageFormat::Png);
        assert_eq!((result.width, result.height), (16, 8));
        assert!(result.file_size > 0);
    }

    #[tokio::test]
    async fn test_garbage_is_decode_error() {
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let err = decoder
            .decode_from_bytes(b"definitely not an image".to_vec(), "broken.png")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_unknown_content_and_extension_is_unsupported() {
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let err = decoder
            .decode_from_bytes(b"plain text".to_vec(), "notes.qqq")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::UnsupportedFormat { ref format, .. } if format == "qqq"));
    }

    #[tokio::test]
    async fn test_rejects_oversized_dimensions() {
        let limits = LimitsConfig {
            max_image_dimension: 32,
            ..LimitsConfig::default()
        };
        let decoder = ImageDecoder::new(limits);
        let bytes = encode(&DynamicImage::new_rgb8(64, 16), ImageFormat::Png);

        let err = decoder.decode_from_bytes(bytes, "wide.png").await.err().unwrap();
        assert!(matches!(err, PipelineError::ImageTooLarge { width: 64, .. }));
    }

    #[tokio::test]
    async fn test_rejects_oversized_file() {
        let limits = LimitsConfig {
            max_file_size_mb: 1,
            ..LimitsConfig::default()
        };
        let decoder = ImageDecoder::new(limits);

        let err = decoder
            .decode_from_bytes(vec![0u8; 2 * 1024 * 1024], "huge.png")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::FileTooLarge { size_mb: 2, .. }));
    }
}
