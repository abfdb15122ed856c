//! Resize stage: fetch, decode, resize to a fixed size, re-encode, store.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::{LimitsConfig, PipelineConfig};
use crate::error::{PipelineError, PipelineResult, StageError};
use crate::storage::BlobStore;
use crate::types::{Dimensions, ImageReference, Location, TransformOutcome};

use super::decode::ImageDecoder;

/// Prefix under which resized images are written.
pub const DESTINATION_PREFIX: &str = "resized/";

/// Derive the destination key for a source key.
///
/// Deterministic, so re-running a transform overwrites rather than duplicates.
pub fn destination_key(key: &str) -> String {
    format!("{}{}", DESTINATION_PREFIX, key)
}

/// Produces a fixed-size copy of a source image in the destination container.
pub struct Transformer {
    store: Arc<dyn BlobStore>,
    decoder: ImageDecoder,
    destination_container: String,
}

impl Transformer {
    pub fn new(store: Arc<dyn BlobStore>, pipeline: &PipelineConfig, limits: LimitsConfig) -> Self {
        Self {
            store,
            decoder: ImageDecoder::new(limits),
            destination_container: pipeline.destination_container.clone(),
        }
    }

    /// Where the resized copy of `reference` lands.
    pub fn destination_for(&self, reference: &ImageReference) -> Location {
        Location::new(&self.destination_container, destination_key(reference.key()))
    }

    /// Run the stage. Never fails outright: every error is folded into the
    /// returned outcome so the coordinator can decide what to do with it.
    pub async fn transform(&self, reference: &ImageReference, target: Dimensions) -> TransformOutcome {
        let destination = self.destination_for(reference);
        match self.try_transform(reference, &destination, target).await {
            Ok(()) => TransformOutcome::succeeded(destination),
            Err(e) => {
                let error = StageError::from(e);
                tracing::debug!(
                    identity = %reference.identity(),
                    kind = error.kind(),
                    "Transform failed: {}",
                    error
                );
                TransformOutcome::failed(destination, error)
            }
        }
    }

    async fn try_transform(
        &self,
        reference: &ImageReference,
        destination: &Location,
        target: Dimensions,
    ) -> PipelineResult<()> {
        let start = std::time::Instant::now();

        let bytes = self.store.get(reference.container(), reference.key()).await?;
        tracing::trace!(store = self.store.name(), "  Fetch: {:?}", start.elapsed());

        let decoded = self.decoder.decode_from_bytes(bytes, reference.key()).await?;
        tracing::trace!(
            "  Decode: {:?} ({}x{} {:?}, {} bytes)",
            start.elapsed(),
            decoded.width,
            decoded.height,
            decoded.format,
            decoded.file_size
        );

        // Everything is encoded in memory before the single write below, so
        // a failure here never leaves a partial object behind.
        let encoded = self
            .resize_and_encode(decoded.image, decoded.format, target, reference.key())
            .await?;
        tracing::trace!("  Resize + encode: {:?}", start.elapsed());

        self.store
            .put(&destination.container, &destination.key, encoded)
            .await?;

        tracing::debug!(
            store = self.store.name(),
            "Resized {} -> {} ({}) in {:?}",
            reference.source(),
            destination,
            target,
            start.elapsed()
        );
        Ok(())
    }

    async fn resize_and_encode(
        &self,
        image: DynamicImage,
        format: ImageFormat,
        target: Dimensions,
        key: &str,
    ) -> PipelineResult<Vec<u8>> {
        let timeout_ms = self.decoder.limits().decode_timeout_ms;
        let key_owned = key.to_string();

        let result = timeout(Duration::from_millis(timeout_ms), async {
            tokio::task::spawn_blocking(move || {
                let resized = resize(&image, target);
                encode(&resized, format, &key_owned)
            })
            .await
        })
        .await;

        match result {
            Ok(Ok(encoded)) => encoded,
            Ok(Err(e)) => Err(PipelineError::Encode {
                key: key.to_string(),
                message: format!("Task join error: {}", e),
            }),
            Err(_) => Err(PipelineError::Timeout {
                key: key.to_string(),
                stage: "resize".to_string(),
                timeout_ms,
            }),
        }
    }
}

/// Stretch `image` to exactly `target` with a Lanczos filter.
///
/// Aspect ratio is not preserved and nothing is cropped.
pub fn resize(image: &DynamicImage, target: Dimensions) -> DynamicImage {
    image.resize_exact(target.width, target.height, FilterType::Lanczos3)
}

/// Encode `image` in `format`.
pub fn encode(image: &DynamicImage, format: ImageFormat, key: &str) -> PipelineResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, format)
        .map_err(|e| PipelineError::Encode {
            key: key.to_string(),
            message: e.to_string(),
        })?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;
    use image::GenericImageView;

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        encode(&DynamicImage::new_rgb8(width, height), format, "fixture").unwrap()
    }

    fn transformer(store: Arc<MemoryBlobStore>) -> Transformer {
        Transformer::new(store, &PipelineConfig::default(), LimitsConfig::default())
    }

    #[test]
    fn test_destination_key() {
        assert_eq!(destination_key("photo.png"), "resized/photo.png");
        assert_eq!(destination_key("a/b/c.jpg"), "resized/a/b/c.jpg");
        assert_eq!(destination_key(""), "resized/");
    }

    #[test]
    fn test_resize_ignores_aspect_ratio() {
        let target = Dimensions::new(800, 600);
        for (w, h) in [(640, 360), (300, 900), (10, 10), (800, 600)] {
            let resized = resize(&DynamicImage::new_rgb8(w, h), target);
            assert_eq!(resized.dimensions(), (800, 600), "input {w}x{h}");
        }
    }

    #[tokio::test]
    async fn test_transform_writes_resized_copy_in_same_format() {
        let store = Arc::new(MemoryBlobStore::new());
        store.insert("uploads", "cat.jpg", encoded(256, 256, ImageFormat::Jpeg));
        let transformer = transformer(store.clone());

        let reference = ImageReference::new("uploads", "cat.jpg");
        let outcome = transformer
            .transform(&reference, Dimensions::new(800, 600))
            .await;

        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.destination, Location::new("resized-images", "resized/cat.jpg"));
        assert_eq!(store.put_count(), 1);

        let written = store.object("resized-images", "resized/cat.jpg").unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Jpeg);
        let output = image::load_from_memory(&written).unwrap();
        assert_eq!(output.dimensions(), (800, 600));
    }

    #[tokio::test]
    async fn test_png_stays_png() {
        let store = Arc::new(MemoryBlobStore::new());
        store.insert("uploads", "tall.png", encoded(120, 900, ImageFormat::Png));
        let transformer = transformer(store.clone());

        let outcome = transformer
            .transform(&ImageReference::new("uploads", "tall.png"), Dimensions::new(80, 60))
            .await;

        assert!(outcome.success);
        let written = store.object("resized-images", "resized/tall.png").unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Png);
        assert_eq!(image::load_from_memory(&written).unwrap().dimensions(), (80, 60));
    }

    #[tokio::test]
    async fn test_missing_source_is_transient() {
        let store = Arc::new(MemoryBlobStore::new());
        let transformer = transformer(store.clone());

        let outcome = transformer
            .transform(&ImageReference::new("uploads", "gone.jpg"), Dimensions::default())
            .await;

        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(StageError::TransientIo(_))));
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_source_is_decode_failure_without_write() {
        let store = Arc::new(MemoryBlobStore::new());
        store.insert("uploads", "broken.png", b"\x89PNG but not really".to_vec());
        let transformer = transformer(store.clone());

        let outcome = transformer
            .transform(&ImageReference::new("uploads", "broken.png"), Dimensions::default())
            .await;

        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(StageError::DecodeFailure(_))));
        assert!(outcome.error_detail().unwrap().contains("broken.png"));
        assert_eq!(store.put_count(), 0);
    }
}
