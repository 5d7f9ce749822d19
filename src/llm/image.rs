//! Image generation with the shared rate-limit policy, and decoding of the
//! returned payloads to disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use crate::llm::retry_utils::{retry_rate_limited, RetryConfig};
use crate::llm::{Backend, ImageRequest, LlmError};

#[derive(Debug, Error)]
pub enum ImageWriteError {
    #[error("Image {index} is not valid base64: {source}")]
    Decode {
        index: usize,
        #[source]
        source: base64::DecodeError,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Generate images, retrying rate-limited attempts
pub async fn generate_images(backend: &dyn Backend, request: &ImageRequest) -> Result<Vec<String>, LlmError> {
    generate_images_with_retry(backend, request, &RetryConfig::default()).await
}

pub async fn generate_images_with_retry(
    backend: &dyn Backend,
    request: &ImageRequest,
    retry: &RetryConfig,
) -> Result<Vec<String>, LlmError> {
    bprintln!(info: "Generating {} image(s) at {}", request.count, request.aspect_ratio);
    retry_rate_limited(retry, "predict", move |_| backend.generate_images(request)).await
}

/// Decode base64 JPEG payloads into `dir/image-{n}.jpg`, numbered from 1
pub fn write_images(images: &[String], dir: &Path) -> Result<Vec<PathBuf>, ImageWriteError> {
    fs::create_dir_all(dir).map_err(|source| ImageWriteError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(images.len());
    for (index, payload) in images.iter().enumerate() {
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|source| ImageWriteError::Decode { index: index + 1, source })?;
        let path = dir.join(format!("image-{}.jpg", index + 1));
        fs::write(&path, bytes).map_err(|source| ImageWriteError::Io {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{Failure, MockBackend};
    use crate::llm::AspectRatio;

    #[tokio::test(start_paused = true)]
    async fn test_generate_images_retries_rate_limits() {
        let backend = MockBackend::imaging(vec![Err(Failure::RateLimit), Ok(vec!["AAAA".into(), "BBBB".into()])]);
        let request = ImageRequest::new("a lighthouse", 2, AspectRatio::Landscape).unwrap();
        let images = generate_images(&backend, &request).await.unwrap();
        assert_eq!(images, vec!["AAAA", "BBBB"]);
    }

    #[tokio::test]
    async fn test_generate_images_error_is_returned() {
        let backend = MockBackend::imaging(vec![Err(Failure::Api("invalid prompt".into()))]);
        let request = ImageRequest::new("x", 1, AspectRatio::Square).unwrap();
        assert!(matches!(
            generate_images(&backend, &request).await,
            Err(LlmError::ApiError(_))
        ));
    }

    #[test]
    fn test_write_images() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("target")
            .join("test-scratch")
            .join(format!("images-{}", uuid::Uuid::new_v4()));
        let payload = STANDARD.encode([0xFF_u8, 0xD8, 0xFF]);

        let paths = write_images(&[payload], &dir).unwrap();
        assert_eq!(paths, vec![dir.join("image-1.jpg")]);
        assert_eq!(fs::read(&paths[0]).unwrap(), vec![0xFF, 0xD8, 0xFF]);

        assert!(matches!(
            write_images(&["not base64!".into()], &dir),
            Err(ImageWriteError::Decode { index: 1, .. })
        ));
    }
}
