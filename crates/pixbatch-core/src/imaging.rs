//! Source loading and result publishing.
//!
//! Sources are decoded and re-encoded as PNG so every editing client sees
//! the same format regardless of the input extension. Results are written
//! to a hidden sibling file and renamed into place, so a half-written file
//! never appears under the final name.

use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use image::ImageFormat;
use tracing::debug;
use uuid::Uuid;

use crate::{EditError, IoStage};

pub const OUTPUT_SUFFIX: &str = "_processed.png";

/// `<output_dir>/<source stem>_processed.png`
pub fn output_path_for(source: &Path, output_dir: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    output_dir.join(format!("{stem}{OUTPUT_SUFFIX}"))
}

/// Reads `source` and returns it re-encoded as PNG.
pub async fn load_as_png(source: &Path) -> Result<Vec<u8>, EditError> {
    let raw = tokio::fs::read(source)
        .await
        .map_err(|e| EditError::io(IoStage::ReadSource, source, e))?;

    let path = source.to_path_buf();
    tokio::task::spawn_blocking(move || {
        encode_png(&raw).map_err(|e| EditError::io(IoStage::EncodeSource, &path, e))
    })
    .await
    .map_err(|e| EditError::io(IoStage::EncodeSource, source, std::io::Error::other(e.to_string())))?
}

fn encode_png(raw: &[u8]) -> std::io::Result<Vec<u8>> {
    let img = image::load_from_memory(raw).map_err(std::io::Error::other)?;

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(std::io::Error::other)?;

    Ok(out.into_inner())
}

/// Writes `bytes` to `dest` through a temporary sibling and a rename. On any
/// failure the temporary file is removed and `dest` is left untouched.
pub async fn publish(dest: &Path, bytes: &[u8]) -> Result<(), EditError> {
    let staging = staging_path(dest);

    if let Err(e) = write_staged(&staging, dest, bytes).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(EditError::io(IoStage::WriteOutput, dest, e));
    }

    debug!(path = %dest.display(), bytes = bytes.len(), "output published");
    Ok(())
}

async fn write_staged(staging: &Path, dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(staging).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(staging, dest).await
}

fn staging_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    dest.with_file_name(format!(".{name}.{}.part", Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_drops_extension() {
        assert_eq!(
            output_path_for(Path::new("/photos/a.jpg"), Path::new("/out")),
            PathBuf::from("/out/a_processed.png")
        );
        assert_eq!(
            output_path_for(Path::new("/photos/archive.tar.webp"), Path::new("/out")),
            PathBuf::from("/out/archive.tar_processed.png")
        );
    }

    #[test]
    fn staging_file_is_hidden_sibling() {
        let staging = staging_path(Path::new("/out/a_processed.png"));
        assert_eq!(staging.parent(), Some(Path::new("/out")));

        let name = staging.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(".a_processed.png."));
        assert!(name.ends_with(".part"));
    }

    #[tokio::test]
    async fn load_reencodes_jpeg_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        image::RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10]))
            .save(&src)
            .unwrap();

        let png = load_as_png(&src).await.unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn load_of_missing_file_is_read_error() {
        let err = load_as_png(Path::new("/definitely/not/here.png"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EditError::Io {
                stage: IoStage::ReadSource,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn load_of_garbage_is_encode_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("broken.png");
        std::fs::write(&src, b"not an image").unwrap();

        let err = load_as_png(&src).await.unwrap_err();
        assert!(matches!(
            err,
            EditError::Io {
                stage: IoStage::EncodeSource,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn publish_writes_exact_bytes_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a_processed.png");

        publish(&dest, b"result").await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"result");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn publish_into_missing_dir_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing").join("a_processed.png");

        let err = publish(&dest, b"result").await.unwrap_err();
        assert!(matches!(
            err,
            EditError::Io {
                stage: IoStage::WriteOutput,
                ..
            }
        ));
        assert!(!dest.exists());
    }
}
