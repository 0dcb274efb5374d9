//! Dataset loading: two directories of index-aligned image files.

use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::compute::{Dataset, DatasetError, PixelBuffer};

/// Dataset loading failures. Directory-level problems are fatal;
/// individual unreadable images are skipped inside `load_dir`.
#[derive(Debug, thiserror::Error)]
pub enum DatasetLoadError {
    #[error("cannot list {dir}: {source}")]
    Dir {
        dir: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Load source and target directories into an index-aligned dataset.
///
/// Files pair up by sorted file name, so the two directories must name
/// corresponding images identically (or at least in the same order).
/// Empty source sets and count mismatches abort the run.
pub fn load_dataset(
    source_dir: impl AsRef<Path>,
    target_dir: impl AsRef<Path>,
) -> Result<Dataset, DatasetLoadError> {
    let sources = load_dir(source_dir.as_ref())?;
    let targets = load_dir(target_dir.as_ref())?;
    Ok(Dataset::new(sources, targets)?)
}

/// Decode every readable image in a directory, sorted by file name.
fn load_dir(dir: &Path) -> Result<Vec<PixelBuffer>, DatasetLoadError> {
    let entries = fs::read_dir(dir).map_err(|source| DatasetLoadError::Dir {
        dir: dir.display().to_string(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut buffers = Vec::with_capacity(paths.len());
    for path in &paths {
        match image::open(path) {
            Ok(img) => buffers.push(buffer_from_image(&img)),
            Err(e) => log::warn!("skipping unreadable image {}: {}", path.display(), e),
        }
    }

    log::info!("loaded {} images from {}", buffers.len(), dir.display());
    Ok(buffers)
}

/// Decode a single image file into a pixel buffer.
pub fn load_image(path: impl AsRef<Path>) -> Result<PixelBuffer, image::ImageError> {
    Ok(buffer_from_image(&image::open(path)?))
}

/// Convert a decoded image to an RGB f32 buffer in the 0..255 range.
pub fn buffer_from_image(img: &DynamicImage) -> PixelBuffer {
    let rgb = img.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let data = rgb.as_raw().iter().map(|&v| v as f32).collect();
    PixelBuffer::from_data(data, width, height, 3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_buffer_from_image_values() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, image::Rgb([255, 0, 128]));
        let buf = buffer_from_image(&DynamicImage::ImageRgb8(img));

        assert_eq!(buf.width, 2);
        assert_eq!(buf.channels, 3);
        assert_eq!(buf.get(0, 0, 0), 255.0);
        assert_eq!(buf.get(0, 0, 1), 0.0);
        assert_eq!(buf.get(0, 0, 2), 128.0);
    }

    #[test]
    fn test_load_dataset_missing_dir_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_dataset(tmp.path().join("nope"), tmp.path().join("also_nope"));
        assert!(matches!(err, Err(DatasetLoadError::Dir { .. })));
    }

    #[test]
    fn test_load_dataset_empty_dirs_fail() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        std::fs::create_dir(&src).unwrap();
        std::fs::create_dir(&dst).unwrap();

        let err = load_dataset(&src, &dst);
        assert!(matches!(
            err,
            Err(DatasetLoadError::Dataset(DatasetError::Empty))
        ));
    }

    #[test]
    fn test_load_dataset_pairs_files() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        std::fs::create_dir(&src).unwrap();
        std::fs::create_dir(&dst).unwrap();

        for dir in [&src, &dst] {
            for name in ["a.png", "b.png"] {
                RgbImage::new(4, 4).save(dir.join(name)).unwrap();
            }
        }

        let dataset = load_dataset(&src, &dst).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.source(0).width, 4);
    }
}
