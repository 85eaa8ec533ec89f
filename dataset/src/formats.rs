use std::path::{Path, PathBuf};

use image::imageops::FilterType;

use crate::config::LoadConfig;
use crate::error::{DatasetError, FormatError, Result};
use crate::filesystem::image_files;
use crate::sample::{LESION_LABEL, NORMAL_LABEL, PairedDataset, Sample, normalize};

pub const LESION_DIR: &str = "lesion";
pub const NORMAL_DIR: &str = "normal";

/// Whether `path` looks like a dataset root with both class folders.
pub fn is_dataset_dir(path: &Path) -> bool {
    path.join(LESION_DIR).is_dir() && path.join(NORMAL_DIR).is_dir()
}

/// Loads `root/lesion/*` and `root/normal/*` into aligned pairs.
pub async fn load_dataset(root: PathBuf, config: &LoadConfig) -> Result<PairedDataset> {
    let size = config.image_size;
    let shape = [3, size as usize, size as usize];

    let lesion = load_folder(&root, LESION_DIR, LESION_LABEL, config).await?;
    let normal = load_folder(&root, NORMAL_DIR, NORMAL_LABEL, config).await?;
    log::info!(
        "Loaded {} lesion and {} normal images at {size}x{size} from {root:?}",
        lesion.len(),
        normal.len()
    );

    PairedDataset::new(lesion, normal, shape)
}

async fn load_folder(root: &Path, folder: &'static str, label: i64, config: &LoadConfig) -> Result<Vec<Sample>> {
    let dir = root.join(folder);
    if !dir.is_dir() {
        return Err(DatasetError::MissingFolder(root.to_path_buf(), folder));
    }

    let mut files = image_files(&dir);
    if let Some(max) = config.max_pairs {
        files.truncate(max);
    }
    if files.is_empty() {
        return Err(DatasetError::Empty(dir));
    }

    let mut samples = Vec::with_capacity(files.len());
    for path in files {
        samples.push(load_sample(&path, label, config).await?);
    }
    Ok(samples)
}

async fn load_sample(path: &Path, label: i64, config: &LoadConfig) -> Result<Sample> {
    let bytes = tokio::fs::read(path).await.map_err(FormatError::from)?;
    let image = image::load_from_memory(&bytes).map_err(FormatError::from)?;
    let size = config.image_size;
    let rgb = image.resize_exact(size, size, FilterType::Triangle).to_rgb32f();

    let (w, h) = (size as usize, size as usize);
    // Interleaved HWC -> planar CHW.
    let mut pixels = vec![0.0f32; 3 * h * w];
    for (i, px) in rgb.pixels().enumerate() {
        for c in 0..3 {
            pixels[c * h * w + i] = normalize(px.0[c]);
        }
    }

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FormatError::InvalidName(path.to_path_buf()))?
        .to_owned();
    Ok(Sample::new(name, pixels, label, [3, h, w], config.power))
}
