use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use burn::prelude::{Backend, Tensor};
use dataset::restore;
use image::{Rgb, RgbImage};
use train::eval::EvalSample;
use train::stats::{DEFAULT_BINS, ScoreRecord};

/// Differences above this are saturated in the clipped heat map.
const DIFF_CLIP: u8 = 32;

/// Maps `t` in `[0, 1]` onto the jet colour map.
fn jet(t: f32) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let channel = |offset: f32| {
        let v = (1.5 - (4.0 * t - offset).abs()).clamp(0.0, 1.0);
        (v * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

fn gray(px: [u8; 3]) -> f32 {
    0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32
}

/// Converts `[C, H, W]` values in model space to RGB pixels in row-major order.
fn to_rgb8(values: &[f32], [channels, height, width]: [usize; 3]) -> Vec<[u8; 3]> {
    let plane = height * width;
    let byte = |v: f32| (restore(v) * 255.0).round() as u8;
    (0..plane)
        .map(|i| {
            if channels >= 3 {
                [byte(values[i]), byte(values[plane + i]), byte(values[2 * plane + i])]
            } else {
                let v = byte(values[i]);
                [v, v, v]
            }
        })
        .collect()
}

/// Gray level of the per-channel absolute difference, optionally clipped,
/// rescaled to the largest value so the heat map uses the full range.
fn diff_heat(source: &[[u8; 3]], output: &[[u8; 3]], clip: Option<u8>) -> Vec<Rgb<u8>> {
    let levels: Vec<f32> = source
        .iter()
        .zip(output)
        .map(|(a, b)| {
            let diff = [0, 1, 2].map(|c| {
                let d = a[c].abs_diff(b[c]);
                clip.map_or(d, |clip| d.min(clip))
            });
            gray(diff)
        })
        .collect();
    let max = levels.iter().copied().fold(0.0, f32::max);
    levels
        .into_iter()
        .map(|l| jet(if max > 0.0 { l / max } else { 0.0 }))
        .collect()
}

/// Lays out `source | output | diff heat map | clipped diff heat map`.
pub fn render_panel(source: &[f32], output: &[f32], shape: [usize; 3]) -> RgbImage {
    let [_, height, width] = shape;
    let source = to_rgb8(source, shape);
    let output = to_rgb8(output, shape);
    let heat = diff_heat(&source, &output, None);
    let clipped = diff_heat(&source, &output, Some(DIFF_CLIP));

    let mut panel = RgbImage::new((4 * width) as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let tiles = [Rgb(source[i]), Rgb(output[i]), heat[i], clipped[i]];
            for (tile, px) in tiles.into_iter().enumerate() {
                panel.put_pixel((tile * width + x) as u32, y as u32, px);
            }
        }
    }
    panel
}

async fn save_group<B: Backend>(
    source: &Tensor<B, 4>,
    output: &Tensor<B, 4>,
    names: &[String],
    dir: &Path,
    limit: usize,
) -> Result<usize> {
    let [n, c, h, w] = source.dims();
    let shape = [c, h, w];
    let source: Vec<f32> = source.clone().into_data_async().await.iter::<f32>().collect();
    let output: Vec<f32> = output.clone().into_data_async().await.iter::<f32>().collect();

    tokio::fs::create_dir_all(dir).await?;
    let count = n.min(limit).min(names.len());
    let len = c * h * w;
    for (i, name) in names.iter().take(count).enumerate() {
        let range = i * len..(i + 1) * len;
        let panel = render_panel(&source[range.clone()], &output[range], shape);
        let stem = Path::new(name)
            .file_stem()
            .map_or_else(|| name.clone(), |s| s.to_string_lossy().into_owned());
        panel.save(dir.join(format!("{stem}.png")))?;
    }
    Ok(count)
}

/// Writes comparison panels of one validation batch to
/// `epoch_dir/lesion_data` and `epoch_dir/normal_data`. With `debug` only the
/// first image of each group is written. Returns the nr. of panels saved.
pub async fn save_eval_panels<B: Backend>(sample: &EvalSample<B>, epoch_dir: &Path, debug: bool) -> Result<usize> {
    let limit = if debug { 1 } else { usize::MAX };
    let lesion = save_group(
        &sample.lesion,
        &sample.lesion_output,
        &sample.lesion_names,
        &epoch_dir.join("lesion_data"),
        limit,
    )
    .await?;
    let normal = save_group(
        &sample.normal,
        &sample.normal_output,
        &sample.normal_names,
        &epoch_dir.join("normal_data"),
        limit,
    )
    .await?;
    Ok(lesion + normal)
}

/// Writes the real/fake critic score histogram as CSV.
pub async fn save_score_distribution(record: &ScoreRecord, path: &Path) -> Result<()> {
    let hist = record.histogram(DEFAULT_BINS);
    let mut csv = String::from("bin_start,bin_end,real,fake\n");
    for (i, (real, fake)) in hist.real.iter().zip(&hist.fake).enumerate() {
        writeln!(csv, "{},{},{real},{fake}", hist.edges[i], hist.edges[i + 1])?;
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    log::info!("Saving score distribution to {path:?}");
    tokio::fs::write(path, csv).await?;
    Ok(())
}
