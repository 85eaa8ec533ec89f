/// Per-pixel importance map from the gradient magnitude of an image.
///
/// `image` is channels-first `[C, H, W]` in any value range. The grayscale
/// gradient magnitude is normalised to `[0, 1]` and mapped to `(1 + g)^power`,
/// so flat regions keep a weight of one and edges are emphasised.
pub fn gradient_weight_map(image: &[f32], channels: usize, height: usize, width: usize, power: i32) -> Vec<f32> {
    let plane = height * width;
    let gray: Vec<f32> = (0..plane)
        .map(|i| (0..channels).map(|c| image[c * plane + i]).sum::<f32>() / channels as f32)
        .collect();

    let at = |y: usize, x: usize| gray[y * width + x];
    let mut magnitude = vec![0.0f32; plane];
    for y in 0..height {
        for x in 0..width {
            let (x0, x1) = (x.saturating_sub(1), (x + 1).min(width - 1));
            let (y0, y1) = (y.saturating_sub(1), (y + 1).min(height - 1));
            let dx = if x1 > x0 { (at(y, x1) - at(y, x0)) / (x1 - x0) as f32 } else { 0.0 };
            let dy = if y1 > y0 { (at(y1, x) - at(y0, x)) / (y1 - y0) as f32 } else { 0.0 };
            magnitude[y * width + x] = dx.hypot(dy);
        }
    }

    let max = magnitude.iter().copied().fold(0.0f32, f32::max);
    magnitude
        .into_iter()
        .map(|m| {
            let g = if max > 0.0 { m / max } else { 0.0 };
            (1.0 + g).powi(power)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::gradient_weight_map;

    #[test]
    fn flat_image_has_unit_weights() {
        let image = vec![0.3; 3 * 4 * 5];
        let weights = gradient_weight_map(&image, 3, 4, 5, 2);
        assert_eq!(weights.len(), 20);
        assert!(weights.iter().all(|&w| (w - 1.0).abs() < 1e-6));
    }

    #[test]
    fn edges_are_emphasised() {
        // Left half dark, right half bright.
        let (h, w) = (4, 6);
        let image: Vec<f32> = (0..h * w).map(|i| if i % w < w / 2 { -1.0 } else { 1.0 }).collect();
        let weights = gradient_weight_map(&image, 1, h, w, 2);

        assert!(weights.iter().all(|&v| v >= 1.0));
        // Strongest response sits on the boundary columns, bounded by 2^power.
        let edge = weights[w / 2];
        let corner = weights[0];
        assert!(edge > corner);
        assert!(edge <= 4.0 + 1e-6);
    }
}
