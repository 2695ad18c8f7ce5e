//! Grayscale filters used to build OCR variants.
//!
//! Filters that imageproc provides (bilateral, median, gaussian blur,
//! histogram equalization, morphology) are called directly; the rest are
//! implemented here on `GrayImage`.

use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::integral_image::{integral_image, sum_image_pixels};

/// Contrast limited adaptive histogram equalization.
///
/// The image is split into `tiles x tiles` regions; each region's histogram
/// is clipped at `clip_limit` times the mean bin height, the excess spread
/// evenly, and pixels mapped by bilinear interpolation between the four
/// nearest tile mappings.
pub fn clahe(image: &GrayImage, clip_limit: f32, tiles: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let tile_w = width.div_ceil(tiles.clamp(1, width));
    let tile_h = height.div_ceil(tiles.clamp(1, height));
    // Every tile covers at least one pixel
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut maps = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[image.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            let area = (x1.saturating_sub(x0) * y1.saturating_sub(y0)).max(1);
            maps[(ty * tiles_x + tx) as usize] = clipped_mapping(&mut hist, area, clip_limit);
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        // Position relative to tile centers
        let gy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let ty0 = gy.floor().clamp(0.0, (tiles_y - 1) as f32) as u32;
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let fy = (gy - ty0 as f32).clamp(0.0, 1.0);

        for x in 0..width {
            let gx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
            let tx0 = gx.floor().clamp(0.0, (tiles_x - 1) as f32) as u32;
            let tx1 = (tx0 + 1).min(tiles_x - 1);
            let fx = (gx - tx0 as f32).clamp(0.0, 1.0);

            let v = image.get_pixel(x, y)[0] as usize;
            let at = |tx: u32, ty: u32| maps[(ty * tiles_x + tx) as usize][v] as f32;

            let top = at(tx0, ty0) * (1.0 - fx) + at(tx1, ty0) * fx;
            let bottom = at(tx0, ty1) * (1.0 - fx) + at(tx1, ty1) * fx;
            let value = top * (1.0 - fy) + bottom * fy;
            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }

    out
}

fn clipped_mapping(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let spread = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += spread + u32::from(i < remainder);
    }

    let mut mapping = [0u8; 256];
    let mut cdf = 0u32;
    for (i, bin) in hist.iter().enumerate() {
        cdf += bin;
        mapping[i] = ((cdf as f32 * 255.0 / area as f32).round()).min(255.0) as u8;
    }
    mapping
}

/// Apply `255 * (v / 255) ^ (1 / gamma)` through a lookup table.
pub fn gamma(image: &GrayImage, gamma: f32) -> GrayImage {
    let inv = 1.0 / gamma;
    let mut lut = [0u8; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        *entry = (255.0 * (i as f32 / 255.0).powf(inv)).round().clamp(0.0, 255.0) as u8;
    }
    map_pixels(image, |v| lut[v as usize])
}

/// Scale and shift every pixel: `v * alpha + beta`, saturating.
pub fn brighten(image: &GrayImage, alpha: f32, beta: f32) -> GrayImage {
    map_pixels(image, |v| (v as f32 * alpha + beta).round().clamp(0.0, 255.0) as u8)
}

/// Sharpen with `1.5 * img - 0.5 * blur(img, sigma)`.
pub fn unsharp(image: &GrayImage, sigma: f32) -> GrayImage {
    let blurred = gaussian_blur_f32(image, sigma);
    let mut out = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let v = 1.5 * pixel[0] as f32 - 0.5 * blurred.get_pixel(x, y)[0] as f32;
        out.put_pixel(x, y, Luma([v.round().clamp(0.0, 255.0) as u8]));
    }
    out
}

/// Binarize against the local mean of a `block_size` window minus `c`.
pub fn adaptive_threshold_mean(image: &GrayImage, block_size: u32, c: i32) -> GrayImage {
    let (width, height) = image.dimensions();
    let integral = integral_image::<_, u64>(image);
    let half = block_size / 2;

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let y0 = y.saturating_sub(half);
        let y1 = (y + half + 1).min(height);
        for x in 0..width {
            let x0 = x.saturating_sub(half);
            let x1 = (x + half + 1).min(width);
            let count = u64::from((x1 - x0) * (y1 - y0));
            let [sum] = sum_image_pixels(&integral, x0, y0, x1 - 1, y1 - 1);
            let mean = (sum / count) as i32;
            out.put_pixel(x, y, binarize(image.get_pixel(x, y)[0], mean - c));
        }
    }
    out
}

/// Binarize against a gaussian-weighted local mean minus `c`.
///
/// The gaussian sigma follows the block size the same way common OCR
/// toolkits derive it: `0.3 * ((block - 1) / 2 - 1) + 0.8`.
pub fn adaptive_threshold_gaussian(image: &GrayImage, block_size: u32, c: i32) -> GrayImage {
    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let local = gaussian_blur_f32(image, sigma.max(0.5));
    let mut out = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let threshold = local.get_pixel(x, y)[0] as i32 - c;
        out.put_pixel(x, y, binarize(pixel[0], threshold));
    }
    out
}

fn binarize(value: u8, threshold: i32) -> Luma<u8> {
    if value as i32 > threshold {
        Luma([255])
    } else {
        Luma([0])
    }
}

/// Mean and standard deviation of pixel intensities.
pub fn intensity_stats(image: &GrayImage) -> (f32, f32) {
    let n = image.pixels().len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = image.pixels().map(|p| p[0] as f64).sum::<f64>() / n as f64;
    let variance = image
        .pixels()
        .map(|p| {
            let d = p[0] as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64;
    (mean as f32, variance.sqrt() as f32)
}

fn map_pixels(image: &GrayImage, f: impl Fn(u8) -> u8) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = f(pixel[0]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| Luma([(x * 255 / width.max(1)) as u8]))
    }

    #[test]
    fn test_threshold_output_is_binary() {
        let img = gradient(40, 20);
        for out in [adaptive_threshold_mean(&img, 15, 8), adaptive_threshold_gaussian(&img, 11, 2)] {
            assert_eq!(out.dimensions(), img.dimensions());
            assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
        }
    }

    #[test]
    fn test_mean_threshold_separates_dark_text() {
        let mut img = GrayImage::from_pixel(21, 21, Luma([200]));
        img.put_pixel(10, 10, Luma([20]));
        let out = adaptive_threshold_mean(&img, 15, 8);
        assert_eq!(out.get_pixel(10, 10)[0], 0);
        assert_eq!(out.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_mean_threshold_window_at_borders() {
        // Uniform page: every clipped window averages to the page value
        let img = GrayImage::from_pixel(9, 5, Luma([120]));
        let out = adaptive_threshold_mean(&img, 7, 1);
        assert!(out.pixels().all(|p| p[0] == 255));

        // Dark column on the right edge against a window of 3
        let img = GrayImage::from_fn(6, 3, |x, _| Luma([if x == 5 { 30 } else { 210 }]));
        let out = adaptive_threshold_mean(&img, 3, 0);
        assert_eq!(out.get_pixel(5, 1)[0], 0);
        assert_eq!(out.get_pixel(4, 1)[0], 255);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_clahe_spreads_low_contrast() {
        let img = GrayImage::from_fn(64, 64, |x, _| Luma([100 + (x % 8) as u8]));
        let out = clahe(&img, 3.0, 8);
        let (_, before) = intensity_stats(&img);
        let (_, after) = intensity_stats(&out);
        assert!(after > before);
    }

    #[test]
    fn test_clahe_tiny_image() {
        let img = GrayImage::from_pixel(3, 2, Luma([50]));
        assert_eq!(clahe(&img, 2.0, 8).dimensions(), (3, 2));
    }

    #[test]
    fn test_gamma_and_brighten() {
        let img = GrayImage::from_pixel(2, 2, Luma([64]));
        assert!(gamma(&img, 1.5).get_pixel(0, 0)[0] > 64);
        assert_eq!(brighten(&img, 1.5, 30.0).get_pixel(0, 0)[0], 126);
        assert_eq!(brighten(&GrayImage::from_pixel(1, 1, Luma([250])), 1.5, 30.0).get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_intensity_stats() {
        let img = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 0 } else { 100 }]));
        assert_eq!(intensity_stats(&img), (50.0, 50.0));
    }
}
