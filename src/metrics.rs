//! Per-page image quality metrics.
//!
//! All three extractors read the same [`GrayImage`] and never mutate it; the
//! convolutions build their own working buffers.
//!
//! Border convention: pixels outside the image are synthesized with
//! [`BorderMode`]. `Replicate` repeats the edge pixel (`aaa|abcd|ddd`),
//! `Reflect101` mirrors without repeating it (`cb|abcd|cb`). The choice changes
//! values near the borders only.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderMode {
    #[default]
    Replicate,
    Reflect101,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaplacianKernel {
    /// `[0 1 0; 1 -4 1; 0 1 0]`
    #[default]
    FourNeighbor,
    /// `[1 1 1; 1 -8 1; 1 1 1]`
    EightNeighbor,
}

impl LaplacianKernel {
    fn taps(self) -> [[i32; 3]; 3] {
        match self {
            LaplacianKernel::FourNeighbor => [[0, 1, 0], [1, -4, 1], [0, 1, 0]],
            LaplacianKernel::EightNeighbor => [[1, 1, 1], [1, -8, 1], [1, 1, 1]],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricOptions {
    pub border: BorderMode,
    pub laplacian: LaplacianKernel,
}

// 5-tap binomial kernel, sums to 16. Separable, so the 2-D weight total is 256.
const GAUSS_TAPS: [u32; 5] = [1, 4, 6, 4, 1];
const GAUSS_SHIFT: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub sharpness: f64,
    pub contrast: f64,
    pub noise: f64,
}

impl QualityMetrics {
    pub fn measure(gray: &GrayImage, opts: &MetricOptions) -> Self {
        Self {
            sharpness: sharpness(gray, opts),
            contrast: contrast(gray),
            noise: noise(gray, opts),
        }
    }
}

/// Population variance of the Laplacian response.
pub fn sharpness(gray: &GrayImage, opts: &MetricOptions) -> f64 {
    population_variance(&laplacian(gray, opts))
}

/// Population standard deviation of the intensities.
pub fn contrast(gray: &GrayImage) -> f64 {
    let n = pixel_count(gray);
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let mean = gray.pixels().map(|p| p.0[0] as f64).sum::<f64>() / n;
    let var = gray
        .pixels()
        .map(|p| {
            let d = p.0[0] as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    var.sqrt()
}

/// Mean absolute difference between the image and its 5x5 Gaussian blur.
pub fn noise(gray: &GrayImage, opts: &MetricOptions) -> f64 {
    let n = pixel_count(gray);
    if n == 0 {
        return 0.0;
    }
    let smoothed = gaussian_blur_5x5(gray, opts.border);
    let total: u64 = gray
        .pixels()
        .zip(smoothed.pixels())
        .map(|(a, b)| (a.0[0] as i32 - b.0[0] as i32).unsigned_abs() as u64)
        .sum();
    total as f64 / n as f64
}

/// Laplacian response in `f64`, one value per pixel.
pub fn laplacian(gray: &GrayImage, opts: &MetricOptions) -> Vec<f64> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let taps = opts.laplacian.taps();
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0i32;
            for (ky, row) in taps.iter().enumerate() {
                let sy = border_index(y as isize + ky as isize - 1, h, opts.border);
                for (kx, &k) in row.iter().enumerate() {
                    if k == 0 {
                        continue;
                    }
                    let sx = border_index(x as isize + kx as isize - 1, w, opts.border);
                    acc += k * at(gray, sx, sy) as i32;
                }
            }
            out.push(acc as f64);
        }
    }
    out
}

/// 5x5 Gaussian blur quantized back to 8-bit, rounding half away from zero
/// (the weighted sums are never negative).
pub fn gaussian_blur_5x5(gray: &GrayImage, border: BorderMode) -> GrayImage {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let mut horizontal = vec![0u32; w * h];
    for y in 0..h {
        for x in 0..w {
            horizontal[y * w + x] = GAUSS_TAPS
                .iter()
                .enumerate()
                .map(|(k, &t)| {
                    let sx = border_index(x as isize + k as isize - 2, w, border);
                    t * at(gray, sx, y) as u32
                })
                .sum();
        }
    }

    let half = 1u32 << (GAUSS_SHIFT - 1);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let (x, y) = (x as usize, y as usize);
        let acc: u32 = GAUSS_TAPS
            .iter()
            .enumerate()
            .map(|(k, &t)| {
                let sy = border_index(y as isize + k as isize - 2, h, border);
                t * horizontal[sy * w + x]
            })
            .sum();
        Luma([((acc + half) >> GAUSS_SHIFT).min(255) as u8])
    })
}

/// Two-pass population variance (divides by N). Empty input yields 0.
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

fn pixel_count(gray: &GrayImage) -> usize {
    gray.width() as usize * gray.height() as usize
}

#[inline]
fn at(gray: &GrayImage, x: usize, y: usize) -> u8 {
    gray.get_pixel(x as u32, y as u32).0[0]
}

fn border_index(i: isize, len: usize, mode: BorderMode) -> usize {
    let last = len as isize - 1;
    if (0..=last).contains(&i) {
        return i as usize;
    }
    match mode {
        BorderMode::Replicate => i.clamp(0, last) as usize,
        BorderMode::Reflect101 => {
            if last == 0 {
                return 0;
            }
            let mut i = i;
            while !(0..=last).contains(&i) {
                i = if i < 0 { -i } else { 2 * last - i };
            }
            i as usize
        }
    }
}
