//! Frame binarization for marker detection.
//!
//! A 3x3 median pass removes single-pixel sensor noise, then an adaptive local-mean
//! threshold turns the frame into a 0/255 image. Without the median pass, isolated hot
//! pixels survive thresholding and show up as spurious edges.
//!
//! All filters replicate edge pixels beyond the frame border.

use crate::frame::GrayImage;

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Side length of the adaptive-threshold neighbourhood. Always odd, always at least 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelSize(u32);

impl KernelSize {
    /// Half the shorter frame side, forced odd.
    pub fn for_frame(width: u32, height: u32) -> Self {
        Self(((width.min(height) / 2) | 1).max(1))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    fn radius(self) -> usize {
        (self.0 / 2) as usize
    }
}

/// Denoise and threshold `src` into `dst`.
///
/// # Panics
///
/// Panics if either buffer does not hold exactly `width * height` bytes.
pub fn binarize(src: &[u8], width: u32, height: u32, dst: &mut [u8]) {
    let mut denoised = vec![0u8; src.len()];
    median_filter_3x3(src, width, height, &mut denoised);
    adaptive_mean_threshold(
        &denoised,
        width,
        height,
        KernelSize::for_frame(width, height),
        0,
        dst,
    );
}

/// Owned-image form of [`binarize`].
pub fn threshold_image(image: &GrayImage) -> GrayImage {
    let mut data = vec![0u8; image.data.len()];
    binarize(&image.data, image.width, image.height, &mut data);
    GrayImage {
        width: image.width,
        height: image.height,
        data,
    }
}

/// 3x3 median (rank) filter.
///
/// # Panics
///
/// Panics if either buffer does not hold exactly `width * height` bytes.
pub fn median_filter_3x3(src: &[u8], width: u32, height: u32, dst: &mut [u8]) {
    let (w, h) = check_geometry(src, width, height, dst);
    if w == 0 || h == 0 {
        return;
    }

    let mut window = [0u8; 9];
    for y in 0..h {
        let rows = [y.saturating_sub(1), y, (y + 1).min(h - 1)];
        for x in 0..w {
            let cols = [x.saturating_sub(1), x, (x + 1).min(w - 1)];
            let mut i = 0;
            for &ry in &rows {
                for &cx in &cols {
                    window[i] = src[ry * w + cx];
                    i += 1;
                }
            }
            window.sort_unstable();
            dst[y * w + x] = window[4];
        }
    }
}

/// Adaptive mean threshold.
///
/// A pixel becomes foreground when it is brighter than the rounded mean of its
/// `kernel x kernel` neighbourhood minus `offset`.
///
/// # Panics
///
/// Panics if either buffer does not hold exactly `width * height` bytes.
pub fn adaptive_mean_threshold(
    src: &[u8],
    width: u32,
    height: u32,
    kernel: KernelSize,
    offset: i32,
    dst: &mut [u8],
) {
    let (w, h) = check_geometry(src, width, height, dst);
    if w == 0 || h == 0 {
        return;
    }

    let r = kernel.radius();
    let area = (kernel.get() as u64) * (kernel.get() as u64);

    // Horizontal window sums, one row at a time.
    let mut row_sums = vec![0u64; w * h];
    let mut prefix = vec![0u64; w + 1];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for (x, &v) in row.iter().enumerate() {
            prefix[x + 1] = prefix[x] + v as u64;
        }
        for x in 0..w {
            row_sums[y * w + x] = replicated_window_sum(&prefix, row[0], row[w - 1], x, r);
        }
    }

    // Vertical window sums over the row sums, one column at a time.
    let mut col_prefix = vec![0u64; h + 1];
    for x in 0..w {
        for y in 0..h {
            col_prefix[y + 1] = col_prefix[y] + row_sums[y * w + x];
        }
        let first = row_sums[x];
        let last = row_sums[(h - 1) * w + x];
        for y in 0..h {
            let sum = replicated_window_sum(&col_prefix, first, last, y, r);
            let mean = ((sum + area / 2) / area) as i32;
            let idx = y * w + x;
            dst[idx] = if src[idx] as i32 > mean - offset {
                FOREGROUND
            } else {
                BACKGROUND
            };
        }
    }
}

/// Sum of `values[i - r ..= i + r]` with out-of-range indices clamped to the ends.
///
/// `prefix` holds prefix sums of `values` (`prefix[0] == 0`); `first`/`last` are the end
/// values repeated past each border.
fn replicated_window_sum<T: Into<u64> + Copy>(
    prefix: &[u64],
    first: T,
    last: T,
    i: usize,
    r: usize,
) -> u64 {
    let n = prefix.len() - 1;
    let lo = i.saturating_sub(r);
    let hi = (i + r).min(n - 1);
    let inner = prefix[hi + 1] - prefix[lo];
    let before = r.saturating_sub(i) as u64;
    let after = (i + r).saturating_sub(n - 1) as u64;
    inner + before * first.into() + after * last.into()
}

fn check_geometry(src: &[u8], width: u32, height: u32, dst: &[u8]) -> (usize, usize) {
    let w = width as usize;
    let h = height as usize;
    assert_eq!(src.len(), w * h, "source buffer must hold width * height bytes");
    assert_eq!(dst.len(), w * h, "destination buffer must hold width * height bytes");
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_mean(src: &[u8], w: usize, h: usize, x: usize, y: usize, r: usize) -> i32 {
        let mut sum = 0u64;
        for dy in -(r as i64)..=(r as i64) {
            for dx in -(r as i64)..=(r as i64) {
                let sx = (x as i64 + dx).clamp(0, w as i64 - 1) as usize;
                let sy = (y as i64 + dy).clamp(0, h as i64 - 1) as usize;
                sum += src[sy * w + sx] as u64;
            }
        }
        let area = ((2 * r + 1) * (2 * r + 1)) as u64;
        ((sum + area / 2) / area) as i32
    }

    #[test]
    fn kernel_size_is_half_the_short_side_forced_odd() {
        assert_eq!(KernelSize::for_frame(640, 480).get(), 241);
        assert_eq!(KernelSize::for_frame(1280, 720).get(), 361);
        assert_eq!(KernelSize::for_frame(8, 12).get(), 5);
        assert_eq!(KernelSize::for_frame(2, 2).get(), 1);
        assert_eq!(KernelSize::for_frame(0, 5).get(), 1);
    }

    #[test]
    fn median_removes_isolated_hot_pixel() {
        let mut src = vec![10u8; 25];
        src[12] = 250;
        let mut dst = vec![0u8; 25];
        median_filter_3x3(&src, 5, 5, &mut dst);
        assert!(dst.iter().all(|&v| v == 10));
    }

    #[test]
    fn median_preserves_straight_edges() {
        // left half dark, right half bright
        let src: Vec<u8> = (0..36).map(|i| if i % 6 < 3 { 0 } else { 200 }).collect();
        let mut dst = vec![0u8; 36];
        median_filter_3x3(&src, 6, 6, &mut dst);
        assert_eq!(dst, src);
    }

    #[test]
    fn adaptive_threshold_matches_naive_mean() {
        let (w, h) = (9usize, 7usize);
        let src: Vec<u8> = (0..w * h).map(|i| ((i * 37 + i / 5) % 251) as u8).collect();
        let kernel = KernelSize::for_frame(w as u32, h as u32);
        let mut dst = vec![0u8; w * h];
        adaptive_mean_threshold(&src, w as u32, h as u32, kernel, 0, &mut dst);
        for y in 0..h {
            for x in 0..w {
                let mean = naive_mean(&src, w, h, x, y, kernel.radius());
                let expected = if src[y * w + x] as i32 > mean { 255 } else { 0 };
                assert_eq!(dst[y * w + x], expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn uniform_frame_is_all_background() {
        let src = vec![128u8; 64];
        let mut dst = vec![1u8; 64];
        binarize(&src, 8, 8, &mut dst);
        assert!(dst.iter().all(|&v| v == BACKGROUND));
    }

    #[test]
    #[should_panic]
    fn mismatched_buffers_panic() {
        let mut dst = vec![0u8; 3];
        binarize(&[0u8; 4], 2, 2, &mut dst);
    }
}
