use crate::arrays::{Array2D, Image};
use crate::common::Error;
use multiversion::multiversion;
use rayon::prelude::*;

/// Half size of the 5x5 smoothing kernel.
const KERNEL_RADIUS: usize = 2;

/// `2 * sigma^2` must be a normal positive float.
fn gaussian_kernel(sigma: f32) -> [f32; 2 * KERNEL_RADIUS + 1] {
    let two_sigma_sq = 2.0 * sigma * sigma;
    debug_assert!(two_sigma_sq.is_normal(), "sigma={sigma}");
    let mut kernel: [f32; 2 * KERNEL_RADIUS + 1] = core::array::from_fn(|i| {
        if i == KERNEL_RADIUS {
            return 1.0;
        }
        let d = i as f32 - KERNEL_RADIUS as f32;
        (-(d * d) / two_sigma_sq).exp()
    });
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// Mirrors `i` into `0..n` without repeating the edge pixel (`dcb|abcd|cba`).
#[inline(always)]
fn reflect_101(mut i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}

#[multiversion(targets = "simd")]
fn convolve_row(src: &[[f32; 3]], dst: &mut [[f32; 3]], kernel: &[f32; 2 * KERNEL_RADIUS + 1]) {
    let n = src.len();
    for (x, out) in dst.iter_mut().enumerate() {
        let mut acc = [0f32; 3];
        for (k, weight) in kernel.iter().enumerate() {
            let sx = reflect_101(x as isize + k as isize - KERNEL_RADIUS as isize, n);
            for c in 0..3 {
                acc[c] += weight * src[sx][c];
            }
        }
        *out = acc;
    }
}

/// Smooths a 3-channel image with a 5x5 Gaussian of standard deviation `sigma`.
///
/// The result stays in floating point so edge weights are not quantized. With `sigma == 0`, or a
/// sigma so small that `2 * sigma^2` underflows, the pixels are only converted.
pub fn gaussian_blur(image: &Image, sigma: f32) -> Result<Array2D<[f32; 3]>, Error> {
    image.require_channels(3)?;
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(Error::InvalidArgument(format!(
            "sigma must be finite and non-negative, got {sigma}"
        )));
    }
    let width = image.width;
    let height = image.height;
    let mut source = Array2D::from_fill([0f32; 3], width, height);
    if width == 0 || height == 0 {
        return Ok(source);
    }
    source
        .data
        .par_chunks_mut(width)
        .zip(image.data.par_chunks(width * 3))
        .for_each(|(row_out, row_in)| {
            for (out, px) in row_out.iter_mut().zip(row_in.chunks_exact(3)) {
                *out = [px[0] as f32, px[1] as f32, px[2] as f32];
            }
        });
    if !(2.0 * sigma * sigma).is_normal() {
        return Ok(source);
    }

    let kernel = gaussian_kernel(sigma);
    let mut horizontal = Array2D::from_fill([0f32; 3], width, height);
    horizontal
        .data
        .par_chunks_mut(width)
        .zip(source.data.par_chunks(width))
        .for_each(|(dst, src)| convolve_row(src, dst, &kernel));

    let mut output = Array2D::from_fill([0f32; 3], width, height);
    output
        .data
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, dst)| {
            for (x, out) in dst.iter_mut().enumerate() {
                let mut acc = [0f32; 3];
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = reflect_101(y as isize + k as isize - KERNEL_RADIUS as isize, height);
                    let px = horizontal[(x, sy)];
                    for c in 0..3 {
                        acc[c] += weight * px[c];
                    }
                }
                *out = acc;
            }
        });
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::{gaussian_blur, gaussian_kernel, reflect_101};
    use crate::arrays::Image;
    use crate::common::Error;

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(0.8);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert_eq!(kernel[0], kernel[4]);
        assert_eq!(kernel[1], kernel[3]);
        assert!(kernel[2] > kernel[1]);
    }

    #[test]
    fn reflect_101_borders() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(-2, 2), 0);
        assert_eq!(reflect_101(3, 1), 0);
    }

    #[test]
    fn constant_image_is_unchanged() {
        let image = Image::from_fill(77, 6, 4, 3);
        let blurred = gaussian_blur(&image, 1.5).unwrap();
        for px in blurred.data.iter() {
            for c in px {
                assert!((c - 77.0).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn zero_sigma_only_converts() {
        let image = Image::from_slice(&[1, 2, 3, 4, 5, 6], 2, 1, 3).unwrap();
        let blurred = gaussian_blur(&image, 0.0).unwrap();
        assert_eq!(blurred.data[0], [1.0, 2.0, 3.0]);
        assert_eq!(blurred.data[1], [4.0, 5.0, 6.0]);
    }

    #[test]
    fn vanishing_sigma_only_converts() {
        let image = Image::from_fill(10, 4, 4, 3);
        for sigma in [1e-23, 1e-30, f32::MIN_POSITIVE] {
            let blurred = gaussian_blur(&image, sigma).unwrap();
            assert!(blurred.data.iter().all(|px| *px == [10.0; 3]), "sigma={sigma}");
        }
    }

    #[test]
    fn tiny_sigma_keeps_centre_weight() {
        let kernel = gaussian_kernel(1e-3);
        assert_eq!(kernel, [0.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn negative_sigma_is_rejected() {
        let image = Image::from_fill(10, 4, 4, 3);
        assert!(matches!(
            gaussian_blur(&image, -1.0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn blur_spreads_a_spike() {
        let mut image = Image::from_fill(0, 5, 5, 3);
        image.get_pixel_mut(2, 2).copy_from_slice(&[100, 100, 100]);
        let blurred = gaussian_blur(&image, 1.0).unwrap();
        assert!(blurred[(2, 2)][0] < 100.0);
        assert!(blurred[(1, 2)][0] > 0.0);
        assert!(blurred[(2, 2)][0] > blurred[(1, 2)][0]);
    }
}
