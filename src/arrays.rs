use crate::cielab::{cielab_to_srgb_pixel, srgb_to_cielab_pixel};
use crate::common::Error;
use aligned_vec::{AVec, ConstAlign};
use rayon::prelude::*;
use std::ops::{Index, IndexMut};

const ALIGN: usize = 64;

/// Row-major 2D grid (labels, distances...).
#[derive(Debug)]
pub struct Array2D<T> {
    pub data: AVec<T, ConstAlign<ALIGN>>,
    pub width: usize,
    pub height: usize,
}

impl<T> Array2D<T> {
    pub fn from_slice(data: &[T], width: usize, height: usize) -> Result<Self, Error>
    where
        T: Clone,
    {
        if data.len() != width * height {
            return Err(Error::DimensionMismatch {
                expected: width * height,
                found: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data: AVec::from_slice(ALIGN, data),
        })
    }

    pub fn from_fill(value: T, width: usize, height: usize) -> Self
    where
        T: Clone + Copy,
    {
        let data: AVec<T, ConstAlign<ALIGN>> =
            AVec::from_iter(ALIGN, (0..width * height).map(|_| value));
        Self {
            width,
            height,
            data,
        }
    }

    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        self.data.fill(value)
    }

    pub fn get_row(&self, row: usize) -> &[T] {
        debug_assert!(row < self.height);
        &self.data[(self.width * row)..(self.width * row + self.width)]
    }

    #[inline(always)]
    pub fn get_index(&self, x: usize, y: usize) -> usize {
        debug_assert!(self.width > x, "x={x} out of bounds {}", self.width);
        debug_assert!(self.height > y, "y={y} out of bounds {}", self.height);
        self.width * y + x
    }

    pub fn get_x_y_index(&self, ind: usize) -> (usize, usize) {
        debug_assert!(ind < self.data.len());
        (ind % self.width, ind / self.width)
    }
}

impl<T> Index<(usize, usize)> for Array2D<T> {
    type Output = T;
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.data[self.get_index(x, y)]
    }
}

impl<T> IndexMut<(usize, usize)> for Array2D<T> {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        let idx = self.get_index(x, y);
        &mut self.data[idx]
    }
}

/// Interleaved 8-bit raster as handed over by an image decoder.
///
/// Single channel rasters are used for connected-component labeling (0 is background),
/// 3-channel packed RGB24 rasters for segmentation and superpixels.
#[derive(Debug)]
pub struct Image {
    pub data: AVec<u8, ConstAlign<ALIGN>>,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl Image {
    pub fn from_slice(
        data: &[u8],
        width: usize,
        height: usize,
        channels: usize,
    ) -> Result<Self, Error> {
        if channels == 0 {
            return Err(Error::InvalidArgument(
                "raster must have at least one channel".to_string(),
            ));
        }
        if data.len() != width * height * channels {
            return Err(Error::DimensionMismatch {
                expected: width * height * channels,
                found: data.len(),
            });
        }
        Ok(Self {
            data: AVec::from_slice(ALIGN, data),
            width,
            height,
            channels,
        })
    }

    pub fn from_fill(value: u8, width: usize, height: usize, channels: usize) -> Self {
        Self {
            data: AVec::from_iter(ALIGN, (0..width * height * channels).map(|_| value)),
            width,
            height,
            channels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Fails with [`Error::PreconditionViolation`] unless the raster has `channels` channels.
    pub fn require_channels(&self, channels: usize) -> Result<(), Error> {
        if self.channels != channels {
            return Err(Error::PreconditionViolation {
                expected: channels,
                found: self.channels,
            });
        }
        Ok(())
    }

    #[inline(always)]
    pub fn get_row(&self, row: usize) -> &[u8] {
        debug_assert!(row < self.height);
        let stride = self.width * self.channels;
        &self.data[stride * row..stride * row + stride]
    }

    #[inline(always)]
    pub fn get_index(&self, x: usize, y: usize) -> usize {
        debug_assert!(self.width > x);
        debug_assert!(self.height > y);
        (self.width * y + x) * self.channels
    }

    #[inline(always)]
    pub fn get_pixel(&self, x: usize, y: usize) -> &[u8] {
        let idx = self.get_index(x, y);
        &self.data[idx..idx + self.channels]
    }

    pub fn get_pixel_mut(&mut self, x: usize, y: usize) -> &mut [u8] {
        let idx = self.get_index(x, y);
        let channels = self.channels;
        &mut self.data[idx..idx + channels]
    }
}

/// Packed Lab image with one padding byte per pixel.
pub struct LABImage {
    pub lab_data: AVec<u8, ConstAlign<ALIGN>>,
    pub width: usize,
    pub height: usize,
}

impl LABImage {
    /// Converts packed RGB24 into packed Lab. Rows are converted in parallel.
    pub fn from_srgb(rgb_image: &[u8], width: usize, height: usize) -> Result<Self, Error> {
        if rgb_image.len() != width * height * 3 {
            return Err(Error::DimensionMismatch {
                expected: width * height * 3,
                found: rgb_image.len(),
            });
        }
        let mut lab_output: AVec<u8, ConstAlign<ALIGN>> =
            AVec::from_iter(ALIGN, (0..width * height * 4).map(|_| 0u8));
        if width > 0 {
            lab_output
                .par_chunks_mut(width * 4)
                .zip(rgb_image.par_chunks(width * 3))
                .for_each(|(row_out, row_in)| {
                    for (out, rgb) in row_out.chunks_exact_mut(4).zip(row_in.chunks_exact(3)) {
                        out[..3].copy_from_slice(&srgb_to_cielab_pixel(rgb));
                    }
                });
        }
        Ok(Self {
            width,
            height,
            lab_data: lab_output,
        })
    }

    /// Converts a 3-channel RGB [`Image`].
    pub fn from_image(image: &Image) -> Result<Self, Error> {
        image.require_channels(3)?;
        Self::from_srgb(&image.data, image.width, image.height)
    }

    /// Converts back to packed RGB24 for display.
    pub fn to_srgb(&self) -> Image {
        let mut rgb = Image::from_fill(0, self.width, self.height, 3);
        if self.width > 0 {
            rgb.data
                .par_chunks_mut(self.width * 3)
                .zip(self.lab_data.par_chunks(self.width * 4))
                .for_each(|(row_out, row_in)| {
                    for (out, lab) in row_out.chunks_exact_mut(3).zip(row_in.chunks_exact(4)) {
                        out.copy_from_slice(&cielab_to_srgb_pixel(&lab[..3]));
                    }
                });
        }
        rgb
    }

    #[inline(always)]
    pub fn get_row(&self, row: usize) -> &[u8] {
        debug_assert!(row < self.height);
        &self.lab_data[(self.width * 4 * row)..(self.width * 4 * row + self.width * 4)]
    }

    #[inline(always)]
    pub fn get_index(&self, x: usize, y: usize) -> usize {
        debug_assert!(self.width > x);
        debug_assert!(self.height > y);
        self.width * y * 4 + x * 4
    }

    #[inline(always)]
    pub fn get_pixel(&self, x: usize, y: usize) -> &[u8] {
        let idx = self.get_index(x, y);
        &self.lab_data[idx..idx + 3]
    }

    pub(crate) fn set_pixel(&mut self, x: usize, y: usize, lab: [u8; 3]) {
        let idx = self.get_index(x, y);
        self.lab_data[idx..idx + 3].copy_from_slice(&lab);
    }
}

#[cfg(test)]
mod tests {
    use super::{Array2D, Image, LABImage};
    use crate::common::Error;

    #[test]
    fn srgb_to_cielab_keeps_padding_zero() {
        let rgb: Vec<u8> = (0..7 * 5 * 3).map(|i| (i * 13 % 256) as u8).collect();
        let conv_img = LABImage::from_srgb(&rgb, 7, 5).unwrap();
        for i in 0..conv_img.lab_data.len() / 4 {
            assert_eq!(conv_img.lab_data[3 + i * 4], 0);
        }
        assert_eq!(conv_img.get_row(0).len(), 7 * 4);
    }

    #[test]
    fn srgb_to_cielab_rejects_wrong_length() {
        let err = LABImage::from_srgb(&[0u8; 10], 2, 2).err();
        assert_eq!(
            err,
            Some(Error::DimensionMismatch {
                expected: 12,
                found: 10
            })
        );
    }

    #[test]
    fn lab_roundtrip_close_to_source() {
        let rgb = [200u8, 120, 90, 60, 140, 70, 128, 128, 128, 90, 100, 160];
        let lab = LABImage::from_srgb(&rgb, 2, 2).unwrap();
        let back = lab.to_srgb();
        for (a, b) in rgb.iter().zip(back.data.iter()) {
            assert!(a.abs_diff(*b) <= 8, "{a} vs {b}");
        }
    }

    #[test]
    fn image_requires_channels() {
        let img = Image::from_fill(0, 3, 3, 3);
        assert_eq!(
            img.require_channels(1),
            Err(Error::PreconditionViolation {
                expected: 1,
                found: 3
            })
        );
        assert!(img.require_channels(3).is_ok());
    }

    #[test]
    fn array2d_index_is_row_major() {
        let mut arr = Array2D::from_fill(0u32, 4, 3);
        arr[(3, 1)] = 9;
        assert_eq!(arr.data[7], 9);
        assert_eq!(arr.get_x_y_index(7), (3, 1));
        assert_eq!(arr.get_row(1), &[0, 0, 0, 9]);
    }
}
