//! Site labels and the label image.
//!
//! A label is a site index packed little-endian into an RGB triple:
//! `R = i mod 256`, `G = (i / 256) mod 256`, `B = (i / 65536) mod 256`.
//! The label pass shader performs the same packing from `gl_InstanceID`.

use std::collections::BTreeSet;

use image::RgbImage;

use crate::error::{Result, VoronoiError};

/// Number of distinct labels an RGB8 color can hold.
pub const MAX_LABELS: u32 = 1 << 24;

/// Default "no site resolved here" label (white).
///
/// Chosen as the largest encodable value so it never collides with a site
/// index while the site count stays below [`MAX_LABELS`].
pub const DEFAULT_SENTINEL: u32 = MAX_LABELS - 1;

/// Pack a site index into its RGB triple. Bits above 24 are discarded.
#[must_use]
pub const fn encode_label(index: u32) -> [u8; 3] {
    let [r, g, b, _] = index.to_le_bytes();
    [r, g, b]
}

/// Recover the site index from an RGB triple.
#[must_use]
pub const fn decode_label([r, g, b]: [u8; 3]) -> u32 {
    u32::from_le_bytes([r, g, b, 0])
}

/// Normalized color a label is written as. Exact for 8-bit unorm targets.
#[must_use]
pub fn label_color(index: u32) -> [f32; 3] {
    encode_label(index).map(|c| f32::from(c) / 255.0)
}

/// A `width × height` raster of labels, stored top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelImage {
    width: u32,
    height: u32,
    /// Packed RGB triples, `width * height * 3` bytes.
    texels: Vec<u8>,
}

impl LabelImage {
    /// An image where every pixel holds `label`.
    #[must_use]
    pub fn filled(width: u32, height: u32, label: u32) -> Self {
        let texels = encode_label(label)
            .iter()
            .copied()
            .cycle()
            .take(pixel_count(width, height) * 3)
            .collect();
        Self {
            width,
            height,
            texels,
        }
    }

    /// Wrap packed RGB bytes laid out top row first.
    ///
    /// # Errors
    ///
    /// Returns [`VoronoiError::InvalidConfig`] if the byte count does not
    /// match the dimensions.
    pub fn from_rgb(width: u32, height: u32, texels: Vec<u8>) -> Result<Self> {
        let expected = pixel_count(width, height) * 3;
        if texels.len() != expected {
            return Err(VoronoiError::InvalidConfig(format!(
                "label image of {width}x{height} needs {expected} bytes, got {}",
                texels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    /// Wrap packed RGB bytes laid out bottom row first, as `glReadPixels`
    /// returns them.
    ///
    /// # Errors
    ///
    /// Same as [`from_rgb`](Self::from_rgb).
    pub fn from_bottom_up_rgb(width: u32, height: u32, texels: &[u8]) -> Result<Self> {
        let stride = width as usize * 3;
        let flipped = if stride == 0 {
            Vec::new()
        } else {
            texels.chunks(stride).rev().flatten().copied().collect()
        };
        Self::from_rgb(width, height, flipped)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed RGB bytes, top row first.
    #[must_use]
    pub fn as_rgb(&self) -> &[u8] {
        &self.texels
    }

    /// Label at column `x`, row `y` (row 0 is the top).
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is outside the image.
    #[must_use]
    pub fn label_at(&self, x: u32, y: u32) -> u32 {
        let i = self.offset(x, y);
        decode_label([self.texels[i], self.texels[i + 1], self.texels[i + 2]])
    }

    /// Site index at `(x, y)`, or `None` where the pixel holds `sentinel`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is outside the image.
    #[must_use]
    pub fn site_at(&self, x: u32, y: u32, sentinel: u32) -> Option<u32> {
        Some(self.label_at(x, y)).filter(|&label| label != sentinel)
    }

    pub(crate) fn set_label(&mut self, x: u32, y: u32, label: u32) {
        let i = self.offset(x, y);
        self.texels[i..i + 3].copy_from_slice(&encode_label(label));
    }

    /// All labels in row-major order, top row first.
    pub fn labels(&self) -> impl Iterator<Item = u32> + '_ {
        self.texels
            .chunks_exact(3)
            .map(|c| decode_label([c[0], c[1], c[2]]))
    }

    /// The set of labels that occur anywhere in the image.
    #[must_use]
    pub fn distinct_labels(&self) -> BTreeSet<u32> {
        self.labels().collect()
    }

    /// Copy into an [`RgbImage`] for encoding or display by other tools.
    #[must_use]
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            image::Rgb(encode_label(self.label_at(x, y)))
        })
    }

    /// Read labels back out of an [`RgbImage`].
    #[must_use]
    pub fn from_rgb_image(image: &RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            texels: image.as_raw().clone(),
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} label image",
            self.width,
            self.height
        );
        (y as usize * self.width as usize + x as usize) * 3
    }
}

fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn every_label_round_trips() {
        for i in 0..MAX_LABELS {
            assert_eq!(decode_label(encode_label(i)), i);
        }
    }

    #[test]
    fn encoding_is_little_endian_base_256() {
        assert_eq!(encode_label(0), [0, 0, 0]);
        assert_eq!(encode_label(255), [255, 0, 0]);
        assert_eq!(encode_label(256), [0, 1, 0]);
        assert_eq!(encode_label(65_536), [0, 0, 1]);
        assert_eq!(encode_label(0x12_3456), [0x56, 0x34, 0x12]);
        assert_eq!(encode_label(DEFAULT_SENTINEL), [255, 255, 255]);
    }

    #[test]
    fn classic_yellow_clear_decodes_to_0xffff() {
        assert_eq!(decode_label([255, 255, 0]), 0x00_FFFF);
    }

    #[test]
    fn label_color_is_exact_in_unorm8() {
        let [r, g, b] = label_color(0x01_02FF);
        assert!((r - 1.0).abs() < f32::EPSILON);
        assert!((g * 255.0 - 2.0).abs() < 1e-4);
        assert!((b * 255.0 - 1.0).abs() < 1e-4);
    }

    #[test]
    fn filled_image_holds_one_label() {
        let img = LabelImage::filled(5, 3, 70_000);
        assert_eq!(img.as_rgb().len(), 45);
        assert_eq!(img.distinct_labels(), BTreeSet::from([70_000]));
    }

    #[test]
    fn set_and_read_single_pixel() {
        let mut img = LabelImage::filled(4, 4, DEFAULT_SENTINEL);
        img.set_label(2, 1, 513);
        assert_eq!(img.label_at(2, 1), 513);
        assert_eq!(img.site_at(2, 1, DEFAULT_SENTINEL), Some(513));
        assert_eq!(img.site_at(0, 0, DEFAULT_SENTINEL), None);
    }

    #[test]
    fn bottom_up_rows_are_flipped() {
        // Two rows of width 1: bottom row label 1, top row label 2.
        let gl_rows = [1, 0, 0, 2, 0, 0];
        let img = LabelImage::from_bottom_up_rgb(1, 2, &gl_rows).unwrap();
        assert_eq!(img.label_at(0, 0), 2);
        assert_eq!(img.label_at(0, 1), 1);
    }

    #[test]
    fn mismatched_byte_count_is_rejected() {
        assert!(LabelImage::from_rgb(2, 2, vec![0; 11]).is_err());
        assert!(LabelImage::from_bottom_up_rgb(2, 2, &[0; 13]).is_err());
    }

    #[test]
    fn rgb_image_conversion_preserves_labels() {
        let mut img = LabelImage::filled(3, 2, 9);
        img.set_label(1, 1, 300_000);
        let rgb = img.to_rgb_image();
        assert_eq!(rgb.get_pixel(1, 1).0, encode_label(300_000));
        assert_eq!(LabelImage::from_rgb_image(&rgb), img);
    }

    #[test]
    #[should_panic(expected = "outside 2x2 label image")]
    fn out_of_bounds_lookup_panics() {
        let _ = LabelImage::filled(2, 2, 0).label_at(2, 0);
    }
}
