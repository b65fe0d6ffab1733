//! Pixel access and region sampling.
//!
//! This is the only place image data meets template geometry.

use std::ops::Deref;

use image::{DynamicImage, GenericImageView, ImageBuffer, Pixel};

use crate::error::{LcdError, Result};
use crate::point::Point;
use crate::result::Scan;
use crate::template::{Digit, SEGMENTS};

/// Source of pixel intensities. Queries outside `dimensions` are a caller
/// error; the decoder checks every digit against the bounds before sampling.
pub trait PixelSource {
    fn dimensions(&self) -> (u32, u32);

    fn intensity(&self, x: u32, y: u32) -> i32;
}

impl<P, C> PixelSource for ImageBuffer<P, C>
where
    P: Pixel,
    P::Subpixel: Into<i32>,
    C: Deref<Target = [P::Subpixel]>,
{
    fn dimensions(&self) -> (u32, u32) {
        ImageBuffer::dimensions(self)
    }

    fn intensity(&self, x: u32, y: u32) -> i32 {
        self.get_pixel(x, y).to_luma().0[0].into()
    }
}

impl PixelSource for DynamicImage {
    fn dimensions(&self) -> (u32, u32) {
        GenericImageView::dimensions(self)
    }

    fn intensity(&self, x: u32, y: u32) -> i32 {
        GenericImageView::get_pixel(self, x, y).to_luma().0[0].into()
    }
}

/// Mean intensity over `points`, truncated.
pub fn sample_region<S: PixelSource + ?Sized>(img: &S, points: &[Point]) -> Option<i32> {
    if points.is_empty() {
        return None;
    }
    let total: i64 = points
        .iter()
        .map(|p| img.intensity(p.x as u32, p.y as u32) as i64)
        .sum();
    Some((total / points.len() as i64) as i32)
}

pub fn check_bounds<S: PixelSource + ?Sized>(img: &S, digit: &Digit) -> Result<()> {
    let (width, height) = img.dimensions();
    if digit.fits(width, height) {
        Ok(())
    } else {
        Err(LcdError::OutOfBounds {
            digit: digit.index(),
            width,
            height,
        })
    }
}

/// Mean intensity of the digit's background (off) region.
pub fn sample_off<S: PixelSource + ?Sized>(digit: &Digit, img: &S) -> Result<i32> {
    check_bounds(img, digit)?;
    sample_region(img, digit.off()).ok_or_else(|| empty_region(digit, "off"))
}

/// Samples the background, every segment and the decimal point of a digit.
pub fn scan<S: PixelSource + ?Sized>(digit: &Digit, img: &S) -> Result<Scan> {
    let background = sample_off(digit, img)?;
    let mut segments = [0; SEGMENTS];
    for (value, region) in segments.iter_mut().zip(digit.segments()) {
        *value = sample_region(img, &region.points).ok_or_else(|| empty_region(digit, "segment"))?;
    }
    let dp = digit
        .decimal_point()
        .and_then(|dp| sample_region(img, &dp.points));
    Ok(Scan {
        background,
        segments,
        dp,
    })
}

fn empty_region(digit: &Digit, region: &str) -> LcdError {
    LcdError::EmptyRegion {
        template: digit.template().name().to_string(),
        region: region.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::*;
    use crate::point::BBox;

    #[test]
    fn mean_is_truncated() {
        let img = GrayImage::from_fn(4, 1, |x, _| Luma([[10, 11, 11, 11][x as usize]]));
        let points = BBox::new(
            Point::new(0, 0),
            Point::new(4, 0),
            Point::new(4, 1),
            Point::new(0, 1),
        )
        .points();
        assert_eq!(sample_region(&img, &points), Some(10));
        assert_eq!(sample_region(&img, &[]), None);
    }

    #[test]
    fn colour_images_sample_luma() {
        let img = RgbImage::from_pixel(2, 2, Rgb([200, 200, 200]));
        assert_eq!(img.intensity(1, 1), 200);
        let dynamic = DynamicImage::ImageRgb8(img);
        assert_eq!(dynamic.intensity(0, 0), 200);
        assert_eq!(PixelSource::dimensions(&dynamic), (2, 2));
    }
}
