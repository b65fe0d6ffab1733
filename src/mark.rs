use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_polygon_mut;
use imageproc::point::Point as DrawPoint;

use crate::point::{BBox, Point};
use crate::LcdDecoder;

const DIGIT_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);
const SEGMENT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const OFF_COLOR: Rgba<u8> = Rgba([0, 200, 0, 255]);
const DP_COLOR: Rgba<u8> = Rgba([255, 160, 0, 255]);

fn outline(img: &mut RgbaImage, bb: &BBox, color: Rgba<u8>) {
    let poly: Vec<DrawPoint<f32>> = bb
        .corners()
        .iter()
        .map(|p| DrawPoint::new(p.x as f32, p.y as f32))
        .collect();
    // Collapsed boxes would close on their own first point.
    if poly[0] != poly[poly.len() - 1] {
        draw_hollow_polygon_mut(img, &poly, color);
    }
}

fn paint(img: &mut RgbaImage, points: &[Point], color: Rgba<u8>) {
    let (width, height) = img.dimensions();
    for p in points {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
            img.put_pixel(p.x as u32, p.y as u32, color);
        }
    }
}

impl LcdDecoder {
    /// Draws every digit's sample regions onto `img`.
    ///
    /// With `fill` the exact sampled pixels are painted, otherwise the region
    /// boxes are outlined.
    pub fn mark_samples(&self, img: &mut RgbaImage, fill: bool) {
        for digit in &self.digits {
            outline(img, digit.bbox(), DIGIT_COLOR);
            if fill {
                for region in digit.segments() {
                    paint(img, &region.points, SEGMENT_COLOR);
                }
                paint(img, digit.off(), OFF_COLOR);
                if let Some(dp) = digit.decimal_point() {
                    paint(img, &dp.points, DP_COLOR);
                }
            } else {
                for region in digit.segments() {
                    outline(img, &region.bb, SEGMENT_COLOR);
                }
                outline(img, &digit.middle_band(), OFF_COLOR);
                if let Some(dp) = digit.decimal_point() {
                    paint(img, &[dp.point], DP_COLOR);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{DigitConfig, LcdConfig, TemplateConfig};
    use crate::LcdDecoder;
    use image::{Rgba, RgbaImage};

    fn decoder() -> LcdDecoder {
        let conf = LcdConfig {
            templates: vec![TemplateConfig {
                name: "t".to_string(),
                tl: [0, 0],
                tr: [20, 0],
                br: [20, 40],
                bl: [0, 40],
                width: 4,
                dp: None,
            }],
            digits: vec![DigitConfig {
                template: "t".to_string(),
                coord: [5, 5],
            }],
            ..Default::default()
        };
        LcdDecoder::from_config(&conf).unwrap()
    }

    #[test]
    fn fill_paints_sampled_pixels() {
        let decoder = decoder();
        let mut img = RgbaImage::from_pixel(40, 60, Rgba([255, 255, 255, 255]));
        decoder.mark_samples(&mut img, true);
        let digit = &decoder.digits()[0];
        for p in digit.off().iter() {
            assert_eq!(*img.get_pixel(p.x as u32, p.y as u32), super::OFF_COLOR);
        }
        let p = digit.segments()[0].points[0];
        assert_eq!(*img.get_pixel(p.x as u32, p.y as u32), super::SEGMENT_COLOR);
    }

    #[test]
    fn marks_outside_image_are_clipped() {
        let decoder = decoder();
        let mut img = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        decoder.mark_samples(&mut img, true);
        decoder.mark_samples(&mut img, false);
    }
}
