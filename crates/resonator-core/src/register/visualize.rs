use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};

use crate::frame::Frame;
use crate::io::image_io::to_gray_image;

use super::FeatureMatches;

const KEYPOINT_COLOR: Rgb<u8> = Rgb([255, 64, 64]);
const MATCH_COLOR: Rgb<u8> = Rgb([36, 255, 12]);

/// Subject on the left, basis on the right, retained matches joined by lines.
pub fn draw_matches(subject: &Frame, basis: &Frame, matches: &FeatureMatches) -> RgbImage {
    let left = to_gray_image(subject);
    let right = to_gray_image(basis);
    let width = left.width() + right.width();
    let height = left.height().max(right.height());
    let mut canvas = RgbImage::new(width, height);

    for (x, y, p) in left.enumerate_pixels() {
        canvas.put_pixel(x, y, Rgb([p.0[0]; 3]));
    }
    let offset = left.width();
    for (x, y, p) in right.enumerate_pixels() {
        canvas.put_pixel(x + offset, y, Rgb([p.0[0]; 3]));
    }

    for m in &matches.matches {
        let s = &matches.subject.keypoints[m.query];
        let b = &matches.basis.keypoints[m.train];
        let start = (s.x as f32, s.y as f32);
        let end = (b.x as f32 + offset as f32, b.y as f32);
        draw_hollow_circle_mut(&mut canvas, (start.0 as i32, start.1 as i32), 4, KEYPOINT_COLOR);
        draw_hollow_circle_mut(&mut canvas, (end.0 as i32, end.1 as i32), 4, KEYPOINT_COLOR);
        draw_line_segment_mut(&mut canvas, start, end, MATCH_COLOR);
    }

    canvas
}
