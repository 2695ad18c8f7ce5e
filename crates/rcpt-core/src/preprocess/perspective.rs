//! Receipt outline detection and perspective unwarp.

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::geometry::{approximate_polygon_dp, arc_length, convex_hull};
use imageproc::morphology::dilate;
use imageproc::point::Point;
use tracing::debug;

/// Candidate contours examined, largest first.
const MAX_CANDIDATES: usize = 10;

/// Find the four corners of the receipt, ordered top-left, top-right,
/// bottom-right, bottom-left.
///
/// Returns `None` unless some 4-vertex outline covers at least
/// `min_area_ratio` of the image.
pub fn find_receipt_quad(image: &GrayImage, min_area_ratio: f32) -> Option<[(f32, f32); 4]> {
    let (width, height) = image.dimensions();
    let min_area = min_area_ratio * width as f32 * height as f32;

    let edges = canny(image, 50.0, 150.0);
    let edges = dilate(&edges, Norm::LInf, 1);

    let mut outlines: Vec<(f32, Vec<Point<i32>>)> = find_contours::<i32>(&edges)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| (polygon_area(&c.points), c.points))
        .collect();
    outlines.sort_by(|a, b| b.0.total_cmp(&a.0));

    for (area, points) in outlines.into_iter().take(MAX_CANDIDATES) {
        if area < min_area {
            break;
        }
        let hull = convex_hull(points);
        let epsilon = 0.02 * arc_length(&hull, true);
        if epsilon <= 0.0 {
            continue;
        }
        let approx = simplify_closed(&hull, epsilon);
        if approx.len() != 4 {
            continue;
        }
        if polygon_area(&approx) < min_area {
            continue;
        }
        let corners = snap_to_hull(&approx, &hull);
        debug!("Receipt outline found, area {:.0}", area);
        return Some(order_corners(&corners));
    }

    debug!("No receipt outline found");
    None
}

/// Douglas-Peucker over a closed outline, split into two open chains at the
/// vertex furthest from the first one.
fn simplify_closed(outline: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if outline.len() < 3 {
        return outline.to_vec();
    }
    let start = outline[0];
    let far = (1..outline.len())
        .max_by_key(|&i| {
            let (dx, dy) = ((outline[i].x - start.x) as i64, (outline[i].y - start.y) as i64);
            dx * dx + dy * dy
        })
        .unwrap_or(1);

    let mut back = outline[far..].to_vec();
    back.push(start);

    let mut simplified = approximate_polygon_dp(&outline[..=far], epsilon, false);
    simplified.pop();
    simplified.extend(approximate_polygon_dp(&back, epsilon, false));
    simplified.pop();
    simplified
}

/// Move each simplified vertex to the hull point lying furthest out in its
/// direction from the centroid.
///
/// The simplification keeps whichever pixel it splits on, which can sit
/// several pixels along a shallow edge from the actual corner.
fn snap_to_hull(approx: &[Point<i32>], hull: &[Point<i32>]) -> Vec<(f32, f32)> {
    let n = approx.len() as f32;
    let cx = approx.iter().map(|p| p.x as f32).sum::<f32>() / n;
    let cy = approx.iter().map(|p| p.y as f32).sum::<f32>() / n;

    approx
        .iter()
        .map(|v| {
            let (dx, dy) = (v.x as f32 - cx, v.y as f32 - cy);
            let reach = |p: &Point<i32>| (p.x as f32 - cx) * dx + (p.y as f32 - cy) * dy;
            let best = hull
                .iter()
                .max_by(|a, b| reach(*a).total_cmp(&reach(*b)))
                .unwrap_or(v);
            (best.x as f32, best.y as f32)
        })
        .collect()
}

/// Order four points as top-left, top-right, bottom-right, bottom-left.
///
/// Top-left has the smallest `x + y`, bottom-right the largest; top-right
/// has the smallest `y - x`, bottom-left the largest.
pub fn order_corners(points: &[(f32, f32)]) -> [(f32, f32); 4] {
    let sum = |p: &(f32, f32)| p.0 + p.1;
    let diff = |p: &(f32, f32)| p.1 - p.0;

    [
        extreme(points, sum, false),
        extreme(points, diff, false),
        extreme(points, sum, true),
        extreme(points, diff, true),
    ]
}

fn extreme(points: &[(f32, f32)], key: impl Fn(&(f32, f32)) -> f32, largest: bool) -> (f32, f32) {
    let iter = points.iter().copied();
    let pick = if largest {
        iter.max_by(|a, b| key(a).total_cmp(&key(b)))
    } else {
        iter.min_by(|a, b| key(a).total_cmp(&key(b)))
    };
    pick.unwrap_or((0.0, 0.0))
}

/// Warp the quadrilateral onto an upright rectangle.
///
/// The canvas is as wide as the longer of the top and bottom edges and as
/// tall as the longer of the left and right edges.
pub fn unwarp(image: &GrayImage, corners: [(f32, f32); 4]) -> Option<GrayImage> {
    let [tl, tr, br, bl] = corners;
    let width = distance(tl, tr).max(distance(bl, br)).round() as u32;
    let height = distance(tl, bl).max(distance(tr, br)).round() as u32;
    if width < 2 || height < 2 {
        return None;
    }

    let (w, h) = ((width - 1) as f32, (height - 1) as f32);
    let dest = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    let projection = Projection::from_control_points(corners, dest)?;

    let mut out = GrayImage::new(width, height);
    warp_into(image, &projection, Interpolation::Bilinear, Luma([255]), &mut out);
    Some(out)
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Shoelace area of a closed polygon.
fn polygon_area(points: &[Point<i32>]) -> f32 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: i64 = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
        })
        .sum();
    twice.abs() as f32 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_polygon_mut;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_order_corners() {
        let shuffled = [(90.0, 95.0), (10.0, 12.0), (12.0, 88.0), (85.0, 8.0)];
        assert_eq!(
            order_corners(&shuffled),
            [(10.0, 12.0), (85.0, 8.0), (90.0, 95.0), (12.0, 88.0)]
        );
    }

    #[test]
    fn test_polygon_area() {
        let square = [Point::new(0, 0), Point::new(10, 0), Point::new(10, 10), Point::new(0, 10)];
        assert_eq!(polygon_area(&square), 100.0);
    }

    #[test]
    fn test_finds_tilted_page() {
        let mut img = GrayImage::from_pixel(200, 240, Luma([20]));
        let page = [Point::new(40, 30), Point::new(165, 45), Point::new(155, 215), Point::new(30, 200)];
        draw_polygon_mut(&mut img, &page, Luma([230]));

        let corners = find_receipt_quad(&img, 0.1).expect("page outline");
        let expected = [(40.0, 30.0), (165.0, 45.0), (155.0, 215.0), (30.0, 200.0)];
        for (found, want) in corners.iter().zip(expected.iter()) {
            assert!(distance(*found, *want) < 8.0, "{found:?} vs {want:?}");
        }

        let flat = unwarp(&img, corners).unwrap();
        assert!(flat.width() > 100 && flat.height() > 150);
    }

    #[test]
    fn test_simplify_closed_keeps_corners() {
        let outline = [
            Point::new(0, 0),
            Point::new(50, 1),
            Point::new(100, 0),
            Point::new(101, 60),
            Point::new(100, 120),
            Point::new(0, 120),
            Point::new(-1, 60),
        ];
        assert_eq!(
            simplify_closed(&outline, 5.0),
            vec![Point::new(0, 0), Point::new(100, 0), Point::new(100, 120), Point::new(0, 120)]
        );
    }

    #[test]
    fn test_snap_moves_vertex_to_corner() {
        // Vertex picked mid-way along the shallow bottom edge
        let hull = [Point::new(40, 30), Point::new(165, 45), Point::new(155, 215), Point::new(147, 214), Point::new(30, 200)];
        let approx = [Point::new(40, 30), Point::new(165, 45), Point::new(147, 214), Point::new(30, 200)];
        assert_eq!(
            snap_to_hull(&approx, &hull),
            vec![(40.0, 30.0), (165.0, 45.0), (155.0, 215.0), (30.0, 200.0)]
        );
    }

    #[test]
    fn test_blank_image_has_no_outline() {
        let img = GrayImage::from_pixel(120, 120, Luma([255]));
        assert!(find_receipt_quad(&img, 0.1).is_none());
    }

    #[test]
    fn test_degenerate_quad_not_unwarped() {
        let img = GrayImage::from_pixel(10, 10, Luma([255]));
        assert!(unwarp(&img, [(1.0, 1.0); 4]).is_none());
    }
}
