//! Ultimate-erosion scoring and local-maxima extraction.

use common::{BitBuffer2, Buffer2};

use super::candidate::Candidate;
use super::distance_map::DistanceMap;

/// Per-pixel distance to the nearest background pixel.
#[derive(Debug, Clone)]
pub struct ErosionDepth {
    pub depth: Buffer2<f64>,
    /// Foreground pixels with no background within the search radius. They
    /// are scored 0.
    pub unresolved: usize,
}

/// Scores every foreground pixel with the distance of the first
/// [`DistanceMap`] offset landing on background or outside the frame.
/// Background pixels score 0.
pub fn erosion_depth(foreground: &BitBuffer2, map: &DistanceMap) -> ErosionDepth {
    let mut unresolved = 0;
    let depth = Buffer2::from_fn(foreground.width(), foreground.height(), |x, y| {
        if !foreground.get(x, y) {
            return 0.0;
        }
        let hit = map.offsets().iter().find(|o| {
            // get_signed reads outside pixels as background
            !foreground.get_signed(x as isize + o.dx, y as isize + o.dy)
        });
        match hit {
            Some(o) => o.distance,
            None => {
                unresolved += 1;
                0.0
            }
        }
    });
    ErosionDepth { depth, unresolved }
}

/// Pixels with non-zero depth that equal the maximum of their 3x3
/// neighbourhood. Border pixels are never maxima. Row-major order.
pub fn local_maxima(depth: &Buffer2<f64>) -> Vec<Candidate> {
    let (w, h) = (depth.width(), depth.height());
    let mut maxima = Vec::new();
    if w < 3 || h < 3 {
        return maxima;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let d = *depth.get(x, y);
            if d == 0.0 {
                continue;
            }
            let is_max = (y - 1..=y + 1)
                .all(|ny| (x - 1..=x + 1).all(|nx| *depth.get(nx, ny) <= d));
            if is_max {
                maxima.push(Candidate::at_pixel(x, y));
            }
        }
    }
    maxima
}
