//! Pixel offsets sorted by distance from a center point.

/// One entry of a [`DistanceMap`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Offset {
    pub dx: isize,
    pub dy: isize,
    pub distance: f64,
}

/// Every integer offset within `radius` of the origin, nearest first.
///
/// Offsets at equal distance keep row-major order (row `dy` outer, column
/// `dx` inner). The origin itself is the first entry.
#[derive(Debug, Clone)]
pub struct DistanceMap {
    radius: usize,
    offsets: Vec<Offset>,
}

impl DistanceMap {
    pub fn new(radius: usize) -> Self {
        let r = radius as isize;
        let mut offsets = Vec::with_capacity((2 * radius + 1).pow(2));
        for dy in -r..=r {
            for dx in -r..=r {
                let distance = ((dx * dx + dy * dy) as f64).sqrt();
                if distance <= radius as f64 {
                    offsets.push(Offset { dx, dy, distance });
                }
            }
        }
        // Stable sort so ties stay row-major.
        offsets.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Self { radius, offsets }
    }

    #[inline]
    pub fn radius(&self) -> usize {
        self.radius
    }

    #[inline]
    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }
}
