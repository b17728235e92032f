//! Grayscale and binary morphology on small structuring elements.
//!
//! Pixels outside the frame never take part in a min/max: erosion does not
//! eat in from the border and dilation does not grow out of it.

use common::{BitBuffer2, Buffer2};

/// Structuring element as offsets from its anchor (the kernel center).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    offsets: Vec<(isize, isize)>,
}

impl Kernel {
    /// Filled ellipse inscribed in a `size x size` square.
    ///
    /// Row half-spans are `round(c * sqrt(r^2 - dy^2) / r)` with `r = c = size / 2`,
    /// so a 3x3 ellipse is a cross.
    pub fn ellipse(size: usize) -> Self {
        assert!(size >= 1, "kernel size must be at least 1");
        let r = (size / 2) as isize;
        if r == 0 {
            return Self {
                offsets: vec![(0, 0)],
            };
        }
        let c = r as f64;
        let inv_r2 = 1.0 / (r * r) as f64;
        let mut offsets = Vec::new();
        for dy in -r..=r {
            let span = (c * (((r * r - dy * dy) as f64) * inv_r2).sqrt()).round_ties_even() as isize;
            for dx in -span..=span {
                offsets.push((dx, dy));
            }
        }
        Self { offsets }
    }

    /// 3x3 cross.
    pub fn cross() -> Self {
        Self {
            offsets: vec![(0, -1), (-1, 0), (0, 0), (1, 0), (0, 1)],
        }
    }

    #[inline]
    pub fn offsets(&self) -> &[(isize, isize)] {
        &self.offsets
    }
}

fn extremum(
    src: &Buffer2<f32>,
    kernel: &Kernel,
    pick: impl Fn(f32, f32) -> f32,
) -> Buffer2<f32> {
    Buffer2::from_fn(src.width(), src.height(), |x, y| {
        let mut acc = *src.get(x, y);
        for &(dx, dy) in kernel.offsets() {
            if let Some(&v) = src.get_signed(x as isize + dx, y as isize + dy) {
                acc = pick(acc, v);
            }
        }
        acc
    })
}

pub fn erode(src: &Buffer2<f32>, kernel: &Kernel) -> Buffer2<f32> {
    extremum(src, kernel, f32::min)
}

pub fn dilate(src: &Buffer2<f32>, kernel: &Kernel) -> Buffer2<f32> {
    extremum(src, kernel, f32::max)
}

/// White top-hat: `src - open(src)`.
pub fn top_hat(src: &Buffer2<f32>, kernel: &Kernel) -> Buffer2<f32> {
    let opened = dilate(&erode(src, kernel), kernel);
    Buffer2::from_fn(src.width(), src.height(), |x, y| {
        (src.get(x, y) - opened.get(x, y)).max(0.0)
    })
}

/// Separable `[1/4, 1/2, 1/4]` blur with mirrored (reflect-101) borders.
pub fn gaussian_blur_3x3(src: &Buffer2<f32>) -> Buffer2<f32> {
    let (w, h) = (src.width(), src.height());
    let horizontal = Buffer2::from_fn(w, h, |x, y| {
        let row = src.row(y);
        0.25 * row[reflect(x as isize - 1, w)] + 0.5 * row[x] + 0.25 * row[reflect(x as isize + 1, w)]
    });
    Buffer2::from_fn(w, h, |x, y| {
        0.25 * horizontal.get(x, reflect(y as isize - 1, h))
            + 0.5 * horizontal.get(x, y)
            + 0.25 * horizontal.get(x, reflect(y as isize + 1, h))
    })
}

#[inline]
fn reflect(i: isize, len: usize) -> usize {
    let last = len as isize - 1;
    if last <= 0 {
        return 0;
    }
    if i < 0 {
        (-i).min(last) as usize
    } else if i > last {
        (2 * last - i).max(0) as usize
    } else {
        i as usize
    }
}

fn binary_extremum(src: &BitBuffer2, kernel: &Kernel, all: bool) -> BitBuffer2 {
    BitBuffer2::from_fn(src.width(), src.height(), |x, y| {
        let mut inside = kernel.offsets().iter().filter_map(|&(dx, dy)| {
            let (nx, ny) = (x as isize + dx, y as isize + dy);
            (nx >= 0 && ny >= 0 && (nx as usize) < src.width() && (ny as usize) < src.height())
                .then(|| src.get(nx as usize, ny as usize))
        });
        if all {
            inside.all(|v| v)
        } else {
            inside.any(|v| v)
        }
    })
}

pub fn erode_binary(src: &BitBuffer2, kernel: &Kernel) -> BitBuffer2 {
    binary_extremum(src, kernel, true)
}

pub fn dilate_binary(src: &BitBuffer2, kernel: &Kernel) -> BitBuffer2 {
    binary_extremum(src, kernel, false)
}

/// Erosion then dilation. Removes specks smaller than the kernel.
pub fn open_binary(src: &BitBuffer2, kernel: &Kernel) -> BitBuffer2 {
    dilate_binary(&erode_binary(src, kernel), kernel)
}

/// Dilation then erosion. Fills holes smaller than the kernel.
pub fn close_binary(src: &BitBuffer2, kernel: &Kernel) -> BitBuffer2 {
    erode_binary(&dilate_binary(src, kernel), kernel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> BitBuffer2 {
        let h = rows.len();
        let w = rows[0].len();
        BitBuffer2::from_fn(w, h, |x, y| rows[y].as_bytes()[x] == b'#')
    }

    #[test]
    fn ellipse_three_is_cross() {
        let mut e = Kernel::ellipse(3).offsets().to_vec();
        let mut c = Kernel::cross().offsets().to_vec();
        e.sort();
        c.sort();
        assert_eq!(e, c);
    }

    #[test]
    fn ellipse_nine_row_spans() {
        let k = Kernel::ellipse(9);
        let span = |dy: isize| k.offsets().iter().filter(|o| o.1 == dy).count();
        assert_eq!(span(-4), 1);
        assert_eq!(span(-3), 7);
        assert_eq!(span(-2), 7);
        assert_eq!(span(-1), 9);
        assert_eq!(span(0), 9);
        assert_eq!(span(4), 1);
    }

    #[test]
    fn top_hat_removes_flat_background() {
        let mut frame = Buffer2::new_filled(15, 15, 100.0f32);
        frame[(7, 7)] = 150.0;
        let th = top_hat(&frame, &Kernel::ellipse(5));
        assert_eq!(th[(7, 7)], 50.0);
        assert_eq!(th[(0, 0)], 0.0);
        assert_eq!(th[(6, 7)], 0.0);
    }

    #[test]
    fn blur_preserves_constant_and_spreads_impulse() {
        let flat = Buffer2::new_filled(5, 4, 8.0f32);
        assert!(gaussian_blur_3x3(&flat).iter().all(|&v| (v - 8.0).abs() < 1e-6));

        let mut impulse = Buffer2::new_filled(5, 5, 0.0f32);
        impulse[(2, 2)] = 16.0;
        let blurred = gaussian_blur_3x3(&impulse);
        assert_eq!(blurred[(2, 2)], 4.0);
        assert_eq!(blurred[(1, 2)], 2.0);
        assert_eq!(blurred[(1, 1)], 1.0);
        assert_eq!(blurred.iter().sum::<f32>(), 16.0);
    }

    #[test]
    fn reflect_101_borders() {
        assert_eq!(reflect(-1, 5), 1);
        assert_eq!(reflect(5, 5), 3);
        assert_eq!(reflect(2, 5), 2);
        assert_eq!(reflect(-1, 1), 0);
    }

    #[test]
    fn opening_drops_speck_keeps_block() {
        let mask = mask_from(&[
            "........",
            ".###....",
            ".###..#.",
            ".###....",
            "........",
        ]);
        let opened = open_binary(&mask, &Kernel::cross());
        assert!(!opened.get(6, 2));
        assert!(opened.get(2, 2));
    }

    #[test]
    fn closing_fills_single_pixel_hole() {
        let mask = mask_from(&[
            ".....",
            ".###.",
            ".#.#.",
            ".###.",
            ".....",
        ]);
        let closed = close_binary(&mask, &Kernel::cross());
        assert!(closed.get(2, 2));
        assert!(!closed.get(0, 0));
    }

    #[test]
    fn binary_erosion_ignores_frame_border() {
        let mask = BitBuffer2::new_filled(4, 4, true);
        let eroded = erode_binary(&mask, &Kernel::cross());
        assert_eq!(eroded.count_ones(), 16);
    }
}
