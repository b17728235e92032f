//! Bit-packed 2D buffer for binary masks.
//!
//! One bit per pixel in `u64` words, row-major, same addressing as `Buffer2`.

use crate::buffer2::Buffer2;

const BITS_PER_WORD: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitBuffer2 {
    words: Vec<u64>,
    width: usize,
    height: usize,
}

impl BitBuffer2 {
    pub fn new_filled(width: usize, height: usize, value: bool) -> Self {
        let len = width * height;
        let fill = if value { !0u64 } else { 0u64 };
        let mut buf = Self {
            words: vec![fill; len.div_ceil(BITS_PER_WORD)],
            width,
            height,
        };
        buf.clear_tail();
        buf
    }

    pub fn new_default(width: usize, height: usize) -> Self {
        Self::new_filled(width, height, false)
    }

    /// Builds a mask from `f(x, y)` in row-major order.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut buf = Self::new_default(width, height);
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    buf.set(x, y, true);
                }
            }
        }
        buf
    }

    /// Non-zero pixels are set.
    pub fn from_nonzero<T: PartialEq + Default>(buffer: &Buffer2<T>) -> Self {
        let zero = T::default();
        Self::from_fn(buffer.width(), buffer.height(), |x, y| {
            *buffer.get(x, y) != zero
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        debug_assert!(x < self.width && y < self.height);
        let idx = y * self.width + x;
        (self.words[idx / BITS_PER_WORD] >> (idx % BITS_PER_WORD)) & 1 != 0
    }

    /// Signed lookup; coordinates outside the mask read as `false`.
    #[inline]
    pub fn get_signed(&self, x: isize, y: isize) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && self.get(x as usize, y as usize)
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        debug_assert!(x < self.width && y < self.height);
        let idx = y * self.width + x;
        let word = &mut self.words[idx / BITS_PER_WORD];
        let bit = 1u64 << (idx % BITS_PER_WORD);
        if value {
            *word |= bit;
        } else {
            *word &= !bit;
        }
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn any(&self) -> bool {
        self.words.iter().any(|&w| w != 0)
    }

    fn clear_tail(&mut self) {
        let len = self.len();
        let tail = len % BITS_PER_WORD;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }
}
