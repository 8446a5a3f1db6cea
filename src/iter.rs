use std::iter::FusedIterator;

/// Start positions of the sliding windows over a sequence.
///
/// Only windows fully contained in the sequence are yielded, therefore a sequence shorter than
/// the window does not produce any start.
#[derive(Debug, Clone)]
pub(crate) struct WindowStarts {
    front: u64,
    remaining: u64,
    step: u64,
}

impl WindowStarts {
    /// # Panics
    ///
    /// Panics if `step` is zero.
    pub(crate) fn new(length: u64, window_size: u64, step: u64) -> Self {
        assert_ne!(step, 0, "window step must be greater than zero");

        let remaining = length
            .checked_sub(window_size)
            .map_or(0, |last_start| last_start / step + 1);

        Self {
            front: 0,
            remaining,
            step,
        }
    }
}

impl Iterator for WindowStarts {
    type Item = u64;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let start = self.front;
        self.front += self.step;
        self.remaining -= 1;
        Some(start)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = usize::try_from(self.remaining).ok();
        (len.unwrap_or(usize::MAX), len)
    }
}

impl ExactSizeIterator for WindowStarts {}

impl FusedIterator for WindowStarts {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_last_full_window() {
        let starts: Vec<_> = WindowStarts::new(400, 200, 50).collect();
        assert_eq!(starts, [0, 50, 100, 150, 200]);
    }

    #[test]
    fn skips_partial_windows() {
        let starts: Vec<_> = WindowStarts::new(449, 200, 50).collect();
        assert_eq!(starts, [0, 50, 100, 150, 200]);
        assert_eq!(WindowStarts::new(450, 200, 50).len(), 6);
    }

    #[test]
    fn short_sequence() {
        assert_eq!(WindowStarts::new(199, 200, 50).next(), None);
        assert_eq!(WindowStarts::new(200, 200, 50).collect::<Vec<_>>(), [0]);
        assert_eq!(WindowStarts::new(0, 200, 50).len(), 0);
    }

    #[test]
    #[should_panic(expected = "window step must be greater than zero")]
    fn zero_step() {
        let _ = WindowStarts::new(10, 4, 0);
    }
}
