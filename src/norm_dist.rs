use std::ops::Deref;

use num_traits::AsPrimitive;
use once_cell::unsync::OnceCell;

/// Summary statistics of an empirical distribution, lazily evaluated.
///
/// The standard deviation is the population one (denominator `n`).
pub struct NormDist<D> {
    data: D,
    mean: OnceCell<f64>,
    stddev: OnceCell<f64>,
}

impl<D> NormDist<D> {
    #[inline]
    pub fn from_sample(data: D) -> Self {
        Self {
            data,
            mean: OnceCell::new(),
            stddev: OnceCell::new(),
        }
    }
}

impl<D, T> NormDist<D>
where
    D: Deref<Target = [T]>,
    T: AsPrimitive<f64>,
{
    /// Standard score of `value`, `None` when the distribution has no spread.
    pub fn z_score(&self, value: T) -> Option<f64> {
        let stddev = self.stddev();
        (stddev > 0.).then(|| (value.as_() - self.mean()) / stddev)
    }

    pub fn mean(&self) -> f64 {
        *self.mean.get_or_init(|| {
            let len = self.data.len();
            if len == 0 {
                0.
            } else {
                // It is fine to evaluate the mean
                #[allow(clippy::cast_precision_loss)]
                let len_recip = (len as f64).recip();
                self.data.iter().map(|x| x.as_() * len_recip).sum()
            }
        })
    }

    pub fn stddev(&self) -> f64 {
        *self.stddev.get_or_init(|| {
            let len = self.data.len();
            if len == 0 {
                return 0.;
            }

            // It is fine to evaluate the variance
            #[allow(clippy::cast_precision_loss)]
            let len_recip = (len as f64).recip();

            let mean = self.mean();
            let variance: f64 = self
                .data
                .iter()
                .map(|x| (x.as_() - mean).powi(2) * len_recip)
                .sum();

            variance.sqrt()
        })
    }

    /// Number of samples greater than or equal to `value`.
    pub fn count_at_least(&self, value: T) -> usize
    where
        T: PartialOrd + Copy,
    {
        self.data.iter().filter(|&&x| x >= value).count()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn population_statistics() {
        let dist = NormDist::from_sample(vec![2u32, 4, 4, 4, 5, 5, 7, 9]);
        assert_abs_diff_eq!(dist.mean(), 5.);
        assert_abs_diff_eq!(dist.stddev(), 2.);
        assert_abs_diff_eq!(dist.z_score(9).unwrap(), 2.);
        assert_eq!(dist.count_at_least(5), 4);
    }

    #[test]
    fn constant_sample_has_no_z_score() {
        let data = [3u32; 5];
        let dist = NormDist::from_sample(&data[..]);
        assert_abs_diff_eq!(dist.mean(), 3.);
        assert_abs_diff_eq!(dist.stddev(), 0.);
        assert_eq!(dist.z_score(4), None);
    }

    #[test]
    fn empty_sample() {
        let dist = NormDist::from_sample(Vec::<u32>::new());
        assert_abs_diff_eq!(dist.mean(), 0.);
        assert_abs_diff_eq!(dist.stddev(), 0.);
        assert_eq!(dist.count_at_least(0), 0);
    }
}
