//! Distance metrics between samples.
//!
//! The kernels work on plain slices so both backends share them; the
//! [`Backend`](crate::backend::Backend) methods only flatten their operands
//! before calling in.

use num_traits::Float;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::index};
use tracing::debug;

use crate::{
    backend::Backend,
    error::{Error, Result},
};

/// Default number of rows drawn from each set by [`EnergyDistance`].
pub const DEFAULT_DOWNSAMPLE: usize = 100;

/// Squared euclidean distance between two equal-length vectors.
pub fn squared_euclidean<T: Float>(a: &[T], b: &[T]) -> Result<T> {
    if a.len() != b.len() {
        return Err(Error::ShapeMismatch {
            op: "squared_euclidean_distance",
            expected: vec![a.len()],
            got: vec![b.len()],
        });
    }
    Ok(a.iter().zip(b).fold(T::zero(), |acc, (&x, &y)| {
        let diff = x - y;
        acc + diff * diff
    }))
}

/// Euclidean distance between two equal-length vectors.
pub fn euclidean<T: Float>(a: &[T], b: &[T]) -> Result<T> {
    squared_euclidean(a, b).map(Float::sqrt)
}

/// A row-major matrix borrowed as a list of rows.
#[derive(Clone, Copy, Debug)]
pub struct Rows<'a> {
    data: &'a [f32],
    cols: usize,
}

impl<'a> Rows<'a> {
    /// Views `data` as rows of length `cols`.
    pub fn new(data: &'a [f32], cols: usize) -> Result<Self> {
        if cols == 0 || data.len() % cols != 0 {
            return Err(Error::InvalidArgument {
                arg: "cols",
                reason: format!(
                    "{} elements do not split into rows of {cols}",
                    data.len()
                ),
            });
        }
        Ok(Self { data, cols })
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len() / self.cols
    }

    /// Whether there are no rows.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    fn row(&self, i: usize) -> &'a [f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }
}

/// Mean pairwise distance within one subsample, counting each pair once.
fn within(rows: Rows<'_>, picks: &[usize]) -> f32 {
    let n = picks.len();
    let mut total = 0.0_f32;
    for i in 0..n.saturating_sub(1) {
        for j in i + 1..n {
            total += row_distance(rows.row(picks[i]), rows.row(picks[j]));
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let pairs = (n * n - n) as f32;
    2.0 * total / pairs
}

#[inline]
fn row_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Subsampled energy distance between the rows of `minibatch` and the rows
/// of `samples`.
///
/// At most `downsample` rows are drawn, without replacement, from each
/// set. Both sets need at least two rows and the same row length.
///
/// Drawing with replacement, as `numpy.random.choice` does by default,
/// repeats rows and adds zero-distance pairs, so results differ from
/// NumPy-based implementations even with matching seeds.
pub fn energy<R>(
    minibatch: Rows<'_>,
    samples: Rows<'_>,
    downsample: usize,
    rng: &mut R,
) -> Result<f32>
where
    R: Rng + ?Sized,
{
    if minibatch.cols != samples.cols {
        return Err(Error::ShapeMismatch {
            op: "fast_energy_distance",
            expected: vec![minibatch.len(), minibatch.cols],
            got: vec![samples.len(), samples.cols],
        });
    }
    if downsample < 2 {
        return Err(Error::InvalidArgument {
            arg: "downsample",
            reason: format!("need at least 2 rows per set, got {downsample}"),
        });
    }
    for (arg, rows) in [("minibatch", minibatch), ("samples", samples)] {
        if rows.len() < 2 {
            return Err(Error::InvalidArgument {
                arg,
                reason: format!("need at least 2 rows, got {}", rows.len()),
            });
        }
    }

    let n = minibatch.len().min(downsample);
    let m = samples.len().min(downsample);
    let picks_x = index::sample(rng, minibatch.len(), n).into_vec();
    let picks_y = index::sample(rng, samples.len(), m).into_vec();
    debug!(n, m, cols = minibatch.cols, "energy distance subsample");

    let d1 = within(minibatch, &picks_x);
    let d2 = within(samples, &picks_y);

    let mut cross = 0.0_f32;
    for &i in &picks_x {
        for &j in &picks_y {
            cross += row_distance(minibatch.row(i), samples.row(j));
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let d3 = cross / (n * m) as f32;

    Ok(2.0 * d3 - d2 - d1)
}

/// Runtime settings for the energy-distance statistic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnergyDistance {
    /// Maximum number of rows drawn from each set.
    pub downsample: usize,
    /// Seed for the row subsampling. `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for EnergyDistance {
    #[inline]
    fn default() -> Self {
        Self {
            downsample: DEFAULT_DOWNSAMPLE,
            seed: None,
        }
    }
}

impl EnergyDistance {
    /// Sets the maximum number of rows drawn from each set.
    #[inline]
    #[must_use]
    pub const fn with_downsample(mut self, downsample: usize) -> Self {
        self.downsample = downsample;
        self
    }

    /// Makes the subsampling reproducible.
    #[inline]
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Computes the energy distance between two batches on backend `B`.
    pub fn compute<B: Backend>(
        &self,
        minibatch: &B::Tensor,
        samples: &B::Tensor,
    ) -> Result<f32> {
        match self.seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                B::fast_energy_distance(
                    minibatch,
                    samples,
                    self.downsample,
                    &mut rng,
                )
            }
            None => B::fast_energy_distance(
                minibatch,
                samples,
                self.downsample,
                &mut rand::rng(),
            ),
        }
    }
}
