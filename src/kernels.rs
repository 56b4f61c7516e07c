//! Scalar and lane kernels shared by the backends.
//!
//! Keeping the arithmetic in one place is what makes both backends agree
//! bit-for-bit on elementwise results and within rounding on reductions.

/// Absolute tolerance of `allclose`.
pub(crate) const ATOL: f32 = 1e-8;

/// Relative tolerance of `allclose`.
pub(crate) const RTOL: f32 = 1e-5;

#[inline]
pub(crate) fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        // keeps 0.0, -0.0 and NaN as they are
        v
    }
}

#[inline]
pub(crate) fn clip(v: f32, min: Option<f32>, max: Option<f32>) -> f32 {
    let v = min.map_or(v, |lo| if v < lo { lo } else { v });
    max.map_or(v, |hi| if v > hi { hi } else { v })
}

/// NaN-propagating maximum.
#[inline]
pub(crate) fn maximum(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else {
        a.max(b)
    }
}

/// NaN-propagating minimum.
#[inline]
pub(crate) fn minimum(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else {
        a.min(b)
    }
}

#[inline]
pub(crate) fn close(a: f32, b: f32) -> bool {
    if a.is_infinite() || b.is_infinite() {
        return a == b;
    }
    (a - b).abs() <= ATOL + RTOL * b.abs()
}

#[inline]
pub(crate) fn mix(w: f32, x: f32, y: f32) -> f32 {
    w * x + (1.0 - w) * y
}

#[inline]
pub(crate) fn square_mix(w: f32, x: f32, y: f32) -> f32 {
    w * x + (1.0 - w) * y * y
}

pub(crate) fn max(lane: &[f32]) -> f32 {
    lane.iter().copied().fold(f32::NEG_INFINITY, maximum)
}

pub(crate) fn min(lane: &[f32]) -> f32 {
    lane.iter().copied().fold(f32::INFINITY, minimum)
}

pub(crate) fn sum(lane: &[f32]) -> f32 {
    lane.iter().sum()
}

pub(crate) fn prod(lane: &[f32]) -> f32 {
    lane.iter().product()
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn mean(lane: &[f32]) -> f32 {
    sum(lane) / lane.len() as f32
}

/// Population variance, two passes.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn var(lane: &[f32]) -> f32 {
    let mu = mean(lane);
    lane.iter().map(|&v| (v - mu) * (v - mu)).sum::<f32>() / lane.len() as f32
}

pub(crate) fn std(lane: &[f32]) -> f32 {
    var(lane).sqrt()
}

pub(crate) fn any(lane: &[bool]) -> bool {
    lane.iter().any(|&b| b)
}

pub(crate) fn all(lane: &[bool]) -> bool {
    lane.iter().all(|&b| b)
}

/// Position of the first maximum. A NaN wins, as in NumPy.
pub(crate) fn argmax(lane: &[f32]) -> usize {
    first_extreme(lane, |candidate, best| candidate > best)
}

/// Position of the first minimum. A NaN wins, as in NumPy.
pub(crate) fn argmin(lane: &[f32]) -> usize {
    first_extreme(lane, |candidate, best| candidate < best)
}

fn first_extreme(lane: &[f32], better: impl Fn(f32, f32) -> bool) -> usize {
    let mut best = 0;
    for (i, &v) in lane.iter().enumerate().skip(1) {
        if lane[best].is_nan() {
            break;
        }
        if v.is_nan() || better(v, lane[best]) {
            best = i;
        }
    }
    best
}
