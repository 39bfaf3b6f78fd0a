//! Probabilistic admission control ahead of the batch queue.

use rand::Rng;

/// Decide whether one event is forwarded to transport.
///
/// Draws a single uniform value and admits iff it is at or below
/// `sample_rate`. Rates at or above 1 always admit; rates at or below 0
/// (and NaN) never do.
pub fn admit(sample_rate: f64) -> bool {
    admit_with(&mut rand::rng(), sample_rate)
}

/// [`admit`] with a caller-supplied random source.
pub fn admit_with<R: Rng + ?Sized>(rng: &mut R, sample_rate: f64) -> bool {
    if sample_rate >= 1.0 {
        return true;
    }
    if sample_rate.is_nan() || sample_rate <= 0.0 {
        return false;
    }
    rng.random::<f64>() <= sample_rate
}

/// Normalize a configured rate into `[0, 1]`.
///
/// An unparseable or NaN rate admits everything, matching an unset rate.
pub fn normalize_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        1.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn full_rate_always_admits() {
        assert!((0..1000).all(|_| admit(1.0)));
    }

    #[test]
    fn zero_rate_never_admits() {
        assert!((0..1000).all(|_| !admit(0.0)));
        assert!(!admit(-0.5));
        assert!(!admit(f64::NAN));
    }

    #[test]
    fn fractional_rate_admits_proportionally() {
        let mut rng = StdRng::seed_from_u64(7);
        let admitted = (0..10_000).filter(|_| admit_with(&mut rng, 0.25)).count();
        assert!((2_000..3_000).contains(&admitted), "admitted {admitted}");
    }

    #[test]
    fn normalize_clamps_and_defaults() {
        assert_eq!(normalize_rate(1.5), 1.0);
        assert_eq!(normalize_rate(-1.0), 0.0);
        assert_eq!(normalize_rate(0.3), 0.3);
        assert_eq!(normalize_rate(f64::NAN), 1.0);
    }
}
