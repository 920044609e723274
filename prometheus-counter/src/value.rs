use std::sync::atomic::{AtomicU64, Ordering};

/// The live value of one counter, kept in two registers.
///
/// `value_bits` holds the bit pattern of an `f64`, `carry` holds whole units that were too small
/// to change the float when they were added (and every [`inc`](Accumulator::inc)). The value of
/// the counter is always `f64::from_bits(value_bits) + carry as f64`; neither register is
/// meaningful on its own.
///
/// Both registers are updated with compare-and-swap retry loops, so any number of threads may
/// add concurrently without a lock. Two precision losses are accepted:
///
/// * a fractional part that is below the resolution of the float register is dropped;
/// * an `inc` that lands between a carry fold and the reset of the carry is dropped.
#[derive(Debug, Default)]
pub(crate) struct Accumulator {
    value_bits: AtomicU64,
    carry: AtomicU64,
}

/// Returns `base + addend` and whether `addend` was lost entirely to rounding.
#[inline]
fn add_with_rounding_error_checking(base: f64, addend: f64) -> (f64, bool) {
    if addend == 0.0 {
        return (base, false);
    }
    let sum = base + addend;
    (sum, sum == base)
}

impl Accumulator {
    pub(crate) fn new() -> Self {
        Accumulator::default()
    }

    /// Adds a non-negative `delta`. Callers check the sign.
    pub(crate) fn add(&self, delta: f64) {
        debug_assert!(delta >= 0.0 || delta.is_nan(), "accumulator received a negative delta");
        loop {
            let old_bits = self.value_bits.load(Ordering::Acquire);
            let base = f64::from_bits(old_bits);

            let (sum, lost) = add_with_rounding_error_checking(base, delta);
            if !lost {
                if self
                    .value_bits
                    .compare_exchange_weak(
                        old_bits,
                        sum.to_bits(),
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    return;
                }
                continue;
            }

            // Too small to register: bank the whole part in the carry. Only whole units are
            // banked, the fraction is below the float resolution anyway.
            let units = delta as u64;
            let old_carry = self.carry.load(Ordering::Acquire);
            let new_carry = old_carry.wrapping_add(units);
            let (folded, still_lost) = add_with_rounding_error_checking(base, new_carry as f64);

            if still_lost {
                if self
                    .carry
                    .compare_exchange_weak(
                        old_carry,
                        new_carry,
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    return;
                }
                continue;
            }

            // The carry now registers: fold it into the float register.
            if self
                .value_bits
                .compare_exchange_weak(
                    old_bits,
                    folded.to_bits(),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                self.carry.store(0, Ordering::Release);
                return;
            }
        }
    }

    /// Adds exactly one without touching the float register.
    #[inline]
    pub(crate) fn inc(&self) {
        // Overflow needs 2^64 increments between two folds.
        self.carry.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the sum of both registers.
    ///
    /// The two loads are not taken together, so a reader racing a carry fold can see a torn
    /// sum.
    pub(crate) fn get(&self) -> f64 {
        let value = f64::from_bits(self.value_bits.load(Ordering::Acquire));
        let carry = self.carry.load(Ordering::Acquire);
        value + carry as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const TWO_POW_53: f64 = 9_007_199_254_740_992.0;

    #[test]
    fn starts_at_zero() {
        assert_eq!(Accumulator::new().get(), 0.0);
    }

    #[test]
    fn adds_floats_and_units() {
        let acc = Accumulator::new();
        acc.add(15.5);
        acc.inc();
        acc.add(0.25);
        acc.inc();

        assert!(f64::abs(17.75 - acc.get()) < 1e-9);
    }

    #[test]
    fn zero_delta_is_a_no_op() {
        let acc = Accumulator::new();
        acc.add(TWO_POW_53);
        acc.add(0.0);

        assert_eq!(acc.get(), TWO_POW_53);
        assert_eq!(acc.carry.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn small_units_on_large_base_are_banked_then_folded() {
        let acc = Accumulator::new();
        acc.add(TWO_POW_53);

        // 2^53 + 1 is not representable: the unit goes to the carry.
        acc.add(1.0);
        assert_eq!(f64::from_bits(acc.value_bits.load(Ordering::Relaxed)), TWO_POW_53);
        assert_eq!(acc.carry.load(Ordering::Relaxed), 1);
        // Reading rounds the same way, the unit only shows up once folded.
        assert_eq!(acc.get(), TWO_POW_53);

        // 2^53 + 2 is representable: the carry is folded.
        acc.add(1.0);
        assert_eq!(
            f64::from_bits(acc.value_bits.load(Ordering::Relaxed)),
            TWO_POW_53 + 2.0
        );
        assert_eq!(acc.carry.load(Ordering::Relaxed), 0);
        assert_eq!(acc.get(), TWO_POW_53 + 2.0);
    }

    #[test]
    fn sub_resolution_fraction_is_dropped() {
        let acc = Accumulator::new();
        acc.add(TWO_POW_53);
        acc.add(0.5);

        assert_eq!(acc.get(), TWO_POW_53);
        assert_eq!(acc.carry.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn inc_is_exact_past_float_resolution() {
        let acc = Accumulator::new();
        acc.add(TWO_POW_53);
        for _ in 0..4 {
            acc.inc();
        }

        assert_eq!(acc.carry.load(Ordering::Relaxed), 4);
        assert_eq!(acc.get(), TWO_POW_53 + 4.0);
    }

    #[test]
    fn read_is_monotonic_without_concurrent_writers() {
        let acc = Accumulator::new();
        let mut last = acc.get();
        for i in 0..10_000u32 {
            match i % 3 {
                0 => acc.inc(),
                1 => acc.add(f64::from(i) * 0.5),
                _ => acc.add(TWO_POW_53),
            }
            let now = acc.get();
            assert!(now >= last, "{now} < {last} after step {i}");
            last = now;
        }
    }

    #[test]
    fn concurrent_float_adds_are_exact() {
        let acc = Arc::new(Accumulator::new());
        thread::scope(|s| {
            for _ in 0..16 {
                let acc = Arc::clone(&acc);
                s.spawn(move || {
                    for _ in 0..10_000 {
                        acc.add(0.5);
                        acc.add(1.5);
                    }
                });
            }
        });

        assert_eq!(acc.get(), 16.0 * 10_000.0 * 2.0);
    }

    #[test]
    fn concurrent_incs_and_adds_are_exact_below_resolution() {
        let acc = Arc::new(Accumulator::new());
        thread::scope(|s| {
            for t in 0..8 {
                let acc = Arc::clone(&acc);
                s.spawn(move || {
                    for _ in 0..10_000 {
                        if t % 2 == 0 {
                            acc.inc();
                        } else {
                            acc.add(1.0);
                        }
                    }
                });
            }
        });

        assert_eq!(acc.get(), 80_000.0);
    }
}
