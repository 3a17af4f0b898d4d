//! Property tests: interval arithmetic is pointwise sound — the result
//! contains every sum/product of contained values, including sign-flipping
//! multiplications.

use hybra_ir::Interval;
use proptest::prelude::*;

fn arb_interval() -> impl Strategy<Value = Interval> {
    (-100.0f64..100.0, 0.0f64..50.0).prop_map(|(lo, width)| Interval::new(lo, lo + width))
}

fn point_in(interval: Interval, fraction: f64) -> f64 {
    (interval.min + fraction * interval.width()).clamp(interval.min, interval.max)
}

proptest! {
    #[test]
    fn add_is_pointwise_sound(
        a in arb_interval(),
        b in arb_interval(),
        s in 0.0f64..=1.0,
        t in 0.0f64..=1.0,
    ) {
        let x = point_in(a, s);
        let y = point_in(b, t);
        prop_assert!(a.add(b).contains(x + y));
    }

    #[test]
    fn mul_interval_is_pointwise_sound(
        a in arb_interval(),
        b in arb_interval(),
        s in 0.0f64..=1.0,
        t in 0.0f64..=1.0,
    ) {
        let x = point_in(a, s);
        let y = point_in(b, t);
        prop_assert!(a.mul_interval(b).contains(x * y));
    }

    #[test]
    fn mul_scalar_matches_interval_multiplication(
        a in arb_interval(),
        k in -10.0f64..10.0,
    ) {
        prop_assert_eq!(a.mul_scalar(k), a.mul_interval(Interval::point(k)));
    }

    #[test]
    fn bloat_widens_symmetrically(a in arb_interval(), amount in 0.0f64..10.0) {
        let bloated = a.bloat(amount);
        prop_assert!(bloated.min <= a.min && a.max <= bloated.max);
        prop_assert!((bloated.width() - (a.width() + 2.0 * amount)).abs() < 1e-9);
    }
}
