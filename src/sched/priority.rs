//! The pure arithmetic behind priority assignment (§4.6 step 2, §4.7).
//! Kept free of `Thread`/`Kernel` state so the formulas themselves are
//! easy to test against spec scenario S5 without a running scheduler.

use crate::fixed_point::Fp;
use crate::thread::{PRI_MAX, PRI_MIN};

/// `load_avg = (59/60)*load_avg + (1/60)*ready_count` (§4.6 step 2).
pub fn decay_load_avg(load_avg: Fp, ready_count: u32) -> Fp {
    let fifty_nine_sixtieths = Fp::from_int(59).div(Fp::from_int(60));
    let one_sixtieth = Fp::from_int(1).div(Fp::from_int(60));
    fifty_nine_sixtieths.mul(load_avg) + one_sixtieth.mul(Fp::from_int(ready_count as i32))
}

/// `recent_cpu = (2*load_avg / (2*load_avg + 1)) * recent_cpu + nice`
/// (§4.6 step 2, once-per-second boundary).
pub fn decay_recent_cpu(recent_cpu: Fp, load_avg: Fp, nice: i32) -> Fp {
    let two_load_avg = load_avg.mul_int(2);
    let coefficient = two_load_avg.div(two_load_avg.add_int(1));
    coefficient.mul(recent_cpu).add_int(nice)
}

/// `priority = clamp(PRI_MAX - recent_cpu/4 - 2*nice)`, rounded to nearest
/// on the final conversion (§4.6 step 2).
pub fn recompute_priority(recent_cpu: Fp, nice: i32) -> u8 {
    let computed = Fp::from_int(PRI_MAX as i32) - recent_cpu.div_int(4) - Fp::from_int(2 * nice);
    let rounded = computed.to_int_round();
    rounded.clamp(PRI_MIN as i32, PRI_MAX as i32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_thread_gets_max_priority() {
        // S5: recent_cpu=0, nice=0 -> priority = clamp(PRI_MAX - 0 - 0) = PRI_MAX.
        assert_eq!(recompute_priority(Fp::ZERO, 0), PRI_MAX);
    }

    #[test]
    fn heavy_cpu_use_lowers_priority() {
        let busy = Fp::from_int(400);
        let lowered = recompute_priority(busy, 0);
        assert!(lowered < PRI_MAX);
    }

    #[test]
    fn priority_clamps_at_bounds() {
        assert_eq!(recompute_priority(Fp::from_int(10_000), 20), PRI_MIN);
        assert_eq!(recompute_priority(Fp::from_int(-10_000), -20), PRI_MAX);
    }

    #[test]
    fn load_avg_tracks_ready_count_upward() {
        let mut load = Fp::ZERO;
        for _ in 0..200 {
            load = decay_load_avg(load, 1);
        }
        // With one thread always ready, load_avg converges toward 1.
        assert!(load.to_int_round() == 1 || load.to_int_trunc() == 0);
        assert!(load.raw() > 0);
    }
}
