//! Trace post-processing: synthesizing `wait` steps.
//!
//! The harness records `dt` per step but emits nothing while the script
//! sits in a `sleep` (or any other idle stretch). The post-processor makes
//! that time scrubbable: wherever two consecutive non-wait steps are more
//! than the threshold apart, it inserts a synthetic `wait` step carrying
//! the gap duration, then renumbers the whole array contiguously from 0.
//!
//! Existing records are never reordered, dropped, or mutated beyond `num`.
//! Pairs that already touch a `wait` step are skipped when scanning, which
//! is what makes a second pass over processed output a no-op.

use steplang_core::step::{StepCategory, StepRecord};

/// Gap threshold in milliseconds above which a `wait` step is inserted.
pub const WAIT_GAP_THRESHOLD_MS: u64 = 100;

/// Inserts `wait` steps into idle gaps and renumbers the array.
pub fn insert_wait_steps(steps: &mut Vec<StepRecord>, threshold_ms: u64) {
    let mut i = 0;
    while i + 1 < steps.len() {
        let before = &steps[i];
        let after = &steps[i + 1];
        let bounded_by_wait =
            before.category == StepCategory::Wait || after.category == StepCategory::Wait;
        if !bounded_by_wait {
            let gap = after.dt.saturating_sub(before.dt);
            if gap > threshold_ms {
                let wait = StepRecord::wait(gap, before.dt);
                steps.insert(i + 1, wait);
                // Skip past the inserted step; the (wait, after) pair is
                // exempt by construction.
                i += 1;
            }
        }
        i += 1;
    }
    for (index, step) in steps.iter_mut().enumerate() {
        step.num = index as u32;
    }
}
