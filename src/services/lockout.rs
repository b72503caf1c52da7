//! Account lockout policy.
//!
//! Pure decision logic: given the current consecutive-failure count, decide
//! the next count and whether the account locks. All persistence and audit
//! side effects live in the auth service; this type does no I/O.

/// Outcome of applying the policy to one observed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutDecision {
    pub next_count: u32,
    pub lock_account: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    threshold: u32,
}

impl LockoutPolicy {
    /// A zero threshold would lock every account on its first failure
    /// before it ever existed as a policy; clamp to at least 1.
    #[must_use]
    pub const fn new(threshold: u32) -> Self {
        Self {
            threshold: if threshold == 0 { 1 } else { threshold },
        }
    }

    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Wrong password observed: the count always advances by one, and the
    /// account locks once it reaches the threshold.
    #[must_use]
    pub const fn on_failed_attempt(&self, current_count: u32) -> LockoutDecision {
        let next_count = current_count + 1;
        LockoutDecision {
            next_count,
            lock_account: next_count >= self.threshold,
        }
    }

    /// Successful verification: the count resets unconditionally.
    #[must_use]
    pub const fn on_success(&self) -> LockoutDecision {
        LockoutDecision {
            next_count: 0,
            lock_account: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_advance_below_threshold_without_locking() {
        let policy = LockoutPolicy::new(3);

        assert_eq!(
            policy.on_failed_attempt(0),
            LockoutDecision {
                next_count: 1,
                lock_account: false
            }
        );
        assert_eq!(
            policy.on_failed_attempt(1),
            LockoutDecision {
                next_count: 2,
                lock_account: false
            }
        );
    }

    #[test]
    fn reaching_threshold_locks() {
        let policy = LockoutPolicy::new(3);

        let decision = policy.on_failed_attempt(2);
        assert_eq!(decision.next_count, 3);
        assert!(decision.lock_account);
    }

    #[test]
    fn counts_past_threshold_still_lock() {
        let policy = LockoutPolicy::new(3);

        let decision = policy.on_failed_attempt(7);
        assert_eq!(decision.next_count, 8);
        assert!(decision.lock_account);
    }

    #[test]
    fn success_resets_to_zero() {
        let policy = LockoutPolicy::new(3);

        assert_eq!(
            policy.on_success(),
            LockoutDecision {
                next_count: 0,
                lock_account: false
            }
        );
    }

    #[test]
    fn threshold_one_locks_on_first_failure() {
        let policy = LockoutPolicy::new(1);

        assert!(policy.on_failed_attempt(0).lock_account);
    }

    #[test]
    fn zero_threshold_is_clamped() {
        let policy = LockoutPolicy::new(0);

        assert_eq!(policy.threshold(), 1);
        assert!(policy.on_failed_attempt(0).lock_account);
    }

    #[test]
    fn custom_threshold_boundary() {
        let policy = LockoutPolicy::new(5);

        assert!(!policy.on_failed_attempt(3).lock_account);
        assert!(policy.on_failed_attempt(4).lock_account);
    }
}
