use rand::Rng;

use crate::error::RelayError;

/// Cap on generate-and-retry attempts. Collisions are birthday-bound
/// negligible at these widths, so hitting the cap means the id space is
/// effectively full.
const MAX_ATTEMPTS: usize = 64;

/// Allocate a 9-digit client id that `taken` does not already report.
pub fn allocate_client_id(taken: impl Fn(&str) -> bool) -> Result<String, RelayError> {
    allocate(100_000_000u64..=999_999_999, taken)
}

/// Allocate a 6-digit access code that `taken` does not already report.
pub fn allocate_access_code(taken: impl Fn(&str) -> bool) -> Result<String, RelayError> {
    allocate(100_000u64..=999_999, taken)
}

fn allocate(
    range: std::ops::RangeInclusive<u64>,
    taken: impl Fn(&str) -> bool,
) -> Result<String, RelayError> {
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_ATTEMPTS {
        let candidate = rng.gen_range(range.clone()).to_string();
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }
    Err(RelayError::CapacityExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    #[test]
    fn client_ids_are_nine_decimal_digits() {
        for _ in 0..100 {
            let id = allocate_client_id(|_| false).unwrap();
            assert_eq!(id.len(), 9);
            assert!(id.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(id.chars().next(), Some('0'));
        }
    }

    #[test]
    fn access_codes_are_six_decimal_digits() {
        for _ in 0..100 {
            let code = allocate_access_code(|_| false).unwrap();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn retries_past_collisions() {
        let rejected = RefCell::new(0usize);
        let id = allocate_client_id(|_| {
            let mut count = rejected.borrow_mut();
            if *count < 5 {
                *count += 1;
                true
            } else {
                false
            }
        })
        .unwrap();
        assert_eq!(*rejected.borrow(), 5);
        assert_eq!(id.len(), 9);
    }

    #[test]
    fn exhaustion_is_reported() {
        let err = allocate_client_id(|_| true).unwrap_err();
        assert_eq!(err, RelayError::CapacityExhausted);
    }

    #[test]
    fn allocations_avoid_live_entries() {
        let mut live = HashSet::new();
        for _ in 0..50 {
            let id = allocate_client_id(|candidate| live.contains(candidate)).unwrap();
            assert!(live.insert(id));
        }
    }
}
