use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use ulid_generator_rs::{ULIDGenerator, ULID};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);
static ULID_GENERATOR: Lazy<std::sync::Mutex<ULIDGenerator>> =
  Lazy::new(|| std::sync::Mutex::new(ULIDGenerator::new()));

/// Opaque, string-comparable, hashable identity for an actor.
///
/// Two forms are provided: a time-sortable 128-bit ULID form, used by
/// default so addresses of actors created later sort after ones created
/// earlier, and a monotonically-increasing integer form for callers who
/// want a compact, predictable identity (tests, synthetic benchmarks).
/// Addresses are unique within a [`Stage`](crate::stage::Stage); equality
/// and hashing are defined over the canonical string form.
#[derive(Debug, Clone, Eq)]
pub enum Address {
  Sequential(u64),
  Ulid(ULID),
}

impl Address {
  /// Draws the next value from a process-wide monotonic counter.
  pub fn new_sequential() -> Self {
    Address::Sequential(SEQUENCE.fetch_add(1, Ordering::Relaxed))
  }

  /// Draws a new, time-sortable ULID.
  pub fn new_ulid() -> Self {
    let mut generator = ULID_GENERATOR.lock().unwrap();
    let ulid = generator.generate().expect("ULID generation never fails for monotonic clocks");
    Address::Ulid(ulid)
  }

  /// The canonical string form used for equality, hashing, and as the
  /// Directory's map key.
  pub fn canonical(&self) -> String {
    match self {
      Address::Sequential(n) => format!("seq:{}", n),
      Address::Ulid(ulid) => format!("ulid:{}", ulid.to_string()),
    }
  }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.canonical())
  }
}

impl PartialEq for Address {
  fn eq(&self, other: &Self) -> bool {
    self.canonical() == other.canonical()
  }
}

impl std::hash::Hash for Address {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.canonical().hash(state)
  }
}

impl PartialOrd for Address {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Address {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering {
    self.canonical().cmp(&other.canonical())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn sequential_addresses_are_unique_and_monotonic() {
    let a = Address::new_sequential();
    let b = Address::new_sequential();
    assert_ne!(a, b);
    match (a, b) {
      (Address::Sequential(x), Address::Sequential(y)) => assert!(y > x),
      _ => panic!("expected sequential addresses"),
    }
  }

  #[test]
  fn ulid_addresses_are_unique() {
    let a = Address::new_ulid();
    let b = Address::new_ulid();
    assert_ne!(a, b);
  }

  #[test]
  fn canonical_form_round_trips_through_hash_set() {
    let mut seen = HashSet::new();
    for _ in 0..32 {
      assert!(seen.insert(Address::new_sequential()));
    }
  }

  #[test]
  fn display_matches_canonical() {
    let a = Address::Sequential(7);
    assert_eq!(a.to_string(), "seq:7");
    assert_eq!(a.to_string(), a.canonical());
  }
}
