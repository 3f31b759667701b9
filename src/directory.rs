//! Sharded address → cell lookup table.
//!
//! Built on the teacher's `dashmap` dependency via
//! [`DashMap::with_shard_amount`], which gives "sharded by hash mod N" for
//! free rather than hand-rolling it. The runtime itself never touches this
//! table from more than one OS thread — every `Stage` is confined to a
//! single `tokio::task::LocalSet` — but the sharded map is still the
//! natural fit: it is what the teacher reaches for whenever it needs a
//! concurrent-shaped lookup table, and nothing here depends on the shards
//! actually being contended.

use std::any::Any;
use std::rc::Rc;

use dashmap::DashMap;

use crate::address::Address;
use crate::cell::{ActorCell, AnyCell};
use crate::context::Actor;
use crate::proxy::Proxy;

/// Shard count for a [`Directory`]. Must be a power of two — enforced by
/// rounding up rather than panicking, since callers often just pass "a
/// reasonable number" rather than a pre-validated one.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryConfig {
  pub shard_count: usize,
}

impl Default for DirectoryConfig {
  /// 64 shards: comfortable for the actor counts a single `Stage` is
  /// expected to host.
  fn default() -> Self {
    Self { shard_count: 64 }
  }
}

impl DirectoryConfig {
  pub fn small() -> Self {
    Self { shard_count: 16 }
  }

  pub fn high_capacity() -> Self {
    Self { shard_count: 256 }
  }
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum DirectoryError {
  #[error("address {0} is already registered")]
  AlreadyRegistered(Address),
}

/// Per-shard occupancy, for diagnostics. Computed independently of
/// dashmap's own internal shard assignment — `Directory` buckets by its own
/// hash of the canonical address string, so this reports a deterministic,
/// inspectable distribution rather than leaning on dashmap internals that
/// aren't part of its public contract.
#[derive(Debug, Clone)]
pub struct DirectoryStats {
  pub shard_count: usize,
  pub total: usize,
  pub per_shard: Vec<usize>,
}

/// Maps an [`Address`] to the type-erased cell that owns it.
pub struct Directory {
  shard_count: usize,
  entries: DashMap<String, Rc<dyn AnyCell>>,
}

impl Directory {
  pub fn new(config: DirectoryConfig) -> Self {
    let shard_count = config.shard_count.max(1).next_power_of_two();
    Self { shard_count, entries: DashMap::with_shard_amount(shard_count) }
  }

  /// Registers `cell` under `address`. Fails if the address is already
  /// taken — addresses are meant to be unique for the lifetime of a
  /// `Stage`.
  pub fn register(&self, address: Address, cell: Rc<dyn AnyCell>) -> Result<(), DirectoryError> {
    let key = address.canonical();
    if self.entries.contains_key(&key) {
      return Err(DirectoryError::AlreadyRegistered(address));
    }
    self.entries.insert(key, cell);
    Ok(())
  }

  /// Removes `address`, if present. Called once, at the end of the stop
  /// sequence — never before the cell has finished draining and notifying
  /// its hooks.
  pub fn unregister(&self, address: &Address) -> bool {
    self.entries.remove(&address.canonical()).is_some()
  }

  /// Untyped lookup: usable from any context that doesn't know — or
  /// shouldn't need to know — the concrete actor type, such as
  /// supervision escalation or a parent's synchronous passthroughs.
  pub fn get_any(&self, address: &Address) -> Option<Rc<dyn AnyCell>> {
    self.entries.get(&address.canonical()).map(|entry| entry.value().clone())
  }

  /// Typed lookup: recovers the concrete `ActorCell<A>` via `Rc::downcast`
  /// and hands back its cached [`Proxy`]. Returns `None` both when the
  /// address is absent and when it resolves to a cell of a different
  /// actor type — callers that care about the distinction should check
  /// `get_any` first.
  pub fn get_typed<A: Actor>(&self, address: &Address) -> Option<Proxy<A>> {
    let cell = self.get_any(address)?;
    let any: Rc<dyn Any> = cell.as_any_rc();
    let typed: Rc<ActorCell<A>> = any.downcast().ok()?;
    Some(typed.proxy())
  }

  pub fn size(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Per-shard occupancy snapshot, bucketed by a simple FNV-1a hash of the
  /// canonical address string mod `shard_count` — see the struct-level
  /// note on why this doesn't read dashmap's own shard assignment.
  pub fn stats(&self) -> DirectoryStats {
    let mut per_shard = vec![0usize; self.shard_count];
    for entry in self.entries.iter() {
      let bucket = fnv1a(entry.key()) as usize % self.shard_count;
      per_shard[bucket] += 1;
    }
    DirectoryStats { shard_count: self.shard_count, total: self.entries.len(), per_shard }
  }
}

fn fnv1a(key: &str) -> u64 {
  const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
  const PRIME: u64 = 0x100000001b3;
  let mut hash = OFFSET_BASIS;
  for byte in key.as_bytes() {
    hash ^= *byte as u64;
    hash = hash.wrapping_mul(PRIME);
  }
  hash
}
