use std::time::{Duration, Instant};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::address::Address;
use crate::error::ActorError;

/// The chosen response to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Directive {
  Resume = 0,
  Restart = 1,
  Stop = 2,
  Escalate = 3,
}

/// Whether a directive applies only to the failing cell, or to every
/// sibling registered under the same supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionScope {
  OneForOne,
  OneForAll,
}

/// Restart-intensity configuration: at most `max_restarts` failures may
/// occur within `window` before the next failure is escalated regardless
/// of what the [`Supervisor`] decided. `None` in either field means
/// unlimited, matching the root guardians' strategy.
#[derive(Debug, Clone, Copy)]
pub struct SupervisionStrategy {
  pub max_restarts: Option<u32>,
  pub window: Option<Duration>,
  pub scope: SupervisionScope,
}

impl Default for SupervisionStrategy {
  fn default() -> Self {
    Self { max_restarts: None, window: None, scope: SupervisionScope::OneForOne }
  }
}

impl SupervisionStrategy {
  pub fn unlimited() -> Self {
    Self::default()
  }

  pub fn bounded(max_restarts: u32, window: Duration, scope: SupervisionScope) -> Self {
    Self { max_restarts: Some(max_restarts), window: Some(window), scope }
  }
}

/// The restart bookkeeping a [`Supervisor`] is handed alongside the error:
/// how many restarts have landed in the current window so far, and when
/// that window started. Window eviction and the "upgrade to Escalate past
/// the intensity limit" rule live in `SupervisedWrapper`, not here — a
/// `Supervisor` is a pure policy and never mutates this record.
#[derive(Debug, Clone, Copy)]
pub struct RestartRecord {
  pub restarts_in_window: u32,
  pub window_started_at: Option<Instant>,
}

impl RestartRecord {
  pub fn fresh() -> Self {
    Self { restarts_in_window: 0, window_started_at: None }
  }
}

/// A pure policy: given the error, the restart history, and the strategy
/// in effect, decide what should happen to the failing cell. A
/// `Supervisor` never touches mailbox or actor state directly — that is
/// `SupervisedWrapper`'s job (see `supervisor_wrapper.rs`).
pub trait Supervisor: std::fmt::Debug {
  fn decide(
    &self,
    failed_address: &Address,
    error: &ActorError,
    record: &RestartRecord,
    strategy: &SupervisionStrategy,
  ) -> Directive;
}

/// Restarts for any error — the runtime's default when no supervisor is
/// given to `Stage::actor_for`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSupervisor;

impl Supervisor for DefaultSupervisor {
  fn decide(
    &self,
    _failed_address: &Address,
    _error: &ActorError,
    _record: &RestartRecord,
    _strategy: &SupervisionStrategy,
  ) -> Directive {
    Directive::Restart
  }
}

/// Resumes for any error, leaving actor state intact — useful in tests and
/// for actors whose handlers are expected to be individually fallible
/// without losing accumulated state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResumingSupervisor;

impl Supervisor for ResumingSupervisor {
  fn decide(
    &self,
    _failed_address: &Address,
    _error: &ActorError,
    _record: &RestartRecord,
    _strategy: &SupervisionStrategy,
  ) -> Directive {
    Directive::Resume
  }
}

/// Stops the cell for any error — useful for actors with no recovery path.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoppingSupervisor;

impl Supervisor for StoppingSupervisor {
  fn decide(
    &self,
    _failed_address: &Address,
    _error: &ActorError,
    _record: &RestartRecord,
    _strategy: &SupervisionStrategy,
  ) -> Directive {
    Directive::Stop
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_supervisor_always_restarts() {
    let supervisor = DefaultSupervisor;
    let directive = supervisor.decide(
      &Address::new_sequential(),
      &ActorError::failure("boom"),
      &RestartRecord::fresh(),
      &SupervisionStrategy::unlimited(),
    );
    assert_eq!(directive, Directive::Restart);
  }

  #[test]
  fn directive_round_trips_through_u8() {
    let byte: u8 = Directive::Escalate.into();
    assert_eq!(Directive::try_from(byte).unwrap(), Directive::Escalate);
  }
}
