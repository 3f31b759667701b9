use std::time::Instant;

use crate::address::Address;
use crate::context::Actor;
use crate::error::ActorError;
use crate::supervisor::{Directive, RestartRecord, SupervisionStrategy};

/// Applies the restart-window accounting that sits between a policy
/// supervisor and the directive actually applied: ask the policy supervisor
/// for a directive, then — regardless of what it said — upgrade to
/// `Escalate` if accepting this failure would push the restart count in the
/// current window past `max_restarts`. The window itself resets whenever it
/// has fully elapsed since it started.
pub fn decide_with_intensity<A: Actor>(
  address: &Address,
  error: &ActorError,
  record: &mut RestartRecord,
  strategy: &SupervisionStrategy,
  raw_directive: Directive,
) -> Directive {
  let now = Instant::now();

  if let Some(window) = strategy.window {
    match record.window_started_at {
      Some(started) if now.duration_since(started) >= window => {
        *record = RestartRecord::fresh();
      }
      None => {
        record.window_started_at = Some(now);
      }
      _ => {}
    }
  } else if record.window_started_at.is_none() {
    record.window_started_at = Some(now);
  }

  record.restarts_in_window += 1;

  let escalate_for_intensity = match strategy.max_restarts {
    Some(max) => record.restarts_in_window > max,
    None => false,
  };

  log::debug!(
    "supervision: address={} error={} raw_directive={:?} restarts_in_window={} max_restarts={:?}",
    address, error, raw_directive, record.restarts_in_window, strategy.max_restarts
  );

  if escalate_for_intensity {
    Directive::Escalate
  } else {
    raw_directive
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  struct Dummy;
  #[async_trait::async_trait(?Send)]
  impl crate::context::Actor for Dummy {}

  #[test]
  fn escalates_once_intensity_exceeded() {
    let strategy = SupervisionStrategy::bounded(2, Duration::from_secs(1), crate::supervisor::SupervisionScope::OneForOne);
    let mut record = RestartRecord::fresh();
    let address = Address::new_sequential();
    let error = ActorError::failure("boom");

    let d1 = decide_with_intensity::<Dummy>(&address, &error, &mut record, &strategy, Directive::Restart);
    assert_eq!(d1, Directive::Restart);
    let d2 = decide_with_intensity::<Dummy>(&address, &error, &mut record, &strategy, Directive::Restart);
    assert_eq!(d2, Directive::Restart);
    let d3 = decide_with_intensity::<Dummy>(&address, &error, &mut record, &strategy, Directive::Restart);
    assert_eq!(d3, Directive::Escalate);
  }

  #[test]
  fn window_resets_after_elapsing() {
    let strategy = SupervisionStrategy::bounded(1, Duration::from_millis(1), crate::supervisor::SupervisionScope::OneForOne);
    let mut record = RestartRecord::fresh();
    let address = Address::new_sequential();
    let error = ActorError::failure("boom");

    let _ = decide_with_intensity::<Dummy>(&address, &error, &mut record, &strategy, Directive::Restart);
    std::thread::sleep(Duration::from_millis(5));
    let d = decide_with_intensity::<Dummy>(&address, &error, &mut record, &strategy, Directive::Restart);
    assert_eq!(d, Directive::Restart);
  }

  #[test]
  fn unlimited_strategy_never_escalates_for_intensity() {
    let strategy = SupervisionStrategy::unlimited();
    let mut record = RestartRecord::fresh();
    let address = Address::new_sequential();
    let error = ActorError::failure("boom");
    for _ in 0..50 {
      let d = decide_with_intensity::<Dummy>(&address, &error, &mut record, &strategy, Directive::Restart);
      assert_eq!(d, Directive::Restart);
    }
  }
}
