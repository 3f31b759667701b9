//! The self-draining dispatch loop, failure handling, and the stop
//! sequence for a concrete `ActorCell<A>`.
//!
//! Every function here runs on the `Stage`'s `tokio::task::LocalSet`; none
//! of it is `Send`, and none of it needs to be.

use std::rc::Rc;

use crate::address::Address;
use crate::cell::{ActorCell, AnyCell, CellState};
use crate::context::Actor;
use crate::error::ActorError;
use crate::message::MessageDescriptor;
use crate::supervised;
use crate::supervisor::{Directive, SupervisionScope};

/// Pops and delivers envelopes until the queue is empty or the mailbox
/// becomes unable to dispatch (suspended during failure handling, or
/// closed by a stop sequence that raced us in). Always releases the
/// dispatch slot before returning, then rechecks once for a lost wakeup:
/// a `send()` that lost the race to acquire the slot while we were mid-
/// drain left work behind for whoever released the slot to pick back up.
pub(crate) async fn drain<A: Actor>(cell: Rc<ActorCell<A>>) {
  loop {
    if cell.mailbox().is_suspended() || cell.mailbox().is_closed() {
      // A failure or a stop sequence raced us here mid-drain.
      break;
    }
    let envelope = match cell.mailbox().pop_front() {
      Some(envelope) => envelope,
      None => break,
    };
    let descriptor: MessageDescriptor = (&envelope).into();
    let result = {
      let mut actor = cell.actor.borrow_mut();
      envelope.deliver(&mut *actor).await
    };
    if let Err(error) = result {
      log::warn!(
        "actor {} failed handling {}: {}",
        cell.address(),
        descriptor.method,
        error
      );
      handle_failure(cell.clone(), error).await;
    }
  }
  cell.mailbox().release_dispatch_slot();
  if !cell.mailbox().is_empty() && cell.mailbox().try_acquire_dispatch_slot() {
    tokio::task::spawn_local(drain(cell));
  }
}

/// Runs when a delivered message's handler returned `Err`: suspends the
/// mailbox, asks the supervisor for a directive, upgrades it to `Escalate`
/// if the restart window's intensity limit is exceeded, resolves any
/// `Escalate` by walking up to the parent cell, and finally applies
/// whatever directive results.
async fn handle_failure<A: Actor>(cell: Rc<ActorCell<A>>, error: ActorError) {
  cell.mailbox().suspend();

  let raw_directive = {
    let record = cell.restart_record.borrow();
    cell.supervisor.decide(cell.address(), &error, &record, &cell.strategy)
  };
  let directive = {
    let mut record = cell.restart_record.borrow_mut();
    supervised::decide_with_intensity::<A>(cell.address(), &error, &mut record, &cell.strategy, raw_directive)
  };

  let directive = if directive == Directive::Escalate {
    match cell.parent.clone().and_then(|parent| cell.stage.directory().get_any(&parent)) {
      Some(parent_cell) => parent_cell.escalate_for_child(cell.address().clone(), error.clone()).await,
      // No parent: this is a root guardian. Root guardians run an unlimited
      // strategy, so `decide_with_intensity` never escalates them for
      // intensity, and `DefaultSupervisor` never returns `Escalate` either —
      // this arm exists only as a safety net, not a reachable path.
      None => Directive::Restart,
    }
  } else {
    directive
  };

  apply_directive_with_scope(cell, directive, error).await;
}

/// Applies `directive` to `cell`, and — under `OneForAll` — to every
/// sibling registered under the same parent, in address order, so a
/// restart storm touches siblings deterministically rather than in
/// registration order.
async fn apply_directive_with_scope<A: Actor>(cell: Rc<ActorCell<A>>, directive: Directive, error: ActorError) {
  if cell.strategy.scope == SupervisionScope::OneForAll {
    if let Some(parent_address) = cell.parent.clone() {
      if let Some(parent_cell) = cell.stage.directory().get_any(&parent_address) {
        let mut siblings = parent_cell.children();
        siblings.sort();
        for sibling in siblings {
          if sibling == *cell.address() {
            continue;
          }
          if let Some(sibling_cell) = cell.stage.directory().get_any(&sibling) {
            sibling_cell.apply_directive(directive, error.clone()).await;
          }
        }
      }
    }
  }
  apply_directive_to_self(cell, directive, error).await;
}

/// Applies `directive` to `cell` alone — the concrete-type half of
/// `AnyCell::apply_directive`.
pub(crate) async fn apply_directive_to_self<A: Actor>(cell: Rc<ActorCell<A>>, directive: Directive, error: ActorError) {
  match directive {
    Directive::Resume => {
      let ctx = cell.context();
      {
        let mut actor = cell.actor.borrow_mut();
        if let Err(hook_error) = actor.before_resume(&ctx, &error).await {
          log::error!("before_resume hook failed for {}: {}", cell.address(), hook_error);
        }
      }
      cell.mailbox().resume();
      resume_drain(cell);
    }
    Directive::Restart => restart(cell, error).await,
    Directive::Stop => stop_sequence(cell).await,
    Directive::Escalate => {
      // `handle_failure` always resolves `Escalate` into a concrete
      // directive before reaching here; a sibling fanned out to under
      // `OneForAll` never re-decides for itself. Treat this as a
      // programming error in the caller rather than silently restarting.
      log::error!(
        "apply_directive_to_self received Escalate directly for {}; stopping instead",
        cell.address()
      );
      stop_sequence(cell).await;
    }
  }
}

/// Re-instantiates the actor: `before_restart` on the failed instance, stop
/// every child (recursive, the same rules `stop_sequence` applies), discard
/// the failed instance, build a fresh one from the same `Definition`, then
/// `after_restart` on the replacement. The address itself survives — only
/// the actor's own state and its child subtree are torn down and rebuilt.
async fn restart<A: Actor>(cell: Rc<ActorCell<A>>, error: ActorError) {
  let ctx = cell.context();
  {
    let mut actor = cell.actor.borrow_mut();
    if let Err(hook_error) = actor.before_restart(&ctx, &error).await {
      log::error!("before_restart hook failed for {}: {}", cell.address(), hook_error);
    }
  }

  stop_children(&cell).await;

  let fresh = cell.definition.instantiate();
  *cell.actor.borrow_mut() = fresh;

  {
    let mut actor = cell.actor.borrow_mut();
    if let Err(hook_error) = actor.after_restart(&ctx, &error).await {
      log::error!("after_restart hook failed for {}: {}", cell.address(), hook_error);
    }
  }

  cell.mailbox().resume();
  resume_drain(cell);
}

fn resume_drain<A: Actor>(cell: Rc<ActorCell<A>>) {
  if !cell.mailbox().is_empty() && cell.mailbox().try_acquire_dispatch_slot() {
    tokio::task::spawn_local(drain(cell));
  }
}

/// Stops every child of `cell`, depth-first, in address order — shared by
/// the stop sequence and by RESTART, which tears down a failed actor's
/// children along with its own state before re-instantiating.
async fn stop_children<A: Actor>(cell: &Rc<ActorCell<A>>) {
  let mut children: Vec<Address> = cell.children.borrow().iter().cloned().collect();
  children.sort();
  for child in children {
    if let Some(child_cell) = cell.stage.directory().get_any(&child) {
      child_cell.stop().await;
    }
  }
}

/// The stop sequence: mark stopping, stop every child first, run
/// `before_stop`, close the mailbox and dead-letter whatever is left in it,
/// run `after_stop`, unregister from the Directory, and finally mark
/// stopped. Idempotent — a second call on an already-stopping or
/// already-stopped cell is a no-op.
pub(crate) async fn stop_sequence<A: Actor>(cell: Rc<ActorCell<A>>) {
  match cell.state() {
    CellState::Stopping | CellState::Stopped => return,
    _ => cell.state.set(CellState::Stopping),
  }

  cell.mailbox().suspend();

  stop_children(&cell).await;

  let ctx = cell.context();
  {
    let mut actor = cell.actor.borrow_mut();
    if let Err(error) = actor.before_stop(&ctx).await {
      log::error!("before_stop hook failed for {}: {}", cell.address(), error);
    }
  }

  cell.mailbox().close();
  cell.mailbox().drain_to_dead_letters(cell.address(), &cell.stage.dead_letters());

  {
    let mut actor = cell.actor.borrow_mut();
    if let Err(error) = actor.after_stop(&ctx).await {
      log::error!("after_stop hook failed for {}: {}", cell.address(), error);
    }
  }

  if let Some(parent_address) = cell.parent.clone() {
    if let Some(parent_cell) = cell.stage.directory().get_any(&parent_address) {
      parent_cell.remove_child(cell.address());
    }
  }
  cell.stage.directory().unregister(cell.address());
  cell.state.set(CellState::Stopped);
}
