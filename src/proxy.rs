//! Handles through which callers talk to actors.
//!
//! [`Proxy<A>`] is typed: it knows the actor's message-handling signature
//! and can build envelopes for it. [`AnyProxy`] is untyped: it exposes
//! only the type-independent synchronous passthroughs — address, liveness,
//! type name — for places (like a child's `ctx.parent()`) where the
//! concrete actor type isn't nameable.

use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::address::Address;
use crate::cell::{ActorCell, AnyCell};
use crate::context::{Actor, Context};
use crate::dead_letters::DeadLetters;
use crate::error::ActorError;
use crate::future::ActorFuture;
use crate::logger::Logger;
use crate::message::Envelope;
use crate::scheduler::Scheduler;
use crate::stage::Stage;

/// A typed handle to one actor's cell. Cheap to clone (an `Rc` underneath)
/// and interned per-cell, so two `Proxy<A>`s obtained for the same address
/// compare equal.
pub struct Proxy<A: Actor> {
  cell: Rc<ActorCell<A>>,
}

impl<A: Actor> Proxy<A> {
  pub(crate) fn new(cell: Rc<ActorCell<A>>) -> Self {
    Self { cell }
  }

  pub fn address(&self) -> &Address {
    self.cell.address()
  }

  pub fn is_stopped(&self) -> bool {
    self.cell.is_stopped()
  }

  pub fn stage(&self) -> &Stage {
    &self.cell.stage
  }

  pub fn scheduler(&self) -> Scheduler {
    self.cell.stage.scheduler()
  }

  pub fn dead_letters(&self) -> DeadLetters {
    self.cell.stage.dead_letters()
  }

  pub fn logger(&self) -> Logger {
    Logger
  }

  /// The per-actor environment bundle (address, parent, stage, scheduler,
  /// dead letters, execution context) as a standalone handle, without
  /// going through a live handler invocation.
  pub fn environment(&self) -> Context<A> {
    self.cell.context()
  }

  /// Enqueues `call` and returns a future that resolves with its result —
  /// or with [`ActorError::Stopped`]/[`ActorError::MailboxFull`] if the
  /// message could never be delivered at all.
  pub fn ask<R: 'static>(
    &self,
    descriptor: &'static str,
    call: impl FnOnce(&mut A) -> LocalBoxFuture<'static, Result<R, ActorError>> + 'static,
  ) -> ActorFuture<R> {
    let (resolver, future) = ActorFuture::pending();
    let envelope = Envelope::new(descriptor, None, resolver, call);
    self.cell.send(envelope);
    future
  }

  /// Fire-and-forget: enqueues `call`, discarding the resulting future.
  /// Still goes through the same admission path as `ask`, so dead letters
  /// and mailbox overflow are handled identically — the caller just isn't
  /// watching for the outcome.
  pub fn tell<R: 'static>(
    &self,
    descriptor: &'static str,
    call: impl FnOnce(&mut A) -> LocalBoxFuture<'static, Result<R, ActorError>> + 'static,
  ) {
    let _ = self.ask(descriptor, call);
  }

  /// Requests this actor's stop.
  pub async fn stop(&self) -> ActorFuture<()> {
    self.cell.stage.stop_actor(self.cell.address()).await
  }

  /// Test-only escape hatch to the raw mailbox, for exercising
  /// suspend/resume directly (S5's bounded-overflow scenario) rather than
  /// through the failure path.
  #[cfg(test)]
  pub(crate) fn mailbox(&self) -> &crate::mailbox::Mailbox<A> {
    self.cell.mailbox()
  }

  /// Test-only: re-triggers dispatch after a manual `mailbox().resume()`,
  /// the way a `send()` would if one happened to follow.
  #[cfg(test)]
  pub(crate) fn kick_dispatch(&self) {
    if self.cell.mailbox().try_acquire_dispatch_slot() {
      let cell = self.cell.clone();
      tokio::task::spawn_local(async move { crate::dispatch::drain(cell).await });
    }
  }
}

impl<A: Actor> Clone for Proxy<A> {
  fn clone(&self) -> Self {
    Self { cell: self.cell.clone() }
  }
}

impl<A: Actor> PartialEq for Proxy<A> {
  fn eq(&self, other: &Self) -> bool {
    self.address() == other.address()
  }
}

impl<A: Actor> Eq for Proxy<A> {}

/// An untyped handle — everything `Proxy<A>` offers except `ask`/`tell`,
/// which need to know the actor's message signature.
#[derive(Clone)]
pub struct AnyProxy {
  cell: Rc<dyn AnyCell>,
}

impl AnyProxy {
  pub(crate) fn new(cell: Rc<dyn AnyCell>) -> Self {
    Self { cell }
  }

  pub fn address(&self) -> &Address {
    self.cell.address()
  }

  pub fn type_name(&self) -> &'static str {
    self.cell.type_name()
  }

  pub fn is_stopped(&self) -> bool {
    self.cell.is_stopped()
  }

  pub fn logger(&self) -> Logger {
    Logger
  }

  pub async fn stop(&self) {
    self.cell.clone().stop().await
  }
}

impl PartialEq for AnyProxy {
  fn eq(&self, other: &Self) -> bool {
    self.address() == other.address()
  }
}

impl Eq for AnyProxy {}
