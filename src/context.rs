use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;

use crate::address::Address;
use crate::dead_letters::DeadLetters;
use crate::error::ActorError;
use crate::execution_context::ExecutionContext;
use crate::future::ActorFuture;
use crate::logger::Logger;
use crate::proxy::AnyProxy;
use crate::scheduler::Scheduler;
use crate::stage::Stage;

/// Base behavior every actor implements. Every hook is optional — the
/// default does nothing and succeeds.
///
/// Hooks are `async` (via `#[async_trait]`, the teacher's own dependency)
/// because `before_start`/`before_stop`/etc. may need to await other
/// actors or I/O; none of them need to be `Send` since a `Stage` never
/// crosses a thread.
#[async_trait(?Send)]
pub trait Actor: 'static {
  async fn before_start(&mut self, _ctx: &Context<Self>) -> Result<(), ActorError>
  where
    Self: Sized,
  {
    Ok(())
  }

  async fn before_stop(&mut self, _ctx: &Context<Self>) -> Result<(), ActorError>
  where
    Self: Sized,
  {
    Ok(())
  }

  async fn after_stop(&mut self, _ctx: &Context<Self>) -> Result<(), ActorError>
  where
    Self: Sized,
  {
    Ok(())
  }

  async fn before_restart(&mut self, _ctx: &Context<Self>, _error: &ActorError) -> Result<(), ActorError>
  where
    Self: Sized,
  {
    Ok(())
  }

  async fn after_restart(&mut self, _ctx: &Context<Self>, _error: &ActorError) -> Result<(), ActorError>
  where
    Self: Sized,
  {
    Ok(())
  }

  async fn before_resume(&mut self, _ctx: &Context<Self>, _error: &ActorError) -> Result<(), ActorError>
  where
    Self: Sized,
  {
    Ok(())
  }

  /// Replaces the actor's externally-observable snapshot with `new` (if
  /// given) and returns the previous one. Neither RESTART nor RESUME
  /// invoke this automatically — that's left to the actor or a custom
  /// supervisor — so the default implementation has no snapshot to offer.
  fn state_snapshot(&mut self, _new: Option<Box<dyn Any>>) -> Option<Box<dyn Any>> {
    None
  }
}

/// Per-actor context: address, stage handle, scheduler, dead letters, and
/// the execution-context scratch bag. Handed to every lifecycle hook and
/// to every message handler invoked through a [`Proxy`](crate::proxy::Proxy).
pub struct Context<A: ?Sized> {
  pub(crate) address: Address,
  pub(crate) parent: Option<Address>,
  pub(crate) stage: Stage,
  pub(crate) execution_context: Rc<RefCell<ExecutionContext>>,
  pub(crate) _marker: std::marker::PhantomData<fn() -> A>,
}

impl<A> Context<A> {
  pub fn address(&self) -> &Address {
    &self.address
  }

  pub fn stage(&self) -> &Stage {
    &self.stage
  }

  pub fn scheduler(&self) -> Scheduler {
    self.stage.scheduler()
  }

  pub fn dead_letters(&self) -> DeadLetters {
    self.stage.dead_letters()
  }

  pub fn logger(&self) -> Logger {
    Logger
  }

  pub fn parent_address(&self) -> Option<&Address> {
    self.parent.as_ref()
  }

  /// The parent as an untyped proxy exposing only synchronous
  /// passthroughs — the parent's concrete actor type is not nameable from
  /// here.
  pub fn parent(&self) -> Option<AnyProxy> {
    let parent_address = self.parent.as_ref()?;
    self.stage.directory().get_any(parent_address).map(AnyProxy::new)
  }

  pub fn is_stopped(&self) -> bool {
    self
      .stage
      .directory()
      .get_any(&self.address)
      .map(|cell| cell.is_stopped())
      .unwrap_or(true)
  }

  pub fn execution_context(&self) -> Rc<RefCell<ExecutionContext>> {
    self.execution_context.clone()
  }

  /// The environment bundle this context wraps, as its own standalone
  /// handle — for code that only needs address/stage/scheduler/dead-letters
  /// access and not the rest of the `Context` surface.
  pub fn environment(&self) -> Context<A> {
    Context {
      address: self.address.clone(),
      parent: self.parent.clone(),
      stage: self.stage.clone(),
      execution_context: self.execution_context.clone(),
      _marker: std::marker::PhantomData,
    }
  }

  /// Requests this actor's own stop.
  pub async fn stop(&self) -> ActorFuture<()> {
    self.stage.stop_actor(&self.address).await
  }
}

impl<A: Actor> Context<A> {
  /// This actor's own typed proxy. Always resolves while the context is
  /// live — the cell registers itself in the Directory before handing out
  /// any `Context`.
  pub fn self_as(&self) -> crate::proxy::Proxy<A> {
    self
      .stage
      .directory()
      .get_typed::<A>(&self.address)
      .expect("an actor's own cell is registered for the lifetime of its Context")
  }

  /// Spawns `definition` as a child of this actor, supervised per
  /// `supervisor_key` (looked up in the Stage's named-supervisor registry;
  /// `None` uses the default restart-on-any-error policy).
  pub fn child_actor_for<C: Actor>(&self, definition: crate::definition::Definition<C>, supervisor_key: Option<&str>) -> crate::proxy::Proxy<C> {
    self.stage.spawn_child(self.address.clone(), definition, supervisor_key)
  }
}
