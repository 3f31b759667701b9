use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use once_cell::unsync::OnceCell;

use crate::address::Address;
use crate::context::{Actor, Context};
use crate::definition::Definition;
use crate::error::ActorError;
use crate::execution_context::ExecutionContext;
use crate::mailbox::Mailbox;
use crate::message::Envelope;
use crate::proxy::Proxy;
use crate::stage::Stage;
use crate::supervisor::{Directive, RestartRecord, Supervisor, SupervisionStrategy};

/// Lifecycle state of a cell: `constructed → starting → running →
/// stopping → stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
  Constructed,
  Starting,
  Running,
  Stopping,
  Stopped,
}

/// Type-erased face of an `ActorCell<A>`, stored in the `Directory` so it
/// can be looked up, stopped, and walked (parent/children) without knowing
/// `A`. Downcasts back to `ActorCell<A>` (via [`AnyCell::as_any`]) whenever
/// a caller asks for a typed `Proxy<A>`.
pub trait AnyCell {
  fn address(&self) -> &Address;
  fn type_name(&self) -> &'static str;
  fn is_stopped(&self) -> bool;
  fn parent(&self) -> Option<Address>;
  fn children(&self) -> Vec<Address>;
  fn add_child(&self, child: Address);
  fn remove_child(&self, child: &Address);

  /// Upcasts to `Rc<dyn Any>` so the Directory can recover the concrete
  /// `Rc<ActorCell<A>>` via `Rc::downcast` when a caller asks for a typed
  /// `Proxy<A>`. A plain `&dyn Any` is not enough for that — it would only
  /// support borrowed access, not reconstructing the `Rc` a `Proxy` holds.
  fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;

  /// Runs the full stop sequence.
  fn stop(self: Rc<Self>) -> LocalBoxFuture<'static, ()>;

  /// Applies a directive (already decided) to this cell alone — used by
  /// `OneForAll` fan-out to reach siblings of a different concrete actor
  /// type than the one that originally failed.
  fn apply_directive(self: Rc<Self>, directive: Directive, error: ActorError) -> LocalBoxFuture<'static, ()>;

  /// Consulted when a child cell's own supervisor escalates: decides using
  /// this cell's supervisor and strategy, recursing to this cell's own
  /// parent if the decision is itself `Escalate`. Root guardians have no
  /// parent, so recursion bottoms out there — in practice it never needs
  /// to, because root guardians run `DefaultSupervisor` with an unlimited
  /// strategy, which never returns `Escalate`.
  fn escalate_for_child(self: Rc<Self>, child: Address, error: ActorError) -> LocalBoxFuture<'static, Directive>;
}

/// Internal record per live actor.
pub struct ActorCell<A: Actor> {
  pub(crate) stage: Stage,
  pub(crate) address: Address,
  pub(crate) parent: Option<Address>,
  pub(crate) definition: Definition<A>,
  pub(crate) actor: RefCell<A>,
  pub(crate) mailbox: Mailbox<A>,
  pub(crate) supervisor: Rc<dyn Supervisor>,
  pub(crate) strategy: SupervisionStrategy,
  pub(crate) restart_record: RefCell<RestartRecord>,
  pub(crate) children: RefCell<HashSet<Address>>,
  pub(crate) state: Cell<CellState>,
  pub(crate) execution_context: Rc<RefCell<ExecutionContext>>,
  pub(crate) proxy_cache: OnceCell<Proxy<A>>,
}

impl<A: Actor> ActorCell<A> {
  pub fn new(
    stage: Stage,
    address: Address,
    parent: Option<Address>,
    definition: Definition<A>,
    supervisor: Rc<dyn Supervisor>,
    strategy: SupervisionStrategy,
  ) -> Rc<Self> {
    let mailbox = Mailbox::new(definition.mailbox_config);
    let actor = definition.instantiate();
    Rc::new(Self {
      stage,
      address,
      parent,
      definition,
      actor: RefCell::new(actor),
      mailbox,
      supervisor,
      strategy,
      restart_record: RefCell::new(RestartRecord::fresh()),
      children: RefCell::new(HashSet::new()),
      state: Cell::new(CellState::Constructed),
      execution_context: Rc::new(RefCell::new(ExecutionContext::new())),
      proxy_cache: OnceCell::new(),
    })
  }

  pub fn address(&self) -> &Address {
    &self.address
  }

  pub fn mailbox(&self) -> &Mailbox<A> {
    &self.mailbox
  }

  pub fn state(&self) -> CellState {
    self.state.get()
  }

  pub fn is_stopped(&self) -> bool {
    matches!(self.state.get(), CellState::Stopped)
  }

  pub fn add_child(&self, child: Address) {
    self.children.borrow_mut().insert(child);
  }

  pub fn remove_child(&self, child: &Address) {
    self.children.borrow_mut().remove(child);
  }

  pub fn context(&self) -> Context<A> {
    Context {
      address: self.address.clone(),
      parent: self.parent.clone(),
      stage: self.stage.clone(),
      execution_context: self.execution_context.clone(),
      _marker: std::marker::PhantomData,
    }
  }

  /// Interned per-cell `Proxy` so repeated lookups yield equal handles.
  pub fn proxy(self: &Rc<Self>) -> Proxy<A> {
    self.proxy_cache.get_or_init(|| Proxy::new(self.clone())).clone()
  }

  /// Runs `before_start` and flips the cell to `Running`. Until this
  /// completes, `send()` still admits and queues messages — they are just
  /// not dispatched yet, so `before_start` always finishes before the
  /// actor sees its first message.
  pub(crate) fn start(self: &Rc<Self>) {
    self.state.set(CellState::Starting);
    let cell = self.clone();
    tokio::task::spawn_local(async move {
      let ctx = cell.context();
      {
        let mut actor = cell.actor.borrow_mut();
        if let Err(error) = actor.before_start(&ctx).await {
          log::error!("before_start hook failed for {}: {}", cell.address, error);
        }
      }
      cell.state.set(CellState::Running);
      if !cell.mailbox.is_empty() && cell.mailbox.try_acquire_dispatch_slot() {
        tokio::task::spawn_local(crate::dispatch::drain(cell));
      }
    });
  }

  /// Enqueues `envelope`, starting the drain loop (via `spawn_local`) if
  /// nothing else is already draining this mailbox. A cell that hasn't
  /// finished `before_start` yet still admits the message; it just won't
  /// be drained until `start()`'s task flips the state to `Running`.
  pub fn send(self: &Rc<Self>, envelope: Envelope<A>) {
    if self.is_stopped() {
      envelope.reject(ActorError::Stopped);
      self.stage.dead_letters().publish(
        self.address.clone(),
        crate::message::MessageDescriptor { method: "<stopped>", sender: None },
        crate::dead_letters::DeadLetterReason::ActorStopped,
      );
      return;
    }
    match self.mailbox.enqueue(envelope) {
      crate::mailbox::EnqueueOutcome::Enqueued => {}
      crate::mailbox::EnqueueOutcome::EnqueuedWithEviction(dropped, reason) => {
        let descriptor: crate::message::MessageDescriptor = (&dropped).into();
        dropped.reject(ActorError::failure("dropped"));
        self.stage.dead_letters().publish(self.address.clone(), descriptor, reason);
      }
      crate::mailbox::EnqueueOutcome::Rejected(rejected, error, reason) => {
        let descriptor: crate::message::MessageDescriptor = (&rejected).into();
        rejected.reject(error);
        self.stage.dead_letters().publish(self.address.clone(), descriptor, reason);
        return;
      }
    }
    if self.state.get() == CellState::Running && self.mailbox.try_acquire_dispatch_slot() {
      let cell = self.clone();
      tokio::task::spawn_local(async move {
        crate::dispatch::drain(cell).await;
      });
    }
  }
}

impl<A: Actor> AnyCell for ActorCell<A> {
  fn address(&self) -> &Address {
    &self.address
  }

  fn type_name(&self) -> &'static str {
    self.definition.type_name
  }

  fn is_stopped(&self) -> bool {
    ActorCell::is_stopped(self)
  }

  fn parent(&self) -> Option<Address> {
    self.parent.clone()
  }

  fn children(&self) -> Vec<Address> {
    self.children.borrow().iter().cloned().collect()
  }

  fn add_child(&self, child: Address) {
    ActorCell::add_child(self, child);
  }

  fn remove_child(&self, child: &Address) {
    ActorCell::remove_child(self, child);
  }

  fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
    self
  }

  fn stop(self: Rc<Self>) -> LocalBoxFuture<'static, ()> {
    Box::pin(async move { crate::dispatch::stop_sequence(self).await })
  }

  fn apply_directive(self: Rc<Self>, directive: Directive, error: ActorError) -> LocalBoxFuture<'static, ()> {
    Box::pin(async move { crate::dispatch::apply_directive_to_self(self, directive, error).await })
  }

  fn escalate_for_child(self: Rc<Self>, child: Address, error: ActorError) -> LocalBoxFuture<'static, Directive> {
    Box::pin(async move {
      let directive = self.supervisor.decide(&child, &error, &RestartRecord::fresh(), &self.strategy);
      if directive == Directive::Escalate {
        match self.parent.clone().and_then(|p| self.stage.directory().get_any(&p)) {
          Some(parent_cell) => parent_cell.escalate_for_child(self.address.clone(), error).await,
          None => Directive::Restart,
        }
      } else {
        directive
      }
    })
  }
}
