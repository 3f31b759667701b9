use std::cell::RefCell;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::address::Address;
use crate::error::ActorError;
use crate::future::Resolver;

/// A deliverable unit: a closure over the actor instance plus enough
/// metadata to describe and, if necessary, reject it without ever running
/// it. The mailbox and dispatch loop only ever see `Envelope<A>` — the
/// result type `R` of the call that produced it is erased at construction
/// time (see [`Envelope::new`]), so a homogeneous `VecDeque<Envelope<A>>`
/// can hold calls with arbitrarily different return types.
pub struct Envelope<A> {
  invoke: Box<dyn FnOnce(&mut A) -> LocalBoxFuture<'static, Result<(), ActorError>>>,
  reject: Box<dyn FnOnce(ActorError)>,
  descriptor: &'static str,
  sender_hint: Option<Address>,
}

impl<A> Envelope<A> {
  /// Builds an envelope from a typed call and the resolver for its result.
  /// Exactly one of "deliver" or "reject" ever runs for a given envelope;
  /// both close over the same resolver slot so whichever runs first wins.
  pub fn new<R: 'static>(
    descriptor: &'static str,
    sender_hint: Option<Address>,
    resolver: Resolver<R>,
    call: impl FnOnce(&mut A) -> LocalBoxFuture<'static, Result<R, ActorError>> + 'static,
  ) -> Self {
    let resolver_slot = Rc::new(RefCell::new(Some(resolver)));
    let invoke_slot = resolver_slot.clone();
    let invoke = move |actor: &mut A| -> LocalBoxFuture<'static, Result<(), ActorError>> {
      let result_future = call(actor);
      Box::pin(async move {
        let result = result_future.await;
        let outcome = match &result {
          Ok(_) => Ok(()),
          Err(error) => Err(error.clone()),
        };
        if let Some(resolver) = invoke_slot.borrow_mut().take() {
          resolver.resolve(result);
        }
        outcome
      })
    };
    let reject = move |error: ActorError| {
      if let Some(resolver) = resolver_slot.borrow_mut().take() {
        resolver.reject(error);
      }
    };
    Self { invoke: Box::new(invoke), reject: Box::new(reject), descriptor, sender_hint }
  }

  pub fn descriptor(&self) -> &'static str {
    self.descriptor
  }

  pub fn sender_hint(&self) -> Option<&Address> {
    self.sender_hint.as_ref()
  }

  /// Consumes the envelope, running its closure against the actor instance.
  /// The `Result` reflects whether the handler itself failed — used by the
  /// dispatch loop to decide whether supervision needs to run — independent
  /// of whatever value or error the caller's own future was resolved with.
  pub async fn deliver(self, actor: &mut A) -> Result<(), ActorError> {
    (self.invoke)(actor).await
  }

  /// Consumes the envelope without ever touching the actor, rejecting its
  /// future with `error`. Used by the mailbox and stop sequence for
  /// messages that can never be delivered.
  pub fn reject(self, error: ActorError) {
    (self.reject)(error)
  }
}

impl<A> std::fmt::Debug for Envelope<A> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Envelope")
      .field("descriptor", &self.descriptor)
      .field("sender_hint", &self.sender_hint)
      .finish()
  }
}

/// A cheap, descriptive stand-in for an [`Envelope`] once it has been
/// consumed — used for dead-letter records.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
  pub method: &'static str,
  pub sender: Option<Address>,
}

impl<A> From<&Envelope<A>> for MessageDescriptor {
  fn from(envelope: &Envelope<A>) -> Self {
    Self { method: envelope.descriptor, sender: envelope.sender_hint.clone() }
  }
}
