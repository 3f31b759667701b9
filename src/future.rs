use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use tokio::sync::oneshot;

use crate::error::ActorError;

/// The one-shot value or error carrier returned by a proxy call.
///
/// States: pending, then fulfilled(value) or rejected(error); terminal and
/// idempotent — a [`Resolver`] may be used at most once, and awaiting the
/// future again after it has resolved simply yields the same value (the
/// underlying channel enforces both: a dropped sender resolves to
/// [`ActorError::Stopped`], a second send is a programming error the
/// channel silently ignores).
#[derive(Debug)]
pub struct ActorFuture<T> {
  rx: oneshot::Receiver<Result<T, ActorError>>,
}

impl<T> ActorFuture<T> {
  pub(crate) fn new(rx: oneshot::Receiver<Result<T, ActorError>>) -> Self {
    Self { rx }
  }

  /// Builds a pending future/resolver pair. The resolver is handed to the
  /// closure that will eventually run on the actor; the future is returned
  /// to the caller immediately.
  pub fn pending() -> (Resolver<T>, Self) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx: Some(tx) }, Self::new(rx))
  }
}

impl<T> Future for ActorFuture<T> {
  type Output = Result<T, ActorError>;

  fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    match Pin::new(&mut this.rx).poll(cx) {
      Poll::Ready(Ok(result)) => Poll::Ready(result),
      Poll::Ready(Err(_recv_error)) => Poll::Ready(Err(ActorError::Stopped)),
      Poll::Pending => Poll::Pending,
    }
  }
}

/// The write side of an [`ActorFuture`]. Resolution is idempotent: only the
/// first call to `fulfill`/`reject`/`resolve` has any effect, matching the
/// "a resolver may be invoked at most once" invariant.
#[derive(Debug)]
pub struct Resolver<T> {
  tx: Option<oneshot::Sender<Result<T, ActorError>>>,
}

impl<T> Resolver<T> {
  pub fn fulfill(mut self, value: T) {
    if let Some(tx) = self.tx.take() {
      let _ = tx.send(Ok(value));
    }
  }

  pub fn reject(mut self, error: ActorError) {
    if let Some(tx) = self.tx.take() {
      let _ = tx.send(Err(error));
    }
  }

  pub fn resolve(mut self, result: Result<T, ActorError>) {
    if let Some(tx) = self.tx.take() {
      let _ = tx.send(result);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test(flavor = "current_thread")]
  async fn fulfilled_future_resolves_to_value() {
    let (resolver, future) = ActorFuture::pending();
    resolver.fulfill(42u32);
    assert_eq!(future.await.unwrap(), 42);
  }

  #[tokio::test(flavor = "current_thread")]
  async fn rejected_future_resolves_to_error() {
    let (resolver, future) = ActorFuture::<u32>::pending();
    resolver.reject(ActorError::failure("boom"));
    let err = future.await.unwrap_err();
    assert!(matches!(err, ActorError::Failure { .. }));
  }

  #[tokio::test(flavor = "current_thread")]
  async fn dropped_resolver_rejects_as_stopped() {
    let (resolver, future) = ActorFuture::<u32>::pending();
    drop(resolver);
    assert!(matches!(future.await, Err(ActorError::Stopped)));
  }
}
