use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::address::Address;
use crate::dead_letters::{DeadLetterReason, DeadLetters};
use crate::error::ActorError;
use crate::message::{Envelope, MessageDescriptor};

/// What a bounded mailbox does when a send arrives while it is full. This
/// policy is applied regardless of suspension — a suspended-but-full
/// bounded mailbox still drops/rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
  /// Discard the oldest queued message (to dead letters), enqueue the new one.
  DropOldest,
  /// Discard the incoming message (to dead letters), leave the queue untouched.
  DropNewest,
  /// Refuse the incoming message: dead-letter it and reject the caller's future.
  Reject,
}

#[derive(Debug, Clone, Copy)]
pub enum MailboxKind {
  Unbounded,
  Bounded { capacity: usize, overflow_policy: OverflowPolicy },
}

/// Mailbox configuration: kind, and — for bounded mailboxes — capacity and
/// overflow policy. A single overflow policy applies per instance.
#[derive(Debug, Clone, Copy)]
pub struct MailboxConfig {
  pub kind: MailboxKind,
}

impl Default for MailboxConfig {
  fn default() -> Self {
    Self { kind: MailboxKind::Unbounded }
  }
}

impl MailboxConfig {
  pub fn unbounded() -> Self {
    Self::default()
  }

  pub fn bounded(capacity: usize, overflow_policy: OverflowPolicy) -> Self {
    Self { kind: MailboxKind::Bounded { capacity, overflow_policy } }
  }
}

/// The result of attempting to enqueue a message.
pub enum EnqueueOutcome<A> {
  /// Queued. Caller should attempt to win the dispatcher slot and drain.
  Enqueued,
  /// Rejected outright: the caller's future must be rejected with this
  /// error and the envelope routed to dead letters (the caller does this —
  /// the mailbox only classifies, it never touches `DeadLetters` itself so
  /// unit tests can exercise the queue in isolation).
  Rejected(Envelope<A>, ActorError, DeadLetterReason),
  /// Enqueued, but the eviction of an older message is bundled along: the
  /// caller must route `dropped` to dead letters.
  EnqueuedWithEviction(Envelope<A>, DeadLetterReason),
}

/// Queue of pending deliveries plus suspend/resume/close state.
///
/// Owned by an `ActorCell`, never by the Directory directly. All state is
/// `Cell`/`RefCell` rather than atomics/locks: a `Stage` is confined to a
/// single `tokio::task::LocalSet`, so nothing here is ever touched from
/// more than one logical place at a time except across `.await` points the
/// dispatcher explicitly yields at.
pub struct Mailbox<A> {
  queue: RefCell<VecDeque<Envelope<A>>>,
  config: MailboxConfig,
  suspended: Cell<bool>,
  closed: Cell<bool>,
  dispatching: Cell<bool>,
}

impl<A> Mailbox<A> {
  pub fn new(config: MailboxConfig) -> Self {
    Self {
      queue: RefCell::new(VecDeque::new()),
      config,
      suspended: Cell::new(false),
      closed: Cell::new(false),
      dispatching: Cell::new(false),
    }
  }

  pub fn config(&self) -> &MailboxConfig {
    &self.config
  }

  pub fn size(&self) -> usize {
    self.queue.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.queue.borrow().is_empty()
  }

  pub fn is_suspended(&self) -> bool {
    self.suspended.get()
  }

  pub fn is_closed(&self) -> bool {
    self.closed.get()
  }

  /// Idempotent. Pauses dispatch at message boundaries; never mid-message.
  pub fn suspend(&self) {
    self.suspended.set(true);
  }

  /// Idempotent. Suspension is boolean, not reference-counted: one
  /// `resume` call always clears it regardless of how many `suspend`
  /// calls preceded it.
  pub fn resume(&self) {
    self.suspended.set(false);
  }

  /// Idempotent; monotonic — once closed, never reopens.
  pub fn close(&self) {
    self.closed.set(true);
  }

  /// Whether a new drain attempt is allowed to start right now.
  pub fn can_dispatch(&self) -> bool {
    !self.suspended.get() && !self.closed.get() && !self.dispatching.get()
  }

  /// Attempts to take the dispatcher slot. Returns `true` if the caller now
  /// owns it and must run the drain loop.
  pub fn try_acquire_dispatch_slot(&self) -> bool {
    if self.suspended.get() || self.closed.get() || self.dispatching.get() {
      false
    } else {
      self.dispatching.set(true);
      true
    }
  }

  pub fn release_dispatch_slot(&self) {
    self.dispatching.set(false);
  }

  pub fn is_dispatching(&self) -> bool {
    self.dispatching.get()
  }

  pub fn pop_front(&self) -> Option<Envelope<A>> {
    self.queue.borrow_mut().pop_front()
  }

  /// Enqueues `envelope` according to this mailbox's kind and, for bounded
  /// mailboxes, its overflow policy. Closed mailboxes always reject.
  pub fn enqueue(&self, envelope: Envelope<A>) -> EnqueueOutcome<A> {
    if self.closed.get() {
      return EnqueueOutcome::Rejected(envelope, ActorError::Stopped, DeadLetterReason::MailboxClosed);
    }
    match self.config.kind {
      MailboxKind::Unbounded => {
        self.queue.borrow_mut().push_back(envelope);
        EnqueueOutcome::Enqueued
      }
      MailboxKind::Bounded { capacity, overflow_policy } => {
        let mut queue = self.queue.borrow_mut();
        if queue.len() < capacity {
          queue.push_back(envelope);
          EnqueueOutcome::Enqueued
        } else {
          match overflow_policy {
            OverflowPolicy::Reject => {
              drop(queue);
              EnqueueOutcome::Rejected(envelope, ActorError::MailboxFull, DeadLetterReason::MailboxFull)
            }
            OverflowPolicy::DropNewest => {
              drop(queue);
              EnqueueOutcome::Rejected(envelope, ActorError::MailboxFull, DeadLetterReason::DroppedNewest)
            }
            OverflowPolicy::DropOldest => {
              let dropped = queue.pop_front().expect("queue at capacity > 0 has a front");
              queue.push_back(envelope);
              EnqueueOutcome::EnqueuedWithEviction(dropped, DeadLetterReason::DroppedOldest)
            }
          }
        }
      }
    }
  }

  /// Drains the queue into dead letters, rejecting every pending future.
  /// Used by the stop sequence's mailbox-close step.
  pub fn drain_to_dead_letters(&self, address: &Address, dead_letters: &DeadLetters) {
    while let Some(envelope) = self.pop_front() {
      let descriptor: MessageDescriptor = (&envelope).into();
      envelope.reject(ActorError::Stopped);
      dead_letters.publish(address.clone(), descriptor, DeadLetterReason::MailboxClosed);
    }
  }
}
