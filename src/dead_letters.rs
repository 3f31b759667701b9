use std::cell::RefCell;
use std::rc::Rc;

use crate::address::Address;
use crate::message::MessageDescriptor;

/// Why a message ended up in [`DeadLetters`] instead of being delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterReason {
  ActorStopped,
  MailboxFull,
  DroppedOldest,
  DroppedNewest,
  MailboxClosed,
}

impl std::fmt::Display for DeadLetterReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      DeadLetterReason::ActorStopped => "actor stopped",
      DeadLetterReason::MailboxFull => "mailbox full",
      DeadLetterReason::DroppedOldest => "dropped (oldest, overflow)",
      DeadLetterReason::DroppedNewest => "dropped (newest, overflow)",
      DeadLetterReason::MailboxClosed => "mailbox closed",
    };
    write!(f, "{}", s)
  }
}

/// A record of one undeliverable message.
#[derive(Debug, Clone)]
pub struct DeadLetterRecord {
  pub address: Address,
  pub descriptor: MessageDescriptor,
  pub reason: DeadLetterReason,
}

/// Receives [`DeadLetterRecord`]s. Subscription is synchronous: a slow
/// listener delays the producer — fan-out is not buffered or backgrounded.
pub trait DeadLetterListener {
  fn on_dead_letter(&self, record: &DeadLetterRecord);
}

impl<F: Fn(&DeadLetterRecord)> DeadLetterListener for F {
  fn on_dead_letter(&self, record: &DeadLetterRecord) {
    (self)(record)
  }
}

/// Fan-out sink for undeliverable messages. One instance is owned by the
/// [`Stage`](crate::stage::Stage) and shared (via `Rc`) with every mailbox.
#[derive(Clone, Default)]
pub struct DeadLetters {
  listeners: Rc<RefCell<Vec<(u64, Rc<dyn DeadLetterListener>)>>>,
  next_id: Rc<RefCell<u64>>,
}

impl DeadLetters {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns a subscription id usable with [`DeadLetters::unsubscribe`].
  pub fn subscribe(&self, listener: Rc<dyn DeadLetterListener>) -> u64 {
    let mut next_id = self.next_id.borrow_mut();
    let id = *next_id;
    *next_id += 1;
    self.listeners.borrow_mut().push((id, listener));
    id
  }

  /// Returns whether a listener with that id was present.
  pub fn unsubscribe(&self, id: u64) -> bool {
    let mut listeners = self.listeners.borrow_mut();
    let before = listeners.len();
    listeners.retain(|(existing, _)| *existing != id);
    listeners.len() != before
  }

  pub fn publish(&self, address: Address, descriptor: MessageDescriptor, reason: DeadLetterReason) {
    let record = DeadLetterRecord { address, descriptor, reason };
    log::debug!(
      "dead letter: address={} method={} reason={}",
      record.address, record.descriptor.method, record.reason
    );
    for (_, listener) in self.listeners.borrow().iter() {
      listener.on_dead_letter(&record);
    }
  }

  pub fn subscriber_count(&self) -> usize {
    self.listeners.borrow().len()
  }
}

impl std::fmt::Debug for DeadLetters {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DeadLetters")
      .field("subscriber_count", &self.subscriber_count())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;

  #[test]
  fn every_publish_reaches_every_subscriber() {
    let dead_letters = DeadLetters::new();
    let count = Rc::new(Cell::new(0));
    let count_clone = count.clone();
    dead_letters.subscribe(Rc::new(move |_: &DeadLetterRecord| {
      count_clone.set(count_clone.get() + 1);
    }));

    dead_letters.publish(
      Address::new_sequential(),
      MessageDescriptor { method: "increment", sender: None },
      DeadLetterReason::ActorStopped,
    );
    dead_letters.publish(
      Address::new_sequential(),
      MessageDescriptor { method: "get_value", sender: None },
      DeadLetterReason::MailboxFull,
    );

    assert_eq!(count.get(), 2);
  }

  #[test]
  fn unsubscribe_stops_delivery_and_reports_membership() {
    let dead_letters = DeadLetters::new();
    let count = Rc::new(Cell::new(0));
    let count_clone = count.clone();
    let id = dead_letters.subscribe(Rc::new(move |_: &DeadLetterRecord| {
      count_clone.set(count_clone.get() + 1);
    }));

    assert!(dead_letters.unsubscribe(id));
    assert!(!dead_letters.unsubscribe(id));

    dead_letters.publish(
      Address::new_sequential(),
      MessageDescriptor { method: "increment", sender: None },
      DeadLetterReason::ActorStopped,
    );
    assert_eq!(count.get(), 0);
  }
}
