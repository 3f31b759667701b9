//! The root of an actor hierarchy: owns the Directory, the Scheduler, the
//! dead-letter sink, and two root guardians — one for user-spawned actors,
//! one for actors the runtime itself might need (scheduling helpers,
//! future supervision machinery). Both guardians run [`DefaultSupervisor`]
//! with an unlimited strategy, so `Escalate` bottoming out at either of
//! them is always absorbed as a restart.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::address::Address;
use crate::cell::ActorCell;
use crate::context::Actor;
use crate::dead_letters::DeadLetters;
use crate::definition::Definition;
use crate::directory::{Directory, DirectoryConfig};
use crate::future::ActorFuture;
use crate::logger::Logger;
use crate::proxy::Proxy;
use crate::scheduler::Scheduler;
use crate::supervisor::{DefaultSupervisor, Supervisor, SupervisionStrategy};

/// Construction knobs for a [`Stage`]. `Default` gives the Directory its
/// own default shard count.
#[derive(Clone)]
pub struct StageConfig {
  pub directory: DirectoryConfig,
}

impl Default for StageConfig {
  fn default() -> Self {
    Self { directory: DirectoryConfig::default() }
  }
}

/// A no-op actor used only to give the two root guardians an address and
/// a children set to hang user/system actors off of. Never handles a
/// message directly.
struct Guardian;

#[async_trait::async_trait(?Send)]
impl Actor for Guardian {}

struct StageInner {
  directory: Directory,
  scheduler: Scheduler,
  dead_letters: DeadLetters,
  supervisors: RefCell<HashMap<String, (Rc<dyn Supervisor>, SupervisionStrategy)>>,
  public_root: Address,
  private_root: Address,
}

/// Cheaply-cloned handle to a running actor hierarchy.
#[derive(Clone)]
pub struct Stage(Rc<StageInner>);

impl Stage {
  pub fn new(config: StageConfig) -> Self {
    let directory = Directory::new(config.directory);
    let scheduler = Scheduler::new();
    let dead_letters = DeadLetters::new();
    let public_root = Address::new_ulid();
    let private_root = Address::new_ulid();

    let stage = Self(Rc::new(StageInner {
      directory,
      scheduler,
      dead_letters,
      supervisors: RefCell::new(HashMap::new()),
      public_root: public_root.clone(),
      private_root: private_root.clone(),
    }));

    stage.spawn_guardian(public_root, "stagecraft/user");
    stage.spawn_guardian(private_root, "stagecraft/system");
    stage
  }

  /// Registers and starts a root guardian at a pre-chosen address. Split
  /// out from `new` because the guardian's cell needs a real `Stage`
  /// handle to hold — which only exists once `self` is built.
  fn spawn_guardian(&self, address: Address, type_name: &'static str) {
    let definition = Definition::new(type_name, || Guardian).with_address(address.clone());
    let cell = ActorCell::new(self.clone(), address.clone(), None, definition, Rc::new(DefaultSupervisor), SupervisionStrategy::unlimited());
    self.0.directory.register(address, cell.clone()).expect("fresh ULID cannot collide");
    cell.start();
  }

  pub fn directory(&self) -> &Directory {
    &self.0.directory
  }

  pub fn scheduler(&self) -> Scheduler {
    self.0.scheduler.clone()
  }

  pub fn dead_letters(&self) -> DeadLetters {
    self.0.dead_letters.clone()
  }

  pub fn logger(&self) -> Logger {
    Logger
  }

  pub fn public_root(&self) -> &Address {
    &self.0.public_root
  }

  pub fn private_root(&self) -> &Address {
    &self.0.private_root
  }

  /// Registers a named supervisor + strategy pair, selectable later from
  /// `actor_for`/`child_actor_for` by key.
  pub fn register_supervisor(&self, key: impl Into<String>, supervisor: Rc<dyn Supervisor>, strategy: SupervisionStrategy) {
    self.0.supervisors.borrow_mut().insert(key.into(), (supervisor, strategy));
  }

  /// Spawns `definition` under the public root guardian.
  pub fn actor_for<A: Actor>(&self, definition: Definition<A>, supervisor_key: Option<&str>) -> Proxy<A> {
    let public_root = self.0.public_root.clone();
    self.spawn_actor(Some(public_root), definition, supervisor_key)
  }

  /// Looks up a live actor by address. Returns `None` both when nothing is
  /// registered there and when the address resolves to a cell of a
  /// different actor type than `A`.
  pub fn actor_of<A: Actor>(&self, address: &Address) -> Option<Proxy<A>> {
    self.0.directory.get_typed::<A>(address)
  }

  /// Spawns `definition` as a child of `parent` (used by
  /// `Context::child_actor_for`).
  pub(crate) fn spawn_child<C: Actor>(&self, parent: Address, definition: Definition<C>, supervisor_key: Option<&str>) -> Proxy<C> {
    self.spawn_actor(Some(parent), definition, supervisor_key)
  }

  fn spawn_actor<A: Actor>(&self, parent: Option<Address>, definition: Definition<A>, supervisor_key: Option<&str>) -> Proxy<A> {
    let (supervisor, strategy) = match supervisor_key {
      Some(key) => self
        .0
        .supervisors
        .borrow()
        .get(key)
        .cloned()
        .unwrap_or_else(|| (Rc::new(DefaultSupervisor) as Rc<dyn Supervisor>, SupervisionStrategy::default())),
      None => (Rc::new(DefaultSupervisor) as Rc<dyn Supervisor>, SupervisionStrategy::default()),
    };

    let address = definition.address.clone().unwrap_or_else(Address::new_ulid);
    let cell = ActorCell::new(self.clone(), address.clone(), parent.clone(), definition, supervisor, strategy);
    self.0.directory.register(address.clone(), cell.clone()).expect("address collision on spawn");

    if let Some(parent_address) = &parent {
      if let Some(parent_cell) = self.0.directory.get_any(parent_address) {
        parent_cell.add_child(address.clone());
      }
    }

    cell.start();
    cell.proxy()
  }

  /// Looks up `address` and runs its full stop sequence. A missing or
  /// already-stopped address resolves immediately — stopping something
  /// that's already gone is not an error.
  pub async fn stop_actor(&self, address: &Address) -> ActorFuture<()> {
    let (resolver, future) = ActorFuture::pending();
    match self.0.directory.get_any(address) {
      Some(cell) => {
        tokio::task::spawn_local(async move {
          cell.stop().await;
          resolver.fulfill(());
        });
      }
      None => resolver.fulfill(()),
    }
    future
  }

  /// Shuts the whole hierarchy down: the public root first (so
  /// user-spawned actors finish before system actors do), then the
  /// private root, then the scheduler. Safe to call more than once — the
  /// stop sequence and the scheduler's `close` are both idempotent.
  pub async fn close(&self) {
    if let Some(cell) = self.0.directory.get_any(&self.0.public_root) {
      cell.stop().await;
    }
    if let Some(cell) = self.0.directory.get_any(&self.0.private_root) {
      cell.stop().await;
    }
    self.0.scheduler.close();
  }
}

#[cfg(test)]
mod scenario_tests {
  use super::*;
  use crate::dead_letters::DeadLetterRecord;
  use crate::error::ActorError;
  use crate::mailbox::{MailboxConfig, OverflowPolicy};
  use crate::proxy::Proxy;
  use crate::supervisor::{Directive, RestartRecord, Supervisor, SupervisionScope};
  use futures::FutureExt;
  use std::cell::{Cell, RefCell};
  use std::time::Duration;

  struct Counter {
    value: i64,
    hooks: Rc<HookCounts>,
  }

  #[derive(Default)]
  struct HookCounts {
    before_restart: Cell<u32>,
    after_restart: Cell<u32>,
  }

  #[async_trait::async_trait(?Send)]
  impl Actor for Counter {
    async fn before_restart(&mut self, _ctx: &crate::context::Context<Self>, _error: &ActorError) -> Result<(), ActorError> {
      self.hooks.before_restart.set(self.hooks.before_restart.get() + 1);
      Ok(())
    }

    async fn after_restart(&mut self, _ctx: &crate::context::Context<Self>, _error: &ActorError) -> Result<(), ActorError> {
      self.hooks.after_restart.set(self.hooks.after_restart.get() + 1);
      Ok(())
    }
  }

  fn increment(proxy: &Proxy<Counter>) {
    proxy.tell("increment", |actor: &mut Counter| {
      actor.value += 1;
      async { Ok(()) }.boxed_local()
    });
  }

  fn fail(proxy: &Proxy<Counter>) {
    proxy.tell("fail", |_actor: &mut Counter| -> futures::future::LocalBoxFuture<'static, Result<(), ActorError>> {
      async { Err(ActorError::failure("value error")) }.boxed_local()
    });
  }

  async fn get_value(proxy: &Proxy<Counter>) -> i64 {
    proxy
      .ask("get_value", |actor: &mut Counter| {
        let value = actor.value;
        async move { Ok(value) }.boxed_local()
      })
      .await
      .expect("get_value never fails")
  }

  #[tokio::test(flavor = "current_thread")]
  async fn s1_counter_fifo() {
    tokio::task::LocalSet::new()
      .run_until(async {
        let stage = Stage::new(StageConfig::default());
        let hooks = Rc::new(HookCounts::default());
        let proxy = stage.actor_for(Definition::new("counter", move || Counter { value: 0, hooks: hooks.clone() }), None);

        increment(&proxy);
        increment(&proxy);
        increment(&proxy);
        assert_eq!(get_value(&proxy).await, 3);
      })
      .await;
  }

  #[tokio::test(flavor = "current_thread")]
  async fn s2_restart_resets_state() {
    tokio::task::LocalSet::new()
      .run_until(async {
        let stage = Stage::new(StageConfig::default());
        stage.register_supervisor("restart-on-failure", Rc::new(RestartOnFailure), SupervisionStrategy::unlimited());
        let hooks = Rc::new(HookCounts::default());
        let hooks_for_actor = hooks.clone();
        let proxy = stage.actor_for(
          Definition::new("counter", move || Counter { value: 0, hooks: hooks_for_actor.clone() }),
          Some("restart-on-failure"),
        );

        increment(&proxy);
        increment(&proxy);
        fail(&proxy);
        assert_eq!(get_value(&proxy).await, 0);
        assert_eq!(hooks.before_restart.get(), 1);
        assert_eq!(hooks.after_restart.get(), 1);
      })
      .await;
  }

  #[tokio::test(flavor = "current_thread")]
  async fn s3_resume_preserves_state() {
    tokio::task::LocalSet::new()
      .run_until(async {
        let stage = Stage::new(StageConfig::default());
        stage.register_supervisor("resume-on-failure", Rc::new(crate::supervisor::ResumingSupervisor), SupervisionStrategy::unlimited());
        let hooks = Rc::new(HookCounts::default());
        let proxy = stage.actor_for(
          Definition::new("counter", move || Counter { value: 0, hooks: hooks.clone() }),
          Some("resume-on-failure"),
        );

        increment(&proxy);
        increment(&proxy);
        fail(&proxy);
        assert_eq!(get_value(&proxy).await, 2);
      })
      .await;
  }

  #[derive(Debug, Clone, Copy, Default)]
  struct RestartOnFailure;

  impl Supervisor for RestartOnFailure {
    fn decide(&self, _address: &Address, _error: &ActorError, _record: &RestartRecord, _strategy: &SupervisionStrategy) -> Directive {
      Directive::Restart
    }
  }

  #[derive(Debug, Default)]
  struct RecordingSupervisor {
    calls: Rc<Cell<u32>>,
    last_message: Rc<RefCell<Option<String>>>,
  }

  impl Supervisor for RecordingSupervisor {
    fn decide(&self, _address: &Address, error: &ActorError, _record: &RestartRecord, _strategy: &SupervisionStrategy) -> Directive {
      self.calls.set(self.calls.get() + 1);
      *self.last_message.borrow_mut() = Some(error.to_string());
      Directive::Restart
    }
  }

  struct Parent;
  #[async_trait::async_trait(?Send)]
  impl Actor for Parent {}

  #[tokio::test(flavor = "current_thread")]
  async fn s4_intensity_escalation_reaches_parent() {
    tokio::task::LocalSet::new()
      .run_until(async {
        let stage = Stage::new(StageConfig::default());

        let parent_calls = Rc::new(Cell::new(0));
        let parent_last_message = Rc::new(RefCell::new(None));
        let parent_supervisor = RecordingSupervisor { calls: parent_calls.clone(), last_message: parent_last_message.clone() };
        stage.register_supervisor("parent-sup", Rc::new(parent_supervisor), SupervisionStrategy::unlimited());
        let parent = stage.actor_for(Definition::new("parent", || Parent), Some("parent-sup"));

        stage.register_supervisor(
          "child-sup",
          Rc::new(RestartOnFailure),
          SupervisionStrategy::bounded(2, Duration::from_secs(1), SupervisionScope::OneForOne),
        );
        let hooks = Rc::new(HookCounts::default());
        let child: Proxy<Counter> = stage.spawn_child(
          parent.address().clone(),
          Definition::new("counter", move || Counter { value: 0, hooks: hooks.clone() }),
          Some("child-sup"),
        );

        for _ in 0..3 {
          fail(&child);
          let _ = get_value(&child).await;
        }

        assert_eq!(parent_calls.get(), 1, "only the 3rd failure should escalate past max_restarts=2");
        assert_eq!(parent_last_message.borrow().as_deref(), Some("value error"));
      })
      .await;
  }

  struct Recorder {
    log: Rc<RefCell<Vec<&'static str>>>,
  }
  #[async_trait::async_trait(?Send)]
  impl Actor for Recorder {}

  #[tokio::test(flavor = "current_thread")]
  async fn s5_bounded_drop_oldest() {
    tokio::task::LocalSet::new()
      .run_until(async {
        let stage = Stage::new(StageConfig::default());
        let log = Rc::new(RefCell::new(Vec::new()));
        let dropped_reasons = Rc::new(RefCell::new(Vec::new()));
        let dropped_reasons_for_listener = dropped_reasons.clone();
        stage.dead_letters().subscribe(Rc::new(move |record: &DeadLetterRecord| {
          dropped_reasons_for_listener.borrow_mut().push(record.reason.clone());
        }));

        let definition = Definition::new("recorder", {
          let log = log.clone();
          move || Recorder { log: log.clone() }
        })
        .with_mailbox(MailboxConfig::bounded(2, OverflowPolicy::DropOldest));
        let proxy = stage.actor_for(definition, None);

        proxy.mailbox().suspend();

        let record = |tag: &'static str| {
          proxy.ask("record", move |actor: &mut Recorder| {
            actor.log.borrow_mut().push(tag);
            async { Ok(()) }.boxed_local()
          })
        };

        let f1 = record("m1");
        let f2 = record("m2");
        let f3 = record("m3");
        let f4 = record("m4");

        proxy.mailbox().resume();
        proxy.kick_dispatch();

        assert!(matches!(f1.await, Err(ActorError::Failure { .. })));
        assert!(matches!(f2.await, Err(ActorError::Failure { .. })));
        assert!(f3.await.is_ok());
        assert!(f4.await.is_ok());

        assert_eq!(*log.borrow(), vec!["m3", "m4"]);
        assert_eq!(
          *dropped_reasons.borrow(),
          vec![crate::dead_letters::DeadLetterReason::DroppedOldest, crate::dead_letters::DeadLetterReason::DroppedOldest]
        );
      })
      .await;
  }

  struct Tracker {
    tag: &'static str,
    log: Rc<RefCell<Vec<String>>>,
  }

  #[async_trait::async_trait(?Send)]
  impl Actor for Tracker {
    async fn before_stop(&mut self, _ctx: &crate::context::Context<Self>) -> Result<(), ActorError> {
      self.log.borrow_mut().push(format!("{}:before_stop", self.tag));
      Ok(())
    }

    async fn after_stop(&mut self, _ctx: &crate::context::Context<Self>) -> Result<(), ActorError> {
      self.log.borrow_mut().push(format!("{}:after_stop", self.tag));
      Ok(())
    }
  }

  #[tokio::test(flavor = "current_thread")]
  async fn s6_hierarchical_shutdown_stops_children_before_parent() {
    tokio::task::LocalSet::new()
      .run_until(async {
        let stage = Stage::new(StageConfig::default());
        let log = Rc::new(RefCell::new(Vec::new()));

        let parent = stage.actor_for(
          Definition::new("p", {
            let log = log.clone();
            move || Tracker { tag: "P", log: log.clone() }
          }),
          None,
        );
        let _c1 = stage.spawn_child(
          parent.address().clone(),
          Definition::new("c1", {
            let log = log.clone();
            move || Tracker { tag: "C1", log: log.clone() }
          }),
          None,
        );
        let _c2 = stage.spawn_child(
          parent.address().clone(),
          Definition::new("c2", {
            let log = log.clone();
            move || Tracker { tag: "C2", log: log.clone() }
          }),
          None,
        );

        stage.close().await;

        let log = log.borrow();
        let index_of = |needle: &str| log.iter().position(|entry| entry == needle).unwrap_or_else(|| panic!("missing {needle}"));

        let c1_before = index_of("C1:before_stop");
        let c1_after = index_of("C1:after_stop");
        let c2_before = index_of("C2:before_stop");
        let c2_after = index_of("C2:after_stop");
        let p_before = index_of("P:before_stop");
        let p_after = index_of("P:after_stop");

        assert!(c1_before < c1_after);
        assert!(c2_before < c2_after);
        assert!(c1_before < p_before, "C1 must stop before P");
        assert!(c2_before < p_before, "C2 must stop before P");
        assert!(p_before < p_after);
      })
      .await;
  }

  #[tokio::test(flavor = "current_thread")]
  async fn restart_stops_children_before_reinstantiating() {
    tokio::task::LocalSet::new()
      .run_until(async {
        let stage = Stage::new(StageConfig::default());
        stage.register_supervisor("restart-on-failure", Rc::new(RestartOnFailure), SupervisionStrategy::unlimited());
        let hooks = Rc::new(HookCounts::default());
        let parent = stage.actor_for(
          Definition::new("counter", move || Counter { value: 0, hooks: hooks.clone() }),
          Some("restart-on-failure"),
        );

        let log = Rc::new(RefCell::new(Vec::new()));
        let child = stage.spawn_child(
          parent.address().clone(),
          Definition::new("c1", {
            let log = log.clone();
            move || Tracker { tag: "C1", log: log.clone() }
          }),
          None,
        );
        let child_address = child.address().clone();

        fail(&parent);
        let _ = get_value(&parent).await;

        assert_eq!(*log.borrow(), vec!["C1:before_stop", "C1:after_stop"]);
        assert!(stage.directory().get_any(&child_address).is_none(), "child must be unregistered once restart stops it");
      })
      .await;
  }
}
