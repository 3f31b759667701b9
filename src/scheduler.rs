use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use tokio::task::JoinHandle;

use crate::error::ActorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
  Once,
  Repeat,
}

struct TaskState {
  cancelled: Rc<Cell<bool>>,
  fired: Rc<Cell<bool>>,
  kind: TaskKind,
  handle: JoinHandle<()>,
}

/// A handle to a scheduled action. `cancel()` prevents any firing that has
/// not yet happened; it is idempotent — only the call that actually
/// prevents something returns `true`.
pub struct Cancellable {
  state: Rc<TaskState>,
}

impl Cancellable {
  /// Returns `true` iff this call is the one that prevented a firing: the
  /// one-shot action had not yet run, or (for repeating actions) further
  /// firings are now prevented. Every subsequent call returns `false`.
  pub fn cancel(&self) -> bool {
    if self.state.cancelled.get() {
      return false;
    }
    match self.state.kind {
      TaskKind::Once if self.state.fired.get() => {
        self.state.cancelled.set(true);
        false
      }
      _ => {
        self.state.cancelled.set(true);
        self.state.handle.abort();
        true
      }
    }
  }

  pub fn is_cancelled(&self) -> bool {
    self.state.cancelled.get()
  }
}

/// One-shot and repeating timed callbacks with cancellation, scoped to a
/// `Stage`. Every scheduled action runs on the same `tokio::task::LocalSet`
/// the Stage drives; errors inside an action are caught and logged — they
/// never terminate the scheduler.
///
/// Cheaply `Clone`: every handle shares the same task table and counters
/// via `Rc`, so cloning a `Scheduler` (as `Stage::scheduler()` does on
/// every call) never duplicates state.
#[derive(Clone)]
pub struct Scheduler {
  tasks: Rc<RefCell<HashMap<u64, Rc<TaskState>>>>,
  next_id: Rc<Cell<u64>>,
  closed: Rc<Cell<bool>>,
}

impl Default for Scheduler {
  fn default() -> Self {
    Self::new()
  }
}

impl Scheduler {
  pub fn new() -> Self {
    Self { tasks: Rc::new(RefCell::new(HashMap::new())), next_id: Rc::new(Cell::new(0)), closed: Rc::new(Cell::new(false)) }
  }

  fn next_id(&self) -> u64 {
    let id = self.next_id.get();
    self.next_id.set(id + 1);
    id
  }

  /// Schedules `action` to run once after `delay`. Not earlier than that —
  /// lateness is bounded only by dispatch load on the executor.
  pub fn schedule_once<F>(&self, delay: Duration, action: F) -> Cancellable
  where
    F: FnOnce() -> LocalBoxFuture<'static, Result<(), ActorError>> + 'static,
  {
    if self.closed.get() {
      log::warn!("schedule_once called on a closed scheduler; action will not run");
    }
    let cancelled = Rc::new(Cell::new(false));
    let fired = Rc::new(Cell::new(false));
    let cancelled_clone = cancelled.clone();
    let fired_clone = fired.clone();

    let handle = tokio::task::spawn_local(async move {
      tokio::time::sleep(delay).await;
      if cancelled_clone.get() {
        return;
      }
      fired_clone.set(true);
      if let Err(error) = action().await {
        log::error!("scheduled one-shot action failed: {error}");
      }
    });

    let state = Rc::new(TaskState { cancelled, fired, kind: TaskKind::Once, handle });
    let id = self.next_id();
    self.tasks.borrow_mut().insert(id, state.clone());
    Cancellable { state }
  }

  /// Schedules `action` to run repeatedly: first after `initial_delay`,
  /// then every `interval` until cancelled or the scheduler closes.
  pub fn schedule_repeat<F>(&self, initial_delay: Duration, interval: Duration, action: F) -> Cancellable
  where
    F: Fn() -> LocalBoxFuture<'static, Result<(), ActorError>> + 'static,
  {
    if self.closed.get() {
      log::warn!("schedule_repeat called on a closed scheduler; action will not run");
    }
    let cancelled = Rc::new(Cell::new(false));
    let fired = Rc::new(Cell::new(false));
    let cancelled_clone = cancelled.clone();
    let fired_clone = fired.clone();

    let handle = tokio::task::spawn_local(async move {
      tokio::time::sleep(initial_delay).await;
      loop {
        if cancelled_clone.get() {
          return;
        }
        fired_clone.set(true);
        if let Err(error) = action().await {
          log::error!("scheduled repeating action failed: {error}");
        }
        tokio::time::sleep(interval).await;
      }
    });

    let state = Rc::new(TaskState { cancelled, fired, kind: TaskKind::Repeat, handle });
    let id = self.next_id();
    self.tasks.borrow_mut().insert(id, state.clone());
    Cancellable { state }
  }

  /// Cancels every outstanding task. Idempotent.
  pub fn close(&self) {
    self.closed.set(true);
    for (_, state) in self.tasks.borrow_mut().drain() {
      state.cancelled.set(true);
      state.handle.abort();
    }
  }

  pub fn outstanding_count(&self) -> usize {
    self.tasks.borrow().len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::FutureExt;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  #[tokio::test(flavor = "current_thread", start_paused = true)]
  async fn one_shot_fires_after_delay() {
    tokio::task::LocalSet::new()
      .run_until(async {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();
        scheduler.schedule_once(Duration::from_millis(50), move || {
          let count = count_clone.clone();
          async move {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
          }
          .boxed_local()
        });
        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
      })
      .await;
  }

  #[tokio::test(flavor = "current_thread", start_paused = true)]
  async fn cancel_before_fire_prevents_the_action() {
    tokio::task::LocalSet::new()
      .run_until(async {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();
        let cancellable = scheduler.schedule_once(Duration::from_millis(50), move || {
          let count = count_clone.clone();
          async move {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
          }
          .boxed_local()
        });
        assert!(cancellable.cancel());
        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
      })
      .await;
  }

  #[tokio::test(flavor = "current_thread", start_paused = true)]
  async fn cancel_after_fire_of_one_shot_returns_false() {
    tokio::task::LocalSet::new()
      .run_until(async {
        let scheduler = Scheduler::new();
        let cancellable = scheduler.schedule_once(Duration::from_millis(10), || {
          async { Ok(()) }.boxed_local()
        });
        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;
        assert!(!cancellable.cancel());
      })
      .await;
  }

  #[tokio::test(flavor = "current_thread")]
  async fn close_cancels_everything_and_is_idempotent() {
    tokio::task::LocalSet::new()
      .run_until(async {
        let scheduler = Scheduler::new();
        scheduler.schedule_once(Duration::from_secs(10), || async { Ok(()) }.boxed_local());
        scheduler.schedule_repeat(Duration::from_secs(10), Duration::from_secs(10), || {
          async { Ok(()) }.boxed_local()
        });
        scheduler.close();
        scheduler.close();
        assert_eq!(scheduler.outstanding_count(), 0);
      })
      .await;
  }
}
