//! `stagecraft` — an in-process actor runtime.
//!
//! Actors are entities with private state mutated only by messages drawn
//! from a per-actor mailbox. Callers talk to actors through [`Proxy`]
//! handles; the runtime takes care of mailbox dispatch, supervision,
//! scheduling, and a sharded address directory.

pub mod address;
pub mod cell;
pub mod context;
pub mod dead_letters;
pub mod definition;
pub(crate) mod dispatch;
pub mod directory;
pub mod error;
pub mod execution_context;
pub mod future;
pub mod logger;
pub mod mailbox;
pub mod message;
pub mod proxy;
pub mod scheduler;
pub mod stage;
pub mod supervised;
pub mod supervisor;

pub use address::Address;
pub use context::{Actor, Context};
pub use dead_letters::{DeadLetterRecord, DeadLetters};
pub use definition::{Definition, Instantiator};
pub use directory::{Directory, DirectoryConfig, DirectoryStats};
pub use error::{ActorError, AdmissionError};
pub use future::ActorFuture;
pub use logger::Logger;
pub use mailbox::{MailboxConfig, OverflowPolicy};
pub use proxy::{AnyProxy, Proxy};
pub use scheduler::{Cancellable, Scheduler};
pub use stage::{Stage, StageConfig};
pub use supervisor::{Directive, DefaultSupervisor, Supervisor, SupervisionScope, SupervisionStrategy};

#[cfg(test)]
#[ctor::ctor]
fn init_test_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}
