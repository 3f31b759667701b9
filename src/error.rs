use std::sync::Arc;

/// An error raised by a handler while processing a delivered message, or by
/// one of the optional lifecycle hooks. Cheaply `Clone`-able so the same
/// error can be handed to the rejected [`ActorFuture`](crate::future::ActorFuture),
/// the supervisor, and the log line describing the failure.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ActorError {
  #[error("{message}")]
  Failure { message: String },

  #[error("actor stopped")]
  Stopped,

  #[error("mailbox full")]
  MailboxFull,

  #[error(transparent)]
  Custom(Arc<anyhow::Error>),
}

impl ActorError {
  pub fn failure(message: impl Into<String>) -> Self {
    ActorError::Failure { message: message.into() }
  }
}

impl From<anyhow::Error> for ActorError {
  fn from(err: anyhow::Error) -> Self {
    ActorError::Custom(Arc::new(err))
  }
}

impl From<AdmissionError> for ActorError {
  fn from(err: AdmissionError) -> Self {
    match err {
      AdmissionError::Stopped => ActorError::Stopped,
      AdmissionError::MailboxFull => ActorError::MailboxFull,
    }
  }
}

/// A synthetic error produced by the runtime itself (never by user code)
/// when a send cannot be admitted: the target is stopped, or a bounded
/// mailbox under the `Reject` overflow policy is full.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
  #[error("actor stopped")]
  Stopped,
  #[error("mailbox full")]
  MailboxFull,
}
