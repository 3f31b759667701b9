//! Stateless handle to the crate's logging facade.
//!
//! The `log` crate is already a global, so there's no per-actor state to
//! hold here — `Logger` exists as its own accessor (alongside `scheduler()`
//! and `dead_letters()`) rather than callers reaching for `log::` macros
//! directly.

/// Zero-sized handle returned by `Stage::logger()`, `Proxy::logger()`, and
/// `Context::logger()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

impl Logger {
  pub fn debug(&self, message: impl std::fmt::Display) {
    log::debug!("{}", message);
  }

  pub fn info(&self, message: impl std::fmt::Display) {
    log::info!("{}", message);
  }

  pub fn warn(&self, message: impl std::fmt::Display) {
    log::warn!("{}", message);
  }

  pub fn error(&self, message: impl std::fmt::Display) {
    log::error!("{}", message);
  }
}
