use std::rc::Rc;

use crate::address::Address;
use crate::mailbox::MailboxConfig;

/// A factory that produces one actor instance. Must be callable more than
/// once: `SupervisedWrapper::restart` calls it again to build the fresh
/// instance that replaces the failed one. Construction parameters are
/// captured by the closure itself — the runtime never sees them directly.
pub type Instantiator<A> = Rc<dyn Fn() -> A>;

/// Everything an `ActorCell` needs to exist: a type label for diagnostics,
/// an optional preset address (the Stage generates one if absent), the
/// instantiator, and the mailbox configuration.
pub struct Definition<A> {
  pub type_name: &'static str,
  pub address: Option<Address>,
  pub mailbox_config: MailboxConfig,
  pub instantiator: Instantiator<A>,
}

impl<A> Definition<A> {
  pub fn new(type_name: &'static str, instantiator: impl Fn() -> A + 'static) -> Self {
    Self {
      type_name,
      address: None,
      mailbox_config: MailboxConfig::default(),
      instantiator: Rc::new(instantiator),
    }
  }

  pub fn with_address(mut self, address: Address) -> Self {
    self.address = Some(address);
    self
  }

  pub fn with_mailbox(mut self, mailbox_config: MailboxConfig) -> Self {
    self.mailbox_config = mailbox_config;
    self
  }

  pub fn instantiate(&self) -> A {
    (self.instantiator)()
  }
}

impl<A> Clone for Definition<A> {
  fn clone(&self) -> Self {
    Self {
      type_name: self.type_name,
      address: self.address.clone(),
      mailbox_config: self.mailbox_config,
      instantiator: self.instantiator.clone(),
    }
  }
}
