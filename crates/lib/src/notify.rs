//! Batched change notification.
//!
//! A build request that mutates any output fires each subscribed listener
//! exactly once, after all mutations of the batch are durable. The event
//! carries no payload; consumers re-query whatever state they care about.

/// Listener registry for "output changed" events.
#[derive(Default)]
pub struct ChangeBus {
  listeners: Vec<Box<dyn Fn() + Send>>,
}

impl std::fmt::Debug for ChangeBus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ChangeBus").field("listeners", &self.listeners.len()).finish()
  }
}

impl ChangeBus {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a listener. Listeners stay subscribed for the life of the bus.
  pub fn subscribe(&mut self, listener: impl Fn() + Send + 'static) {
    self.listeners.push(Box::new(listener));
  }

  /// Fire the event once to every listener.
  pub(crate) fn fire(&self) {
    for listener in &self.listeners {
      listener();
    }
  }
}
