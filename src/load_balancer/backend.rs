//! Backend pool entries.

use std::fmt;
use std::sync::Arc;

use crate::load_balancer::Handler;
use crate::net::connection::Connection;

/// A registered backend.
pub struct BackendEntry<C> {
    handler: Arc<dyn Handler<C>>,
    /// Reserved for a weighted policy. Always zero; never read by selection.
    weight: u32,
}

impl<C: Connection> BackendEntry<C> {
    /// Wrap a handler with the placeholder weight.
    pub fn new(handler: Arc<dyn Handler<C>>) -> Self {
        Self { handler, weight: 0 }
    }

    /// The handler this entry routes to.
    pub fn handler(&self) -> &Arc<dyn Handler<C>> {
        &self.handler
    }

    /// Reserved weight.
    pub fn weight(&self) -> u32 {
        self.weight
    }
}

impl<C> fmt::Debug for BackendEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendEntry")
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}
