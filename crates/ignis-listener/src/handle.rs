use std::any::Any;
use std::sync::Arc;

use ignis_registry::ModuleHandle;

use crate::tcp::ListenerPool;
use crate::udp::DatagramPool;

/// Wraps the process-global listener pool so it can be placed into a
/// [`ignis_loader::Context`] under a well-known id (`ignis.listener_pool`)
/// and reached by apps through the same name-based lookup every other
/// cross-module access uses, rather than threading an `Arc<ListenerPool>`
/// through every app's constructor.
pub struct ListenerPoolHandle {
    pub tcp: Arc<ListenerPool>,
    pub udp: Arc<DatagramPool>,
}

impl ListenerPoolHandle {
    pub fn new(tcp: Arc<ListenerPool>, udp: Arc<DatagramPool>) -> Self {
        Self { tcp, udp }
    }
}

impl ModuleHandle for ListenerPoolHandle {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
