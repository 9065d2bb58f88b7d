use std::any::Any;
use std::sync::Arc;

use ignis_registry::{ModuleHandle, StorageBackend};

/// Wraps the generation's active storage backend so it can be placed into
/// the `Context` under a well-known id (`ignis.storage`) and reached by
/// apps that need to do I/O before they have any other handle on the
/// engine, mirroring how `ListenerPoolHandle` exposes the listener pool.
pub struct StorageHandle(pub Arc<dyn StorageBackend>);

impl ModuleHandle for StorageHandle {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
