//! Bundles the pieces the `ignis-*` crates implement separately --
//! the listener pool, the instance supervisor, and the admin config
//! store -- into one [`Engine`] a binary (or a test) can stand up with a
//! single call.

use std::net::SocketAddr;
use std::sync::Arc;

use ignis_listener::{DatagramPool, ListenerPool};
use ignis_supervisor::{register_builtin_logging_modules, Supervisor};

pub use ignis_admin::{AdminError, AdminStore};
pub use ignis_supervisor::SupervisorError;

/// A fully wired, not-yet-serving engine: the listener pool and supervisor
/// already exist, builtin logging modules are already registered, and an
/// admin tree is ready to accept its first configuration.
pub struct Engine {
    pub supervisor: Arc<Supervisor>,
    pub admin: Arc<AdminStore>,
    /// Kept alongside `supervisor` (which only holds its own clone
    /// internally) so callers -- notably tests asserting refcount
    /// behavior across a reload -- can still reach the pool directly.
    pub listener_pool: Arc<ListenerPool>,
    pub datagram_pool: Arc<DatagramPool>,
}

impl Engine {
    /// A fresh engine with an empty admin tree. Call [`Engine::bootstrap`]
    /// to load an initial configuration and start the first generation.
    pub fn new() -> Self {
        register_builtin_logging_modules();
        let listener_pool = Arc::new(ListenerPool::new());
        let datagram_pool = Arc::new(DatagramPool::new());
        let supervisor = Arc::new(Supervisor::new(Arc::clone(&listener_pool), Arc::clone(&datagram_pool)));
        let admin = Arc::new(AdminStore::new(Arc::clone(&supervisor)));
        Self { supervisor, admin, listener_pool, datagram_pool }
    }

    /// Installs `config` as the admin tree's initial `config` value and
    /// runs the change protocol against it, starting the first
    /// generation.
    pub fn bootstrap(&self, config: serde_json::Value, force_reload: bool) -> Result<(), AdminError> {
        self.admin.bootstrap(config, force_reload)
    }

    /// Serves the admin HTTP API at `addr` until the listener errors or
    /// the process is interrupted.
    pub async fn serve_admin(&self, addr: SocketAddr) -> Result<(), AdminError> {
        ignis_admin::server::serve(Arc::clone(&self.admin), addr).await
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
