//! Admin config store: a path-addressed JSON tree reachable over
//! HTTP, mutated through the object-parent / sequence-parent matrix, and
//! wired so every successful mutation triggers a `Supervisor::load` of
//! the resulting config. Builds directly on `ignis-supervisor`'s
//! `IdIndex`/`JsonPath`/`PathSegment`, which are already generic over any
//! `serde_json::Value` tree -- the admin tree just runs that machinery
//! over a different root (`{"config": ...}` rather than the supervisor's
//! unwrapped config) rather than redefining it.

mod error;
mod path;
mod store;

pub mod server;

pub use error::AdminError;
pub use path::AdminPath;
pub use store::{AdminMethod, AdminStore};
