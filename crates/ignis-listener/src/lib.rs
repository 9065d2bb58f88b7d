//! Shared-socket listener pool with fake-close semantics.
//!
//! Builds on `spark-transport-tcp`'s idiom of wrapping `tokio::net`
//! listeners and mapping `std::io::Error` into a structured error, adding
//! the refcounted sharing and per-wrapper close that lets a new
//! configuration generation adopt a predecessor's socket without a bind
//! gap.

mod error;
mod handle;
mod key;
mod tcp;
mod udp;

pub use error::ListenerError;
pub use handle::ListenerPoolHandle;
pub use key::{ListenKey, Network};
pub use tcp::{FakeCloseListener, KeepAlive, ListenerPool};
pub use udp::{DatagramPool, FakeCloseDatagram};
