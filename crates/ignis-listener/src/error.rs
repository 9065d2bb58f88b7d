/// Errors from binding or accepting on a shared listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The address could not be parsed or bound.
    #[error("bind {address} failed: {source}")]
    Bind { address: String, source: std::io::Error },

    /// An `accept`/`recv_from` failed for a reason other than the wrapper
    /// being closed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The sentinel returned once a wrapper's `close()` has won the race:
    /// the caller's accept loop should terminate cleanly, not retry.
    #[error("listener closed")]
    Closed,

    /// The usage pool reported a factory or destructor failure while
    /// binding or releasing the shared socket.
    #[error(transparent)]
    Registry(#[from] ignis_registry::RegistryError),
}
