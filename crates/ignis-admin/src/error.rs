use crate::path::AdminPath;

/// Errors the admin tree can produce. Every variant
/// here maps to a concrete HTTP status in `server::status_for`.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("no value at /{0}")]
    PathNotFound(AdminPath),

    #[error("/{0} does not hold the kind of value this step can traverse")]
    TypeMismatch(AdminPath),

    #[error("index out of range at /{0}")]
    IndexOutOfRange(AdminPath),

    #[error("PUT requires an absent key, but /{0} is already present")]
    DuplicateKey(AdminPath),

    #[error("PATCH requires an existing key, but /{0} is missing")]
    MissingKey(AdminPath),

    #[error("no object carries @id {0:?}")]
    UnknownId(String),

    #[error("this method requires a request body")]
    MissingBody,

    #[error("malformed JSON body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("method {0} is not one of GET, POST, PUT, PATCH, DELETE")]
    UnsupportedMethod(String),

    #[error("mutating methods require Content-Type: application/json")]
    UnsupportedMediaType,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("config rejected: {0}")]
    Supervisor(#[from] ignis_supervisor::SupervisorError),
}
