/// Shared error type used across all Switchyard crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// A backend could not be reached or its channel broke mid-call.
    #[error("connection to backend '{backend}' interrupted: {message}")]
    Connection { backend: String, message: String },

    /// A backend connected but its operation catalog could not be loaded.
    #[error("catalog for backend '{backend}': {message}")]
    Catalog { backend: String, message: String },

    /// The decision graph could not be compiled for a tenant.
    #[error("decision graph build failed for tenant '{tenant}': {message}")]
    GraphBuild { tenant: String, message: String },

    /// An operation name has no owning connection for this tenant.
    #[error("operation '{operation}' is not registered for tenant '{tenant}'")]
    OperationNotFound { tenant: String, operation: String },

    /// A backend was removed recently and is still in its cooldown window.
    #[error("backend '{backend}' was removed {elapsed_secs}s ago; cooldown of {cooldown_secs}s still active")]
    CooldownActive {
        backend: String,
        elapsed_secs: u64,
        cooldown_secs: u64,
    },

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error indicates the owning connection is gone and a
    /// rebuild-and-retry is worth attempting.
    pub fn is_connection_interrupted(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
