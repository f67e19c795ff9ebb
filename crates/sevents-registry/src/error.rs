/// Errors raised by registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Event names must be non-empty.
    #[error("invalid event name: {name:?}")]
    InvalidName { name: String },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
