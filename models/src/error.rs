use snafu::Snafu;

/// The result type returned by `CloudResourceClient` operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by cloud capability implementations.
///
/// `ResourceNotFound` is a typed condition rather than a provider-specific
/// error string so that callers can make idempotency decisions against it;
/// every other failure is wrapped as `Api` with the provider operation name.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ClientError {
    #[snafu(display("cloud provider call '{}' failed: '{}'", operation, source))]
    Api {
        operation: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("resource '{}' does not exist", name))]
    ResourceNotFound { name: String },

    #[snafu(display(
        "cloud provider returned malformed '{}' response: {}",
        operation,
        reason
    ))]
    Malformed { operation: String, reason: String },
}
