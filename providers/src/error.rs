use models::{ClientError, ClientResult};

/// A trait that makes it possible to convert provider SDK errors to
/// `ClientError` using a familiar `context` function.
pub(crate) trait IntoClientError<T> {
    /// Wraps `self` as a `ClientError::Api` naming the provider operation.
    fn context(self, operation: &'static str) -> ClientResult<T>;
}

impl<T, E> IntoClientError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, operation: &'static str) -> ClientResult<T> {
        self.map_err(|err| ClientError::Api {
            operation: operation.to_string(),
            source: Box::new(err),
        })
    }
}
