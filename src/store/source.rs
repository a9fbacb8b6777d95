use async_trait::async_trait;
use futures::future::BoxFuture;

use std::marker::PhantomData;

/// An injected asynchronous data-retrieval operation
///
/// The arguments are opaque to the store and simply threaded through on every
/// poll cycle. Failures are reported through the returned `Result`; the store
/// captures them into the observable state rather than propagating them.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// The argument list threaded through each fetch
    type Args: Clone + Send + Sync + 'static;

    /// The value produced by a successful fetch
    type Output: Clone + Send + Sync + 'static;

    /// Retrieves a fresh value from the external source
    ///
    /// # Arguments
    ///
    /// * `args` - The arguments captured when polling was started
    ///
    /// # Returns
    ///
    /// Result with the fetched value, or the source's error
    async fn fetch(&self, args: &Self::Args) -> anyhow::Result<Self::Output>;
}

/// Adapts a plain async closure into a [`DataSource`]
///
/// Useful when the retrieval operation is a one-off request rather than a
/// type of its own.
pub struct FnSource<A, T, F> {
    fetch_fn: F,
    _marker: PhantomData<fn(A) -> T>,
}

impl<A, T, F> FnSource<A, T, F>
where
    A: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn(A) -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync + 'static,
{
    /// Creates a data source from a closure returning a boxed future
    ///
    /// # Arguments
    ///
    /// * `fetch_fn` - The closure invoked with a clone of the arguments
    ///
    /// # Returns
    ///
    /// A new FnSource instance
    pub fn new(fetch_fn: F) -> Self {
        FnSource {
            fetch_fn,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<A, T, F> DataSource for FnSource<A, T, F>
where
    A: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn(A) -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync + 'static,
{
    type Args = A;
    type Output = T;

    async fn fetch(&self, args: &A) -> anyhow::Result<T> {
        (self.fetch_fn)(args.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[tokio::test]
    async fn test_fn_source_threads_args() {
        let source = FnSource::new(|height: u64| async move { Ok(height * 2) }.boxed());

        let doubled = source.fetch(&21).await.unwrap();
        assert_eq!(doubled, 42);
    }

    #[tokio::test]
    async fn test_fn_source_propagates_errors() {
        let source = FnSource::new(|_: ()| {
            async move { Err::<u64, _>(anyhow::anyhow!("node unreachable")) }.boxed()
        });

        let err = source.fetch(&()).await.unwrap_err();
        assert_eq!(err.to_string(), "node unreachable");
    }
}
