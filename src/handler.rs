use futures::Future;
use http::Request;

/// Define a Handler of a potential http request
///
/// This is the downstream the filter delegates to once the cookies of a
/// request are rewritten. Implemented by default on any `async
/// fn(Request<B>) -> T`
pub trait Handler<B> {
    /// Value produced by the handler, usually a response
    type Output;
    /// Specific future returning the output
    type Future: Future<Output = Self::Output>;

    /// Handle the http request, returning a future of the output
    fn handle(&self, req: Request<B>) -> Self::Future;
}

impl<B, Fun, Fut, R> Handler<B> for Fun
where
    Fun: Fn(Request<B>) -> Fut,
    Fut: 'static + Future<Output = R> + Send,
{
    type Future = Box<dyn Future<Output = Self::Output> + Unpin + Send>;
    type Output = R;

    #[inline]
    fn handle(&self, req: Request<B>) -> Self::Future {
        Box::new(Box::pin((*self)(req)))
    }
}
