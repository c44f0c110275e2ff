use http::HeaderMap;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Adds the connection string's metadata headers to every gRPC request.
#[derive(Clone, Debug)]
pub(crate) struct HeadersLayer {
    headers: HeaderMap,
}

impl HeadersLayer {
    pub(crate) fn new(headers: HeaderMap) -> Self {
        HeadersLayer { headers }
    }
}

impl<S> Layer<S> for HeadersLayer {
    type Service = HeadersMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HeadersMiddleware { inner, headers: self.headers.clone() }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct HeadersMiddleware<S> {
    inner: S,
    headers: HeaderMap,
}

impl<S, B> Service<http::Request<B>> for HeadersMiddleware<S>
where
    S: Service<http::Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: http::Request<B>) -> Self::Future {
        for (name, value) in &self.headers {
            request.headers_mut().insert(name.clone(), value.clone());
        }
        self.inner.call(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use std::convert::Infallible;
    use std::future::{Ready, ready};

    #[derive(Clone)]
    struct Echo;

    impl Service<http::Request<()>> for Echo {
        type Response = HeaderMap;
        type Error = Infallible;
        type Future = Ready<Result<HeaderMap, Infallible>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, request: http::Request<()>) -> Self::Future {
            ready(Ok(request.headers().clone()))
        }
    }

    #[test]
    fn test_headers_are_injected() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));

        let mut service = HeadersLayer::new(headers).layer(Echo);
        let request = http::Request::builder().body(()).unwrap();

        let seen = tokio_test::block_on(service.call(request)).unwrap();
        assert_eq!(seen.get("authorization").unwrap(), "Bearer abc");
    }
}
