use axum::http::{HeaderValue, Request, Response, header};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

const ALLOWED_ORIGIN: &str = "*";
const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type";

/// Layer that opens the JSON endpoints to cross-origin callers.
#[derive(Clone, Default)]
pub struct CorsHeadersLayer;

impl CorsHeadersLayer {
    /// Creates a new CorsHeadersLayer
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for CorsHeadersLayer {
    type Service = CorsHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorsHeadersService { inner }
    }
}

/// Service that adds the Access-Control-Allow-* headers to every response
#[derive(Clone)]
pub struct CorsHeadersService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorsHeadersService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = CorsHeadersFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        CorsHeadersFuture {
            future: self.inner.call(request),
        }
    }
}

pin_project! {
    /// Future that resolves to a response with CORS headers added
    pub struct CorsHeadersFuture<F> {
        #[pin]
        future: F,
    }
}

impl<F, ResBody, E> Future for CorsHeadersFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = Result<Response<ResBody>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this.future.poll(cx) {
            Poll::Ready(Ok(mut response)) => {
                let headers = response.headers_mut();
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static(ALLOWED_ORIGIN),
                );
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_METHODS,
                    HeaderValue::from_static(ALLOWED_METHODS),
                );
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static(ALLOWED_HEADERS),
                );
                Poll::Ready(Ok(response))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => Poll::Pending,
        }
    }
}
