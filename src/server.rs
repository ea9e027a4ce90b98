//! Minimal hosting for a [`CookieFilter`]: every request accepted by the
//! listener goes through the filter, then to a downstream handler.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use futures::{
    prelude::*,
    task::{Context, Poll},
};
use hyper::{server::conn::Http, service::Service, Body, Request, Response};
use tokio::net::TcpListener;

use crate::{error::FilterError, filter::CookieFilter, handler::Handler};
use http::HeaderValue;

/// Default time for request handling is 30 seconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Default listener ip addr is localhost, port 8080
pub const DEFAULT_LISTENER_IFACE: &str = "127.0.0.1:8080";
pub const DEFAULT_SERVER_NAME: &str = "cookies-manager";

#[derive(Default)]
pub struct ListenerBuilder {
    iface: Option<String>,
    server_name: Option<String>,
    request_timeout_ms: Option<u64>,
}

impl ListenerBuilder {
    #[inline]
    pub fn new() -> Self {
        ListenerBuilder {
            iface: None,
            server_name: None,
            request_timeout_ms: Some(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }

    #[inline]
    pub fn interface(mut self, s: &str) -> Self {
        self.iface = Some(s.to_string());
        self
    }

    #[inline]
    pub fn request_timeout<T: Into<Option<u64>>>(mut self, timeout_ms: T) -> Self {
        self.request_timeout_ms = timeout_ms.into();
        self
    }

    #[inline]
    pub fn server_name(mut self, name: &str) -> Self {
        self.server_name = Some(name.to_string());
        self
    }

    pub(crate) fn build(self) -> ListenerConfig {
        ListenerConfig {
            iface: self.iface.unwrap_or_else(|| DEFAULT_LISTENER_IFACE.to_string()),
            server_name: self.server_name.unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string()),
            request_timeout_ms: self.request_timeout_ms,
        }
    }
}

pub struct ListenerConfig {
    iface: String,
    server_name: String,
    request_timeout_ms: Option<u64>,
}

pub struct Builder {
    listener: Option<ListenerBuilder>,
    filter: Option<CookieFilter>,
}

impl Builder {
    #[inline]
    pub fn configure_listener<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ListenerBuilder) -> ListenerBuilder,
    {
        let l = if let Some(builder) = self.listener.take() {
            builder
        } else {
            ListenerBuilder::new()
        };

        self.listener = Some(f(l));

        self
    }

    #[inline]
    pub fn filter(mut self, filter: CookieFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn build(self) -> Server {
        Server {
            listener_config: self.listener.unwrap_or_else(ListenerBuilder::new).build(),
            filter: self.filter.unwrap_or_else(|| CookieFilter::new(Default::default(), DEFAULT_SERVER_NAME)),
        }
    }
}

pub struct Server {
    listener_config: ListenerConfig,
    filter: CookieFilter,
}

impl Server {
    /// Produce a server builder
    #[inline]
    pub fn builder() -> Builder {
        Builder { listener: None, filter: None }
    }

    /// Return a future which will run the server, with `handler` as the
    /// downstream of the filter. Simply run this future inside the tokio
    /// executor or await it in an async context
    pub async fn run<H>(self, handler: H) -> Result<(), FilterError>
    where
        H: 'static + Handler<Body, Output = Response<Body>> + Send + Sync,
        H::Future: 'static + Send + Unpin,
    {
        let Server { listener_config, filter } = self;
        let server_name = HeaderValue::from_str(&listener_config.server_name)?;
        let stack = Arc::new(Stack {
            filter,
            handler,
            server_name,
        });

        let http = Http::new();
        let listener = TcpListener::bind(listener_config.iface.as_str()).await?;
        let local_addr = listener.local_addr()?;

        info!("{} started and listening on : http://{}", &listener_config.server_name, local_addr);

        loop {
            let (client_socket, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("incoming connection encountered an error: {}", e);
                    continue;
                }
            };

            let http_handler = http.serve_connection(client_socket, Stack::new_handler(&stack, peer_addr));

            if let Some(request_timeout_ms) = listener_config.request_timeout_ms {
                use tokio::time::{timeout, Duration};
                tokio::spawn(async move {
                    match timeout(Duration::from_millis(request_timeout_ms), http_handler).await {
                        Ok(Err(e)) => debug!("connection from {} ended with an error: {}", peer_addr, e),
                        Err(_) => debug!("connection from {} timed out", peer_addr),
                        Ok(Ok(())) => {}
                    }
                });
            } else {
                tokio::spawn(async move {
                    if let Err(e) = http_handler.await {
                        debug!("connection from {} ended with an error: {}", peer_addr, e);
                    }
                });
            }
        }
    }
}

#[doc(hidden)]
pub struct Stack<H> {
    filter: CookieFilter,
    handler: H,
    server_name: HeaderValue,
}

impl<H> Stack<H> {
    fn new_handler(stack: &Arc<Self>, peer_addr: SocketAddr) -> StackHandler<H> {
        StackHandler {
            stack: stack.clone(),
            peer_addr,
        }
    }
}

#[doc(hidden)]
pub struct StackHandler<H> {
    stack: Arc<Stack<H>>,
    peer_addr: SocketAddr,
}

impl<H> Clone for StackHandler<H> {
    fn clone(&self) -> Self {
        StackHandler {
            stack: self.stack.clone(),
            peer_addr: self.peer_addr,
        }
    }
}

impl<H> Service<Request<Body>> for StackHandler<H>
where
    H: 'static + Handler<Body, Output = Response<Body>> + Send + Sync,
    H::Future: 'static + Send + Unpin,
{
    type Error = Infallible;
    type Future = Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send + Unpin>;
    type Response = Response<Body>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        trace!("request from {}", self.peer_addr);
        let server_name = self.stack.server_name.clone();
        let fut = self.stack.filter.handle(req, &self.stack.handler).map(move |mut res| {
            res.headers_mut().insert(http::header::SERVER, server_name);
            Ok::<_, Infallible>(res)
        });

        Box::new(fut)
    }
}
