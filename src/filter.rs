use crate::{
    config::{Config, Rules},
    handler::Handler,
    rewriter::rewrite_headers,
};
use http::Request;
use std::sync::Arc;

/// Request filter rewriting cookies before delegating to a downstream handler
///
/// The rules are built once at construction and shared, read only, between
/// every request going through the filter (and every clone of it).
#[derive(Clone, Debug)]
pub struct CookieFilter {
    name: String,
    rules: Arc<Rules>,
}

impl CookieFilter {
    pub fn new(config: Config, name: &str) -> Self {
        let rules = config.into_rules();
        let (adders, removers) = rules.counts();
        info!(
            "Cookie filter {} created in {:?} mode with {} adder(s) and {} remover(s)",
            name,
            rules.mode(),
            adders,
            removers
        );

        CookieFilter {
            name: name.to_string(),
            rules: Arc::new(rules),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Rewrite the cookie headers of `req` in place
    pub fn rewrite<B>(&self, req: &mut Request<B>) {
        trace!("{}: rewriting cookies of {} {}", self.name, req.method(), req.uri());
        rewrite_headers(&self.rules, req.headers_mut());
    }

    /// Rewrite the cookie headers of `req`, then hand it to `next`. The
    /// request is always delegated, whatever its cookie headers contain.
    pub fn handle<B, H>(&self, mut req: Request<B>, next: &H) -> H::Future
    where
        H: Handler<B> + ?Sized,
    {
        self.rewrite(&mut req);
        next.handle(req)
    }
}
