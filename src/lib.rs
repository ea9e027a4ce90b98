//! ### cookies-manager rewrites the cookies of incoming http requests
//!
//! A [`CookieFilter`](filter::CookieFilter) holds a set of *adder* rules,
//! injecting or overriding cookies, and *remover* rules, stripping them. Every
//! request handed to the filter gets its `Cookie` header (and, in overlay mode,
//! its `Set-Cookie` header) rewritten before being delegated downstream.
//!
//! Two merge modes exist, picked by the configuration:
//! - `overlay`: the explicitly set attributes of a rule override the ones of
//!   the cookie with the same name, unknown names are added.
//! - `token`: rule values are tokens appended to, or removed from, the value
//!   of the cookie with the same name.
//!
//! ## Quick setup
//! ```ignore
//! use cookies_manager::prelude::*;
//!
//! let config = Config::from_json(r#"{"adder": [{"name": "theme", "value": "dark"}]}"#)?;
//! let filter = CookieFilter::new(config, "theme-injector");
//!
//! let res = filter.handle(req, &|req: Request<Body>| async move { downstream(req).await }).await;
//! ```

#[macro_use]
extern crate log;

/// Configuration and merge modes
pub mod config;
/// Cookie rules and cookie header parsing / serialization
pub mod cookie;
/// Error definitions
pub mod error;
/// The request filter
pub mod filter;
/// Definition of types which can handle an http request
pub mod handler;
/// Merge algorithms
pub mod merge;
/// Header rewriting of a single request
pub mod rewriter;
/// Server running a filter in front of a handler
pub mod server;

/// Contains everything you need to put a cookie filter in front of a handler
pub mod prelude {
    ///
    pub use crate::config::Config;
    ///
    pub use crate::config::MergeMode;
    ///
    pub use crate::cookie::CookieRule;
    ///
    pub use crate::cookie::SameSiteRule;
    ///
    pub use crate::cookie::TokenRule;
    ///
    pub use crate::error::FilterError;
    ///
    pub use crate::filter::CookieFilter;
    ///
    pub use crate::handler::Handler;
    ///
    pub use crate::server::Server;
    ///
    pub use http::Request;
    ///
    pub use hyper::Body;
}
