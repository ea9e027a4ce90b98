//! Cookie rules as they appear in the configuration, and the conversion of
//! `Cookie` / `Set-Cookie` header text to and from [`Cookie`] values.
//!
//! Every rule attribute is an `Option`: `None` means the attribute was not
//! specified, which is never the same thing as `Some(false)` or `Some("")`.

use cookie::{Cookie, SameSite};
use http::HeaderValue;
use serde::Deserialize;
use std::{
    borrow::Cow,
    fmt::{Display, Formatter, Result as FmtResult},
};
use time::{Duration, OffsetDateTime};

/// SameSite policy of a cookie rule.
///
/// Unknown strings fall back to `Default`, which is treated as "not
/// specified" once converted to a wire cookie.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSiteRule {
    Lax,
    Strict,
    None,
    #[serde(other)]
    Default,
}

impl SameSiteRule {
    pub fn to_same_site(self) -> Option<SameSite> {
        match self {
            SameSiteRule::Lax => Some(SameSite::Lax),
            SameSiteRule::Strict => Some(SameSite::Strict),
            SameSiteRule::None => Some(SameSite::None),
            SameSiteRule::Default => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            SameSiteRule::Lax => "lax",
            SameSiteRule::Strict => "strict",
            SameSiteRule::None => "none",
            SameSiteRule::Default => "default",
        }
    }
}

/// A full-attribute cookie rule, used by the attribute overlay mode
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRule {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires: Option<OffsetDateTime>,
    /// Max-Age in seconds
    #[serde(default)]
    pub max_age: Option<i64>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default)]
    pub http_only: Option<bool>,
    #[serde(default)]
    pub same_site: Option<SameSiteRule>,
}

impl CookieRule {
    /// Rule with only a name, every attribute unset
    pub fn new(name: &str) -> Self {
        CookieRule {
            name: name.to_string(),
            value: None,
            path: None,
            domain: None,
            expires: None,
            max_age: None,
            secure: None,
            http_only: None,
            same_site: None,
        }
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    pub fn expires(mut self, expires: OffsetDateTime) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = Some(http_only);
        self
    }

    pub fn same_site(mut self, same_site: SameSiteRule) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Whether any attribute besides name and value is set
    pub fn has_attributes(&self) -> bool {
        self.path.is_some()
            || self.domain.is_some()
            || self.expires.is_some()
            || self.max_age.is_some()
            || self.secure.is_some()
            || self.http_only.is_some()
            || self.same_site.is_some()
    }

    /// Convert the rule into a wire cookie, copying only the attributes that
    /// are set.
    pub fn to_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.name.clone(), self.value.clone().unwrap_or_default());

        if let Some(path) = &self.path {
            cookie.set_path(path.clone());
        }

        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }

        if let Some(expires) = self.expires {
            cookie.set_expires(expires);
        }

        if let Some(max_age) = self.max_age {
            cookie.set_max_age(Duration::seconds(max_age));
        }

        if let Some(secure) = self.secure {
            cookie.set_secure(secure);
        }

        if let Some(http_only) = self.http_only {
            cookie.set_http_only(http_only);
        }

        if let Some(same_site) = self.same_site.and_then(SameSiteRule::to_same_site) {
            cookie.set_same_site(same_site);
        }

        cookie
    }

    /// Name + value view of the rule, for the token edit mode
    pub fn to_token_rule(&self) -> TokenRule {
        TokenRule {
            name: self.name.clone(),
            value: self.value.clone().unwrap_or_default(),
        }
    }
}

/// Debug representation: all nine fields in a fixed order, unset ones left
/// empty.
impl Display for CookieRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let value = self.value.as_ref().map(|v| format!("value={}", v)).unwrap_or_default();
        let path = self.path.as_ref().map(|p| format!("path={}", p)).unwrap_or_default();
        let domain = self.domain.as_ref().map(|d| format!("domain={}", d)).unwrap_or_default();
        let expires = self.expires.map(|e| format!("expires={}", e)).unwrap_or_default();
        let max_age = self.max_age.map(|m| format!("maxAge={}", m)).unwrap_or_default();
        let secure = self.secure.map(|s| format!("secure={}", s)).unwrap_or_default();
        let http_only = self.http_only.map(|h| format!("httpOnly={}", h)).unwrap_or_default();
        let same_site = self.same_site.map(|s| format!("sameSite={}", s.as_str())).unwrap_or_default();

        write!(
            f,
            "CookieRule{{name={}, {}, {}, {}, {}, {}, {}, {}, {}}}",
            self.name, value, path, domain, expires, max_age, secure, http_only, same_site
        )
    }
}

/// A name + value rule, used by the token edit mode
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct TokenRule {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl TokenRule {
    pub fn new(name: &str, value: &str) -> Self {
        TokenRule {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Parse the value of a `Cookie` request header into name / value cookies.
///
/// Segments that do not parse are skipped; a bad segment never aborts the
/// rest of the header. Values are kept as sent, surrounding quotes included.
pub fn parse_cookie_header(header: &str) -> Vec<Cookie<'static>> {
    header.split(';').filter_map(parse_cookie_segment).collect()
}

/// Same as [`parse_cookie_header`] for a raw header value. Only the segments
/// which are not valid utf-8 are skipped.
pub fn parse_cookie_header_bytes(header: &[u8]) -> Vec<Cookie<'static>> {
    header
        .split(|b| *b == b';')
        .filter_map(|segment| match std::str::from_utf8(segment) {
            Ok(segment) => parse_cookie_segment(segment),
            Err(e) => {
                debug!("Skipping non utf-8 cookie segment {:?}: {}", String::from_utf8_lossy(segment), e);
                None
            }
        })
        .collect()
}

fn parse_cookie_segment(segment: &str) -> Option<Cookie<'static>> {
    let segment = segment.trim();
    if segment.is_empty() {
        return None;
    }

    match Cookie::parse(segment) {
        Ok(c) => {
            let raw_value = segment.split_once('=').map_or("", |(_, v)| v.trim());
            Some(Cookie::new(c.name().to_string(), raw_value.to_string()))
        }
        Err(e) => {
            debug!("Skipping malformed cookie segment {:?}: {}", segment, e);
            None
        }
    }
}

/// Parse a single `Set-Cookie` style value, attributes included.
///
/// Empty or unparsable input yields a placeholder cookie with an empty name
/// and value.
pub fn parse_set_cookie_header(header: &str) -> Cookie<'static> {
    let header = header.trim();
    if header.is_empty() {
        return Cookie::new("", "");
    }

    match Cookie::parse(header.to_string()) {
        Ok(c) => c,
        Err(e) => {
            debug!("Unable to parse Set-Cookie value {:?}: {}", header, e);
            Cookie::new("", "")
        }
    }
}

/// Render cookies as a `Cookie` request header value, `None` if there is
/// nothing to send.
///
/// A cookie which cannot be written without corrupting the header is dropped
/// on its own, the others are still sent.
pub fn serialize_cookie_header(cookies: &[Cookie<'_>]) -> Option<String> {
    let pairs = cookies
        .iter()
        .filter(|c| !c.name().is_empty())
        .filter_map(cookie_pair)
        .collect::<Vec<_>>();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// Render a cookie with its set attributes as a `Set-Cookie` value, `None`
/// for the empty-name placeholder or a cookie that cannot be written.
pub fn serialize_set_cookie(cookie: &Cookie<'_>) -> Option<String> {
    if cookie.name().is_empty() {
        return None;
    }

    cookie_pair(cookie)?;
    let rendered = cookie.to_string();
    match HeaderValue::from_str(&rendered) {
        Ok(_) => Some(rendered),
        Err(e) => {
            warn!("Dropping Set-Cookie {}: {}", cookie.name(), e);
            None
        }
    }
}

/// The inner text of a value wrapped in one pair of double quotes
pub(crate) fn quoted_inner(value: &str) -> Option<&str> {
    value.strip_prefix('"').and_then(|v| v.strip_suffix('"'))
}

fn cookie_pair(cookie: &Cookie<'_>) -> Option<String> {
    let name = cookie.name();
    if name.contains(|c: char| c == '=' || c == ';' || c == ',' || c == '"' || c.is_whitespace() || c.is_control()) {
        warn!("Dropping cookie {:?}: invalid name", name);
        return None;
    }

    let value = match wire_value(cookie.value()) {
        Some(value) => value,
        None => {
            warn!("Dropping cookie {}: value {:?} cannot be sent", name, cookie.value());
            return None;
        }
    };

    let pair = format!("{}={}", name, value);
    match HeaderValue::from_str(&pair) {
        Ok(_) => Some(pair),
        Err(e) => {
            warn!("Dropping cookie {}: {}", name, e);
            None
        }
    }
}

// Already quoted values are written back untouched, bare values holding a
// space or a comma get quoted. `;` and `"` cannot be escaped in a cookie value.
fn wire_value(value: &str) -> Option<Cow<'_, str>> {
    let inner = quoted_inner(value);
    let bare = inner.unwrap_or(value);
    if bare.contains(|c: char| c == ';' || c == '"' || c.is_control()) {
        return None;
    }

    if inner.is_none() && (bare.contains(' ') || bare.contains(',')) {
        Some(Cow::Owned(format!("\"{}\"", bare)))
    } else {
        Some(Cow::Borrowed(value))
    }
}
