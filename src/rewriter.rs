use crate::{
    config::{RuleSet, Rules},
    cookie::{parse_cookie_header_bytes, parse_set_cookie_header, serialize_cookie_header, serialize_set_cookie, TokenRule},
    merge::{apply_token_rules, merge},
};
use cookie::Cookie;
use http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderName, HeaderValue,
};

/// Rewrite the `Cookie` header, and in overlay mode the `Set-Cookie` header,
/// of a request according to `rules`.
///
/// The original headers are replaced by the rewritten ones. This never fails:
/// unreadable cookies are skipped one by one, and a header that cannot be
/// rebuilt is left as it was.
pub fn rewrite_headers(rules: &Rules, headers: &mut HeaderMap) {
    let cookies = request_cookies(headers);

    match rules {
        Rules::Overlay(set) => rewrite_overlay(set, cookies, headers),
        Rules::Token(set) => rewrite_token(set, cookies, headers),
    }
}

/// Every cookie of every `Cookie` header line
pub fn request_cookies(headers: &HeaderMap) -> Vec<Cookie<'static>> {
    headers
        .get_all(COOKIE)
        .iter()
        .flat_map(|value| parse_cookie_header_bytes(value.as_bytes()))
        .collect()
}

fn rewrite_overlay(set: &RuleSet<Cookie<'static>>, cookies: Vec<Cookie<'static>>, headers: &mut HeaderMap) {
    let added = merge(&cookies, &set.adders);
    let removed = merge(&added, &set.removers);

    let set_cookie = headers
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(parse_set_cookie_header)
        .unwrap_or_else(|| Cookie::new("", ""));
    let set_cookie = merge_single(set_cookie, &set.adders);
    let set_cookie = merge_single(set_cookie, &set.removers);

    debug!("Overlay rewrite: {} cookie(s) in, {} cookie(s) out", cookies.len(), removed.len());

    install(headers, COOKIE, serialize_cookie_header(&removed));
    match serialize_set_cookie(&set_cookie) {
        Some(value) => install(headers, SET_COOKIE, Some(value)),
        None if set_cookie.name().is_empty() => install(headers, SET_COOKIE, None),
        None => warn!("Keeping the original Set-Cookie header, {} cannot be rewritten", set_cookie.name()),
    }
}

fn rewrite_token(set: &RuleSet<TokenRule>, cookies: Vec<Cookie<'static>>, headers: &mut HeaderMap) {
    let rewritten = apply_token_rules(&cookies, &set.adders, &set.removers);

    debug!("Token rewrite: {} cookie(s) in, {} cookie(s) out", cookies.len(), rewritten.len());

    install(headers, COOKIE, serialize_cookie_header(&rewritten));
}

// The base cookie keeps the first slot of the merge result.
fn merge_single(cookie: Cookie<'static>, overlay: &[Cookie<'static>]) -> Cookie<'static> {
    let base = [cookie];
    merge(&base, overlay).into_iter().next().unwrap_or_else(|| {
        let [cookie] = base;
        cookie
    })
}

// `None` removes the header. A value that is not a valid header value leaves
// the original one in place.
fn install(headers: &mut HeaderMap, name: HeaderName, value: Option<String>) {
    match value.as_deref().map(HeaderValue::from_str) {
        Some(Ok(v)) => {
            headers.insert(name, v);
        }
        Some(Err(e)) => {
            warn!("Unable to install rewritten {} header, keeping the original: {}", name, e);
        }
        None => {
            headers.remove(&name);
        }
    }
}
