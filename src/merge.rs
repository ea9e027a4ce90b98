//! Reconciliation of request cookies with adder / remover rules.
//!
//! Both modes are pure: they read their inputs and return new cookies, the
//! shared rules of a filter are never written to.

use crate::cookie::{quoted_inner, TokenRule};
use cookie::{Cookie, Expiration};
use std::collections::{HashMap, HashSet};
use time::{macros::datetime, OffsetDateTime};

/// Expiry carried by rules whose date was written as the zero time, read as
/// "not specified".
pub const UNSET_EXPIRES: OffsetDateTime = datetime!(0001-01-01 0:00 UTC);

/// Overlay `overlay` on top of `base`, keyed by cookie name.
///
/// A name unknown to `base` is appended as is. A known name only gets the
/// attributes the overlay cookie actually carries: a non empty value, path or
/// domain, an expiry date other than [`UNSET_EXPIRES`], a non zero max-age, `secure` / `http_only` set to
/// true and a same-site policy. An overlay can therefore never clear
/// `secure` or `http_only`.
///
/// The result holds one cookie per distinct name, base names first in their
/// original order, then new overlay names in overlay order.
pub fn merge(base: &[Cookie<'static>], overlay: &[Cookie<'static>]) -> Vec<Cookie<'static>> {
    let mut merged: Vec<Cookie<'static>> = Vec::with_capacity(base.len() + overlay.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for cookie in base {
        match index.get(cookie.name()) {
            Some(&i) => merged[i] = cookie.clone(),
            None => {
                index.insert(cookie.name().to_string(), merged.len());
                merged.push(cookie.clone());
            }
        }
    }

    for cookie in overlay {
        match index.get(cookie.name()) {
            Some(&i) => {
                trace!("Overlaying cookie {}", cookie.name());
                overlay_attributes(&mut merged[i], cookie);
            }
            None => {
                trace!("Inserting cookie {}", cookie.name());
                index.insert(cookie.name().to_string(), merged.len());
                merged.push(cookie.clone());
            }
        }
    }

    merged
}

fn overlay_attributes(target: &mut Cookie<'static>, overlay: &Cookie<'static>) {
    if !overlay.value().is_empty() {
        target.set_value(overlay.value().to_string());
    }

    if let Some(path) = overlay.path().filter(|p| !p.is_empty()) {
        target.set_path(path.to_string());
    }

    if let Some(domain) = overlay.domain().filter(|d| !d.is_empty()) {
        target.set_domain(domain.to_string());
    }

    if let Some(Expiration::DateTime(expires)) = overlay.expires() {
        if expires != UNSET_EXPIRES {
            target.set_expires(expires);
        }
    }

    if let Some(max_age) = overlay.max_age().filter(|m| !m.is_zero()) {
        target.set_max_age(max_age);
    }

    if overlay.secure() == Some(true) {
        target.set_secure(true);
    }

    if overlay.http_only() == Some(true) {
        target.set_http_only(true);
    }

    if let Some(same_site) = overlay.same_site() {
        target.set_same_site(same_site);
    }
}

/// Apply token rules to the values of `cookies`.
///
/// For each cookie, the adder token of the same name is appended (space
/// separated) unless the value already contains it, then every occurrence of
/// the remover token of the same name is deleted. Adders naming a cookie that
/// is not present become new cookies holding only a name and a value,
/// appended after the existing ones.
pub fn apply_token_rules(cookies: &[Cookie<'static>], adders: &[TokenRule], removers: &[TokenRule]) -> Vec<Cookie<'static>> {
    let add_tokens = last_value_by_name(adders);
    let remove_tokens = last_value_by_name(removers);

    let mut seen: HashSet<&str> = HashSet::new();
    let mut result = Vec::with_capacity(cookies.len() + adders.len());

    for cookie in cookies {
        seen.insert(cookie.name());

        let value = edit_value(cookie.value(), |value| {
            let mut value = value.to_string();
            if let Some(token) = add_tokens.get(cookie.name()) {
                value = add_token(&value, token);
            }
            if let Some(token) = remove_tokens.get(cookie.name()) {
                value = remove_token(&value, token);
            }
            value
        });

        let mut cookie = cookie.clone();
        if cookie.value() != value {
            trace!("Cookie {} value rewritten", cookie.name());
            cookie.set_value(value);
        }
        result.push(cookie);
    }

    for rule in adders {
        if seen.insert(rule.name.as_str()) {
            if let Some(value) = add_tokens.get(rule.name.as_str()) {
                trace!("Adding cookie {}", rule.name);
                result.push(Cookie::new(rule.name.clone(), value.to_string()));
            }
        }
    }

    result
}

// Tokens live inside the quotes of a quoted value.
fn edit_value<F>(value: &str, edit: F) -> String
where
    F: FnOnce(&str) -> String,
{
    match quoted_inner(value) {
        Some(inner) => format!("\"{}\"", edit(inner)),
        None => edit(value),
    }
}

fn last_value_by_name(rules: &[TokenRule]) -> HashMap<&str, &str> {
    rules.iter().map(|r| (r.name.as_str(), r.value.as_str())).collect()
}

/// Append `token` to `value`, space separated, unless `value` already
/// contains it.
pub fn add_token(value: &str, token: &str) -> String {
    if value.contains(token) {
        value.to_string()
    } else {
        format!("{} {}", value, token)
    }
}

/// Delete every occurrence of `token` from `value`. This is plain substring
/// removal, token boundaries are not respected.
pub fn remove_token(value: &str, token: &str) -> String {
    if token.is_empty() {
        value.to_string()
    } else {
        value.replace(token, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::{CookieRule, SameSiteRule};
    use cookie::SameSite;
    use time::Duration;

    fn names<'a>(cookies: &'a [Cookie<'static>]) -> Vec<&'a str> {
        cookies.iter().map(|c| c.name()).collect()
    }

    fn values<'a>(cookies: &'a [Cookie<'static>]) -> Vec<(&'a str, &'a str)> {
        cookies.iter().map(|c| (c.name(), c.value())).collect()
    }

    mod overlay {
        use super::*;

        #[test]
        fn unset_attributes_are_kept() {
            let base = vec![Cookie::build(("a", "1")).path("/a").domain("example.com").secure(true).http_only(true).build()];
            let overlay = vec![CookieRule::new("a").value("2").to_cookie()];

            let merged = merge(&base, &overlay);
            assert_eq!(merged.len(), 1);
            assert_eq!(merged[0].value(), "2");
            assert_eq!(merged[0].path(), Some("/a"));
            assert_eq!(merged[0].domain(), Some("example.com"));
            assert_eq!(merged[0].secure(), Some(true));
            assert_eq!(merged[0].http_only(), Some(true));
        }

        #[test]
        fn set_attributes_override() {
            let base = vec![Cookie::build(("a", "1")).path("/a").same_site(SameSite::Lax).build()];
            let overlay = vec![CookieRule::new("a")
                .path("/b")
                .max_age(60)
                .secure(true)
                .same_site(SameSiteRule::Strict)
                .to_cookie()];

            let merged = merge(&base, &overlay);
            assert_eq!(merged[0].value(), "1");
            assert_eq!(merged[0].path(), Some("/b"));
            assert_eq!(merged[0].max_age(), Some(Duration::seconds(60)));
            assert_eq!(merged[0].secure(), Some(true));
            assert_eq!(merged[0].same_site(), Some(SameSite::Strict));
        }

        #[test]
        fn false_flags_cannot_clear() {
            let base = vec![Cookie::build(("a", "1")).secure(true).http_only(true).build()];
            let overlay = vec![CookieRule::new("a").secure(false).http_only(false).value("").to_cookie()];

            let merged = merge(&base, &overlay);
            assert_eq!(merged[0].value(), "1");
            assert_eq!(merged[0].secure(), Some(true));
            assert_eq!(merged[0].http_only(), Some(true));
        }

        #[test]
        fn default_same_site_and_zero_max_age_are_unset() {
            let base = vec![Cookie::build(("a", "1")).same_site(SameSite::Lax).max_age(Duration::seconds(10)).build()];
            let overlay = vec![CookieRule::new("a").same_site(SameSiteRule::Default).max_age(0).to_cookie()];

            let merged = merge(&base, &overlay);
            assert_eq!(merged[0].same_site(), Some(SameSite::Lax));
            assert_eq!(merged[0].max_age(), Some(Duration::seconds(10)));
        }

        #[test]
        fn zero_time_expires_is_unset() {
            let expires = time::macros::datetime!(2014-02-05 0:00 UTC);
            let base = vec![Cookie::build(("a", "1")).expires(expires).build()];
            let overlay = vec![CookieRule::new("a").expires(UNSET_EXPIRES).to_cookie()];

            let merged = merge(&base, &overlay);
            assert_eq!(merged[0].expires_datetime(), Some(expires));

            let overlay = vec![CookieRule::new("a").expires(time::macros::datetime!(2030-01-01 0:00 UTC)).to_cookie()];
            let merged = merge(&base, &overlay);
            assert_eq!(merged[0].expires_datetime(), Some(time::macros::datetime!(2030-01-01 0:00 UTC)));
        }

        #[test]
        fn name_set_is_union() {
            let base = vec![Cookie::new("a", "1"), Cookie::new("b", "2")];
            let overlay = vec![Cookie::new("c", "3"), Cookie::new("a", "4"), Cookie::new("d", "5")];

            let merged = merge(&base, &overlay);
            assert!(merged.len() >= base.len());
            assert_eq!(names(&merged), vec!["a", "b", "c", "d"]);
            assert_eq!(values(&merged), vec![("a", "4"), ("b", "2"), ("c", "3"), ("d", "5")]);
        }

        #[test]
        fn empty_inputs() {
            assert!(merge(&[], &[]).is_empty());
            assert_eq!(values(&merge(&[Cookie::new("a", "1")], &[])), vec![("a", "1")]);
            assert_eq!(values(&merge(&[], &[Cookie::new("a", "1")])), vec![("a", "1")]);
        }

        #[test]
        fn duplicate_overlay_names_last_wins() {
            let overlay = vec![Cookie::new("a", "1"), Cookie::new("a", "2")];
            assert_eq!(values(&merge(&[], &overlay)), vec![("a", "2")]);
        }

        #[test]
        fn inputs_are_untouched() {
            let base = vec![Cookie::new("a", "1")];
            let overlay = vec![Cookie::build(("a", "2")).secure(true).build()];

            let added = merge(&base, &overlay);
            let _ = merge(&added, &[Cookie::new("a", "3")]);

            assert_eq!(base[0].value(), "1");
            assert_eq!(base[0].secure(), None);
            assert_eq!(overlay[0].value(), "2");
            assert_eq!(added[0].value(), "2");
        }

        #[test]
        fn placeholder_does_not_disturb_others() {
            let base = vec![Cookie::new("", "")];
            let overlay = vec![Cookie::new("a", "1")];

            let merged = merge(&base, &overlay);
            assert_eq!(values(&merged), vec![("", ""), ("a", "1")]);
        }

        #[test]
        fn remover_overwrites_value() {
            let base = vec![Cookie::new("test1", "value1|foo"), Cookie::new("test2", "value2")];
            let removers = vec![CookieRule::new("test1").value("foo").path("/").to_cookie()];

            let merged = merge(&base, &removers);
            assert_eq!(values(&merged), vec![("test1", "foo"), ("test2", "value2")]);
        }
    }

    mod token {
        use super::*;

        #[test]
        fn remove_existing_token() {
            let cookies = vec![Cookie::new("test1", "value1|foo"), Cookie::new("test2", "value2")];
            let result = apply_token_rules(&cookies, &[], &[TokenRule::new("test1", "foo")]);
            assert_eq!(values(&result), vec![("test1", "value1|"), ("test2", "value2")]);
        }

        #[test]
        fn add_new_cookie() {
            let cookies = vec![Cookie::new("test1", "value1"), Cookie::new("test2", "value2")];
            let result = apply_token_rules(&cookies, &[TokenRule::new("test3", "foo")], &[]);
            assert_eq!(values(&result), vec![("test1", "value1"), ("test2", "value2"), ("test3", "foo")]);
        }

        #[test]
        fn add_to_existing_cookie() {
            let cookies = vec![Cookie::new("test1", "value1"), Cookie::new("test2", "value2")];
            let result = apply_token_rules(&cookies, &[TokenRule::new("test1", "foo")], &[]);
            assert_eq!(values(&result), vec![("test1", "value1 foo"), ("test2", "value2")]);
        }

        #[test]
        fn add_present_token_is_noop() {
            let cookies = vec![Cookie::new("test1", "value1 foo")];
            let result = apply_token_rules(&cookies, &[TokenRule::new("test1", "foo")], &[]);
            assert_eq!(values(&result), vec![("test1", "value1 foo")]);
        }

        #[test]
        fn add_then_remove_on_same_cookie() {
            let cookies = vec![Cookie::new("a", "x")];
            let result = apply_token_rules(&cookies, &[TokenRule::new("a", "foo")], &[TokenRule::new("a", "x")]);
            assert_eq!(values(&result), vec![("a", " foo")]);
        }

        #[test]
        fn remover_does_not_touch_new_cookies() {
            let result = apply_token_rules(&[], &[TokenRule::new("a", "foo")], &[TokenRule::new("a", "foo")]);
            assert_eq!(values(&result), vec![("a", "foo")]);
        }

        #[test]
        fn new_cookie_has_no_attributes() {
            let result = apply_token_rules(&[], &[TokenRule::new("a", "foo")], &[]);
            assert_eq!(result.len(), 1);
            assert_eq!(result[0].path(), None);
            assert_eq!(result[0].secure(), None);
            assert_eq!(result[0].same_site(), None);
        }

        #[test]
        fn duplicate_adders_last_wins() {
            let adders = vec![TokenRule::new("a", "1"), TokenRule::new("b", "2"), TokenRule::new("a", "3")];
            let result = apply_token_rules(&[], &adders, &[]);
            assert_eq!(values(&result), vec![("a", "3"), ("b", "2")]);
        }

        #[test]
        fn existing_attributes_are_kept() {
            let cookies = vec![Cookie::build(("a", "x")).path("/p").build()];
            let result = apply_token_rules(&cookies, &[TokenRule::new("a", "y")], &[]);
            assert_eq!(result[0].value(), "x y");
            assert_eq!(result[0].path(), Some("/p"));
        }

        #[test]
        fn quoted_values_are_edited_inside_quotes() {
            let cookies = vec![Cookie::new("a", "\"x|foo\""), Cookie::new("b", "\"y\"")];
            let result = apply_token_rules(
                &cookies,
                &[TokenRule::new("b", "bar")],
                &[TokenRule::new("a", "foo")],
            );
            assert_eq!(values(&result), vec![("a", "\"x|\""), ("b", "\"y bar\"")]);
        }

        #[test]
        fn removal_is_idempotent() {
            for (value, token) in [("a|foo|foo", "foo"), ("foofoo", "foo"), ("bar", "foo"), ("", "foo"), ("abc", "")] {
                let once = remove_token(value, token);
                assert_eq!(remove_token(&once, token), once);
            }
        }

        #[test]
        fn removal_is_substring_based() {
            assert_eq!(remove_token("food foo", "foo"), "d ");
        }
    }
}
