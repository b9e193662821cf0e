//! HVML URLs (spec section 6.4): `hvml://host/app/runner[/group[/page]][?query][#fragment]`.

use crate::error::{fail, PurcError, PurcResult};

/// A parsed HVML URL. Component matching is case-insensitive: the parser
/// lowercases `host`/`app`/`runner`/`group`/`page` before storing them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HvmlUri {
    pub host: String,
    pub app: String,
    pub runner: String,
    pub group: String,
    pub page: String,
    pub query: String,
    pub fragment: String,
}

const SCHEME: &str = "hvml://";

impl HvmlUri {
    /// Parses `uri`, rejecting missing required components (`host`, `app`,
    /// `runner`). `group`/`page` default to the empty string; an explicit
    /// `-` path segment (spec section 8's worked example) is treated the
    /// same as an empty group.
    pub fn parse(uri: &str) -> PurcResult<HvmlUri> {
        let lower = uri.to_ascii_lowercase();
        if !lower.starts_with(SCHEME) {
            return fail(PurcError::InvalidValue);
        }
        let rest = &lower[SCHEME.len()..];

        let (rest, fragment) = match rest.split_once('#') {
            Some((head, frag)) => (head, frag.to_string()),
            None => (rest, String::new()),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((head, q)) => (head, q.to_string()),
            None => (rest, String::new()),
        };

        let mut segments = rest.splitn(2, '/');
        let host = segments.next().unwrap_or("").to_string();
        let path = segments.next().unwrap_or("");
        if host.is_empty() {
            return fail(PurcError::InvalidValue);
        }

        let mut parts = path.split('/');
        let app = parts.next().unwrap_or("").to_string();
        let runner = parts.next().unwrap_or("").to_string();
        if app.is_empty() || runner.is_empty() {
            return fail(PurcError::InvalidValue);
        }
        let group = parts.next().unwrap_or("").to_string();
        let group = if group == "-" { String::new() } else { group };
        let page = parts.next().unwrap_or("").to_string();

        Ok(HvmlUri {
            host,
            app,
            runner,
            group,
            page,
            query,
            fragment,
        })
    }

    /// Consumes `self` and returns its owned parts, per section 4.3's
    /// "destructive `break_down`" form.
    pub fn break_down(self) -> (String, String, String, String, String) {
        (self.host, self.app, self.runner, self.group, self.page)
    }

    /// Non-destructively looks up `key` in the query string, without
    /// mutating or consuming `self` (section 6.4's `get_query_value`).
    pub fn get_query_value(&self, key: &str) -> Option<&str> {
        self.query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k == key).then_some(v)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_url_with_group_and_page() {
        let u = HvmlUri::parse("hvml://host/app/runner/-/page?k=v").unwrap();
        assert_eq!(u.host, "host");
        assert_eq!(u.app, "app");
        assert_eq!(u.runner, "runner");
        assert_eq!(u.group, "");
        assert_eq!(u.page, "page");
        assert_eq!(u.get_query_value("k"), Some("v"));
    }

    #[test]
    fn missing_runner_is_rejected() {
        assert!(HvmlUri::parse("hvml://host/app").is_err());
    }

    #[test]
    fn case_insensitive_components() {
        let u = HvmlUri::parse("hvml://HOST/APP/RUNNER").unwrap();
        assert_eq!(u.host, "host");
        assert_eq!(u.app, "app");
    }

    #[test]
    fn get_query_value_does_not_consume() {
        let u = HvmlUri::parse("hvml://h/a/r?x=1&y=2").unwrap();
        assert_eq!(u.get_query_value("y"), Some("2"));
        assert_eq!(u.get_query_value("y"), Some("2")); // non-destructive
    }
}
