//! Security policy: configuration plus pure request predicates.
//!
//! The policy is an explicitly constructed value owned by the composition
//! root and shared through application state; there are no module-level
//! globals. Feature toggles (IP whitelist, API keys, admin token) fail open
//! when unconfigured: an empty key set means "no key required". That
//! posture is deliberate and covered by tests, so flipping a deployment to
//! default-deny is a configuration change, not a code change.

use std::collections::HashSet;
use std::sync::LazyLock;

use axum::http::{header, HeaderName, HeaderValue};
use regex::Regex;

/// Patterns that mark a request body as suspicious. Biased toward false
/// positives: a legitimate post comment containing `DROP TABLE` is an
/// acceptable rejection.
static SUSPICIOUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // SQL injection keywords
        r"(?i)\b(union\s+select|select\s+[\w\*,\s]+\s+from|insert\s+into|delete\s+from|drop\s+table|truncate\s+table)\b",
        // Comment-style SQL tails
        r"(?i)('|\x22)\s*(or|and)\s+[\w'\x22]+\s*=\s*[\w'\x22]+",
        // Script tags
        r"(?i)<\s*script\b",
        // javascript: scheme
        r"(?i)javascript\s*:",
        // Inline event handler attributes
        r"(?i)\bon[a-z]+\s*=",
        // Angle-bracket tag injection
        r"(?i)<\s*/?\s*(iframe|object|embed|svg|img)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid suspicious-content pattern"))
    .collect()
});

/// Patterns stripped by [`SecurityPolicy::sanitize_input`]. Applied to a
/// fixpoint so removal cannot splice a new match together.
static SANITIZE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(?i)javascript\s*:", r"(?i)\bon[a-z]+\s*="]
        .iter()
        .map(|p| Regex::new(p).expect("valid sanitize pattern"))
        .collect()
});

/// Security policy configuration and predicates.
///
/// All predicates are pure functions of the policy and their arguments;
/// nothing here holds mutable state.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    /// Allowed client IPs for admin operations. `None` disables the check.
    pub ip_whitelist: Option<HashSet<String>>,

    /// Valid API keys. Empty set disables the check (fail open).
    pub api_keys: HashSet<String>,

    /// Admin bearer token. `None` disables the check (fail open).
    pub admin_token: Option<String>,

    /// Origins allowed to make cross-origin requests.
    pub allowed_origins: HashSet<String>,

    /// Production mode. Outside production, unknown origins fall back to `*`.
    pub production: bool,

    /// Maximum accepted request body size in bytes.
    pub max_request_bytes: usize,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            ip_whitelist: None,
            api_keys: HashSet::new(),
            admin_token: None,
            allowed_origins: HashSet::new(),
            production: false,
            max_request_bytes: 1024 * 1024,
        }
    }
}

impl SecurityPolicy {
    /// True when the whitelist feature is disabled or the IP is listed.
    pub fn is_whitelisted(&self, ip: &str) -> bool {
        match &self.ip_whitelist {
            None => true,
            Some(list) => list.contains(ip),
        }
    }

    /// True when no API keys are configured, or the presented key is valid.
    pub fn validate_api_key(&self, key: Option<&str>) -> bool {
        if self.api_keys.is_empty() {
            return true;
        }
        key.is_some_and(|k| self.api_keys.contains(k))
    }

    /// True when no admin token is configured, or the presented token matches.
    pub fn validate_admin_token(&self, token: Option<&str>) -> bool {
        match &self.admin_token {
            None => true,
            Some(expected) => token.is_some_and(|t| t == expected.as_str()),
        }
    }

    /// Scan text for injection signatures.
    pub fn has_suspicious_content(&self, text: &str) -> bool {
        SUSPICIOUS_PATTERNS.iter().any(|re| re.is_match(text))
    }

    /// Strip angle brackets, quotes, the `javascript:` scheme, and inline
    /// event-handler patterns.
    ///
    /// Idempotent: `sanitize(sanitize(x)) == sanitize(x)`. Pattern removal
    /// loops until no pattern matches, since a single pass over input like
    /// `javasjavascript:cript:` would leave a fresh match behind.
    pub fn sanitize_input(&self, text: &str) -> String {
        let mut out: String = text
            .chars()
            .filter(|c| !matches!(c, '<' | '>' | '"' | '\''))
            .collect();

        for re in SANITIZE_PATTERNS.iter() {
            while re.is_match(&out) {
                out = re.replace_all(&out, "").into_owned();
            }
        }

        out
    }

    /// True when the origin may make cross-origin requests.
    ///
    /// Outside production every origin is allowed, which keeps local
    /// development against a dev frontend friction-free.
    pub fn origin_allowed(&self, origin: &str) -> bool {
        !self.production || self.allowed_origins.contains(origin)
    }

    /// The fixed hardening header set attached to every response, plus
    /// `Access-Control-Allow-Origin` resolved against the request origin.
    pub fn security_headers(&self, origin: Option<&str>) -> Vec<(HeaderName, HeaderValue)> {
        let mut headers = vec![
            (
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
            (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
            (
                HeaderName::from_static("x-xss-protection"),
                HeaderValue::from_static("1; mode=block"),
            ),
            (
                header::REFERRER_POLICY,
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ),
            (
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
            ),
            (
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static("max-age=63072000; includeSubDomains"),
            ),
        ];

        match origin {
            Some(o) if self.allowed_origins.contains(o) => {
                if let Ok(value) = HeaderValue::from_str(o) {
                    headers.push((header::ACCESS_CONTROL_ALLOW_ORIGIN, value));
                }
            }
            _ if !self.production => {
                headers.push((
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("*"),
                ));
            }
            _ => {}
        }

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SecurityPolicy {
        SecurityPolicy::default()
    }

    #[test]
    fn whitelist_disabled_allows_everyone() {
        assert!(policy().is_whitelisted("203.0.113.9"));
    }

    #[test]
    fn whitelist_enabled_checks_membership() {
        let p = SecurityPolicy {
            ip_whitelist: Some(["10.0.0.1".to_string()].into_iter().collect()),
            ..policy()
        };
        assert!(p.is_whitelisted("10.0.0.1"));
        assert!(!p.is_whitelisted("10.0.0.2"));
    }

    #[test]
    fn api_key_fails_open_when_unconfigured() {
        assert!(policy().validate_api_key(None));
        assert!(policy().validate_api_key(Some("anything")));
    }

    #[test]
    fn api_key_checked_when_configured() {
        let p = SecurityPolicy {
            api_keys: ["k1".to_string()].into_iter().collect(),
            ..policy()
        };
        assert!(p.validate_api_key(Some("k1")));
        assert!(!p.validate_api_key(Some("k2")));
        assert!(!p.validate_api_key(None));
    }

    #[test]
    fn admin_token_fails_open_when_unconfigured() {
        assert!(policy().validate_admin_token(None));
    }

    #[test]
    fn admin_token_checked_when_configured() {
        let p = SecurityPolicy {
            admin_token: Some("secret".to_string()),
            ..policy()
        };
        assert!(p.validate_admin_token(Some("secret")));
        assert!(!p.validate_admin_token(Some("wrong")));
        assert!(!p.validate_admin_token(None));
    }

    #[test]
    fn suspicious_content_positives() {
        let p = policy();
        assert!(p.has_suspicious_content("x' OR '1'='1"));
        assert!(p.has_suspicious_content("UNION SELECT password FROM users"));
        assert!(p.has_suspicious_content("DROP TABLE posts"));
        assert!(p.has_suspicious_content("<script>alert(1)</script>"));
        assert!(p.has_suspicious_content("<SCRIPT src=evil.js>"));
        assert!(p.has_suspicious_content("javascript:alert(1)"));
        assert!(p.has_suspicious_content("<img onerror=alert(1)>"));
        assert!(p.has_suspicious_content("<iframe src=x>"));
    }

    #[test]
    fn suspicious_content_negatives() {
        let p = policy();
        assert!(!p.has_suspicious_content("a perfectly normal comment"));
        assert!(!p.has_suspicious_content("I selected a theme from the menu"));
        assert!(!p.has_suspicious_content("email me at a@b.com"));
    }

    #[test]
    fn sanitize_strips_dangerous_characters() {
        let p = policy();
        assert_eq!(p.sanitize_input("<b>\"hi\"</b>"), "bhi/b");
        assert_eq!(p.sanitize_input("javascript:alert(1)"), "alert(1)");
        assert_eq!(p.sanitize_input("x onclick=go y"), "x go y");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let p = policy();
        for input in [
            "<script>alert('x')</script>",
            "javasjavascript:cript:alert(1)",
            "ononclick=click=boom",
            "plain text stays plain",
            "",
        ] {
            let once = p.sanitize_input(input);
            let twice = p.sanitize_input(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn sanitize_reduced_patterns_do_not_survive() {
        let p = policy();
        let out = p.sanitize_input("javasjavascript:cript:");
        assert!(!out.to_lowercase().contains("javascript:"));
    }

    #[test]
    fn headers_always_include_hardening_set() {
        let headers = policy().security_headers(None);
        let names: Vec<_> = headers.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"x-content-type-options"));
        assert!(names.contains(&"x-frame-options"));
        assert!(names.contains(&"content-security-policy"));
        assert!(names.contains(&"strict-transport-security"));
    }

    #[test]
    fn cors_origin_echoed_when_allowed() {
        let p = SecurityPolicy {
            allowed_origins: ["https://blog.example".to_string()].into_iter().collect(),
            production: true,
            ..policy()
        };
        let headers = p.security_headers(Some("https://blog.example"));
        let acao = headers
            .iter()
            .find(|(n, _)| n == header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|(_, v)| v.to_str().unwrap().to_string());
        assert_eq!(acao.as_deref(), Some("https://blog.example"));
    }

    #[test]
    fn cors_unknown_origin_rejected_in_production() {
        let p = SecurityPolicy {
            production: true,
            ..policy()
        };
        let headers = p.security_headers(Some("https://evil.example"));
        assert!(
            !headers
                .iter()
                .any(|(n, _)| n == header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }

    #[test]
    fn cors_wildcard_outside_production() {
        let headers = policy().security_headers(Some("https://anywhere.example"));
        let acao = headers
            .iter()
            .find(|(n, _)| n == header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|(_, v)| v.to_str().unwrap().to_string());
        assert_eq!(acao.as_deref(), Some("*"));
    }
}
