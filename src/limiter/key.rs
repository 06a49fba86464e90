use std::fmt;

/// Storage key for one identity: `{namespace}:{<identity>}`.
///
/// The identity is wrapped in a Redis Cluster hash tag so every sub-key a
/// strategy derives from it hashes to the same slot. Namespaces never contain
/// braces, so the first `{` is always the one opening the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    pub fn derive(namespace: &str, identity: &str) -> Self {
        Self(format!("{}:{{{}}}", namespace, identity))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sub-key for one piece of a strategy's state
    pub fn with_suffix(&self, suffix: &str) -> String {
        format!("{}:{}", self.0, suffix)
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key() {
        let key = RateLimitKey::derive("rate_limit", "127.0.0.1");
        assert_eq!(key.as_str(), "rate_limit:{127.0.0.1}");
        assert_eq!(key.with_suffix("ts"), "rate_limit:{127.0.0.1}:ts");
    }

    #[test]
    fn test_sub_keys_never_collide_across_identities() {
        // "a"'s timestamp key must not be another identity's tokens key
        let a = RateLimitKey::derive("rl", "a");
        let a_ts = RateLimitKey::derive("rl", "a}:ts");

        assert_ne!(a.with_suffix("ts"), a_ts.with_suffix("tokens"));
        assert_ne!(a.with_suffix("ts"), a_ts.with_suffix("ts"));
        assert_ne!(
            RateLimitKey::derive("rl", "a:ts").with_suffix("tokens"),
            a.with_suffix("ts")
        );
    }

    #[test]
    fn test_namespaces_separate_keys() {
        assert_ne!(
            RateLimitKey::derive("api", "user-1"),
            RateLimitKey::derive("admin", "user-1")
        );
    }
}
