use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use uuid::Uuid;

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

typed_id!(PatternId);
typed_id!(SelectorChainId);
typed_id!(WorkflowId);
typed_id!(SkillId);
typed_id!(SkillTemplateId);
typed_id!(ChangePatternId);
typed_id!(RecordingId);

/// Tenant partition key. Every durable row carries one; cross-tenant reads
/// are never implicit (see DESIGN.md: cross-tenant pattern sharing).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The eTLD+1-ish domain derived from a request URL. We don't ship a public
/// suffix list; for the common case (single registrable label plus TLD) this
/// strips down to `registrable.tld`, which matches what the rest of the
/// system needs it for: a per-site partition key, not a legally precise
/// public-suffix computation.
pub fn domain_of(url: &url::Url) -> Option<String> {
    let host = url.host_str()?;
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return Some(host.to_lowercase());
    }
    Some(labels[labels.len() - 2..].join(".").to_lowercase())
}

/// Canonicalized URL plus a normalized query key-set, used as a cache key so
/// that `?b=2&a=1` and `?a=1&b=2` hit the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UrlFingerprint {
    pub canonical: String,
    pub query_keys: BTreeSet<String>,
    pub content_hint: Option<String>,
}

impl UrlFingerprint {
    pub fn new(url: &url::Url, content_hint: Option<String>) -> Self {
        let mut canonical = url.clone();
        canonical.set_query(None);
        canonical.set_fragment(None);
        let query_keys = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        Self {
            canonical: canonical.to_string(),
            query_keys,
            content_hint,
        }
    }

    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical.as_bytes());
        for key in &self.query_keys {
            hasher.update(b"|");
            hasher.update(key.as_bytes());
        }
        if let Some(hint) = &self.content_hint {
            hasher.update(b"#");
            hasher.update(hint.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// SHA-256 content hash, used for change detection and extraction dedup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn of(content: &str) -> Self {
        let normalized: String = content
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_of_strips_subdomains() {
        let url = url::Url::parse("https://api.example.com/users/42").unwrap();
        assert_eq!(domain_of(&url).as_deref(), Some("example.com"));
    }

    #[test]
    fn fingerprint_is_query_order_independent() {
        let a = url::Url::parse("https://example.com/search?b=2&a=1").unwrap();
        let b = url::Url::parse("https://example.com/search?a=1&b=2").unwrap();
        let fp_a = UrlFingerprint::new(&a, None);
        let fp_b = UrlFingerprint::new(&b, None);
        assert_eq!(fp_a.cache_key(), fp_b.cache_key());
    }

    #[test]
    fn content_hash_ignores_whitespace_only_changes() {
        let a = ContentHash::of("hello\nworld\n");
        let b = ContentHash::of("hello \n  world  \n\n");
        assert_eq!(a, b);
    }
}
