//! Navigation allow-list policy

use serde::{Deserialize, Serialize};

/// Ordered set of hostnames a remote-triggered click is allowed to navigate
/// to. Consulted only when a click lands on (or inside) an anchor element.
///
/// A hostname is allowed when it equals a listed domain or is a subdomain of
/// one: `www.google.com` matches `google.com`, `evil-google.com.example`
/// does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowListPolicy {
    domains: Vec<String>,
}

impl AllowListPolicy {
    /// Build a policy from a list of permitted domains. Entries are
    /// lowercased; empty entries are dropped.
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let domains = domains
            .into_iter()
            .map(|d| d.into().trim().trim_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Self { domains }
    }

    /// Whether navigation to `hostname` is permitted.
    pub fn allows(&self, hostname: &str) -> bool {
        // Hostnames compare case-insensitively; a trailing root dot is
        // equivalent to none.
        let hostname = hostname.trim_end_matches('.').to_ascii_lowercase();
        if hostname.is_empty() {
            return false;
        }
        self.domains.iter().any(|domain| {
            hostname == *domain || hostname.ends_with(&format!(".{}", domain))
        })
    }

    /// The permitted domains, in the order configured
    pub fn domains(&self) -> &[String] {
        &self.domains
    }
}

impl Default for AllowListPolicy {
    fn default() -> Self {
        Self::new(["google.com", "github.com"])
    }
}
