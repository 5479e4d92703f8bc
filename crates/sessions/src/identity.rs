//! Identity derivation — partition sessions by caller.
//!
//! Derives a stable, privacy-preserving identity from raw request
//! metadata. The resolver is not a source of trust: token verification
//! happens upstream, and this layer only extracts (or synthesizes) a
//! stable user id from whatever the request carries. Resolution never
//! fails — with no usable credential it degrades to an anonymous
//! identity derived from the client IP and user agent.

use std::collections::HashMap;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use ar_domain::trace::TraceEvent;

/// Number of leading token bytes hashed when a bearer credential carries
/// no parseable identity claim.
const SYNTHETIC_ID_TOKEN_BYTES: usize = 16;

/// Kind of caller an identity represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Individual,
    Organization,
    ServiceAccount,
    #[default]
    Anonymous,
    AuthenticatedUser,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Individual => "individual",
            UserType::Organization => "organization",
            UserType::ServiceAccount => "service_account",
            UserType::Anonymous => "anonymous",
            UserType::AuthenticatedUser => "authenticated_user",
        }
    }
}

/// How the caller authenticated (as observed, not verified here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Jwt,
    ApiKey,
    Anonymous,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Jwt => "jwt",
            AuthMethod::ApiKey => "api_key",
            AuthMethod::Anonymous => "anonymous",
        }
    }
}

/// A resolved caller identity.
///
/// Never persisted standalone — only [`Identity::hash`] and denormalized
/// fields are stored alongside sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub user_type: UserType,
    pub auth_method: AuthMethod,
    pub metadata: HashMap<String, String>,
}

impl Identity {
    /// Fixed-length partition key: the first 16 hex chars of
    /// SHA-256 over `(user_id, user_type, auth_method)`. Equal triples
    /// always hash equally, regardless of process.
    pub fn hash(&self) -> String {
        let input = format!(
            "{}:{}:{}",
            self.user_id,
            self.user_type.as_str(),
            self.auth_method.as_str()
        );
        let digest = sha256_hex(input.as_bytes());
        digest[..16].to_owned()
    }
}

/// Raw per-request metadata the resolver consumes. Every field is
/// optional; absence drives the anonymous fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMetadata {
    #[serde(default)]
    pub authorization: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub client_ip: Option<String>,
}

/// Derives identities from request metadata. Pure: no side effects
/// beyond a trace event, no store access.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl IdentityResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a request to an identity.
    ///
    /// Decision order: bearer credential (unverified claim peek, falling
    /// back to a token-hash synthetic id), then API key (hash of the key,
    /// never the raw key), then anonymous (hash of IP + user agent).
    pub fn resolve(&self, meta: &RequestMetadata) -> Identity {
        let client_ip = meta.client_ip.as_deref().unwrap_or("unknown");
        let user_agent = meta.user_agent.as_deref().unwrap_or("unknown");

        let mut metadata = HashMap::new();
        metadata.insert("client_ip".to_owned(), client_ip.to_owned());
        metadata.insert("user_agent".to_owned(), user_agent.to_owned());

        let identity = match meta.authorization.as_deref().map(str::trim) {
            Some(auth) if !auth.is_empty() => {
                if let Some(token) = strip_scheme(auth, "Bearer ") {
                    let user_id = bearer_subject(token).unwrap_or_else(|| {
                        // Upstream verified the token but the claim is not
                        // parseable here: synthesize from its leading bytes.
                        let lead = &token.as_bytes()
                            [..token.len().min(SYNTHETIC_ID_TOKEN_BYTES)];
                        format!("jwt_user_{}", &sha256_hex(lead)[..12])
                    });
                    Identity {
                        user_id,
                        user_type: UserType::AuthenticatedUser,
                        auth_method: AuthMethod::Jwt,
                        metadata,
                    }
                } else if let Some(key) = strip_scheme(auth, "ApiKey ") {
                    let key_hash = sha256_hex(key.as_bytes());
                    metadata.insert("api_key_hash".to_owned(), key_hash[..8].to_owned());
                    Identity {
                        user_id: format!("api_user_{}", &key_hash[..12]),
                        user_type: UserType::ServiceAccount,
                        auth_method: AuthMethod::ApiKey,
                        metadata,
                    }
                } else {
                    // Unrecognized scheme: malformed input is never fatal.
                    anonymous(client_ip, user_agent, metadata)
                }
            }
            _ => anonymous(client_ip, user_agent, metadata),
        };

        TraceEvent::IdentityResolved {
            user_type: identity.user_type.as_str().to_owned(),
            auth_method: identity.auth_method.as_str().to_owned(),
        }
        .emit();

        identity
    }
}

fn anonymous(client_ip: &str, user_agent: &str, metadata: HashMap<String, String>) -> Identity {
    let digest = sha256_hex(format!("{client_ip}:{user_agent}").as_bytes());
    Identity {
        user_id: format!("anonymous_{}", &digest[..12]),
        user_type: UserType::Anonymous,
        auth_method: AuthMethod::Anonymous,
        metadata,
    }
}

/// Case-insensitive scheme prefix match; returns the credential part.
/// Compares on bytes so a multi-byte character straddling the scheme
/// length can never split a char (the slice below is only taken when
/// the prefix matched the all-ASCII scheme byte for byte).
fn strip_scheme<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    if value.len() >= scheme.len()
        && value.as_bytes()[..scheme.len()].eq_ignore_ascii_case(scheme.as_bytes())
    {
        Some(value[scheme.len()..].trim())
    } else {
        None
    }
}

/// Peek the `sub` (or `user_id`) claim out of an unverified JWT payload.
/// This path assumes upstream verification already happened.
fn bearer_subject(token: &str) -> Option<String> {
    let mut parts = token.split('.');
    let _header = parts.next()?;
    let payload = parts.next()?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims
        .get("sub")
        .or_else(|| claims.get("user_id"))
        .and_then(|v| v.as_str())
        .map(str::to_owned)
}

fn sha256_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_sub(sub: &str) -> String {
        let header = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(r#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(format!(r#"{{"sub":"{sub}"}}"#));
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn bearer_extracts_subject_claim() {
        let resolver = IdentityResolver::new();
        let meta = RequestMetadata {
            authorization: Some(format!("Bearer {}", jwt_with_sub("alice"))),
            ..Default::default()
        };
        let identity = resolver.resolve(&meta);
        assert_eq!(identity.user_id, "alice");
        assert_eq!(identity.user_type, UserType::AuthenticatedUser);
        assert_eq!(identity.auth_method, AuthMethod::Jwt);
    }

    #[test]
    fn unparseable_bearer_degrades_to_synthetic_id() {
        let resolver = IdentityResolver::new();
        let meta = RequestMetadata {
            authorization: Some("Bearer not-a-jwt".into()),
            ..Default::default()
        };
        let identity = resolver.resolve(&meta);
        assert!(identity.user_id.starts_with("jwt_user_"));
        assert_eq!(identity.user_type, UserType::AuthenticatedUser);
    }

    #[test]
    fn api_key_never_appears_in_identity() {
        let resolver = IdentityResolver::new();
        let meta = RequestMetadata {
            authorization: Some("ApiKey super-secret-key".into()),
            ..Default::default()
        };
        let identity = resolver.resolve(&meta);
        assert!(identity.user_id.starts_with("api_user_"));
        assert_eq!(identity.user_type, UserType::ServiceAccount);
        assert!(!identity.user_id.contains("super-secret-key"));
        assert!(!identity
            .metadata
            .values()
            .any(|v| v.contains("super-secret-key")));
    }

    #[test]
    fn no_credential_resolves_anonymous() {
        let resolver = IdentityResolver::new();
        let meta = RequestMetadata {
            client_ip: Some("10.0.0.1".into()),
            user_agent: Some("curl/8".into()),
            ..Default::default()
        };
        let identity = resolver.resolve(&meta);
        assert!(identity.user_id.starts_with("anonymous_"));
        assert_eq!(identity.auth_method, AuthMethod::Anonymous);

        // Same (ip, ua) maps to the same identity across calls.
        let again = resolver.resolve(&meta);
        assert_eq!(identity.user_id, again.user_id);
    }

    #[test]
    fn empty_metadata_still_resolves() {
        let resolver = IdentityResolver::new();
        let identity = resolver.resolve(&RequestMetadata::default());
        assert_eq!(identity.user_type, UserType::Anonymous);
    }

    #[test]
    fn hash_partitions_by_full_triple() {
        let base = Identity {
            user_id: "alice".into(),
            user_type: UserType::AuthenticatedUser,
            auth_method: AuthMethod::Jwt,
            metadata: HashMap::new(),
        };
        let mut other_user = base.clone();
        other_user.user_id = "bob".into();
        let mut other_type = base.clone();
        other_type.user_type = UserType::ServiceAccount;
        let mut other_method = base.clone();
        other_method.auth_method = AuthMethod::ApiKey;

        assert_ne!(base.hash(), other_user.hash());
        assert_ne!(base.hash(), other_type.hash());
        assert_ne!(base.hash(), other_method.hash());
        assert_eq!(base.hash(), base.clone().hash());
        assert_eq!(base.hash().len(), 16);
    }

    #[test]
    fn non_ascii_authorization_degrades_to_anonymous() {
        let resolver = IdentityResolver::new();
        // 7th byte lands inside a multi-byte character; must not panic.
        let meta = RequestMetadata {
            authorization: Some("αβγδε".into()),
            ..Default::default()
        };
        let identity = resolver.resolve(&meta);
        assert_eq!(identity.user_type, UserType::Anonymous);

        let meta = RequestMetadata {
            authorization: Some("Béarer token".into()),
            ..Default::default()
        };
        assert_eq!(resolver.resolve(&meta).user_type, UserType::Anonymous);
    }

    #[test]
    fn scheme_match_is_case_insensitive() {
        let resolver = IdentityResolver::new();
        let meta = RequestMetadata {
            authorization: Some(format!("bearer {}", jwt_with_sub("carol"))),
            ..Default::default()
        };
        assert_eq!(resolver.resolve(&meta).user_id, "carol");
    }
}
