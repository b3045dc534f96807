//! Signed-URL resolution for stored assets.
//!
//! Documents persist a permanent versioned URL shaped like
//! `<base>/raw/upload/v<ts>/<path>.pdf`. Responses never expose it directly;
//! [`UrlSigner::sign`] rewrites it into a time-limited variant carrying a
//! signature token and an expiry timestamp. Signing is a pure transform: a
//! reference that does not match the expected shape is returned unmodified
//! rather than failing the request.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// A time-limited public URL plus its advertised validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_in: Duration,
}

#[derive(Debug, Clone)]
pub struct UrlSigner {
    secret: String,
    url_ttl: Duration,
}

impl UrlSigner {
    pub fn new(secret: impl Into<String>, url_ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            url_ttl,
        }
    }

    /// Advertised lifetime of every URL this signer produces. Cache TTLs for
    /// record projections must stay strictly below this.
    pub fn url_ttl(&self) -> Duration {
        self.url_ttl
    }

    pub fn sign(&self, file_url: &str) -> SignedUrl {
        let expires_at = unix_now().saturating_add(self.url_ttl.as_secs());
        self.sign_at(file_url, expires_at)
    }

    /// Deterministic variant used by `sign` and the tests: two signatures of
    /// the same permanent reference at the same expiry are identical, and two
    /// at different expiries target the same object with different tokens.
    fn sign_at(&self, file_url: &str, expires_at: u64) -> SignedUrl {
        let Some((base, public_id)) = split_public_id(file_url) else {
            return SignedUrl {
                url: file_url.to_string(),
                expires_in: self.url_ttl,
            };
        };

        let token = self.token(public_id, expires_at);
        SignedUrl {
            url: format!("{base}/upload/s--{token}--/exp{expires_at}/{public_id}.pdf"),
            expires_in: self.url_ttl,
        }
    }

    fn token(&self, public_id: &str, expires_at: u64) -> String {
        let digest = Sha256::digest(format!("{public_id}:{expires_at}:{}", self.secret));
        let mut token = URL_SAFE_NO_PAD.encode(digest);
        token.truncate(16);
        token
    }
}

/// Recover `(base, public_id)` from a permanent asset URL: split on
/// `/upload/`, drop the leading version segment (`v<digits>/`) and the
/// trailing `.pdf` extension. Returns `None` for references of any other
/// shape, which callers pass through unsigned.
fn split_public_id(file_url: &str) -> Option<(&str, &str)> {
    let (base, rest) = file_url.split_once("/upload/")?;
    let rest = strip_version_segment(rest);
    let public_id = rest.strip_suffix(".pdf").unwrap_or(rest);
    if public_id.is_empty() {
        return None;
    }
    Some((base, public_id))
}

fn strip_version_segment(path: &str) -> &str {
    let Some(candidate) = path.strip_prefix('v') else {
        return path;
    };
    match candidate.split_once('/') {
        Some((digits, rest)) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            rest
        }
        _ => path,
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
