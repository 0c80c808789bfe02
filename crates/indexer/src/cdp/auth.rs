// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bearer tokens for the CDP API.
//!
//! Each request carries a short-lived JWT signed with the API key secret. The token is bound to
//! the request method, host and path through its `uris` claim.

use std::sync::Mutex;

use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD},
    Engine as _,
};
use ed25519_dalek::Signer as _;
use p256::{ecdsa::signature::Signer as _, pkcs8::DecodePrivateKey};
use serde::Serialize;

use super::CdpError;

/// Lifetime of a signed token, in seconds.
pub const TOKEN_LIFETIME_SECS: u64 = 120;

/// Tokens closer than this to expiry are re-signed before use.
pub const TOKEN_REFRESH_MARGIN_SECS: u64 = 30;

/// A CDP API key pair.
#[derive(Clone)]
pub struct CdpCredentials {
    pub key_id: String,
    pub key_secret: String,
}

impl std::fmt::Debug for CdpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpCredentials")
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .finish()
    }
}

/// The request a token authorizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub method: String,
    pub host: String,
    pub path: String,
}

impl RequestTarget {
    fn uri(&self) -> String {
        format!("{} {}{}", self.method, self.host, self.path)
    }
}

#[derive(Serialize)]
struct JwtHeader<'a> {
    alg: &'static str,
    kid: &'a str,
    typ: &'static str,
    nonce: String,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    sub: &'a str,
    iss: &'static str,
    nbf: u64,
    exp: u64,
    uris: Vec<String>,
}

/// Private half of a CDP API key.
enum ApiKey {
    Ed25519(ed25519_dalek::SigningKey),
    Es256(p256::ecdsa::SigningKey),
}

impl ApiKey {
    /// PEM secrets are ECDSA P-256 keys, in SEC1 or PKCS#8 form. Anything else is read as the
    /// base64 encoding of a 32-byte Ed25519 seed or the 64-byte seed-and-public-key form.
    fn parse(secret: &str) -> Result<Self, CdpError> {
        if secret.starts_with("-----BEGIN") {
            // Secrets copied into `.env` files often carry escaped line breaks.
            let pem = secret.replace("\\n", "\n");
            let key = if pem.contains("BEGIN EC PRIVATE KEY") {
                p256::SecretKey::from_sec1_pem(&pem).map_err(|e| e.to_string())
            } else {
                p256::SecretKey::from_pkcs8_pem(&pem).map_err(|e| e.to_string())
            }
            .map_err(|e| CdpError::InvalidCredentials(format!("ECDSA API key secret: {e}")))?;
            return Ok(Self::Es256(key.into()));
        }

        let bytes = BASE64
            .decode(secret)
            .map_err(|e| CdpError::InvalidCredentials(format!("API key secret: {e}")))?;
        let mut seed = [0u8; 32];
        match bytes.len() {
            32 | 64 => seed.copy_from_slice(&bytes[..32]),
            n => {
                return Err(CdpError::InvalidCredentials(format!(
                    "API key secret decodes to {n} bytes, expected 32 or 64"
                )))
            }
        }
        Ok(Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed)))
    }

    fn algorithm(&self) -> &'static str {
        match self {
            Self::Ed25519(_) => "EdDSA",
            Self::Es256(_) => "ES256",
        }
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Self::Ed25519(key) => key.sign(message).to_bytes().to_vec(),
            Self::Es256(key) => {
                let signature: p256::ecdsa::Signature = key.sign(message);
                signature.to_bytes().to_vec()
            }
        }
    }
}

/// Signs CDP bearer tokens with an Ed25519 or ECDSA P-256 API key.
pub struct TokenSigner {
    key_id: String,
    key: ApiKey,
}

impl TokenSigner {
    /// Builds a signer from a credential pair. The key type is picked from the secret's format.
    pub fn new(credentials: &CdpCredentials) -> Result<Self, CdpError> {
        if credentials.key_id.trim().is_empty() {
            return Err(CdpError::InvalidCredentials("API key name is empty".into()));
        }
        let key = ApiKey::parse(credentials.key_secret.trim())?;
        Ok(Self { key_id: credentials.key_id.trim().to_string(), key })
    }

    /// Signs a token for `target` valid from `now` for [TOKEN_LIFETIME_SECS].
    pub fn sign(&self, target: &RequestTarget, now: u64) -> Result<String, CdpError> {
        let nonce: [u8; 16] = rand::random();
        let header = JwtHeader {
            alg: self.key.algorithm(),
            kid: &self.key_id,
            typ: "JWT",
            nonce: hex::encode(nonce),
        };
        let claims = JwtClaims {
            sub: &self.key_id,
            iss: "cdp",
            nbf: now,
            exp: now + TOKEN_LIFETIME_SECS,
            uris: vec![target.uri()],
        };

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let signature = self.key.sign(signing_input.as_bytes());
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }
}

struct CachedToken {
    token: String,
    expires_at: u64,
}

/// Reuses a signed token until it gets close to expiry.
pub struct TokenCache {
    signer: TokenSigner,
    target: RequestTarget,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(signer: TokenSigner, target: RequestTarget) -> Self {
        Self { signer, target, cached: Mutex::new(None) }
    }

    /// Returns a token that stays valid for at least [TOKEN_REFRESH_MARGIN_SECS] after `now`.
    pub fn bearer_token(&self, now: u64) -> Result<String, CdpError> {
        let mut cached = self.cached.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(token) = cached.as_ref() {
            if token.expires_at > now + TOKEN_REFRESH_MARGIN_SECS {
                return Ok(token.token.clone());
            }
            tracing::debug!("CDP token expires at {}, signing a new one", token.expires_at);
        }
        let token = self.signer.sign(&self.target, now)?;
        *cached =
            Some(CachedToken { token: token.clone(), expires_at: now + TOKEN_LIFETIME_SECS });
        Ok(token)
    }
}

#[cfg(test)]
pub(crate) fn test_credentials() -> CdpCredentials {
    let signing_key = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]);
    let mut secret = signing_key.to_bytes().to_vec();
    secret.extend_from_slice(signing_key.verifying_key().as_bytes());
    CdpCredentials {
        key_id: "organizations/test/apiKeys/key-1".into(),
        key_secret: BASE64.encode(secret),
    }
}
