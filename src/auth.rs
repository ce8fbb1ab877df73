//! Optional bearer-token identity
//!
//! Tokens are HS256 JWTs carrying a `userId` (or `sub`) claim. Anything
//! missing, malformed or expired degrades to [`Identity::Anonymous`]; no
//! endpoint requires authentication.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("token is not three dot-separated segments")]
    Malformed,

    #[error("token segment is not valid base64url")]
    Encoding,

    #[error("token header or claims are not valid JSON")]
    Json,

    #[error("unsupported token algorithm {0:?}")]
    Algorithm(String),

    #[error("token signature mismatch")]
    Signature,

    #[error("token expired")]
    Expired,

    #[error("token has no user id claim")]
    MissingSubject,
}

/// Who made a request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    User(String),
    #[default]
    Anonymous,
}

impl Identity {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::User(id) => Some(id),
            Identity::Anonymous => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiry, unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// HS256 token verifier
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Vec<u8>,
}

impl TokenVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC-SHA256 takes keys of any size"),
        }
    }

    /// Issue a token for `claims`
    pub fn sign(&self, claims: &Claims) -> String {
        let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = general_purpose::URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(claims).unwrap_or_default());
        let signing_input = format!("{}.{}", header, body);

        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        let signature = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}", signing_input, signature)
    }

    /// Check signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut parts = token.split('.');
        let (header, body, signature) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(h), Some(b), Some(s), None) => (h, b, s),
            _ => return Err(AuthError::Malformed),
        };

        let header: Header = serde_json::from_slice(&decode(header)?).map_err(|_| AuthError::Json)?;
        if header.alg != "HS256" {
            return Err(AuthError::Algorithm(header.alg));
        }

        let mut mac = self.mac();
        mac.update(token[..token.len() - signature.len() - 1].as_bytes());
        mac.verify_slice(&decode(signature)?)
            .map_err(|_| AuthError::Signature)?;

        let claims: Claims = serde_json::from_slice(&decode(body)?).map_err(|_| AuthError::Json)?;
        if let Some(exp) = claims.exp {
            if exp <= Utc::now().timestamp() {
                return Err(AuthError::Expired);
            }
        }
        Ok(claims)
    }

    /// User id from a valid token
    pub fn user_id(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.verify(token)?;
        claims
            .user_id
            .or(claims.sub)
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::MissingSubject)
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

fn decode(segment: &str) -> Result<Vec<u8>, AuthError> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::Encoding)
}

/// Resolve the caller from an `Authorization: Bearer` header
pub fn identity_from_headers(headers: &HeaderMap, verifier: Option<&TokenVerifier>) -> Identity {
    let Some(verifier) = verifier else {
        return Identity::Anonymous;
    };
    let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    else {
        return Identity::Anonymous;
    };

    match verifier.user_id(token.trim()) {
        Ok(id) => Identity::User(id),
        Err(e) => {
            debug!(error = %e, "Ignoring bearer token");
            Identity::Anonymous
        }
    }
}
