//! Release webhook authentication and parsing.
//!
//! Deliveries are signed with HMAC-SHA256 over the raw body and carry the
//! result as `x-hub-signature-256: sha256=<hex>`. Only a `released`
//! action starts a backfill; the other accepted actions are acknowledged
//! and ignored.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::types::Version;
use crate::{Result, ScaffdiffError};

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

type HmacSha256 = Hmac<Sha256>;

/// Signature header value for `body` under `secret`.
pub fn compute_signature(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .map_err(|e| ScaffdiffError::Configuration(format!("invalid webhook secret: {e}")))?;
    mac.update(body);
    Ok(format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Check a delivery's signature header in constant time.
///
/// Fails with [`ScaffdiffError::InvalidSignature`] when the header is
/// missing or does not match.
pub fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> Result<()> {
    let header = header.ok_or(ScaffdiffError::InvalidSignature)?;
    let expected = compute_signature(secret, body)?;
    if bool::from(expected.as_bytes().ct_eq(header.trim().as_bytes())) {
        Ok(())
    } else {
        Err(ScaffdiffError::InvalidSignature)
    }
}

/// Release lifecycle actions the webhook accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseAction {
    Published,
    Created,
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub name: String,
}

impl Release {
    /// Version published by this release, from a `{package}@{version}` name.
    pub fn version(&self) -> Result<Version> {
        let (_, version) = self.name.rsplit_once('@').ok_or_else(|| {
            ScaffdiffError::InvalidEvent(format!("release name '{}' has no version", self.name))
        })?;
        version.parse().map_err(|_| {
            ScaffdiffError::InvalidEvent(format!(
                "release name '{}' has an invalid version",
                self.name
            ))
        })
    }
}

/// The parts of a release delivery that matter here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseEvent {
    pub action: ReleaseAction,
    pub release: Release,
}

impl ReleaseEvent {
    pub fn triggers_backfill(&self) -> bool {
        self.action == ReleaseAction::Released
    }
}

/// Parse a delivery body; unknown actions and missing fields are rejected.
pub fn parse_release_event(body: &[u8]) -> Result<ReleaseEvent> {
    serde_json::from_slice(body).map_err(|e| ScaffdiffError::InvalidEvent(e.to_string()))
}
