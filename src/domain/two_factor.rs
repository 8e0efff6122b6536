//! Time-based one-time passwords (RFC 6238) for two-factor authentication.
//!
//! Secrets are stored base32-encoded, the form authenticator apps expect.
//! Codes use HMAC-SHA256, a 30 second step, and 6 digits.

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use url::Url;

use crate::config::{
    TOTP_DIGITS, TOTP_ISSUER, TOTP_SECRET_BYTES, TOTP_SKEW_STEPS, TOTP_STEP_SECONDS,
};
use crate::errors::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Shared TOTP secret.
#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TotpSecret")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl TotpSecret {
    /// Generate a fresh random secret.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; TOTP_SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Decode a stored base32 secret.
    pub fn from_base32(encoded: &str) -> AppResult<Self> {
        let normalized = encoded.trim().trim_end_matches('=').to_ascii_uppercase();
        let bytes = BASE32_NOPAD
            .decode(normalized.as_bytes())
            .map_err(|_| AppError::internal("Stored two-factor secret is not valid base32"))?;
        if bytes.is_empty() {
            return Err(AppError::internal("Stored two-factor secret is empty"));
        }
        Ok(Self { bytes })
    }

    pub fn to_base32(&self) -> String {
        BASE32_NOPAD.encode(&self.bytes)
    }

    /// `otpauth://` URI for QR provisioning.
    pub fn provisioning_uri(&self, account: &str) -> AppResult<String> {
        let mut uri = Url::parse("otpauth://totp/")
            .map_err(|e| AppError::internal(format!("Invalid provisioning URI: {}", e)))?;
        uri.set_path(&format!("{}:{}", TOTP_ISSUER, account));
        uri.query_pairs_mut()
            .append_pair("secret", &self.to_base32())
            .append_pair("issuer", TOTP_ISSUER)
            .append_pair("algorithm", "SHA256")
            .append_pair("digits", &TOTP_DIGITS.to_string())
            .append_pair("period", &TOTP_STEP_SECONDS.to_string());
        Ok(uri.into())
    }

    /// Time step a unix timestamp falls in.
    pub fn step_at(unix_seconds: i64) -> i64 {
        unix_seconds.div_euclid(TOTP_STEP_SECONDS)
    }

    /// Code for a unix timestamp.
    pub fn code_at(&self, unix_seconds: i64) -> AppResult<String> {
        self.code_for_counter(Self::step_at(unix_seconds) as u64)
    }

    /// Check a user-supplied code, tolerating small clock drift.
    ///
    /// Returns the time step the code belongs to. Callers record it so the
    /// same code cannot be used twice.
    pub fn verify(&self, code: &str, unix_seconds: i64) -> Option<i64> {
        let code = code.trim();
        if code.len() != TOTP_DIGITS as usize || !code.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let current = Self::step_at(unix_seconds);
        (-TOTP_SKEW_STEPS..=TOTP_SKEW_STEPS)
            .map(|skew| current + skew)
            .find(|&step| {
                matches!(
                    self.code_for_counter(step as u64),
                    Ok(expected) if bool::from(expected.as_bytes().ct_eq(code.as_bytes()))
                )
            })
    }

    fn code_for_counter(&self, counter: u64) -> AppResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.bytes)
            .map_err(|e| AppError::internal(format!("Invalid two-factor key: {}", e)))?;
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        let offset = (digest[digest.len() - 1] & 0x0f) as usize;
        let binary = (u32::from(digest[offset] & 0x7f) << 24)
            | (u32::from(digest[offset + 1]) << 16)
            | (u32::from(digest[offset + 2]) << 8)
            | u32::from(digest[offset + 3]);
        let code = binary % 10u32.pow(TOTP_DIGITS);

        Ok(format!("{:0width$}", code, width = TOTP_DIGITS as usize))
    }
}
