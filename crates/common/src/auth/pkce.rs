//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636 for secure OAuth authorization without client secrets.
//! Used for native applications where client secrets cannot be safely stored.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Unreserved URI characters allowed in verifiers and state nonces (RFC 3986)
pub const URL_SAFE_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-._~";

/// Length of the generated code verifier
pub const CODE_VERIFIER_LENGTH: usize = 64;

/// Length of the generated anti-CSRF state nonce
pub const STATE_LENGTH: usize = 24;

/// Sample `length` characters uniformly from [`URL_SAFE_ALPHABET`]
///
/// Uses the operating system CSPRNG, so the output is suitable for PKCE
/// verifiers and state nonces.
#[must_use]
pub fn random_url_safe_string(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| char::from(URL_SAFE_ALPHABET[rng.gen_range(0..URL_SAFE_ALPHABET.len())]))
        .collect()
}

/// Compute the S256 code challenge for a verifier
///
/// Per RFC 7636, the challenge is BASE64URL(SHA256(ASCII(code_verifier)))
/// without padding.
#[must_use]
pub fn pkce_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Validate that the state token matches
///
/// The nonce is single-use and short-lived, so plain equality is enough.
#[must_use]
pub fn validate_state(expected: &str, actual: &str) -> bool {
    expected == actual
}

/// PKCE challenge pair plus the state nonce for one authorization attempt
#[derive(Debug, Clone)]
pub struct PKCEChallenge {
    /// Random verifier, kept secret until token exchange
    pub code_verifier: String,

    /// SHA256 hash of `code_verifier` (base64url), sent in the authorization
    /// request
    pub code_challenge: String,

    /// Random CSRF protection token
    pub state: String,
}

impl PKCEChallenge {
    /// Generate a fresh verifier, its challenge and a state nonce
    ///
    /// # Examples
    /// ```
    /// use authflow_common::auth::pkce::PKCEChallenge;
    ///
    /// let challenge = PKCEChallenge::generate();
    /// assert_eq!(challenge.code_verifier.len(), 64);
    /// assert_eq!(challenge.state.len(), 24);
    /// ```
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = random_url_safe_string(CODE_VERIFIER_LENGTH);
        let code_challenge = pkce_challenge(&code_verifier);
        let state = random_url_safe_string(STATE_LENGTH);

        Self { code_verifier, code_challenge, state }
    }

    /// Get the challenge method (always "S256" for SHA256)
    #[must_use]
    pub fn challenge_method(&self) -> &str {
        "S256"
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::pkce.
    use super::*;

    /// Validates `random_url_safe_string` behavior for the length and
    /// alphabet scenario.
    ///
    /// Assertions:
    /// - Confirms every requested length is produced exactly.
    /// - Ensures every character belongs to the URL-safe alphabet.
    #[test]
    fn test_random_string_length_and_alphabet() {
        for length in [0, 1, 24, 43, 64, 128] {
            let value = random_url_safe_string(length);
            assert_eq!(value.chars().count(), length);
            assert!(value.bytes().all(|b| URL_SAFE_ALPHABET.contains(&b)));
        }
    }

    /// Validates `PKCEChallenge::generate` behavior for the unique challenges
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms verifiers, challenges and states differ between calls.
    #[test]
    fn test_unique_challenges() {
        let challenge1 = PKCEChallenge::generate();
        let challenge2 = PKCEChallenge::generate();

        assert_ne!(challenge1.code_verifier, challenge2.code_verifier);
        assert_ne!(challenge1.code_challenge, challenge2.code_challenge);
        assert_ne!(challenge1.state, challenge2.state);
    }

    /// Validates `pkce_challenge` against the RFC 7636 appendix B vector.
    ///
    /// Assertions:
    /// - Confirms the known verifier hashes to the published challenge.
    #[test]
    fn test_rfc7636_vector() {
        let verifier = "dBjftJeZ4CVP-mJ92K9qQDkRqgcE0aQu2cPl7Ri2Y_s";
        assert_eq!(pkce_challenge(verifier), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    /// Validates the base64url encoding of challenges.
    ///
    /// Assertions:
    /// - Ensures no `+`, `/` or `=` appear in any challenge.
    /// - Confirms a SHA-256 digest encodes to 43 characters.
    #[test]
    fn test_base64url_encoding() {
        for _ in 0..32 {
            let challenge = PKCEChallenge::generate();
            assert!(!challenge.code_challenge.contains('='));
            assert!(!challenge.code_challenge.contains('+'));
            assert!(!challenge.code_challenge.contains('/'));
            assert_eq!(challenge.code_challenge.len(), 43);
        }
    }

    /// Validates the code challenge deterministic scenario.
    ///
    /// Assertions:
    /// - Confirms `challenge.code_challenge` equals the recomputed value.
    #[test]
    fn test_code_challenge_deterministic() {
        let challenge = PKCEChallenge::generate();
        assert_eq!(challenge.code_challenge, pkce_challenge(&challenge.code_verifier));
        assert_eq!(challenge.challenge_method(), "S256");
    }

    #[test]
    fn test_validate_state() {
        assert!(validate_state("abc", "abc"));
        assert!(!validate_state("abc", "abd"));
        assert!(!validate_state("abc", ""));
    }
}
