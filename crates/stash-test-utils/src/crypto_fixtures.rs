//! Deterministic RSA fixtures for signing test tokens.
//!
//! Two fixed 2048-bit keys live under `fixtures/`: a primary key and a
//! rotated key. The private keys are PKCS#1 PEM; the `.n` files hold the
//! matching base64url moduli for the JWKS documents. Both use e = 65537.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

const PRIMARY_PEM: &str = include_str!("../fixtures/primary_rsa.pem");
const PRIMARY_N: &str = include_str!("../fixtures/primary_rsa.n");
const ROTATED_PEM: &str = include_str!("../fixtures/rotated_rsa.pem");
const ROTATED_N: &str = include_str!("../fixtures/rotated_rsa.n");

/// Public exponent 65537, base64url.
pub const RSA_EXPONENT: &str = "AQAB";

/// RSA keypair with a key ID, for signing RS256 test tokens.
#[derive(Debug, Clone)]
pub struct TestKeypair {
    pub kid: String,
    private_pem: &'static str,
    modulus: &'static str,
}

impl TestKeypair {
    /// The primary signing key under `kid`.
    pub fn primary(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            private_pem: PRIMARY_PEM,
            modulus: PRIMARY_N.trim(),
        }
    }

    /// A second, unrelated key; use it for rotation and wrong-key cases.
    pub fn rotated(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            private_pem: ROTATED_PEM,
            modulus: ROTATED_N.trim(),
        }
    }

    /// Sign `claims` as an RS256 JWT with this key's `kid` in the header.
    pub fn sign(&self, claims: &serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());
        self.sign_with_header(&header, claims)
    }

    /// Sign with an explicit header (e.g. no `kid`).
    pub fn sign_with_header(&self, header: &Header, claims: &serde_json::Value) -> String {
        let encoding_key = EncodingKey::from_rsa_pem(self.private_pem.as_bytes())
            .expect("fixture PEM should be a valid RSA private key");

        encode(header, claims, &encoding_key).expect("Failed to sign token")
    }

    /// The public JWK for this key.
    pub fn jwk_json(&self) -> serde_json::Value {
        serde_json::json!({
            "kty": "RSA",
            "kid": self.kid,
            "alg": "RS256",
            "use": "sig",
            "n": self.modulus,
            "e": RSA_EXPONENT,
        })
    }

    /// The public JWK published under a different `kid`.
    ///
    /// Pairs a token's `kid` with the wrong public key, so the signature
    /// check fails.
    pub fn jwk_json_as(&self, kid: &str) -> serde_json::Value {
        let mut jwk = self.jwk_json();
        jwk["kid"] = serde_json::Value::String(kid.to_string());
        jwk
    }
}
