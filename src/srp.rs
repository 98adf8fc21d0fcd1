//! Client side of the Cognito `USER_SRP_AUTH` flow.
//!
//! Cognito uses SRP-6a over the RFC 5054 3072-bit group with SHA-256, a
//! HKDF-derived session key and an HMAC signature over the challenge.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

const N_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9",
    "DE2BCBF6955817183995497CEA956AE515D2261898FA0510",
    "15728E5A8AAAC42DAD33170D04507A33A85521ABDF1CBA64",
    "ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7",
    "ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6B",
    "F12FFA06D98A0864D87602733EC86A64521F2B18177B200C",
    "BBE117577A615D6C770988C0BAD946E208E24FA074E5AB31",
    "43DB5BFCE0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF",
);
const G_HEX: &str = "2";
const DERIVED_KEY_INFO: &[u8] = b"Caldera Derived Key";
const TIMESTAMP_FORMAT: &str = "%a %b %-d %H:%M:%S UTC %Y";

/// Values needed to answer a `PASSWORD_VERIFIER` challenge.
#[derive(Debug, Clone)]
pub struct PasswordVerifierChallenge {
    pub salt: String,
    pub secret_block: String,
    pub srp_b: String,
    pub user_id_for_srp: String,
}

/// Signed answer to a `PASSWORD_VERIFIER` challenge.
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordClaim {
    pub timestamp: String,
    pub username: String,
    pub secret_block: String,
    pub signature: String,
}

pub struct SrpClient {
    pool_name: String,
    n: BigUint,
    g: BigUint,
    k: BigUint,
    a: BigUint,
    big_a: BigUint,
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

fn is_zero(value: &BigUint) -> bool {
    value.bits() == 0
}

fn hex_to_bytes(hex: &str) -> Result<Vec<u8>> {
    if !hex.is_ascii() || hex.len() % 2 != 0 {
        return Err(Error::Auth(format!("invalid hex string: {}", hex)));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| Error::Auth(format!("invalid hex string: {}", hex)))
        })
        .collect()
}

fn hex_hash(hex: &str) -> Result<String> {
    Ok(sha256_hex(&hex_to_bytes(hex)?))
}

fn hex_to_big(hex: &str) -> Result<BigUint> {
    BigUint::parse_bytes(hex.as_bytes(), 16)
        .ok_or_else(|| Error::Auth(format!("invalid hex number: {}", hex)))
}

/// Hex encoding Cognito expects: even length and never read as negative.
pub fn pad_hex(hex: &str) -> String {
    if hex.len() % 2 == 1 {
        format!("0{}", hex)
    } else if hex.starts_with(|c: char| matches!(c, '8' | '9' | 'a'..='f' | 'A'..='F')) {
        format!("00{}", hex)
    } else {
        hex.to_string()
    }
}

fn pad_big(value: &BigUint) -> String {
    pad_hex(&format!("{:x}", value))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| Error::Auth(format!("HMAC key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// HKDF-SHA256 with a single 16-byte output block.
fn compute_hkdf(ikm: &[u8], salt: &[u8]) -> Result<Vec<u8>> {
    let prk = hmac_sha256(salt, ikm)?;
    let mut info = DERIVED_KEY_INFO.to_vec();
    info.push(1);
    let okm = hmac_sha256(&prk, &info)?;
    Ok(okm[..16].to_vec())
}

pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

impl SrpClient {
    /// Start a new exchange with a random ephemeral key.
    pub fn new(user_pool_id: &str) -> Result<Self> {
        let mut bytes = [0u8; 128];
        rand::rng().fill_bytes(&mut bytes);
        Self::with_private_key(user_pool_id, BigUint::from_bytes_be(&bytes))
    }

    pub fn with_private_key(user_pool_id: &str, a: BigUint) -> Result<Self> {
        let pool_name = user_pool_id
            .split_once('_')
            .map(|(_, name)| name.to_string())
            .ok_or_else(|| Error::Auth(format!("invalid user pool id: {}", user_pool_id)))?;

        let n = hex_to_big(N_HEX)?;
        let g = hex_to_big(G_HEX)?;
        let k = hex_to_big(&hex_hash(&format!("00{}0{}", N_HEX, G_HEX))?)?;
        let big_a = g.modpow(&a, &n);
        if is_zero(&(&big_a % &n)) {
            return Err(Error::Auth("safety check for A failed".to_string()));
        }

        Ok(Self {
            pool_name,
            n,
            g,
            k,
            a,
            big_a,
        })
    }

    /// `SRP_A` parameter for `InitiateAuth`.
    pub fn srp_a(&self) -> String {
        format!("{:x}", self.big_a)
    }

    fn password_authentication_key(
        &self,
        username: &str,
        password: &str,
        server_b: &BigUint,
        salt: &str,
    ) -> Result<Vec<u8>> {
        let u = hex_to_big(&hex_hash(&(pad_big(&self.big_a) + &pad_big(server_b)))?)?;
        if is_zero(&u) {
            return Err(Error::Auth("U cannot be zero".to_string()));
        }

        let credentials = format!("{}{}:{}", self.pool_name, username, password);
        let credentials_hash = sha256_hex(credentials.as_bytes());
        let x = hex_to_big(&hex_hash(&(pad_hex(salt) + &credentials_hash))?)?;

        let g_mod_pow_x = self.g.modpow(&x, &self.n);
        let k_g_x = (&self.k * g_mod_pow_x) % &self.n;
        let base = ((server_b % &self.n) + &self.n - k_g_x) % &self.n;
        let exponent = &self.a + &u * &x;
        let s = base.modpow(&exponent, &self.n);

        compute_hkdf(&hex_to_bytes(&pad_big(&s))?, &hex_to_bytes(&pad_big(&u))?)
    }

    /// Sign the server challenge with the password-derived key.
    pub fn process_challenge(
        &self,
        challenge: &PasswordVerifierChallenge,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<PasswordClaim> {
        let server_b = hex_to_big(&challenge.srp_b)?;
        if is_zero(&(&server_b % &self.n)) {
            return Err(Error::Auth("safety check for B failed".to_string()));
        }

        let key = self.password_authentication_key(
            &challenge.user_id_for_srp,
            password,
            &server_b,
            &challenge.salt,
        )?;

        let timestamp = format_timestamp(now);
        let secret_block = STANDARD
            .decode(&challenge.secret_block)
            .map_err(|e| Error::Auth(format!("invalid secret block: {}", e)))?;

        let mut message = Vec::new();
        message.extend_from_slice(self.pool_name.as_bytes());
        message.extend_from_slice(challenge.user_id_for_srp.as_bytes());
        message.extend_from_slice(&secret_block);
        message.extend_from_slice(timestamp.as_bytes());

        let signature = STANDARD.encode(hmac_sha256(&key, &message)?);

        Ok(PasswordClaim {
            timestamp,
            username: challenge.user_id_for_srp.clone(),
            secret_block: challenge.secret_block.clone(),
            signature,
        })
    }
}
