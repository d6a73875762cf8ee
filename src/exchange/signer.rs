use anyhow::{Context, Result};
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// API credentials. Secret material stays wrapped until the moment it is used.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: SecretString,
    pub passphrase: SecretString,
}

impl Credentials {
    pub fn new(api_key: String, secret_key: String, passphrase: String) -> Self {
        Self {
            api_key,
            secret_key: SecretString::new(secret_key),
            passphrase: SecretString::new(passphrase),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OKEX_API_KEY").context("OKEX_API_KEY not set")?;
        let secret_key = std::env::var("OKEX_API_SECRET").context("OKEX_API_SECRET not set")?;
        let passphrase = std::env::var("OKEX_PASSPHRASE").context("OKEX_PASSPHRASE not set")?;

        Ok(Self {
            api_key,
            secret_key: SecretString::new(secret_key),
            passphrase: SecretString::new(passphrase),
        })
    }
}

#[derive(Clone)]
pub struct OkexSigner {
    secret_key: SecretString,
}

impl OkexSigner {
    pub fn new(secret_key: SecretString) -> Self {
        Self { secret_key }
    }

    /// OK-ACCESS-SIGN payload: `timestamp + UPPER(method) + request_path + body`,
    /// HMAC-SHA256 with the secret key, Base64 encoded.
    pub fn sign(&self, timestamp: &str, method: &str, request_path: &str, body: &str) -> Result<String> {
        let message = format!("{}{}{}{}", timestamp, method.to_uppercase(), request_path, body);
        let mut mac = HmacSha256::new_from_slice(self.secret_key.expose_secret().as_bytes())
            .context("hmac init")?;
        mac.update(message.as_bytes());
        Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }
}
