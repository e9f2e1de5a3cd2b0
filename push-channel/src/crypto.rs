//! Key material and sealed-envelope decryption
//!
//! The CMS encrypts each push message with a fresh RC4 key and wraps that key
//! with the display's RSA public key (PKCS#1 v1.5), the same scheme as PHP's
//! `openssl_seal`. The display generates its key pair at startup and hands
//! the public half to the CMS during registration.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use md5::{Digest, Md5};
use rand::RngCore;
use rc4::consts::{U16, U20, U32};
use rc4::{KeyInit, Rc4, StreamCipher};
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::error::{PushError, Result};

/// RSA modulus size used when none is given
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Length of the envelope key produced by [`seal`]
pub const SEAL_KEY_LEN: usize = 20;

/// RSA key pair plus its exported public half
#[derive(Clone)]
pub struct PushKeys {
    private: RsaPrivateKey,
    public: RsaPublicKey,
    public_pem: String,
}

impl std::fmt::Debug for PushKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushKeys")
            .field("public_pem", &self.public_pem)
            .finish_non_exhaustive()
    }
}

impl PushKeys {
    /// Generate a fresh key pair
    pub fn generate(bits: usize) -> Result<Self> {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| PushError::Key(format!("key generation failed: {}", e)))?;
        Self::from_private(private)
    }

    pub fn from_private(private: RsaPrivateKey) -> Result<Self> {
        let public = private.to_public_key();
        let public_pem = public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| PushError::Key(format!("public key export failed: {}", e)))?;
        Ok(Self {
            private,
            public,
            public_pem,
        })
    }

    /// SubjectPublicKeyInfo PEM sent to the CMS
    pub fn public_key_pem(&self) -> &str {
        &self.public_pem
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Recover the envelope key, then decrypt the sealed payload with it
    pub fn open_sealed(&self, sealed: &[u8], env_key: &[u8]) -> Result<Vec<u8>> {
        let key = self
            .private
            .decrypt(Pkcs1v15Encrypt, env_key)
            .map_err(|e| PushError::Decrypt(format!("envelope key: {}", e)))?;

        let mut data = sealed.to_vec();
        apply_rc4(&key, &mut data)?;
        Ok(data)
    }

    /// Decode and open the base64 `(env_key, sealed)` pair of a push frame
    pub fn open_encoded(&self, env_key: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
        let env_key = decode_base64(env_key)?;
        let sealed = decode_base64(sealed)?;
        self.open_sealed(&sealed, &env_key)
    }
}

/// Encrypt `plain` for the holder of `public`.
///
/// Returns `(sealed, env_key)`; [`PushKeys::open_sealed`] reverses it.
pub fn seal(plain: &[u8], public: &RsaPublicKey) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut rng = rand::thread_rng();
    let mut key = [0u8; SEAL_KEY_LEN];
    rng.fill_bytes(&mut key);

    let mut sealed = plain.to_vec();
    apply_rc4(&key, &mut sealed)?;

    let env_key = public
        .encrypt(&mut rng, Pkcs1v15Encrypt, &key)
        .map_err(|e| PushError::Decrypt(format!("envelope key: {}", e)))?;
    Ok((sealed, env_key))
}

/// Channel name the display listens on: md5 of `"{unix_time} {push_url}"`
pub fn channel_name(unix_time: u64, push_url: &str) -> String {
    let digest = Md5::digest(format!("{} {}", unix_time, push_url).as_bytes());
    format!("{:x}", digest)
}

/// [`channel_name`] for the current time
pub fn new_channel_name(push_url: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    channel_name(now, push_url)
}

fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}

// RC4 is generic over the key length; these are the lengths openssl_seal and
// `seal` actually produce.
fn apply_rc4(key: &[u8], data: &mut [u8]) -> Result<()> {
    let invalid = |_| PushError::Decrypt(format!("unsupported RC4 key length {}", key.len()));
    match key.len() {
        16 => Rc4::<U16>::new_from_slice(key)
            .map_err(invalid)?
            .apply_keystream(data),
        20 => Rc4::<U20>::new_from_slice(key)
            .map_err(invalid)?
            .apply_keystream(data),
        32 => Rc4::<U32>::new_from_slice(key)
            .map_err(invalid)?
            .apply_keystream(data),
        other => {
            return Err(PushError::Decrypt(format!(
                "unsupported RC4 key length {}",
                other
            )))
        }
    }
    Ok(())
}
