//! Channel payload decryption for packets that arrive without a plaintext `decoded` section.
//!
//! Packets are AES-128-CTR encrypted with the channel's pre-shared key. The first four bytes of
//! the encrypted section are the nonce; the counter block is the nonce followed by twelve zero
//! bytes.

use aes::Aes128;
use ctr::cipher::{KeyIvInit as _, StreamCipher as _};
use sha2::{Digest as _, Sha256};
use tracing::debug;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

const NONCE_LEN: usize = 4;
const KEY_LEN: usize = 16;

/// How the 16 byte AES key is obtained from the configured PSK.
///
/// Deployments disagree on this, so it is chosen at startup rather than fixed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum KeyDerivation {
    /// Truncate or zero-pad the PSK to 16 bytes.
    #[default]
    Raw,
    /// First 16 bytes of SHA-256 over the PSK.
    Sha256,
}

pub fn derive_key(psk: &[u8], derivation: KeyDerivation) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    match derivation {
        KeyDerivation::Raw => {
            let len = psk.len().min(KEY_LEN);
            key[..len].copy_from_slice(&psk[..len]);
        }
        KeyDerivation::Sha256 => {
            key.copy_from_slice(&Sha256::digest(psk)[..KEY_LEN]);
        }
    }
    key
}

pub fn decrypt(
    ciphertext_with_nonce: &[u8],
    psk: &[u8],
    derivation: KeyDerivation,
) -> Option<Vec<u8>> {
    let Some((nonce, ciphertext)) = ciphertext_with_nonce.split_first_chunk::<NONCE_LEN>() else {
        debug!(
            "encrypted payload too short: expected at least {NONCE_LEN} bytes, got {}",
            ciphertext_with_nonce.len()
        );
        return None;
    };

    let mut iv = [0u8; 16];
    iv[..NONCE_LEN].copy_from_slice(nonce);
    let key = derive_key(psk, derivation);

    let mut cipher = Aes128Ctr::new(&key.into(), &iv.into());
    let mut plaintext = ciphertext.to_vec();
    if let Err(err) = cipher.try_apply_keystream(&mut plaintext) {
        debug!("decryption failed: {err}");
        return None;
    }

    debug!(
        "decrypted {} bytes → {} bytes",
        ciphertext.len(),
        plaintext.len()
    );
    Some(plaintext)
}
