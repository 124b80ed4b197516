// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet signature verification for SS58 accounts.
//!
//! The verifier decodes the SS58 address to its 32-byte account id and
//! tries each supported scheme in turn: sr25519, ed25519, then ecdsa
//! (secp256k1, where the account id is the blake2-256 of the compressed
//! public key). Wallets that sign raw text usually wrap it as
//! `<Bytes>…</Bytes>` first, so both the bare and wrapped forms are checked.
//! No normalisation is applied to the message.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Blake2b512, Digest};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey as EcdsaVerifyingKey};

use super::error::ChallengeError;

/// Signing context used by Substrate sr25519 keys.
const SUBSTRATE_CONTEXT: &[u8] = b"substrate";
const SS58_CHECKSUM_PREFIX: &[u8] = b"SS58PRE";
const SS58_CHECKSUM_LEN: usize = 2;
const ACCOUNT_ID_LEN: usize = 32;

type Blake2b256 = Blake2b<U32>;

/// Signature scheme that accepted a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScheme {
    Sr25519,
    Ed25519,
    Ecdsa,
}

/// Decoded SS58 address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ss58Account {
    pub network_prefix: u16,
    pub account_id: [u8; ACCOUNT_ID_LEN],
}

/// Decode an SS58 address and check its blake2b checksum.
pub fn decode_ss58(address: &str) -> Result<Ss58Account, ChallengeError> {
    let invalid = |reason: &str| ChallengeError::InvalidAddress(reason.to_string());

    let data = bs58::decode(address)
        .into_vec()
        .map_err(|e| ChallengeError::InvalidAddress(e.to_string()))?;

    let (network_prefix, prefix_len) = match data.first() {
        Some(&first) if first < 64 => (first as u16, 1),
        Some(&first) if first < 128 => {
            let second = *data.get(1).ok_or_else(|| invalid("truncated prefix"))?;
            let lower = ((first << 2) | (second >> 6)) as u16;
            let upper = (second & 0b0011_1111) as u16;
            (lower | (upper << 8), 2)
        }
        Some(_) => return Err(invalid("reserved address prefix")),
        None => return Err(invalid("empty address")),
    };

    if data.len() != prefix_len + ACCOUNT_ID_LEN + SS58_CHECKSUM_LEN {
        return Err(invalid("unexpected address length"));
    }

    let body_len = prefix_len + ACCOUNT_ID_LEN;
    let expected = ss58_checksum(&data[..body_len]);
    if data[body_len..] != expected[..SS58_CHECKSUM_LEN] {
        return Err(invalid("checksum mismatch"));
    }

    let mut account_id = [0u8; ACCOUNT_ID_LEN];
    account_id.copy_from_slice(&data[prefix_len..body_len]);
    Ok(Ss58Account {
        network_prefix,
        account_id,
    })
}

/// Encode a 32-byte account id with a single-byte network prefix.
pub fn encode_ss58(network_prefix: u8, account_id: &[u8; ACCOUNT_ID_LEN]) -> String {
    let mut data = Vec::with_capacity(1 + ACCOUNT_ID_LEN + SS58_CHECKSUM_LEN);
    data.push(network_prefix & 0b0011_1111);
    data.extend_from_slice(account_id);
    let checksum = ss58_checksum(&data);
    data.extend_from_slice(&checksum[..SS58_CHECKSUM_LEN]);
    bs58::encode(data).into_string()
}

fn ss58_checksum(body: &[u8]) -> Vec<u8> {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_CHECKSUM_PREFIX);
    hasher.update(body);
    hasher.finalize().to_vec()
}

/// Parse a hex signature with or without the `0x` prefix.
pub fn parse_signature_hex(signature: &str) -> Result<Vec<u8>, ChallengeError> {
    let stripped = signature
        .strip_prefix("0x")
        .or_else(|| signature.strip_prefix("0X"))
        .unwrap_or(signature);
    hex::decode(stripped).map_err(|_| ChallengeError::VerificationRejected)
}

/// Verify `signature_hex` by `address` over `message`.
pub fn verify_wallet_signature(
    address: &str,
    message: &str,
    signature_hex: &str,
) -> Result<KeyScheme, ChallengeError> {
    let account = decode_ss58(address)?;
    let signature = parse_signature_hex(signature_hex)?;

    let raw = message.as_bytes();
    let wrapped = [b"<Bytes>".as_slice(), raw, b"</Bytes>".as_slice()].concat();

    for payload in [raw, wrapped.as_slice()] {
        if let Some(scheme) = verify_any_scheme(&account.account_id, payload, &signature) {
            return Ok(scheme);
        }
    }

    Err(ChallengeError::VerificationRejected)
}

fn verify_any_scheme(account_id: &[u8; 32], payload: &[u8], signature: &[u8]) -> Option<KeyScheme> {
    match signature.len() {
        64 => {
            if verify_sr25519(account_id, payload, signature) {
                Some(KeyScheme::Sr25519)
            } else if verify_ed25519(account_id, payload, signature) {
                Some(KeyScheme::Ed25519)
            } else {
                None
            }
        }
        65 => verify_ecdsa(account_id, payload, signature).then_some(KeyScheme::Ecdsa),
        _ => None,
    }
}

fn verify_sr25519(account_id: &[u8; 32], payload: &[u8], signature: &[u8]) -> bool {
    let Ok(public) = schnorrkel::PublicKey::from_bytes(account_id) else {
        return false;
    };
    let Ok(signature) = schnorrkel::Signature::from_bytes(signature) else {
        return false;
    };
    public
        .verify_simple(SUBSTRATE_CONTEXT, payload, &signature)
        .is_ok()
}

fn verify_ed25519(account_id: &[u8; 32], payload: &[u8], signature: &[u8]) -> bool {
    let Ok(public) = ed25519_dalek::VerifyingKey::from_bytes(account_id) else {
        return false;
    };
    let Ok(bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(&bytes);
    public.verify_strict(payload, &signature).is_ok()
}

/// Substrate ecdsa: recover the signer from a blake2-256 prehash and compare
/// the hash of its compressed key with the account id.
fn verify_ecdsa(account_id: &[u8; 32], payload: &[u8], signature: &[u8]) -> bool {
    let Ok(rs) = EcdsaSignature::from_slice(&signature[..64]) else {
        return false;
    };
    let v = signature[64];
    let v = if v >= 27 { v - 27 } else { v };
    let Some(recovery_id) = RecoveryId::from_byte(v) else {
        return false;
    };

    let prehash = Blake2b256::digest(payload);
    let Ok(recovered) = EcdsaVerifyingKey::recover_from_prehash(&prehash, &rs, recovery_id) else {
        return false;
    };

    let compressed = recovered.to_encoded_point(true);
    Blake2b256::digest(compressed.as_bytes()).as_slice() == account_id.as_slice()
}
