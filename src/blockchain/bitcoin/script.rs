//! Script construction for P2PKH and P2SH multisig spends

use super::constants::{
    COMPRESSED_PUBLIC_KEY_SIZE, HASH160_SIZE, MAX_MULTISIG_KEYS, RAW_PUBLIC_KEY_SIZE,
};
use super::keys::{compress_public_key, decompress_public_key};
use super::{SigningError, SigningResult};

pub mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_PUSHDATA4: u8 = 0x4e;
    /// `OP_k` for 1..=16 is `0x50 + k`
    pub const OP_SMALL_INT_BASE: u8 = 0x50;
    pub const OP_DUP: u8 = 0x76;
    pub const OP_EQUAL: u8 = 0x87;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_HASH160: u8 = 0xa9;
    pub const OP_CHECKSIG: u8 = 0xac;
    pub const OP_CHECKMULTISIG: u8 = 0xae;
}

use opcodes::*;

/// Append a minimal data push of `data` to `script`
pub fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len < OP_PUSHDATA1 as usize {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else if len <= 0xffff {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        script.push(OP_PUSHDATA4);
        script.extend_from_slice(&(len as u32).to_le_bytes());
    }
    script.extend_from_slice(data);
}

/// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_locking_script(hash: &[u8; HASH160_SIZE]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    push_data(&mut script, hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// `OP_HASH160 <20 bytes> OP_EQUAL`
pub fn p2sh_locking_script(hash: &[u8; HASH160_SIZE]) -> Vec<u8> {
    let mut script = Vec::with_capacity(23);
    script.push(OP_HASH160);
    push_data(&mut script, hash);
    script.push(OP_EQUAL);
    script
}

/// Build an m-of-n CHECKMULTISIG redeem script.
///
/// Keys are used in the order given. Cosigners must agree on that order out of
/// band: a different order is a different script and a different P2SH address.
pub fn multisig_redeem_script<K: AsRef<[u8]>>(required: usize, public_keys: &[K]) -> SigningResult<Vec<u8>> {
    let total = public_keys.len();
    if required == 0 || total == 0 || required > total || total > MAX_MULTISIG_KEYS {
        return Err(SigningError::InvalidThreshold { required, total });
    }

    let mut script = Vec::with_capacity(3 + total * (1 + COMPRESSED_PUBLIC_KEY_SIZE));
    script.push(small_int_opcode(required));
    for key in public_keys {
        let key = key.as_ref();
        if key.len() != COMPRESSED_PUBLIC_KEY_SIZE {
            return Err(SigningError::InvalidKeyLength {
                expected: COMPRESSED_PUBLIC_KEY_SIZE,
                actual: key.len(),
            });
        }
        push_data(&mut script, key);
    }
    script.push(small_int_opcode(total));
    script.push(OP_CHECKMULTISIG);

    Ok(script)
}

/// Build a redeem script from hex public keys as received over the API.
///
/// Each key may be 33-byte compressed, 65-byte `0x04`-prefixed, or 64-byte raw X ‖ Y;
/// the latter two are compressed first.
pub fn multisig_redeem_script_from_hex<S: AsRef<str>>(required: usize, public_keys: &[S]) -> SigningResult<Vec<u8>> {
    let compressed = public_keys
        .iter()
        .map(|key| normalize_public_key(key.as_ref()))
        .collect::<SigningResult<Vec<_>>>()?;

    multisig_redeem_script(required, &compressed)
}

fn normalize_public_key(key_hex: &str) -> SigningResult<[u8; COMPRESSED_PUBLIC_KEY_SIZE]> {
    let bytes = hex::decode(key_hex.trim())?;

    match bytes.len() {
        COMPRESSED_PUBLIC_KEY_SIZE if bytes[0] == 0x02 || bytes[0] == 0x03 => {
            // Must be a point on the curve
            decompress_public_key(&bytes)?;
            let mut key = [0u8; COMPRESSED_PUBLIC_KEY_SIZE];
            key.copy_from_slice(&bytes);
            Ok(key)
        }
        65 if bytes[0] == 0x04 => compress_public_key(&bytes[1..]),
        RAW_PUBLIC_KEY_SIZE => compress_public_key(&bytes),
        COMPRESSED_PUBLIC_KEY_SIZE => Err(SigningError::InvalidPublicKey(format!(
            "Invalid compressed key prefix: 0x{:02x}",
            bytes[0]
        ))),
        other => Err(SigningError::InvalidKeyLength {
            expected: COMPRESSED_PUBLIC_KEY_SIZE,
            actual: other,
        }),
    }
}

/// The compressed public keys listed in a standard multisig redeem script, in order
pub fn parse_multisig_redeem_script(script: &[u8]) -> SigningResult<(usize, Vec<[u8; COMPRESSED_PUBLIC_KEY_SIZE]>)> {
    let malformed = |reason: &str| SigningError::InputValidation(format!("Not a multisig redeem script: {}", reason));

    let (&first, rest) = script.split_first().ok_or_else(|| malformed("empty"))?;
    let (&last, rest) = rest.split_last().ok_or_else(|| malformed("truncated"))?;
    let (&total_op, mut body) = rest.split_last().ok_or_else(|| malformed("truncated"))?;

    if last != OP_CHECKMULTISIG {
        return Err(malformed("missing OP_CHECKMULTISIG"));
    }
    let required = small_int_value(first).ok_or_else(|| malformed("bad threshold opcode"))?;
    let total = small_int_value(total_op).ok_or_else(|| malformed("bad key count opcode"))?;

    let mut keys = Vec::with_capacity(total);
    while let Some((&len, tail)) = body.split_first() {
        if len as usize != COMPRESSED_PUBLIC_KEY_SIZE || tail.len() < COMPRESSED_PUBLIC_KEY_SIZE {
            return Err(malformed("expected a 33-byte key push"));
        }
        let mut key = [0u8; COMPRESSED_PUBLIC_KEY_SIZE];
        key.copy_from_slice(&tail[..COMPRESSED_PUBLIC_KEY_SIZE]);
        keys.push(key);
        body = &tail[COMPRESSED_PUBLIC_KEY_SIZE..];
    }

    if keys.len() != total || required > total {
        return Err(SigningError::InvalidThreshold { required, total: keys.len() });
    }

    Ok((required, keys))
}

/// `<push sig‖type> <push pubkey>`
pub fn p2pkh_unlocking_script(signature_with_type: &[u8], compressed_public_key: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(2 + signature_with_type.len() + compressed_public_key.len());
    push_data(&mut script, signature_with_type);
    push_data(&mut script, compressed_public_key);
    script
}

/// `OP_0 <push sig‖type> <push redeem script>`
///
/// Holds a single signature. The result is not spendable on its own; it is the
/// per-signer artifact the combining service merges into a full scriptSig.
pub fn partial_multisig_unlocking_script(signature_with_type: &[u8], redeem_script: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(8 + signature_with_type.len() + redeem_script.len());
    script.push(OP_0);
    push_data(&mut script, signature_with_type);
    push_data(&mut script, redeem_script);
    script
}

fn small_int_opcode(n: usize) -> u8 {
    OP_SMALL_INT_BASE + n as u8
}

fn small_int_value(opcode: u8) -> Option<usize> {
    match opcode {
        0x51..=0x60 => Some((opcode - OP_SMALL_INT_BASE) as usize),
        _ => None,
    }
}
