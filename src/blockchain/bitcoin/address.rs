use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use super::constants::{CHECKSUM_SIZE, HASH160_SIZE, P2PKH_VERSION, P2SH_VERSION};
use super::script::{p2pkh_locking_script, p2sh_locking_script};
use super::{double_sha256, SigningError, SigningResult};

/// `RIPEMD160(SHA256(data))`
pub fn hash160(data: &[u8]) -> [u8; HASH160_SIZE] {
    let sha256_hash = Sha256::digest(data);
    let ripemd_hash = Ripemd160::digest(sha256_hash);

    let mut output = [0u8; HASH160_SIZE];
    output.copy_from_slice(&ripemd_hash);
    output
}

/// Base58Check encode `payload ‖ first4(SHA256d(payload))`
pub fn base58check_encode(payload: &[u8]) -> String {
    let checksum = double_sha256(payload);

    let mut bytes = Vec::with_capacity(payload.len() + CHECKSUM_SIZE);
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(&checksum[..CHECKSUM_SIZE]);

    bs58::encode(bytes).into_string()
}

/// Decode Base58Check text and verify its checksum, returning the payload
pub fn base58check_decode(text: &str) -> SigningResult<Vec<u8>> {
    let mut decoded = bs58::decode(text)
        .into_vec()
        .map_err(|e| SigningError::InvalidAddress(format!("Invalid base58 encoding: {}", e)))?;

    if decoded.len() < CHECKSUM_SIZE + 1 {
        return Err(SigningError::InvalidAddress(format!(
            "Base58Check payload too short: {} bytes",
            decoded.len()
        )));
    }

    let payload_len = decoded.len() - CHECKSUM_SIZE;
    if double_sha256(&decoded[..payload_len])[..CHECKSUM_SIZE] != decoded[payload_len..] {
        return Err(SigningError::InvalidAddress("Checksum mismatch".to_string()));
    }

    decoded.truncate(payload_len);
    Ok(decoded)
}

/// Render `version ‖ hash160` as a Base58Check address
pub fn to_address(version: u8, hash: &[u8; HASH160_SIZE]) -> String {
    let mut payload = Vec::with_capacity(1 + HASH160_SIZE);
    payload.push(version);
    payload.extend_from_slice(hash);
    base58check_encode(&payload)
}

/// Split an address into its version byte and hash160
pub fn decode_address(address: &str) -> SigningResult<(u8, [u8; HASH160_SIZE])> {
    let payload = base58check_decode(address)?;

    if payload.len() != 1 + HASH160_SIZE {
        return Err(SigningError::InvalidAddress(format!(
            "Invalid address length: expected 25 bytes, got {}",
            payload.len() + CHECKSUM_SIZE
        )));
    }

    let mut hash = [0u8; HASH160_SIZE];
    hash.copy_from_slice(&payload[1..]);
    Ok((payload[0], hash))
}

/// P2SH address of a redeem script
pub fn multisig_address(redeem_script: &[u8]) -> String {
    to_address(P2SH_VERSION, &hash160(redeem_script))
}

/// Convert a mainnet address to the scriptPubKey that pays it
pub fn address_to_script_pubkey(address: &str) -> SigningResult<Vec<u8>> {
    let (version, hash) = decode_address(address)?;

    match version {
        P2PKH_VERSION => Ok(p2pkh_locking_script(&hash)),
        P2SH_VERSION => Ok(p2sh_locking_script(&hash)),
        other => Err(SigningError::InvalidAddress(format!(
            "Unsupported address version: 0x{:02x}",
            other
        ))),
    }
}

/// Validate a mainnet P2PKH or P2SH address
pub fn validate_address(address: &str) -> bool {
    matches!(
        decode_address(address),
        Ok((P2PKH_VERSION, _)) | Ok((P2SH_VERSION, _))
    )
}
