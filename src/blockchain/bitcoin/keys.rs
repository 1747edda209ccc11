use rand::{rngs::OsRng, RngCore};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use super::address::{hash160, to_address};
use super::constants::{
    COMPRESSED_PUBLIC_KEY_SIZE, P2PKH_VERSION, PRIVATE_KEY_SIZE, RAW_PUBLIC_KEY_SIZE,
    WIF_COMPRESSED_FLAG, WIF_PREFIX,
};
use super::{double_sha256, SigningError, SigningResult};

/// A secp256k1 key pair.
///
/// The private scalar lives in a zeroizing buffer and is wiped when the pair is
/// dropped. The public point is always derived from it, never stored separately.
pub struct KeyPair {
    secret: Zeroizing<[u8; PRIVATE_KEY_SIZE]>,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair from OS entropy
    pub fn generate() -> SigningResult<Self> {
        let mut rng = OsRng;

        // Out-of-range scalars (zero or >= n) are astronomically rare; draw again.
        loop {
            let mut candidate = Zeroizing::new([0u8; PRIVATE_KEY_SIZE]);
            rng.try_fill_bytes(&mut *candidate)
                .map_err(|e| SigningError::CryptoFailure(format!("Entropy source failed: {}", e)))?;

            if SecretKey::from_slice(&*candidate).is_ok() {
                return Self::from_bytes(&*candidate);
            }
        }
    }

    /// Build a key pair from a raw 32-byte scalar
    pub fn from_bytes(bytes: &[u8]) -> SigningResult<Self> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(SigningError::InvalidKeyLength {
                expected: PRIVATE_KEY_SIZE,
                actual: bytes.len(),
            });
        }

        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| SigningError::InvalidPrivateKey(e.to_string()))?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret_key);

        let mut secret = Zeroizing::new([0u8; PRIVATE_KEY_SIZE]);
        secret.copy_from_slice(bytes);

        Ok(Self { secret, public_key })
    }

    /// Parse a hex-encoded scalar, with or without a `0x` prefix
    pub fn from_hex(private_key: &str) -> SigningResult<Self> {
        let key_hex = private_key.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);
        let bytes = Zeroizing::new(hex::decode(key_hex)?);
        Self::from_bytes(&bytes)
    }

    /// Import a key from Wallet Import Format
    pub fn from_wif(wif: &str) -> SigningResult<Self> {
        let secret = wif_to_private_key(wif)?;
        Self::from_bytes(&*secret)
    }

    /// Parse a stored private key: WIF when it looks like one, hex otherwise
    pub fn parse(private_key: &str) -> SigningResult<Self> {
        let text = private_key.trim();
        let looks_like_wif = matches!(text.len(), 51 | 52)
            && (text.starts_with('5') || text.starts_with('K') || text.starts_with('L'));

        if looks_like_wif {
            Self::from_wif(text)
        } else {
            Self::from_hex(text)
        }
    }

    pub fn secret_bytes(&self) -> &[u8; PRIVATE_KEY_SIZE] {
        &self.secret
    }

    /// The secp256k1 secret key for one signing call; callers erase the copy when done
    pub(crate) fn secret_key(&self) -> SigningResult<SecretKey> {
        SecretKey::from_slice(&*self.secret)
            .map_err(|e| SigningError::InvalidPrivateKey(e.to_string()))
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Uncompressed public point as X ‖ Y (no `0x04` prefix)
    pub fn raw_public_key(&self) -> [u8; RAW_PUBLIC_KEY_SIZE] {
        let serialized = self.public_key.serialize_uncompressed();
        let mut raw = [0u8; RAW_PUBLIC_KEY_SIZE];
        raw.copy_from_slice(&serialized[1..]);
        raw
    }

    /// Compressed public key, the form every script and address is derived from
    pub fn compressed_public_key(&self) -> [u8; COMPRESSED_PUBLIC_KEY_SIZE] {
        compress_point(&self.raw_public_key())
    }

    pub fn to_wif(&self) -> String {
        encode_wif(&self.secret)
    }

    /// Mainnet P2PKH address of the compressed public key
    pub fn address(&self) -> String {
        to_address(P2PKH_VERSION, &hash160(&self.compressed_public_key()))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.compressed_public_key()))
            .finish_non_exhaustive()
    }
}

/// Compress a 64-byte X ‖ Y public point into its 33-byte form
pub fn compress_public_key(uncompressed: &[u8]) -> SigningResult<[u8; COMPRESSED_PUBLIC_KEY_SIZE]> {
    let point: &[u8; RAW_PUBLIC_KEY_SIZE] =
        uncompressed
            .try_into()
            .map_err(|_| SigningError::InvalidKeyLength {
                expected: RAW_PUBLIC_KEY_SIZE,
                actual: uncompressed.len(),
            })?;

    Ok(compress_point(point))
}

fn compress_point(point: &[u8; RAW_PUBLIC_KEY_SIZE]) -> [u8; COMPRESSED_PUBLIC_KEY_SIZE] {
    let mut compressed = [0u8; COMPRESSED_PUBLIC_KEY_SIZE];
    compressed[0] = if point[RAW_PUBLIC_KEY_SIZE - 1] % 2 == 0 { 0x02 } else { 0x03 };
    compressed[1..].copy_from_slice(&point[..32]);
    compressed
}

/// Recover the 64-byte X ‖ Y point from a compressed public key
pub fn decompress_public_key(compressed: &[u8]) -> SigningResult<[u8; RAW_PUBLIC_KEY_SIZE]> {
    if compressed.len() != COMPRESSED_PUBLIC_KEY_SIZE {
        return Err(SigningError::InvalidKeyLength {
            expected: COMPRESSED_PUBLIC_KEY_SIZE,
            actual: compressed.len(),
        });
    }

    let public_key = PublicKey::from_slice(compressed)
        .map_err(|e| SigningError::InvalidPublicKey(e.to_string()))?;

    let serialized = public_key.serialize_uncompressed();
    let mut raw = [0u8; RAW_PUBLIC_KEY_SIZE];
    raw.copy_from_slice(&serialized[1..]);
    Ok(raw)
}

/// Encode a 32-byte private key as compressed-key WIF
pub fn private_key_to_wif(private_key: &[u8]) -> SigningResult<String> {
    let secret: &[u8; PRIVATE_KEY_SIZE] =
        private_key
            .try_into()
            .map_err(|_| SigningError::InvalidKeyLength {
                expected: PRIVATE_KEY_SIZE,
                actual: private_key.len(),
            })?;

    Ok(encode_wif(secret))
}

fn encode_wif(secret: &[u8; PRIVATE_KEY_SIZE]) -> String {
    // 0x80 ‖ key ‖ 0x01 ‖ checksum
    let mut payload = Zeroizing::new(Vec::with_capacity(PRIVATE_KEY_SIZE + 6));
    payload.push(WIF_PREFIX);
    payload.extend_from_slice(secret);
    payload.push(WIF_COMPRESSED_FLAG);

    let checksum = double_sha256(&payload);
    payload.extend_from_slice(&checksum[..4]);

    bs58::encode(&*payload).into_string()
}

/// Decode a WIF private key
///
/// Accepts both the uncompressed (37 bytes) and compressed (38 bytes) layouts.
pub fn wif_to_private_key(wif: &str) -> SigningResult<Zeroizing<[u8; PRIVATE_KEY_SIZE]>> {
    let decoded = Zeroizing::new(
        bs58::decode(wif.trim())
            .into_vec()
            .map_err(|e| SigningError::InvalidPrivateKey(format!("Invalid WIF format: {}", e)))?,
    );

    if decoded.len() != 37 && decoded.len() != 38 {
        return Err(SigningError::InvalidPrivateKey(format!(
            "Invalid WIF length: expected 37 or 38 bytes, got {}",
            decoded.len()
        )));
    }

    let payload_len = decoded.len() - 4;
    let (payload, checksum) = decoded.split_at(payload_len);

    if double_sha256(payload)[..4] != *checksum {
        return Err(SigningError::InvalidPrivateKey("WIF checksum mismatch".to_string()));
    }

    if payload[0] != WIF_PREFIX {
        return Err(SigningError::InvalidPrivateKey(format!(
            "Invalid WIF prefix: expected 0x80, got 0x{:02x}",
            payload[0]
        )));
    }

    if payload.len() == 34 && payload[33] != WIF_COMPRESSED_FLAG {
        return Err(SigningError::InvalidPrivateKey(format!(
            "Invalid WIF compression flag: 0x{:02x}",
            payload[33]
        )));
    }

    let mut secret = Zeroizing::new([0u8; PRIVATE_KEY_SIZE]);
    secret.copy_from_slice(&payload[1..33]);
    Ok(secret)
}
