//! Legacy (non-segwit) Bitcoin transaction codec
//!
//! Layout, all integers little-endian:
//! `version:u32 | n_in:varint | inputs | n_out:varint | outputs | lock_time:u32`

use super::{double_sha256, SigningError, SigningResult};

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    /// Previous transaction hash, in wire (internal) byte order
    pub prev_txid: [u8; 32],
    /// Output index in the previous transaction
    pub prev_vout: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    /// Previous txid in display order, the form explorers and the UTXO table use
    pub fn prev_txid_hex(&self) -> String {
        let mut txid = self.prev_txid;
        txid.reverse();
        hex::encode(txid)
    }
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    /// Value in satoshis
    pub value: i64,
    pub script_pubkey: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn decode(bytes: &[u8]) -> SigningResult<Self> {
        let mut reader = ByteReader::new(bytes);

        let version = reader.read_u32()?;

        let input_count = reader.read_compact_size()?;
        let mut inputs = Vec::with_capacity(reader.bounded_capacity(input_count, 41));
        for _ in 0..input_count {
            let prev_txid = reader.read_array::<32>()?;
            let prev_vout = reader.read_u32()?;
            let script_sig = reader.read_var_bytes()?;
            let sequence = reader.read_u32()?;
            inputs.push(TxIn {
                prev_txid,
                prev_vout,
                script_sig,
                sequence,
            });
        }

        let output_count = reader.read_compact_size()?;
        let mut outputs = Vec::with_capacity(reader.bounded_capacity(output_count, 9));
        for _ in 0..output_count {
            let value = i64::from_le_bytes(reader.read_array::<8>()?);
            let script_pubkey = reader.read_var_bytes()?;
            outputs.push(TxOut { value, script_pubkey });
        }

        let lock_time = reader.read_u32()?;

        if reader.remaining() != 0 {
            return Err(SigningError::MalformedTransaction(format!(
                "{} trailing bytes after lock_time",
                reader.remaining()
            )));
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut tx = Vec::new();

        tx.extend_from_slice(&self.version.to_le_bytes());

        tx.extend_from_slice(&serialize_compact_size(self.inputs.len() as u64));
        for input in &self.inputs {
            tx.extend_from_slice(&input.prev_txid);
            tx.extend_from_slice(&input.prev_vout.to_le_bytes());
            tx.extend_from_slice(&serialize_compact_size(input.script_sig.len() as u64));
            tx.extend_from_slice(&input.script_sig);
            tx.extend_from_slice(&input.sequence.to_le_bytes());
        }

        tx.extend_from_slice(&serialize_compact_size(self.outputs.len() as u64));
        for output in &self.outputs {
            tx.extend_from_slice(&output.value.to_le_bytes());
            tx.extend_from_slice(&serialize_compact_size(output.script_pubkey.len() as u64));
            tx.extend_from_slice(&output.script_pubkey);
        }

        tx.extend_from_slice(&self.lock_time.to_le_bytes());

        tx
    }

    pub fn from_hex(raw_tx: &str) -> SigningResult<Self> {
        let bytes = hex::decode(raw_tx.trim())
            .map_err(|e| SigningError::InputValidation(format!("Invalid transaction hex: {}", e)))?;
        Self::decode(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    /// Transaction id: byte-reversed SHA256d of the serialization
    pub fn txid(&self) -> String {
        let mut hash = double_sha256(&self.encode());
        hash.reverse();
        hex::encode(hash)
    }
}

/// Serialize a compact size integer (Bitcoin varint)
pub(crate) fn serialize_compact_size(n: u64) -> Vec<u8> {
    if n < 0xfd {
        vec![n as u8]
    } else if n <= 0xffff {
        let mut v = vec![0xfd];
        v.extend_from_slice(&(n as u16).to_le_bytes());
        v
    } else if n <= 0xffffffff {
        let mut v = vec![0xfe];
        v.extend_from_slice(&(n as u32).to_le_bytes());
        v
    } else {
        let mut v = vec![0xff];
        v.extend_from_slice(&n.to_le_bytes());
        v
    }
}

/// Forward-only cursor over a byte slice
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_bytes(&mut self, len: usize) -> SigningResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(SigningError::MalformedTransaction(format!(
                "Unexpected end of data at offset {}: need {} bytes, have {}",
                self.pos,
                len,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> SigningResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> SigningResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_u32(&mut self) -> SigningResult<u32> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?))
    }

    fn read_compact_size(&mut self) -> SigningResult<u64> {
        let (value, minimum) = match self.read_u8()? {
            0xfd => (u16::from_le_bytes(self.read_array::<2>()?) as u64, 0xfd),
            0xfe => (u32::from_le_bytes(self.read_array::<4>()?) as u64, 0x1_0000),
            0xff => (u64::from_le_bytes(self.read_array::<8>()?), 0x1_0000_0000),
            small => return Ok(small as u64),
        };

        if value < minimum {
            return Err(SigningError::MalformedTransaction(format!(
                "Non-minimal varint encoding of {}",
                value
            )));
        }
        Ok(value)
    }

    fn read_var_bytes(&mut self) -> SigningResult<Vec<u8>> {
        let len = self.read_compact_size()?;
        if len > self.remaining() as u64 {
            return Err(SigningError::MalformedTransaction(format!(
                "Length {} overruns remaining {} bytes",
                len,
                self.remaining()
            )));
        }
        Ok(self.read_bytes(len as usize)?.to_vec())
    }

    /// Preallocation hint that a hostile count cannot inflate past the input size
    fn bounded_capacity(&self, count: u64, min_item_size: usize) -> usize {
        (count as usize).min(self.remaining() / min_item_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSIGNED_TX: &str = "0200000001b93156b79bc8c535d13a2af4dede3bbd7866aaf6badc38e135c08b0d0ec627930000000000ffffffff01606b042a0100000017a914d62ba8e2fb39688d4afcca101cc4ff7abf57f27f8700000000";

    const PARTIAL_SIGNED_TX: &str = "0200000001a0262971a6196ddb554140f12aae68b738852247121f6769dcb6142f9cf6ede300000000f800473044022057e93001dab90716c333df85e5a591352c3468820cd02ceb4e2cd947991440c402201617fa72af1d4a39b487a19c1a32cf5c246c76f8aee8f08715fb54cae91ae7b8014cad532102feade17d70e308af54fcce9baee1c3d34066f100798c9839efee9b1d281abd8921030c6ed4af9836f9772e2b1813e4cd9e30c49f7b9924d59bfca6d4f54e39aaeb162102657d332743056fe81c72be70748e71ad5248524caaab5551c365326baac5279d2103eb860f625fc71dd1710f56a6c3d0082c28ea42e542966146d776296bf833fba0210229fafc185334bb65bc23fba054cb693b65a521fdb545bd73135da3bc5ebc2fca55aeffffffff0210270000000000001976a914451328751fbb4d981aea377f84511aede5c2b9e788ac701101000000000017a91427368ea17968c43f8dd6b5e944457300e4b539208700000000";

    #[test]
    fn test_compact_size() {
        assert_eq!(serialize_compact_size(0), vec![0x00]);
        assert_eq!(serialize_compact_size(252), vec![0xfc]);
        assert_eq!(serialize_compact_size(253), vec![0xfd, 0xfd, 0x00]);
        assert_eq!(serialize_compact_size(0x1234), vec![0xfd, 0x34, 0x12]);
        assert_eq!(serialize_compact_size(0x10000), vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn test_decode_unsigned_transaction() {
        let tx = Transaction::from_hex(UNSIGNED_TX).unwrap();

        assert_eq!(tx.version, 2);
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.inputs[0].prev_vout, 0);
        assert!(tx.inputs[0].script_sig.is_empty());
        assert_eq!(tx.inputs[0].sequence, 0xffffffff);
        assert_eq!(
            tx.inputs[0].prev_txid_hex(),
            "9327c60e0d8bc035e138dcbaf6aa6678bd3bdedef42a3ad135c5c89bb75631b9"
        );
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].value, 0x012a046b60);
        assert_eq!(tx.outputs[0].script_pubkey.len(), 23);
        assert_eq!(tx.lock_time, 0);

        assert_eq!(tx.to_hex(), UNSIGNED_TX);
    }

    #[test]
    fn test_partial_signed_transaction_reencodes_identically() {
        let tx = Transaction::from_hex(PARTIAL_SIGNED_TX).unwrap();

        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.inputs[0].script_sig.len(), 0xf8);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].value, 10_000);
        assert_eq!(tx.outputs[1].value, 70_000);

        assert_eq!(tx.to_hex(), PARTIAL_SIGNED_TX);
        assert_eq!(Transaction::decode(&tx.encode()).unwrap(), tx);
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let bytes = hex::decode(UNSIGNED_TX).unwrap();
        for cut in [0, 3, 5, 40, bytes.len() - 1] {
            assert!(
                matches!(
                    Transaction::decode(&bytes[..cut]),
                    Err(SigningError::MalformedTransaction(_))
                ),
                "truncation at {} must fail",
                cut
            );
        }
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bytes = hex::decode(UNSIGNED_TX).unwrap();
        bytes.push(0x00);
        assert!(matches!(
            Transaction::decode(&bytes),
            Err(SigningError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn test_decode_rejects_script_length_overrun() {
        let mut bytes = hex::decode(UNSIGNED_TX).unwrap();
        // scriptSig length byte of input 0 sits after version, count, txid and vout
        bytes[4 + 1 + 32 + 4] = 0xfc;
        assert!(matches!(
            Transaction::decode(&bytes),
            Err(SigningError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn test_decode_rejects_non_minimal_varint() {
        // Input count 1 written as 0xfd 0x01 0x00
        let mut bytes = hex::decode(UNSIGNED_TX).unwrap();
        bytes.splice(4..5, [0xfd, 0x01, 0x00]);
        assert!(matches!(
            Transaction::decode(&bytes),
            Err(SigningError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn test_from_hex_rejects_bad_hex() {
        assert!(matches!(
            Transaction::from_hex("02zz"),
            Err(SigningError::InputValidation(_))
        ));
    }

    #[test]
    fn test_encode_decode_constructed_transaction() {
        let tx = Transaction {
            version: 1,
            inputs: vec![
                TxIn {
                    prev_txid: [0x11; 32],
                    prev_vout: 3,
                    script_sig: vec![0xab; 300],
                    sequence: 0xfffffffe,
                },
                TxIn {
                    prev_txid: [0x22; 32],
                    prev_vout: 0,
                    script_sig: Vec::new(),
                    sequence: 0xffffffff,
                },
            ],
            outputs: vec![TxOut {
                value: 5_000,
                script_pubkey: vec![0x51],
            }],
            lock_time: 600_000,
        };

        let encoded = tx.encode();
        let decoded = Transaction::decode(&encoded).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.encode(), encoded);
        assert_eq!(tx.txid().len(), 64);
    }
}
