use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use byteorder::{BigEndian, ByteOrder};

use crate::common::errors::{EngineError, EngineResult};

pub const BLOCK_SIZE: usize = 16;

/// AES-128 counter-mode cipher for one playlist segment.
///
/// The keystream is built from single-block ECB encryptions of a per-block
/// counter: the segment IV with its low eight bytes XOR-ed with the
/// big-endian block index. The index restarts at zero for every segment. A
/// partial final block consumes the leading keystream bytes.
#[derive(Debug)]
pub struct SegmentCipher {
    cipher: Aes128,
    iv: [u8; 16],
}

impl SegmentCipher {
    pub fn new(key: &[u8], iv: [u8; 16]) -> EngineResult<Self> {
        let cipher = Aes128::new_from_slice(key).map_err(|_| {
            EngineError::Key(format!("AES key must be 16 bytes, got {}", key.len()))
        })?;
        Ok(Self { cipher, iv })
    }

    /// Transforms `data` in place. Counter mode is symmetric, so the same
    /// call decrypts fetched segments and encrypts test fixtures.
    pub fn apply(&self, data: &mut [u8]) {
        for (block_idx, chunk) in data.chunks_mut(BLOCK_SIZE).enumerate() {
            let mut counter = self.iv;
            let mut low = BigEndian::read_u64(&counter[8..16]);
            low ^= block_idx as u64;
            BigEndian::write_u64(&mut counter[8..16], low);

            let mut keystream = GenericArray::clone_from_slice(&counter);
            self.cipher.encrypt_block(&mut keystream);

            for (byte, k) in chunk.iter_mut().zip(keystream.iter()) {
                *byte ^= k;
            }
        }
    }
}

/// IV for a segment without an explicit one: the media sequence number,
/// big-endian, zero-padded to 16 bytes.
pub fn sequence_iv(sequence: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    BigEndian::write_u64(&mut iv[8..16], sequence);
    iv
}

/// Parses the hex IV attribute of a key directive. A `0x`/`0X` prefix is
/// accepted and ignored.
pub fn parse_iv_hex(raw: &str) -> EngineResult<[u8; 16]> {
    let trimmed = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    let bytes = hex::decode(trimmed)
        .map_err(|e| EngineError::Decrypt(format!("bad IV hex {raw:?}: {e}")))?;
    let iv: [u8; 16] = bytes
        .try_into()
        .map_err(|_| EngineError::Decrypt(format!("IV must be 16 bytes: {raw:?}")))?;
    Ok(iv)
}
