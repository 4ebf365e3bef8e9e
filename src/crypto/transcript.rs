use num_bigint_dig::BigUint;
use sha2::{Digest, Sha256};

const DOMAIN_TAG: &[u8] = b"zk-ballot/transcript/v1";

/// Builder for canonical proof transcripts.
///
/// Challenges are derived by hashing a domain-separated, length-prefixed
/// encoding of the public values a proof commits to, then reducing mod the
/// subgroup order. Both prover and verifier must feed the builder the same
/// values in the same order.
pub struct TranscriptBuilder {
    buffer: Vec<u8>,
}

impl TranscriptBuilder {
    pub fn new(kind: &'static str) -> Self {
        let mut buffer = Vec::with_capacity(256);
        buffer.extend_from_slice(DOMAIN_TAG);
        buffer.extend_from_slice(&(kind.len() as u16).to_be_bytes());
        buffer.extend_from_slice(kind.as_bytes());
        Self { buffer }
    }

    pub fn append_uint(&mut self, value: &BigUint) {
        self.append_bytes(&value.to_bytes_be());
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.buffer
            .extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        self.buffer.extend_from_slice(bytes);
    }

    /// Hash the transcript and reduce into `[0, modulus)`.
    pub fn challenge(self, modulus: &BigUint) -> BigUint {
        let digest = Sha256::digest(&self.buffer);
        BigUint::from_bytes_be(&digest) % modulus
    }
}
