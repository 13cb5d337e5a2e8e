//! Content hasher.
//!
//! Produces a lowercase hex SHA-256 digest. The stream variant never holds more
//! than one chunk in memory.

use bytes::Bytes;
use cloudprint_core::constants::HASH_CHUNK_SIZE;
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("Failed to read content while hashing: {0}")]
    Read(String),
}

/// Digest a chunked byte stream. Any read error aborts the digest.
pub async fn hash_stream<S, E>(mut stream: S) -> Result<String, HashError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut hasher = Sha256::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| HashError::Read(e.to_string()))?;
        hasher.update(&chunk);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Digest an in-memory buffer, fed through the hasher in fixed-size chunks.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    for chunk in data.chunks(HASH_CHUNK_SIZE) {
        hasher.update(chunk);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn known_digest() {
        assert_eq!(
            hash_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn same_bytes_same_digest_different_bytes_differ() {
        let a = vec![7u8; 3 * HASH_CHUNK_SIZE + 11];
        let mut b = a.clone();
        assert_eq!(hash_bytes(&a), hash_bytes(&b));
        b[HASH_CHUNK_SIZE + 1] = 8;
        assert_ne!(hash_bytes(&a), hash_bytes(&b));
        assert_eq!(hash_bytes(&a).len(), 64);
    }

    #[tokio::test]
    async fn stream_matches_buffer_digest() {
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 253) as u8).collect();
        let chunks: Vec<Result<Bytes, String>> = data
            .chunks(1000)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        let digest = hash_stream(stream::iter(chunks)).await.unwrap();
        assert_eq!(digest, hash_bytes(&data));
    }

    #[tokio::test]
    async fn stream_error_yields_no_digest() {
        let chunks: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err("file vanished".to_string()),
        ];
        let err = hash_stream(stream::iter(chunks)).await.unwrap_err();
        assert!(err.to_string().contains("file vanished"));
    }
}
