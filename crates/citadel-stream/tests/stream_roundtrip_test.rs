//! End-to-end framing properties: encode then decode across awkward chunk
//! size / artifact size alignments.

use citadel_stream::decode::read_bytes;
use citadel_stream::encode::write_bytes;
use citadel_stream::{ArtifactDecoder, ArtifactEncoder, StreamResult};

fn roundtrip(artifacts: &[Vec<u8>], chunk_size: usize) -> Vec<Vec<u8>> {
    let chunks = ArtifactEncoder::new(artifacts.to_vec().into_iter(), write_bytes, chunk_size);
    ArtifactDecoder::new(chunks, read_bytes)
        .collect::<StreamResult<Vec<_>>>()
        .unwrap()
}

fn chunk_sizes(artifacts: &[Vec<u8>], chunk_size: usize) -> Vec<usize> {
    ArtifactEncoder::new(artifacts.to_vec().into_iter(), write_bytes, chunk_size)
        .map(|chunk| chunk.unwrap().len())
        .collect()
}

#[test]
fn test_decoded_result_is_independent_of_chunk_size() {
    let artifacts = vec![
        b"first artifact".to_vec(),
        Vec::new(),
        vec![0xA5; 300],
        b"tail".to_vec(),
    ];

    let one_byte = roundtrip(&artifacts, 1);
    let gigabyte = roundtrip(&artifacts, 1_000_000_000);
    assert_eq!(one_byte, artifacts);
    assert_eq!(gigabyte, artifacts);

    // Only the intermediate chunk shapes differ.
    let total: usize = artifacts.iter().map(|a| a.len() + 8).sum();
    assert_eq!(chunk_sizes(&artifacts, 1).len(), total + 1);
    assert_eq!(chunk_sizes(&artifacts, 1_000_000_000).len(), 1);
}

#[test]
fn test_every_small_chunk_size_roundtrips() {
    let artifacts = vec![b"AB".to_vec(), Vec::new(), b"CDE".to_vec()];
    for chunk_size in 1..=40 {
        assert_eq!(roundtrip(&artifacts, chunk_size), artifacts, "chunk_size={chunk_size}");
    }
}

#[test]
fn test_artifact_larger_than_chunk_roundtrips() {
    let artifacts = vec![vec![1u8; 10_000], vec![2u8; 3]];
    assert_eq!(roundtrip(&artifacts, 64), artifacts);
}

#[test]
fn test_record_exactly_one_chunk_roundtrips() {
    // 8-byte header + 8-byte payload == chunk size 16.
    let artifacts = vec![vec![9u8; 8]];
    assert_eq!(roundtrip(&artifacts, 16), artifacts);
}

#[test]
fn test_zero_byte_artifacts_roundtrip() {
    let artifacts = vec![Vec::new(), Vec::new(), Vec::new()];
    assert_eq!(roundtrip(&artifacts, 5), artifacts);
}

#[test]
fn test_long_mixed_sequence_roundtrips_in_order() {
    let artifacts: Vec<Vec<u8>> = (0u32..100)
        .map(|i| (0..(i * 7 % 53)).map(|j| (i + j) as u8).collect())
        .collect();
    assert_eq!(roundtrip(&artifacts, 17), artifacts);
}
