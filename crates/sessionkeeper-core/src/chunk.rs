//! Chunk splitting and joining for oversized session archives.
//!
//! The document store caps individual record sizes, so archives above
//! the chunking threshold are stored as an ordered sequence of bounded
//! segments. `join(split(b, n)) == b` holds for every byte sequence and
//! every `n >= 1`.

/// Partition `bytes` into consecutive non-overlapping segments of at
/// most `max_chunk_size` bytes.
///
/// The final segment may be shorter. An empty input yields a single
/// empty segment so that a chunked record always has at least one
/// chunk row.
///
/// # Panics
///
/// Panics if `max_chunk_size` is zero.
pub fn split(bytes: &[u8], max_chunk_size: usize) -> Vec<Vec<u8>> {
    assert!(max_chunk_size > 0, "max_chunk_size must be at least 1");
    if bytes.is_empty() {
        return vec![Vec::new()];
    }
    bytes.chunks(max_chunk_size).map(<[u8]>::to_vec).collect()
}

/// Concatenate segments in the given order.
///
/// Order is caller-supplied and must already reflect ascending chunk
/// index; this function never re-sorts.
pub fn join<I>(chunks: I) -> Vec<u8>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend_from_slice(chunk.as_ref());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_exact_multiple() {
        let chunks = split(&[0u8; 12], 4);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 4));
    }

    #[test]
    fn test_split_short_tail() {
        let data: Vec<u8> = (0..10).collect();
        let chunks = split(&data, 4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], vec![0, 1, 2, 3]);
        assert_eq!(chunks[2], vec![8, 9]);
    }

    #[test]
    fn test_split_empty_yields_single_empty_segment() {
        let chunks = split(&[], 8);
        assert_eq!(chunks, vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_split_input_smaller_than_limit() {
        let chunks = split(&[1, 2], 100);
        assert_eq!(chunks, vec![vec![1, 2]]);
    }

    #[test]
    #[should_panic(expected = "max_chunk_size")]
    fn test_split_zero_limit_panics() {
        split(&[1], 0);
    }

    #[test]
    fn test_join_concatenates_in_order() {
        let joined = join([vec![1u8, 2], vec![3], vec![], vec![4, 5]]);
        assert_eq!(joined, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_join_does_not_sort() {
        // Caller order is authoritative, even when it is wrong.
        let joined = join([vec![3u8], vec![1, 2]]);
        assert_eq!(joined, vec![3, 1, 2]);
    }

    #[test]
    fn test_roundtrip_for_many_sizes() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        for n in [1, 2, 3, 7, 64, 999, 1000, 5000] {
            let rejoined = join(split(&data, n));
            assert_eq!(rejoined, data, "round-trip failed for chunk size {n}");
        }
    }

    #[test]
    fn test_roundtrip_empty() {
        assert_eq!(join(split(&[], 1)), Vec::<u8>::new());
    }
}
