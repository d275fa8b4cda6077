use std::ops::Range;

use crate::store::ClusterInfo;

/// Partitions `[start, end)` into exactly `chunks` contiguous half-open
/// ranges. Sizes differ by at most one; the first `(end - start) % chunks`
/// ranges are the larger ones. Degenerate inputs produce empty ranges, which
/// callers skip.
pub fn split_range(start: u64, end: u64, chunks: usize) -> Vec<Range<u64>> {
    assert!(chunks > 0, "chunk count must be positive");
    let total = end.saturating_sub(start);
    let base = total / chunks as u64;
    let extra = total % chunks as u64;

    let mut ranges = Vec::with_capacity(chunks);
    let mut cursor = start;
    for i in 0..chunks as u64 {
        let len = base + u64::from(i < extra);
        ranges.push(cursor..cursor + len);
        cursor += len;
    }
    ranges
}

/// A reader chunk: a run of whole clusters and the entry range they cover.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterChunk {
    pub clusters: Range<usize>,
    pub entries: Range<u64>,
}

/// Distributes whole clusters over at most `chunks` reader chunks so that no
/// chunk boundary falls strictly inside a cluster. The first
/// `clusters.len() % chunks` chunks receive one extra cluster; chunks that
/// would receive none are omitted, so the result may be shorter than
/// `chunks`.
pub fn split_clusters(clusters: &[ClusterInfo], chunks: usize) -> Vec<ClusterChunk> {
    if clusters.is_empty() || chunks == 0 {
        return Vec::new();
    }
    let base = clusters.len() / chunks;
    let extra = clusters.len() % chunks;

    let mut out = Vec::with_capacity(chunks.min(clusters.len()));
    let mut cursor = 0usize;
    for i in 0..chunks {
        let count = base + usize::from(i < extra);
        if count == 0 {
            continue;
        }
        let first = &clusters[cursor];
        let last = &clusters[cursor + count - 1];
        out.push(ClusterChunk {
            clusters: cursor..cursor + count,
            entries: first.first_entry..last.first_entry + last.num_entries,
        });
        cursor += count;
    }
    out
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn cluster_run(sizes: &[u64]) -> Vec<ClusterInfo> {
        let mut first_entry = 0;
        sizes
            .iter()
            .map(|&num_entries| {
                let info = ClusterInfo {
                    first_entry,
                    num_entries,
                };
                first_entry += num_entries;
                info
            })
            .collect()
    }

    #[test]
    fn splits_ten_into_three() {
        assert_eq!(split_range(0, 10, 3), vec![0..4, 4..7, 7..10]);
    }

    #[test]
    fn zero_range_yields_empty_chunks() {
        assert_eq!(split_range(0, 0, 3), vec![0..0, 0..0, 0..0]);
    }

    #[rstest]
    #[case(0, 0, 1)]
    #[case(0, 10, 3)]
    #[case(5, 10, 4)]
    #[case(0, 3, 7)]
    #[case(0, 1024, 16)]
    #[case(100, 101, 2)]
    fn chunks_partition_exactly(#[case] start: u64, #[case] end: u64, #[case] n: usize) {
        let ranges = split_range(start, end, n);
        assert_eq!(ranges.len(), n);
        let mut cursor = start;
        for r in &ranges {
            assert_eq!(r.start, cursor);
            assert!(r.end >= r.start);
            cursor = r.end;
        }
        assert_eq!(cursor, end);
    }

    #[test]
    fn cluster_split_respects_boundaries() {
        // Clusters [0,2), [2,5), [5,10) split into 2 chunks.
        let clusters = cluster_run(&[2, 3, 5]);
        let chunks = split_clusters(&clusters, 2);
        assert_eq!(
            chunks,
            vec![
                ClusterChunk {
                    clusters: 0..2,
                    entries: 0..5,
                },
                ClusterChunk {
                    clusters: 2..3,
                    entries: 5..10,
                },
            ]
        );
    }

    #[test]
    fn more_chunks_than_clusters() {
        let clusters = cluster_run(&[4, 4, 2]);
        let chunks = split_clusters(&clusters, 5);
        assert_eq!(chunks.len(), 3);
        for (chunk, cluster) in chunks.iter().zip(&clusters) {
            assert_eq!(chunk.entries.start, cluster.first_entry);
            assert_eq!(
                chunk.entries.end,
                cluster.first_entry + cluster.num_entries
            );
        }
    }

    #[test]
    fn no_clusters_no_chunks() {
        assert!(split_clusters(&[], 3).is_empty());
    }

    #[rstest]
    #[case(&[1], 1)]
    #[case(&[3, 1, 4, 1, 5], 2)]
    #[case(&[2; 12], 5)]
    #[case(&[7, 7, 7], 3)]
    fn cluster_chunk_boundaries_are_cluster_boundaries(
        #[case] sizes: &[u64],
        #[case] n: usize,
    ) {
        let clusters = cluster_run(sizes);
        let starts: Vec<u64> = clusters.iter().map(|c| c.first_entry).collect();
        let total: u64 = sizes.iter().sum();

        let chunks = split_clusters(&clusters, n);
        let mut covered = 0;
        for chunk in &chunks {
            assert!(starts.contains(&chunk.entries.start));
            assert!(starts.contains(&chunk.entries.end) || chunk.entries.end == total);
            assert_eq!(chunk.entries.start, covered);
            covered = chunk.entries.end;
        }
        assert_eq!(covered, total);
    }
}
