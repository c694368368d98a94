use crate::reference_cluster::ReferenceCluster;

/// True if `candidate` should replace `existing`, given both have the same gene content
fn is_better_duplicate(candidate: &ReferenceCluster, existing: &ReferenceCluster) -> bool {
    (candidate.max_distance, existing.covered_genomes)
        < (existing.max_distance, candidate.covered_genomes)
}

/// Add one cluster to a deduplicated cluster list
///
/// Clusters with the same gene content are reduced to the one with the lower maximum distance,
/// then the higher genome coverage, then the one added first. A cluster whose locations are all
/// nested in the locations of a listed cluster is dropped, and listed clusters nested in the new
/// one are removed.
///
pub(super) fn merge_cluster(clusters: &mut Vec<ReferenceCluster>, candidate: ReferenceCluster) {
    let content_key = candidate.content_key();
    let same_content = clusters.iter().position(|x| x.content_key() == content_key);
    if let Some(index) = same_content {
        if !is_better_duplicate(&candidate, &clusters[index]) {
            return;
        }
    }

    // A nested candidate leaves the list untouched, including its same-content duplicate
    let is_nested = clusters
        .iter()
        .enumerate()
        .any(|(index, x)| Some(index) != same_content && candidate.is_nested_in(x));
    if is_nested {
        return;
    }
    if let Some(index) = same_content {
        clusters.remove(index);
    }
    clusters.retain(|x| !x.is_nested_in(&candidate));
    clusters.push(candidate);
}

/// Merge the per-anchor cluster lists in anchor order
///
pub(super) fn merge_anchor_clusters(
    anchor_clusters: impl IntoIterator<Item = Vec<ReferenceCluster>>,
) -> Vec<ReferenceCluster> {
    let mut clusters = Vec::new();
    for cluster in anchor_clusters.into_iter().flatten() {
        merge_cluster(&mut clusters, cluster);
    }
    clusters
}
