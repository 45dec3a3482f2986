//! Approximate Nearest Neighbor (ANN) acceleration using the HNSW algorithm.
//!
//! The reference corpus is typically small (a few hundred labeled papers),
//! where an exact linear scan is both fastest and guarantees the top-1
//! property the assigner relies on. HNSW only engages above a configured
//! corpus size, trading exactness (~95-99% recall) for sub-linear queries.

use hnsw_rs::prelude::*;

/// Configuration for ANN index construction.
#[derive(Debug, Clone, Copy)]
pub struct AnnConfig {
    /// Number of neighbors per node (higher = better recall, slower build).
    /// Default: 16
    pub m: usize,
    /// Size of dynamic candidate list during construction.
    /// Default: 200
    pub ef_construction: usize,
    /// Size of dynamic candidate list during search.
    /// Default: 50
    pub ef_search: usize,
    /// Whether ANN may be used at all.
    /// Default: true
    pub enabled: bool,
    /// Minimum number of reference entries before ANN is used. Below this
    /// threshold the exact linear scan runs even if enabled=true.
    /// Default: 1000
    pub min_entries_for_ann: usize,
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            enabled: true,
            min_entries_for_ann: 1000,
        }
    }
}

impl AnnConfig {
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    pub fn with_ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_min_entries_for_ann(mut self, min: usize) -> Self {
        self.min_entries_for_ann = min;
        self
    }

    /// Check if ANN should be used given the corpus size.
    pub fn should_use_ann(&self, num_entries: usize) -> bool {
        self.enabled && num_entries >= self.min_entries_for_ann
    }
}

/// Hit from an ANN search: insertion index of the entry plus its cosine
/// distance (lower = closer).
#[derive(Debug, Clone, Copy)]
pub(crate) struct AnnHit {
    pub(crate) index: usize,
    pub(crate) distance: f32,
}

/// Immutable HNSW graph over the reference vectors. Built once at index
/// construction; `search` takes `&self` so concurrent queries never block
/// each other.
pub(crate) struct AnnGraph {
    hnsw: Hnsw<'static, f32, DistCosine>,
    ef_search: usize,
}

impl std::fmt::Debug for AnnGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnGraph")
            .field("ef_search", &self.ef_search)
            .finish_non_exhaustive()
    }
}

impl AnnGraph {
    /// Build the graph from the full set of reference vectors. Entry ids are
    /// their insertion indices, which is what the caller keys entries by.
    pub(crate) fn build(vectors: &[Vec<f32>], cfg: &AnnConfig) -> Self {
        let nb_elem = vectors.len();
        let nb_layer = 16.min((nb_elem as f32).ln().trunc() as usize).max(1);

        let hnsw = Hnsw::<f32, DistCosine>::new(
            cfg.m,
            nb_elem,
            nb_layer,
            cfg.ef_construction,
            DistCosine {},
        );

        let data_for_insertion: Vec<(&Vec<f32>, usize)> = vectors
            .iter()
            .enumerate()
            .map(|(idx, vec)| (vec, idx))
            .collect();
        hnsw.parallel_insert(&data_for_insertion);

        Self {
            hnsw,
            ef_search: cfg.ef_search,
        }
    }

    pub(crate) fn search(&self, query: &[f32], k: usize) -> Vec<AnnHit> {
        let results: Vec<Neighbour> = self.hnsw.search(query, k, self.ef_search);
        results
            .into_iter()
            .map(|neighbour| AnnHit {
                index: neighbour.get_origin_id(),
                distance: neighbour.distance,
            })
            .collect()
    }
}
