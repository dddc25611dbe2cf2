//! Inverted-file (IVF) approximate index.
//!
//! Vectors are partitioned into `nlist` clusters by spherical k-means.
//! Queries only scan the `nscan` clusters whose centroids are closest, so
//! results can miss true neighbours that landed in other clusters.
//! With `nscan >= nlist` search is exact.
//!
//! Training is deterministic: seeds are evenly spaced entries in id order and
//! ties always go to the lower centroid index. Until `train()` runs, search
//! falls back to a full scan.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::semantic::index::{check_dimensions, top_k, IndexError, IndexKind, SearchResult, VectorIndex};
use crate::semantic::storage::{
    read_entry, read_u32, read_vector, write_entry, write_u32, write_vector, VectorStorageError,
};
use crate::semantic::vector::dot;
use crate::semantic::EmbeddingVector;

const NO_LIST: u32 = u32::MAX;

fn default_nscan() -> usize {
    4
}

fn default_iterations() -> usize {
    10
}

/// Partitioning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IvfParams {
    /// Number of clusters. `None` picks `sqrt(n)` at training time.
    #[serde(default)]
    pub nlist: Option<usize>,

    /// Clusters scanned per query.
    #[serde(default = "default_nscan")]
    pub nscan: usize,

    /// Upper bound on k-means rounds.
    #[serde(default = "default_iterations")]
    pub iterations: usize,
}

impl Default for IvfParams {
    fn default() -> Self {
        Self {
            nlist: None,
            nscan: default_nscan(),
            iterations: default_iterations(),
        }
    }
}

#[derive(Debug, Clone)]
struct IvfEntry {
    vector: EmbeddingVector,
    list: Option<usize>,
}

/// Approximate index backed by k-means partitions.
#[derive(Debug, Clone)]
pub struct IvfIndex {
    dimensions: usize,
    params: IvfParams,
    entries: BTreeMap<String, IvfEntry>,
    centroids: Vec<EmbeddingVector>,
    lists: Vec<BTreeSet<String>>,
}

impl IvfIndex {
    pub fn new(dimensions: usize, params: IvfParams) -> Self {
        Self {
            dimensions,
            params,
            entries: BTreeMap::new(),
            centroids: Vec::new(),
            lists: Vec::new(),
        }
    }

    pub fn params(&self) -> IvfParams {
        self.params
    }

    pub fn is_trained(&self) -> bool {
        !self.centroids.is_empty()
    }

    /// Number of clusters after training, 0 before.
    pub fn nlist(&self) -> usize {
        self.centroids.len()
    }

    fn target_nlist(&self) -> usize {
        let n = self.entries.len();
        let wanted = self
            .params
            .nlist
            .unwrap_or_else(|| (n as f64).sqrt() as usize);
        wanted.clamp(1, n.max(1))
    }

    /// Index of the closest centroid; ties go to the lower index.
    fn nearest_centroid(centroids: &[EmbeddingVector], vector: &EmbeddingVector) -> usize {
        let mut best = 0;
        let mut best_sim = f32::NEG_INFINITY;
        for (idx, centroid) in centroids.iter().enumerate() {
            let sim = dot(centroid.values(), vector.values());
            if sim > best_sim {
                best = idx;
                best_sim = sim;
            }
        }
        best
    }

    fn scan<'a>(
        &self,
        query: &EmbeddingVector,
        ids: impl Iterator<Item = &'a String>,
    ) -> Vec<SearchResult> {
        ids.filter_map(|id| {
            self.entries.get(id).map(|entry| SearchResult {
                id: id.clone(),
                similarity: dot(query.values(), entry.vector.values()),
            })
        })
        .collect()
    }

    pub(crate) fn decode_body(
        input: &mut dyn Read,
        dimensions: usize,
        entry_count: u64,
    ) -> Result<Self, VectorStorageError> {
        let nlist = match read_u32(input)? {
            0 => None,
            n => Some(n as usize),
        };
        let nscan = read_u32(input)? as usize;
        let iterations = read_u32(input)? as usize;
        let centroid_count = read_u32(input)? as usize;

        let mut index = IvfIndex::new(
            dimensions,
            IvfParams {
                nlist,
                nscan,
                iterations,
            },
        );

        for _ in 0..centroid_count {
            index.centroids.push(read_vector(input, dimensions)?);
        }
        index.lists = vec![BTreeSet::new(); centroid_count];

        for _ in 0..entry_count {
            let (id, vector) = read_entry(input, dimensions)?;
            let list = match read_u32(input)? {
                NO_LIST => None,
                l if (l as usize) < centroid_count => Some(l as usize),
                l => {
                    return Err(VectorStorageError::InvalidFormat(format!(
                        "entry '{}' assigned to list {} of {}",
                        id, l, centroid_count
                    )))
                }
            };

            if let Some(l) = list {
                index.lists[l].insert(id.clone());
            } else if centroid_count > 0 {
                return Err(VectorStorageError::InvalidFormat(format!(
                    "entry '{}' has no list in a trained index",
                    id
                )));
            }

            if index.entries.insert(id.clone(), IvfEntry { vector, list }).is_some() {
                return Err(VectorStorageError::InvalidFormat(format!(
                    "duplicate entry id '{}'",
                    id
                )));
            }
        }

        Ok(index)
    }
}

impl VectorIndex for IvfIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Ivf
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn add(&mut self, id: &str, vector: EmbeddingVector) -> Result<(), IndexError> {
        check_dimensions(self.dimensions, &vector)?;

        let list = if self.is_trained() {
            let l = Self::nearest_centroid(&self.centroids, &vector);
            self.lists[l].insert(id.to_string());
            Some(l)
        } else {
            None
        };

        let previous = self
            .entries
            .insert(id.to_string(), IvfEntry { vector, list });

        // Replaced entry may have lived in another list.
        if let Some(old) = previous.and_then(|e| e.list) {
            if Some(old) != list {
                self.lists[old].remove(id);
            }
        }

        Ok(())
    }

    fn get(&self, id: &str) -> Option<&EmbeddingVector> {
        self.entries.get(id).map(|e| &e.vector)
    }

    fn remove(&mut self, id: &str) -> Option<EmbeddingVector> {
        let entry = self.entries.remove(id)?;
        if let Some(l) = entry.list {
            self.lists[l].remove(id);
        }
        Some(entry.vector)
    }

    fn search(&self, query: &EmbeddingVector, k: usize) -> Result<Vec<SearchResult>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidK);
        }
        check_dimensions(self.dimensions, query)?;

        if !self.is_trained() {
            return Ok(top_k(self.scan(query, self.entries.keys()), k));
        }

        let mut ranked: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(idx, c)| (idx, dot(query.values(), c.values())))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let nscan = self.params.nscan.max(1);
        let scanned = ranked
            .iter()
            .take(nscan)
            .flat_map(|(idx, _)| self.lists[*idx].iter());

        Ok(top_k(self.scan(query, scanned), k))
    }

    fn train(&mut self) {
        self.centroids.clear();
        self.lists.clear();
        for entry in self.entries.values_mut() {
            entry.list = None;
        }
        if self.entries.is_empty() {
            return;
        }

        let n = self.entries.len();
        let nlist = self.target_nlist();
        let vectors: Vec<&EmbeddingVector> = self.entries.values().map(|e| &e.vector).collect();

        let mut centroids: Vec<EmbeddingVector> = (0..nlist)
            .map(|i| vectors[i * n / nlist].clone())
            .collect();
        let mut assignment: Vec<usize> = vectors
            .iter()
            .map(|v| Self::nearest_centroid(&centroids, v))
            .collect();

        for round in 0..self.params.iterations {
            let mut sums = vec![vec![0.0f64; self.dimensions]; nlist];
            let mut counts = vec![0usize; nlist];
            for (vector, &cluster) in vectors.iter().zip(&assignment) {
                counts[cluster] += 1;
                for (s, v) in sums[cluster].iter_mut().zip(vector.values()) {
                    *s += f64::from(*v);
                }
            }

            for (cluster, sum) in sums.into_iter().enumerate() {
                // An empty cluster keeps its previous centroid.
                if counts[cluster] > 0 {
                    centroids[cluster] =
                        EmbeddingVector::normalized(sum.into_iter().map(|s| s as f32).collect());
                }
            }

            let next: Vec<usize> = vectors
                .iter()
                .map(|v| Self::nearest_centroid(&centroids, v))
                .collect();
            if next == assignment {
                log::debug!("ivf k-means converged after {} rounds", round + 1);
                break;
            }
            assignment = next;
        }

        let mut lists = vec![BTreeSet::new(); nlist];
        for ((id, entry), &cluster) in self.entries.iter_mut().zip(&assignment) {
            entry.list = Some(cluster);
            lists[cluster].insert(id.clone());
        }

        log::debug!("trained ivf index: {} entries in {} lists", n, nlist);
        self.centroids = centroids;
        self.lists = lists;
    }

    fn encode_body(&self, out: &mut dyn Write) -> Result<(), VectorStorageError> {
        write_u32(out, self.params.nlist.unwrap_or(0) as u32)?;
        write_u32(out, self.params.nscan as u32)?;
        write_u32(out, self.params.iterations as u32)?;
        write_u32(out, self.centroids.len() as u32)?;

        for centroid in &self.centroids {
            write_vector(out, centroid)?;
        }

        for (id, entry) in &self.entries {
            write_entry(out, id, &entry.vector)?;
            write_u32(out, entry.list.map(|l| l as u32).unwrap_or(NO_LIST))?;
        }

        Ok(())
    }
}
