//! The HNSW graph itself, abstracted over the two supported distance metrics.
//!
//! hnsw_rs is generic over a distance functor rather than exposing a runtime
//! switch, so a `Graph` is one of two concrete instantiations. Loading from
//! disk hands back a `Hnsw<'a>` borrowing from `HnswIo`; `LoadedGraph` manages
//! that self-referential relationship the same way for both metrics: the
//! `HnswIo` is heap-allocated and addressed through a raw pointer, the `Hnsw`
//! lifetime is extended to `'static` (sound because the `HnswIo` behind the
//! pointer outlives it — enforced by `Drop` order below), and the borrow is
//! read-only so no interior mutation can invalidate it.

use std::mem::ManuallyDrop;
use std::path::Path;

use hnsw_rs::anndists::dist::distances::{DistCosine, DistL2};
use hnsw_rs::api::AnnT;
use hnsw_rs::hnsw::{Hnsw, Neighbour};
use hnsw_rs::hnswio::HnswIo;

use crate::config::Metric;

use super::VectorError;

pub(super) enum OwnedGraph {
    Cosine(Hnsw<'static, f32, DistCosine>),
    L2(Hnsw<'static, f32, DistL2>),
}

pub(super) struct LoadedGraph {
    io_ptr: *mut HnswIo,
    inner: LoadedInner,
}

enum LoadedInner {
    Cosine(ManuallyDrop<Hnsw<'static, f32, DistCosine>>),
    L2(ManuallyDrop<Hnsw<'static, f32, DistL2>>),
}

impl Drop for LoadedGraph {
    fn drop(&mut self) {
        // SAFETY: the Hnsw variant borrows from *io_ptr; dropping it before
        // reclaiming the HnswIo box keeps the borrow valid for its entire life.
        unsafe {
            match &mut self.inner {
                LoadedInner::Cosine(h) => ManuallyDrop::drop(h),
                LoadedInner::L2(h) => ManuallyDrop::drop(h),
            }
            drop(Box::from_raw(self.io_ptr));
        }
    }
}

// SAFETY: io_ptr only ever addresses an owned HnswIo (file paths + loaded
// buffers); the wrapped Hnsw values are the same kind hnsw_rs itself treats
// as Send + Sync. All mutable access to a Graph is serialized by VectorStore's
// RwLock, so no additional synchronization is required here.
unsafe impl Send for LoadedGraph {}
unsafe impl Sync for LoadedGraph {}

pub(super) enum Graph {
    Owned(OwnedGraph),
    Loaded(LoadedGraph),
}

impl Graph {
    pub(super) fn new(metric: Metric, capacity: usize, m: usize, max_layer: usize, ef_construction: usize) -> Self {
        let capacity = capacity.max(1);
        match metric {
            Metric::Cosine => Graph::Owned(OwnedGraph::Cosine(Hnsw::new(
                m,
                capacity,
                max_layer,
                ef_construction,
                DistCosine,
            ))),
            Metric::L2 => Graph::Owned(OwnedGraph::L2(Hnsw::new(
                m,
                capacity,
                max_layer,
                ef_construction,
                DistL2 {},
            ))),
        }
    }

    pub(super) fn insert_batch(&mut self, data: &[(&Vec<f32>, usize)]) -> Result<(), VectorError> {
        match self {
            Graph::Owned(OwnedGraph::Cosine(h)) => h.parallel_insert_data(data),
            Graph::Owned(OwnedGraph::L2(h)) => h.parallel_insert_data(data),
            Graph::Loaded(_) => {
                return Err(VectorError::Internal(
                    "cannot insert into a loaded graph; call compact() to rebuild".to_string(),
                ))
            }
        }
        Ok(())
    }

    pub(super) fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Vec<Neighbour> {
        match self {
            Graph::Owned(OwnedGraph::Cosine(h)) => h.search_neighbours(query, k, ef_search),
            Graph::Owned(OwnedGraph::L2(h)) => h.search_neighbours(query, k, ef_search),
            Graph::Loaded(g) => match &g.inner {
                LoadedInner::Cosine(h) => h.search_neighbours(query, k, ef_search),
                LoadedInner::L2(h) => h.search_neighbours(query, k, ef_search),
            },
        }
    }

    pub(super) fn get_nb_point(&self) -> usize {
        match self {
            Graph::Owned(OwnedGraph::Cosine(h)) => h.get_nb_point(),
            Graph::Owned(OwnedGraph::L2(h)) => h.get_nb_point(),
            Graph::Loaded(g) => match &g.inner {
                LoadedInner::Cosine(h) => h.get_nb_point(),
                LoadedInner::L2(h) => h.get_nb_point(),
            },
        }
    }

    pub(super) fn file_dump(&self, dir: &Path, basename: &str) -> Result<(), VectorError> {
        let result = match self {
            Graph::Owned(OwnedGraph::Cosine(h)) => h.file_dump(dir, basename).map(|_| ()),
            Graph::Owned(OwnedGraph::L2(h)) => h.file_dump(dir, basename).map(|_| ()),
            Graph::Loaded(g) => match &g.inner {
                LoadedInner::Cosine(h) => h.file_dump(dir, basename).map(|_| ()),
                LoadedInner::L2(h) => h.file_dump(dir, basename).map(|_| ()),
            },
        };
        result.map_err(|e| VectorError::Internal(format!("graph dump failed: {e}")))
    }

    pub(super) fn load(dir: &Path, basename: &str, metric: Metric) -> Result<Self, VectorError> {
        let hnsw_io = Box::new(HnswIo::new(dir, basename));
        let io_ptr = Box::into_raw(hnsw_io);

        macro_rules! load_variant {
            ($dist_ty:ty, $ctor:expr) => {{
                // SAFETY: io_ptr was just created from Box::into_raw above and is
                // uniquely owned here.
                let hnsw: Result<Hnsw<'_, f32, $dist_ty>, _> =
                    unsafe { &mut *io_ptr }.load_hnsw();
                match hnsw {
                    Ok(h) => {
                        // SAFETY: io_ptr outlives h for the lifetime of LoadedGraph;
                        // Drop order reclaims h before freeing io_ptr (see above).
                        let h: Hnsw<'static, f32, $dist_ty> = unsafe { std::mem::transmute(h) };
                        Ok($ctor(ManuallyDrop::new(h)))
                    }
                    Err(e) => {
                        // SAFETY: io_ptr was created from Box::into_raw above, unused on this path.
                        unsafe { drop(Box::from_raw(io_ptr)) };
                        Err(VectorError::Internal(format!("graph load failed: {e}")))
                    }
                }
            }};
        }

        let inner = match metric {
            Metric::Cosine => load_variant!(DistCosine, LoadedInner::Cosine)?,
            Metric::L2 => load_variant!(DistL2, LoadedInner::L2)?,
        };

        Ok(Graph::Loaded(LoadedGraph { io_ptr, inner }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn loaded_graph_is_send_sync() {
        assert_send::<LoadedGraph>();
        assert_sync::<LoadedGraph>();
    }
}
