use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use bookgenome_shared::{GenomeError, Marker, MarkerKind, Result};

use crate::MarkerStore;

/// In-process store. Counts every insert and successful delete.
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    markers: Mutex<BTreeMap<String, BTreeMap<String, Marker>>>,
    writes: AtomicUsize,
}

impl MemoryMarkerStore {
    /// Number of mutations applied so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Every marker of every document, ordered by document then tag.
    pub fn snapshot(&self) -> Result<Vec<Marker>> {
        let guard = self.lock()?;
        Ok(guard.values().flat_map(|m| m.values().cloned()).collect())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, Marker>>>> {
        self.markers
            .lock()
            .map_err(|_| GenomeError::Storage("marker store lock poisoned".into()))
    }
}

impl MarkerStore for MemoryMarkerStore {
    async fn list(&self, document_id: &str) -> Result<Vec<Marker>> {
        let guard = self.lock()?;
        Ok(guard
            .get(document_id)
            .map(|markers| markers.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, marker: &Marker) -> Result<()> {
        self.lock()?
            .entry(marker.document_id.clone())
            .or_default()
            .insert(marker.kind.tag(), marker.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, document_id: &str, kind: &MarkerKind) -> Result<bool> {
        let removed = self
            .lock()?
            .get_mut(document_id)
            .and_then(|markers| markers.remove(&kind.tag()))
            .is_some();
        if removed {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }
}
