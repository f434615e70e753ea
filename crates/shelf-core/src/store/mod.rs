//! Session state store.
//!
//! Owns the active job, the queue, the shelf-state snapshot, the layout and
//! the UI flags. All mutation goes through the methods below, which keep the
//! invariants:
//!
//! - every queued job is valid (non-empty id and lot, non-zero cell)
//! - job ids are unique within the queue
//! - the active job's id is never also queued
//!
//! The three persisted records are written through to a [`KvCache`] on every
//! change. Cache failures are logged and never surface to callers.

mod cache;

pub use cache::{CacheKey, FileCache, KvCache, MemoryCache};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::{Cell, Job, Location, ShelfLayout};

/// Screen chosen by view selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Main,
    QueueSelection,
    ActiveJob,
}

/// Transient UI flags. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiFlags {
    pub show_main_with_queue: bool,
    pub auto_return_timer_active: bool,
    pub activity_detection_active: bool,
    pub pending_jobs_loaded: bool,
    pub current_view: View,
}

/// Shelf identity reported by the Gateway (or configured).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShelfIdentity {
    pub shelf_id: Option<String>,
    pub shelf_name: Option<String>,
}

pub struct StateStore {
    cache: Box<dyn KvCache>,
    layout: ShelfLayout,
    identity: ShelfIdentity,
    active_job: Option<Job>,
    queue: Vec<Job>,
    shelf_state: Vec<Cell>,
    ui: UiFlags,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("active_job", &self.active_job)
            .field("queue", &self.queue.len())
            .field("shelf_state", &self.shelf_state.len())
            .field("ui", &self.ui)
            .finish_non_exhaustive()
    }
}

impl StateStore {
    /// Creates an empty store with the fallback layout. Nothing is read from
    /// the cache until [`StateStore::hydrate`].
    pub fn new(cache: Box<dyn KvCache>) -> Self {
        Self {
            cache,
            layout: ShelfLayout::fallback(),
            identity: ShelfIdentity::default(),
            active_job: None,
            queue: Vec::new(),
            shelf_state: Vec::new(),
            ui: UiFlags::default(),
        }
    }

    /// Store over an in-memory cache.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryCache::new()))
    }

    /// Loads the persisted records. Absent or corrupt entries are treated as
    /// empty (corrupt ones are also deleted).
    pub fn hydrate(&mut self) {
        self.active_job = self
            .load::<Value>(CacheKey::ActiveJob)
            .and_then(|value| serde_json::from_value::<Job>(value).ok())
            .filter(Job::is_valid);
        if self.active_job.is_none() {
            self.forget(CacheKey::ActiveJob);
        }

        let queue = self
            .load::<Vec<Value>>(CacheKey::Queue)
            .map(Job::decode_list)
            .unwrap_or_default();
        self.set_queue(queue);

        let cells = self
            .load::<Vec<Value>>(CacheKey::ShelfState)
            .map(Cell::decode_list)
            .unwrap_or_default();
        self.shelf_state = cells;
        self.persist(CacheKey::ShelfState);

        debug!(
            active = self.active_job.is_some(),
            queued = self.queue.len(),
            cells = self.shelf_state.len(),
            "state store hydrated"
        );
    }

    // ------------------------------------------------------------------------
    // Layout and identity
    // ------------------------------------------------------------------------

    pub fn layout(&self) -> &ShelfLayout {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: ShelfLayout) {
        self.layout = layout;
    }

    pub fn identity(&self) -> &ShelfIdentity {
        &self.identity
    }

    pub fn set_identity(&mut self, identity: ShelfIdentity) {
        self.identity = identity;
    }

    // ------------------------------------------------------------------------
    // Active job
    // ------------------------------------------------------------------------

    pub fn active_job(&self) -> Option<&Job> {
        self.active_job.as_ref()
    }

    /// Replaces the active job. A job with the same id is dropped from the
    /// queue so the two never overlap. Invalid jobs are refused (returns
    /// `false`, nothing changes).
    pub fn set_active_job(&mut self, job: Option<Job>) -> bool {
        if let Some(job) = &job {
            if !job.is_valid() {
                warn!(job_id = %job.job_id, "refusing invalid active job");
                return false;
            }
            self.queue.retain(|queued| queued.job_id != job.job_id);
            self.persist(CacheKey::Queue);
        }
        self.active_job = job;
        self.persist(CacheKey::ActiveJob);
        true
    }

    /// Mutates the active job in place and persists it.
    /// Returns `false` when there is no active job.
    pub fn update_active_job(&mut self, f: impl FnOnce(&mut Job)) -> bool {
        let Some(job) = self.active_job.as_mut() else {
            return false;
        };
        f(job);
        self.persist(CacheKey::ActiveJob);
        true
    }

    pub fn clear_active_job(&mut self) -> Option<Job> {
        let previous = self.active_job.take();
        if previous.is_some() {
            self.persist(CacheKey::ActiveJob);
        }
        previous
    }

    /// Removes `job_id` from the queue and makes it the active job.
    ///
    /// A previous active job is put back at the end of the queue with its
    /// error flags cleared. Returns `None` (and changes nothing) when the id
    /// is not queued.
    pub fn activate_from_queue(&mut self, job_id: &str) -> Option<&Job> {
        let index = self.queue.iter().position(|job| job.job_id == job_id)?;
        let job = self.queue.remove(index);
        if let Some(previous) = self.active_job.take() {
            self.requeue(previous);
        }
        self.active_job = Some(job);
        self.persist(CacheKey::Queue);
        self.persist(CacheKey::ActiveJob);
        self.active_job.as_ref()
    }

    /// Puts the active job back at the end of the queue (error flags
    /// cleared) and clears it. Returns the requeued job, or `None` when
    /// there was no active job or it failed validation and was dropped.
    pub fn return_active_to_queue(&mut self) -> Option<&Job> {
        let job = self.active_job.take()?;
        let requeued = self.requeue(job);
        self.persist(CacheKey::Queue);
        self.persist(CacheKey::ActiveJob);
        if requeued {
            self.queue.last()
        } else {
            None
        }
    }

    /// Appends a former active job through the same gate as
    /// [`Self::add_to_queue`]: invalid jobs are dropped, an already queued
    /// id is replaced by the returning job.
    fn requeue(&mut self, mut job: Job) -> bool {
        if !job.is_valid() {
            warn!(job_id = %job.job_id, "dropping invalid job instead of requeueing");
            return false;
        }
        job.clear_error();
        self.queue.retain(|queued| queued.job_id != job.job_id);
        self.queue.push(job);
        true
    }

    // ------------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------------

    pub fn queue(&self) -> &[Job] {
        &self.queue
    }

    /// Authoritative replace. Invalid entries, duplicate ids and the active
    /// job are filtered out. Returns the number of dropped entries.
    pub fn set_queue(&mut self, jobs: Vec<Job>) -> usize {
        let total = jobs.len();
        let active_id = self.active_job.as_ref().map(|job| job.job_id.clone());
        let mut queue: Vec<Job> = Vec::with_capacity(total);
        for job in jobs {
            if !job.is_valid()
                || active_id.as_deref() == Some(job.job_id.as_str())
                || queue.iter().any(|queued| queued.job_id == job.job_id)
            {
                continue;
            }
            queue.push(job);
        }
        let dropped = total - queue.len();
        if dropped > 0 {
            debug!(dropped, "filtered queue entries");
        }
        self.queue = queue;
        self.persist(CacheKey::Queue);
        dropped
    }

    /// Appends a job. No-op (returns `false`) for invalid jobs, ids already
    /// queued and the active job's id.
    pub fn add_to_queue(&mut self, job: Job) -> bool {
        if !job.is_valid() {
            warn!(job_id = %job.job_id, "refusing to queue invalid job");
            return false;
        }
        let duplicate = self.queue.iter().any(|queued| queued.job_id == job.job_id)
            || self
                .active_job
                .as_ref()
                .is_some_and(|active| active.job_id == job.job_id);
        if duplicate {
            return false;
        }
        self.queue.push(job);
        self.persist(CacheKey::Queue);
        true
    }

    /// Removes a job by id. Removing an unknown id is a no-op.
    pub fn remove_from_queue(&mut self, job_id: &str) -> Option<Job> {
        let index = self.queue.iter().position(|job| job.job_id == job_id)?;
        let job = self.queue.remove(index);
        self.persist(CacheKey::Queue);
        Some(job)
    }

    /// Removes every queued job for a lot. Returns how many were removed.
    pub fn remove_lot_from_queue(&mut self, lot_no: &str) -> usize {
        let before = self.queue.len();
        self.queue.retain(|job| !job.has_lot(lot_no));
        let removed = before - self.queue.len();
        if removed > 0 {
            self.persist(CacheKey::Queue);
        }
        removed
    }

    pub fn find_in_queue_by_lot(&self, lot_no: &str) -> Option<&Job> {
        self.queue.iter().find(|job| job.has_lot(lot_no))
    }

    pub fn find_in_queue(&self, job_id: &str) -> Option<&Job> {
        self.queue.iter().find(|job| job.job_id == job_id)
    }

    // ------------------------------------------------------------------------
    // Shelf state
    // ------------------------------------------------------------------------

    pub fn shelf_state(&self) -> &[Cell] {
        &self.shelf_state
    }

    /// Wholesale replace. The local copy is never patched incrementally.
    pub fn set_shelf_state(&mut self, cells: Vec<Cell>) {
        self.shelf_state = cells;
        self.persist(CacheKey::ShelfState);
    }

    /// Seeds an empty shelf state from the layout if none is loaded.
    pub fn initialize_shelf_state(&mut self) -> bool {
        if !self.shelf_state.is_empty() {
            return false;
        }
        self.shelf_state = self.layout.empty_shelf_state();
        self.persist(CacheKey::ShelfState);
        true
    }

    pub fn cell(&self, location: Location) -> Option<&Cell> {
        self.shelf_state
            .iter()
            .find(|cell| cell.location() == Some(location))
    }

    // ------------------------------------------------------------------------
    // UI flags
    // ------------------------------------------------------------------------

    pub fn ui(&self) -> &UiFlags {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut UiFlags {
        &mut self.ui
    }

    // ------------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------------

    /// Wipes queue, active job and shelf state (memory and cache), then
    /// re-seeds an empty shelf state from the current layout.
    pub fn reset(&mut self) {
        for key in CacheKey::ALL {
            self.forget(key);
        }
        self.active_job = None;
        self.queue.clear();
        self.shelf_state.clear();
        self.ui = UiFlags {
            pending_jobs_loaded: self.ui.pending_jobs_loaded,
            ..UiFlags::default()
        };
        self.initialize_shelf_state();
    }

    // ------------------------------------------------------------------------
    // Cache plumbing
    // ------------------------------------------------------------------------

    fn load<T: DeserializeOwned>(&mut self, key: CacheKey) -> Option<T> {
        let raw = match self.cache.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key = key.as_str(), "cache read failed: {e:#}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = key.as_str(), "dropping corrupt cache entry: {e}");
                self.forget(key);
                None
            }
        }
    }

    fn persist(&mut self, key: CacheKey) {
        let encoded = match key {
            CacheKey::ActiveJob => self.active_job.as_ref().map(encode).transpose(),
            CacheKey::Queue => encode(&self.queue).map(Some),
            CacheKey::ShelfState => encode(&self.shelf_state).map(Some),
        };
        let result = encoded.and_then(|raw| match raw {
            Some(raw) => self.cache.set(key, &raw),
            None => self.cache.remove(key),
        });
        if let Err(e) = result {
            warn!(key = key.as_str(), "cache write failed: {e:#}");
        }
    }

    fn forget(&mut self, key: CacheKey) {
        if let Err(e) = self.cache.remove(key) {
            warn!(key = key.as_str(), "cache remove failed: {e:#}");
        }
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::model::PlaceFlag;

    fn job(id: &str, lot: &str, level: u32, block: u32) -> Job {
        serde_json::from_value(json!({
            "jobId": id, "lot_no": lot, "level": level, "block": block, "place_flg": "1"
        }))
        .unwrap()
    }

    fn ids(store: &StateStore) -> Vec<&str> {
        store.queue().iter().map(|j| j.job_id.as_str()).collect()
    }

    #[test]
    fn test_add_to_queue_is_idempotent() {
        let mut store = StateStore::in_memory();
        assert!(store.add_to_queue(job("A", "ABC123DEF.01", 1, 1)));
        assert!(!store.add_to_queue(job("A", "ABC123DEF.09", 2, 2)));
        assert_eq!(ids(&store), ["A"]);
        assert_eq!(store.queue()[0].lot_no, "ABC123DEF.01");
    }

    #[test]
    fn test_remove_missing_job_is_noop() {
        let mut store = StateStore::in_memory();
        store.add_to_queue(job("A", "ABC123DEF.01", 1, 1));
        assert!(store.remove_from_queue("nope").is_none());
        assert_eq!(ids(&store), ["A"]);
    }

    #[test]
    fn test_queue_never_holds_invalid_jobs() {
        let mut store = StateStore::in_memory();
        let mut bad = job("B", "ABC123DEF.02", 1, 1);
        bad.lot_no = String::new();
        let mut zero = job("C", "ABC123DEF.03", 1, 1);
        zero.level = 0;

        assert!(!store.add_to_queue(bad.clone()));
        let dropped = store.set_queue(vec![job("A", "ABC123DEF.01", 1, 1), bad, zero]);

        assert_eq!(dropped, 2);
        assert!(store.queue().iter().all(Job::is_valid));
    }

    #[test]
    fn test_activate_moves_job_out_of_queue() {
        let mut store = StateStore::in_memory();
        store.set_queue(vec![job("A", "ABC123DEF.01", 1, 1), job("B", "ABC123DEF.02", 2, 2)]);

        let active = store.activate_from_queue("A").cloned().unwrap();

        assert_eq!(active.job_id, "A");
        assert_eq!(ids(&store), ["B"]);
        assert!(store.activate_from_queue("A").is_none());
    }

    #[test]
    fn test_activate_requeues_previous_active_job() {
        let mut store = StateStore::in_memory();
        store.set_queue(vec![job("A", "ABC123DEF.01", 1, 1), job("B", "ABC123DEF.02", 2, 2)]);
        store.activate_from_queue("A");
        store.update_active_job(|j| j.mark_wrong_location("x".to_string()));

        store.activate_from_queue("B");

        assert_eq!(store.active_job().map(|j| j.job_id.as_str()), Some("B"));
        assert_eq!(ids(&store), ["A"]);
        assert!(!store.queue()[0].error);
    }

    #[test]
    fn test_active_job_never_also_queued() {
        let mut store = StateStore::in_memory();
        store.set_active_job(Some(job("A", "ABC123DEF.01", 1, 1)));

        assert!(!store.add_to_queue(job("A", "ABC123DEF.01", 1, 1)));
        store.set_queue(vec![job("A", "ABC123DEF.01", 1, 1), job("B", "ABC123DEF.02", 1, 2)]);
        assert_eq!(ids(&store), ["B"]);

        store.set_active_job(Some(job("B", "ABC123DEF.02", 1, 2)));
        assert!(ids(&store).is_empty());
    }

    #[test]
    fn test_return_active_to_queue_clears_errors() {
        let mut store = StateStore::in_memory();
        store.set_active_job(Some(job("A", "ABC123DEF.01", 1, 1)));
        store.update_active_job(|j| j.mark_wrong_location("x".to_string()));

        let requeued = store.return_active_to_queue().cloned().unwrap();

        assert!(!requeued.error);
        assert!(store.active_job().is_none());
        assert_eq!(ids(&store), ["A"]);
    }

    #[test]
    fn test_invalid_job_never_becomes_active() {
        let mut store = StateStore::in_memory();
        let mut bad = job("A", "ABC123DEF.01", 1, 1);
        bad.lot_no.clear();
        bad.level = 0;

        assert!(!store.set_active_job(Some(bad)));
        assert!(store.active_job().is_none());
        assert!(store.return_active_to_queue().is_none());
        assert!(store.queue().is_empty());
    }

    #[test]
    fn test_requeue_drops_job_that_became_invalid() {
        let mut store = StateStore::in_memory();
        store.set_active_job(Some(job("A", "ABC123DEF.01", 1, 1)));
        store.update_active_job(|j| j.block = 0);

        assert!(store.return_active_to_queue().is_none());
        assert!(store.active_job().is_none());
        assert_eq!(store.queue().iter().filter(|j| !j.is_valid()).count(), 0);
        assert!(store.queue().is_empty());
    }

    #[test]
    fn test_hydrate_drops_invalid_active_job() {
        let mut cache = MemoryCache::new();
        cache
            .set(
                CacheKey::ActiveJob,
                r#"{"jobId":"A","lot_no":"","level":1,"block":1,"place_flg":"1"}"#,
            )
            .unwrap();
        let mut store = StateStore::new(Box::new(cache));

        store.hydrate();

        assert!(store.active_job().is_none());
    }

    #[test]
    fn test_remove_lot_from_queue() {
        let mut store = StateStore::in_memory();
        store.set_queue(vec![job("A", "XYZ999ABC.02", 1, 1), job("B", "ABC123DEF.02", 1, 2)]);
        assert_eq!(store.remove_lot_from_queue(" XYZ999ABC.02"), 1);
        assert_eq!(ids(&store), ["B"]);
        assert_eq!(store.remove_lot_from_queue("XYZ999ABC.02"), 0);
    }

    #[test]
    fn test_hydrate_roundtrips_through_file_cache() {
        let dir = tempdir().unwrap();
        let cells = vec![
            Cell {
                level: 1,
                block: 1,
                lots: vec![crate::model::Lot {
                    lot_no: "ABC123DEF.01".to_string(),
                    tray_count: 4,
                }],
            },
            Cell::empty(Location::new(1, 2).unwrap()),
        ];
        {
            let mut store = StateStore::new(Box::new(FileCache::new(dir.path())));
            store.set_queue(vec![job("A", "ABC123DEF.01", 1, 1), job("B", "ABC123DEF.02", 1, 2)]);
            store.activate_from_queue("B");
            store.set_shelf_state(cells.clone());
        }

        let mut store = StateStore::new(Box::new(FileCache::new(dir.path())));
        store.hydrate();

        assert_eq!(ids(&store), ["A"]);
        let active = store.active_job().unwrap();
        assert_eq!(active.job_id, "B");
        assert_eq!(active.place_flg, PlaceFlag::Place);
        assert_eq!(store.shelf_state(), cells.as_slice());
    }

    #[test]
    fn test_hydrate_accepts_legacy_tuple_cells_and_drops_corrupt() {
        let mut cache = MemoryCache::new();
        cache
            .set(
                CacheKey::ShelfState,
                r#"[[1,1,[{"lot_no":"ABC123DEF.01","tray_count":2}]],{"level":1,"block":2,"lots":[]}]"#,
            )
            .unwrap();
        cache.set(CacheKey::ActiveJob, "{not json").unwrap();
        cache
            .set(
                CacheKey::Queue,
                r#"[{"jobId":"A","lot_no":"ABC123DEF.01","level":1,"block":1},{"jobId":"B","level":2}]"#,
            )
            .unwrap();

        let mut store = StateStore::new(Box::new(cache));
        store.hydrate();

        assert!(store.active_job().is_none());
        assert_eq!(ids(&store), ["A"]);
        assert_eq!(store.shelf_state().len(), 2);
        assert_eq!(store.shelf_state()[0].tray_total(), 2);
    }

    #[test]
    fn test_hydrate_drops_queued_copy_of_active_job() {
        let mut cache = MemoryCache::new();
        cache
            .set(
                CacheKey::ActiveJob,
                r#"{"jobId":"A","lot_no":"ABC123DEF.01","level":1,"block":1,"place_flg":"1"}"#,
            )
            .unwrap();
        cache
            .set(
                CacheKey::Queue,
                r#"[{"jobId":"A","lot_no":"ABC123DEF.01","level":1,"block":1,"place_flg":"1"}]"#,
            )
            .unwrap();

        let mut store = StateStore::new(Box::new(cache));
        store.hydrate();

        assert!(store.active_job().is_some());
        assert!(store.queue().is_empty());
    }

    #[test]
    fn test_reset_wipes_and_reseeds() {
        let mut store = StateStore::in_memory();
        store.set_queue(vec![job("A", "ABC123DEF.01", 1, 1)]);
        store.set_active_job(Some(job("B", "ABC123DEF.02", 1, 2)));
        store.ui_mut().show_main_with_queue = true;
        store.ui_mut().pending_jobs_loaded = true;

        store.reset();

        assert!(store.queue().is_empty());
        assert!(store.active_job().is_none());
        assert_eq!(store.shelf_state().len(), 32);
        assert!(!store.ui().show_main_with_queue);
        assert!(store.ui().pending_jobs_loaded);
    }
}
