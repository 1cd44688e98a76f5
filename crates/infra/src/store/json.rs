use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use vendorauth_core::{Entity, VendorId};
use vendorauth_vendors::{HistoryEntry, HistoryId, NewHistoryEntry, TransitionRequest, VendorRecord};

use super::backend::CollectionBackend;
use super::r#trait::{Collection, StoreError, VendorStore};

type VendorMap = BTreeMap<VendorId, VendorRecord>;

#[derive(Debug, Default)]
struct HistoryLog {
    by_vendor: HashMap<VendorId, Vec<HistoryEntry>>,
    next_id: HistoryId,
}

impl HistoryLog {
    fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        let mut log = HistoryLog::default();
        for entry in entries {
            if entry.id() >= log.next_id {
                log.next_id = entry.id().next();
            }
            log.by_vendor.entry(entry.vendor_id).or_default().push(entry);
        }
        log
    }

    fn sorted(&self) -> Vec<&HistoryEntry> {
        let mut all: Vec<&HistoryEntry> = self.by_vendor.values().flatten().collect();
        all.sort_by_key(|e| e.id());
        all
    }

    fn pop(&mut self, vendor_id: VendorId) {
        if let Some(list) = self.by_vendor.get_mut(&vendor_id) {
            list.pop();
            if list.is_empty() {
                self.by_vendor.remove(&vendor_id);
            }
        }
    }
}

/// Vendor store keeping both collections in memory and rewriting the whole
/// collection through a [`CollectionBackend`] after every mutation.
///
/// Lock order is vendors, then history.
#[derive(Debug)]
pub struct JsonStore<B> {
    backend: B,
    vendors: RwLock<VendorMap>,
    history: RwLock<HistoryLog>,
}

impl<B: CollectionBackend> JsonStore<B> {
    /// Load both collections from `backend`.
    ///
    /// Absent collections are created empty and flushed once. Unparsable
    /// contents fail with [`StoreError::Corrupt`]; the store must not be used.
    pub fn open(backend: B) -> Result<Self, StoreError> {
        let vendor_list: Option<Vec<VendorRecord>> =
            load_collection(&backend, Collection::Vendors)?;
        let history_list: Option<Vec<HistoryEntry>> =
            load_collection(&backend, Collection::History)?;

        let vendors_absent = vendor_list.is_none();
        let history_absent = history_list.is_none();

        let vendors: VendorMap = vendor_list
            .unwrap_or_default()
            .into_iter()
            .map(|rec| (rec.id(), rec))
            .collect();
        let history = HistoryLog::from_entries(history_list.unwrap_or_default());

        if vendors_absent {
            flush_vendors(&backend, &vendors)?;
        }
        if history_absent {
            flush_history(&backend, &history)?;
        }

        tracing::info!(
            vendors = vendors.len(),
            history_entries = history.by_vendor.values().map(Vec::len).sum::<usize>(),
            next_history_id = %history.next_id,
            "vendor store loaded"
        );

        Ok(Self {
            backend,
            vendors: RwLock::new(vendors),
            history: RwLock::new(history),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn read_vendors(&self) -> Result<RwLockReadGuard<'_, VendorMap>, StoreError> {
        self.vendors
            .read()
            .map_err(|_| StoreError::LockPoisoned(Collection::Vendors))
    }

    fn read_history(&self) -> Result<RwLockReadGuard<'_, HistoryLog>, StoreError> {
        self.history
            .read()
            .map_err(|_| StoreError::LockPoisoned(Collection::History))
    }

    fn write_vendors(&self) -> Result<RwLockWriteGuard<'_, VendorMap>, StoreError> {
        self.vendors
            .write()
            .map_err(|_| StoreError::LockPoisoned(Collection::Vendors))
    }

    fn write_history(&self) -> Result<RwLockWriteGuard<'_, HistoryLog>, StoreError> {
        self.history
            .write()
            .map_err(|_| StoreError::LockPoisoned(Collection::History))
    }

    /// Caller holds the vendors write lock.
    fn upsert_locked(
        &self,
        vendors: &mut VendorMap,
        vendor_id: VendorId,
        authorized: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let previous = vendors.get(&vendor_id).cloned();
        vendors
            .entry(vendor_id)
            .or_insert_with(|| VendorRecord::new(vendor_id))
            .apply(authorized, at);

        if let Err(e) = flush_vendors(&self.backend, vendors) {
            restore_vendor(vendors, vendor_id, previous);
            return Err(e);
        }
        Ok(())
    }

    /// Caller holds the history write lock.
    fn append_locked(
        &self,
        history: &mut HistoryLog,
        entry: NewHistoryEntry,
    ) -> Result<HistoryEntry, StoreError> {
        let entry = entry.assign(history.next_id);
        let vendor_id = entry.vendor_id;
        history
            .by_vendor
            .entry(vendor_id)
            .or_default()
            .push(entry.clone());

        if let Err(e) = flush_history(&self.backend, history) {
            history.pop(vendor_id);
            return Err(e);
        }
        history.next_id = entry.history_id.next();
        Ok(entry)
    }
}

impl<B: CollectionBackend> VendorStore for JsonStore<B> {
    fn get_state(&self, vendor_id: VendorId) -> Result<Option<bool>, StoreError> {
        let vendors = self.read_vendors()?;
        Ok(vendors.get(&vendor_id).map(|rec| rec.authorized))
    }

    fn get_vendor(&self, vendor_id: VendorId) -> Result<Option<VendorRecord>, StoreError> {
        let vendors = self.read_vendors()?;
        Ok(vendors.get(&vendor_id).cloned())
    }

    fn set_state(&self, vendor_id: VendorId, authorized: bool) -> Result<(), StoreError> {
        let mut vendors = self.write_vendors()?;
        self.upsert_locked(&mut vendors, vendor_id, authorized, Utc::now())
    }

    fn append_history(&self, entry: NewHistoryEntry) -> Result<HistoryEntry, StoreError> {
        let mut history = self.write_history()?;
        self.append_locked(&mut history, entry)
    }

    fn apply_transition(&self, request: TransitionRequest) -> Result<HistoryEntry, StoreError> {
        let mut vendors = self.write_vendors()?;
        let mut history = self.write_history()?;

        let vendor_id = request.vendor_id;
        let before = vendors.get(&vendor_id).cloned();
        let previous_state = before.as_ref().is_some_and(|rec| rec.authorized);

        self.upsert_locked(&mut vendors, vendor_id, request.target(), request.requested_at)?;

        let err = match self.append_locked(&mut history, request.to_history(previous_state)) {
            Ok(entry) => return Ok(entry),
            Err(e) => e,
        };

        // Undo the state change so the audit trail stays complete.
        let advanced = vendors.get(&vendor_id).cloned();
        restore_vendor(&mut vendors, vendor_id, before);
        if let Err(rollback) = flush_vendors(&self.backend, &vendors) {
            tracing::error!(
                %vendor_id,
                error = %rollback,
                "vendor state rollback failed; history entry is missing"
            );
            // Keep memory in line with what is on disk.
            restore_vendor(&mut vendors, vendor_id, advanced);
            return Err(StoreError::PartialWrite {
                vendor_id,
                source: Box::new(err),
            });
        }
        Err(err)
    }

    fn list_history(&self, vendor_id: VendorId) -> Vec<HistoryEntry> {
        match self.read_history() {
            Ok(history) => history.by_vendor.get(&vendor_id).cloned().unwrap_or_default(),
            Err(e) => {
                tracing::error!(%vendor_id, error = %e, "history unreadable; reporting it empty");
                vec![]
            }
        }
    }

    fn list_vendors(&self) -> Vec<VendorRecord> {
        match self.read_vendors() {
            Ok(vendors) => vendors.values().cloned().collect(),
            Err(e) => {
                tracing::error!(error = %e, "vendors unreadable; reporting none");
                vec![]
            }
        }
    }
}

fn restore_vendor(vendors: &mut VendorMap, vendor_id: VendorId, record: Option<VendorRecord>) {
    match record {
        Some(rec) => {
            vendors.insert(vendor_id, rec);
        }
        None => {
            vendors.remove(&vendor_id);
        }
    }
}

fn load_collection<T: DeserializeOwned>(
    backend: &impl CollectionBackend,
    collection: Collection,
) -> Result<Option<Vec<T>>, StoreError> {
    let Some(bytes) = backend.load(collection)? else {
        return Ok(None);
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Some(Vec::new()));
    }
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Corrupt { collection, source })
}

fn save_collection<T: Serialize>(
    backend: &impl CollectionBackend,
    collection: Collection,
    records: &[T],
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(records)
        .map_err(|source| StoreError::Serialize { collection, source })?;
    match backend.save(collection, &bytes) {
        Ok(()) => {
            tracing::debug!(%collection, records = records.len(), "collection flushed");
            Ok(())
        }
        Err(e) => {
            tracing::error!(%collection, error = %e, "collection flush failed");
            Err(e)
        }
    }
}

fn flush_vendors(backend: &impl CollectionBackend, vendors: &VendorMap) -> Result<(), StoreError> {
    let records: Vec<&VendorRecord> = vendors.values().collect();
    save_collection(backend, Collection::Vendors, &records)
}

fn flush_history(backend: &impl CollectionBackend, history: &HistoryLog) -> Result<(), StoreError> {
    save_collection(backend, Collection::History, &history.sorted())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Timelike};

    use vendorauth_vendors::Transition;

    use super::*;
    use crate::store::MemoryBackend;

    fn vid(raw: i64) -> VendorId {
        VendorId::new(raw).unwrap()
    }

    fn open_memory() -> (Arc<MemoryBackend>, JsonStore<Arc<MemoryBackend>>) {
        let backend = MemoryBackend::arc();
        let store = JsonStore::open(backend.clone()).unwrap();
        (backend, store)
    }

    fn request(raw: i64, transition: Transition, actor: &str) -> TransitionRequest {
        TransitionRequest::new(vid(raw), transition, actor, Utc::now())
    }

    fn entry(raw: i64, previous: bool, new: bool) -> NewHistoryEntry {
        NewHistoryEntry {
            vendor_id: vid(raw),
            previous_state: previous,
            new_state: new,
            changed_at: Utc::now(),
            actor: "hr".to_string(),
        }
    }

    #[test]
    fn opening_an_empty_backend_creates_both_collections() {
        let (backend, store) = open_memory();

        assert_eq!(backend.save_count(Collection::Vendors), 1);
        assert_eq!(backend.save_count(Collection::History), 1);
        assert_eq!(backend.contents(Collection::Vendors).unwrap(), b"[]");
        assert_eq!(backend.contents(Collection::History).unwrap(), b"[]");
        assert!(store.list_vendors().is_empty());
    }

    #[test]
    fn opening_existing_collections_does_not_rewrite_them() {
        let backend = Arc::new(
            MemoryBackend::new()
                .with(Collection::Vendors, "[]")
                .with(Collection::History, "   \n"),
        );
        let store = JsonStore::open(backend.clone()).unwrap();

        assert_eq!(backend.save_count(Collection::Vendors), 0);
        assert_eq!(backend.save_count(Collection::History), 0);
        assert!(store.list_history(vid(1)).is_empty());
    }

    #[test]
    fn corrupt_collection_is_fatal() {
        let backend = MemoryBackend::new().with(Collection::History, "{not json");
        let err = JsonStore::open(backend).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { collection: Collection::History, .. }));
    }

    #[test]
    fn non_positive_vendor_id_on_disk_is_corrupt() {
        let backend = MemoryBackend::new()
            .with(Collection::Vendors, r#"[{"vendorId":0,"authorized":true}]"#);
        let err = JsonStore::open(backend).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { collection: Collection::Vendors, .. }));
    }

    #[test]
    fn duplicate_vendor_records_keep_the_last_one() {
        let backend = MemoryBackend::new().with(
            Collection::Vendors,
            r#"[{"vendorId":4,"authorized":true},{"vendorId":4,"authorized":false}]"#,
        );
        let store = JsonStore::open(backend).unwrap();
        assert_eq!(store.get_state(vid(4)).unwrap(), Some(false));
        assert_eq!(store.list_vendors().len(), 1);
    }

    #[test]
    fn get_state_distinguishes_absent_from_unauthorized() {
        let (_, store) = open_memory();
        assert_eq!(store.get_state(vid(1)).unwrap(), None);

        store.set_state(vid(1), false).unwrap();
        assert_eq!(store.get_state(vid(1)).unwrap(), Some(false));
    }

    #[test]
    fn set_state_stamps_only_the_matching_timestamp() {
        let (_, store) = open_memory();

        store.set_state(vid(2), true).unwrap();
        let first = store.get_vendor(vid(2)).unwrap().unwrap();
        assert!(first.authorized_at.is_some());
        assert!(first.revoked_at.is_none());

        store.set_state(vid(2), false).unwrap();
        let second = store.get_vendor(vid(2)).unwrap().unwrap();
        assert!(!second.authorized);
        assert_eq!(second.authorized_at, first.authorized_at);
        assert!(second.revoked_at.is_some());
    }

    #[test]
    fn set_state_flushes_the_vendor_collection() {
        let (backend, store) = open_memory();
        store.set_state(vid(8), true).unwrap();

        let on_disk: Vec<VendorRecord> =
            serde_json::from_slice(&backend.contents(Collection::Vendors).unwrap()).unwrap();
        assert_eq!(on_disk, store.list_vendors());
        assert_eq!(backend.save_count(Collection::History), 1);
    }

    #[test]
    fn append_history_assigns_increasing_ids_and_truncates_time() {
        let (_, store) = open_memory();
        let mut e = entry(1, false, true);
        e.changed_at = Utc
            .with_ymd_and_hms(2024, 6, 1, 8, 0, 0)
            .unwrap()
            .with_nanosecond(500_000_000)
            .unwrap();

        let a = store.append_history(e).unwrap();
        let b = store.append_history(entry(2, false, true)).unwrap();
        let c = store.append_history(entry(1, true, false)).unwrap();

        assert_eq!(a.history_id, HistoryId::FIRST);
        assert!(a.history_id < b.history_id && b.history_id < c.history_id);
        assert_eq!(a.changed_at.nanosecond(), 0);
        assert_eq!(store.list_history(vid(1)), vec![a, c]);
        assert_eq!(store.list_history(vid(2)), vec![b]);
    }

    #[test]
    fn history_ids_resume_after_reopen() {
        let backend = MemoryBackend::arc();
        let last = {
            let store = JsonStore::open(backend.clone()).unwrap();
            store.append_history(entry(1, false, true)).unwrap();
            store.append_history(entry(1, true, false)).unwrap()
        };

        let store = JsonStore::open(backend).unwrap();
        let next = store.append_history(entry(3, false, true)).unwrap();
        assert_eq!(next.history_id, last.history_id.next());
    }

    #[test]
    fn history_ids_continue_past_large_legacy_ids() {
        let backend = MemoryBackend::new().with(
            Collection::History,
            r#"[{"historyId":1717171717000000001,"vendorId":1,"previousState":false,"newState":true,"changedAt":"2024-05-31T16:08:37Z","actor":"legacy"}]"#,
        );
        let store = JsonStore::open(backend).unwrap();
        let e = store.append_history(entry(1, true, false)).unwrap();
        assert_eq!(e.history_id.get(), 1_717_171_717_000_000_002);
    }

    #[test]
    fn failed_vendor_flush_leaves_memory_unchanged() {
        let (backend, store) = open_memory();
        store.set_state(vid(5), true).unwrap();
        let before = store.get_vendor(vid(5)).unwrap().unwrap();

        backend.fail_saves(Collection::Vendors, true);
        assert!(store.set_state(vid(5), false).is_err());
        assert!(store.set_state(vid(6), true).is_err());

        assert_eq!(store.get_vendor(vid(5)).unwrap(), Some(before));
        assert_eq!(store.get_state(vid(6)).unwrap(), None);
    }

    #[test]
    fn failed_history_flush_does_not_consume_an_id() {
        let (backend, store) = open_memory();
        backend.fail_saves(Collection::History, true);
        assert!(store.append_history(entry(1, false, true)).is_err());
        assert!(store.list_history(vid(1)).is_empty());

        backend.fail_saves(Collection::History, false);
        let e = store.append_history(entry(1, false, true)).unwrap();
        assert_eq!(e.history_id, HistoryId::FIRST);
    }

    #[test]
    fn apply_transition_records_previous_and_new_state() {
        let (_, store) = open_memory();

        let first = store.apply_transition(request(10, Transition::Authorize, "ana")).unwrap();
        let second = store.apply_transition(request(10, Transition::Revoke, "luis")).unwrap();

        assert!(!first.previous_state && first.new_state);
        assert!(second.previous_state && !second.new_state);
        assert_eq!(second.actor, "luis");
        assert_eq!(store.get_state(vid(10)).unwrap(), Some(false));
        assert_eq!(store.list_history(vid(10)), vec![first, second]);
    }

    #[test]
    fn apply_transition_rolls_state_back_when_history_cannot_be_written() {
        let (backend, store) = open_memory();
        store.apply_transition(request(3, Transition::Authorize, "")).unwrap();

        backend.fail_saves(Collection::History, true);
        let err = store.apply_transition(request(3, Transition::Revoke, "")).unwrap_err();

        assert!(matches!(err, StoreError::Io { collection: Collection::History, .. }));
        assert_eq!(store.get_state(vid(3)).unwrap(), Some(true));
        assert_eq!(store.list_history(vid(3)).len(), 1);
        let on_disk: Vec<VendorRecord> =
            serde_json::from_slice(&backend.contents(Collection::Vendors).unwrap()).unwrap();
        assert!(on_disk[0].authorized);
    }

    #[test]
    fn apply_transition_reports_partial_write_when_rollback_fails() {
        let (backend, store) = open_memory();
        backend.fail_saves(Collection::History, true);
        // One vendor flush for the transition, then the rollback flush fails.
        backend.fail_saves_after(Collection::Vendors, 1);

        let err = store.apply_transition(request(7, Transition::Authorize, "x")).unwrap_err();

        match err {
            StoreError::PartialWrite { vendor_id, .. } => assert_eq!(vendor_id, vid(7)),
            other => panic!("expected PartialWrite, got {other:?}"),
        }
        // Memory mirrors the durable vendor file, which holds the new state.
        assert_eq!(store.get_state(vid(7)).unwrap(), Some(true));
        assert!(store.list_history(vid(7)).is_empty());
    }

    #[test]
    fn apply_transition_on_failed_vendor_flush_records_nothing() {
        let (backend, store) = open_memory();
        backend.fail_saves(Collection::Vendors, true);

        assert!(store.apply_transition(request(1, Transition::Authorize, "")).is_err());
        assert_eq!(store.get_state(vid(1)).unwrap(), None);
        assert!(store.list_history(vid(1)).is_empty());
        assert_eq!(backend.save_count(Collection::History), 1);
    }

    #[test]
    fn returned_records_are_copies() {
        let (_, store) = open_memory();
        store.set_state(vid(1), true).unwrap();

        let mut copy = store.list_vendors();
        copy[0].authorized = false;

        assert_eq!(store.get_state(vid(1)).unwrap(), Some(true));
    }
}
