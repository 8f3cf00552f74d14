use crate::attachment::AttachmentStore;
use crate::document::{JournalDocument, TradePlan, TradeRecord};
use crate::error::{Result, TradelogError};
use crate::fsutil;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

mod queue;

use queue::SerialQueue;

/// The main entry point: owns the trade and plan collections plus the
/// attachment store, with no shared state between instances.
pub struct JournalStore {
    trades: Collection<TradeRecord>,
    plans: Collection<TradePlan>,
    attachments: AttachmentStore,
}

impl JournalStore {
    /// Open a journal rooted at `data_dir` (collection files) and
    /// `images_dir` (attachments). Both directories are created if missing.
    pub fn open(data_dir: impl Into<PathBuf>, images_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(JournalStore {
            trades: Collection::open(&data_dir)?,
            plans: Collection::open(&data_dir)?,
            attachments: AttachmentStore::open(images_dir)?,
        })
    }

    pub fn trades(&self) -> &Collection<TradeRecord> {
        &self.trades
    }

    pub fn plans(&self) -> &Collection<TradePlan> {
        &self.plans
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    /// Store a screenshot under `(entity_id, slot)` and cross-link the
    /// stored path into the owning document, wherever the id lives.
    ///
    /// The cross-link is best-effort: an unknown id leaves the file orphaned,
    /// and a link failure is logged and reported as unlinked. Neither fails
    /// the upload.
    pub fn attach_image(
        &self,
        entity_id: &str,
        slot: &str,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredAttachment> {
        let path = self.attachments.store(entity_id, slot, original_name, bytes)?;
        let linked = self.cross_link(entity_id, slot, &path);
        Ok(StoredAttachment { path, linked })
    }

    fn cross_link(&self, entity_id: &str, slot: &str, path: &str) -> Option<&'static str> {
        match self.trades.link_image(entity_id, slot, path) {
            Ok(Some(_)) => return Some(TradeRecord::COLLECTION),
            Ok(None) => {}
            Err(err) => log::warn!("cross-link into trades failed for {entity_id}: {err}"),
        }
        match self.plans.link_image(entity_id, slot, path) {
            Ok(Some(_)) => Some(TradePlan::COLLECTION),
            Ok(None) => None,
            Err(err) => {
                log::warn!("cross-link into plans failed for {entity_id}: {err}");
                None
            }
        }
    }
}

/// Result of storing an attachment: the public path documents reference,
/// and which collection (if any) the cross-link landed in.
#[derive(Debug, Clone)]
pub struct StoredAttachment {
    pub path: String,
    pub linked: Option<&'static str>,
}

/// One document collection backed by a single JSON-array file.
///
/// All mutations run on a per-file serial queue in submission order, so the
/// read-modify-write cycle of one caller can never trample another's.
/// Reads go straight to the file and are not serialized against writes.
pub struct Collection<T: JournalDocument> {
    path: PathBuf,
    queue: SerialQueue,
    _marker: PhantomData<fn() -> T>,
}

impl<T: JournalDocument> Collection<T> {
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(format!("{}.json", T::COLLECTION));
        if !path.exists() {
            initialize(&path);
        }
        Ok(Collection {
            path,
            queue: SerialQueue::spawn(T::COLLECTION)?,
            _marker: PhantomData,
        })
    }

    /// Full collection in file order. A missing file reads as empty (and is
    /// created); an unparseable file is archived and reset, also reading as
    /// empty. Only unexpected I/O failures surface as errors.
    pub fn read_all(&self) -> Result<Vec<T>> {
        load(&self.path)
    }

    /// Create a document from `draft`: fresh id, `createdAt == updatedAt`,
    /// durably persisted before returning.
    pub fn append(&self, draft: T::Draft) -> Result<T> {
        let path = self.path.clone();
        self.queue.run(move || {
            let mut docs: Vec<T> = load(&path)?;
            let id = uuid::Uuid::new_v4().to_string();
            let doc = T::from_draft(draft, id, Utc::now());
            docs.push(doc.clone());
            persist(&path, &docs)?;
            Ok(doc)
        })
    }

    /// Merge `patch` over the document with `id` and bump `updatedAt`.
    /// Fails with `NotFound` for an unknown id, leaving the file untouched.
    pub fn update(&self, id: &str, patch: T::Patch) -> Result<T> {
        let path = self.path.clone();
        let id = id.to_string();
        self.queue.run(move || {
            let mut docs: Vec<T> = load(&path)?;
            let doc = docs
                .iter_mut()
                .find(|d| d.id() == id)
                .ok_or_else(|| TradelogError::NotFound {
                    collection: T::COLLECTION.to_string(),
                    id: id.clone(),
                })?;
            doc.apply_patch(patch);
            doc.touch(next_timestamp(doc.updated_at()));
            let updated = doc.clone();
            persist(&path, &docs)?;
            Ok(updated)
        })
    }

    /// Filter the document out and rewrite. Removing an absent id is not an
    /// error.
    pub fn remove(&self, id: &str) -> Result<()> {
        let path = self.path.clone();
        let id = id.to_string();
        self.queue.run(move || {
            let mut docs: Vec<T> = load(&path)?;
            docs.retain(|d| d.id() != id);
            persist(&path, &docs)
        })
    }

    /// Point the image field named by `slot` at `image_path` and bump
    /// `updatedAt`. Returns `Ok(None)` without writing when the id is
    /// unknown or the slot does not belong to this document type.
    pub fn link_image(&self, id: &str, slot: &str, image_path: &str) -> Result<Option<T>> {
        let path = self.path.clone();
        let id = id.to_string();
        let slot = slot.to_string();
        let image_path = image_path.to_string();
        self.queue.run(move || {
            let mut docs: Vec<T> = load(&path)?;
            let Some(doc) = docs.iter_mut().find(|d| d.id() == id) else {
                return Ok(None);
            };
            if !doc.set_image(&slot, &image_path) {
                return Ok(None);
            }
            doc.touch(next_timestamp(doc.updated_at()));
            let linked = doc.clone();
            persist(&path, &docs)?;
            Ok(Some(linked))
        })
    }
}

// ── File I/O ────────────────────────────────────────────────────

/// `updatedAt` must move strictly forward even when the wall clock does not.
fn next_timestamp(prev: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > prev {
        now
    } else {
        prev + Duration::microseconds(1)
    }
}

fn load<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            initialize(path);
            return Ok(Vec::new());
        }
        Err(err) => return Err(err.into()),
    };

    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str(&raw) {
        Ok(docs) => Ok(docs),
        Err(err) => {
            log::warn!("corrupt collection file {}: {err}", path.display());
            recover(path);
            Ok(Vec::new())
        }
    }
}

/// Serialize the whole collection, write a sibling temp file, rename it over
/// the target. A reader never observes a half-written file; the rename is
/// the only transition the target path undergoes.
fn persist<T: Serialize>(path: &Path, docs: &[T]) -> Result<()> {
    let body = serde_json::to_string_pretty(docs)?;
    let tmp = path.with_extension("json.tmp");
    let write_err = |source: io::Error| TradelogError::WriteFailure {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(&tmp, body).map_err(write_err)?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(err));
    }

    if let Err(err) = fsutil::normalize_permissions(path, 0o644) {
        log::warn!("failed to normalize permissions on {}: {err}", path.display());
    }
    Ok(())
}

/// Archive the corrupt file under a timestamped sidecar name and reset the
/// original to an empty array. Both steps are best-effort; the caller
/// continues with an empty collection either way.
fn recover(path: &Path) {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3f");
    let backup = path.with_extension(format!("json.corrupt-{stamp}"));
    match fs::rename(path, &backup) {
        Ok(()) => log::warn!(
            "archived corrupt collection file as {}",
            backup.display()
        ),
        Err(err) => log::warn!(
            "failed to archive corrupt file {}: {err}",
            path.display()
        ),
    }
    if let Err(err) = fs::write(path, "[]") {
        log::warn!("failed to reset collection file {}: {err}", path.display());
    }
}

fn initialize(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            log::warn!("failed to create data directory {}: {err}", parent.display());
            return;
        }
    }
    if let Err(err) = fs::write(path, "[]") {
        log::warn!("failed to create collection file {}: {err}", path.display());
    } else if let Err(err) = fsutil::normalize_permissions(path, 0o644) {
        log::warn!("failed to normalize permissions on {}: {err}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{PlanDraft, PlanPatch, PlanStatus, TradeDraft, TradePatch, TradeStatus};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, JournalStore) {
        let tmp = TempDir::new().unwrap();
        let store =
            JournalStore::open(tmp.path().join("data"), tmp.path().join("images")).unwrap();
        (tmp, store)
    }

    fn btc_draft() -> TradeDraft {
        TradeDraft {
            symbol: "BTC".into(),
            entry_price: Some(100.0),
            expected_stop_loss: Some(90.0),
            expected_take_profit: Some(130.0),
            ..TradeDraft::default()
        }
    }

    #[test]
    fn append_assigns_id_and_equal_timestamps() {
        let (_tmp, store) = open_store();
        let trade = store.trades().append(btc_draft()).unwrap();

        assert!(!trade.id.is_empty());
        assert_eq!(trade.created_at, trade.updated_at);
        assert_eq!(trade.status, TradeStatus::Open);
        // Derived ratio is computed by the caller, never by the store
        assert_eq!(trade.expected_rr_ratio, None);
    }

    #[test]
    fn read_all_returns_documents_in_append_order() {
        let (_tmp, store) = open_store();
        for symbol in ["BTC", "ETH", "SOL"] {
            store
                .trades()
                .append(TradeDraft {
                    symbol: symbol.into(),
                    ..TradeDraft::default()
                })
                .unwrap();
        }

        let trades = store.trades().read_all().unwrap();
        let symbols: Vec<&str> = trades.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH", "SOL"]);

        let ids: HashSet<&str> = trades.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), trades.len());
    }

    #[test]
    fn missing_file_reads_as_empty_and_is_created() {
        let tmp = TempDir::new().unwrap();
        let data_dir = tmp.path().join("data");
        let store = JournalStore::open(&data_dir, tmp.path().join("images")).unwrap();

        let file = data_dir.join("trades.json");
        fs::remove_file(&file).unwrap();

        assert!(store.trades().read_all().unwrap().is_empty());
        assert_eq!(fs::read_to_string(&file).unwrap(), "[]");
    }

    #[test]
    fn update_merges_fields_and_advances_updated_at() {
        let (_tmp, store) = open_store();
        let trade = store.trades().append(btc_draft()).unwrap();

        let updated = store
            .trades()
            .update(
                &trade.id,
                TradePatch {
                    status: Some(TradeStatus::Closed),
                    actual_profit_loss: Some(25.0),
                    ..TradePatch::default()
                },
            )
            .unwrap();

        assert_eq!(updated.status, TradeStatus::Closed);
        assert_eq!(updated.actual_profit_loss, Some(25.0));
        assert_eq!(updated.symbol, "BTC");
        assert_eq!(updated.entry_price, Some(100.0));
        assert!(updated.updated_at > trade.updated_at);

        let reread = store.trades().read_all().unwrap();
        assert_eq!(reread.len(), 1);
        assert_eq!(reread[0], updated);
    }

    #[test]
    fn update_unknown_id_fails_and_leaves_collection_unchanged() {
        let (_tmp, store) = open_store();
        store.trades().append(btc_draft()).unwrap();
        let before = store.trades().read_all().unwrap();

        let err = store
            .trades()
            .update("no-such-id", TradePatch::default())
            .unwrap_err();
        assert!(matches!(err, TradelogError::NotFound { .. }));

        assert_eq!(store.trades().read_all().unwrap(), before);
    }

    #[test]
    fn remove_is_idempotent() {
        let (_tmp, store) = open_store();
        let keep = store.trades().append(btc_draft()).unwrap();
        let gone = store.trades().append(btc_draft()).unwrap();

        store.trades().remove(&gone.id).unwrap();
        store.trades().remove(&gone.id).unwrap();
        store.trades().remove("never-existed").unwrap();

        let trades = store.trades().read_all().unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].id, keep.id);
    }

    #[test]
    fn append_round_trips_every_supplied_field() {
        let (_tmp, store) = open_store();
        let draft = TradeDraft {
            plan_id: Some("plan-7".into()),
            symbol: "ETH".into(),
            rule: Some(crate::document::TradeRule::Breakout),
            entry_time: Some("2026-08-01T09:30".into()),
            entry_price: Some(3200.5),
            reason: Some("range break on volume".into()),
            expected_stop_loss: Some(3100.0),
            expected_take_profit: Some(3500.0),
            expected_rr_ratio: Some(2.98),
            summary: None,
            status: Some(TradeStatus::Open),
            ..TradeDraft::default()
        };

        let created = store.trades().append(draft).unwrap();
        let found = store
            .trades()
            .read_all()
            .unwrap()
            .into_iter()
            .find(|t| t.id == created.id)
            .unwrap();

        assert_eq!(found, created);
        assert_eq!(found.plan_id.as_deref(), Some("plan-7"));
        assert_eq!(found.entry_time.as_deref(), Some("2026-08-01T09:30"));
        assert_eq!(found.expected_rr_ratio, Some(2.98));
    }

    #[test]
    fn corrupt_file_recovers_to_empty_with_backup() {
        let tmp = TempDir::new().unwrap();
        let data_dir = tmp.path().join("data");
        let store = JournalStore::open(&data_dir, tmp.path().join("images")).unwrap();
        store.trades().append(btc_draft()).unwrap();

        let file = data_dir.join("trades.json");
        fs::write(&file, "{not json").unwrap();

        assert!(store.trades().read_all().unwrap().is_empty());
        assert!(store.trades().read_all().unwrap().is_empty());

        let backups: Vec<String> = fs::read_dir(&data_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains("corrupt"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&file).unwrap(), "[]");
    }

    #[test]
    fn non_array_json_also_recovers() {
        let tmp = TempDir::new().unwrap();
        let data_dir = tmp.path().join("data");
        let store = JournalStore::open(&data_dir, tmp.path().join("images")).unwrap();

        fs::write(data_dir.join("plans.json"), r#"{"plans": []}"#).unwrap();
        assert!(store.plans().read_all().unwrap().is_empty());

        let has_backup = fs::read_dir(&data_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().contains("corrupt"));
        assert!(has_backup);
    }

    #[test]
    fn concurrent_appends_lose_nothing() {
        let (_tmp, store) = open_store();
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for worker in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..4 {
                    store
                        .trades()
                        .append(TradeDraft {
                            symbol: format!("SYM-{worker}-{i}"),
                            ..TradeDraft::default()
                        })
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let trades = store.trades().read_all().unwrap();
        assert_eq!(trades.len(), 32);
        let ids: HashSet<&str> = trades.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), 32);
    }

    #[test]
    fn attachment_upload_cross_links_into_the_owning_trade() {
        let (_tmp, store) = open_store();
        let trade = store.trades().append(btc_draft()).unwrap();

        let stored = store
            .attach_image(&trade.id, "entry", Some("screenshot.png"), b"fake png bytes")
            .unwrap();

        assert_eq!(stored.linked, Some("trades"));
        assert_eq!(stored.path, format!("/images/{}/entry.png", trade.id));

        let reread = store
            .trades()
            .read_all()
            .unwrap()
            .into_iter()
            .find(|t| t.id == trade.id)
            .unwrap();
        assert_eq!(reread.entry_image.as_deref(), Some(stored.path.as_str()));
        assert!(reread.updated_at > trade.updated_at);
    }

    #[test]
    fn attachment_for_unknown_entity_is_stored_but_orphaned() {
        let (tmp, store) = open_store();

        let stored = store
            .attach_image("f0e5cdd8-0000-0000-0000-000000000000", "entry", None, b"bytes")
            .unwrap();

        assert_eq!(stored.linked, None);
        let on_disk = tmp
            .path()
            .join("images")
            .join("f0e5cdd8-0000-0000-0000-000000000000")
            .join("entry.jpg");
        assert!(on_disk.exists());
    }

    #[test]
    fn plan_slots_cross_link_into_plans() {
        let (_tmp, store) = open_store();
        let plan = store
            .plans()
            .append(PlanDraft {
                content: "fade the gap".into(),
                ..PlanDraft::default()
            })
            .unwrap();

        let stored = store
            .attach_image(&plan.id, "summary", Some("review.jpg"), b"jpeg")
            .unwrap();
        assert_eq!(stored.linked, Some("plans"));

        let reread = store.plans().read_all().unwrap();
        assert_eq!(reread[0].summary_image.as_deref(), Some(stored.path.as_str()));
    }

    #[test]
    fn plan_review_lifecycle() {
        let (_tmp, store) = open_store();
        let plan = store
            .plans()
            .append(PlanDraft {
                content: "long the retest if CPI cools".into(),
                ..PlanDraft::default()
            })
            .unwrap();
        assert_eq!(plan.status, PlanStatus::Planned);

        let reviewed = store
            .plans()
            .update(
                &plan.id,
                PlanPatch {
                    status: Some(PlanStatus::Reviewed),
                    summary: Some("entry was late, thesis held".into()),
                    ..PlanPatch::default()
                },
            )
            .unwrap();

        assert_eq!(reviewed.status, PlanStatus::Reviewed);
        assert_eq!(reviewed.content, plan.content);
        assert!(reviewed.updated_at > plan.updated_at);
    }

    #[test]
    fn trade_and_plan_collections_are_independent() {
        let (_tmp, store) = open_store();
        store.trades().append(btc_draft()).unwrap();
        store
            .plans()
            .append(PlanDraft {
                content: "no trades on FOMC day".into(),
                ..PlanDraft::default()
            })
            .unwrap();

        assert_eq!(store.trades().read_all().unwrap().len(), 1);
        assert_eq!(store.plans().read_all().unwrap().len(), 1);
    }
}
