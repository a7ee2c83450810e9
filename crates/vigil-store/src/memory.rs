use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;
use vigil_types::TypeRegistry;

use crate::context::Context;
use crate::error::{PatchError, RequestError, StoreError, StoreResult, WrapError};
use crate::etag::{ETag, ETagCondition, TxRecordInfo};
use crate::request::{ResourceRequest, SortOrder};
use crate::traits::{decode_continue, encode_continue, Patcher, SelectionPredicate, Store};
use crate::wrapper::{WrapList, WrapOptions, Wrapper};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct RecordKey {
    store_name: String,
    namespace: String,
    name: String,
}

impl From<&ResourceRequest> for RecordKey {
    fn from(req: &ResourceRequest) -> Self {
        Self {
            store_name: req.store_name.clone(),
            namespace: req.namespace.clone(),
            name: req.name.clone(),
        }
    }
}

#[derive(Clone, Debug)]
struct Record {
    wrapper: Wrapper,
    etag: ETag,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WriteMode {
    Upsert,
    UpdateOnly,
    CreateOnly,
}

/// In-memory, BTreeMap-based [`Store`].
///
/// Intended for tests and embedding. Records are held behind a `RwLock` and
/// cloned on read/write. ETags are digests of the stored payload. Patching
/// needs the [`TypeRegistry`] to decode stored values.
pub struct InMemoryStore {
    records: RwLock<BTreeMap<RecordKey, Record>>,
    registry: Arc<TypeRegistry>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            registry,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Number of records across all collections.
    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().expect("lock poisoned").is_empty()
    }

    /// Current ETag of a record, if present.
    pub fn etag_of(&self, req: &ResourceRequest) -> Option<ETag> {
        let records = self.records.read().expect("lock poisoned");
        records.get(&RecordKey::from(req)).map(|r| r.etag.clone())
    }

    /// Simulate an unreachable backend: every operation fails with
    /// `StoreError::Internal` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn precheck(&self, ctx: &Context, req: &ResourceRequest) -> StoreResult<()> {
        ctx.check_cancelled()?;
        req.validate()?;
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("in-memory store is unavailable".into()));
        }
        Ok(())
    }

    fn write(&self, ctx: &Context, req: &ResourceRequest, wrapper: &Wrapper, mode: WriteMode) -> StoreResult<()> {
        self.precheck(ctx, req)?;
        let key = RecordKey::from(req);
        let etag = ETag::for_payload(&wrapper.value);

        let mut records = self.records.write().expect("lock poisoned");
        let prev = records.get(&key).map(|r| r.etag.clone());
        match (mode, &prev) {
            (WriteMode::UpdateOnly, None) => return Err(StoreError::NotFound(req.to_string())),
            (WriteMode::CreateOnly, Some(_)) => {
                return Err(StoreError::AlreadyExists(req.to_string()))
            }
            _ => {}
        }
        ctx.etag_condition().check(&req.to_string(), prev.as_ref())?;

        records.insert(
            key,
            Record {
                wrapper: wrapper.clone(),
                etag: etag.clone(),
            },
        );
        drop(records);

        debug!(resource = %req, ?mode, %etag, "stored resource");
        ctx.record_tx(TxRecordInfo {
            created: prev.is_none(),
            updated: prev.is_some(),
            deleted: false,
            etag: Some(etag),
            prev_etag: prev,
        });
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("record_count", &self.len())
            .field("unavailable", &self.unavailable.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_or_update(&self, ctx: &Context, req: &ResourceRequest, wrapper: &Wrapper) -> StoreResult<()> {
        self.write(ctx, req, wrapper, WriteMode::Upsert)
    }

    async fn update_if_exists(&self, ctx: &Context, req: &ResourceRequest, wrapper: &Wrapper) -> StoreResult<()> {
        self.write(ctx, req, wrapper, WriteMode::UpdateOnly)
    }

    async fn create_if_not_exists(&self, ctx: &Context, req: &ResourceRequest, wrapper: &Wrapper) -> StoreResult<()> {
        self.write(ctx, req, wrapper, WriteMode::CreateOnly)
    }

    async fn get(&self, ctx: &Context, req: &ResourceRequest) -> StoreResult<Wrapper> {
        self.precheck(ctx, req)?;
        let records = self.records.read().expect("lock poisoned");
        records
            .get(&RecordKey::from(req))
            .map(|r| r.wrapper.clone())
            .ok_or_else(|| StoreError::NotFound(req.to_string()))
    }

    async fn delete(&self, ctx: &Context, req: &ResourceRequest) -> StoreResult<()> {
        self.precheck(ctx, req)?;
        let key = RecordKey::from(req);
        let mut records = self.records.write().expect("lock poisoned");
        let prev = match records.get(&key) {
            Some(record) => record.etag.clone(),
            None => return Err(StoreError::NotFound(req.to_string())),
        };
        ctx.etag_condition().check(&req.to_string(), Some(&prev))?;
        records.remove(&key);
        drop(records);

        debug!(resource = %req, "deleted resource");
        ctx.record_tx(TxRecordInfo {
            deleted: true,
            prev_etag: Some(prev),
            ..Default::default()
        });
        Ok(())
    }

    async fn list(&self, ctx: &Context, req: &ResourceRequest, pred: &SelectionPredicate) -> StoreResult<WrapList> {
        self.precheck(ctx, req)?;
        let descending = req.sort_order == SortOrder::Descend;
        let after = if pred.continue_token.is_empty() {
            None
        } else {
            let cursor = decode_continue(&pred.continue_token)
                .ok_or_else(|| RequestError::InvalidContinueToken(pred.continue_token.clone()))?;
            Some(cursor)
        };

        let records = self.records.read().expect("lock poisoned");
        let mut matching: Vec<(&RecordKey, &Record)> = records
            .iter()
            .filter(|(key, _)| key.store_name == req.store_name)
            .filter(|(key, _)| req.namespace.is_empty() || key.namespace == req.namespace)
            .filter(|(_, record)| pred.matches_labels(&record.wrapper.metadata.labels))
            .collect();
        if descending {
            matching.reverse();
        }
        if let Some((namespace, name)) = &after {
            let cursor = (namespace.as_str(), name.as_str());
            matching.retain(|(key, _)| {
                let position = (key.namespace.as_str(), key.name.as_str());
                if descending {
                    position < cursor
                } else {
                    position > cursor
                }
            });
        }

        // A zero limit means no limit.
        let limit = pred.limit.filter(|l| *l > 0).unwrap_or(usize::MAX);
        let continue_token = if matching.len() > limit {
            let (last, _) = matching[limit - 1];
            Some(encode_continue(&last.namespace, &last.name))
        } else {
            None
        };
        let items = matching
            .into_iter()
            .take(limit)
            .map(|(_, record)| record.wrapper.clone())
            .collect();

        Ok(WrapList { items, continue_token })
    }

    async fn exists(&self, ctx: &Context, req: &ResourceRequest) -> StoreResult<bool> {
        self.precheck(ctx, req)?;
        let records = self.records.read().expect("lock poisoned");
        Ok(records.contains_key(&RecordKey::from(req)))
    }

    async fn patch(
        &self,
        ctx: &Context,
        req: &ResourceRequest,
        patcher: &dyn Patcher,
        condition: Option<&ETagCondition>,
    ) -> StoreResult<Wrapper> {
        self.precheck(ctx, req)?;
        let key = RecordKey::from(req);
        let mut records = self.records.write().expect("lock poisoned");
        let current = records
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(req.to_string()))?;

        let condition = match condition {
            Some(condition) => condition.clone(),
            None => ctx.etag_condition(),
        };
        condition.check(&req.to_string(), Some(&current.etag))?;
        let prev_etag = current.etag.clone();
        let options = WrapOptions::preserving(&current.wrapper);

        let value = current.wrapper.unwrap(&self.registry)?;
        let original = value.to_json_value().map_err(WrapError::from)?;
        let original = serde_json::to_vec(&original).map_err(|e| PatchError::Json(e.to_string()))?;
        let patched = patcher.patch(&original)?;
        let patched: serde_json::Value =
            serde_json::from_slice(&patched).map_err(|e| PatchError::Json(e.to_string()))?;

        let codec = self.registry.resolve(&current.wrapper.type_meta).map_err(WrapError::from)?;
        let updated = codec.from_json(patched).map_err(WrapError::from)?;
        updated.validate_resource().map_err(StoreError::Validation)?;
        let meta = updated.object_meta();
        if meta.namespace != req.namespace || meta.name != req.name {
            return Err(StoreError::Validation(vigil_types::TypeError::InvalidMetadata(
                "patch must not change namespace or name".into(),
            )));
        }

        let wrapper = Wrapper::wrap_dyn(updated.as_ref(), &options)?;
        let etag = ETag::for_payload(&wrapper.value);
        records.insert(
            key,
            Record {
                wrapper: wrapper.clone(),
                etag: etag.clone(),
            },
        );
        drop(records);

        debug!(resource = %req, %etag, "patched resource");
        ctx.record_tx(TxRecordInfo {
            updated: true,
            etag: Some(etag),
            prev_etag: Some(prev_etag),
            ..Default::default()
        });
        Ok(wrapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TxInfoHandle;
    use crate::etag::{IfMatch, IfNoneMatch};
    use crate::patch::MergePatch;
    use crate::testing::{check, registry, CheckConfig};
    use serde_json::json;

    fn store() -> InMemoryStore {
        InMemoryStore::new(Arc::new(registry()))
    }

    fn wrapped(resource: &CheckConfig) -> (ResourceRequest, Wrapper) {
        (
            ResourceRequest::from_resource(resource),
            Wrapper::wrap(resource, &WrapOptions::default()).unwrap(),
        )
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn create_then_get() {
        let store = store();
        let ctx = Context::background();
        let (req, w) = wrapped(&check("cpu"));
        store.create_or_update(&ctx, &req, &w).await.unwrap();

        let read_back = store.get(&ctx, &req).await.unwrap();
        assert_eq!(read_back, w);
        assert_eq!(read_back.unwrap_into::<CheckConfig>().unwrap(), check("cpu"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = store();
        let req = ResourceRequest::for_type::<CheckConfig>("default", "missing");
        let err = store.get(&Context::background(), &req).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn update_if_exists_requires_existing() {
        let store = store();
        let ctx = Context::background();
        let (req, w) = wrapped(&check("cpu"));
        let err = store.update_if_exists(&ctx, &req, &w).await.unwrap_err();
        assert!(err.is_not_found());

        store.create_or_update(&ctx, &req, &w).await.unwrap();
        let mut changed = check("cpu");
        changed.interval = 10;
        let (_, w2) = wrapped(&changed);
        store.update_if_exists(&ctx, &req, &w2).await.unwrap();
        let got: CheckConfig = store.get(&ctx, &req).await.unwrap().unwrap_into().unwrap();
        assert_eq!(got.interval, 10);
    }

    #[tokio::test]
    async fn create_if_not_exists_rejects_duplicates() {
        let store = store();
        let ctx = Context::background();
        let (req, w) = wrapped(&check("cpu"));
        store.create_if_not_exists(&ctx, &req, &w).await.unwrap();
        let err = store.create_if_not_exists(&ctx, &req, &w).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn delete_and_exists() {
        let store = store();
        let ctx = Context::background();
        let (req, w) = wrapped(&check("cpu"));
        assert!(!store.exists(&ctx, &req).await.unwrap());
        store.create_or_update(&ctx, &req, &w).await.unwrap();
        assert!(store.exists(&ctx, &req).await.unwrap());

        store.delete(&ctx, &req).await.unwrap();
        assert!(!store.exists(&ctx, &req).await.unwrap());
        assert!(store.delete(&ctx, &req).await.unwrap_err().is_not_found());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn invalid_request_is_rejected() {
        let store = store();
        let mut req = ResourceRequest::for_type::<CheckConfig>("default", "cpu");
        req.store_name.clear();
        let err = store.exists(&Context::background(), &req).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(RequestError::MissingStoreName)));
    }

    #[tokio::test]
    async fn cancelled_context_is_rejected() {
        let store = store();
        let ctx = Context::background();
        ctx.cancel();
        let (req, w) = wrapped(&check("cpu"));
        let err = store.create_or_update(&ctx, &req, &w).await.unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unavailable_backend_is_internal_not_not_found() {
        let store = store();
        store.set_unavailable(true);
        let req = ResourceRequest::for_type::<CheckConfig>("default", "cpu");
        let err = store.get(&Context::background(), &req).await.unwrap_err();
        assert!(err.is_internal());
        assert!(!err.is_not_found());

        store.set_unavailable(false);
        assert!(store.get(&Context::background(), &req).await.unwrap_err().is_not_found());
    }

    // -----------------------------------------------------------------------
    // Preconditions and TxInfo
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn tx_info_reports_create_update_delete() {
        let store = store();
        let handle = TxInfoHandle::new();
        let ctx = Context::background().with_tx_info(handle.clone());
        let (req, w) = wrapped(&check("cpu"));

        store.create_or_update(&ctx, &req, &w).await.unwrap();
        let first = handle.snapshot().last().cloned().unwrap();
        assert!(first.created);
        assert_eq!(first.prev_etag, None);
        assert_eq!(first.etag, store.etag_of(&req));

        let mut changed = check("cpu");
        changed.command = "other".into();
        let (_, w2) = wrapped(&changed);
        store.create_or_update(&ctx, &req, &w2).await.unwrap();
        let second = handle.snapshot().last().cloned().unwrap();
        assert!(second.updated);
        assert_eq!(second.prev_etag, first.etag);

        store.delete(&ctx, &req).await.unwrap();
        let info = handle.snapshot();
        assert_eq!((info.created(), info.updated(), info.deleted()), (1, 1, 1));
        assert_eq!(info.last().unwrap().prev_etag, second.etag);
    }

    #[tokio::test]
    async fn context_if_match_guards_writes() {
        let store = store();
        let (req, w) = wrapped(&check("cpu"));
        store.create_or_update(&Context::background(), &req, &w).await.unwrap();
        let current = store.etag_of(&req).unwrap();

        let stale = Context::background().with_if_match(IfMatch(vec![ETag::from_bytes(vec![0; 8])]));
        let err = store.create_or_update(&stale, &req, &w).await.unwrap_err();
        assert!(err.is_conflict());
        let err = store.delete(&stale, &req).await.unwrap_err();
        assert!(err.is_conflict());

        let fresh = Context::background().with_if_match(IfMatch(vec![current]));
        store.create_or_update(&fresh, &req, &w).await.unwrap();
    }

    #[tokio::test]
    async fn context_if_none_match_guards_writes() {
        let store = store();
        let (req, w) = wrapped(&check("cpu"));
        store.create_or_update(&Context::background(), &req, &w).await.unwrap();
        let current = store.etag_of(&req).unwrap();

        let ctx = Context::background().with_if_none_match(IfNoneMatch(vec![current]));
        assert!(store.update_if_exists(&ctx, &req, &w).await.unwrap_err().is_conflict());
    }

    // -----------------------------------------------------------------------
    // Patch
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn patch_applies_merge_patch_and_keeps_encoding() {
        let store = store();
        let ctx = Context::background();
        let (req, w) = wrapped(&check("cpu"));
        store.create_or_update(&ctx, &req, &w).await.unwrap();
        let etag = store.etag_of(&req).unwrap();

        let patched = store
            .patch(
                &ctx,
                &req,
                &MergePatch::new(json!({"interval": 15})),
                Some(&ETagCondition::if_match([etag.clone()])),
            )
            .await
            .unwrap();
        assert_eq!(patched.encoding, w.encoding);
        assert_eq!(patched.compression, w.compression);
        let got: CheckConfig = store.get(&ctx, &req).await.unwrap().unwrap_into().unwrap();
        assert_eq!(got.interval, 15);
        assert_ne!(store.etag_of(&req), Some(etag));
    }

    #[tokio::test]
    async fn patch_with_stale_etag_conflicts() {
        let store = store();
        let ctx = Context::background();
        let (req, w) = wrapped(&check("cpu"));
        store.create_or_update(&ctx, &req, &w).await.unwrap();

        let stale = ETagCondition::if_match([ETag::from_bytes(vec![9; 8])]);
        let err = store
            .patch(&ctx, &req, &MergePatch::new(json!({"interval": 15})), Some(&stale))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        let got: CheckConfig = store.get(&ctx, &req).await.unwrap().unwrap_into().unwrap();
        assert_eq!(got.interval, 60);
    }

    #[tokio::test]
    async fn patch_result_must_validate() {
        let store = store();
        let ctx = Context::background();
        let (req, w) = wrapped(&check("cpu"));
        store.create_or_update(&ctx, &req, &w).await.unwrap();

        let err = store
            .patch(&ctx, &req, &MergePatch::new(json!({"interval": 0})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = store
            .patch(&ctx, &req, &MergePatch::new(json!({"metadata": {"name": "renamed"}})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn patch_missing_is_not_found() {
        let store = store();
        let req = ResourceRequest::for_type::<CheckConfig>("default", "cpu");
        let err = store
            .patch(&Context::background(), &req, &MergePatch::new(json!({})), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    // -----------------------------------------------------------------------
    // List
    // -----------------------------------------------------------------------

    async fn seed(store: &InMemoryStore, names: &[(&str, &str)]) {
        let ctx = Context::background();
        for (namespace, name) in names {
            let mut c = check(name);
            c.metadata.namespace = namespace.to_string();
            if name.starts_with('a') {
                c.metadata.labels.insert("team".into(), "alpha".into());
            }
            let (req, w) = wrapped(&c);
            store.create_or_update(&ctx, &req, &w).await.unwrap();
        }
    }

    fn names(list: &WrapList) -> Vec<String> {
        list.items.iter().map(|w| w.metadata.name.clone()).collect()
    }

    #[tokio::test]
    async fn list_scopes_by_namespace_and_sorts() {
        let store = store();
        seed(&store, &[("default", "b"), ("default", "a"), ("ops", "c")]).await;
        let ctx = Context::background();
        let pred = SelectionPredicate::default();

        let req = ResourceRequest::for_type::<CheckConfig>("default", "");
        assert_eq!(names(&store.list(&ctx, &req, &pred).await.unwrap()), vec!["a", "b"]);

        let all = ResourceRequest::for_type::<CheckConfig>("", "").with_sort_order(SortOrder::Descend);
        assert_eq!(names(&store.list(&ctx, &all, &pred).await.unwrap()), vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn list_filters_by_label() {
        let store = store();
        seed(&store, &[("default", "alpha-1"), ("default", "beta-1"), ("default", "alpha-2")]).await;
        let req = ResourceRequest::for_type::<CheckConfig>("default", "");
        let pred = SelectionPredicate::default().with_label("team", "alpha");
        let list = store.list(&Context::background(), &req, &pred).await.unwrap();
        assert_eq!(names(&list), vec!["alpha-1", "alpha-2"]);
    }

    #[tokio::test]
    async fn list_pages_visit_every_item_once() {
        let store = store();
        let seeded: Vec<(&str, String)> = (0..7).map(|i| ("default", format!("check-{i}"))).collect();
        let refs: Vec<(&str, &str)> = seeded.iter().map(|(ns, n)| (*ns, n.as_str())).collect();
        seed(&store, &refs).await;

        for order in [SortOrder::Ascend, SortOrder::Descend] {
            let req = ResourceRequest::for_type::<CheckConfig>("default", "").with_sort_order(order);
            let mut pred = SelectionPredicate::default().with_limit(3);
            let mut seen = Vec::new();
            loop {
                let page = store.list(&Context::background(), &req, &pred).await.unwrap();
                assert!(page.len() <= 3);
                seen.extend(names(&page));
                match page.continue_token {
                    Some(token) => pred = pred.with_continue(token),
                    None => break,
                }
            }
            let mut sorted = seen.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(seen.len(), 7);
            assert_eq!(sorted.len(), 7);
        }
    }

    #[tokio::test]
    async fn list_pages_across_namespaces_containing_slashes() {
        let store = store();
        seed(&store, &[("team/a", "x"), ("team/a", "y"), ("team", "a/b")]).await;
        let req = ResourceRequest::for_type::<CheckConfig>("", "");
        let mut pred = SelectionPredicate::default().with_limit(1);
        let mut seen = Vec::new();
        loop {
            let page = store.list(&Context::background(), &req, &pred).await.unwrap();
            seen.extend(names(&page));
            match page.continue_token {
                Some(token) => pred = pred.with_continue(token),
                None => break,
            }
        }
        assert_eq!(seen, vec!["a/b", "x", "y"]);
    }

    #[tokio::test]
    async fn list_rejects_malformed_continue_token() {
        let store = store();
        let req = ResourceRequest::for_type::<CheckConfig>("default", "");
        let pred = SelectionPredicate::default().with_continue("%%%");
        let err = store.list(&Context::background(), &req, &pred).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(RequestError::InvalidContinueToken(_))));
    }
}
