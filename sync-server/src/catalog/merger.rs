//! Catalog merge
//!
//! Upserts normalized vendor items into the canonical catalog keyed by UPC.
//!
//! # Conflict policy
//!
//! An existing product is only overwritten when the incoming item scores
//! strictly higher (see [`super::quality`]). Even then the merge is
//! conservative: a missing or blank incoming value never erases a stored one.
//!
//! Jobs for different vendors may merge the same UPC at once. The write only
//! lands if the stored record is still the one that was scored; otherwise
//! the item is scored again against the fresh record.
//!
//! # Mappings
//!
//! The `(vendor, product)` mapping row is written on every pass, whether or
//! not the product itself changed.
//!
//! # Failures
//!
//! Each item is written on its own. [`CatalogMerger::merge_batch`] records a
//! failing item in the report and moves on; it never aborts the batch.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    CanonicalProduct, NormalizedItem, SyncStats, VendorId, VendorProductMapping,
};
use shared::util::now_millis;
use thiserror::Error;

use super::quality::{incoming_score, stored_score};
use super::upc::{UpcError, normalize_upc};
use crate::db::{Store, StoreError};

/// Vendor an item came from, with the trust it carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorSource {
    pub vendor_id: VendorId,
    pub trust_weight: u8,
}

impl VendorSource {
    pub fn new(vendor_id: VendorId, trust_weight: u8) -> Self {
        Self {
            vendor_id,
            trust_weight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    Created,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Merge product attributes and write the mapping
    Full,
    /// Only build or repair mappings; products are never touched
    MappingOnly,
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("invalid item: {0}")]
    Validation(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("product {0} kept changing during merge")]
    Contended(String),
}

impl From<UpcError> for MergeError {
    fn from(err: UpcError) -> Self {
        MergeError::Validation(err.to_string())
    }
}

impl From<MergeError> for AppError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::Validation(msg) => AppError::with_message(ErrorCode::ValidationFailed, msg),
            MergeError::Persistence(e) => e.into(),
            MergeError::Contended(upc) => {
                AppError::database(format!("product {upc} kept changing during merge"))
                    .with_detail("upc", upc)
            }
        }
    }
}

/// A failed item, kept in the batch report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemError {
    pub vendor_sku: String,
    pub upc: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub stats: SyncStats,
    pub errors: Vec<ItemError>,
}

impl MergeReport {
    fn record(&mut self, outcome: MergeOutcome) {
        self.stats.processed += 1;
        match outcome {
            MergeOutcome::Created => self.stats.created += 1,
            MergeOutcome::Updated => self.stats.updated += 1,
            MergeOutcome::Skipped => self.stats.skipped += 1,
        }
    }

    fn fail(&mut self, item: &NormalizedItem, err: &MergeError) {
        self.stats.processed += 1;
        self.stats.failed += 1;
        self.errors.push(ItemError {
            vendor_sku: item.vendor_sku.clone(),
            upc: item.upc.clone(),
            message: err.to_string(),
        });
    }

    pub fn absorb(&mut self, other: MergeReport) {
        self.stats.absorb(&other.stats);
        self.errors.extend(other.errors);
    }
}

/// Rounds of read, score and write before an item is given up on
const MERGE_ATTEMPTS: usize = 8;

pub struct CatalogMerger {
    store: Arc<dyn Store>,
}

impl CatalogMerger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Merge one item into the catalog and refresh its vendor mapping
    pub async fn upsert(
        &self,
        source: &VendorSource,
        item: &NormalizedItem,
    ) -> Result<MergeOutcome, MergeError> {
        let item = clean_item(item)?;
        let (product, outcome) = self.merge_product(source, &item).await?;

        self.write_mapping(source, &item, product.id).await?;

        tracing::debug!(
            vendor_id = %source.vendor_id,
            upc = %item.upc,
            outcome = ?outcome,
            "Item merged"
        );
        Ok(outcome)
    }

    /// Build or repair the mapping for an item without touching the product
    ///
    /// Items whose UPC has no canonical product are skipped.
    pub async fn link(
        &self,
        source: &VendorSource,
        item: &NormalizedItem,
    ) -> Result<MergeOutcome, MergeError> {
        let item = clean_item(item)?;

        let Some(product) = self.store.find_product_by_upc(&item.upc).await? else {
            tracing::debug!(vendor_id = %source.vendor_id, upc = %item.upc, "No product to link");
            return Ok(MergeOutcome::Skipped);
        };
        self.write_mapping(source, &item, product.id).await
    }

    /// Process a batch item by item, collecting failures
    pub async fn merge_batch(
        &self,
        source: &VendorSource,
        items: &[NormalizedItem],
        mode: MergeMode,
    ) -> MergeReport {
        let mut report = MergeReport::default();

        for item in items {
            let result = match mode {
                MergeMode::Full => self.upsert(source, item).await,
                MergeMode::MappingOnly => self.link(source, item).await,
            };
            match result {
                Ok(outcome) => report.record(outcome),
                Err(err) => {
                    tracing::warn!(
                        vendor_id = %source.vendor_id,
                        vendor_sku = %item.vendor_sku,
                        upc = %item.upc,
                        error = %err,
                        "Item failed to merge"
                    );
                    report.fail(item, &err);
                }
            }
        }

        report
    }

    async fn merge_product(
        &self,
        source: &VendorSource,
        item: &NormalizedItem,
    ) -> Result<(CanonicalProduct, MergeOutcome), MergeError> {
        for _ in 0..MERGE_ATTEMPTS {
            let result = match self.store.find_product_by_upc(&item.upc).await? {
                Some(existing) => self.merge_into(source, item, existing).await,
                None => self
                    .store
                    .insert_product(&new_product(source, item))
                    .await
                    .map(|created| (created, MergeOutcome::Created)),
            };

            match result {
                // Another job inserted this UPC or rewrote the product first
                Err(StoreError::Conflict(_) | StoreError::Stale(_)) => {
                    tracing::debug!(
                        vendor_id = %source.vendor_id,
                        upc = %item.upc,
                        "Product changed underneath merge, retrying"
                    );
                }
                other => return other.map_err(MergeError::from),
            }
        }

        Err(MergeError::Contended(item.upc.clone()))
    }

    async fn merge_into(
        &self,
        source: &VendorSource,
        item: &NormalizedItem,
        existing: CanonicalProduct,
    ) -> Result<(CanonicalProduct, MergeOutcome), StoreError> {
        if incoming_score(item, source.trust_weight) <= stored_score(&existing) {
            return Ok((existing, MergeOutcome::Skipped));
        }

        let merged = overlay_product(&existing, source, item);
        if same_attributes(&merged, &existing) {
            return Ok((existing, MergeOutcome::Skipped));
        }

        let saved = self.store.update_product(&existing, &merged).await?;
        Ok((saved, MergeOutcome::Updated))
    }

    async fn write_mapping(
        &self,
        source: &VendorSource,
        item: &NormalizedItem,
        product_id: i64,
    ) -> Result<MergeOutcome, MergeError> {
        let now = now_millis();
        let existing = self.store.get_mapping(&source.vendor_id, product_id).await?;

        let mapping = VendorProductMapping {
            vendor_id: source.vendor_id.clone(),
            product_id,
            vendor_sku: item.vendor_sku.clone(),
            vendor_name: item
                .name
                .clone()
                .or_else(|| existing.as_ref().and_then(|m| m.vendor_name.clone())),
            vendor_cost: item.cost.or(existing.as_ref().and_then(|m| m.vendor_cost)),
            stock: item.stock.or(existing.as_ref().and_then(|m| m.stock)),
            created_at: existing.as_ref().map_or(now, |m| m.created_at),
            updated_at: now,
        };

        let outcome = match &existing {
            None => MergeOutcome::Created,
            Some(prev) if prev.same_content(&mapping) => MergeOutcome::Skipped,
            Some(_) => MergeOutcome::Updated,
        };

        self.store.upsert_mapping(&mapping).await?;
        Ok(outcome)
    }
}

/// Validate an item and strip blank values
fn clean_item(item: &NormalizedItem) -> Result<NormalizedItem, MergeError> {
    let upc = normalize_upc(&item.upc)?;

    let vendor_sku = item.vendor_sku.trim();
    if vendor_sku.is_empty() {
        return Err(MergeError::Validation(format!("item {upc} has no vendor SKU")));
    }

    for (field, price) in [
        ("cost", item.cost),
        ("msrp", item.msrp),
        ("map_price", item.map_price),
    ] {
        if price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(MergeError::Validation(format!(
                "item {upc} has a negative {field}"
            )));
        }
    }

    Ok(NormalizedItem {
        vendor_sku: vendor_sku.to_string(),
        upc,
        name: clean_text(&item.name),
        brand: clean_text(&item.brand),
        model: clean_text(&item.model),
        part_number: clean_text(&item.part_number),
        category: clean_text(&item.category),
        cost: item.cost,
        msrp: item.msrp,
        map_price: item.map_price,
        stock: item.stock,
        updated_at: item.updated_at,
    })
}

fn clean_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn new_product(source: &VendorSource, item: &NormalizedItem) -> CanonicalProduct {
    let now = now_millis();
    CanonicalProduct {
        id: 0,
        upc: item.upc.clone(),
        name: item.name.clone(),
        brand: item.brand.clone(),
        model: item.model.clone(),
        part_number: item.part_number.clone(),
        category: item.category.clone(),
        cost: item.cost,
        msrp: item.msrp,
        map_price: item.map_price,
        source_vendor: source.vendor_id.clone(),
        source_trust: source.trust_weight,
        created_at: now,
        updated_at: now,
    }
}

fn overlay_product(
    existing: &CanonicalProduct,
    source: &VendorSource,
    item: &NormalizedItem,
) -> CanonicalProduct {
    fn keep<T: Clone>(incoming: &Option<T>, stored: &Option<T>) -> Option<T> {
        incoming.clone().or_else(|| stored.clone())
    }

    CanonicalProduct {
        id: existing.id,
        upc: existing.upc.clone(),
        name: keep(&item.name, &existing.name),
        brand: keep(&item.brand, &existing.brand),
        model: keep(&item.model, &existing.model),
        part_number: keep(&item.part_number, &existing.part_number),
        category: keep(&item.category, &existing.category),
        cost: keep(&item.cost, &existing.cost),
        msrp: keep(&item.msrp, &existing.msrp),
        map_price: keep(&item.map_price, &existing.map_price),
        source_vendor: source.vendor_id.clone(),
        source_trust: source.trust_weight,
        created_at: existing.created_at,
        updated_at: now_millis(),
    }
}

fn same_attributes(a: &CanonicalProduct, b: &CanonicalProduct) -> bool {
    a.name == b.name
        && a.brand == b.brand
        && a.model == b.model
        && a.part_number == b.part_number
        && a.category == b.category
        && a.cost == b.cost
        && a.msrp == b.msrp
        && a.map_price == b.map_price
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RedbStore;

    const UPC: &str = "012345678905";

    fn setup() -> (Arc<dyn Store>, CatalogMerger) {
        let store: Arc<dyn Store> = Arc::new(RedbStore::open_in_memory().unwrap());
        let merger = CatalogMerger::new(store.clone());
        (store, merger)
    }

    fn source(id: &str, trust: u8) -> VendorSource {
        VendorSource::new(VendorId::from(id), trust)
    }

    fn widget(name: &str) -> NormalizedItem {
        NormalizedItem {
            vendor_sku: "W-1".into(),
            upc: UPC.into(),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_identical_upsert_is_created_then_skipped() {
        let (_, merger) = setup();
        let acme = source("acme", 50);

        assert_eq!(merger.upsert(&acme, &widget("Widget A")).await.unwrap(), MergeOutcome::Created);
        assert_eq!(merger.upsert(&acme, &widget("Widget A")).await.unwrap(), MergeOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_created_skipped_updated_scenario() {
        let (store, merger) = setup();

        let first = merger.upsert(&source("acme", 40), &widget("Widget A")).await.unwrap();
        assert_eq!(first, MergeOutcome::Created);

        let second = merger.upsert(&source("acme", 40), &widget("Widget A")).await.unwrap();
        assert_eq!(second, MergeOutcome::Skipped);

        let lower = merger.upsert(&source("globex", 10), &widget("Widget Z")).await.unwrap();
        assert_eq!(lower, MergeOutcome::Skipped);

        let third = merger.upsert(&source("initech", 80), &widget("Widget A+")).await.unwrap();
        assert_eq!(third, MergeOutcome::Updated);

        let product = store.find_product_by_upc(UPC).await.unwrap().unwrap();
        assert_eq!(product.name.as_deref(), Some("Widget A+"));
        assert_eq!(product.source_vendor, VendorId::from("initech"));
        assert_eq!(product.source_trust, 80);
    }

    #[tokio::test]
    async fn test_missing_numeric_fields_never_overwrite() {
        let (store, merger) = setup();

        let mut priced = widget("Widget A");
        priced.cost = Some(Decimal::new(1250, 2));
        priced.msrp = Some(Decimal::new(1999, 2));
        merger.upsert(&source("acme", 10), &priced).await.unwrap();

        let mut sparse = widget("Widget A");
        sparse.brand = Some("Acme".into());
        sparse.model = Some("WA-100".into());
        sparse.part_number = Some("P-1".into());
        sparse.name = Some("   ".into());
        let outcome = merger.upsert(&source("globex", 90), &sparse).await.unwrap();
        assert_eq!(outcome, MergeOutcome::Updated);

        let product = store.find_product_by_upc(UPC).await.unwrap().unwrap();
        assert_eq!(product.cost, Some(Decimal::new(1250, 2)));
        assert_eq!(product.msrp, Some(Decimal::new(1999, 2)));
        assert_eq!(product.name.as_deref(), Some("Widget A"));
        assert_eq!(product.brand.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn test_higher_score_without_changes_is_skipped() {
        let (_, merger) = setup();
        merger.upsert(&source("acme", 10), &widget("Widget A")).await.unwrap();

        let outcome = merger.upsert(&source("globex", 90), &widget("Widget A")).await.unwrap();
        assert_eq!(outcome, MergeOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_mapping_written_even_when_product_skipped() {
        let (store, merger) = setup();
        merger.upsert(&source("acme", 90), &widget("Widget A")).await.unwrap();

        let mut item = widget("Other name");
        item.vendor_sku = "G-77".into();
        item.stock = Some(4);
        let outcome = merger.upsert(&source("globex", 5), &item).await.unwrap();
        assert_eq!(outcome, MergeOutcome::Skipped);

        let mapping = store
            .find_mapping_by_sku(&VendorId::from("globex"), "G-77")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapping.vendor_name.as_deref(), Some("Other name"));
        assert_eq!(mapping.stock, Some(4));
    }

    #[tokio::test]
    async fn test_batch_collects_item_failures() {
        let (_, merger) = setup();

        let mut bad_upc = widget("Broken");
        bad_upc.upc = "012345678901".into();
        bad_upc.vendor_sku = "BAD-UPC".into();

        let mut negative = widget("Negative");
        negative.upc = "036000291452".into();
        negative.vendor_sku = "NEG".into();
        negative.cost = Some(Decimal::new(-1, 0));

        let mut other = widget("Gadget");
        other.upc = "042100005264".into();
        other.vendor_sku = "G-1".into();

        let items = vec![widget("Widget A"), bad_upc, negative, other];
        let report = merger
            .merge_batch(&source("acme", 50), &items, MergeMode::Full)
            .await;

        assert_eq!(report.stats.processed, 4);
        assert_eq!(report.stats.created, 2);
        assert_eq!(report.stats.failed, 2);
        let skus: Vec<_> = report.errors.iter().map(|e| e.vendor_sku.as_str()).collect();
        assert_eq!(skus, vec!["BAD-UPC", "NEG"]);
    }

    #[tokio::test]
    async fn test_zero_padded_upc_lands_on_the_same_product() {
        let (store, merger) = setup();
        merger.upsert(&source("acme", 50), &widget("Widget A")).await.unwrap();

        let mut padded = widget("Widget A");
        padded.upc = "0012345678905".into();
        let outcome = merger.upsert(&source("globex", 10), &padded).await.unwrap();
        assert_eq!(outcome, MergeOutcome::Skipped);

        let product = store.find_product_by_upc(UPC).await.unwrap().unwrap();
        let mapping = store
            .find_mapping_by_sku(&VendorId::from("globex"), "W-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapping.product_id, product.id);
        assert!(store.find_product_by_upc("0012345678905").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_vendors_never_let_lower_trust_win() {
        for round in 0..100 {
            let (store, _) = setup();
            if round % 2 == 0 {
                CatalogMerger::new(store.clone())
                    .upsert(&source("seed", 5), &widget("seed"))
                    .await
                    .unwrap();
            }

            let tasks = [("high", 90), ("low", 20)].map(|(vendor, trust)| {
                let merger = CatalogMerger::new(store.clone());
                tokio::spawn(async move { merger.upsert(&source(vendor, trust), &widget(vendor)).await })
            });
            for task in tasks {
                task.await.unwrap().unwrap();
            }

            let product = store.find_product_by_upc(UPC).await.unwrap().unwrap();
            assert_eq!(product.source_vendor, VendorId::from("high"), "round {round}");
            assert_eq!(product.source_trust, 90);
            assert_eq!(product.name.as_deref(), Some("high"));
        }
    }

    #[tokio::test]
    async fn test_taken_product_id_fails_the_item_instead_of_rereading_upc() {
        let store = Arc::new(RedbStore::open_in_memory().unwrap());
        let merger = CatalogMerger::new(store.clone());
        merger.upsert(&source("acme", 50), &widget("Widget A")).await.unwrap();
        store.rewind_product_sequence(0).unwrap();

        let mut gadget = widget("Gadget");
        gadget.upc = "036000291452".into();
        gadget.vendor_sku = "G-1".into();
        let err = merger.upsert(&source("acme", 50), &gadget).await.unwrap_err();
        assert!(matches!(err, MergeError::Persistence(StoreError::DuplicateId(1))));

        let report = merger
            .merge_batch(&source("acme", 50), &[gadget], MergeMode::Full)
            .await;
        assert_eq!(report.stats.failed, 1);
        assert!(report.errors[0].message.contains("already taken"));

        let kept = store.find_product_by_upc(UPC).await.unwrap().unwrap();
        assert_eq!(kept.name.as_deref(), Some("Widget A"));
    }

    #[tokio::test]
    async fn test_mapping_only_never_touches_products() {
        let (store, merger) = setup();
        let globex = source("globex", 100);

        // No canonical product yet
        let report = merger
            .merge_batch(&globex, &[widget("Widget Z")], MergeMode::MappingOnly)
            .await;
        assert_eq!(report.stats.skipped, 1);
        assert!(store.find_product_by_upc(UPC).await.unwrap().is_none());

        merger.upsert(&source("acme", 10), &widget("Widget A")).await.unwrap();

        assert_eq!(merger.link(&globex, &widget("Widget Z")).await.unwrap(), MergeOutcome::Created);
        assert_eq!(merger.link(&globex, &widget("Widget Z")).await.unwrap(), MergeOutcome::Skipped);

        let mut restocked = widget("Widget Z");
        restocked.stock = Some(12);
        assert_eq!(merger.link(&globex, &restocked).await.unwrap(), MergeOutcome::Updated);

        let product = store.find_product_by_upc(UPC).await.unwrap().unwrap();
        assert_eq!(product.name.as_deref(), Some("Widget A"));
        assert_eq!(product.source_vendor, VendorId::from("acme"));
    }
}
