//! redb-backed [`Store`]
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `sync_states` | `vendor_id` | `VendorSyncState` | One state row per vendor |
//! | `products` | `product_id` | `CanonicalProduct` | Canonical catalog |
//! | `product_upc_index` | `upc` | `product_id` | UPC uniqueness |
//! | `mappings` | `(vendor_id, product_id)` | `VendorProductMapping` | Vendor links |
//! | `mapping_sku_index` | `(vendor_id, vendor_sku)` | `product_id` | SKU lookup |
//! | `asns` | `asn_id` | `Asn` | Shipment notices |
//! | `asn_items` | `(asn_id, item_id)` | `AsnItem` | Shipment lines |
//! | `asn_number_index` | `asn_number` | `asn_id` | ASN number uniqueness |
//! | `order_asn_index` | `(order_id, asn_id)` | `()` | ASNs per order |
//! | `sequences` | name | last id | Id allocation |
//!
//! Values are JSON-encoded. Index tables are always written in the same
//! transaction as the row they point at.
//!
//! Ids are reserved from `sequences` inside the inserting write
//! transaction, so two records can never be handed the same id. On open,
//! a missing sequence starts after the highest id already stored.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use shared::models::{
    Asn, AsnItem, CanonicalProduct, VendorId, VendorProductMapping, VendorSyncState,
};

use super::{Store, StoreError, StoreResult};

const SYNC_STATES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sync_states");

const PRODUCTS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("products");

const PRODUCT_UPC_INDEX: TableDefinition<&str, i64> = TableDefinition::new("product_upc_index");

const MAPPINGS_TABLE: TableDefinition<(&str, i64), &[u8]> = TableDefinition::new("mappings");

const MAPPING_SKU_INDEX: TableDefinition<(&str, &str), i64> =
    TableDefinition::new("mapping_sku_index");

const ASNS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("asns");

const ASN_ITEMS_TABLE: TableDefinition<(i64, i64), &[u8]> = TableDefinition::new("asn_items");

const ASN_NUMBER_INDEX: TableDefinition<&str, i64> = TableDefinition::new("asn_number_index");

const ORDER_ASN_INDEX: TableDefinition<(i64, i64), ()> = TableDefinition::new("order_asn_index");

/// Last allocated id per sequence name
const SEQUENCES_TABLE: TableDefinition<&str, i64> = TableDefinition::new("sequences");

const PRODUCT_SEQUENCE: &str = "product";
const ASN_SEQUENCE: &str = "asn";
const ASN_ITEM_SEQUENCE: &str = "asn_item";

/// Catalog and sync-state storage backed by redb
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests and throwaway runs)
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            // Create all tables if they don't exist
            let _ = write_txn.open_table(SYNC_STATES_TABLE)?;
            let _ = write_txn.open_table(PRODUCTS_TABLE)?;
            let _ = write_txn.open_table(PRODUCT_UPC_INDEX)?;
            let _ = write_txn.open_table(MAPPINGS_TABLE)?;
            let _ = write_txn.open_table(MAPPING_SKU_INDEX)?;
            let _ = write_txn.open_table(ASNS_TABLE)?;
            let _ = write_txn.open_table(ASN_ITEMS_TABLE)?;
            let _ = write_txn.open_table(ASN_NUMBER_INDEX)?;
            let _ = write_txn.open_table(ORDER_ASN_INDEX)?;
        }
        Self::seed_sequences(&write_txn)?;
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    fn seed_sequences(txn: &WriteTransaction) -> StoreResult<()> {
        let mut sequences = txn.open_table(SEQUENCES_TABLE)?;

        if sequences.get(PRODUCT_SEQUENCE)?.is_none() {
            let products = txn.open_table(PRODUCTS_TABLE)?;
            let last = products.last()?.map_or(0, |(id, _)| id.value());
            sequences.insert(PRODUCT_SEQUENCE, last)?;
        }
        if sequences.get(ASN_SEQUENCE)?.is_none() {
            let headers = txn.open_table(ASNS_TABLE)?;
            let last = headers.last()?.map_or(0, |(id, _)| id.value());
            sequences.insert(ASN_SEQUENCE, last)?;
        }
        if sequences.get(ASN_ITEM_SEQUENCE)?.is_none() {
            // Keyed by ASN first, so the highest line id can sit anywhere
            let lines = txn.open_table(ASN_ITEMS_TABLE)?;
            let mut last = 0;
            for entry in lines.iter()? {
                let (key, _) = entry?;
                last = last.max(key.value().1);
            }
            sequences.insert(ASN_ITEM_SEQUENCE, last)?;
        }
        Ok(())
    }

    /// Reserve `count` consecutive ids, returning the first
    fn reserve_ids(txn: &WriteTransaction, sequence: &str, count: usize) -> StoreResult<i64> {
        let mut table = txn.open_table(SEQUENCES_TABLE)?;
        let last = table.get(sequence)?.map_or(0, |guard| guard.value());
        table.insert(sequence, last + count as i64)?;
        Ok(last + 1)
    }

    fn product_exists_txn(txn: &WriteTransaction, id: i64) -> StoreResult<bool> {
        let table = txn.open_table(PRODUCTS_TABLE)?;
        Ok(table.get(id)?.is_some())
    }

    fn read_mapping_txn(
        txn: &WriteTransaction,
        vendor_id: &str,
        product_id: i64,
    ) -> StoreResult<Option<VendorProductMapping>> {
        let table = txn.open_table(MAPPINGS_TABLE)?;
        match table.get((vendor_id, product_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn sku_target_txn(
        txn: &WriteTransaction,
        vendor_id: &str,
        vendor_sku: &str,
    ) -> StoreResult<Option<i64>> {
        let table = txn.open_table(MAPPING_SKU_INDEX)?;
        Ok(table.get((vendor_id, vendor_sku))?.map(|guard| guard.value()))
    }
}

#[async_trait]
impl Store for RedbStore {
    // ========== Vendor sync state ==========

    async fn get_sync_state(&self, vendor_id: &VendorId) -> StoreResult<Option<VendorSyncState>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SYNC_STATES_TABLE)?;

        match table.get(vendor_id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    async fn list_sync_states(&self) -> StoreResult<Vec<VendorSyncState>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SYNC_STATES_TABLE)?;

        let mut states = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            states.push(serde_json::from_slice(value.value())?);
        }
        Ok(states)
    }

    async fn save_sync_state(&self, state: &VendorSyncState) -> StoreResult<VendorSyncState> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SYNC_STATES_TABLE)?;
            let value = serde_json::to_vec(state)?;
            table.insert(state.vendor_id.as_str(), value.as_slice())?;
        }
        write_txn.commit()?;
        Ok(state.clone())
    }

    // ========== Canonical products ==========

    async fn get_product(&self, id: i64) -> StoreResult<Option<CanonicalProduct>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRODUCTS_TABLE)?;

        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    async fn find_product_by_upc(&self, upc: &str) -> StoreResult<Option<CanonicalProduct>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(PRODUCT_UPC_INDEX)?;
        let Some(id) = index.get(upc)?.map(|guard| guard.value()) else {
            return Ok(None);
        };

        let table = read_txn.open_table(PRODUCTS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    async fn insert_product(&self, product: &CanonicalProduct) -> StoreResult<CanonicalProduct> {
        let write_txn = self.db.begin_write()?;
        let stored = CanonicalProduct {
            id: Self::reserve_ids(&write_txn, PRODUCT_SEQUENCE, 1)?,
            ..product.clone()
        };
        {
            let mut index = write_txn.open_table(PRODUCT_UPC_INDEX)?;
            if index.get(stored.upc.as_str())?.is_some() {
                return Err(StoreError::Conflict(format!(
                    "UPC {} already belongs to a product",
                    stored.upc
                )));
            }

            let mut table = write_txn.open_table(PRODUCTS_TABLE)?;
            if table.get(stored.id)?.is_some() {
                return Err(StoreError::DuplicateId(stored.id));
            }

            index.insert(stored.upc.as_str(), stored.id)?;
            let value = serde_json::to_vec(&stored)?;
            table.insert(stored.id, value.as_slice())?;
        }
        write_txn.commit()?;
        Ok(stored)
    }

    async fn update_product(
        &self,
        current: &CanonicalProduct,
        next: &CanonicalProduct,
    ) -> StoreResult<CanonicalProduct> {
        let product = CanonicalProduct {
            id: current.id,
            ..next.clone()
        };
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PRODUCTS_TABLE)?;
            let previous: CanonicalProduct = match table.get(product.id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StoreError::NotFound(format!("product {}", product.id))),
            };
            if previous != *current {
                return Err(StoreError::Stale(product.id));
            }

            if previous.upc != product.upc {
                let mut index = write_txn.open_table(PRODUCT_UPC_INDEX)?;
                if index.get(product.upc.as_str())?.is_some() {
                    return Err(StoreError::Conflict(format!(
                        "UPC {} already belongs to a product",
                        product.upc
                    )));
                }
                index.remove(previous.upc.as_str())?;
                index.insert(product.upc.as_str(), product.id)?;
            }

            let value = serde_json::to_vec(&product)?;
            table.insert(product.id, value.as_slice())?;
        }
        write_txn.commit()?;
        Ok(product)
    }

    // ========== Vendor mappings ==========

    async fn get_mapping(
        &self,
        vendor_id: &VendorId,
        product_id: i64,
    ) -> StoreResult<Option<VendorProductMapping>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MAPPINGS_TABLE)?;

        match table.get((vendor_id.as_str(), product_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    async fn find_mapping_by_sku(
        &self,
        vendor_id: &VendorId,
        vendor_sku: &str,
    ) -> StoreResult<Option<VendorProductMapping>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(MAPPING_SKU_INDEX)?;
        let Some(product_id) = index
            .get((vendor_id.as_str(), vendor_sku))?
            .map(|guard| guard.value())
        else {
            return Ok(None);
        };

        let table = read_txn.open_table(MAPPINGS_TABLE)?;
        match table.get((vendor_id.as_str(), product_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    async fn upsert_mapping(
        &self,
        mapping: &VendorProductMapping,
    ) -> StoreResult<VendorProductMapping> {
        let vendor = mapping.vendor_id.as_str();
        let write_txn = self.db.begin_write()?;
        {
            if !Self::product_exists_txn(&write_txn, mapping.product_id)? {
                return Err(StoreError::NotFound(format!(
                    "product {} for mapping {}/{}",
                    mapping.product_id, vendor, mapping.vendor_sku
                )));
            }

            let previous = Self::read_mapping_txn(&write_txn, vendor, mapping.product_id)?;
            let sku_target = Self::sku_target_txn(&write_txn, vendor, &mapping.vendor_sku)?;

            let mut table = write_txn.open_table(MAPPINGS_TABLE)?;
            let mut index = write_txn.open_table(MAPPING_SKU_INDEX)?;

            // The vendor re-pointed this SKU at another product: drop the stale link
            if let Some(old_product) = sku_target.filter(|id| *id != mapping.product_id) {
                table.remove((vendor, old_product))?;
            }
            // This product was linked under another SKU: release that SKU
            if let Some(prev) = previous.filter(|p| p.vendor_sku != mapping.vendor_sku) {
                index.remove((vendor, prev.vendor_sku.as_str()))?;
            }

            index.insert((vendor, mapping.vendor_sku.as_str()), mapping.product_id)?;
            let value = serde_json::to_vec(mapping)?;
            table.insert((vendor, mapping.product_id), value.as_slice())?;
        }
        write_txn.commit()?;
        Ok(mapping.clone())
    }

    async fn list_mappings(&self, vendor_id: &VendorId) -> StoreResult<Vec<VendorProductMapping>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MAPPINGS_TABLE)?;

        let vendor = vendor_id.as_str();
        let mut mappings = Vec::new();
        for result in table.range((vendor, i64::MIN)..=(vendor, i64::MAX))? {
            let (_key, value) = result?;
            mappings.push(serde_json::from_slice(value.value())?);
        }
        Ok(mappings)
    }

    // ========== ASN ==========

    async fn insert_asn(&self, asn: &Asn, items: &[AsnItem]) -> StoreResult<(Asn, Vec<AsnItem>)> {
        let write_txn = self.db.begin_write()?;

        let asn = Asn {
            id: Self::reserve_ids(&write_txn, ASN_SEQUENCE, 1)?,
            ..asn.clone()
        };
        let first_item = Self::reserve_ids(&write_txn, ASN_ITEM_SEQUENCE, items.len())?;
        let items: Vec<AsnItem> = items
            .iter()
            .zip(first_item..)
            .map(|(item, id)| AsnItem {
                id,
                asn_id: asn.id,
                ..item.clone()
            })
            .collect();

        {
            let mut number_index = write_txn.open_table(ASN_NUMBER_INDEX)?;
            if number_index.get(asn.asn_number.as_str())?.is_some() {
                return Err(StoreError::Conflict(format!(
                    "ASN number {} already recorded",
                    asn.asn_number
                )));
            }
            number_index.insert(asn.asn_number.as_str(), asn.id)?;

            let mut headers = write_txn.open_table(ASNS_TABLE)?;
            let value = serde_json::to_vec(&asn)?;
            if headers.insert(asn.id, value.as_slice())?.is_some() {
                return Err(StoreError::DuplicateId(asn.id));
            }

            let mut lines = write_txn.open_table(ASN_ITEMS_TABLE)?;
            for item in &items {
                let value = serde_json::to_vec(item)?;
                if lines.insert((asn.id, item.id), value.as_slice())?.is_some() {
                    return Err(StoreError::DuplicateId(item.id));
                }
            }

            let mut by_order = write_txn.open_table(ORDER_ASN_INDEX)?;
            by_order.insert((asn.order_id, asn.id), ())?;
        }
        write_txn.commit()?;
        Ok((asn, items))
    }

    async fn get_asn(&self, id: i64) -> StoreResult<Option<Asn>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ASNS_TABLE)?;

        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    async fn list_asn_items(&self, asn_id: i64) -> StoreResult<Vec<AsnItem>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ASN_ITEMS_TABLE)?;

        let mut items = Vec::new();
        for result in table.range((asn_id, i64::MIN)..=(asn_id, i64::MAX))? {
            let (_key, value) = result?;
            items.push(serde_json::from_slice(value.value())?);
        }
        Ok(items)
    }

    async fn list_asns_for_order(&self, order_id: i64) -> StoreResult<Vec<Asn>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(ORDER_ASN_INDEX)?;
        let headers = read_txn.open_table(ASNS_TABLE)?;

        let mut asns = Vec::new();
        for result in index.range((order_id, i64::MIN)..=(order_id, i64::MAX))? {
            let (key, _) = result?;
            let (_, asn_id) = key.value();
            if let Some(value) = headers.get(asn_id)? {
                asns.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(asns)
    }
}

#[cfg(test)]
impl RedbStore {
    /// Point the product sequence back at `last`, so the next allocation
    /// lands on an id that may already be stored
    pub(crate) fn rewind_product_sequence(&self, last: i64) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut sequences = write_txn.open_table(SEQUENCES_TABLE)?;
            sequences.insert(PRODUCT_SEQUENCE, last)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
