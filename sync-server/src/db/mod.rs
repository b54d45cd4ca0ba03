//! Persistence layer
//!
//! The engine only talks to [`Store`]; [`RedbStore`] is the embedded
//! implementation used by the server and by tests (in-memory backend).
//!
//! Every write either returns the resulting record or fails; uniqueness
//! (UPC, ASN number) and referential rules (a mapping must point at an
//! existing product) are enforced here, not by callers.
//!
//! Record ids of products, ASNs and ASN lines are allocated by the store
//! inside the inserting transaction. Ids carried by the records handed to
//! `insert_*` are ignored.

mod storage;

pub use storage::RedbStore;

use async_trait::async_trait;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    Asn, AsnItem, CanonicalProduct, VendorId, VendorProductMapping, VendorSyncState,
};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("Record id {0} is already taken")]
    DuplicateId(i64),

    #[error("Product {0} changed since it was read")]
    Stale(i64),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::with_message(ErrorCode::AlreadyExists, msg),
            StoreError::NotFound(msg) => AppError::with_message(ErrorCode::NotFound, msg),
            StoreError::DuplicateId(id) => AppError::with_message(
                ErrorCode::AlreadyExists,
                format!("record id {id} is already taken"),
            )
            .with_detail("id", id),
            StoreError::Storage(redb::StorageError::Corrupted(msg)) => {
                AppError::with_message(ErrorCode::StorageCorrupted, msg)
            }
            other => AppError::database(other.to_string()),
        }
    }
}

/// CRUD surface consumed by the sync engine
#[async_trait]
pub trait Store: Send + Sync {
    // ========== Vendor sync state ==========

    async fn get_sync_state(&self, vendor_id: &VendorId) -> StoreResult<Option<VendorSyncState>>;

    async fn list_sync_states(&self) -> StoreResult<Vec<VendorSyncState>>;

    /// Insert or replace the state row of `state.vendor_id`
    async fn save_sync_state(&self, state: &VendorSyncState) -> StoreResult<VendorSyncState>;

    // ========== Canonical products ==========

    async fn get_product(&self, id: i64) -> StoreResult<Option<CanonicalProduct>>;

    async fn find_product_by_upc(&self, upc: &str) -> StoreResult<Option<CanonicalProduct>>;

    /// Store a new product under a freshly allocated id
    ///
    /// Fails with [`StoreError::Conflict`] when the UPC is already taken and
    /// with [`StoreError::DuplicateId`] when the allocated id is in use.
    async fn insert_product(&self, product: &CanonicalProduct) -> StoreResult<CanonicalProduct>;

    /// Replace `current` with `next`, provided the stored row still equals `current`
    ///
    /// Fails with [`StoreError::Stale`] when another writer got there first,
    /// [`StoreError::NotFound`] for unknown ids and [`StoreError::Conflict`]
    /// when the UPC belongs to another product.
    async fn update_product(
        &self,
        current: &CanonicalProduct,
        next: &CanonicalProduct,
    ) -> StoreResult<CanonicalProduct>;

    // ========== Vendor mappings ==========

    async fn get_mapping(
        &self,
        vendor_id: &VendorId,
        product_id: i64,
    ) -> StoreResult<Option<VendorProductMapping>>;

    async fn find_mapping_by_sku(
        &self,
        vendor_id: &VendorId,
        vendor_sku: &str,
    ) -> StoreResult<Option<VendorProductMapping>>;

    /// Insert or replace the `(vendor, product)` row; the product must exist
    async fn upsert_mapping(
        &self,
        mapping: &VendorProductMapping,
    ) -> StoreResult<VendorProductMapping>;

    async fn list_mappings(&self, vendor_id: &VendorId) -> StoreResult<Vec<VendorProductMapping>>;

    // ========== ASN ==========

    /// Persist header and lines atomically, returning them with their ids
    async fn insert_asn(&self, asn: &Asn, items: &[AsnItem]) -> StoreResult<(Asn, Vec<AsnItem>)>;

    async fn get_asn(&self, id: i64) -> StoreResult<Option<Asn>>;

    async fn list_asn_items(&self, asn_id: i64) -> StoreResult<Vec<AsnItem>>;

    async fn list_asns_for_order(&self, order_id: i64) -> StoreResult<Vec<Asn>>;
}
