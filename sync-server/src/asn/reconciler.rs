//! Shipment reconciliation
//!
//! Turns a vendor's order-submission response into an ASN header plus one
//! line per paired order line. The operation is all-or-nothing: any error
//! leaves nothing persisted.
//!
//! # Line pairing
//!
//! When every response line and every order line carries a vendor SKU the
//! lines are joined on it, and an unknown or repeated SKU fails the whole
//! reconciliation. Otherwise lines are paired by position, stopping at the
//! shorter list; surplus response lines are listed in the notes.
//!
//! Header and line ids are assigned by the store when the ASN is written.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    Asn, AsnItem, AsnStatus, OrderLine, PurchaseOrder, VendorOrderLine, VendorOrderResponse,
};
use shared::util::now_millis;
use thiserror::Error;

use crate::audit_log;
use crate::db::{Store, StoreError};
use crate::feed::FeedError;
use crate::gate::ConcurrencyGate;

/// Order submission endpoint of a vendor
#[async_trait]
pub trait VendorOrderApi: Send + Sync {
    async fn submit_order(
        &self,
        order: &PurchaseOrder,
        lines: &[OrderLine],
    ) -> Result<VendorOrderResponse, FeedError>;
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("vendor rejected the order: {0}")]
    Rejected(String),

    #[error("vendor refused authorization: {0}")]
    Unauthorized(String),

    #[error("response line does not match the order: {0}")]
    UnmatchedLine(String),

    #[error("order submission failed: {0}")]
    Submission(#[from] FeedError),

    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        let code = match &err {
            ReconcileError::Rejected(_) => ErrorCode::VendorOrderRejected,
            ReconcileError::Unauthorized(_) => ErrorCode::VendorOrderUnauthorized,
            ReconcileError::UnmatchedLine(_) => ErrorCode::AsnLineMismatch,
            ReconcileError::Submission(_) => ErrorCode::FeedFetchFailed,
            ReconcileError::Store(StoreError::Conflict(_)) => ErrorCode::AsnNumberExists,
            ReconcileError::Store(_) => ErrorCode::DatabaseError,
        };
        AppError::with_message(code, err.to_string())
    }
}

/// A persisted ASN with its lines
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledAsn {
    pub asn: Asn,
    pub items: Vec<AsnItem>,
}

pub struct AsnReconciler {
    store: Arc<dyn Store>,
    gate: Arc<ConcurrencyGate>,
}

impl AsnReconciler {
    pub fn new(store: Arc<dyn Store>, gate: Arc<ConcurrencyGate>) -> Self {
        Self { store, gate }
    }

    /// Submit the order through the gate, then reconcile the response
    pub async fn submit_and_reconcile(
        &self,
        api: &dyn VendorOrderApi,
        order: &PurchaseOrder,
        lines: &[OrderLine],
    ) -> Result<ReconciledAsn, ReconcileError> {
        let response = self
            .gate
            .submit(|| api.submit_order(order, lines))
            .await?;
        self.reconcile(order, &response, lines).await
    }

    pub async fn reconcile(
        &self,
        order: &PurchaseOrder,
        response: &VendorOrderResponse,
        order_lines: &[OrderLine],
    ) -> Result<ReconciledAsn, ReconcileError> {
        let vendor_message = || {
            response
                .message
                .clone()
                .unwrap_or_else(|| "no message".to_string())
        };
        if !response.authorized {
            return Err(ReconcileError::Unauthorized(vendor_message()));
        }
        if !response.success {
            return Err(ReconcileError::Rejected(vendor_message()));
        }

        let pairing = pair_lines(&response.lines, order_lines)?;

        let mut items = Vec::with_capacity(pairing.pairs.len());
        let mut issues = Vec::new();
        let mut shipped_total: u32 = 0;
        let mut requested_total: u32 = 0;

        for (index, (line, order_line)) in pairing.pairs.iter().enumerate() {
            let label = line_label(index, line);
            let shipped = line.fulfilled.min(line.requested);
            if line.fulfilled > line.requested {
                issues.push(format!(
                    "{label}: vendor reported {} fulfilled for {} requested",
                    line.fulfilled, line.requested
                ));
            }
            issues.extend(line_issues(&label, line));

            shipped_total = shipped_total.saturating_add(shipped);
            requested_total = requested_total.saturating_add(line.requested);
            items.push(AsnItem {
                id: 0,
                asn_id: 0,
                order_line_id: order_line.id,
                quantity_shipped: shipped,
                quantity_backordered: line.requested - shipped,
            });
        }

        for (offset, line) in pairing.unpaired.iter().enumerate() {
            let label = line_label(pairing.pairs.len() + offset, line);
            issues.push(format!(
                "{label}: no matching order line ({} of {} fulfilled)",
                line.fulfilled, line.requested
            ));
        }

        let status = AsnStatus::from_totals(shipped_total, requested_total);
        let asn = Asn {
            id: 0,
            asn_number: asn_number(order, response),
            order_id: order.id,
            vendor_id: order.vendor_id.clone(),
            status,
            items_shipped: shipped_total,
            items_total: requested_total,
            notes: build_notes(shipped_total, requested_total, &response.order_numbers, &issues),
            raw_payload: serde_json::to_value(response).map_err(StoreError::from)?,
            created_at: now_millis(),
        };

        let (asn, items) = self.store.insert_asn(&asn, &items).await?;

        tracing::info!(
            vendor_id = %asn.vendor_id,
            order_id = asn.order_id,
            asn_number = %asn.asn_number,
            status = %asn.status,
            shipped = asn.items_shipped,
            total = asn.items_total,
            "ASN recorded"
        );
        audit_log!(
            "system",
            "asn_recorded",
            asn.asn_number.as_str(),
            asn.status.as_str()
        );

        Ok(ReconciledAsn { asn, items })
    }
}

struct Pairing<'a> {
    pairs: Vec<(&'a VendorOrderLine, &'a OrderLine)>,
    unpaired: Vec<&'a VendorOrderLine>,
}

fn sku(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn pair_lines<'a>(
    response: &'a [VendorOrderLine],
    order_lines: &'a [OrderLine],
) -> Result<Pairing<'a>, ReconcileError> {
    let keyed = !response.is_empty()
        && response.iter().all(|l| sku(&l.vendor_sku).is_some())
        && order_lines.iter().all(|l| sku(&l.vendor_sku).is_some());

    if !keyed {
        let pairs: Vec<_> = response.iter().zip(order_lines).collect();
        let unpaired = response.iter().skip(pairs.len()).collect();
        return Ok(Pairing { pairs, unpaired });
    }

    let mut by_sku: HashMap<&str, &OrderLine> = order_lines
        .iter()
        .filter_map(|l| sku(&l.vendor_sku).map(|s| (s, l)))
        .collect();

    let mut pairs = Vec::with_capacity(response.len());
    for line in response {
        let key = sku(&line.vendor_sku).unwrap_or_default();
        match by_sku.remove(key) {
            Some(order_line) => pairs.push((line, order_line)),
            None => {
                return Err(ReconcileError::UnmatchedLine(format!(
                    "SKU {key} is not on the order or appears twice"
                )));
            }
        }
    }

    Ok(Pairing {
        pairs,
        unpaired: Vec::new(),
    })
}

fn line_label(index: usize, line: &VendorOrderLine) -> String {
    match sku(&line.vendor_sku) {
        Some(s) => format!("Line {} ({s})", index + 1),
        None => format!("Line {}", index + 1),
    }
}

fn line_issues(label: &str, line: &VendorOrderLine) -> Vec<String> {
    let mut issues = Vec::new();
    if line.blocked {
        issues.push(format!("{label}: blocked"));
    }
    if line.allocated {
        issues.push(format!("{label}: allocated"));
    }
    for error in &line.errors {
        issues.push(format!("{label}: {error}"));
    }
    issues
}

fn asn_number(order: &PurchaseOrder, response: &VendorOrderResponse) -> String {
    match response.order_numbers.iter().find(|n| !n.trim().is_empty()) {
        Some(number) => format!("{}-{}", order.vendor_id, number.trim()),
        None => format!("{}-{}", order.vendor_id, order.po_number),
    }
}

fn build_notes(shipped: u32, total: u32, order_numbers: &[String], issues: &[String]) -> String {
    let percent = if total == 0 {
        0
    } else {
        u64::from(shipped) * 100 / u64::from(total)
    };

    let mut notes = format!("Shipped {shipped}/{total} items ({percent}%)");
    if order_numbers.is_empty() {
        notes.push_str("\nVendor order: n/a");
    } else {
        let _ = write!(notes, "\nVendor order: {}", order_numbers.join(", "));
    }
    if !issues.is_empty() {
        notes.push_str("\nIssues:");
        for issue in issues {
            let _ = write!(notes, "\n- {issue}");
        }
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RedbStore;
    use shared::models::VendorId;

    fn setup() -> (Arc<dyn Store>, AsnReconciler) {
        let store: Arc<dyn Store> = Arc::new(RedbStore::open_in_memory().unwrap());
        let reconciler = AsnReconciler::new(store.clone(), Arc::new(ConcurrencyGate::new(1)));
        (store, reconciler)
    }

    fn order() -> PurchaseOrder {
        PurchaseOrder {
            id: 500,
            vendor_id: VendorId::from("acme"),
            po_number: "PO-500".into(),
            created_at: 0,
        }
    }

    fn order_line(id: i64, sku: Option<&str>, quantity: u32) -> OrderLine {
        OrderLine {
            id,
            order_id: 500,
            vendor_sku: sku.map(String::from),
            upc: None,
            quantity,
        }
    }

    fn response_line(sku: Option<&str>, requested: u32, fulfilled: u32) -> VendorOrderLine {
        VendorOrderLine {
            vendor_sku: sku.map(String::from),
            requested,
            fulfilled,
            ..Default::default()
        }
    }

    fn response(lines: Vec<VendorOrderLine>) -> VendorOrderResponse {
        VendorOrderResponse {
            success: true,
            authorized: true,
            message: None,
            order_numbers: vec!["V-900".into()],
            lines,
        }
    }

    fn lines() -> Vec<OrderLine> {
        vec![order_line(1, None, 2), order_line(2, None, 3)]
    }

    #[tokio::test]
    async fn test_status_cancelled() {
        let (_, rec) = setup();
        let resp = response(vec![response_line(None, 2, 0), response_line(None, 3, 0)]);
        let result = rec.reconcile(&order(), &resp, &lines()).await.unwrap();
        assert_eq!(result.asn.status, AsnStatus::Cancelled);
        assert_eq!(result.asn.items_shipped, 0);
        assert_eq!(result.items[1].quantity_backordered, 3);
    }

    #[tokio::test]
    async fn test_status_partial() {
        let (_, rec) = setup();
        let resp = response(vec![response_line(None, 2, 2), response_line(None, 3, 1)]);
        let result = rec.reconcile(&order(), &resp, &lines()).await.unwrap();
        assert_eq!(result.asn.status, AsnStatus::Partial);
        assert_eq!(result.asn.items_shipped, 3);
        assert_eq!(result.asn.items_total, 5);
    }

    #[tokio::test]
    async fn test_status_complete_and_persisted() {
        let (store, rec) = setup();
        let resp = response(vec![response_line(None, 2, 2), response_line(None, 3, 3)]);
        let result = rec.reconcile(&order(), &resp, &lines()).await.unwrap();
        assert_eq!(result.asn.status, AsnStatus::Complete);
        assert_eq!(result.asn.asn_number, "acme-V-900");

        let stored = store.get_asn(result.asn.id).await.unwrap().unwrap();
        assert_eq!(stored, result.asn);
        let items = store.list_asn_items(result.asn.id).await.unwrap();
        let shipped: u32 = items.iter().map(|i| i.quantity_shipped).sum();
        assert_eq!(shipped, stored.items_shipped);
    }

    #[tokio::test]
    async fn test_failed_or_unauthorized_produces_nothing() {
        let (store, rec) = setup();

        let mut unauthorized = response(vec![response_line(None, 2, 2)]);
        unauthorized.authorized = false;
        unauthorized.message = Some("bad account".into());
        let err = rec.reconcile(&order(), &unauthorized, &lines()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Unauthorized(ref m) if m == "bad account"));

        let mut failed = response(vec![response_line(None, 2, 2)]);
        failed.success = false;
        let err = rec.reconcile(&order(), &failed, &lines()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Rejected(_)));

        assert!(store.list_asns_for_order(500).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_positional_pairing_stops_at_shorter_list() {
        let (_, rec) = setup();
        let resp = response(vec![
            response_line(None, 2, 2),
            response_line(None, 3, 3),
            response_line(None, 4, 4),
        ]);
        let result = rec.reconcile(&order(), &resp, &lines()).await.unwrap();

        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].order_line_id, 1);
        assert_eq!(result.items[1].order_line_id, 2);
        assert_eq!(result.asn.items_total, 5);
        assert!(result.asn.notes.contains("Line 3: no matching order line"));
    }

    #[tokio::test]
    async fn test_sku_join_ignores_response_order() {
        let (_, rec) = setup();
        let order_lines = vec![order_line(1, Some("A"), 2), order_line(2, Some("B"), 3)];
        let resp = response(vec![
            response_line(Some("B"), 3, 1),
            response_line(Some("A"), 2, 2),
        ]);
        let result = rec.reconcile(&order(), &resp, &order_lines).await.unwrap();

        let by_line: HashMap<i64, u32> = result
            .items
            .iter()
            .map(|i| (i.order_line_id, i.quantity_shipped))
            .collect();
        assert_eq!(by_line[&1], 2);
        assert_eq!(by_line[&2], 1);
    }

    #[tokio::test]
    async fn test_sku_join_fails_loudly_on_unknown_sku() {
        let (store, rec) = setup();
        let order_lines = vec![order_line(1, Some("A"), 2)];
        let resp = response(vec![response_line(Some("Z"), 2, 2)]);

        let err = rec.reconcile(&order(), &resp, &order_lines).await.unwrap_err();
        assert!(matches!(err, ReconcileError::UnmatchedLine(_)));
        assert!(store.list_asns_for_order(500).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overfulfilment_is_clamped_and_noted() {
        let (_, rec) = setup();
        let resp = response(vec![response_line(None, 2, 5)]);
        let result = rec.reconcile(&order(), &resp, &lines()[..1]).await.unwrap();

        assert_eq!(result.asn.items_shipped, 2);
        assert!(result.asn.items_shipped <= result.asn.items_total);
        assert!(result.asn.notes.contains("5 fulfilled for 2 requested"));
    }

    #[tokio::test]
    async fn test_notes_block() {
        let (_, rec) = setup();
        let mut blocked = response_line(None, 3, 1);
        blocked.blocked = true;
        blocked.errors = vec!["credit hold".into()];
        let mut resp = response(vec![response_line(None, 2, 2), blocked]);
        resp.order_numbers = vec!["V-1".into(), "V-2".into()];

        let result = rec.reconcile(&order(), &resp, &lines()).await.unwrap();
        let notes = result.asn.notes;
        assert!(notes.starts_with("Shipped 3/5 items (60%)"));
        assert!(notes.contains("Vendor order: V-1, V-2"));
        assert!(notes.contains("- Line 2: blocked"));
        assert!(notes.contains("- Line 2: credit hold"));
    }

    #[tokio::test]
    async fn test_duplicate_asn_is_rejected() {
        let (store, rec) = setup();
        let resp = response(vec![response_line(None, 2, 2)]);
        rec.reconcile(&order(), &resp, &lines()).await.unwrap();

        let err = rec.reconcile(&order(), &resp, &lines()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Store(StoreError::Conflict(_))));
        assert_eq!(store.list_asns_for_order(500).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_every_line_of_a_large_shipment_is_stored() {
        let (store, rec) = setup();
        let order_lines: Vec<OrderLine> = (1..=150).map(|id| order_line(id, None, 1)).collect();
        let resp = response((0..150).map(|_| response_line(None, 1, 1)).collect());

        let result = rec.reconcile(&order(), &resp, &order_lines).await.unwrap();
        assert_eq!(result.asn.items_shipped, 150);

        let items = store.list_asn_items(result.asn.id).await.unwrap();
        assert_eq!(items.len(), 150);
        let shipped: u32 = items.iter().map(|i| i.quantity_shipped).sum();
        assert_eq!(shipped, result.asn.items_shipped);
        assert_eq!(items, result.items);
    }

    struct FakeOrderApi(VendorOrderResponse);

    #[async_trait]
    impl VendorOrderApi for FakeOrderApi {
        async fn submit_order(
            &self,
            _order: &PurchaseOrder,
            _lines: &[OrderLine],
        ) -> Result<VendorOrderResponse, FeedError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_submit_and_reconcile() {
        let (_, rec) = setup();
        let api = FakeOrderApi(response(vec![
            response_line(None, 2, 2),
            response_line(None, 3, 3),
        ]));
        let result = rec.submit_and_reconcile(&api, &order(), &lines()).await.unwrap();
        assert_eq!(result.asn.status, AsnStatus::Complete);
        assert_eq!(result.items.len(), 2);
    }
}
