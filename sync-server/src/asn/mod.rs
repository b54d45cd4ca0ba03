//! Advance Shipment Notices

mod reconciler;

pub use reconciler::{AsnReconciler, ReconcileError, ReconciledAsn, VendorOrderApi};
