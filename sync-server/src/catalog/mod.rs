//! Canonical catalog maintenance

mod merger;
pub mod quality;
pub mod upc;

pub use merger::{
    CatalogMerger, ItemError, MergeError, MergeMode, MergeOutcome, MergeReport, VendorSource,
};
