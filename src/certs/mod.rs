//! Certificate dashboard: device certificate requests, issued devices and
//! time-limited distribution links, kept in a single JSON document.

pub mod models;
pub mod store;

pub use models::{AuditRecord, CertRequest, Device, Distribution, DistributionLink};
pub use store::{CertStore, CertStoreError, IssueDetails, NewRequest};
