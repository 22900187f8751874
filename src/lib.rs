//! gcp-inventory
//!
//! Audits GCP projects and produces one consolidated CSV inventory of VMs,
//! disks, snapshots, firewall rules and IAM bindings, then uploads it to a
//! bucket and mails it.
//!
//! - [`gcp`] - Authentication, HTTP client and project listing
//! - [`resource`] - Resource kinds, schemas, listing calls and collectors
//! - [`audit`] - Concurrent collection and report assembly
//! - [`delivery`] - Report persistence, upload and e-mail
//! - [`config`] - File and environment configuration

pub mod audit;
pub mod config;
pub mod delivery;
pub mod gcp;
pub mod resource;

/// Version injected at compile time via GCP_INVENTORY_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("GCP_INVENTORY_VERSION") {
    Some(v) => v,
    None => "dev",
};
