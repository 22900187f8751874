//! Resource abstraction layer
//!
//! Everything that knows about individual resource kinds lives here.
//!
//! # Architecture
//!
//! - [`kind`] - The closed, ordered set of inventoried resource kinds
//! - [`registry`] - Column schemas and projection of raw records into rows
//! - [`listing`] - Maps each kind to its REST listing call
//! - [`collector`] - Per-kind collectors and the IAM authorization gate
//!
//! # Example
//!
//! ```ignore
//! use gcp_inventory::resource::{build_plans, CollectorPlan};
//!
//! let plans = build_plans(&client);
//! assert_eq!(plans.len(), 5);
//! ```

pub mod collector;
pub mod kind;
pub mod listing;
pub mod registry;

pub use collector::{
    build_plans, Batch, CollectionError, Collector, CollectorGate, CollectorPlan,
    ComputeCollector, IamCollector, IamGate,
};
pub use kind::ResourceKind;
pub use registry::{columns_for, project, ProjectionError, Row};
