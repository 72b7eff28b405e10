//! Strata - environment-driven cloud topology composer
//!
//! Strata resolves one named environment's configuration into a
//! dependency-ordered graph of resource groups (network, compute, load
//! balancing, object storage, relational and wide-column data, and a managed
//! orchestration cluster) and wires a layered security-group access graph
//! between them. The finished graph is handed to an external provisioning
//! engine as an immutable, serializable plan; no cloud API is touched here.
//!
//! # Architecture
//!
//! Composition is single-threaded and synchronous. Builders run in a fixed
//! order determined by the dependency partial order:
//!
//! - The environment registry resolves the requested profile first; an
//!   unknown environment aborts before any group exists.
//! - The network topology is the source node of the graph. Every other
//!   group depends on it directly or transitively.
//! - Security-group access is expressed as group-to-group edges. Raw CIDR
//!   ingress exists only at the two sanctioned entry points (bastion and
//!   load balancer).
//! - Any builder failure abandons the whole composition; a partial plan is
//!   never emitted.
//!
//! # Modules
//!
//! - [`config`] - Environment profiles, the registry (resolver), and the
//!   centralized environment policy table
//! - [`network`] - Virtual network, subnet tiers, security groups, and the
//!   security graph wirer
//! - [`graph`] - Resource groups, dependency edges, and output bindings
//! - [`iam`] - Least-privilege identity specifications
//! - [`compute`] - Bastion, web, and database host group builder
//! - [`loadbalancer`] - Public entry point and target pool builder
//! - [`storage`] - Object store group builder
//! - [`data`] - Relational and wide-column data group builder
//! - [`orchestration`] - Managed cluster, worker pool, and storage wiring
//! - [`composer`] - The composition root that fixes build order
//! - [`error`] - Error types for the composer

#![deny(missing_docs)]

pub mod composer;
pub mod compute;
pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod iam;
pub mod loadbalancer;
pub mod network;
pub mod orchestration;
pub mod storage;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================
// These constants define the defaults used throughout Strata. Centralizing
// them here keeps builder defaults, composer wiring, and test fixtures
// consistent.

/// Administrative (remote shell) port
pub const ADMIN_PORT: u16 = 22;

/// Public web port
pub const HTTP_PORT: u16 = 80;

/// Public TLS web port
pub const HTTPS_PORT: u16 = 443;

/// Relational database port
pub const DATABASE_PORT: u16 = 3306;

/// IPv4 wildcard source for the sanctioned public entry points
pub const ANY_IPV4: &str = "0.0.0.0/0";

/// Default number of web hosts per environment
pub const DEFAULT_WEB_INSTANCE_COUNT: u32 = 2;

/// Default object expiry for the object store, in days
pub const DEFAULT_OBJECT_EXPIRY_DAYS: u32 = 30;

/// Incomplete multipart uploads are aborted after this many days
pub const MULTIPART_ABORT_DAYS: u32 = 7;

/// Noncurrent object versions expire after this many days (production only)
pub const NONCURRENT_VERSION_EXPIRY_DAYS: u32 = 90;

/// Minimum worker count for the managed orchestration pool
pub const NODE_POOL_MIN: u32 = 2;

/// Desired worker count for the managed orchestration pool
pub const NODE_POOL_DESIRED: u32 = 2;

/// Maximum worker count for the managed orchestration pool
pub const NODE_POOL_MAX: u32 = 5;

/// Fixed disk size for orchestration workers, in GiB
pub const NODE_DISK_GIB: u32 = 20;
