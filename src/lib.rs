//! Avni server - administrative and sync backbone for field-data collection
//!
//! A multi-tenant platform for community health programs: field workers
//! register subjects, enrol them into programs and record visits on mobile
//! devices that sync incrementally against this server.
//!
//! ## Services
//!
//! - **Concepts**: the attribute dictionary and the observation codec
//! - **Locations**: address hierarchy lookups and catchment maintenance
//! - **Access**: group-based privilege rows and the resolution engine
//! - **Users**: provisioning with IDP integration and sync settings
//! - **Sync**: assignment fan-out and change-detection feeds
//! - **Import**: bulk user-and-catchment and group-subject loads
//! - **Messaging**: outbound gateway adapter and receiver registry

pub mod access;
pub mod concepts;
pub mod config;
pub mod domain;
pub mod export;
pub mod idp;
pub mod import;
pub mod locations;
pub mod messaging;
pub mod routes;
pub mod server;
pub mod store;
pub mod sync;
pub mod types;
pub mod users;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{AvniError, Result};
