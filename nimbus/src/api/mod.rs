//! Nimbus REST API client
//!
//! [`Client`] handles transport, authentication, retries and error
//! decoding. Each remote collection has a small typed API borrowed from the
//! client (`client.vpcs().get(id)`).

pub mod catalog;
pub mod client;
pub mod common;
pub mod error;
pub mod firewall;
pub mod floating_ips;
pub mod instances;
pub mod load_balancers;
pub mod network_policies;
pub mod networks;
pub mod routers;
pub mod tags;
pub mod tasks;
pub mod types;
pub mod volumes;
pub mod vpcs;
pub mod vpn;

pub use client::{Client, RetryConfig};
pub use common::TaskRef;
pub use error::ApiError;
pub use types::{
    Action, Algorithm, DefaultAction, Direction, IkeVersion, Protocol, SyncStatus, TaskStatus,
    VolumeType,
};
