//! Mercado Sync Engine
//!
//! The core of the marketplace integration backend. It keeps local order, payment and shipment records current
//! with a remote marketplace account, and looks after the OAuth credentials that make those calls possible.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@traits`] and the SQLite implementation). The engine never talks to tables directly;
//!    everything goes through the [`traits::IntegrationStore`], [`traits::OrderStore`] and
//!    [`traits::AuthStore`] traits, so another backend can be swapped in by implementing them.
//! 2. The credential vault ([`CredentialVaultApi`]), which stores OAuth tokens encrypted at rest
//!    ([`mod@crypto`]) and refreshes them against the marketplace's token endpoint when they expire.
//! 3. The order sync engine ([`OrderSyncApi`]), which runs incremental, full or id-targeted reconciliation of
//!    remote orders into local storage, enriching each changed order with payment fees and shipment
//!    tracking/cost data along the way.
mod api;

pub mod crypto;
pub mod db_types;
pub mod helpers;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use api::{
    sync::{OrderSyncApi, SyncError, SyncOptions, SyncSelector},
    vault::{CredentialVaultApi, MarketplaceAppCredentials, VaultError, MARKETPLACE},
};
