//! Behaviour the engine requires from its collaborators.
//!
//! Storage backends implement [`IntegrationStore`], [`OrderStore`] and [`AuthStore`]; the bundled
//! [`crate::SqliteDatabase`] implements all three. [`MarketplaceClient`] is the outbound seam: the real
//! implementation lives in `meli_tools`, and tests substitute a mock.

mod auth_store;
mod integration_store;
mod marketplace;
mod order_store;

pub use auth_store::{AuthStore, AuthStoreError};
pub use integration_store::{IntegrationStore, IntegrationStoreError};
pub use marketplace::MarketplaceClient;
pub use order_store::{OrderStore, OrderStoreError};

/// Everything the sync engine and the HTTP layer need from a storage backend, in one bound.
pub trait SyncStorage: IntegrationStore + OrderStore + AuthStore + Clone {}

impl<T> SyncStorage for T where T: IntegrationStore + OrderStore + AuthStore + Clone {}

/// A cloneable marketplace client, as required by [`crate::OrderSyncApi`]. Mirrors [`SyncStorage`].
pub trait SyncMarketplace: MarketplaceClient + Clone {}

impl<T> SyncMarketplace for T where T: MarketplaceClient + Clone {}
