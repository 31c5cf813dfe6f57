mod api;
mod config;
mod error;

mod data_objects;
pub mod helpers;

pub use api::MeliApi;
pub use config::MeliConfig;
pub use data_objects::{OrderSearchResults, OrderSummary, Paging, TokenResponse};
pub use error::MeliApiError;
