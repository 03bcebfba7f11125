//! Marketplace API access
//!
//! [`ApiClient::call`] handles authentication headers and error decoding for
//! every request; the typed calls used by the submission workflow live in
//! `listings`.

mod client;
mod listings;

pub use client::{ApiClient, RequestBody};
pub use listings::{CreatedListing, UserInfo};
