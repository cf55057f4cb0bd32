//! Gasless voucher issuing service.
//!
//! Issues, queries, prolongs, and revokes prepaid on-chain vouchers that
//! let end users submit transactions without holding native gas tokens.
//! [`manager::VoucherManager`] orchestrates the lifecycle against a chain
//! node reached through the [`connector::ChainConnector`] seam, signing
//! every extrinsic with the single [`identity::SigningIdentity`] voucher
//! account and caching issuing intent in [`store::MetadataStore`]. The
//! [`api`] module exposes the operations over HTTP.

pub mod api;
pub mod config;
pub mod connector;
pub mod errors;
pub mod identity;
pub mod manager;
pub mod store;
pub mod types;
