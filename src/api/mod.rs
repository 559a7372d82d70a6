//! Clients for third-party HTTP services the storefront leans on.

pub mod images;
