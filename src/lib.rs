//! Feed reader core: an order-preserving concurrent item fetch and a
//! persistent favorites store.

pub mod config;
pub mod db;
pub mod error;
pub mod favorites;
pub mod feed;
pub mod model;
pub mod pipeline;
pub mod session;
pub mod settings;
