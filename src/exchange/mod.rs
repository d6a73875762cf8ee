pub mod models;
pub mod okex_rest;
pub mod okex_ws_feed;
pub mod signer;
