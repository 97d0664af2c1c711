//! Data access for praise-api
//!
//! Every function takes a `&mut SqliteConnection` so it can run either on a
//! pooled connection or inside a transaction (`&mut *tx`).

pub mod periods;
pub mod praise;
pub mod quantifications;
pub mod users;
