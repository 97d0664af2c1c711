//! HTTP API handlers
//!
//! JSON over REST. Every route except `/health` needs a caller identity (see
//! [`crate::auth::Caller`]).

pub mod events;
pub mod health;
pub mod periods;
pub mod praise;
pub mod settings;
pub mod users;

pub use events::event_routes;
pub use health::health_routes;
pub use periods::period_routes;
pub use praise::praise_routes;
pub use settings::settings_routes;
pub use users::user_routes;
