//! Business services
//!
//! Each service owns a pool handle and the event log. Mutations follow the
//! same shape: begin a transaction, do the work, log the audit event inside
//! the transaction, commit, then publish the event to live subscribers.

pub mod assignment;
pub mod periods;
pub mod praise;
pub mod quantify;
pub mod scoring;
pub mod settings;
pub mod users;

pub use assignment::AssignmentService;
pub use periods::PeriodService;
pub use praise::PraiseService;
pub use quantify::QuantificationService;
pub use settings::SettingsService;
pub use users::UserService;
