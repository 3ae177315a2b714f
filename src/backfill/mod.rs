mod error;
mod role_backfiller;

pub use error::BackfillError;
pub use role_backfiller::{BackfillStrategy, RoleBackfiller};
