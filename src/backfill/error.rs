use sea_orm::DbErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackfillError {
    #[error("Database error: {0}")]
    Db(#[from] DbErr),

    #[error("{mismatched} users still have a role that does not match their flags")]
    Inconsistent { mismatched: u64 },
}
