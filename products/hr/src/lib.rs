//! HR domain services.
//!
//! Every operation takes the database handle and the calling [`Actor`] and
//! performs its own permission check, so HTTP handlers and GraphQL resolvers
//! stay thin. Staff data is always scoped to the actor's org.

pub mod attendance;
pub mod audit;
pub mod auth;
pub mod candidates;
pub mod context;
pub mod departments;
pub mod employees;
pub mod interviews;
pub mod leave;
pub mod onboarding;
pub mod payroll;
pub mod performance;
pub mod recruitment;
pub mod reports;
pub mod seed;
pub mod uploads;
pub mod users;
pub mod validate;

use platform_api::ApiError;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{Condition, DbErr, EntityTrait, SqlErr};
use serde::Serialize;

pub use context::{Actor, load_actor};
pub use platform_db::{PageRequest, Pagination};

/// One page of rows plus the paging envelope.
#[derive(Clone, Debug, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Paged<T> {
    pub fn new(items: Vec<T>, page: PageRequest, total: u64) -> Self {
        Self {
            items,
            pagination: page.paginate(total),
        }
    }
}

/// Map storage failures onto API errors. Constraint violations are the
/// caller's fault; anything else is ours.
pub fn db_error(err: DbErr) -> ApiError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ApiError::bad_request("Duplicate entry. This record already exists.")
        }
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
            ApiError::bad_request("Referenced record does not exist.")
        }
        _ => ApiError::internal(anyhow::Error::new(err)),
    }
}

pub(crate) fn now() -> sea_orm::prelude::DateTimeWithTimeZone {
    chrono::Utc::now().fixed_offset()
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Case-insensitive substring match on any of `columns`.
pub(crate) fn like_any<E: EntityTrait>(term: &str, entity: E, columns: &[E::Column]) -> Condition {
    let pattern = format!("%{}%", term.trim().to_lowercase());
    columns.iter().fold(Condition::any(), |cond, column| {
        cond.add(Expr::expr(Func::lower(Expr::col((entity, *column)))).like(pattern.clone()))
    })
}
