//! Read-only dashboard schema. The HTTP handler authenticates the caller and
//! attaches the [`Actor`] as request data.

mod me;

use async_graphql::{Context, EmptyMutation, EmptySubscription, ErrorExtensions, Object, Schema, SimpleObject};
use platform_api::ApiError;
use platform_db::DbPool;
use products_hr::reports::{self, HrOverview, RecruitmentOverview};
use products_hr::{Actor, auth};
use serde::Serialize;
use tracing::instrument;

pub use me::MePayload;

pub type SchemaType = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

pub fn build_schema(db: DbPool) -> SchemaType {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .data(db)
        .finish()
}

/// SDL snapshot written by `schema:print`.
pub fn sdl() -> String {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .finish()
        .sdl()
}

fn caller<'a>(ctx: &Context<'a>) -> async_graphql::Result<(&'a DbPool, &'a Actor)> {
    let actor = ctx
        .data_opt::<Actor>()
        .ok_or_else(|| ApiError::unauthorized("Access token required").extend())?;
    let db = ctx
        .data::<DbPool>()
        .map_err(|_| ApiError::internal(anyhow::anyhow!("database handle missing")).extend())?;
    Ok((db, actor))
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self) -> HealthPayload {
        HealthPayload { ok: true }
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    #[instrument(name = "graphql.me", skip_all)]
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<MePayload> {
        let (db, actor) = caller(ctx)?;
        let profile = auth::profile(db, actor).await.map_err(|e| e.extend())?;
        Ok(MePayload::new(profile, auth::permissions(actor)))
    }

    #[instrument(name = "graphql.hr_overview", skip_all)]
    async fn hr_overview(&self, ctx: &Context<'_>) -> async_graphql::Result<HrOverview> {
        let (db, actor) = caller(ctx)?;
        reports::hr_overview(db, actor).await.map_err(|e| e.extend())
    }

    #[instrument(name = "graphql.recruitment_overview", skip_all)]
    async fn recruitment_overview(&self, ctx: &Context<'_>) -> async_graphql::Result<RecruitmentOverview> {
        let (db, actor) = caller(ctx)?;
        reports::recruitment_overview(db, actor)
            .await
            .map_err(|e| e.extend())
    }
}

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
}
