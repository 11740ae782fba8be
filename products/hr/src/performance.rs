use std::collections::HashMap;

use entity::{employees, performance_reviews};
use platform_api::{ApiError, ApiResult};
use platform_authz::{Permission, Role};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::context::{Actor, org_employee};
use crate::validate::{self, Checks};
use crate::{Paged, db_error, now, round2};

use performance_reviews::{ReviewType, Status};

/// Mean of whichever ratings are present.
pub fn overall_rating(ratings: &[Option<i32>]) -> Option<f64> {
    let present: Vec<f64> = ratings.iter().flatten().map(|r| f64::from(*r)).collect();
    if present.is_empty() {
        None
    } else {
        Some(round2(present.iter().sum::<f64>() / present.len() as f64))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewInput {
    pub employee_id: Uuid,
    pub review_period: String,
    pub review_type: ReviewType,
    #[serde(default)]
    pub goals: Option<String>,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReviewInput {
    pub self_rating: Option<i32>,
    pub reviewer_rating: Option<i32>,
    pub manager_rating: Option<i32>,
    pub overall_rating: Option<f64>,
    pub goals: Option<String>,
    pub achievements: Option<String>,
    pub areas_for_improvement: Option<String>,
    pub feedback: Option<String>,
    pub status: Option<Status>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfRatingInput {
    pub self_rating: i32,
    #[serde(default)]
    pub goals: Option<String>,
    #[serde(default)]
    pub achievements: Option<String>,
    #[serde(default)]
    pub areas_for_improvement: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQuery {
    pub employee_id: Option<Uuid>,
    pub review_type: Option<ReviewType>,
    pub status: Option<Status>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: performance_reviews::Model,
    pub employee_name: Option<String>,
    pub reviewer_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total_reviews: u64,
    pub completed_reviews: u64,
    pub average_rating: Option<f64>,
    pub latest_rating: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MyReviews {
    pub reviews: Vec<ReviewView>,
    pub stats: ReviewStats,
}

/// Stats over COMPLETED reviews; `reviews` must be newest first.
pub fn review_stats(reviews: &[performance_reviews::Model]) -> ReviewStats {
    let completed: Vec<&performance_reviews::Model> = reviews
        .iter()
        .filter(|r| r.status == Status::Completed)
        .collect();
    let rated: Vec<f64> = completed.iter().filter_map(|r| r.overall_rating).collect();
    ReviewStats {
        total_reviews: reviews.len() as u64,
        completed_reviews: completed.len() as u64,
        average_rating: (!rated.is_empty())
            .then(|| round2(rated.iter().sum::<f64>() / rated.len() as f64)),
        latest_rating: rated.first().copied(),
    }
}

async fn with_names<C: ConnectionTrait>(
    db: &C,
    rows: Vec<performance_reviews::Model>,
) -> ApiResult<Vec<ReviewView>> {
    let mut ids: Vec<Uuid> = rows.iter().map(|r| r.employee_id).collect();
    ids.extend(rows.iter().map(|r| r.reviewer_id));
    let names: HashMap<Uuid, String> = if ids.is_empty() {
        HashMap::new()
    } else {
        employees::Entity::find()
            .filter(employees::Column::Id.is_in(ids))
            .all(db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|e| (e.id, e.full_name()))
            .collect()
    };
    Ok(rows
        .into_iter()
        .map(|review| ReviewView {
            employee_name: names.get(&review.employee_id).cloned(),
            reviewer_name: names.get(&review.reviewer_id).cloned(),
            review,
        })
        .collect())
}

async fn single<C: ConnectionTrait>(
    db: &C,
    review: performance_reviews::Model,
) -> ApiResult<ReviewView> {
    with_names(db, vec![review])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Performance review not found"))
}

fn check_rating(checks: &mut Checks, value: Option<i32>, field: &str) {
    checks.check(
        value.is_none_or(|r| (1..=5).contains(&r)),
        field,
        "Rating must be between 1 and 5",
    );
}

#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn create<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    input: CreateReviewInput,
) -> ApiResult<ReviewView> {
    actor.require(Permission::PerformanceWrite)?;
    let reviewer_id = actor.employee_id()?;
    let mut checks = Checks::new();
    checks
        .len_range(&input.review_period, 1, 50, "reviewPeriod")
        .max_len(input.goals.as_deref(), 2000, "goals")
        .max_len(input.feedback.as_deref(), 2000, "feedback");
    checks.finish()?;

    let employee = org_employee(db, actor.org_id, input.employee_id).await?;
    if actor.role == Role::Manager && employee.manager_id != Some(reviewer_id) {
        return Err(ApiError::forbidden("You can only review your direct reports"));
    }
    let period = input.review_period.trim().to_string();
    let duplicate = performance_reviews::Entity::find()
        .filter(performance_reviews::Column::EmployeeId.eq(employee.id))
        .filter(performance_reviews::Column::ReviewPeriod.eq(period.clone()))
        .filter(performance_reviews::Column::ReviewType.eq(input.review_type))
        .count(db)
        .await
        .map_err(db_error)?;
    if duplicate > 0 {
        return Err(ApiError::bad_request(
            "Performance review already exists for this period",
        ));
    }

    let ts = now();
    let review = performance_reviews::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(actor.org_id),
        employee_id: Set(employee.id),
        reviewer_id: Set(reviewer_id),
        review_period: Set(period),
        review_type: Set(input.review_type),
        status: Set(Status::Draft),
        self_rating: Set(None),
        reviewer_rating: Set(None),
        manager_rating: Set(None),
        overall_rating: Set(None),
        goals: Set(validate::clean(input.goals)),
        achievements: Set(None),
        areas_for_improvement: Set(None),
        feedback: Set(validate::clean(input.feedback)),
        completed_at: Set(None),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    info!(review_id = %review.id, "performance review created");
    single(db, review).await
}

pub async fn list<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    query: ReviewQuery,
) -> ApiResult<Paged<ReviewView>> {
    actor.require_role(&[Role::Admin, Role::Hr, Role::Manager])?;
    let page = validate::page(query.page, query.limit, 10)?;
    let mut select = performance_reviews::Entity::find()
        .filter(performance_reviews::Column::OrgId.eq(actor.org_id));
    if actor.role == Role::Manager {
        let me = actor.employee_id()?;
        let reports: Vec<Uuid> = employees::Entity::find()
            .filter(employees::Column::ManagerId.eq(me))
            .all(db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|e| e.id)
            .collect();
        select = select.filter(
            Condition::any()
                .add(performance_reviews::Column::ReviewerId.eq(me))
                .add(performance_reviews::Column::EmployeeId.is_in(reports)),
        );
    }
    if let Some(employee_id) = query.employee_id {
        select = select.filter(performance_reviews::Column::EmployeeId.eq(employee_id));
    }
    if let Some(review_type) = query.review_type {
        select = select.filter(performance_reviews::Column::ReviewType.eq(review_type));
    }
    if let Some(status) = query.status {
        select = select.filter(performance_reviews::Column::Status.eq(status));
    }
    let total = select.clone().count(db).await.map_err(db_error)?;
    let rows = select
        .order_by_desc(performance_reviews::Column::CreatedAt)
        .offset(page.offset())
        .limit(page.limit)
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(Paged::new(with_names(db, rows).await?, page, total))
}

async fn org_review<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    id: Uuid,
) -> ApiResult<performance_reviews::Model> {
    performance_reviews::Entity::find_by_id(id)
        .filter(performance_reviews::Column::OrgId.eq(org_id))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Performance review not found"))
}

pub async fn get<C: ConnectionTrait>(db: &C, actor: &Actor, id: Uuid) -> ApiResult<ReviewView> {
    actor.require(Permission::PerformanceRead)?;
    let review = org_review(db, actor.org_id, id).await?;
    let me = actor.employee_id;
    let allowed = actor.is_hr_admin()
        || me == Some(review.employee_id)
        || me == Some(review.reviewer_id);
    if !allowed {
        return Err(ApiError::forbidden("Access denied"));
    }
    single(db, review).await
}

/// Each party only writes its own fields; anything else in the payload is
/// ignored.
#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn update<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
    input: UpdateReviewInput,
) -> ApiResult<ReviewView> {
    actor.require(Permission::PerformanceRead)?;
    let mut checks = Checks::new();
    check_rating(&mut checks, input.self_rating, "selfRating");
    check_rating(&mut checks, input.reviewer_rating, "reviewerRating");
    check_rating(&mut checks, input.manager_rating, "managerRating");
    checks
        .check(
            input.overall_rating.is_none_or(|r| (1.0..=5.0).contains(&r)),
            "overallRating",
            "Rating must be between 1 and 5",
        )
        .max_len(input.goals.as_deref(), 2000, "goals")
        .max_len(input.achievements.as_deref(), 2000, "achievements")
        .max_len(input.areas_for_improvement.as_deref(), 2000, "areasForImprovement")
        .max_len(input.feedback.as_deref(), 2000, "feedback");
    checks.finish()?;

    let review = org_review(db, actor.org_id, id).await?;
    let hr_admin = actor.is_hr_admin();
    let is_reviewer = actor.employee_id == Some(review.reviewer_id);
    let is_subject = actor.employee_id == Some(review.employee_id);
    if !(hr_admin || is_reviewer || is_subject) {
        return Err(ApiError::forbidden("Access denied"));
    }

    let mut self_rating = review.self_rating;
    let mut reviewer_rating = review.reviewer_rating;
    let mut manager_rating = review.manager_rating;
    let mut ratings_changed = false;
    let mut active: performance_reviews::ActiveModel = review.into();

    if hr_admin || is_reviewer {
        if let Some(rating) = input.reviewer_rating {
            reviewer_rating = Some(rating);
            active.reviewer_rating = Set(reviewer_rating);
            ratings_changed = true;
        }
        if let Some(feedback) = input.feedback {
            active.feedback = Set(validate::clean(Some(feedback)));
        }
        if let Some(status) = input.status {
            active.status = Set(status);
            active.completed_at = Set((status == Status::Completed).then(now));
        }
    }
    if hr_admin {
        if let Some(rating) = input.manager_rating {
            manager_rating = Some(rating);
            active.manager_rating = Set(manager_rating);
            ratings_changed = true;
        }
    }
    if is_subject {
        if let Some(rating) = input.self_rating {
            self_rating = Some(rating);
            active.self_rating = Set(self_rating);
            ratings_changed = true;
        }
        if let Some(goals) = input.goals {
            active.goals = Set(validate::clean(Some(goals)));
        }
        if let Some(achievements) = input.achievements {
            active.achievements = Set(validate::clean(Some(achievements)));
        }
        if let Some(areas) = input.areas_for_improvement {
            active.areas_for_improvement = Set(validate::clean(Some(areas)));
        }
    }
    match input.overall_rating {
        Some(overall) if hr_admin => active.overall_rating = Set(Some(round2(overall))),
        _ if ratings_changed => {
            active.overall_rating =
                Set(overall_rating(&[self_rating, reviewer_rating, manager_rating]));
        }
        _ => {}
    }
    active.updated_at = Set(now());
    let review = active.update(db).await.map_err(db_error)?;
    single(db, review).await
}

pub async fn my_reviews<C: ConnectionTrait>(db: &C, actor: &Actor) -> ApiResult<MyReviews> {
    actor.require(Permission::PerformanceRead)?;
    let employee_id = actor.employee_id()?;
    let rows = performance_reviews::Entity::find()
        .filter(performance_reviews::Column::EmployeeId.eq(employee_id))
        .order_by_desc(performance_reviews::Column::CreatedAt)
        .all(db)
        .await
        .map_err(db_error)?;
    let stats = review_stats(&rows);
    Ok(MyReviews {
        reviews: with_names(db, rows).await?,
        stats,
    })
}

/// The subject's own rating. Opens a draft review for discussion.
#[instrument(skip(db, input), fields(user_id = %actor.user_id))]
pub async fn self_rating<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
    input: SelfRatingInput,
) -> ApiResult<ReviewView> {
    actor.require(Permission::PerformanceRead)?;
    let mut checks = Checks::new();
    check_rating(&mut checks, Some(input.self_rating), "selfRating");
    checks
        .max_len(input.goals.as_deref(), 2000, "goals")
        .max_len(input.achievements.as_deref(), 2000, "achievements")
        .max_len(input.areas_for_improvement.as_deref(), 2000, "areasForImprovement");
    checks.finish()?;

    let review = org_review(db, actor.org_id, id).await?;
    if actor.employee_id != Some(review.employee_id) {
        return Err(ApiError::forbidden("You can only rate your own reviews"));
    }
    if review.status == Status::Completed {
        return Err(ApiError::bad_request("Review is already completed"));
    }
    let overall = overall_rating(&[
        Some(input.self_rating),
        review.reviewer_rating,
        review.manager_rating,
    ]);
    let status = if review.status == Status::Draft {
        Status::InProgress
    } else {
        review.status
    };
    let mut active: performance_reviews::ActiveModel = review.into();
    active.self_rating = Set(Some(input.self_rating));
    active.overall_rating = Set(overall);
    active.status = Set(status);
    if let Some(goals) = input.goals {
        active.goals = Set(validate::clean(Some(goals)));
    }
    if let Some(achievements) = input.achievements {
        active.achievements = Set(validate::clean(Some(achievements)));
    }
    if let Some(areas) = input.areas_for_improvement {
        active.areas_for_improvement = Set(validate::clean(Some(areas)));
    }
    active.updated_at = Set(now());
    let review = active.update(db).await.map_err(db_error)?;
    single(db, review).await
}

pub async fn delete<C: ConnectionTrait>(db: &C, actor: &Actor, id: Uuid) -> ApiResult<()> {
    actor.require_role(&[Role::Admin])?;
    let review = org_review(db, actor.org_id, id).await?;
    performance_reviews::Entity::delete_by_id(review.id)
        .exec(db)
        .await
        .map_err(db_error)?;
    info!(review_id = %id, "performance review deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_is_mean_of_present_ratings() {
        assert_eq!(overall_rating(&[Some(4), None, Some(5)]), Some(4.5));
        assert_eq!(overall_rating(&[Some(3), Some(4), Some(4)]), Some(3.67));
        assert_eq!(overall_rating(&[None, None, None]), None);
    }
}
