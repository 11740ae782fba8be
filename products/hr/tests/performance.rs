mod common;

use common::{ADMIN, EMPLOYEE, HR, HrTestEnv, MANAGER};
use entity::performance_reviews::{ReviewType, Status};
use platform_api::ApiError;
use products_hr::performance::{
    self, CreateReviewInput, ReviewQuery, SelfRatingInput, UpdateReviewInput,
};

fn quarterly(employee_id: uuid::Uuid) -> CreateReviewInput {
    CreateReviewInput {
        employee_id,
        review_period: "2025-Q1".into(),
        review_type: ReviewType::Quarterly,
        goals: Some("Ship the billing revamp".into()),
        feedback: None,
    }
}

#[tokio::test]
async fn a_review_moves_from_draft_to_completed() {
    let env = HrTestEnv::new().await;
    let manager = env.actor(MANAGER).await;
    let employee = env.actor(EMPLOYEE).await;

    let review = performance::create(&env.db, &manager, quarterly(env.employee(EMPLOYEE)))
        .await
        .unwrap();
    assert_eq!(review.review.status, Status::Draft);
    assert_eq!(review.review.reviewer_id, env.employee(MANAGER));

    let err = performance::create(&env.db, &manager, quarterly(env.employee(EMPLOYEE)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let rated = performance::self_rating(
        &env.db,
        &employee,
        review.review.id,
        SelfRatingInput {
            self_rating: 4,
            goals: None,
            achievements: Some("Cut invoice latency in half".into()),
            areas_for_improvement: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(rated.review.status, Status::InProgress);
    assert_eq!(rated.review.overall_rating, Some(4.0));

    // The subject cannot rate on the reviewer's behalf.
    let ignored = performance::update(
        &env.db,
        &employee,
        review.review.id,
        UpdateReviewInput {
            reviewer_rating: Some(1),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(ignored.review.reviewer_rating, None);

    let completed = performance::update(
        &env.db,
        &manager,
        review.review.id,
        UpdateReviewInput {
            reviewer_rating: Some(5),
            status: Some(Status::Completed),
            feedback: Some("Great quarter".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(completed.review.overall_rating, Some(4.5));
    assert!(completed.review.completed_at.is_some());

    let mine = performance::my_reviews(&env.db, &employee).await.unwrap();
    assert_eq!(mine.stats.completed_reviews, 1);
    assert_eq!(mine.stats.average_rating, Some(4.5));
}

#[tokio::test]
async fn managers_only_review_direct_reports() {
    let env = HrTestEnv::new().await;
    let manager = env.actor(MANAGER).await;
    let err = performance::create(&env.db, &manager, quarterly(env.employee(HR)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let hr = env.actor(HR).await;
    performance::create(&env.db, &hr, quarterly(env.employee(MANAGER)))
        .await
        .unwrap();

    let visible = performance::list(&env.db, &manager, ReviewQuery::default())
        .await
        .unwrap();
    assert!(visible.items.is_empty());

    let admin = env.actor(ADMIN).await;
    let all = performance::list(&env.db, &admin, ReviewQuery::default())
        .await
        .unwrap();
    assert_eq!(all.pagination.total, 1);

    let employee = env.actor(EMPLOYEE).await;
    let err = performance::get(&env.db, &employee, all.items[0].review.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}
