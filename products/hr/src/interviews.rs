//! Interview scheduling for candidate applications.
//!
//! Booking an interview moves the application to `INTERVIEW`; cancelling the
//! only live interview sends it back to `SCREENING`. Candidate mails are best
//! effort and never undo the write.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use entity::{candidate_applications, candidates, interviews, job_postings, users};
use platform_api::{ApiError, ApiResult};
use platform_authz::{Permission, Role};
use platform_notify::{Mailer, OutgoingEmail, templates};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::context::Actor;
use crate::validate::{self, Checks};
use crate::{Paged, db_error, now};

use interviews::{InterviewType, Status};

pub const MIN_DURATION_MINUTES: i32 = 15;
pub const MAX_DURATION_MINUTES: i32 = 480;

const SCHEDULERS: [Role; 3] = [Role::Admin, Role::Hr, Role::Manager];

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInput {
    pub application_id: Uuid,
    pub scheduled_at: DateTimeWithTimeZone,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    pub interview_type: InterviewType,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub interviewers: Vec<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleInput {
    pub scheduled_at: DateTimeWithTimeZone,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub meeting_link: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInput {
    pub status: Status,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelInput {
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewQuery {
    pub job_posting_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub status: Option<Status>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewView {
    #[serde(flatten)]
    pub interview: interviews::Model,
    pub candidate_name: Option<String>,
    pub candidate_email: Option<String>,
    pub job_title: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewOutcome {
    pub interview: InterviewView,
    pub email_sent: bool,
}

fn check_slot(
    checks: &mut Checks,
    scheduled_at: DateTimeWithTimeZone,
    duration: Option<i32>,
    location: Option<&str>,
    meeting_link: Option<&str>,
) {
    checks
        .check(
            scheduled_at > now(),
            "scheduledAt",
            "Interview must be scheduled in the future",
        )
        .check(
            duration.is_none_or(|d| (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&d)),
            "durationMinutes",
            "Duration must be between 15 and 480 minutes",
        )
        .max_len(location, 200, "location")
        .max_len(meeting_link, 500, "meetingLink");
}

/// The scheduler, or HR/Admin, may change an interview.
fn can_manage(actor: &Actor, interview: &interviews::Model) -> bool {
    actor.is_hr_admin() || interview.scheduled_by == actor.user_id
}

fn panel(interview: &interviews::Model) -> Vec<Uuid> {
    serde_json::from_value(interview.interviewers.clone()).unwrap_or_default()
}

fn visible_to(actor: &Actor, interview: &interviews::Model) -> bool {
    can_manage(actor, interview) || panel(interview).contains(&actor.user_id)
}

async fn org_application<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    id: Uuid,
) -> ApiResult<candidate_applications::Model> {
    candidate_applications::Entity::find_by_id(id)
        .filter(candidate_applications::Column::OrgId.eq(org_id))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Application not found"))
}

async fn org_interview<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
) -> ApiResult<interviews::Model> {
    interviews::Entity::find_by_id(id)
        .filter(interviews::Column::OrgId.eq(actor.org_id))
        .one(db)
        .await
        .map_err(db_error)?
        .filter(|interview| visible_to(actor, interview))
        .ok_or_else(|| ApiError::not_found("Interview not found"))
}

async fn check_panel<C: ConnectionTrait>(db: &C, org_id: Uuid, panel: &[Uuid]) -> ApiResult<()> {
    if panel.is_empty() {
        return Ok(());
    }
    let wanted: HashSet<Uuid> = panel.iter().copied().collect();
    let found = users::Entity::find()
        .filter(users::Column::OrgId.eq(org_id))
        .filter(users::Column::IsActive.eq(true))
        .filter(users::Column::Role.ne(users::Role::Candidate))
        .filter(users::Column::Id.is_in(wanted.iter().copied().collect::<Vec<_>>()))
        .count(db)
        .await
        .map_err(db_error)?;
    if found as usize != wanted.len() {
        return Err(ApiError::field(
            "interviewers",
            "Interviewers must be active staff of this organization",
        ));
    }
    Ok(())
}

async fn views<C: ConnectionTrait>(
    db: &C,
    rows: Vec<interviews::Model>,
) -> ApiResult<Vec<InterviewView>> {
    let candidate_ids: Vec<Uuid> = rows.iter().map(|i| i.candidate_id).collect();
    let job_ids: Vec<Uuid> = rows.iter().map(|i| i.job_posting_id).collect();
    let people: HashMap<Uuid, candidates::Model> = if candidate_ids.is_empty() {
        HashMap::new()
    } else {
        candidates::Entity::find()
            .filter(candidates::Column::Id.is_in(candidate_ids))
            .all(db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|c| (c.id, c))
            .collect()
    };
    let titles: HashMap<Uuid, String> = if job_ids.is_empty() {
        HashMap::new()
    } else {
        job_postings::Entity::find()
            .filter(job_postings::Column::Id.is_in(job_ids))
            .all(db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|j| (j.id, j.title))
            .collect()
    };
    Ok(rows
        .into_iter()
        .map(|interview| {
            let candidate = people.get(&interview.candidate_id);
            InterviewView {
                candidate_name: candidate.map(|c| format!("{} {}", c.first_name, c.last_name)),
                candidate_email: candidate.map(|c| c.email.clone()),
                job_title: titles.get(&interview.job_posting_id).cloned(),
                interview,
            }
        })
        .collect())
}

async fn single<C: ConnectionTrait>(db: &C, interview: interviews::Model) -> ApiResult<InterviewView> {
    views(db, vec![interview])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Interview not found"))
}

fn when(at: DateTimeWithTimeZone) -> String {
    at.with_timezone(&Utc).format("%Y-%m-%d %H:%M UTC").to_string()
}

fn kind_label(kind: InterviewType) -> &'static str {
    match kind {
        InterviewType::Phone => "Phone",
        InterviewType::Video => "Video call",
        InterviewType::InPerson => "In person",
        InterviewType::Panel => "Panel",
    }
}

enum Notice<'a> {
    Scheduled,
    Rescheduled,
    Cancelled(Option<&'a str>),
}

fn notice_for(company: &str, view: &InterviewView, notice: Notice<'_>) -> Option<OutgoingEmail> {
    let (name, to) = (view.candidate_name.as_deref()?, view.candidate_email.as_deref()?);
    let job_title = view.job_title.as_deref().unwrap_or("open");
    let interview = &view.interview;
    let when = when(interview.scheduled_at);
    let slot = templates::InterviewSlot {
        job_title,
        when: &when,
        kind: kind_label(interview.interview_type),
        location: interview.location.as_deref(),
        meeting_link: interview.meeting_link.as_deref(),
    };
    Some(match notice {
        Notice::Scheduled => templates::interview_scheduled(company, &slot, name, to),
        Notice::Rescheduled => templates::interview_rescheduled(company, &slot, name, to),
        Notice::Cancelled(reason) => {
            templates::interview_cancelled(company, job_title, name, to, reason)
        }
    })
}

async fn notify(mailer: &dyn Mailer, email: Option<OutgoingEmail>) -> bool {
    let Some(email) = email else {
        return false;
    };
    match mailer.send(email).await {
        Ok(_) => true,
        Err(err) => {
            warn!(error = %err, mailer = mailer.name(), "interview email failed");
            false
        }
    }
}

#[instrument(skip(db, input, mailer), fields(org_id = %actor.org_id))]
pub async fn schedule<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    input: ScheduleInput,
    mailer: &dyn Mailer,
    company: &str,
) -> ApiResult<InterviewOutcome> {
    actor.require_role(&SCHEDULERS)?;
    let mut checks = Checks::new();
    check_slot(
        &mut checks,
        input.scheduled_at,
        input.duration_minutes,
        input.location.as_deref(),
        input.meeting_link.as_deref(),
    );
    checks
        .max_len(input.notes.as_deref(), 2000, "notes")
        .check(
            input.interview_type != InterviewType::InPerson
                || input.location.as_deref().is_some_and(|l| !l.trim().is_empty()),
            "location",
            "Location is required for in-person interviews",
        )
        .check(
            input.interview_type != InterviewType::Video
                || input.meeting_link.as_deref().is_some_and(|l| !l.trim().is_empty()),
            "meetingLink",
            "Meeting link is required for video interviews",
        );
    checks.finish()?;

    let application = org_application(db, actor.org_id, input.application_id).await?;
    use candidate_applications::Status as Stage;
    if matches!(
        application.status,
        Stage::Rejected | Stage::Withdrawn | Stage::Hired
    ) {
        return Err(ApiError::bad_request(
            "Cannot schedule an interview for a closed application",
        ));
    }
    let live = interviews::Entity::find()
        .filter(interviews::Column::ApplicationId.eq(application.id))
        .filter(interviews::Column::Status.is_in([Status::Scheduled, Status::InProgress]))
        .count(db)
        .await
        .map_err(db_error)?;
    if live > 0 {
        return Err(ApiError::bad_request(
            "Interview is already scheduled for this candidate",
        ));
    }
    check_panel(db, actor.org_id, &input.interviewers).await?;

    let ts = now();
    let interview = interviews::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(actor.org_id),
        application_id: Set(application.id),
        candidate_id: Set(application.candidate_id),
        job_posting_id: Set(application.job_posting_id),
        scheduled_by: Set(actor.user_id),
        scheduled_at: Set(input.scheduled_at),
        duration_minutes: Set(input.duration_minutes.unwrap_or(60)),
        interview_type: Set(input.interview_type),
        location: Set(validate::clean(input.location)),
        meeting_link: Set(validate::clean(input.meeting_link)),
        interviewers: Set(json!(input.interviewers)),
        notes: Set(validate::clean(input.notes)),
        feedback: Set(None),
        status: Set(Status::Scheduled),
        cancellation_reason: Set(None),
        cancelled_at: Set(None),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(db)
    .await
    .map_err(db_error)?;

    if application.status != Stage::Interview {
        let mut active: candidate_applications::ActiveModel = application.into();
        active.status = Set(Stage::Interview);
        active.updated_at = Set(ts);
        active.update(db).await.map_err(db_error)?;
    }
    info!(interview_id = %interview.id, "interview scheduled");

    let interview = single(db, interview).await?;
    let email_sent = notify(mailer, notice_for(company, &interview, Notice::Scheduled)).await;
    Ok(InterviewOutcome {
        interview,
        email_sent,
    })
}

/// Interviews visible to the actor: HR/Admin see the whole org, managers
/// only those they booked or sit on.
pub async fn list<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    query: InterviewQuery,
) -> ApiResult<Paged<InterviewView>> {
    actor.require(Permission::RecruitmentRead)?;
    let page = validate::page(query.page, query.limit, 20)?;
    let mut select =
        interviews::Entity::find().filter(interviews::Column::OrgId.eq(actor.org_id));
    if let Some(job_id) = query.job_posting_id {
        select = select.filter(interviews::Column::JobPostingId.eq(job_id));
    }
    if let Some(application_id) = query.application_id {
        select = select.filter(interviews::Column::ApplicationId.eq(application_id));
    }
    if let Some(status) = query.status {
        select = select.filter(interviews::Column::Status.eq(status));
    }
    let rows: Vec<interviews::Model> = select
        .order_by_asc(interviews::Column::ScheduledAt)
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .filter(|interview| visible_to(actor, interview))
        .collect();
    let total = rows.len() as u64;
    let rows = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
    Ok(Paged::new(views(db, rows).await?, page, total))
}

pub async fn get<C: ConnectionTrait>(db: &C, actor: &Actor, id: Uuid) -> ApiResult<InterviewView> {
    actor.require(Permission::RecruitmentRead)?;
    let interview = org_interview(db, actor, id).await?;
    single(db, interview).await
}

#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn update_status<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
    input: StatusInput,
) -> ApiResult<InterviewView> {
    actor.require_role(&SCHEDULERS)?;
    let mut checks = Checks::new();
    checks.max_len(input.feedback.as_deref(), 2000, "feedback");
    checks.finish()?;
    let interview = org_interview(db, actor, id).await?;
    if !can_manage(actor, &interview) {
        return Err(ApiError::forbidden(
            "Only the scheduler or HR can update this interview",
        ));
    }
    if input.status == Status::Cancelled {
        return Err(ApiError::field(
            "status",
            "Use the cancel action to cancel an interview",
        ));
    }
    if interview.status.is_closed() {
        return Err(ApiError::bad_request("Interview is already closed"));
    }
    let mut active: interviews::ActiveModel = interview.into();
    active.status = Set(input.status);
    if input.feedback.is_some() {
        active.feedback = Set(validate::clean(input.feedback));
    }
    active.updated_at = Set(now());
    let interview = active.update(db).await.map_err(db_error)?;
    info!(interview_id = %interview.id, status = ?interview.status, "interview status updated");
    single(db, interview).await
}

#[instrument(skip(db, input, mailer), fields(org_id = %actor.org_id))]
pub async fn reschedule<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
    input: RescheduleInput,
    mailer: &dyn Mailer,
    company: &str,
) -> ApiResult<InterviewOutcome> {
    actor.require_role(&SCHEDULERS)?;
    let mut checks = Checks::new();
    check_slot(
        &mut checks,
        input.scheduled_at,
        input.duration_minutes,
        input.location.as_deref(),
        input.meeting_link.as_deref(),
    );
    checks.finish()?;
    let interview = org_interview(db, actor, id).await?;
    if !can_manage(actor, &interview) {
        return Err(ApiError::forbidden(
            "Only the scheduler or HR can reschedule this interview",
        ));
    }
    if interview.status.is_closed() {
        return Err(ApiError::bad_request(
            "Cannot reschedule a completed or cancelled interview",
        ));
    }
    let mut active: interviews::ActiveModel = interview.into();
    active.scheduled_at = Set(input.scheduled_at);
    active.status = Set(Status::Scheduled);
    if let Some(duration) = input.duration_minutes {
        active.duration_minutes = Set(duration);
    }
    if input.location.is_some() {
        active.location = Set(validate::clean(input.location));
    }
    if input.meeting_link.is_some() {
        active.meeting_link = Set(validate::clean(input.meeting_link));
    }
    active.updated_at = Set(now());
    let interview = active.update(db).await.map_err(db_error)?;
    info!(interview_id = %interview.id, "interview rescheduled");

    let interview = single(db, interview).await?;
    let email_sent = notify(mailer, notice_for(company, &interview, Notice::Rescheduled)).await;
    Ok(InterviewOutcome {
        interview,
        email_sent,
    })
}

#[instrument(skip(db, input, mailer), fields(org_id = %actor.org_id))]
pub async fn cancel<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
    input: CancelInput,
    mailer: &dyn Mailer,
    company: &str,
) -> ApiResult<InterviewOutcome> {
    actor.require_role(&SCHEDULERS)?;
    let mut checks = Checks::new();
    checks.max_len(input.reason.as_deref(), 500, "reason");
    checks.finish()?;
    let interview = org_interview(db, actor, id).await?;
    if !can_manage(actor, &interview) {
        return Err(ApiError::forbidden(
            "Only the scheduler or HR can cancel this interview",
        ));
    }
    if interview.status.is_closed() {
        return Err(ApiError::bad_request("Interview is already closed"));
    }
    let ts = now();
    let application_id = interview.application_id;
    let mut active: interviews::ActiveModel = interview.into();
    active.status = Set(Status::Cancelled);
    active.cancellation_reason = Set(validate::clean(input.reason));
    active.cancelled_at = Set(Some(ts));
    active.updated_at = Set(ts);
    let interview = active.update(db).await.map_err(db_error)?;

    let application = org_application(db, actor.org_id, application_id).await?;
    if application.status == candidate_applications::Status::Interview {
        let mut active: candidate_applications::ActiveModel = application.into();
        active.status = Set(candidate_applications::Status::Screening);
        active.updated_at = Set(ts);
        active.update(db).await.map_err(db_error)?;
    }
    info!(interview_id = %interview.id, "interview cancelled");

    let reason = interview.cancellation_reason.clone();
    let interview = single(db, interview).await?;
    let email = notice_for(company, &interview, Notice::Cancelled(reason.as_deref()));
    let email_sent = notify(mailer, email).await;
    Ok(InterviewOutcome {
        interview,
        email_sent,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn actor(role: Role) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            role,
            employee_id: None,
        }
    }

    fn booked_by(user_id: Uuid, panel: Vec<Uuid>) -> interviews::Model {
        let ts = now();
        interviews::Model {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
            candidate_id: Uuid::new_v4(),
            job_posting_id: Uuid::new_v4(),
            scheduled_by: user_id,
            scheduled_at: ts + Duration::days(1),
            duration_minutes: 60,
            interview_type: InterviewType::Phone,
            location: None,
            meeting_link: None,
            interviewers: json!(panel),
            notes: None,
            feedback: None,
            status: Status::Scheduled,
            cancellation_reason: None,
            cancelled_at: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn managers_see_only_their_own_or_panel_interviews() {
        let manager = actor(Role::Manager);
        let hr = actor(Role::Hr);
        let theirs = booked_by(manager.user_id, vec![]);
        let on_panel = booked_by(Uuid::new_v4(), vec![manager.user_id]);
        let other = booked_by(Uuid::new_v4(), vec![]);
        assert!(visible_to(&manager, &theirs));
        assert!(visible_to(&manager, &on_panel));
        assert!(!can_manage(&manager, &on_panel));
        assert!(!visible_to(&manager, &other));
        assert!(visible_to(&hr, &other) && can_manage(&hr, &other));
    }

    #[test]
    fn slots_must_be_future_and_sensibly_long() {
        let mut checks = Checks::new();
        check_slot(&mut checks, now() - Duration::hours(1), Some(10), None, None);
        let ApiError::Validation(errors) = checks.finish().unwrap_err() else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["scheduledAt", "durationMinutes"]);

        let mut checks = Checks::new();
        check_slot(&mut checks, now() + Duration::days(2), Some(45), Some("HQ"), None);
        assert!(checks.finish().is_ok());
    }
}
