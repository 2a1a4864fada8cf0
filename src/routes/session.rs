use crate::db::{self, DbConn, parse_id};
use crate::guards::AuthGuard;
use crate::models::{
    CreateSessionDto, IdQuery, Notification, Session, SessionListQuery, SessionResponse, SessionStatus,
    SessionView, Skill, UpdateSessionDto, User, session_cost,
};
use crate::services::Notifier;
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank, parse_timestamp};
use log::{info, warn};
use mongodb::bson::{DateTime, Document, doc, oid::ObjectId};
use mongodb::options::FindOptions;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use validator::Validate;

/// Who hears about a status change, and what they are told.
fn status_notice(session: &Session, actor: &ObjectId, next: SessionStatus) -> Option<(ObjectId, &'static str, String)> {
    let skill = &session.skill_title;
    match next {
        SessionStatus::Confirmed => Some((
            session.student_id,
            "Session Confirmed",
            format!("Your session for {} has been confirmed", skill),
        )),
        SessionStatus::Cancelled => Some((
            session.counterpart(actor),
            "Session Cancelled",
            format!("Your session for {} has been cancelled", skill),
        )),
        SessionStatus::Completed => Some((
            session.counterpart(actor),
            "Session Completed",
            format!("Your session for {} has been completed", skill),
        )),
        _ => None,
    }
}

/// Time and length changes only apply to live sessions and must stay in the future.
fn check_reschedule(
    status: SessionStatus,
    scheduled_at: Option<DateTime>,
    duration: Option<i32>,
    now: DateTime,
) -> Result<(), ApiError> {
    if scheduled_at.is_none() && duration.is_none() {
        return Ok(());
    }
    if status.is_terminal() {
        return Err(ApiError::bad_request(format!(
            "Cannot reschedule a {} session",
            status.as_str()
        )));
    }
    if scheduled_at.is_some_and(|at| at <= now) {
        return Err(ApiError::bad_request("Scheduled time must be in the future"));
    }
    Ok(())
}

async fn participant_session(db: &DbConn, session_id: ObjectId, user_id: &ObjectId, verb: &str) -> Result<Session, ApiError> {
    let session = db
        .collection::<Session>(db::SESSIONS)
        .find_one(doc! { "_id": session_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    if !session.is_participant(user_id) {
        warn!("User {} tried to {} session {}", user_id, verb, session_id);
        return Err(ApiError::forbidden(format!("Unauthorized to {} this session", verb)));
    }

    Ok(session)
}

#[openapi(tag = "Sessions")]
#[get("/sessions?<query..>")]
pub async fn list_sessions(auth: AuthGuard, db: &State<DbConn>, query: SessionListQuery) -> ApiResult {
    let filter = match query.role.as_deref().unwrap_or("all") {
        "teacher" => doc! { "teacherId": auth.user_id },
        "student" => doc! { "studentId": auth.user_id },
        _ => doc! { "$or": [ { "teacherId": auth.user_id }, { "studentId": auth.user_id } ] },
    };

    let options = FindOptions::builder().sort(doc! { "scheduledAt": -1 }).build();

    let sessions: Vec<Session> = db
        .collection::<Session>(db::SESSIONS)
        .find(filter, options)
        .await?
        .try_collect()
        .await?;

    let view = SessionView::parse(query.view.as_deref());
    let now = DateTime::now();

    let sessions: Vec<SessionResponse> = sessions
        .iter()
        .filter(|s| view.includes(s, now))
        .map(SessionResponse::from)
        .collect();

    Ok(Json(ApiResponse::success(serde_json::json!({ "sessions": sessions }))))
}

#[openapi(tag = "Sessions")]
#[post("/sessions", data = "<dto>")]
pub async fn create_session(auth: AuthGuard, db: &State<DbConn>, dto: Json<CreateSessionDto>) -> ApiResult {
    let (Some(teacher_raw), Some(skill_raw), Some(scheduled_raw), Some(duration)) = (
        non_blank(&dto.teacher_id),
        non_blank(&dto.skill_id),
        non_blank(&dto.scheduled_at),
        dto.duration,
    ) else {
        return Err(ApiError::bad_request(
            "teacherId, skillId, scheduledAt, and duration are required",
        ));
    };

    dto.validate()?;

    let teacher_id = parse_id(teacher_raw, "teacher ID")?;
    let skill_id = parse_id(skill_raw, "skill ID")?;
    let exchange_id = non_blank(&dto.exchange_id)
        .map(|raw| parse_id(raw, "exchange ID"))
        .transpose()?;
    let scheduled_at = parse_timestamp(scheduled_raw)
        .ok_or_else(|| ApiError::bad_request("scheduledAt must be an RFC 3339 timestamp"))?;

    if teacher_id == auth.user_id {
        return Err(ApiError::bad_request("You cannot book a session with yourself"));
    }

    let teacher = db
        .collection::<User>(db::USERS)
        .find_one(doc! { "_id": teacher_id }, None)
        .await?;
    let skill = db
        .collection::<Skill>(db::SKILLS)
        .find_one(doc! { "_id": skill_id }, None)
        .await?;

    let (Some(teacher), Some(skill)) = (teacher, skill) else {
        return Err(ApiError::not_found("Teacher or skill not found"));
    };

    let now = DateTime::now();
    if scheduled_at <= now {
        return Err(ApiError::bad_request("Scheduled time must be in the future"));
    }

    let session_type = dto.session_type.unwrap_or_default();
    let hourly_rate = dto.hourly_rate.unwrap_or(skill.hourly_rate);

    let mut session = Session {
        id: None,
        teacher_id,
        teacher_name: teacher.display_name.clone(),
        student_id: auth.user_id,
        student_name: auth.display_name().to_string(),
        skill_id,
        skill_title: skill.title.clone(),
        exchange_id,
        scheduled_at,
        duration,
        session_type,
        hourly_rate,
        total_cost: session_cost(session_type, hourly_rate, duration),
        message: dto.message.as_deref().unwrap_or_default().trim().to_string(),
        meeting_link: None,
        notes: None,
        status: SessionStatus::Requested,
        cancelled_by: None,
        cancelled_at: None,
        created_at: now,
        updated_at: now,
    };

    let result = db
        .collection::<Session>(db::SESSIONS)
        .insert_one(&session, None)
        .await?;
    let session_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Session insert returned no id"))?;
    session.id = Some(session_id);

    Notifier::notify(
        db,
        Notification::new(
            teacher_id,
            "session_request",
            "New Session Request",
            format!("{} has requested a session for {}", auth.display_name(), skill.title),
        )
        .with_data(doc! { "sessionId": session_id.to_hex(), "studentId": auth.user_id.to_hex() })
        .with_action_url(format!("/sessions/{}", session_id.to_hex())),
    )
    .await;

    info!("Session {} requested by {} with {}", session_id, auth.user_id, teacher_id);

    Ok(Json(ApiResponse::success_with_message(
        "Session request created successfully",
        serde_json::json!({
            "id": session_id.to_hex(),
            "session": SessionResponse::from(&session),
        }),
    )))
}

#[openapi(tag = "Sessions")]
#[put("/sessions", data = "<dto>")]
pub async fn update_session(auth: AuthGuard, db: &State<DbConn>, dto: Json<UpdateSessionDto>) -> ApiResult {
    let raw_id = non_blank(&dto.id).ok_or_else(|| ApiError::bad_request("Session ID is required"))?;
    let session_id = parse_id(raw_id, "session ID")?;
    dto.validate()?;

    let scheduled_at = non_blank(&dto.scheduled_at)
        .map(|raw| {
            parse_timestamp(raw).ok_or_else(|| ApiError::bad_request("scheduledAt must be an RFC 3339 timestamp"))
        })
        .transpose()?;

    let session = participant_session(db, session_id, &auth.user_id, "update").await?;

    let now = DateTime::now();
    check_reschedule(session.status, scheduled_at, dto.duration, now)?;

    let mut set = Document::new();

    if let Some(next) = dto.status.filter(|next| *next != session.status) {
        if !session.status.can_transition_to(next) {
            return Err(ApiError::bad_request(format!(
                "Cannot change session from {} to {}",
                session.status.as_str(),
                next.as_str()
            )));
        }
        set.insert("status", next.as_str());
        if next == SessionStatus::Cancelled {
            set.insert("cancelledBy", auth.user_id);
            set.insert("cancelledAt", now);
        }
    }
    if let Some(at) = scheduled_at {
        set.insert("scheduledAt", at);
    }
    if let Some(duration) = dto.duration {
        set.insert("duration", duration);
        set.insert("totalCost", session_cost(session.session_type, session.hourly_rate, duration));
    }
    if let Some(message) = &dto.message {
        set.insert("message", message.trim());
    }
    if let Some(link) = &dto.meeting_link {
        set.insert("meetingLink", link.trim());
    }
    if let Some(notes) = &dto.notes {
        set.insert("notes", notes.trim());
    }
    set.insert("updatedAt", now);

    db.collection::<Session>(db::SESSIONS)
        .update_one(doc! { "_id": session_id }, doc! { "$set": set }, None)
        .await?;

    if let Some(next) = dto.status.filter(|next| *next != session.status) {
        info!("Session {} moved {} -> {}", session_id, session.status.as_str(), next.as_str());

        if let Some((recipient, title, message)) = status_notice(&session, &auth.user_id, next) {
            Notifier::notify(
                db,
                Notification::new(recipient, "session_update", title, message)
                    .with_data(doc! { "sessionId": session_id.to_hex(), "status": next.as_str() })
                    .with_action_url(format!("/sessions/{}", session_id.to_hex())),
            )
            .await;
        }
    }

    Ok(Json(ApiResponse::success_with_message(
        "Session updated successfully",
        serde_json::json!({ "id": session_id.to_hex() }),
    )))
}

/// Cancels the session; the document is kept.
#[openapi(tag = "Sessions")]
#[delete("/sessions?<query..>")]
pub async fn cancel_session(auth: AuthGuard, db: &State<DbConn>, query: IdQuery) -> ApiResult {
    let raw_id = non_blank(&query.id).ok_or_else(|| ApiError::bad_request("Session ID is required"))?;
    let session_id = parse_id(raw_id, "session ID")?;

    let session = participant_session(db, session_id, &auth.user_id, "delete").await?;

    if session.status.is_terminal() {
        return Err(ApiError::bad_request(format!(
            "Session is already {}",
            session.status.as_str()
        )));
    }

    let now = DateTime::now();
    db.collection::<Session>(db::SESSIONS)
        .update_one(
            doc! { "_id": session_id },
            doc! { "$set": {
                "status": SessionStatus::Cancelled.as_str(),
                "cancelledBy": auth.user_id,
                "cancelledAt": now,
                "updatedAt": now,
            } },
            None,
        )
        .await?;

    Notifier::notify(
        db,
        Notification::new(
            session.counterpart(&auth.user_id),
            "session_cancelled",
            "Session Cancelled",
            format!("Your session for {} has been cancelled", session.skill_title),
        )
        .with_data(doc! { "sessionId": session_id.to_hex() }),
    )
    .await;

    info!("Session {} cancelled by {}", session_id, auth.user_id);

    Ok(Json(ApiResponse::success_with_message(
        "Session cancelled successfully",
        serde_json::json!({}),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionType;

    fn session() -> Session {
        let now = DateTime::now();
        Session {
            id: Some(ObjectId::new()),
            teacher_id: ObjectId::new(),
            teacher_name: "Teacher".into(),
            student_id: ObjectId::new(),
            student_name: "Student".into(),
            skill_id: ObjectId::new(),
            skill_title: "Calligraphy".into(),
            exchange_id: None,
            scheduled_at: now,
            duration: 60,
            session_type: SessionType::Exchange,
            hourly_rate: 1.0,
            total_cost: 0.0,
            message: String::new(),
            meeting_link: None,
            notes: None,
            status: SessionStatus::Requested,
            cancelled_by: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn confirmation_always_goes_to_the_student() {
        let s = session();
        let (to, title, message) = status_notice(&s, &s.teacher_id, SessionStatus::Confirmed).unwrap();
        assert_eq!(to, s.student_id);
        assert_eq!(title, "Session Confirmed");
        assert_eq!(message, "Your session for Calligraphy has been confirmed");
    }

    #[test]
    fn cancellation_goes_to_the_other_side() {
        let s = session();
        let (to, _, _) = status_notice(&s, &s.student_id, SessionStatus::Cancelled).unwrap();
        assert_eq!(to, s.teacher_id);
        let (to, _, _) = status_notice(&s, &s.teacher_id, SessionStatus::Completed).unwrap();
        assert_eq!(to, s.student_id);
    }

    #[test]
    fn finished_sessions_cannot_be_rescheduled() {
        let now = DateTime::now();
        let later = DateTime::from_millis(now.timestamp_millis() + 3_600_000);

        for status in [SessionStatus::Completed, SessionStatus::Cancelled] {
            let err = check_reschedule(status, Some(later), None, now).unwrap_err();
            assert_eq!(err.message, format!("Cannot reschedule a {} session", status.as_str()));
            assert!(check_reschedule(status, None, Some(30), now).is_err());
        }
        assert!(check_reschedule(SessionStatus::Completed, None, None, now).is_ok());
    }

    #[test]
    fn reschedules_must_land_in_the_future() {
        let now = DateTime::now();
        let earlier = DateTime::from_millis(now.timestamp_millis() - 60_000);
        let later = DateTime::from_millis(now.timestamp_millis() + 60_000);

        assert_eq!(
            check_reschedule(SessionStatus::Confirmed, Some(earlier), None, now).unwrap_err().message,
            "Scheduled time must be in the future"
        );
        assert!(check_reschedule(SessionStatus::Requested, Some(later), Some(45), now).is_ok());
        assert!(check_reschedule(SessionStatus::InProgress, None, Some(90), now).is_ok());
    }

    #[test]
    fn starting_a_session_is_silent() {
        let s = session();
        assert!(status_notice(&s, &s.teacher_id, SessionStatus::InProgress).is_none());
    }
}
