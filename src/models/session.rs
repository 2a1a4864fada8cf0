use crate::utils::to_rfc3339;
use mongodb::bson::{DateTime, oid::ObjectId};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Requested,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Requested => "requested",
            SessionStatus::Confirmed => "confirmed",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    /// requested -> confirmed | cancelled
    /// confirmed -> in_progress | completed | cancelled
    /// in_progress -> completed | cancelled
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Requested, Confirmed)
                | (Requested, Cancelled)
                | (Confirmed, InProgress)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    #[default]
    Exchange,
    Paid,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub teacher_id: ObjectId,
    pub teacher_name: String,
    pub student_id: ObjectId,
    pub student_name: String,
    pub skill_id: ObjectId,
    pub skill_title: String,
    pub exchange_id: Option<ObjectId>,
    pub scheduled_at: DateTime,
    /// Minutes.
    pub duration: i32,
    pub session_type: SessionType,
    pub hourly_rate: f64,
    pub total_cost: f64,
    #[serde(default)]
    pub message: String,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
    pub status: SessionStatus,
    pub cancelled_by: Option<ObjectId>,
    pub cancelled_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Session {
    pub fn is_participant(&self, user_id: &ObjectId) -> bool {
        &self.teacher_id == user_id || &self.student_id == user_id
    }

    /// The participant on the other side of `user_id`.
    pub fn counterpart(&self, user_id: &ObjectId) -> ObjectId {
        if &self.teacher_id == user_id {
            self.student_id
        } else {
            self.teacher_id
        }
    }
}

/// Paid sessions cost `rate * duration / 60` hours; exchange sessions are free.
pub fn session_cost(session_type: SessionType, hourly_rate: f64, duration_minutes: i32) -> f64 {
    match session_type {
        SessionType::Paid => hourly_rate * (duration_minutes as f64 / 60.0),
        SessionType::Exchange => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionView {
    All,
    Upcoming,
    Past,
    Requests,
}

impl SessionView {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or("all") {
            "upcoming" => SessionView::Upcoming,
            "past" => SessionView::Past,
            "requests" => SessionView::Requests,
            _ => SessionView::All,
        }
    }

    pub fn includes(&self, session: &Session, now: DateTime) -> bool {
        match self {
            SessionView::All => true,
            SessionView::Upcoming => session.scheduled_at > now && !session.status.is_terminal(),
            SessionView::Past => {
                session.scheduled_at < now || session.status == SessionStatus::Completed
            }
            SessionView::Requests => session.status == SessionStatus::Requested,
        }
    }
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
pub struct SessionListQuery {
    /// "all", "upcoming", "past" or "requests"
    #[field(name = "type")]
    #[serde(rename = "type")]
    pub view: Option<String>,
    /// "all", "teacher" or "student"
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionDto {
    pub teacher_id: Option<String>,
    pub skill_id: Option<String>,
    pub exchange_id: Option<String>,
    pub scheduled_at: Option<String>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes"))]
    pub duration: Option<i32>,
    pub message: Option<String>,
    pub session_type: Option<SessionType>,
    #[validate(range(min = 0.0, message = "Hourly rate cannot be negative"))]
    pub hourly_rate: Option<f64>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionDto {
    pub id: Option<String>,
    pub status: Option<SessionStatus>,
    pub scheduled_at: Option<String>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes"))]
    pub duration: Option<i32>,
    pub message: Option<String>,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: String,
    pub teacher_id: String,
    pub teacher_name: String,
    pub student_id: String,
    pub student_name: String,
    pub skill_id: String,
    pub skill_title: String,
    pub exchange_id: Option<String>,
    pub scheduled_at: String,
    pub duration: i32,
    pub session_type: SessionType,
    pub hourly_rate: f64,
    pub total_cost: f64,
    pub message: String,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
    pub status: SessionStatus,
    pub cancelled_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Session> for SessionResponse {
    fn from(s: &Session) -> Self {
        SessionResponse {
            id: s.id.map(|id| id.to_hex()).unwrap_or_default(),
            teacher_id: s.teacher_id.to_hex(),
            teacher_name: s.teacher_name.clone(),
            student_id: s.student_id.to_hex(),
            student_name: s.student_name.clone(),
            skill_id: s.skill_id.to_hex(),
            skill_title: s.skill_title.clone(),
            exchange_id: s.exchange_id.map(|id| id.to_hex()),
            scheduled_at: to_rfc3339(s.scheduled_at),
            duration: s.duration,
            session_type: s.session_type,
            hourly_rate: s.hourly_rate,
            total_cost: s.total_cost,
            message: s.message.clone(),
            meeting_link: s.meeting_link.clone(),
            notes: s.notes.clone(),
            status: s.status,
            cancelled_by: s.cancelled_by.map(|id| id.to_hex()),
            created_at: to_rfc3339(s.created_at),
            updated_at: to_rfc3339(s.updated_at),
        }
    }
}
