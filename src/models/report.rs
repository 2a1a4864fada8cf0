use crate::db;
use crate::utils::to_rfc3339;
use mongodb::bson::{DateTime, Document, oid::ObjectId};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    User,
    Skill,
    Exchange,
    Session,
    Review,
}

impl ReportType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(ReportType::User),
            "skill" => Some(ReportType::Skill),
            "exchange" => Some(ReportType::Exchange),
            "session" => Some(ReportType::Session),
            "review" => Some(ReportType::Review),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::User => "user",
            ReportType::Skill => "skill",
            ReportType::Exchange => "exchange",
            ReportType::Session => "session",
            ReportType::Review => "review",
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            ReportType::User => db::USERS,
            ReportType::Skill => db::SKILLS,
            ReportType::Exchange => db::EXCHANGES,
            ReportType::Session => db::SESSIONS,
            ReportType::Review => db::REVIEWS,
        }
    }

    /// Fields copied from the reported document into the report, so the
    /// snapshot survives later edits or deletion.
    pub fn snapshot_fields(&self) -> &'static [&'static str] {
        match self {
            ReportType::User => &["displayName", "email"],
            ReportType::Skill => &["title", "userId"],
            ReportType::Exchange => &["title", "creatorId"],
            ReportType::Session => &["skillTitle", "teacherId", "studentId"],
            ReportType::Review => &["reviewerId", "revieweeId", "rating"],
        }
    }
}

/// Copies the whitelisted fields of `item` for a report snapshot.
pub fn snapshot_item(kind: ReportType, item: &Document) -> Document {
    let mut snapshot = Document::new();
    for field in kind.snapshot_fields() {
        if let Some(value) = item.get(*field) {
            snapshot.insert(*field, value.clone());
        }
    }
    snapshot
}

/// Accounts answerable for the reported item: the user itself, or the
/// owner, participants or author named in the snapshot.
pub fn accountable_users(kind: ReportType, item_id: ObjectId, snapshot: &Document) -> Vec<ObjectId> {
    let fields: &[&str] = match kind {
        ReportType::User => return vec![item_id],
        ReportType::Skill => &["userId"],
        ReportType::Exchange => &["creatorId"],
        ReportType::Session => &["teacherId", "studentId"],
        ReportType::Review => &["reviewerId"],
    };
    fields
        .iter()
        .filter_map(|field| snapshot.get_object_id(field).ok())
        .collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    Spam,
    Inappropriate,
    Harassment,
    Fraud,
    Copyright,
    FakeProfile,
    Scam,
    Other,
}

impl ReportReason {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "spam" => Some(ReportReason::Spam),
            "inappropriate" => Some(ReportReason::Inappropriate),
            "harassment" => Some(ReportReason::Harassment),
            "fraud" => Some(ReportReason::Fraud),
            "copyright" => Some(ReportReason::Copyright),
            "fake_profile" => Some(ReportReason::FakeProfile),
            "scam" => Some(ReportReason::Scam),
            "other" => Some(ReportReason::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Reviewing,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(ReportStatus::Pending),
            "reviewing" => Some(ReportStatus::Reviewing),
            "resolved" => Some(ReportStatus::Resolved),
            "dismissed" => Some(ReportStatus::Dismissed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Reviewing => "reviewing",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Dismissed => "dismissed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub reporter_id: ObjectId,
    pub reporter_name: String,
    pub report_type: ReportType,
    pub reported_item_id: ObjectId,
    pub reported_user_id: Option<ObjectId>,
    pub reason: ReportReason,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub status: ReportStatus,
    #[serde(default)]
    pub reported_item_data: Document,
    pub admin_notes: Option<String>,
    pub action: Option<String>,
    pub reviewed_by: Option<ObjectId>,
    pub reviewed_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
pub struct ReportListQuery {
    pub admin: Option<bool>,
    pub status: Option<String>,
    #[field(name = "type")]
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportDto {
    pub report_type: Option<String>,
    pub reported_item_id: Option<String>,
    pub reported_user_id: Option<String>,
    pub reason: Option<String>,
    pub description: Option<String>,
    pub evidence: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReportDto {
    pub report_id: Option<String>,
    pub status: Option<String>,
    pub admin_notes: Option<String>,
    /// "none", "warning", "suspend", "ban" or "remove_content"
    pub action: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub id: String,
    pub reporter_id: String,
    pub reporter_name: String,
    pub report_type: ReportType,
    pub reported_item_id: String,
    pub reported_user_id: Option<String>,
    pub reason: ReportReason,
    pub description: String,
    pub evidence: Vec<String>,
    pub status: ReportStatus,
    pub reported_item_data: serde_json::Value,
    pub admin_notes: Option<String>,
    pub action: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Report> for ReportResponse {
    fn from(r: &Report) -> Self {
        ReportResponse {
            id: r.id.map(|id| id.to_hex()).unwrap_or_default(),
            reporter_id: r.reporter_id.to_hex(),
            reporter_name: r.reporter_name.clone(),
            report_type: r.report_type,
            reported_item_id: r.reported_item_id.to_hex(),
            reported_user_id: r.reported_user_id.map(|id| id.to_hex()),
            reason: r.reason,
            description: r.description.clone(),
            evidence: r.evidence.clone(),
            status: r.status,
            reported_item_data: serde_json::to_value(&r.reported_item_data)
                .unwrap_or(serde_json::Value::Null),
            admin_notes: r.admin_notes.clone(),
            action: r.action.clone(),
            reviewed_by: r.reviewed_by.map(|id| id.to_hex()),
            reviewed_at: r.reviewed_at.map(to_rfc3339),
            created_at: to_rfc3339(r.created_at),
            updated_at: to_rfc3339(r.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn unknown_enum_values_are_rejected() {
        assert_eq!(ReportReason::parse("fake_profile"), Some(ReportReason::FakeProfile));
        assert!(ReportReason::parse("rude").is_none());
        assert!(ReportType::parse("message").is_none());
        assert!(ReportStatus::parse("closed").is_none());
    }

    #[test]
    fn snapshot_keeps_whitelisted_fields_only() {
        let owner = ObjectId::new();
        let skill = doc! {
            "_id": ObjectId::new(),
            "userId": owner,
            "title": "Watercolour basics",
            "hourlyRate": 2.0,
        };

        let snapshot = snapshot_item(ReportType::Skill, &skill);
        assert_eq!(snapshot, doc! { "title": "Watercolour basics", "userId": owner });
        assert_eq!(accountable_users(ReportType::Skill, ObjectId::new(), &snapshot), vec![owner]);
    }

    #[test]
    fn exchange_owner_comes_from_creator() {
        let creator = ObjectId::new();
        let snapshot = snapshot_item(
            ReportType::Exchange,
            &doc! { "title": "Guitar for Spanish", "creatorId": creator },
        );
        assert_eq!(accountable_users(ReportType::Exchange, ObjectId::new(), &snapshot), vec![creator]);
    }

    #[test]
    fn both_session_participants_are_accountable() {
        let (teacher, student) = (ObjectId::new(), ObjectId::new());
        let snapshot = snapshot_item(
            ReportType::Session,
            &doc! { "skillTitle": "Pottery", "teacherId": teacher, "studentId": student },
        );
        assert_eq!(
            accountable_users(ReportType::Session, ObjectId::new(), &snapshot),
            vec![teacher, student]
        );
    }

    #[test]
    fn reported_user_answers_for_their_own_profile() {
        let user_id = ObjectId::new();
        let snapshot = snapshot_item(
            ReportType::User,
            &doc! { "displayName": "Sam", "email": "sam@skillmint.io", "passwordHash": "x" },
        );
        assert!(snapshot.get("passwordHash").is_none());
        assert_eq!(accountable_users(ReportType::User, user_id, &snapshot), vec![user_id]);
    }
}
