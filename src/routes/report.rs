use crate::db::{self, DbConn, parse_id};
use crate::guards::{AdminGuard, AuthGuard};
use crate::models::report::{accountable_users, snapshot_item};
use crate::models::{
    CreateReportDto, Report, ReportListQuery, ReportReason, ReportResponse, ReportStatus, ReportType,
    ReviewReportDto, User,
};
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank};
use log::{info, warn};
use mongodb::bson::{DateTime, Document, doc, oid::ObjectId};
use mongodb::options::FindOptions;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket_okapi::openapi;

const ADMIN_PAGE: i64 = 100;
const OWN_PAGE: i64 = 50;

const MODERATION_ACTIONS: [&str; 5] = ["none", "warning", "suspend", "ban", "remove_content"];

/// Actions that disable the reported account.
fn disables_account(action: &str) -> bool {
    matches!(action, "suspend" | "ban")
}

/// The account a report is filed against. A supplied id must be one of the
/// item's accountable users.
fn reported_user(
    accountable: &[ObjectId],
    claimed: Option<ObjectId>,
    reporter: ObjectId,
) -> Result<Option<ObjectId>, ApiError> {
    match claimed {
        Some(id) if accountable.contains(&id) => Ok(Some(id)),
        Some(_) => Err(ApiError::bad_request("reportedUserId does not match the reported item")),
        None => Ok(accountable.iter().copied().find(|id| *id != reporter)),
    }
}

fn list_filter(reporter: Option<ObjectId>, query: &ReportListQuery) -> Result<Document, ApiError> {
    let mut filter = Document::new();
    if let Some(reporter) = reporter {
        filter.insert("reporterId", reporter);
    }

    match non_blank(&query.status) {
        None | Some("all") => {}
        Some(raw) => {
            let status = ReportStatus::parse(raw).ok_or_else(|| ApiError::bad_request("Invalid status"))?;
            filter.insert("status", status.as_str());
        }
    }

    match non_blank(&query.kind) {
        None | Some("all") => {}
        Some(raw) => {
            let kind = ReportType::parse(raw).ok_or_else(|| ApiError::bad_request("Invalid report type"))?;
            filter.insert("reportType", kind.as_str());
        }
    }

    Ok(filter)
}

#[openapi(tag = "Reports")]
#[get("/reports?<query..>")]
pub async fn list_reports(auth: AuthGuard, db: &State<DbConn>, query: ReportListQuery) -> ApiResult {
    let as_admin = query.admin.unwrap_or(false);

    if as_admin {
        let is_admin = db
            .collection::<User>(db::USERS)
            .find_one(doc! { "_id": auth.user_id }, None)
            .await?
            .is_some_and(|u| u.is_admin);
        if !is_admin {
            warn!("Non-admin {} requested all reports", auth.user_id);
            return Err(ApiError::forbidden("Admin access required"));
        }
    }

    let (reporter, limit) = if as_admin {
        (None, ADMIN_PAGE)
    } else {
        (Some(auth.user_id), OWN_PAGE)
    };

    let options = FindOptions::builder()
        .sort(doc! { "createdAt": -1 })
        .limit(limit)
        .build();

    let reports: Vec<Report> = db
        .collection::<Report>(db::REPORTS)
        .find(list_filter(reporter, &query)?, options)
        .await?
        .try_collect()
        .await?;

    let reports: Vec<ReportResponse> = reports.iter().map(ReportResponse::from).collect();

    Ok(Json(ApiResponse::success(serde_json::json!({ "reports": reports }))))
}

#[openapi(tag = "Reports")]
#[post("/reports", data = "<dto>")]
pub async fn create_report(auth: AuthGuard, db: &State<DbConn>, dto: Json<CreateReportDto>) -> ApiResult {
    let (Some(raw_type), Some(raw_item), Some(raw_reason)) = (
        non_blank(&dto.report_type),
        non_blank(&dto.reported_item_id),
        non_blank(&dto.reason),
    ) else {
        return Err(ApiError::bad_request("reportType, reportedItemId, and reason are required"));
    };

    let report_type = ReportType::parse(raw_type).ok_or_else(|| ApiError::bad_request("Invalid report type"))?;
    let reason = ReportReason::parse(raw_reason).ok_or_else(|| ApiError::bad_request("Invalid reason"))?;

    // A malformed id cannot name an existing item.
    let item_id = ObjectId::parse_str(raw_item).map_err(|_| ApiError::not_found("Reported item not found"))?;
    let reported_user_id = non_blank(&dto.reported_user_id)
        .map(|raw| parse_id(raw, "reported user ID"))
        .transpose()?;

    let item = db
        .collection::<Document>(report_type.collection())
        .find_one(doc! { "_id": item_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Reported item not found"))?;

    let reports = db.collection::<Report>(db::REPORTS);
    let duplicate = reports
        .find_one(
            doc! {
                "reporterId": auth.user_id,
                "reportedItemId": item_id,
                "reportType": report_type.as_str(),
            },
            None,
        )
        .await?;
    if duplicate.is_some() {
        return Err(ApiError::bad_request("You have already reported this item"));
    }

    let snapshot = snapshot_item(report_type, &item);
    let accountable = accountable_users(report_type, item_id, &snapshot);
    let reported_user_id = reported_user(&accountable, reported_user_id, auth.user_id).inspect_err(|_| {
        warn!("User {} named an unrelated account on a {} report", auth.user_id, report_type.as_str())
    })?;

    let now = DateTime::now();
    let report = Report {
        id: None,
        reporter_id: auth.user_id,
        reporter_name: auth.display_name().to_string(),
        report_type,
        reported_item_id: item_id,
        reported_user_id,
        reason,
        description: dto.description.clone().unwrap_or_default(),
        evidence: dto.evidence.clone().unwrap_or_default(),
        status: ReportStatus::Pending,
        reported_item_data: snapshot,
        admin_notes: None,
        action: None,
        reviewed_by: None,
        reviewed_at: None,
        created_at: now,
        updated_at: now,
    };

    let result = reports.insert_one(&report, None).await?;
    let id = result.inserted_id.as_object_id().map(|id| id.to_hex()).unwrap_or_default();

    info!("Report {} filed by {} against {} {}", id, auth.user_id, report_type.as_str(), item_id);

    Ok(Json(ApiResponse::success_with_message(
        "Report submitted successfully",
        serde_json::json!({ "reportId": id }),
    )))
}

#[openapi(tag = "Reports")]
#[put("/reports", data = "<dto>")]
pub async fn review_report(admin: AdminGuard, db: &State<DbConn>, dto: Json<ReviewReportDto>) -> ApiResult {
    let (Some(raw_id), Some(raw_status)) = (non_blank(&dto.report_id), non_blank(&dto.status)) else {
        return Err(ApiError::bad_request("reportId and status are required"));
    };

    let status = ReportStatus::parse(raw_status).ok_or_else(|| ApiError::bad_request("Invalid status"))?;
    let action = non_blank(&dto.action);
    if let Some(action) = action {
        if !MODERATION_ACTIONS.contains(&action) {
            return Err(ApiError::bad_request("Invalid action"));
        }
    }

    let report_id = parse_id(raw_id, "report ID")?;
    let reports = db.collection::<Report>(db::REPORTS);

    let report = reports
        .find_one(doc! { "_id": report_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Report not found"))?;

    let now = DateTime::now();
    let mut set = doc! {
        "status": status.as_str(),
        "reviewedBy": admin.auth.user_id,
        "reviewedAt": now,
        "updatedAt": now,
    };
    if let Some(notes) = non_blank(&dto.admin_notes) {
        set.insert("adminNotes", notes);
    }
    if let Some(action) = action {
        set.insert("action", action);
    }

    reports.update_one(doc! { "_id": report_id }, doc! { "$set": set }, None).await?;

    if let (Some(action), Some(user_id)) = (action, report.reported_user_id) {
        if disables_account(action) {
            db.collection::<User>(db::USERS)
                .update_one(
                    doc! { "_id": user_id },
                    doc! { "$set": { "isActive": false, "updatedAt": now } },
                    None,
                )
                .await?;
            warn!("User {} disabled by {} ({})", user_id, admin.auth.user_id, action);
        }
    }

    info!("Report {} marked {} by {}", report_id, status.as_str(), admin.auth.user_id);

    Ok(Json(ApiResponse::success_with_message(
        "Report updated successfully",
        serde_json::json!({}),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(status: Option<&str>, kind: Option<&str>) -> ReportListQuery {
        ReportListQuery {
            admin: None,
            status: status.map(str::to_string),
            kind: kind.map(str::to_string),
        }
    }

    #[test]
    fn own_reports_are_scoped_to_the_reporter() {
        let me = ObjectId::new();
        let filter = list_filter(Some(me), &query(Some("all"), None)).unwrap();
        assert_eq!(filter.get_object_id("reporterId").unwrap(), me);
        assert!(filter.get("status").is_none());
    }

    #[test]
    fn admin_filter_narrows_by_status_and_type() {
        let filter = list_filter(None, &query(Some("pending"), Some("skill"))).unwrap();
        assert!(filter.get("reporterId").is_none());
        assert_eq!(filter.get_str("status").unwrap(), "pending");
        assert_eq!(filter.get_str("reportType").unwrap(), "skill");
    }

    #[test]
    fn unknown_filters_are_rejected() {
        assert_eq!(list_filter(None, &query(Some("closed"), None)).unwrap_err().message, "Invalid status");
        assert_eq!(
            list_filter(None, &query(None, Some("message"))).unwrap_err().message,
            "Invalid report type"
        );
    }

    #[test]
    fn reported_user_must_answer_for_the_item() {
        let (owner, reporter, bystander) = (ObjectId::new(), ObjectId::new(), ObjectId::new());

        assert_eq!(reported_user(&[owner], None, reporter).unwrap(), Some(owner));
        assert_eq!(reported_user(&[owner], Some(owner), reporter).unwrap(), Some(owner));
        assert_eq!(
            reported_user(&[owner], Some(bystander), reporter).unwrap_err().message,
            "reportedUserId does not match the reported item"
        );
        assert!(reported_user(&[], Some(bystander), reporter).is_err());
    }

    #[test]
    fn session_reports_default_to_the_other_participant() {
        let (teacher, student) = (ObjectId::new(), ObjectId::new());
        assert_eq!(reported_user(&[teacher, student], None, teacher).unwrap(), Some(student));
        assert_eq!(reported_user(&[teacher, student], None, student).unwrap(), Some(teacher));
    }

    #[test]
    fn only_suspend_and_ban_disable_accounts() {
        assert!(disables_account("suspend"));
        assert!(disables_account("ban"));
        assert!(!disables_account("warning"));
        assert!(!disables_account("remove_content"));
    }
}
