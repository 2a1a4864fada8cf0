use crate::db::{self, DbConn};
use crate::guards::{AdminGuard, AuthGuard};
use crate::models::{
    Exchange, LedgerEntry, LedgerEntryResponse, Review, ReviewResponse, Session, Skill, TransactionType, User,
};
use crate::services::analytics::{
    Timeframe, average_skill_rating, earnings_by_day, exchange_stats, most_popular_skill, recent_activity,
    review_averages, session_stats,
};
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank, to_rfc3339};
use mongodb::bson::{DateTime, Document, doc, oid::ObjectId};
use mongodb::options::FindOptions;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
pub struct AnalyticsQuery {
    pub timeframe: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PlatformStatsDto {
    pub timeframe: Option<String>,
}

async fn newest_first<T>(db: &DbConn, collection: &str, filter: Document) -> Result<Vec<T>, ApiError>
where
    T: serde::de::DeserializeOwned + Unpin + Send + Sync,
{
    let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();
    Ok(db.collection::<T>(collection).find(filter, options).await?.try_collect().await?)
}

fn earning_types() -> Vec<&'static str> {
    TransactionType::EARNINGS.iter().map(|t| t.as_str()).collect()
}

/// Distinct participants across the given sessions.
fn active_participants(sessions: &[Session]) -> usize {
    sessions
        .iter()
        .flat_map(|s| [s.teacher_id, s.student_id])
        .collect::<HashSet<ObjectId>>()
        .len()
}

#[openapi(tag = "Analytics")]
#[get("/analytics?<query..>")]
pub async fn user_analytics(auth: AuthGuard, db: &State<DbConn>, query: AnalyticsQuery) -> ApiResult {
    let timeframe = Timeframe::parse(non_blank(&query.timeframe));
    let now = DateTime::now();
    let since = doc! { "$gte": timeframe.start(now) };
    let me = auth.user_id;

    let user = db
        .collection::<User>(db::USERS)
        .find_one(doc! { "_id": me }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let skills: Vec<Skill> = newest_first(db, db::SKILLS, doc! { "userId": me }).await?;
    let taught: Vec<Session> =
        newest_first(db, db::SESSIONS, doc! { "teacherId": me, "createdAt": since.clone() }).await?;
    let learned: Vec<Session> =
        newest_first(db, db::SESSIONS, doc! { "studentId": me, "createdAt": since.clone() }).await?;
    let exchanges: Vec<Exchange> =
        newest_first(db, db::EXCHANGES, doc! { "creatorId": me, "createdAt": since.clone() }).await?;
    let earnings: Vec<LedgerEntry> = newest_first(
        db,
        db::TRANSACTIONS,
        doc! { "userId": me, "type": { "$in": earning_types() }, "createdAt": since.clone() },
    )
    .await?;
    let received: Vec<Review> =
        newest_first(db, db::REVIEWS, doc! { "revieweeId": me, "createdAt": since.clone() }).await?;
    let given: Vec<Review> = newest_first(db, db::REVIEWS, doc! { "reviewerId": me, "createdAt": since }).await?;

    let as_teacher = session_stats(&taught, now);
    let as_student = session_stats(&learned, now);
    let earned_in_period: f64 = earnings.iter().map(|e| e.amount).sum();
    let received_stats = review_averages(&received);
    let given_stats = review_averages(&given);

    let skills_breakdown: Vec<serde_json::Value> = skills
        .iter()
        .map(|s| {
            serde_json::json!({
                "id": s.id.map(|id| id.to_hex()).unwrap_or_default(),
                "title": s.title,
                "category": s.category,
                "rating": s.rating,
                "reviewCount": s.review_count,
                "hourlyRate": s.hourly_rate,
            })
        })
        .collect();

    let analytics = serde_json::json!({
        "overview": {
            "totalEarnings": user.total_earned,
            "currentBalance": user.hour_balance,
            "totalSessions": taught.len() + learned.len(),
            "averageRating": user.overall_rating,
            "totalReviews": user.total_reviews,
        },
        "skills": {
            "totalSkills": skills.len(),
            "averageRating": average_skill_rating(&skills),
            "mostPopularSkill": most_popular_skill(&skills).map(crate::models::SkillResponse::from),
            "skillsBreakdown": skills_breakdown,
        },
        "sessions": {
            "asTeacher": {
                "total": as_teacher.total,
                "completed": as_teacher.completed,
                "upcoming": as_teacher.upcoming,
                "pending": as_teacher.pending,
                "totalHoursTaught": as_teacher.total_hours,
            },
            "asStudent": {
                "total": as_student.total,
                "completed": as_student.completed,
                "upcoming": as_student.upcoming,
                "pending": as_student.pending,
                "totalHoursLearned": as_student.total_hours,
            },
        },
        "exchanges": exchange_stats(&exchanges),
        "earnings": {
            "totalInPeriod": earned_in_period,
            "averagePerSession": if earnings.is_empty() { 0.0 } else { earned_in_period / earnings.len() as f64 },
            "chartData": earnings_by_day(&earnings),
            "recentTransactions": earnings.iter().take(10).map(LedgerEntryResponse::from).collect::<Vec<_>>(),
        },
        "reviews": {
            "received": {
                "total": received_stats.total,
                "averageRating": received_stats.average_rating,
                "averageSessionQuality": received_stats.average_session_quality,
                "averagePunctuality": received_stats.average_punctuality,
                "averageCommunication": received_stats.average_communication,
                "recent": received.iter().take(5).map(ReviewResponse::from).collect::<Vec<_>>(),
            },
            "given": {
                "total": given_stats.total,
                "averageRating": given_stats.average_rating,
            },
        },
        "recentActivity": recent_activity(&taught, &learned, &exchanges, &received),
    });

    Ok(Json(ApiResponse::success(serde_json::json!({
        "analytics": analytics,
        "timeframe": timeframe.as_str(),
        "generatedAt": to_rfc3339(now),
    }))))
}

#[openapi(tag = "Analytics")]
#[post("/analytics", data = "<dto>")]
pub async fn platform_analytics(_admin: AdminGuard, db: &State<DbConn>, dto: Json<PlatformStatsDto>) -> ApiResult {
    let timeframe = Timeframe::parse(non_blank(&dto.timeframe));
    let now = DateTime::now();
    let since = doc! { "$gte": timeframe.start(now) };

    let total_users = db.collection::<Document>(db::USERS).count_documents(None, None).await?;
    let total_skills = db.collection::<Document>(db::SKILLS).count_documents(None, None).await?;
    let total_exchanges = db.collection::<Document>(db::EXCHANGES).count_documents(None, None).await?;
    let total_sessions = db.collection::<Document>(db::SESSIONS).count_documents(None, None).await?;

    let new_users = db
        .collection::<Document>(db::USERS)
        .count_documents(doc! { "createdAt": since.clone() }, None)
        .await?;

    let recent_sessions: Vec<Session> = newest_first(db, db::SESSIONS, doc! { "createdAt": since }).await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "platformStats": {
            "totalUsers": total_users,
            "totalSkills": total_skills,
            "totalExchanges": total_exchanges,
            "totalSessions": total_sessions,
            "newUsersInPeriod": new_users,
            "activeUsersInPeriod": active_participants(&recent_sessions),
        },
        "timeframe": timeframe.as_str(),
        "generatedAt": to_rfc3339(now),
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earnings_filter_uses_credit_types() {
        assert_eq!(earning_types(), vec!["session_earning", "exchange_completion", "bonus"]);
    }
}
