use std::collections::BTreeMap;

use mongodb::bson::DateTime;
use serde::Serialize;

use crate::models::{Exchange, ExchangeStatus, LedgerEntry, Review, Session, SessionStatus, Skill};
use crate::utils::to_rfc3339;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    Week,
    Month,
    Quarter,
    Year,
}

impl Timeframe {
    /// Unknown values fall back to 30 days.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or("30d") {
            "7d" => Timeframe::Week,
            "90d" => Timeframe::Quarter,
            "1y" => Timeframe::Year,
            _ => Timeframe::Month,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Week => "7d",
            Timeframe::Month => "30d",
            Timeframe::Quarter => "90d",
            Timeframe::Year => "1y",
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            Timeframe::Week => 7,
            Timeframe::Month => 30,
            Timeframe::Quarter => 90,
            Timeframe::Year => 365,
        }
    }

    pub fn start(&self, now: DateTime) -> DateTime {
        DateTime::from_millis(now.timestamp_millis() - self.days() * DAY_MS)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total: usize,
    pub completed: usize,
    pub upcoming: usize,
    pub pending: usize,
    pub total_hours: f64,
}

pub fn session_stats(sessions: &[Session], now: DateTime) -> SessionStats {
    let completed: Vec<&Session> = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed)
        .collect();

    SessionStats {
        total: sessions.len(),
        completed: completed.len(),
        upcoming: sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Confirmed && s.scheduled_at > now)
            .count(),
        pending: sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Requested)
            .count(),
        total_hours: completed.iter().map(|s| s.duration as f64).sum::<f64>() / 60.0,
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ExchangeStats {
    pub total: usize,
    pub open: usize,
    pub completed: usize,
    pub cancelled: usize,
}

pub fn exchange_stats(exchanges: &[Exchange]) -> ExchangeStats {
    let count = |status: ExchangeStatus| exchanges.iter().filter(|e| e.status == status).count();
    ExchangeStats {
        total: exchanges.len(),
        open: count(ExchangeStatus::Open),
        completed: count(ExchangeStatus::Completed),
        cancelled: count(ExchangeStatus::Cancelled),
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DailyAmount {
    pub date: String,
    pub amount: f64,
}

/// Sums ledger amounts per UTC day, oldest day first.
pub fn earnings_by_day(entries: &[LedgerEntry]) -> Vec<DailyAmount> {
    let mut by_day: BTreeMap<String, f64> = BTreeMap::new();
    for entry in entries {
        let date = to_rfc3339(entry.created_at).chars().take(10).collect::<String>();
        *by_day.entry(date).or_insert(0.0) += entry.amount;
    }
    by_day
        .into_iter()
        .map(|(date, amount)| DailyAmount { date, amount })
        .collect()
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAverages {
    pub total: usize,
    pub average_rating: f64,
    pub average_session_quality: f64,
    pub average_punctuality: f64,
    pub average_communication: f64,
}

pub fn review_averages(reviews: &[Review]) -> ReviewAverages {
    ReviewAverages {
        total: reviews.len(),
        average_rating: mean(reviews.iter().map(|r| r.rating as f64)),
        average_session_quality: mean(reviews.iter().map(|r| r.session_quality as f64)),
        average_punctuality: mean(reviews.iter().map(|r| r.punctuality as f64)),
        average_communication: mean(reviews.iter().map(|r| r.communication as f64)),
    }
}

pub fn average_skill_rating(skills: &[Skill]) -> f64 {
    mean(skills.iter().map(|s| s.rating))
}

/// The skill with the most reviews; ties keep the first listed.
pub fn most_popular_skill(skills: &[Skill]) -> Option<&Skill> {
    skills.iter().fold(None, |best: Option<&Skill>, s| match best {
        Some(b) if b.review_count >= s.review_count => Some(b),
        _ => Some(s),
    })
}

#[derive(Debug, Serialize, Clone)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip)]
    pub at: DateTime,
    pub date: String,
    pub description: String,
    pub id: String,
}

impl Activity {
    pub fn new(kind: &'static str, at: DateTime, description: String, id: String) -> Self {
        Activity {
            kind,
            at,
            date: to_rfc3339(at),
            description,
            id,
        }
    }
}

pub const ACTIVITY_PER_SOURCE: usize = 5;
pub const ACTIVITY_LIMIT: usize = 10;

/// Builds the activity timeline from each source's newest items.
pub fn recent_activity(
    taught: &[Session],
    learned: &[Session],
    exchanges: &[Exchange],
    reviews_received: &[Review],
) -> Vec<Activity> {
    let hex = |id: Option<mongodb::bson::oid::ObjectId>| id.map(|i| i.to_hex()).unwrap_or_default();

    let mut items: Vec<Activity> = Vec::new();
    items.extend(taught.iter().take(ACTIVITY_PER_SOURCE).map(|s| {
        Activity::new("session_taught", s.created_at, format!("Taught {}", s.skill_title), hex(s.id))
    }));
    items.extend(learned.iter().take(ACTIVITY_PER_SOURCE).map(|s| {
        Activity::new("session_learned", s.created_at, format!("Learned {}", s.skill_title), hex(s.id))
    }));
    items.extend(exchanges.iter().take(ACTIVITY_PER_SOURCE).map(|e| {
        Activity::new("exchange_created", e.created_at, format!("Created exchange: {}", e.title), hex(e.id))
    }));
    items.extend(reviews_received.iter().take(ACTIVITY_PER_SOURCE).map(|r| {
        Activity::new("review_received", r.created_at, format!("Received {}-star review", r.rating), hex(r.id))
    }));

    items.sort_by(|a, b| b.at.cmp(&a.at));
    items.truncate(ACTIVITY_LIMIT);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SessionType, TransactionType};
    use mongodb::bson::{Document, oid::ObjectId};

    fn session(status: SessionStatus, duration: i32, scheduled_offset_ms: i64, created: i64) -> Session {
        let now = DateTime::now();
        Session {
            id: Some(ObjectId::new()),
            teacher_id: ObjectId::new(),
            teacher_name: "T".into(),
            student_id: ObjectId::new(),
            student_name: "S".into(),
            skill_id: ObjectId::new(),
            skill_title: "Sketching".into(),
            exchange_id: None,
            scheduled_at: DateTime::from_millis(now.timestamp_millis() + scheduled_offset_ms),
            duration,
            session_type: SessionType::Exchange,
            hourly_rate: 0.0,
            total_cost: 0.0,
            message: String::new(),
            meeting_link: None,
            notes: None,
            status,
            cancelled_by: None,
            cancelled_at: None,
            created_at: DateTime::from_millis(created),
            updated_at: DateTime::from_millis(created),
        }
    }

    fn earning(amount: f64, at: &str) -> LedgerEntry {
        LedgerEntry {
            id: None,
            user_id: ObjectId::new(),
            kind: TransactionType::SessionEarning,
            amount,
            recipient_id: None,
            from_user_id: None,
            session_id: None,
            exchange_id: None,
            description: String::new(),
            metadata: Document::new(),
            balance_after: 0.0,
            status: "completed".into(),
            created_at: crate::utils::parse_timestamp(at).unwrap(),
        }
    }

    #[test]
    fn timeframe_defaults_to_thirty_days() {
        assert_eq!(Timeframe::parse(None).days(), 30);
        assert_eq!(Timeframe::parse(Some("weird")).days(), 30);
        assert_eq!(Timeframe::parse(Some("1y")).days(), 365);

        let now = DateTime::from_millis(10 * DAY_MS);
        assert_eq!(Timeframe::Week.start(now), DateTime::from_millis(3 * DAY_MS));
    }

    #[test]
    fn session_stats_count_hours_of_completed_only() {
        let sessions = vec![
            session(SessionStatus::Completed, 90, -DAY_MS, 0),
            session(SessionStatus::Completed, 30, -DAY_MS, 0),
            session(SessionStatus::Confirmed, 60, DAY_MS, 0),
            session(SessionStatus::Confirmed, 60, -DAY_MS, 0),
            session(SessionStatus::Requested, 60, DAY_MS, 0),
        ];
        let stats = session_stats(&sessions, DateTime::now());

        assert_eq!(
            stats,
            SessionStats {
                total: 5,
                completed: 2,
                upcoming: 1,
                pending: 1,
                total_hours: 2.0,
            }
        );
    }

    #[test]
    fn earnings_group_by_day_in_order() {
        let chart = earnings_by_day(&[
            earning(2.0, "2030-01-02T10:00:00Z"),
            earning(1.5, "2030-01-01T23:00:00Z"),
            earning(0.5, "2030-01-02T18:30:00Z"),
        ]);

        assert_eq!(
            chart,
            vec![
                DailyAmount { date: "2030-01-01".into(), amount: 1.5 },
                DailyAmount { date: "2030-01-02".into(), amount: 2.5 },
            ]
        );
    }

    #[test]
    fn empty_inputs_average_to_zero() {
        assert_eq!(review_averages(&[]).average_rating, 0.0);
        assert_eq!(average_skill_rating(&[]), 0.0);
        assert!(most_popular_skill(&[]).is_none());
    }

    #[test]
    fn activity_is_newest_first_and_capped() {
        let taught: Vec<Session> = (0..8)
            .map(|i| session(SessionStatus::Completed, 60, 0, i * 1000))
            .collect();
        let learned: Vec<Session> = (0..8)
            .map(|i| session(SessionStatus::Completed, 60, 0, 500 + i * 1000))
            .collect();

        let activity = recent_activity(&taught, &learned, &[], &[]);

        assert_eq!(activity.len(), ACTIVITY_LIMIT);
        assert_eq!(activity[0].kind, "session_learned");
        assert!(activity.windows(2).all(|w| w[0].at >= w[1].at));
    }
}
