use crate::db::{self, DbConn};
use crate::models::{Exchange, ExchangeResponse, PublicUser, Skill, SkillResponse, User};
use crate::services::search::{
    MIN_SUGGESTION_QUERY, SearchFilter, SearchScope, SortBy, Suggestions, page_options, split_page,
};
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank};
use mongodb::bson::Document;
use mongodb::options::FindOptions;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Deserialize;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
/// Matching documents read per collection when building suggestions.
const SUGGESTION_SCAN: i64 = 50;

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub q: Option<String>,
    #[field(name = "type")]
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    #[field(name = "ratingMin")]
    pub rating_min: Option<f64>,
    #[field(name = "sortBy")]
    pub sort_by: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SuggestDto {
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

async fn load<T>(db: &DbConn, collection: &str, filter: Document, options: FindOptions) -> Result<Vec<T>, ApiError>
where
    T: serde::de::DeserializeOwned + Unpin + Send + Sync,
{
    Ok(db.collection::<T>(collection).find(filter, options).await?.try_collect().await?)
}

#[openapi(tag = "Search")]
#[get("/search?<query..>")]
pub async fn search(db: &State<DbConn>, query: SearchQuery) -> ApiResult {
    let scope = SearchScope::parse(non_blank(&query.kind)).ok_or_else(|| ApiError::bad_request("Invalid search type"))?;
    let term = non_blank(&query.q);

    if term.is_none() && scope == SearchScope::All {
        return Err(ApiError::bad_request("Search query is required"));
    }

    let sort = SortBy::parse(non_blank(&query.sort_by));
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let rating_min = query.rating_min.unwrap_or(0.0);
    let filter = SearchFilter::new(term, non_blank(&query.category), non_blank(&query.location), rating_min);

    let mut has_more = false;
    let mut skills = Vec::new();
    let mut users = Vec::new();
    let mut exchanges = Vec::new();

    if scope.includes(SearchScope::Skills) {
        let found: Vec<Skill> =
            load(db, db::SKILLS, filter.skill_query(), page_options(sort.skill_sort(), page, limit)).await?;
        let (page_items, more) = split_page(found, limit);
        has_more |= more;
        skills = page_items.iter().map(SkillResponse::from).collect();
    }

    if scope.includes(SearchScope::Users) {
        let found: Vec<User> =
            load(db, db::USERS, filter.user_query(), page_options(sort.user_sort(), page, limit)).await?;
        let (page_items, more) = split_page(found, limit);
        has_more |= more;
        users = page_items.iter().map(PublicUser::from).collect();
    }

    if scope.includes(SearchScope::Exchanges) {
        let found: Vec<Exchange> =
            load(db, db::EXCHANGES, filter.exchange_query(), page_options(sort.exchange_sort(), page, limit)).await?;
        let (page_items, more) = split_page(found, limit);
        has_more |= more;
        exchanges = page_items.iter().map(ExchangeResponse::from).collect();
    }

    let total_results = skills.len() + users.len() + exchanges.len();

    Ok(Json(ApiResponse::success(serde_json::json!({
        "results": {
            "skills": skills,
            "users": users,
            "exchanges": exchanges,
            "totalResults": total_results,
        },
        "query": term,
        "filters": {
            "type": scope.as_str(),
            "category": filter.category,
            "location": non_blank(&query.location),
            "ratingMin": rating_min,
            "sortBy": sort.as_str(),
        },
        "pagination": {
            "page": page,
            "limit": limit,
            "hasMore": has_more,
        },
    }))))
}

/// Autocomplete over skill, user and open exchange text.
#[openapi(tag = "Search")]
#[post("/search", data = "<dto>")]
pub async fn suggest(db: &State<DbConn>, dto: Json<SuggestDto>) -> ApiResult {
    let term = non_blank(&dto.query).unwrap_or_default();
    if term.chars().count() < MIN_SUGGESTION_QUERY {
        return Ok(Json(ApiResponse::success(serde_json::json!({ "suggestions": [] }))));
    }

    let scope = SearchScope::parse(non_blank(&dto.kind)).ok_or_else(|| ApiError::bad_request("Invalid search type"))?;
    let mut suggestions = Suggestions::new(term);
    let matching = SearchFilter::new(Some(term), None, None, 0.0);
    let scan = || FindOptions::builder().limit(SUGGESTION_SCAN).build();

    if scope.includes(SearchScope::Skills) {
        for skill in load::<Skill>(db, db::SKILLS, matching.skill_query(), scan()).await? {
            suggestions.offer(&skill.title);
            suggestions.offer(&skill.category);
        }
    }

    if scope.includes(SearchScope::Users) {
        for user in load::<User>(db, db::USERS, matching.user_query(), scan()).await? {
            suggestions.offer(&user.display_name);
            for skill in &user.skills {
                suggestions.offer(skill);
            }
        }
    }

    if scope.includes(SearchScope::Exchanges) {
        for exchange in load::<Exchange>(db, db::EXCHANGES, matching.exchange_query(), scan()).await? {
            suggestions.offer(&exchange.title);
            suggestions.offer(&exchange.offering);
            suggestions.offer(&exchange.looking_for);
        }
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "suggestions": suggestions.ranked()
    }))))
}
