use crate::models::ExchangeStatus;
use mongodb::bson::{Document, doc};
use mongodb::options::FindOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    All,
    Skills,
    Users,
    Exchanges,
}

impl SearchScope {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw.unwrap_or("all") {
            "all" => Some(SearchScope::All),
            "skills" | "skill" => Some(SearchScope::Skills),
            "users" | "user" => Some(SearchScope::Users),
            "exchanges" | "exchange" => Some(SearchScope::Exchanges),
            _ => None,
        }
    }

    pub fn includes(&self, other: SearchScope) -> bool {
        *self == SearchScope::All || *self == other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchScope::All => "all",
            SearchScope::Skills => "skills",
            SearchScope::Users => "users",
            SearchScope::Exchanges => "exchanges",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Relevance,
    Rating,
    Recent,
    Price,
}

impl SortBy {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or("relevance") {
            "rating" => SortBy::Rating,
            "recent" => SortBy::Recent,
            "price" => SortBy::Price,
            _ => SortBy::Relevance,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Relevance => "relevance",
            SortBy::Rating => "rating",
            SortBy::Recent => "recent",
            SortBy::Price => "price",
        }
    }
}

fn contains(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Case-insensitive substring match on a string or string-array field.
fn substring(term: &str) -> Document {
    doc! { "$regex": regex::escape(term), "$options": "i" }
}

/// `[{ field: /term/i }, ...]` over `fields`, for an `$or`.
pub fn text_clauses(term: &str, fields: &[&str]) -> Vec<Document> {
    fields
        .iter()
        .map(|field| {
            let mut clause = Document::new();
            clause.insert(*field, substring(term));
            clause
        })
        .collect()
}

/// Query criteria shared by the three result kinds, rendered as Mongo filters.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub term: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub rating_min: f64,
}

impl SearchFilter {
    pub fn new(term: Option<&str>, category: Option<&str>, location: Option<&str>, rating_min: f64) -> Self {
        SearchFilter {
            term: term.map(str::to_string),
            category: category.filter(|c| *c != "all").map(str::to_string),
            location: location.map(str::to_string),
            rating_min: rating_min.max(0.0),
        }
    }

    pub fn skill_query(&self) -> Document {
        let mut filter = Document::new();
        if let Some(category) = &self.category {
            filter.insert("category", category.as_str());
        }
        if self.rating_min > 0.0 {
            filter.insert("rating", doc! { "$gte": self.rating_min });
        }
        if let Some(term) = &self.term {
            filter.insert("$or", text_clauses(term, &["title", "description", "category"]));
        }
        filter
    }

    /// Public profiles only; disabled accounts never show up.
    pub fn user_query(&self) -> Document {
        let mut filter = doc! { "isActive": { "$ne": false } };
        if let Some(location) = &self.location {
            filter.insert("location", substring(location));
        }
        if self.rating_min > 0.0 {
            filter.insert("overallRating", doc! { "$gte": self.rating_min });
        }
        if let Some(term) = &self.term {
            filter.insert("$or", text_clauses(term, &["displayName", "bio", "skills"]));
        }
        filter
    }

    pub fn exchange_query(&self) -> Document {
        let mut filter = doc! { "status": ExchangeStatus::Open.as_str() };
        if let Some(term) = &self.term {
            filter.insert("$or", text_clauses(term, &["title", "description", "lookingFor", "offering"]));
        }
        filter
    }
}

impl SortBy {
    pub fn skill_sort(&self) -> Document {
        match self {
            SortBy::Rating => doc! { "rating": -1, "_id": 1 },
            SortBy::Recent => doc! { "createdAt": -1, "_id": 1 },
            SortBy::Price => doc! { "hourlyRate": 1, "_id": 1 },
            SortBy::Relevance => doc! { "_id": 1 },
        }
    }

    pub fn user_sort(&self) -> Document {
        match self {
            SortBy::Rating => doc! { "overallRating": -1, "_id": 1 },
            SortBy::Recent => doc! { "createdAt": -1, "_id": 1 },
            _ => doc! { "_id": 1 },
        }
    }

    pub fn exchange_sort(&self) -> Document {
        match self {
            SortBy::Recent => doc! { "createdAt": -1, "_id": 1 },
            _ => doc! { "_id": 1 },
        }
    }
}

/// Find options for one page; one extra row is fetched to detect a next page.
pub fn page_options(sort: Document, page: u64, limit: i64) -> FindOptions {
    FindOptions::builder()
        .sort(sort)
        .skip(page.max(1).saturating_sub(1).saturating_mul(limit as u64))
        .limit(limit + 1)
        .build()
}

/// Drops the look-ahead row fetched by [`page_options`].
pub fn split_page<T>(mut items: Vec<T>, limit: i64) -> (Vec<T>, bool) {
    let limit = limit.max(0) as usize;
    let has_more = items.len() > limit;
    items.truncate(limit);
    (items, has_more)
}

pub const MAX_SUGGESTIONS: usize = 10;
pub const MIN_SUGGESTION_QUERY: usize = 2;

/// Collects distinct candidate strings that contain the query.
pub struct Suggestions {
    needle: String,
    found: Vec<String>,
}

impl Suggestions {
    pub fn new(query: &str) -> Self {
        Suggestions {
            needle: query.to_lowercase(),
            found: Vec::new(),
        }
    }

    pub fn offer(&mut self, candidate: &str) {
        if candidate.is_empty() || !contains(candidate, &self.needle) {
            return;
        }
        if !self.found.iter().any(|s| s == candidate) {
            self.found.push(candidate.to_string());
        }
    }

    /// Exact matches first, then prefix matches, then shorter strings.
    pub fn ranked(mut self) -> Vec<String> {
        let needle = self.needle;
        self.found.sort_by_key(|s| {
            let lower = s.to_lowercase();
            (lower != needle, !lower.starts_with(&needle), s.chars().count())
        });
        self.found.truncate(MAX_SUGGESTIONS);
        self.found
    }
}
