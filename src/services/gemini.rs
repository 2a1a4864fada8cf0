use reqwest::Client;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::Config;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MAX_SKILLS: usize = 5;

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedSkill {
    pub name: String,
    pub title: String,
    pub description: String,
    pub rating: f64,
    pub reviews: i32,
    /// e.g. "2 hours"
    pub hourly_rate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
}

pub struct GeminiService;

impl GeminiService {
    fn client() -> Client {
        Client::new()
    }

    fn api_key() -> Result<String, String> {
        Config::gemini_api_key().ok_or_else(|| "AI service is not configured".to_string())
    }

    pub fn build_prompt(user_request: &str) -> String {
        format!(
            r#"You are an AI skill matching assistant for a skill trading platform called Skill Mint.
Based on the user's request, suggest relevant skills that would match their needs.
For each skill, provide:
1. A name for the person offering the skill
2. The skill title
3. A detailed description of the skill
4. A rating (between 4.5 and 5.0)
5. Number of reviews (between 5 and 30)
6. Hourly rate (in hours, between 1-5 hours)
7. A relevant badge for some skills (like "Popular", "New", or "Trending")

Return a JSON object {{"skills": [...]}} with 3-5 skills. Each skill should have these properties:
{{
  "name": "Person's Name",
  "title": "Skill Title",
  "description": "Detailed description",
  "rating": 4.8,
  "reviews": 15,
  "hourlyRate": "2 hours",
  "badge": "Popular" (optional)
}}

User request: {}"#,
            user_request.trim()
        )
    }

    /// Ask the model for skill recommendations matching `user_request`.
    pub async fn recommend_skills(user_request: &str) -> Result<Vec<RecommendedSkill>, String> {
        if !Config::is_gemini_enabled() {
            return Err("AI service is not configured".to_string());
        }

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_BASE,
            Config::gemini_model(),
            Self::api_key()?
        );

        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": Self::build_prompt(user_request) }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        let res = Self::client()
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Gemini request failed: {}", e))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(format!("Gemini returned {}: {}", status, text));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| format!("Gemini response was not JSON: {}", e))?;

        parse_recommendations(&payload)
    }
}

/// Pulls the skill list out of a `generateContent` response body.
pub fn parse_recommendations(payload: &Value) -> Result<Vec<RecommendedSkill>, String> {
    let text = payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| "Gemini response had no content".to_string())?;

    let output: Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| format!("Gemini output was not valid JSON: {}", e))?;

    let items = match &output {
        Value::Array(items) => items.as_slice(),
        other => other
            .get("skills")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| "Gemini output had no skills".to_string())?,
    };

    let skills: Vec<RecommendedSkill> = items
        .iter()
        .filter_map(normalize_skill)
        .take(MAX_SKILLS)
        .collect();

    if skills.is_empty() {
        return Err("Gemini output had no usable skills".to_string());
    }

    Ok(skills)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn normalize_skill(item: &Value) -> Option<RecommendedSkill> {
    let text = |key: &str| item.get(key).and_then(Value::as_str).map(str::to_string);

    let title = text("title").filter(|t| !t.trim().is_empty())?;

    let rating = item
        .get("rating")
        .and_then(Value::as_f64)
        .unwrap_or(4.5)
        .clamp(4.5, 5.0);

    let reviews = item
        .get("reviews")
        .and_then(Value::as_f64)
        .unwrap_or(5.0)
        .round()
        .clamp(5.0, 30.0) as i32;

    let hourly_rate = match item.get("hourlyRate") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => {
            let hours = n.as_f64().unwrap_or(1.0);
            if hours == 1.0 {
                "1 hour".to_string()
            } else {
                format!("{} hours", hours)
            }
        }
        _ => "1 hour".to_string(),
    };

    Some(RecommendedSkill {
        name: text("name").unwrap_or_else(|| "Skill Mint member".to_string()),
        title,
        description: text("description").unwrap_or_default(),
        rating,
        reviews,
        hourly_rate,
        badge: text("badge").filter(|b| !b.trim().is_empty()),
    })
}
