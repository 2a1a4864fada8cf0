use crate::guards::AuthGuard;
use crate::services::GeminiService;
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank};
use log::{error, info};
use rocket::serde::json::Json;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Deserialize;

const MAX_PROMPT_CHARS: usize = 2000;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RecommendDto {
    pub prompt: Option<String>,
}

fn checked_prompt(dto: &RecommendDto) -> Result<&str, ApiError> {
    let prompt = non_blank(&dto.prompt).ok_or_else(|| ApiError::bad_request("Prompt is required"))?;
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ApiError::bad_request(format!(
            "Prompt must be at most {} characters",
            MAX_PROMPT_CHARS
        )));
    }
    Ok(prompt)
}

/// Suggests marketplace skills for a free-text request.
#[openapi(tag = "Recommendations")]
#[post("/recommend-skills", data = "<dto>")]
pub async fn recommend_skills(auth: AuthGuard, dto: Json<RecommendDto>) -> ApiResult {
    let prompt = checked_prompt(&dto)?;

    let skills = GeminiService::recommend_skills(prompt).await.map_err(|e| {
        error!("Skill recommendation failed for {}: {}", auth.user_id, e);
        ApiError::internal_error("Failed to generate skill recommendations")
    })?;

    info!("Recommended {} skills to {}", skills.len(), auth.user_id);

    Ok(Json(ApiResponse::success(serde_json::json!({ "skills": skills }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_must_be_present_and_bounded() {
        let blank = RecommendDto { prompt: Some("   ".into()) };
        assert_eq!(checked_prompt(&blank).unwrap_err().message, "Prompt is required");

        let long = RecommendDto { prompt: Some("a".repeat(MAX_PROMPT_CHARS + 1)) };
        assert!(checked_prompt(&long).is_err());

        let ok = RecommendDto { prompt: Some(" learn guitar ".into()) };
        assert_eq!(checked_prompt(&ok).unwrap(), "learn guitar");
    }
}
