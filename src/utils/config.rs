use crate::models::Settings;

const ENV_API_BASE: &str = "DIARY_API_BASE";
const ENV_ACCESS_TOKEN: &str = "DIARY_ACCESS_TOKEN";

pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

pub fn api_base_from_env() -> Option<String> {
    std::env::var(ENV_API_BASE).ok().map(|v| v.trim().trim_end_matches('/').to_string()).filter(|v| !v.is_empty())
}

pub fn access_token_from_env() -> Option<String> {
    std::env::var(ENV_ACCESS_TOKEN).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn apply_env_defaults(settings: &mut Settings) {
    if let Some(base) = api_base_from_env() {
        settings.api.base_url = base;
    }
    if settings.api.access_token.trim().is_empty() {
        settings.api.access_token = access_token_from_env().unwrap_or_default();
    }
}
