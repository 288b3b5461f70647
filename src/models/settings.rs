use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub version: String,
    pub api: ApiSettings,
    pub generation: GenerationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            api: ApiSettings::default(),
            generation: GenerationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    pub access_token: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            access_token: String::new(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub text_style: String,
    pub image_style: String,
    pub aspect_ratio: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            text_style: "casual".to_string(),
            image_style: "watercolor".to_string(),
            aspect_ratio: "1:1".to_string(),
        }
    }
}
