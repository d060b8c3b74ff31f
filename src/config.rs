use dotenvy::dotenv;
use secrecy::SecretString;
use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub mongo_conn_string: SecretString,
    pub mongo_db_name: String,
    /// Interactive authoring rejects exams whose start time already passed.
    pub reject_past_exam_start: bool,
    pub pass_threshold: f64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            mongo_conn_string: SecretString::from(
                env::var("MONGO_CONN_STRING")
                    .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            ),
            mongo_db_name: env::var("MONGO_DB_NAME")
                .unwrap_or_else(|_| "exam-engine-local".to_string()),
            reject_past_exam_start: env::var("EXAM_REJECT_PAST_START")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(true),
            pass_threshold: env::var("EXAM_PASS_THRESHOLD")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|t| (0.0..=1.0).contains(t))
                .unwrap_or(0.5),
        }
    }

    pub fn test_config() -> Self {
        Self {
            mongo_conn_string: SecretString::from("mongodb://localhost:27017".to_string()),
            mongo_db_name: "exam-engine-test".to_string(),
            reject_past_exam_start: true,
            pass_threshold: 0.5,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
