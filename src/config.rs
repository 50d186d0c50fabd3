use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub uploads: UploadConfig,
    pub avatars: AvatarConfig,
    pub per_page: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub secret_key: String,
    /// Password reset token lifetime in seconds.
    pub reset_token_ttl: i64,
    /// Login session lifetime in seconds.
    pub session_ttl: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub allowed_extensions: Vec<String>,
    pub max_content_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarConfig {
    pub dir: PathBuf,
    pub allowed_extensions: Vec<String>,
    /// Side length of the stored square avatar, in pixels.
    pub size: u32,
}

const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "odt", "ods", "odp", "txt", "rtf", "jpg",
    "jpeg", "png", "gif", "svg", "mp3", "wav", "m4a", "mp4", "mov", "avi", "wmv", "mkv", "zip",
];

const ALLOWED_AVATAR_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let upload_dir = PathBuf::from(
            env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploaded_files".to_string()),
        );
        let avatar_dir = upload_dir.join("avatars");

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:data/teachshare.db".to_string()),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },
            security: SecurityConfig {
                secret_key: env::var("SECRET_KEY")
                    .unwrap_or_else(|_| "you-will-never-guess".to_string()),
                reset_token_ttl: env::var("RESET_TOKEN_TTL")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .unwrap_or(600),
                session_ttl: env::var("SESSION_TTL")
                    .unwrap_or_else(|_| (30 * 24 * 3600).to_string())
                    .parse()
                    .unwrap_or(30 * 24 * 3600),
            },
            uploads: UploadConfig {
                dir: upload_dir,
                allowed_extensions: ALLOWED_UPLOAD_EXTENSIONS
                    .iter()
                    .map(|e| e.to_string())
                    .collect(),
                max_content_length: env::var("MAX_CONTENT_LENGTH")
                    .unwrap_or_else(|_| (512 * 1024 * 1024).to_string())
                    .parse()
                    .unwrap_or(512 * 1024 * 1024),
            },
            avatars: AvatarConfig {
                dir: avatar_dir,
                allowed_extensions: ALLOWED_AVATAR_EXTENSIONS
                    .iter()
                    .map(|e| e.to_string())
                    .collect(),
                size: env::var("AVATAR_SIZE")
                    .unwrap_or_else(|_| "128".to_string())
                    .parse()
                    .unwrap_or(128),
            },
            per_page: env::var("PER_PAGE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
