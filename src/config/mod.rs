use std::env;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub blob_store_url: String,
    pub blob_store_token: String,
    pub admin_master_password: String,
    pub session_expiration_days: i64,
    pub max_upload_size_mb: usize,
}

// 端口解析失败时回退默认值，而不是拒绝启动
fn parse_port(raw: &str) -> u16 {
    raw.parse().unwrap_or(3000)
}

// 会话有效期默认一年
fn parse_session_days(raw: Option<String>) -> i64 {
    raw.and_then(|v| v.parse().ok()).unwrap_or(365)
}

// 投稿带图片，请求体上限默认放宽到1000MB
fn parse_upload_mb(raw: Option<String>) -> usize {
    raw.and_then(|v| v.parse().ok()).unwrap_or(1000)
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            server_host: env::var("SERVER_HOST")?,
            server_port: parse_port(&env::var("SERVER_PORT")?),
            api_base_uri: env::var("API_BASE_URI")?,
            blob_store_url: env::var("BLOB_STORE_URL")?,
            blob_store_token: env::var("BLOB_STORE_TOKEN")?,
            admin_master_password: env::var("ADMIN_MASTER_PASSWORD")?,
            session_expiration_days: parse_session_days(env::var("SESSION_EXPIRATION_DAYS").ok()),
            max_upload_size_mb: parse_upload_mb(env::var("MAX_UPLOAD_SIZE_MB").ok()),
        })
    }

    pub fn session_expiration(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_expiration_days)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_size_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: "postgres://localhost/nooc".into(),
            redis_url: "redis://localhost/".into(),
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            api_base_uri: "/api".into(),
            blob_store_url: "http://localhost:9000".into(),
            blob_store_token: "token".into(),
            admin_master_password: "master".into(),
            session_expiration_days: 7,
            max_upload_size_mb: 16,
        }
    }

    #[test]
    fn port_falls_back_on_garbage() {
        assert_eq!(parse_port("8080"), 8080);
        assert_eq!(parse_port("not-a-port"), 3000);
    }

    #[test]
    fn session_days_default_to_one_year() {
        assert_eq!(parse_session_days(None), 365);
        assert_eq!(parse_session_days(Some("30".into())), 30);
        assert_eq!(parse_session_days(Some("not-a-number".into())), 365);
    }

    #[test]
    fn upload_limit_defaults_and_converts_to_bytes() {
        assert_eq!(parse_upload_mb(None), 1000);
        assert_eq!(parse_upload_mb(Some("16".into())), 16);
        assert_eq!(config().max_upload_bytes(), 16 * 1024 * 1024);
    }

    #[test]
    fn session_expiration_matches_configured_days() {
        assert_eq!(config().session_expiration(), chrono::Duration::days(7));
    }
}
