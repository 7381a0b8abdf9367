use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    pub resp_data: Option<T>,
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: 0,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

pub fn error_to_api_response<T>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code,
        msg,
        resp_data: None,
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const USER_EXISTS: i32 = 1001;
    pub const AUTH_FAILED: i32 = 1002;
    pub const PERMISSION_DENIED: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const INTERNAL_ERROR: i32 = 5000;
}

/// 从房间名中提取 `#标签`，与前端展示使用同一规则：
/// `#` 后跟随的连续非空白、非 `#` 字符构成一个标签。
/// 重复出现的标签按出现次数统计，因此不去重。
pub fn extract_tags(name: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut rest = name;
    while let Some(pos) = rest.find('#') {
        let after = &rest[pos + 1..];
        let end = after
            .find(|c: char| c.is_whitespace() || c == '#')
            .unwrap_or(after.len());
        if end > 0 {
            tags.push(format!("#{}", &after[..end]));
        }
        rest = &after[end..];
    }
    tags
}

/// 去掉标签后的展示用房间名
pub fn strip_tags(name: &str) -> String {
    let mut out = String::new();
    let mut rest = name;
    while let Some(pos) = rest.find('#') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let end = after
            .find(|c: char| c.is_whitespace() || c == '#')
            .unwrap_or(after.len());
        if end == 0 {
            // 孤立的 '#'，原样保留
            out.push('#');
        }
        rest = &after[end..];
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// 转义LIKE模式里的元字符，让搜索词按字面子串匹配
pub fn escape_like(filter: &str) -> String {
    filter
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// 对象存储中的图片键：posts/{毫秒时间戳}-{文件名}
pub fn blob_key(filename: &str) -> String {
    format!("posts/{}-{}", Utc::now().timestamp_millis(), filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_tags_basic() {
        assert_eq!(
            extract_tags("Art #sketch #ink"),
            vec!["#sketch".to_string(), "#ink".to_string()]
        );
    }

    #[test]
    fn extract_tags_none() {
        assert!(extract_tags("plain room name").is_empty());
    }

    #[test]
    fn extract_tags_adjacent_hashes() {
        // "##tag" 中第一个 '#' 不构成标签
        assert_eq!(extract_tags("##tag"), vec!["#tag".to_string()]);
    }

    #[test]
    fn extract_tags_keeps_duplicates() {
        assert_eq!(extract_tags("#a x #a"), vec!["#a".to_string(), "#a".to_string()]);
    }

    #[test]
    fn extract_tags_multibyte() {
        assert_eq!(extract_tags("絵の部屋 #イラスト"), vec!["#イラスト".to_string()]);
    }

    #[test]
    fn strip_tags_basic() {
        assert_eq!(strip_tags("Art #sketch #ink"), "Art");
        assert_eq!(strip_tags("#only"), "");
        assert_eq!(strip_tags("no tags here"), "no tags here");
    }

    #[test]
    fn escape_like_neutralizes_metacharacters() {
        assert_eq!(escape_like("a%b"), "a\\%b");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn blob_key_prefix() {
        let key = blob_key("cat.png");
        assert!(key.starts_with("posts/"));
        assert!(key.ends_with("-cat.png"));
    }

    #[test]
    fn api_response_shape() {
        let Json(ok) = success_to_api_response(serde_json::json!({"x": 1}));
        assert_eq!(ok.code, error_codes::SUCCESS);
        assert_eq!(ok.msg, "success");
        assert!(ok.resp_data.is_some());

        let Json(err) = error_to_api_response::<()>(error_codes::NOT_FOUND, "missing".into());
        assert_eq!(err.code, error_codes::NOT_FOUND);
        assert!(err.resp_data.is_none());
    }
}
