//! Firebase Realtime Database REST 写入
//!
//! `PUT {base_url}/{root}/{key}.json`, 请求体为 JSON 字符串

use std::time::Duration;

use super::{RemoteStore, StoreError};

pub const DEFAULT_ROOT: &str = "street_limit_speed";

pub struct FirebaseStore {
    agent: ureq::Agent,
    base_url: String,
    root: String,
}

impl FirebaseStore {
    pub fn new(base_url: impl Into<String>, root: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            root: root.into(),
        }
    }

    /// Firebase 键不允许 `.` `$` `#` `[` `]` `/`, 统一做百分号编码
    pub fn url_for(&self, key: &str) -> Result<String, StoreError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        let encoded = urlencoding::encode(key).replace('.', "%2E");
        Ok(format!("{}/{}/{}.json", self.base_url, self.root, encoded))
    }
}

impl RemoteStore for FirebaseStore {
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let url = self.url_for(key)?;
        let body = serde_json::to_string(value)?;
        self.agent
            .put(&url)
            .set("Content-Type", "application/json")
            .send_string(&body)
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encodes_key() {
        let store = FirebaseStore::new("https://demo.firebaseio.com/", DEFAULT_ROOT);
        assert_eq!(
            store.url_for("Main St. #5").unwrap(),
            "https://demo.firebaseio.com/street_limit_speed/Main%20St%2E%20%235.json"
        );
    }

    #[test]
    fn test_empty_key_rejected() {
        let store = FirebaseStore::new("https://demo.firebaseio.com", DEFAULT_ROOT);
        assert!(matches!(store.url_for("  "), Err(StoreError::EmptyKey)));
    }
}
