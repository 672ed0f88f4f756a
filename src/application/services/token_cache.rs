use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct CacheEntry {
    token: String,
    expires_at: Instant,
}

/// 短 TTL 令牌缓存，仅为减少存储往返；永远不是数据源
///
/// 条目数量由少量已知服务决定，无需按数量淘汰。
pub struct TokenCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// 命中且未过期时返回令牌；过期条目就地剔除
    pub async fn get(&self, service_name: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        match entries.get(service_name) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.token.clone()),
            Some(_) => {
                entries.remove(service_name);
                None
            }
            None => None,
        }
    }

    pub async fn put(&self, service_name: &str, token: &str) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            service_name.to_string(),
            CacheEntry {
                token: token.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub async fn invalidate(&self, service_name: &str) {
        let mut entries = self.entries.lock().await;
        entries.remove(service_name);
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_within_ttl() {
        let cache = TokenCache::new(Duration::from_secs(60));
        cache.put("openai", "sk-test").await;
        assert_eq!(cache.get("openai").await.as_deref(), Some("sk-test"));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = TokenCache::new(Duration::from_millis(20));
        cache.put("openai", "sk-test").await;

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("openai").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = TokenCache::new(Duration::from_secs(60));
        cache.put("openai", "sk-test").await;
        cache.invalidate("openai").await;
        assert!(cache.get("openai").await.is_none());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let cache = TokenCache::new(Duration::from_secs(60));
        cache.put("openai", "sk-1").await;
        cache.put("sendgrid", "sg-1").await;
        cache.clear().await;
        assert!(cache.get("openai").await.is_none());
        assert!(cache.get("sendgrid").await.is_none());
    }

    #[tokio::test]
    async fn unknown_service_is_a_miss() {
        let cache = TokenCache::new(Duration::from_secs(60));
        assert!(cache.get("nope").await.is_none());
    }
}
