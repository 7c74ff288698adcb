//! Per-task, per-domain cookie key/value store. This sits above
//! `reqwest`'s own jar: the factory's `reqwest::Client` handles the wire
//! protocol, while checkout/monitor state machines use this to persist and
//! recall application-level cookie state across requests and retries
//! (e.g. a Shopify `_shopify_y` or `checkout_token` surviving a
//! checkpoint retry) without depending on a live client being around.

use std::collections::HashMap;

use dashmap::DashMap;

#[derive(Default)]
pub struct CookieStore {
    entries: DashMap<(String, String), HashMap<String, String>>,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `cookies` into the existing set for `(task_id, domain)`.
    pub fn save(&self, task_id: &str, domain: &str, cookies: HashMap<String, String>) {
        let key = (task_id.to_string(), domain.to_string());
        self.entries.entry(key).or_default().extend(cookies);
    }

    pub fn load(&self, task_id: &str, domain: &str) -> HashMap<String, String> {
        let key = (task_id.to_string(), domain.to_string());
        self.entries.get(&key).map(|e| e.clone()).unwrap_or_default()
    }

    /// Clears every domain's cookies for `task_id`.
    pub fn clear(&self, task_id: &str) {
        self.entries.retain(|(t, _), _| t != task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_merges_and_clear_empties() {
        let store = CookieStore::new();
        store.save("t", "d", HashMap::from([("a".to_string(), "1".to_string())]));
        store.save("t", "d", HashMap::from([("b".to_string(), "2".to_string())]));

        let loaded = store.load("t", "d");
        assert_eq!(loaded.get("a").map(String::as_str), Some("1"));
        assert_eq!(loaded.get("b").map(String::as_str), Some("2"));

        store.clear("t");
        assert!(store.load("t", "d").is_empty());
    }

    #[test]
    fn distinct_tasks_are_isolated() {
        let store = CookieStore::new();
        store.save("t1", "d", HashMap::from([("a".to_string(), "1".to_string())]));
        store.save("t2", "d", HashMap::from([("a".to_string(), "2".to_string())]));
        store.clear("t1");
        assert!(store.load("t1", "d").is_empty());
        assert_eq!(store.load("t2", "d").get("a").map(String::as_str), Some("2"));
    }
}
