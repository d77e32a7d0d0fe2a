use std::{fmt, sync::Arc};

use async_trait::async_trait;
use memcache::{CommandError, MemcacheError};
use time::OffsetDateTime;
use tower_sessions::{
    SessionStore,
    session::{Id, Record},
    session_store,
};

/// Memcached treats expirations above this many seconds as absolute unix timestamps.
const MAX_RELATIVE_EXPIRATION: i64 = 60 * 60 * 24 * 30;

/// MemcachedStore
///
/// A `tower_sessions::SessionStore` backed by memcached. Couchbase speaks the same
/// protocol, so a Couchbase memcached bucket works too.
///
/// Records are stored as JSON under `<namespace><session id>` with the memcached
/// expiration derived from the record's expiry date. The `memcache` client is
/// blocking, so every call runs on tokio's blocking pool.
#[derive(Clone)]
pub struct MemcachedStore {
    client: Arc<memcache::Client>,
    namespace: String,
}

impl fmt::Debug for MemcachedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemcachedStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl MemcachedStore {
    /// connect
    ///
    /// Opens the client pool against `url` (e.g. `memcache://127.0.0.1:11211`).
    /// Fails if no server answers, or if the url selects the ASCII protocol, whose
    /// `add` does not report an existing key.
    pub async fn connect(url: &str, namespace: &str) -> session_store::Result<Self> {
        if url.contains("protocol=ascii") {
            return Err(session_store::Error::Backend(
                "the ASCII memcached protocol cannot detect session id collisions".to_string(),
            ));
        }
        let url = url.to_string();
        let client = tokio::task::spawn_blocking(move || {
            memcache::Client::connect(url.as_str()).map_err(backend)
        })
        .await
        .map_err(|e| session_store::Error::Backend(e.to_string()))??;

        Ok(Self {
            client: Arc::new(client),
            namespace: namespace.to_string(),
        })
    }

    fn key(&self, id: &Id) -> String {
        session_key(&self.namespace, id)
    }

    async fn fetch(&self, key: String) -> session_store::Result<Option<String>> {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || client.get::<String>(&key).map_err(backend))
            .await
            .map_err(|e| session_store::Error::Backend(e.to_string()))?
    }

    async fn store(&self, record: &Record) -> session_store::Result<()> {
        let key = self.key(&record.id);
        let value = encode_record(record)?;
        let expiration = memcached_expiration(record.expiry_date, OffsetDateTime::now_utc());
        let client = self.client.clone();

        tokio::task::spawn_blocking(move || {
            client
                .set(&key, value.as_str(), expiration)
                .map_err(backend)
        })
        .await
        .map_err(|e| session_store::Error::Backend(e.to_string()))?
    }

    /// Writes `record` only if its key is free. `Ok(false)` means the id is taken.
    async fn insert_new(&self, record: &Record) -> session_store::Result<bool> {
        let key = self.key(&record.id);
        let value = encode_record(record)?;
        let expiration = memcached_expiration(record.expiry_date, OffsetDateTime::now_utc());
        let client = self.client.clone();

        tokio::task::spawn_blocking(move || {
            match client.add(&key, value.as_str(), expiration) {
                Ok(()) => Ok(true),
                Err(MemcacheError::CommandError(CommandError::KeyExists)) => Ok(false),
                Err(e) => Err(backend(e)),
            }
        })
        .await
        .map_err(|e| session_store::Error::Backend(e.to_string()))?
    }
}

#[async_trait]
impl SessionStore for MemcachedStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        // `add` refuses to overwrite, so a colliding id is regenerated instead.
        while !self.insert_new(record).await? {
            tracing::debug!("session id collision, regenerating");
            record.id = Id::default();
        }
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.store(record).await
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        match self.fetch(self.key(session_id)).await? {
            Some(value) => decode_record(&value).map(Some),
            None => Ok(None),
        }
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        let key = self.key(session_id);
        let client = self.client.clone();

        // `false` only means the key was already gone.
        tokio::task::spawn_blocking(move || client.delete(&key).map_err(backend))
            .await
            .map_err(|e| session_store::Error::Backend(e.to_string()))??;
        Ok(())
    }
}

fn backend(e: MemcacheError) -> session_store::Error {
    session_store::Error::Backend(e.to_string())
}

pub(crate) fn session_key(namespace: &str, id: &Id) -> String {
    format!("{namespace}{id}")
}

pub(crate) fn encode_record(record: &Record) -> session_store::Result<String> {
    serde_json::to_string(record).map_err(|e| session_store::Error::Encode(e.to_string()))
}

pub(crate) fn decode_record(value: &str) -> session_store::Result<Record> {
    serde_json::from_str(value).map_err(|e| session_store::Error::Decode(e.to_string()))
}

/// memcached_expiration
///
/// Converts an absolute expiry into memcached's expiration field: relative seconds
/// up to 30 days, an absolute unix time beyond that. Never returns 0, which
/// memcached reads as "never expire".
pub(crate) fn memcached_expiration(expiry: OffsetDateTime, now: OffsetDateTime) -> u32 {
    let remaining = (expiry - now).whole_seconds().max(1);
    if remaining <= MAX_RELATIVE_EXPIRATION {
        remaining as u32
    } else {
        u32::try_from(expiry.unix_timestamp()).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;
    use time::Duration;

    use super::*;

    fn record(expiry_date: OffsetDateTime) -> Record {
        let mut data = HashMap::new();
        data.insert("isLoggedIn".to_string(), json!(true));
        data.insert("username".to_string(), json!("alice"));
        data.insert("views".to_string(), json!(3));
        Record {
            id: Id::default(),
            data,
            expiry_date,
        }
    }

    #[test]
    fn test_short_ttl_is_relative() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(memcached_expiration(now + Duration::hours(24), now), 86_400);
    }

    #[test]
    fn test_long_ttl_is_absolute_timestamp() {
        let now = OffsetDateTime::now_utc();
        let expiry = now + Duration::days(45);
        assert_eq!(
            memcached_expiration(expiry, now),
            expiry.unix_timestamp() as u32
        );
    }

    #[test]
    fn test_past_expiry_never_means_forever() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(memcached_expiration(now - Duration::minutes(5), now), 1);
    }

    #[test]
    fn test_record_survives_encoding() {
        let original = record(OffsetDateTime::now_utc() + Duration::hours(1));
        let encoded = encode_record(&original).unwrap();
        let decoded = decode_record(&encoded).unwrap();

        assert_eq!(decoded.id, original.id);
        assert_eq!(decoded.data, original.data);
        assert!(encoded.contains("\"isLoggedIn\":true"));
    }

    #[test]
    fn test_garbage_value_is_decode_error() {
        let err = decode_record("not json").unwrap_err();
        assert!(matches!(err, session_store::Error::Decode(_)));
    }

    #[test]
    fn test_keys_are_namespaced() {
        let id = Id::default();
        assert_eq!(session_key("sessions:", &id), format!("sessions:{id}"));
    }
}
