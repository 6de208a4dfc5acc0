use std::sync::Arc;

use opentelemetry::KeyValue;

use super::{BlobStore, PutOptions, RetryPolicy, StorageError};
use crate::telemetry::{BLOB_VERIFY_ATTEMPTS, BLOB_VERIFY_EXHAUSTED};

/// Writes a body and refuses to report success until the store serves it back.
#[derive(Clone)]
pub struct VerifiedWriter {
    store: Arc<dyn BlobStore>,
    policy: RetryPolicy,
}

impl VerifiedWriter {
    pub fn new(store: Arc<dyn BlobStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[tracing::instrument(
        name = "blob.verified_write",
        skip(self, content),
        fields(
            blob.store = %self.store.name(),
            blob.overwrite = options.overwrite,
            blob.content_chars = content.chars().count(),
            blob.verify_attempts,
        )
    )]
    pub async fn write(
        &self,
        key: &str,
        content: &str,
        options: PutOptions,
    ) -> Result<String, StorageError> {
        let url = self
            .store
            .put(key, content, options)
            .await
            .map_err(StorageError::Write)?;

        // Always verify against the URL this write returned, never a derived one.
        let attempts = self.verify(&url, content).await?;

        tracing::Span::current().record("blob.verify_attempts", attempts);
        tracing::info!(%url, attempts, "Blob write verified");

        Ok(url)
    }

    async fn verify(&self, url: &str, content: &str) -> Result<u32, StorageError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let store_kv = KeyValue::new("blob.store", self.store.name().to_string());

        for attempt in 1..=max_attempts {
            match self.store.get(url).await {
                Ok(body) if self.policy.accepts(content, &body) => {
                    BLOB_VERIFY_ATTEMPTS.record(f64::from(attempt), &[store_kv]);
                    return Ok(attempt);
                }
                Ok(body) => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        expected_chars = content.chars().count(),
                        actual_chars = body.chars().count(),
                        tolerance = self.policy.tolerance,
                        "Blob read-back length mismatch"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        error = %err,
                        "Blob read-back failed"
                    );
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        BLOB_VERIFY_ATTEMPTS.record(f64::from(max_attempts), &[store_kv.clone()]);
        BLOB_VERIFY_EXHAUSTED.add(1, &[store_kv]);

        Err(StorageError::Unverified {
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    /// Serves the body only after `ready_after` reads; earlier reads look truncated.
    struct EventuallyConsistentStore {
        ready_after: u32,
        reads: AtomicU32,
        read_at: Mutex<Vec<tokio::time::Instant>>,
        puts: Mutex<Vec<(String, bool)>>,
        content: Mutex<String>,
    }

    impl EventuallyConsistentStore {
        fn new(ready_after: u32) -> Self {
            Self {
                ready_after,
                reads: AtomicU32::new(0),
                read_at: Mutex::new(Vec::new()),
                puts: Mutex::new(Vec::new()),
                content: Mutex::new(String::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl BlobStore for EventuallyConsistentStore {
        async fn put(&self, key: &str, content: &str, options: PutOptions) -> anyhow::Result<String> {
            self.puts
                .lock()
                .unwrap()
                .push((key.to_string(), options.overwrite));
            *self.content.lock().unwrap() = content.to_string();
            Ok(format!("https://blob.test/{key}?v=1"))
        }

        async fn get(&self, url: &str) -> anyhow::Result<String> {
            assert!(url.ends_with("?v=1"), "must read the URL returned by put");
            self.read_at.lock().unwrap().push(tokio::time::Instant::now());
            let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            if read >= self.ready_after {
                Ok(self.content.lock().unwrap().clone())
            } else {
                Ok(String::new())
            }
        }

        async fn delete(&self, _url: &str) -> anyhow::Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "eventual"
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            multiplier: 2.0,
            max_delay: Duration::from_millis(5),
            tolerance: 0,
        }
    }

    #[tokio::test]
    async fn test_write_verified_on_first_read() {
        let store = Arc::new(EventuallyConsistentStore::new(1));
        let writer = VerifiedWriter::new(store.clone(), fast_policy(5));

        let url = writer
            .write("reports/a.txt", "Referto generato.", PutOptions::default())
            .await
            .unwrap();

        assert_eq!(url, "https://blob.test/reports/a.txt?v=1");
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_write_retries_until_content_lands() {
        let store = Arc::new(EventuallyConsistentStore::new(3));
        let writer = VerifiedWriter::new(store.clone(), fast_policy(5));

        writer
            .write("reports/a.txt", "testo", PutOptions { overwrite: true })
            .await
            .unwrap();

        assert_eq!(store.reads.load(Ordering::SeqCst), 3);
        assert_eq!(
            store.puts.lock().unwrap().as_slice(),
            &[("reports/a.txt".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_write_gives_up_after_max_attempts() {
        let store = Arc::new(EventuallyConsistentStore::new(u32::MAX));
        let writer = VerifiedWriter::new(store.clone(), fast_policy(5));

        let err = writer
            .write("reports/a.txt", "testo", PutOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Unverified { attempts: 5 }));
        assert_eq!(store.reads.load(Ordering::SeqCst), 5);
        assert_eq!(store.puts.lock().unwrap().len(), 1, "put is never repeated");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_between_reads_never_shrinks() {
        let store = Arc::new(EventuallyConsistentStore::new(u32::MAX));
        let policy = RetryPolicy {
            tolerance: 0,
            ..RetryPolicy::default()
        };
        let writer = VerifiedWriter::new(store.clone(), policy);
        let started = tokio::time::Instant::now();

        let err = writer
            .write("reports/a.txt", "testo", PutOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Unverified { attempts: 5 }));
        assert_eq!(started.elapsed(), Duration::from_millis(500 + 1000 + 2000 + 4000));

        let read_at = store.read_at.lock().unwrap();
        let gaps: Vec<Duration> = read_at.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
            ]
        );
        assert!(gaps.windows(2).all(|w| w[0] <= w[1]));
    }
}
