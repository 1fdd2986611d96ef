//! Cache-or-generate orchestration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use generation_client::{validate_payload, ContentGenerator, GenerationRequest};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::content::AugmentedContent;
use crate::error::{AugmentError, Result};
use crate::flight::{wait_for_outcome, FlightMap, FlightOutcome, FlightRole};
use crate::store::ContentStore;

/// Snapshot of cache behavior, reported on the health endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AugmentStats {
    /// Requests served from the persisted cache.
    pub hits: u64,
    /// Requests that could not be served from cache, forced ones included.
    pub misses: u64,
    /// Generator invocations attempted.
    pub generations: u64,
    /// Generator invocations that failed.
    pub failures: u64,
    /// Generations currently in flight.
    pub inflight: usize,
}

#[derive(Debug, Default)]
struct AugmentCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    generations: AtomicU64,
    failures: AtomicU64,
}

/// Serves augmented content from the cache, generating on demand.
///
/// Generation for a given node is single-flight: concurrent callers share
/// one generator invocation and one persisted version. The generation task
/// is detached, so a caller that goes away mid-wait does not cancel work
/// other callers may be waiting on.
#[derive(Clone)]
pub struct Augmentor {
    store: ContentStore,
    generator: Arc<dyn ContentGenerator>,
    flights: Arc<FlightMap>,
    counters: Arc<AugmentCounters>,
}

impl Augmentor {
    pub fn new(store: ContentStore, generator: Arc<dyn ContentGenerator>) -> Self {
        Self {
            store,
            generator,
            flights: Arc::new(FlightMap::new()),
            counters: Arc::new(AugmentCounters::default()),
        }
    }

    /// Return content for a node, generating it if the cache has none.
    ///
    /// With `force` set the cache is bypassed and a new version is always
    /// generated; a failure then surfaces as an error. Without it, a failed
    /// generation falls back to the latest persisted version when one
    /// appeared in the meantime.
    pub async fn get_or_generate(&self, node_id: &str, force: bool) -> Result<AugmentedContent> {
        if !force {
            if let Some(existing) = self.store.latest(node_id).await? {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(node_id = %node_id, version = existing.content_version, "cache hit");
                return Ok(existing);
            }
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        match self.join_flight(node_id, force).await? {
            FlightOutcome::Generated(content) => Ok(content),
            FlightOutcome::Failed(message) => {
                if !force {
                    if let Some(stale) = self.store.latest(node_id).await? {
                        warn!(
                            node_id = %node_id,
                            version = stale.content_version,
                            "generation failed, serving stale content"
                        );
                        return Ok(stale);
                    }
                }
                Err(AugmentError::Generation(message))
            }
        }
    }

    pub fn stats(&self) -> AugmentStats {
        AugmentStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            generations: self.counters.generations.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            inflight: self.flights.len(),
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Lead or follow the flight for `node_id` and await its outcome.
    ///
    /// A forced caller never adopts the outcome of a flight it merely
    /// followed. That flight may have served already-cached content, so the
    /// caller loops and leads its own once the slot frees up.
    async fn join_flight(&self, node_id: &str, force: bool) -> Result<FlightOutcome> {
        loop {
            match self.flights.join(node_id) {
                FlightRole::Leader(ticket) => {
                    let receiver = ticket.subscribe();
                    let service = self.clone();
                    let node = node_id.to_string();
                    // Detached on purpose: dropping a waiter must not
                    // cancel a generation others are waiting on.
                    tokio::spawn(async move {
                        let outcome = service.run_flight(&node, force).await;
                        service.flights.complete(ticket, outcome);
                    });
                    return wait_for_outcome(receiver).await;
                }
                FlightRole::Follower(receiver) => {
                    let outcome = wait_for_outcome(receiver).await?;
                    if force {
                        continue;
                    }
                    return Ok(outcome);
                }
            }
        }
    }

    /// The leader's work: generate, validate, persist, and report the
    /// outcome.
    async fn run_flight(&self, node_id: &str, force: bool) -> FlightOutcome {
        if !force {
            // The cache may have been filled between the caller's miss and
            // this flight starting.
            match self.store.latest(node_id).await {
                Ok(Some(existing)) => return FlightOutcome::Generated(existing),
                Ok(None) => {}
                Err(e) => return FlightOutcome::Failed(e.to_string()),
            }
        }

        // Safe to reserve before generating: flights for one node never
        // overlap, so nobody else takes this number.
        let version = match self.store.next_version(node_id).await {
            Ok(version) => version,
            Err(e) => return FlightOutcome::Failed(e.to_string()),
        };

        self.counters.generations.fetch_add(1, Ordering::Relaxed);
        let request = GenerationRequest::new(node_id);
        let payload = match self.generator.generate(&request).await {
            Ok(payload) => payload,
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(node_id = %node_id, error = %e, "generation failed");
                return FlightOutcome::Failed(e.to_string());
            }
        };

        // Generator output is untrusted whatever sits behind the trait.
        // Malformed payloads are rejected here, never persisted.
        if let Err(e) = validate_payload(&payload, &request.schema.sections) {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
            warn!(node_id = %node_id, error = %e, "generator output rejected");
            return FlightOutcome::Failed(e.to_string());
        }

        let content = AugmentedContent::from_payload(node_id, version, payload);
        if let Err(e) = self.store.insert(&content).await {
            // The generated content is still good; waiters get it from
            // memory even though this version was never written.
            error!(node_id = %node_id, version, error = %e, "cache write failed");
            return FlightOutcome::Generated(content);
        }

        info!(node_id = %node_id, version, "content generated");
        FlightOutcome::Generated(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use async_trait::async_trait;
    use futures::future::join_all;
    use generation_client::{
        GeneratedPayload, GeneratedSections, GenerationError, UsageExample,
    };
    use tokio::time::sleep;

    struct ScriptedGenerator {
        calls: AtomicU64,
        delay: Duration,
        fail: bool,
        malformed: bool,
    }

    impl ScriptedGenerator {
        fn succeeding() -> Self {
            Self {
                calls: AtomicU64::new(0),
                delay: Duration::ZERO,
                fail: false,
                malformed: false,
            }
        }

        fn succeeding_after(delay: Duration) -> Self {
            Self {
                calls: AtomicU64::new(0),
                delay,
                fail: false,
                malformed: false,
            }
        }

        fn failing_after(delay: Duration) -> Self {
            Self {
                calls: AtomicU64::new(0),
                delay,
                fail: true,
                malformed: false,
            }
        }

        fn malformed() -> Self {
            Self {
                calls: AtomicU64::new(0),
                delay: Duration::ZERO,
                fail: false,
                malformed: true,
            }
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> std::result::Result<GeneratedPayload, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            if self.fail {
                return Err(GenerationError::Api {
                    status: 500,
                    message: "scripted failure".to_string(),
                });
            }
            if self.malformed {
                // Unexpanded template and an impossible confidence.
                return Ok(GeneratedPayload {
                    sections: GeneratedSections {
                        definitions: vec!["the {word} runs".to_string()],
                        examples: vec![UsageExample {
                            sentence: "犬が走る。".to_string(),
                            translation: "The dog runs.".to_string(),
                        }],
                        cultural_notes: Some("note".to_string()),
                        study_tips: Some("tip".to_string()),
                    },
                    model: "lexigen-small".to_string(),
                    confidence: 2.0,
                });
            }
            Ok(GeneratedPayload {
                sections: GeneratedSections {
                    definitions: vec![format!("definition {call} for {}", request.node_id)],
                    examples: vec![UsageExample {
                        sentence: "犬が走る。".to_string(),
                        translation: "The dog runs.".to_string(),
                    }],
                    cultural_notes: Some("Dogs are a common companion animal.".to_string()),
                    study_tips: Some("Drill alongside 猫.".to_string()),
                },
                model: "lexigen-small".to_string(),
                confidence: 0.9,
            })
        }
    }

    async fn augmentor(generator: Arc<ScriptedGenerator>) -> Augmentor {
        let store = ContentStore::in_memory().await.unwrap();
        Augmentor::new(store, generator)
    }

    fn seeded_content(node_id: &str, version: i64) -> AugmentedContent {
        AugmentedContent::from_payload(
            node_id,
            version,
            GeneratedPayload {
                sections: GeneratedSections {
                    definitions: vec!["seeded".to_string()],
                    examples: Vec::new(),
                    cultural_notes: None,
                    study_tips: None,
                },
                model: "seed".to_string(),
                confidence: 0.5,
            },
        )
    }

    #[tokio::test]
    async fn test_cache_hit_skips_generator() {
        let generator = Arc::new(ScriptedGenerator::succeeding());
        let augmentor = augmentor(generator.clone()).await;
        augmentor.store().insert(&seeded_content("犬", 1)).await.unwrap();

        let content = augmentor.get_or_generate("犬", false).await.unwrap();
        assert_eq!(content.content_version, 1);
        assert_eq!(content.sections.definitions, vec!["seeded".to_string()]);
        assert_eq!(generator.calls(), 0);
        assert_eq!(augmentor.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_miss_generates_and_persists() {
        let generator = Arc::new(ScriptedGenerator::succeeding());
        let augmentor = augmentor(generator.clone()).await;

        let content = augmentor.get_or_generate("犬", false).await.unwrap();
        assert_eq!(content.content_version, 1);
        assert_eq!(generator.calls(), 1);

        let persisted = augmentor.store().latest("犬").await.unwrap().unwrap();
        assert_eq!(persisted.id, content.id);
        assert_eq!(persisted.sections, content.sections);
    }

    #[tokio::test]
    async fn test_second_caller_hits_cache() {
        let generator = Arc::new(ScriptedGenerator::succeeding());
        let augmentor = augmentor(generator.clone()).await;

        let first = augmentor.get_or_generate("犬", false).await.unwrap();
        let second = augmentor.get_or_generate("犬", false).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(generator.calls(), 1);

        let stats = augmentor.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.generations, 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_generation() {
        let generator = Arc::new(ScriptedGenerator::succeeding_after(Duration::from_millis(100)));
        let augmentor = augmentor(generator.clone()).await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let augmentor = augmentor.clone();
                tokio::spawn(async move { augmentor.get_or_generate("犬", false).await })
            })
            .collect();

        let results = join_all(tasks).await;
        let mut ids = Vec::new();
        for result in results {
            let content = result.unwrap().unwrap();
            assert_eq!(content.content_version, 1);
            ids.push(content.id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(generator.calls(), 1);
        assert_eq!(augmentor.stats().inflight, 0);
    }

    #[tokio::test]
    async fn test_force_appends_new_version_and_keeps_history() {
        let generator = Arc::new(ScriptedGenerator::succeeding());
        let augmentor = augmentor(generator.clone()).await;

        let first = augmentor.get_or_generate("犬", false).await.unwrap();
        sleep(Duration::from_millis(5)).await;
        let second = augmentor.get_or_generate("犬", true).await.unwrap();

        assert_eq!(first.content_version, 1);
        assert_eq!(second.content_version, 2);
        assert!(second.generated_at > first.generated_at);
        assert_eq!(generator.calls(), 2);

        let history = augmentor.store().history("犬").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, first.id);
    }

    #[tokio::test]
    async fn test_force_failure_surfaces_error_and_keeps_cache() {
        let generator = Arc::new(ScriptedGenerator::failing_after(Duration::ZERO));
        let augmentor = augmentor(generator.clone()).await;
        augmentor.store().insert(&seeded_content("犬", 1)).await.unwrap();

        let err = augmentor.get_or_generate("犬", true).await.unwrap_err();
        assert!(matches!(err, AugmentError::Generation(ref m) if m.contains("scripted failure")));

        let latest = augmentor.store().latest("犬").await.unwrap().unwrap();
        assert_eq!(latest.content_version, 1);
        assert_eq!(augmentor.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_failure_without_cache_propagates() {
        let generator = Arc::new(ScriptedGenerator::failing_after(Duration::ZERO));
        let augmentor = augmentor(generator.clone()).await;

        let err = augmentor.get_or_generate("犬", false).await.unwrap_err();
        assert!(matches!(err, AugmentError::Generation(_)));
    }

    #[tokio::test]
    async fn test_malformed_output_is_rejected_not_cached() {
        let generator = Arc::new(ScriptedGenerator::malformed());
        let augmentor = augmentor(generator.clone()).await;

        let err = augmentor.get_or_generate("犬", false).await.unwrap_err();
        assert!(matches!(err, AugmentError::Generation(_)));
        assert_eq!(generator.calls(), 1);

        // Nothing reached the store.
        assert!(augmentor.store().latest("犬").await.unwrap().is_none());
        assert_eq!(augmentor.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_follower_falls_back_to_content_persisted_during_flight() {
        let generator = Arc::new(ScriptedGenerator::failing_after(Duration::from_millis(300)));
        let augmentor = augmentor(generator.clone()).await;

        let forcer = {
            let augmentor = augmentor.clone();
            tokio::spawn(async move { augmentor.get_or_generate("犬", true).await })
        };
        sleep(Duration::from_millis(50)).await;

        let follower = {
            let augmentor = augmentor.clone();
            tokio::spawn(async move { augmentor.get_or_generate("犬", false).await })
        };
        sleep(Duration::from_millis(50)).await;

        // Another writer lands a version while the failing flight is up.
        augmentor.store().insert(&seeded_content("犬", 1)).await.unwrap();

        let forced = forcer.await.unwrap();
        assert!(matches!(forced, Err(AugmentError::Generation(_))));

        let fallback = follower.await.unwrap().unwrap();
        assert_eq!(fallback.content_version, 1);
        assert_eq!(fallback.sections.definitions, vec!["seeded".to_string()]);
    }

    #[tokio::test]
    async fn test_aborted_waiter_does_not_cancel_generation() {
        let generator = Arc::new(ScriptedGenerator::succeeding_after(Duration::from_millis(100)));
        let augmentor = augmentor(generator.clone()).await;

        let waiter = {
            let augmentor = augmentor.clone();
            tokio::spawn(async move { augmentor.get_or_generate("犬", false).await })
        };
        sleep(Duration::from_millis(20)).await;
        assert_eq!(augmentor.stats().inflight, 1);
        waiter.abort();

        sleep(Duration::from_millis(200)).await;
        let persisted = augmentor.store().latest("犬").await.unwrap().unwrap();
        assert_eq!(persisted.content_version, 1);
        assert_eq!(generator.calls(), 1);
        assert_eq!(augmentor.stats().inflight, 0);
    }

    #[tokio::test]
    async fn test_forced_caller_never_adopts_a_cache_serving_flight() {
        let generator = Arc::new(ScriptedGenerator::succeeding_after(Duration::from_millis(100)));
        let augmentor = augmentor(generator.clone()).await;

        // A non-forced flight is in the air.
        let miss = {
            let augmentor = augmentor.clone();
            tokio::spawn(async move { augmentor.get_or_generate("犬", false).await })
        };
        sleep(Duration::from_millis(20)).await;

        let forced = augmentor.get_or_generate("犬", true).await.unwrap();
        let missed = miss.await.unwrap().unwrap();

        // The forced caller waited the first flight out, then ran its own.
        assert_eq!(missed.content_version, 1);
        assert_eq!(forced.content_version, 2);
        assert_eq!(generator.calls(), 2);
    }
}
