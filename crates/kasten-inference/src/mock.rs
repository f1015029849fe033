//! Deterministic mock backend for tests.
//!
//! Embeddings are derived from a stable hash of the input text, so the
//! same text always embeds to the same vector. Generation replies are
//! scripted: queued responses are returned in order, then the fixed
//! default. A failure flag turns every call into an error for exercising
//! degradation paths.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use kasten_core::{EmbeddingBackend, Error, GenerationBackend, Result, Vector};

/// Scriptable mock implementing both backend traits.
#[derive(Clone)]
pub struct MockBackend {
    inner: Arc<Mutex<MockState>>,
    dimension: usize,
}

struct MockState {
    queued_responses: VecDeque<String>,
    default_response: String,
    fail: bool,
    generate_calls: Vec<String>,
    embed_calls: usize,
}

impl MockBackend {
    /// Create a mock with the given embedding dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                queued_responses: VecDeque::new(),
                default_response: "{}".to_string(),
                fail: false,
                generate_calls: Vec::new(),
                embed_calls: 0,
            })),
            dimension,
        }
    }

    /// Set the fallback generation response.
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        self.inner.lock().unwrap().default_response = response.into();
        self
    }

    /// Queue a one-shot generation response.
    pub fn push_response(&self, response: impl Into<String>) {
        self.inner
            .lock()
            .unwrap()
            .queued_responses
            .push_back(response.into());
    }

    /// Make every subsequent call fail.
    pub fn set_failing(&self, fail: bool) {
        self.inner.lock().unwrap().fail = fail;
    }

    /// Prompts passed to `generate_with_system`, in order.
    pub fn generate_calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().generate_calls.clone()
    }

    /// Number of `embed_texts` calls.
    pub fn embed_call_count(&self) -> usize {
        self.inner.lock().unwrap().embed_calls
    }

    fn hash_vector(&self, text: &str) -> Vector {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        // Cheap xorshift expansion of the seed into a unit-ish vector.
        let mut state = seed | 1;
        let mut values = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            values.push(((state % 2000) as f32 / 1000.0) - 1.0);
        }
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt().max(1e-6);
        Vector::from(values.into_iter().map(|v| v / norm).collect::<Vec<_>>())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(8)
    }
}

#[async_trait]
impl EmbeddingBackend for MockBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        {
            let mut state = self.inner.lock().unwrap();
            if state.fail {
                return Err(Error::Embedding("mock failure".to_string()));
            }
            state.embed_calls += 1;
        }
        Ok(texts.iter().map(|t| self.hash_vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        let mut state = self.inner.lock().unwrap();
        if state.fail {
            return Err(Error::Inference("mock failure".to_string()));
        }
        state.generate_calls.push(prompt.to_string());
        Ok(state
            .queued_responses
            .pop_front()
            .unwrap_or_else(|| state.default_response.clone()))
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embeddings_are_deterministic() {
        let backend = MockBackend::new(16);
        let a = backend.embed_texts(&["hello".to_string()]).await.unwrap();
        let b = backend.embed_texts(&["hello".to_string()]).await.unwrap();
        let c = backend.embed_texts(&["world".to_string()]).await.unwrap();
        assert_eq!(a[0].as_slice(), b[0].as_slice());
        assert_ne!(a[0].as_slice(), c[0].as_slice());
        assert_eq!(a[0].as_slice().len(), 16);
    }

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let backend = MockBackend::default().with_default_response("default");
        backend.push_response("first");
        backend.push_response("second");

        assert_eq!(backend.generate_with_system("s", "p1").await.unwrap(), "first");
        assert_eq!(backend.generate_with_system("s", "p2").await.unwrap(), "second");
        assert_eq!(backend.generate_with_system("s", "p3").await.unwrap(), "default");
        assert_eq!(backend.generate_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_mode() {
        let backend = MockBackend::default();
        backend.set_failing(true);
        assert!(backend.embed_texts(&["x".to_string()]).await.is_err());
        assert!(backend.generate_with_system("s", "p").await.is_err());
        backend.set_failing(false);
        assert!(backend.generate_with_system("s", "p").await.is_ok());
    }
}
