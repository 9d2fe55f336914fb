//! Mock translation API for testing.
//!
//! Allows scripting per-endpoint failures and capturing calls for verification.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use medsync_types::{EndpointDescriptor, Session, TranslationRequest, TranslationResult};

use super::{EdgeHealth, TranslationApi};
use crate::error::ApiError;

/// Mock translation API for testing.
///
/// By default every translate call succeeds with `"[<target>] <content>"`,
/// no edge is healthy, and discovery returns nothing.
#[derive(Debug, Default, Clone)]
pub struct MockApi {
    inner: Arc<Mutex<MockApiInner>>,
}

#[derive(Debug, Default)]
struct MockApiInner {
    failing: HashMap<String, ApiError>,
    hanging: HashSet<String>,
    healthy_edges: HashSet<String>,
    discovered: Vec<String>,
    discover_error: Option<ApiError>,
    translate_calls: Vec<String>,
    health_calls: Vec<String>,
    discover_calls: usize,
    ended_sessions: Vec<String>,
}

impl MockApi {
    /// Create a new mock API.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockApiInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every translate call against `endpoint_id` fail with `error`.
    pub fn fail_endpoint(&self, endpoint_id: &str, error: ApiError) {
        self.lock().failing.insert(endpoint_id.to_string(), error);
    }

    /// Make translate calls against `endpoint_id` succeed again.
    pub fn restore_endpoint(&self, endpoint_id: &str) {
        let mut inner = self.lock();
        inner.failing.remove(endpoint_id);
        inner.hanging.remove(endpoint_id);
    }

    /// Make translate calls against `endpoint_id` never answer (they time out).
    pub fn hang_endpoint(&self, endpoint_id: &str) {
        self.lock().hanging.insert(endpoint_id.to_string());
    }

    /// Set the health-check outcome for an edge address.
    pub fn set_edge_health(&self, address: &str, healthy: bool) {
        let mut inner = self.lock();
        if healthy {
            inner.healthy_edges.insert(address.to_string());
        } else {
            inner.healthy_edges.remove(address);
        }
    }

    /// Addresses the cloud discovery endpoint reports.
    pub fn set_discovered(&self, addresses: &[&str]) {
        self.lock().discovered = addresses.iter().map(|a| a.to_string()).collect();
    }

    /// Make cloud discovery fail.
    pub fn fail_discovery(&self, error: ApiError) {
        self.lock().discover_error = Some(error);
    }

    /// Endpoint ids of all translate calls, in order.
    pub fn translate_calls(&self) -> Vec<String> {
        self.lock().translate_calls.clone()
    }

    /// Number of translate calls against one endpoint.
    pub fn translate_count(&self, endpoint_id: &str) -> usize {
        self.lock()
            .translate_calls
            .iter()
            .filter(|id| id.as_str() == endpoint_id)
            .count()
    }

    /// Total translate calls.
    pub fn total_translate_calls(&self) -> usize {
        self.lock().translate_calls.len()
    }

    /// Addresses health-checked so far.
    pub fn health_calls(&self) -> Vec<String> {
        self.lock().health_calls.clone()
    }

    /// Number of discovery calls.
    pub fn discover_calls(&self) -> usize {
        self.lock().discover_calls
    }

    /// Session ids that were ended.
    pub fn ended_sessions(&self) -> Vec<String> {
        self.lock().ended_sessions.clone()
    }

    /// Total network calls of any kind.
    pub fn total_calls(&self) -> usize {
        let inner = self.lock();
        inner.translate_calls.len()
            + inner.health_calls.len()
            + inner.discover_calls
            + inner.ended_sessions.len()
    }
}

#[async_trait]
impl TranslationApi for MockApi {
    async fn translate(
        &self,
        endpoint: &EndpointDescriptor,
        request: &TranslationRequest,
        timeout: Duration,
    ) -> Result<TranslationResult, ApiError> {
        let hang = {
            let mut inner = self.lock();
            inner.translate_calls.push(endpoint.id.clone());
            if let Some(error) = inner.failing.get(&endpoint.id) {
                return Err(error.clone());
            }
            inner.hanging.contains(&endpoint.id)
        };

        if hang {
            tokio::time::sleep(timeout).await;
            return Err(ApiError::Timeout);
        }

        let mut result = TranslationResult::new(&format!(
            "[{}] {}",
            request.target_language,
            request.content()
        ));
        result.confidence = Some("high".to_string());
        Ok(result)
    }

    async fn health(
        &self,
        endpoint: &EndpointDescriptor,
        _timeout: Duration,
    ) -> Result<EdgeHealth, ApiError> {
        let mut inner = self.lock();
        inner.health_calls.push(endpoint.address.clone());
        if inner.healthy_edges.contains(&endpoint.address) {
            Ok(EdgeHealth::ok())
        } else {
            Err(ApiError::Network(format!("{} unreachable", endpoint.address)))
        }
    }

    async fn discover_edge_devices(
        &self,
        _cloud: &EndpointDescriptor,
        _timeout: Duration,
    ) -> Result<Vec<String>, ApiError> {
        let mut inner = self.lock();
        inner.discover_calls += 1;
        match &inner.discover_error {
            Some(error) => Err(error.clone()),
            None => Ok(inner.discovered.clone()),
        }
    }

    async fn join_session(
        &self,
        _cloud: &EndpointDescriptor,
        session_code: &str,
        language: &str,
    ) -> Result<Session, ApiError> {
        Ok(Session::new(
            &format!("sess-{}", session_code),
            &format!("token-{}", session_code),
            language,
        ))
    }

    async fn end_session(&self, _cloud: &EndpointDescriptor, session: &Session) -> Result<(), ApiError> {
        self.lock().ended_sessions.push(session.session_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud() -> EndpointDescriptor {
        EndpointDescriptor::cloud("https://cloud.example")
    }

    #[tokio::test]
    async fn default_translation_succeeds() {
        let api = MockApi::new();
        let request = TranslationRequest::text("hello", "en", "es");
        let result = api
            .translate(&cloud(), &request, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(result.translated_text, "[es] hello");
        assert_eq!(api.translate_count("cloud"), 1);
    }

    #[tokio::test]
    async fn failing_endpoint_returns_error_and_counts() {
        let api = MockApi::new();
        api.fail_endpoint("cloud", ApiError::Network("down".into()));
        let request = TranslationRequest::text("hello", "en", "es");

        let result = api.translate(&cloud(), &request, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ApiError::Network(_))));
        assert_eq!(api.total_translate_calls(), 1);

        api.restore_endpoint("cloud");
        assert!(api
            .translate(&cloud(), &request, Duration::from_secs(1))
            .await
            .is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_endpoint_times_out() {
        let api = MockApi::new();
        api.hang_endpoint("cloud");
        let request = TranslationRequest::text("hello", "en", "es");
        let result = api.translate(&cloud(), &request, Duration::from_secs(10)).await;
        assert!(matches!(result, Err(ApiError::Timeout)));
    }

    #[tokio::test]
    async fn health_follows_script() {
        let api = MockApi::new();
        let edge = EndpointDescriptor::edge("http://10.0.0.2:3000");
        assert!(api.health(&edge, Duration::from_secs(1)).await.is_err());

        api.set_edge_health("http://10.0.0.2:3000", true);
        assert!(api.health(&edge, Duration::from_secs(1)).await.unwrap().is_ok());
        assert_eq!(api.health_calls().len(), 2);
    }
}
