use async_trait::async_trait;

use crate::{Request, Response};

// ---------------------------------------------------------------------------
// ProviderAdapter
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn complete(&self, request: &Request)
        -> Result<Response, rightsizer_types::RightsizerError>;
    fn name(&self) -> &str;
    fn default_model(&self) -> &str;
    fn context_window_size(&self) -> usize;
}

// ---------------------------------------------------------------------------
// DynProvider
// ---------------------------------------------------------------------------

pub struct DynProvider(Box<dyn ProviderAdapter>);

impl std::fmt::Debug for DynProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DynProvider").field(&self.0.name()).finish()
    }
}

impl DynProvider {
    pub fn new(provider: impl ProviderAdapter + 'static) -> Self {
        Self(Box::new(provider))
    }

    pub async fn complete(
        &self,
        request: &Request,
    ) -> Result<Response, rightsizer_types::RightsizerError> {
        self.0.complete(request).await
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn default_model(&self) -> &str {
        self.0.default_model()
    }

    pub fn context_window_size(&self) -> usize {
        self.0.context_window_size()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FinishReason, Message, Usage};

    struct MockProvider;

    #[async_trait]
    impl ProviderAdapter for MockProvider {
        async fn complete(
            &self,
            _request: &Request,
        ) -> Result<Response, rightsizer_types::RightsizerError> {
            Ok(Response {
                id: "mock-resp-1".into(),
                text: "Hello from mock".into(),
                usage: Usage::default(),
                model: "mock-model".into(),
                finish_reason: FinishReason::EndTurn,
            })
        }

        fn name(&self) -> &str {
            "mock"
        }

        fn default_model(&self) -> &str {
            "mock-model"
        }

        fn context_window_size(&self) -> usize {
            128_000
        }
    }

    fn make_test_request() -> Request {
        Request {
            model: "mock-model".into(),
            messages: vec![Message::user("hi")],
            max_tokens: None,
            temperature: None,
            stop_sequences: vec![],
        }
    }

    #[tokio::test]
    async fn dyn_provider_complete() {
        let provider = DynProvider::new(MockProvider);
        let req = make_test_request();
        let resp = provider.complete(&req).await.unwrap();
        assert_eq!(resp.id, "mock-resp-1");
        assert_eq!(resp.text, "Hello from mock");
        assert_eq!(resp.finish_reason, FinishReason::EndTurn);
    }

    #[test]
    fn dyn_provider_capability_methods() {
        let provider = DynProvider::new(MockProvider);
        assert_eq!(provider.name(), "mock");
        assert_eq!(provider.default_model(), "mock-model");
        assert_eq!(provider.context_window_size(), 128_000);
    }
}
