//! OAuth callback resolution.

use tracing::{info, warn};
use url::Url;

use super::AuthService;

pub const MISSING_CODE_REDIRECT: &str = "/signin?error=missing_code";
pub const EXCHANGE_FAILED_REDIRECT: &str = "/signin?error=exchange_failed";

/// Complete a provider sign-in from the callback URL and return the
/// same-origin location to redirect to.
///
/// `next` is honoured only when it is a local absolute path; anything else
/// falls back to `/`.
pub async fn resolve(auth: &AuthService, callback: &Url) -> String {
    let mut code = None;
    let mut next = None;
    for (name, value) in callback.query_pairs() {
        match name.as_ref() {
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            "next" => next = Some(value.into_owned()),
            _ => {}
        }
    }

    let Some(code) = code else {
        warn!("auth callback without code");
        return MISSING_CODE_REDIRECT.to_string();
    };

    if let Err(err) = auth.exchange_code(&code).await {
        warn!(error = %err, "auth callback code exchange failed");
        return EXCHANGE_FAILED_REDIRECT.to_string();
    }

    let target = next
        .filter(|path| is_local_path(path))
        .unwrap_or_else(|| "/".to_string());
    info!(target = %target, "auth callback completed");
    target
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::{CacheConfig, QueryCache};
    use crate::infra::remote::MemoryBackend;
    use crate::stores::SessionStore;

    fn service(backend: &Arc<MemoryBackend>) -> AuthService {
        AuthService::new(
            backend.clone(),
            SessionStore::new(),
            QueryCache::new(CacheConfig::default()),
        )
    }

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn missing_code_redirects_to_signin() {
        let backend = Arc::new(MemoryBackend::new());
        let auth = service(&backend);

        let target = resolve(&auth, &url("https://app.test/auth/callback?next=/todos")).await;

        assert_eq!(target, MISSING_CODE_REDIRECT);
        assert_eq!(backend.calls().auth, 0);
    }

    #[tokio::test]
    async fn failed_exchange_redirects_to_signin() {
        let backend = Arc::new(MemoryBackend::new());
        let auth = service(&backend);

        let target = resolve(&auth, &url("https://app.test/auth/callback?code=bogus")).await;

        assert_eq!(target, EXCHANGE_FAILED_REDIRECT);
        assert!(auth.session().current().is_none());
    }

    #[tokio::test]
    async fn successful_exchange_follows_next() {
        let backend = Arc::new(MemoryBackend::new());
        let auth = service(&backend);
        let code = backend.issue_code("oauth@example.com");

        let target = resolve(
            &auth,
            &url(&format!(
                "https://app.test/auth/callback?code={code}&next=/reset-password"
            )),
        )
        .await;

        assert_eq!(target, "/reset-password");
        assert!(auth.session().current().is_some());
    }

    #[tokio::test]
    async fn foreign_next_falls_back_to_root() {
        let backend = Arc::new(MemoryBackend::new());
        let auth = service(&backend);
        let code = backend.issue_code("oauth@example.com");

        let target = resolve(
            &auth,
            &url(&format!(
                "https://app.test/auth/callback?code={code}&next=//evil.test/"
            )),
        )
        .await;

        assert_eq!(target, "/");
    }
}
