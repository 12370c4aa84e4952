use std::borrow::Cow;
use std::sync::OnceLock;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;

use crate::error::{CoreError, SearchErrorKind};

/// Shared HTTP client with retry middleware, lazily built once per process
/// (teacher pattern: a `OnceLock`-guarded singleton rather than one client
/// per request).
pub fn http_client() -> &'static ClientWithMiddleware {
    static CLIENT: OnceLock<ClientWithMiddleware> = OnceLock::new();
    CLIENT.get_or_init(|| {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    })
}

/// Reads `env_var`, falling back to `default` when unset or blank. Lets a
/// deployment point a provider at a mirror or test double without a code
/// change.
pub fn env_base(env_var: &str, default: &'static str) -> Cow<'static, str> {
    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Cow::Owned(value),
        _ => Cow::Borrowed(default),
    }
}

/// GETs `url` and decodes the JSON body as `T`, mapping transport and
/// decode failures onto this crate's Search error taxonomy instead of
/// leaking `reqwest`/`serde_json` types past the provider boundary.
pub async fn get_json<T: DeserializeOwned>(provider: &str, url: &str) -> Result<T, CoreError> {
    let response = http_client().get(url).send().await.map_err(|e| CoreError::Search {
        provider: provider.to_string(),
        kind: SearchErrorKind::UpstreamUnavailable,
        message: e.to_string(),
    })?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(CoreError::Search {
            provider: provider.to_string(),
            kind: SearchErrorKind::RateLimit,
            message: "rate limited".into(),
        });
    }
    if !status.is_success() {
        return Err(CoreError::Search {
            provider: provider.to_string(),
            kind: SearchErrorKind::UpstreamUnavailable,
            message: format!("unexpected status {status}"),
        });
    }

    let body = response.text().await.map_err(|e| CoreError::Search {
        provider: provider.to_string(),
        kind: SearchErrorKind::ProtocolError,
        message: e.to_string(),
    })?;

    serde_json::from_str(&body).map_err(|e| CoreError::Search {
        provider: provider.to_string(),
        kind: SearchErrorKind::ProtocolError,
        message: format!("{e}: {}", body_excerpt(&body)),
    })
}

/// First 200 chars of a response body, for error messages — enough to
/// diagnose a malformed response without dumping an entire HTML error page
/// into the logs.
pub fn body_excerpt(body: &str) -> String {
    body.chars().take(200).collect()
}
