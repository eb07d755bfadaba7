use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use shared::{
    domain::{DepictionResult, ResolvedIdentifier, StageResult, StructureBlob, StructureResult},
    error::{FetchError, ResolveError},
    protocol::{
        IdentifierPayload, ResolveQuery, ResolveResponse, DEPICTION_PATH, IDENTIFIER_PARAM,
        RESOLVE_PATH, STRUCTURE_PATH,
    },
};
use tracing::{error, info, warn};
use url::Url;

use crate::{DepictionFetcher, IdentifierResolver, StructureFetcher};

/// Request encodings for the depiction endpoint, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepictionStrategy {
    FormBody,
    QueryParameter,
    JsonBody,
}

impl DepictionStrategy {
    pub const ORDER: [DepictionStrategy; 3] = [
        DepictionStrategy::FormBody,
        DepictionStrategy::QueryParameter,
        DepictionStrategy::JsonBody,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::FormBody => "form_body",
            Self::QueryParameter => "query_parameter",
            Self::JsonBody => "json_body",
        }
    }
}

/// HTTP client for the remote resolution/depiction/structure service.
pub struct HttpMoleculeService {
    http: Client,
    resolve_url: Url,
    depiction_url: Url,
    structure_url: Url,
}

impl HttpMoleculeService {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self> {
        let trimmed = base_url.trim();
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };
        let base = Url::parse(&normalized)
            .with_context(|| format!("invalid molecule service url: {base_url}"))?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("molecule service url must start with http:// or https://");
        }
        Ok(Self {
            http,
            resolve_url: base.join(RESOLVE_PATH)?,
            depiction_url: base.join(DEPICTION_PATH)?,
            structure_url: base.join(STRUCTURE_PATH)?,
        })
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn depiction_request(&self, strategy: DepictionStrategy, identifier: &str) -> RequestBuilder {
        let request = self.http.post(self.depiction_url.clone());
        match strategy {
            DepictionStrategy::FormBody => request.form(&[(IDENTIFIER_PARAM, identifier)]),
            DepictionStrategy::QueryParameter => request.query(&[(IDENTIFIER_PARAM, identifier)]),
            DepictionStrategy::JsonBody => request.json(&IdentifierPayload::new(identifier)),
        }
    }
}

/// Success means an HTTP success status and a non-empty body.
async fn accept_payload(
    response: std::result::Result<Response, reqwest::Error>,
) -> std::result::Result<Vec<u8>, FetchError> {
    let response = response.map_err(|err| FetchError::Transport(err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|err| FetchError::Transport(err.to_string()))?;
    if bytes.is_empty() {
        return Err(FetchError::EmptyPayload);
    }
    Ok(bytes.to_vec())
}

#[async_trait]
impl IdentifierResolver for HttpMoleculeService {
    async fn resolve(&self, text: &str) -> std::result::Result<ResolvedIdentifier, ResolveError> {
        let response = self
            .http
            .post(self.resolve_url.clone())
            .query(&ResolveQuery {
                text: text.to_string(),
            })
            .send()
            .await
            .map_err(|err| ResolveError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let identifiers: ResolveResponse = response
            .json()
            .await
            .map_err(|err| ResolveError::Transport(format!("invalid resolution response: {err}")))?;

        match identifiers.into_iter().next().flatten() {
            Some(identifier) if !identifier.trim().is_empty() => {
                Ok(ResolvedIdentifier(identifier.trim().to_string()))
            }
            _ => Err(ResolveError::NotFound),
        }
    }
}

#[async_trait]
impl DepictionFetcher for HttpMoleculeService {
    async fn fetch_depiction(&self, identifier: &ResolvedIdentifier) -> DepictionResult {
        let mut last_error = None;
        for strategy in DepictionStrategy::ORDER {
            let response = self
                .depiction_request(strategy, identifier.as_str())
                .send()
                .await;
            match accept_payload(response).await {
                Ok(bytes) => {
                    info!(
                        identifier = %identifier,
                        strategy = strategy.label(),
                        bytes = bytes.len(),
                        "depiction fetched"
                    );
                    return StageResult::Present(Arc::from(bytes));
                }
                Err(err) => {
                    warn!(
                        identifier = %identifier,
                        strategy = strategy.label(),
                        code = ?err.code(),
                        "depiction strategy failed: {err}"
                    );
                    last_error = Some(err);
                }
            }
        }

        let code = last_error.as_ref().map(FetchError::code);
        let message = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "no depiction strategy attempted".to_string());
        error!(identifier = %identifier, ?code, "2D depiction unavailable: {message}");
        StageResult::failed(message)
    }
}

#[async_trait]
impl StructureFetcher for HttpMoleculeService {
    async fn fetch_structure(&self, identifier: &ResolvedIdentifier) -> StructureResult {
        let response = self
            .http
            .post(self.structure_url.clone())
            .query(&[(IDENTIFIER_PARAM, identifier.as_str())])
            .form(&[(IDENTIFIER_PARAM, identifier.as_str())])
            .send()
            .await;

        match accept_payload(response).await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                info!(identifier = %identifier, bytes = text.len(), "3D structure fetched");
                StageResult::Present(StructureBlob::new(text))
            }
            Err(err) => {
                error!(identifier = %identifier, code = ?err.code(), "3D structure unavailable: {err}");
                StageResult::failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
