use std::sync::Arc;

use shared::{
    domain::{MoleculeRequest, ResultSet},
    error::ResolveError,
};
use tracing::{error, info};

use crate::{transport::HttpMoleculeService, DepictionFetcher, IdentifierResolver, StructureFetcher};

/// Runs resolve → depiction → structure for one request.
///
/// Only resolution is fatal. The two fetch stages absorb their own failures
/// and leave their slot absent, so a run that resolved always yields a
/// `ResultSet`. Stages run one after another and nothing is retried.
pub struct PipelineOrchestrator {
    resolver: Arc<dyn IdentifierResolver>,
    depiction: Arc<dyn DepictionFetcher>,
    structure: Arc<dyn StructureFetcher>,
}

impl PipelineOrchestrator {
    pub fn new(
        resolver: Arc<dyn IdentifierResolver>,
        depiction: Arc<dyn DepictionFetcher>,
        structure: Arc<dyn StructureFetcher>,
    ) -> Self {
        Self {
            resolver,
            depiction,
            structure,
        }
    }

    pub fn from_service(service: Arc<HttpMoleculeService>) -> Self {
        Self::new(service.clone(), service.clone(), service)
    }

    pub async fn run(&self, request: &MoleculeRequest) -> Result<ResultSet, ResolveError> {
        let identifier = self.resolver.resolve(&request.text).await.map_err(|err| {
            error!(origin = ?request.origin, code = ?err.code(), "identifier resolution failed: {err}");
            err
        })?;
        info!(identifier = %identifier, origin = ?request.origin, "identifier resolved");

        let depiction = self.depiction.fetch_depiction(&identifier).await;
        let structure = self.structure.fetch_structure(&identifier).await;

        info!(
            identifier = %identifier,
            depiction = depiction.is_present(),
            structure = structure.is_present(),
            "pipeline run complete"
        );
        Ok(ResultSet::new(identifier, depiction, structure))
    }
}

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod tests;
