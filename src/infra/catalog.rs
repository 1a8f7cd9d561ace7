//! Loads canonical test definitions from the quiz catalogue file.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::{application::catalog::TestCatalog, domain::quiz::QuizTest};

use super::error::InfraError;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    tests: Vec<QuizTest>,
}

/// Reads `{"tests": [...]}` from `path`. Duplicate test ids are rejected.
pub async fn load_catalog(path: &Path) -> Result<TestCatalog, InfraError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| InfraError::catalog(path, err.to_string()))?;
    let catalog = parse_catalog(&bytes).map_err(|message| InfraError::catalog(path, message))?;

    info!(
        target = "infra::catalog",
        path = %path.display(),
        tests = catalog.len(),
        "test catalogue loaded"
    );
    Ok(catalog)
}

pub fn parse_catalog(bytes: &[u8]) -> Result<TestCatalog, String> {
    let file: CatalogFile = serde_json::from_slice(bytes).map_err(|err| err.to_string())?;

    for (index, test) in file.tests.iter().enumerate() {
        if file.tests[..index].iter().any(|other| other.id == test.id) {
            return Err(format!("duplicate test id {}", test.id));
        }
    }

    Ok(TestCatalog::new(file.tests))
}
