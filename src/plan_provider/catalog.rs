use crate::error::{AdvisorError, AdvisorResult};
use crate::plan_provider::PlanProvider;
use crate::types::{normalize_statement, PlanRow};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Pre-captured execution plans keyed by statement text.
///
/// The JSON layout is `{ "<statement>": [ { "table": ..., "type": ..., ... } ] }`.
/// Keys are compared after trimming, dropping a trailing `;` and collapsing
/// whitespace, so the log text and the catalog key need not match byte for byte.
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    plans: HashMap<String, Vec<PlanRow>>,
}

fn catalog_key(sql: &str) -> String {
    normalize_statement(sql).split_whitespace().collect::<Vec<_>>().join(" ")
}

impl PlanCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> AdvisorResult<Self> {
        let raw: HashMap<String, Vec<PlanRow>> = serde_json::from_str(json)
            .map_err(|e| AdvisorError::configuration(format!("invalid plan catalog: {}", e)))?;
        Ok(raw.into_iter().collect())
    }

    pub async fn load(path: impl AsRef<Path>) -> AdvisorResult<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            AdvisorError::configuration(format!("cannot read plan catalog {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_json(&json)?;
        info!("Loaded {} plans from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn insert(&mut self, sql: &str, plan: Vec<PlanRow>) {
        self.plans.insert(catalog_key(sql), plan);
    }

    pub fn get(&self, sql: &str) -> Option<&[PlanRow]> {
        self.plans.get(&catalog_key(sql)).map(Vec::as_slice)
    }

    /// Synchronous lookup with the provider's error semantics
    pub fn lookup(&self, sql: &str) -> AdvisorResult<Vec<PlanRow>> {
        self.get(sql)
            .map(<[PlanRow]>::to_vec)
            .ok_or_else(|| AdvisorError::query_execution(format!("no captured plan for statement: {}", sql)))
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

impl FromIterator<(String, Vec<PlanRow>)> for PlanCatalog {
    fn from_iter<I: IntoIterator<Item = (String, Vec<PlanRow>)>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for (sql, plan) in iter {
            catalog.insert(&sql, plan);
        }
        catalog
    }
}

impl PlanProvider for PlanCatalog {
    async fn explain(&self, sql: &str, _schema: Option<&str>) -> AdvisorResult<Vec<PlanRow>> {
        self.lookup(sql)
    }
}
