// Execution-plan providers
pub mod catalog;
pub mod mysql;


pub use catalog::PlanCatalog;
pub use mysql::{ConnectionConfig, MySqlPlanProvider};

use crate::error::AdvisorResult;
use crate::types::PlanRow;

/// Source of execution plans for single statements
#[allow(async_fn_in_trait)]
pub trait PlanProvider {
    /// Plan rows for `sql`, run against `schema` when one is given. Failures are
    /// reported as `AdvisorError::QueryExecution` with the driver's message.
    async fn explain(&self, sql: &str, schema: Option<&str>) -> AdvisorResult<Vec<PlanRow>>;
}
