//! Problem and catalog source (an external tabular store).

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CatalogEntry, Problem};

#[async_trait]
pub trait ProblemSource: Send + Sync {
    /// Rows not yet broadcast that carry a primary image, in sheet order.
    async fn read_eligible_problems(&self) -> Result<Vec<Problem>>;

    /// Flag the row with this source index as broadcast.
    async fn mark_broadcast(&self, source_index: i64) -> Result<()>;

    async fn read_catalog(&self) -> Result<Vec<CatalogEntry>>;
}
