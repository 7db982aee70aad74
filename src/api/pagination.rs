use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::schemas::task::TaskKindFilter;

pub(crate) const fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct PageQuery {
    #[serde(default)]
    #[validate(range(min = 0, message = "offset must be non-negative"))]
    pub(crate) offset: i64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be in range 1..100"))]
    pub(crate) limit: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct TaskListQuery {
    #[serde(rename = "type", default)]
    pub(crate) kind: TaskKindFilter,
    #[serde(default)]
    #[validate(range(min = 0, message = "offset must be non-negative"))]
    pub(crate) offset: i64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be in range 1..100"))]
    pub(crate) limit: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PaginatedResponse<T> {
    pub(crate) items: Vec<T>,
    pub(crate) total_count: i64,
    pub(crate) offset: i64,
    pub(crate) limit: i64,
}
