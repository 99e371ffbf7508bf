//! Category tree: bounded depth, no cycles, stored levels.

mod service;
pub mod tree;

pub use service::CategoryService;
pub use tree::MAX_LEVEL;

use common::CategoryId;
use serde::{Deserialize, Serialize};
use store::CategoryRecord;
use thiserror::Error;

use crate::catalog::ProductSummary;

/// Hierarchy rules a category write can break.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryError {
    /// Category names must not be blank.
    #[error("Category name must not be empty")]
    EmptyName,

    /// The write would place a category deeper than [`MAX_LEVEL`].
    #[error("Maximum category nesting level reached (level {level} exceeds {max})")]
    DepthExceeded { level: u8, max: u8 },

    /// A category cannot be its own parent.
    #[error("Category {0} cannot be its own parent")]
    SelfParent(CategoryId),

    /// The new parent is a descendant of the category being moved.
    #[error("Category {category} is an ancestor of {new_parent}")]
    CyclicParent {
        category: CategoryId,
        new_parent: CategoryId,
    },
}

/// Input for creating a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
}

/// Input for renaming or moving a category. A missing parent makes the
/// category a root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryUpdate {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
}

/// A direct child as listed under its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: CategoryId,
    pub name: String,
    pub level: u8,
}

impl From<&CategoryRecord> for CategorySummary {
    fn from(record: &CategoryRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            level: record.level,
        }
    }
}

/// A category with its direct children and member products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryView {
    pub id: CategoryId,
    pub name: String,
    pub parent_id: Option<CategoryId>,
    pub level: u8,
    pub children: Vec<CategorySummary>,
    pub products: Vec<ProductSummary>,
}
