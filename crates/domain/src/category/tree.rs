//! Pure hierarchy rules. The service feeds these with records read inside
//! the write transaction.

use common::CategoryId;
use store::CategoryRecord;

use super::CategoryError;

/// Deepest level a category may sit at. Roots are level 0.
pub const MAX_LEVEL: u8 = 4;

/// Level of a new child under `parent`.
pub fn child_level(parent: &CategoryRecord) -> Result<u8, CategoryError> {
    if parent.level >= MAX_LEVEL {
        return Err(CategoryError::DepthExceeded {
            level: parent.level.saturating_add(1),
            max: MAX_LEVEL,
        });
    }
    Ok(parent.level + 1)
}

/// Rejects moving `category` under `new_parent`, whose ancestor chain
/// (nearest first, up to the root) is `ancestors`.
pub fn check_new_parent(
    category: CategoryId,
    new_parent: CategoryId,
    ancestors: &[CategoryId],
) -> Result<(), CategoryError> {
    if category == new_parent {
        return Err(CategoryError::SelfParent(category));
    }
    if ancestors.contains(&category) {
        return Err(CategoryError::CyclicParent {
            category,
            new_parent,
        });
    }
    Ok(())
}

/// The descendants of a category, each with its distance below it.
#[derive(Debug, Default, Clone)]
pub struct Subtree {
    nodes: Vec<(CategoryRecord, u8)>,
}

impl Subtree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `node` at `depth` levels below the subtree root.
    pub fn push(&mut self, node: CategoryRecord, depth: u8) {
        self.nodes.push((node, depth));
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Distance from the subtree root to its deepest descendant.
    pub fn height(&self) -> u8 {
        self.nodes.iter().map(|(_, depth)| *depth).max().unwrap_or(0)
    }

    /// Fails if the subtree root at `root_level` would push any descendant
    /// past [`MAX_LEVEL`].
    pub fn check_fits(&self, root_level: u8) -> Result<(), CategoryError> {
        let deepest = root_level.saturating_add(self.height());
        if deepest > MAX_LEVEL {
            return Err(CategoryError::DepthExceeded {
                level: deepest,
                max: MAX_LEVEL,
            });
        }
        Ok(())
    }

    /// Descendants whose stored level changes when the subtree root moves to
    /// `root_level`, with the level already updated.
    pub fn relevel(self, root_level: u8) -> Vec<CategoryRecord> {
        self.nodes
            .into_iter()
            .filter_map(|(mut node, depth)| {
                let level = root_level + depth;
                (node.level != level).then(|| {
                    node.level = level;
                    node
                })
            })
            .collect()
    }
}
