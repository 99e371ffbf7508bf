use common::CategoryId;

use crate::ProductRecord;

/// Builder for constructing product listing queries.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    /// Only products that belong to this category.
    pub category_id: Option<CategoryId>,

    /// Case-insensitive substring matched against name, description and SKU.
    pub search: Option<String>,
}

impl ProductQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by category membership.
    pub fn category(mut self, id: CategoryId) -> Self {
        self.category_id = Some(id);
        self
    }

    /// Filters by free-text search. Blank terms are ignored.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.search = if term.trim().is_empty() {
            None
        } else {
            Some(term)
        };
        self
    }

    /// Returns true if `product` satisfies the search term.
    ///
    /// Category membership is not checked here; it lives in a separate table.
    pub fn matches_search(&self, product: &ProductRecord) -> bool {
        let Some(term) = &self.search else {
            return true;
        };
        let term = term.to_lowercase();
        product.name.to_lowercase().contains(&term)
            || product.description.to_lowercase().contains(&term)
            || product.sku.to_lowercase().contains(&term)
    }

    /// The search term as a SQL `ILIKE` pattern.
    pub(crate) fn like_pattern(&self) -> Option<String> {
        self.search.as_ref().map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    fn product() -> ProductRecord {
        ProductRecord::new(
            "Wireless Mouse",
            "Ergonomic, two buttons",
            Money::from_cents(2500),
            "MOUSE-01",
            3,
        )
    }

    #[test]
    fn search_matches_any_text_field() {
        assert!(ProductQuery::new().search("wireless").matches_search(&product()));
        assert!(ProductQuery::new().search("ERGONOMIC").matches_search(&product()));
        assert!(ProductQuery::new().search("mouse-01").matches_search(&product()));
        assert!(!ProductQuery::new().search("keyboard").matches_search(&product()));
    }

    #[test]
    fn blank_search_is_ignored() {
        let query = ProductQuery::new().search("   ");
        assert!(query.search.is_none());
        assert!(query.matches_search(&product()));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        let query = ProductQuery::new().search("50%_off");
        assert_eq!(query.like_pattern().as_deref(), Some("%50\\%\\_off%"));
    }
}
