//! Category guessing port

use crate::domain::newtypes::Category;

/// Picks a category for a sync target from its basename
pub trait CategoryGuesser: Send + Sync {
    fn guess(&self, basename: &str) -> Category;
}

/// Guesser that ignores the basename and always answers the configured
/// default category
#[derive(Debug, Clone)]
pub struct DefaultCategory(Category);

impl DefaultCategory {
    pub fn new(category: Category) -> Self {
        Self(category)
    }
}

impl CategoryGuesser for DefaultCategory {
    fn guess(&self, _basename: &str) -> Category {
        self.0.clone()
    }
}
