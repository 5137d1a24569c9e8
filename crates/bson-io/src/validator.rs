//! Pluggable element-name validation for the writer.

use std::sync::{Arc, OnceLock};

/// Decides which element names may be written at one nesting level.
///
/// The writer keeps a stack of validators: each nested document or array is
/// validated by the validator its parent returned from
/// [`child_validator`](Self::child_validator) for the element's name.
pub trait ElementNameValidator: Send + Sync {
    fn is_valid_element_name(&self, name: &str) -> bool;

    fn child_validator(&self, name: &str) -> Arc<dyn ElementNameValidator>;
}

/// Accepts every name.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpElementNameValidator;

impl NoOpElementNameValidator {
    pub fn shared() -> Arc<dyn ElementNameValidator> {
        static SHARED: OnceLock<Arc<NoOpElementNameValidator>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(NoOpElementNameValidator)).clone()
    }
}

impl ElementNameValidator for NoOpElementNameValidator {
    fn is_valid_element_name(&self, _name: &str) -> bool {
        true
    }

    fn child_validator(&self, _name: &str) -> Arc<dyn ElementNameValidator> {
        Self::shared()
    }
}

/// Rules for documents stored in a collection: names may not start with
/// `$` or contain `.`, at any depth.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionElementNameValidator;

impl CollectionElementNameValidator {
    pub fn shared() -> Arc<dyn ElementNameValidator> {
        static SHARED: OnceLock<Arc<CollectionElementNameValidator>> = OnceLock::new();
        SHARED
            .get_or_init(|| Arc::new(CollectionElementNameValidator))
            .clone()
    }
}

impl ElementNameValidator for CollectionElementNameValidator {
    fn is_valid_element_name(&self, name: &str) -> bool {
        !name.starts_with('$') && !name.contains('.')
    }

    fn child_validator(&self, _name: &str) -> Arc<dyn ElementNameValidator> {
        Self::shared()
    }
}

/// Rules for update documents: every top-level name is an operator and must
/// start with `$`; operator arguments are unrestricted.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateElementNameValidator;

impl UpdateElementNameValidator {
    pub fn shared() -> Arc<dyn ElementNameValidator> {
        static SHARED: OnceLock<Arc<UpdateElementNameValidator>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(UpdateElementNameValidator)).clone()
    }
}

impl ElementNameValidator for UpdateElementNameValidator {
    fn is_valid_element_name(&self, name: &str) -> bool {
        name.starts_with('$')
    }

    fn child_validator(&self, _name: &str) -> Arc<dyn ElementNameValidator> {
        NoOpElementNameValidator::shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_rules() {
        let v = CollectionElementNameValidator;
        assert!(v.is_valid_element_name("name"));
        assert!(!v.is_valid_element_name("$set"));
        assert!(!v.is_valid_element_name("a.b"));
        assert!(!v.child_validator("x").is_valid_element_name("$inc"));
    }

    #[test]
    fn test_update_rules() {
        let v = UpdateElementNameValidator;
        assert!(v.is_valid_element_name("$set"));
        assert!(!v.is_valid_element_name("name"));
        assert!(v.child_validator("$set").is_valid_element_name("a.b"));
    }
}
