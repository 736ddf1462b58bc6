use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome for one object of a batch write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectWriteResult {
    pub id: Uuid,
    pub error: Option<String>,
}

impl ObjectWriteResult {
    pub fn stored(id: Uuid) -> Self {
        Self { id, error: None }
    }

    pub fn rejected(id: Uuid, error: impl Into<String>) -> Self {
        Self {
            id,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-object results of a batch write. A partial failure is a valid outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchWriteResult {
    pub objects: Vec<ObjectWriteResult>,
}

impl BatchWriteResult {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn stored_count(&self) -> usize {
        self.objects.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ObjectWriteResult> {
        self.objects.iter().filter(|o| !o.is_ok())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_counts() {
        let result = BatchWriteResult {
            objects: vec![
                ObjectWriteResult::stored(Uuid::new_v4()),
                ObjectWriteResult::rejected(Uuid::new_v4(), "bad vector"),
                ObjectWriteResult::stored(Uuid::new_v4()),
            ],
        };

        assert_eq!(result.len(), 3);
        assert_eq!(result.stored_count(), 2);
        assert!(result.has_failures());
        let errors: Vec<_> = result.failures().filter_map(|o| o.error.as_deref()).collect();
        assert_eq!(errors, vec!["bad vector"]);
    }

    #[test]
    fn test_empty_result_has_no_failures() {
        let result = BatchWriteResult::default();
        assert!(result.is_empty());
        assert!(!result.has_failures());
    }
}
