use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, WorkflowError},
    models::AnalysisResult,
};

pub const MAX_COMPARISON_ITEMS: usize = 3;

/// Results picked for side-by-side viewing.
///
/// Holds at most [`MAX_COMPARISON_ITEMS`] members, unique by `id`, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSet {
    items: Vec<AnalysisResult>,
}

impl ComparisonSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: AnalysisResult) -> Result<()> {
        if self.items.len() >= MAX_COMPARISON_ITEMS {
            return Err(WorkflowError::ComparisonFull);
        }
        if self.contains(&result.id) {
            return Err(WorkflowError::Duplicate(result.id));
        }
        self.items.push(result);
        Ok(())
    }

    /// Remove the member with `id`. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    pub fn items(&self) -> &[AnalysisResult] {
        &self.items
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= MAX_COMPARISON_ITEMS
    }
}
