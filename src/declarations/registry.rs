use crate::declarations::{ConfigurationError, QueueDeclaration};
use std::collections::HashSet;

/// The read-only table of every [`QueueDeclaration`] known to the process.
///
/// Declarations keep the order they were loaded in.
#[derive(Debug, Clone, Default)]
pub struct QueueRegistry {
    declarations: Vec<QueueDeclaration>,
}

impl QueueRegistry {
    /// Load the registry.
    ///
    /// Fails if two declarations share a queue name, if a dead-letter link names a queue
    /// that is not declared, or if more than one dead-letter queue is linked to the same queue.
    pub fn new(declarations: Vec<QueueDeclaration>) -> Result<Self, ConfigurationError> {
        let mut names = HashSet::with_capacity(declarations.len());
        for declaration in &declarations {
            if !names.insert(declaration.queue_name.as_str()) {
                return Err(ConfigurationError::DuplicateQueueName {
                    queue_name: declaration.queue_name.clone(),
                });
            }
        }

        let mut dead_lettered = HashSet::new();
        for declaration in &declarations {
            let Some(target) = declaration.dead_letter_queue.as_deref() else {
                continue;
            };
            if !names.contains(target) {
                return Err(ConfigurationError::UnknownDeadLetterQueue {
                    queue_name: declaration.queue_name.clone(),
                    dead_letter_queue: target.to_owned(),
                });
            }
            if !dead_lettered.insert(target) {
                return Err(ConfigurationError::MultipleDeadLetterQueues {
                    queue_name: target.to_owned(),
                });
            }
        }

        Ok(Self { declarations })
    }

    /// Same as [`QueueRegistry::new`], for declarations borrowed from settings.
    pub fn from_settings(declarations: &[QueueDeclaration]) -> Result<Self, ConfigurationError> {
        Self::new(declarations.to_vec())
    }

    pub fn list_all(&self) -> &[QueueDeclaration] {
        &self.declarations
    }

    pub fn get(&self, queue_name: &str) -> Option<&QueueDeclaration> {
        self.declarations
            .iter()
            .find(|declaration| declaration.queue_name == queue_name)
    }

    /// The dead-letter queue linked to `queue_name`, if one is declared.
    pub fn dead_letter_queue_for(&self, queue_name: &str) -> Option<&QueueDeclaration> {
        self.declarations
            .iter()
            .find(|declaration| declaration.dead_letter_queue.as_deref() == Some(queue_name))
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}
