//! In-memory implementation of [`Persistence`].
//!
//! Backed by a [`Hierarchy`] behind a `tokio::sync::RwLock`. Setting the
//! store offline makes every call fail with `PersistenceUnavailable`, which
//! lets tests exercise the engine's recovery path.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::Persistence;
use crate::hierarchy::Hierarchy;
use crate::models::{NewPhase, NewProject, NewTask, Phase, Project, Task};
use crate::{Error, Result};

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    hierarchy: RwLock<Hierarchy>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the collaborator becoming (un)reachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::PersistenceUnavailable(
                "memory store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn load_full_hierarchy(&self) -> Result<Vec<Project>> {
        self.check_online()?;
        Ok(self.hierarchy.read().await.load_hierarchy())
    }

    async fn load_all_tasks(&self) -> Result<Vec<Task>> {
        self.check_online()?;
        Ok(self.hierarchy.read().await.all_tasks())
    }

    async fn create_project(&self, project: NewProject) -> Result<Project> {
        self.check_online()?;
        self.hierarchy.write().await.create_project(project)
    }

    async fn create_phase(&self, phase: NewPhase) -> Result<Phase> {
        self.check_online()?;
        self.hierarchy.write().await.create_phase(phase)
    }

    async fn create_task(&self, task: NewTask) -> Result<Task> {
        self.check_online()?;
        self.hierarchy.write().await.create_task(task)
    }
}
