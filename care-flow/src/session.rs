use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::{context::Context, error::Result};

/// One in-flight execution of a pipeline.
///
/// Sessions carry the shared [`Context`] plus the position the execution has
/// reached, so a workflow can span several requests (e.g. waiting for a nurse
/// to confirm a generated summary) without any state living in the handler.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub pipeline_id: String,
    pub current_stage: String,
    pub status_message: Option<String>,
    pub context: Context,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        pipeline_id: impl Into<String>,
        start_stage: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            pipeline_id: pipeline_id.into(),
            current_stage: start_stage.into(),
            status_message: None,
            context: Context::new(),
        }
    }
}

/// Persistence boundary for sessions.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory `SessionStorage`, suitable for single-process deployments and
/// tests. Clones returned by `get` share the stored session's context.
#[derive(Default)]
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}
