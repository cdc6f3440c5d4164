use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use fuschia_flow::{Flow, FlowError};

/// Lookup of flow definitions.
#[async_trait]
pub trait FlowRepository: Send + Sync {
  /// Find a flow by identity. Without a revision, the latest one is returned.
  async fn find_by_id(
    &self,
    tenant_id: Option<&str>,
    namespace: &str,
    flow_id: &str,
    revision: Option<u32>,
  ) -> Option<Flow>;
}

/// Flow repository kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryFlowRepository {
  flows: RwLock<Vec<Flow>>,
}

impl InMemoryFlowRepository {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store a flow after validating it. Saving the same revision again
  /// replaces it.
  pub fn save(&self, flow: Flow) -> Result<(), FlowError> {
    flow.validate()?;

    let mut flows = self.flows.write().unwrap_or_else(PoisonError::into_inner);
    flows.retain(|existing| {
      !(existing.tenant_id == flow.tenant_id
        && existing.namespace == flow.namespace
        && existing.id == flow.id
        && existing.revision == flow.revision)
    });
    flows.push(flow);
    Ok(())
  }
}

#[async_trait]
impl FlowRepository for InMemoryFlowRepository {
  async fn find_by_id(
    &self,
    tenant_id: Option<&str>,
    namespace: &str,
    flow_id: &str,
    revision: Option<u32>,
  ) -> Option<Flow> {
    let flows = self.flows.read().unwrap_or_else(PoisonError::into_inner);
    let mut candidates = flows.iter().filter(|flow| {
      flow.tenant_id.as_deref() == tenant_id && flow.namespace == namespace && flow.id == flow_id
    });

    match revision {
      Some(revision) => candidates
        .find(|flow| flow.revision == Some(revision))
        .cloned(),
      None => candidates.max_by_key(|flow| flow.revision).cloned(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn revision(revision: u32) -> Flow {
    Flow {
      revision: Some(revision),
      ..Flow::new("company.team", "hello")
    }
  }

  #[tokio::test]
  async fn test_latest_revision_by_default() {
    let repository = InMemoryFlowRepository::new();
    repository.save(revision(1)).unwrap();
    repository.save(revision(3)).unwrap();
    repository.save(revision(2)).unwrap();

    let latest = repository
      .find_by_id(None, "company.team", "hello", None)
      .await
      .unwrap();
    assert_eq!(latest.revision, Some(3));

    let pinned = repository
      .find_by_id(None, "company.team", "hello", Some(2))
      .await
      .unwrap();
    assert_eq!(pinned.revision, Some(2));
  }

  #[tokio::test]
  async fn test_unknown_flow_or_tenant() {
    let repository = InMemoryFlowRepository::new();
    repository.save(revision(1)).unwrap();

    assert!(
      repository
        .find_by_id(None, "company.team", "other", None)
        .await
        .is_none()
    );
    assert!(
      repository
        .find_by_id(Some("acme"), "company.team", "hello", None)
        .await
        .is_none()
    );
    assert!(
      repository
        .find_by_id(None, "company.team", "hello", Some(9))
        .await
        .is_none()
    );
  }
}
