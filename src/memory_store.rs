//! Implementación en memoria de `NodeStore`. Es el backend por defecto y el
//! que usan las pruebas.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::models::Node;
use crate::store::{NodeFilter, NodeStore, SeedOutcome, SetFields};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    nodes: Arc<RwLock<HashMap<String, Node>>>,
    markers: Arc<Mutex<HashSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resuelve el id de un filtro por id sin recorrer la colección.
    fn by_id(filter: &NodeFilter) -> Option<&str> {
        match filter {
            NodeFilter::Id(id) => Some(id.as_str()),
            _ => None,
        }
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn find(&self, filter: &NodeFilter) -> StoreResult<Vec<Node>> {
        let nodes = self.nodes.read().await;
        Ok(nodes.values().filter(|n| filter.matches(n)).cloned().collect())
    }

    async fn find_one(&self, filter: &NodeFilter) -> StoreResult<Option<Node>> {
        let nodes = self.nodes.read().await;
        if let Some(id) = Self::by_id(filter) {
            return Ok(nodes.get(id).cloned());
        }
        Ok(nodes.values().find(|n| filter.matches(n)).cloned())
    }

    async fn insert_one(&self, node: Node) -> StoreResult<String> {
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&node.id) {
            return Err(StoreError::Duplicate(node.id));
        }
        let id = node.id.clone();
        nodes.insert(id.clone(), node);
        Ok(id)
    }

    async fn find_one_and_update(
        &self,
        filter: &NodeFilter,
        set: &SetFields,
    ) -> StoreResult<Option<Node>> {
        let mut nodes = self.nodes.write().await;
        let target = match Self::by_id(filter) {
            Some(id) => nodes.get_mut(id),
            None => nodes.values_mut().find(|n| filter.matches(n)),
        };
        Ok(target.map(|node| {
            set.apply(node);
            node.clone()
        }))
    }

    async fn delete_one(&self, filter: &NodeFilter) -> StoreResult<u64> {
        let mut nodes = self.nodes.write().await;
        let key = match Self::by_id(filter) {
            Some(id) => Some(id.to_string()),
            None => nodes
                .values()
                .find(|n| filter.matches(n))
                .map(|n| n.id.clone()),
        };
        Ok(key.and_then(|k| nodes.remove(&k)).map_or(0, |_| 1))
    }

    async fn seed_root(&self, marker: &str, root: Node) -> StoreResult<SeedOutcome> {
        let mut markers = self.markers.lock().await;
        if markers.contains(marker) {
            return Ok(SeedOutcome::AlreadyBootstrapped);
        }

        let mut nodes = self.nodes.write().await;
        let outcome = if nodes.is_empty() {
            nodes.insert(root.id.clone(), root);
            SeedOutcome::Seeded
        } else {
            SeedOutcome::Adopted
        };
        markers.insert(marker.to_string());
        Ok(outcome)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewNode, NodeType};
    use chrono::Utc;
    use tokio_test::assert_ok;

    fn node(id: &str, parent: Option<&str>) -> Node {
        Node::construct(NewNode {
            id: Some(id.to_string()),
            name: id.to_string(),
            node_type: NodeType::Directory,
            parent_id: parent.map(str::to_string),
            data: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn insert_and_find_by_filters() {
        let store = MemoryStore::new();
        assert_ok!(store.insert_one(node("root", None)).await);
        assert_ok!(store.insert_one(node("a", Some("root"))).await);
        assert_ok!(store.insert_one(node("b", Some("a"))).await);

        assert_eq!(store.find(&NodeFilter::All).await.unwrap().len(), 3);

        let children = store
            .find(&NodeFilter::ParentId("root".into()))
            .await
            .unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, "a");

        let level = store
            .find(&NodeFilter::ParentIn(vec!["root".into(), "a".into()]))
            .await
            .unwrap();
        assert_eq!(level.len(), 2);

        let found = store.find_one(&NodeFilter::Id("b".into())).await.unwrap();
        assert_eq!(found.map(|n| n.name), Some("b".to_string()));
        assert!(store
            .find_one(&NodeFilter::Id("zzz".into()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = MemoryStore::new();
        store.insert_one(node("a", None)).await.unwrap();
        let err = store.insert_one(node("a", None)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(id) if id == "a"));
    }

    #[tokio::test]
    async fn update_sets_only_given_fields() {
        let store = MemoryStore::new();
        store.insert_one(node("a", None)).await.unwrap();
        let now = Utc::now();
        let set = SetFields {
            name: Some("renamed".into()),
            data: None,
            updated_at: now,
        };
        let updated = store
            .find_one_and_update(&NodeFilter::Id("a".into()), &set)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.data, None);
        assert_eq!(updated.updated_at, now);

        let missing = store
            .find_one_and_update(&NodeFilter::Id("nope".into()), &set)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn delete_reports_count() {
        let store = MemoryStore::new();
        store.insert_one(node("a", None)).await.unwrap();
        assert_eq!(store.delete_one(&NodeFilter::Id("a".into())).await.unwrap(), 1);
        assert_eq!(store.delete_one(&NodeFilter::Id("a".into())).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn root_is_seeded_once_per_marker() {
        let store = MemoryStore::new();
        let root = Node::root();
        let outcome = store.seed_root("m", root.clone()).await.unwrap();
        assert_eq!(outcome, SeedOutcome::Seeded);
        assert_eq!(store.find(&NodeFilter::All).await.unwrap(), vec![root]);

        let again = store.seed_root("m", Node::root()).await.unwrap();
        assert_eq!(again, SeedOutcome::AlreadyBootstrapped);
        assert_eq!(store.find(&NodeFilter::All).await.unwrap().len(), 1);

        let other = store.seed_root("other", Node::root()).await.unwrap();
        assert_eq!(other, SeedOutcome::Adopted);
        assert_eq!(store.find(&NodeFilter::All).await.unwrap().len(), 1);
    }
}
