//! Orquestación CRUD: valida con el modelo, persiste en el almacén y delega
//! los listados de descendientes en el motor de recorrido.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use crate::error::{NodeError, NodeResult};
use crate::models::{NewNode, Node, NodePatch};
use crate::store::{NodeFilter, NodeStore, SeedOutcome, SetFields, BOOTSTRAP_MARKER};
use crate::traversal::{self, TraversalStrategy};

/// Cuánto se exige a las referencias `parent_id`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IntegrityMode {
    /// Se aceptan padres inexistentes y el borrado deja huérfanos.
    #[default]
    Lenient,
    /// El padre debe existir y ser un directorio; no se borran nodos con hijos.
    Strict,
}

impl FromStr for IntegrityMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(anyhow!("Modo de integridad no soportado: {other}")),
        }
    }
}

#[derive(Clone)]
pub struct NodeService {
    store: Arc<dyn NodeStore>,
    integrity: IntegrityMode,
    traversal: TraversalStrategy,
}

impl NodeService {
    pub fn new(
        store: Arc<dyn NodeStore>,
        integrity: IntegrityMode,
        traversal: TraversalStrategy,
    ) -> Self {
        Self {
            store,
            integrity,
            traversal,
        }
    }

    /// Siembra el nodo raíz una única vez. El marcador persistido y la raíz
    /// se escriben juntos, así que un arranque fallido no deja el marcador
    /// reclamado sobre una colección vacía.
    pub async fn bootstrap(&self) -> NodeResult<Option<Node>> {
        let root = Node::root();
        match self.store.seed_root(BOOTSTRAP_MARKER, root.clone()).await? {
            SeedOutcome::Seeded => {
                info!("Nodo raíz sembrado con id {}", root.id);
                Ok(Some(root))
            }
            SeedOutcome::Adopted => {
                info!("La colección ya contiene nodos; se adopta sin sembrar raíz.");
                Ok(None)
            }
            SeedOutcome::AlreadyBootstrapped => {
                info!("Raíz ya inicializada previamente, se omite la siembra.");
                Ok(None)
            }
        }
    }

    pub async fn list_all(&self) -> NodeResult<Vec<Node>> {
        Ok(self.store.find(&NodeFilter::All).await?)
    }

    pub async fn get(&self, node_id: &str) -> NodeResult<Node> {
        self.store
            .find_one(&NodeFilter::Id(node_id.to_string()))
            .await?
            .ok_or_else(|| NodeError::NotFound(node_id.to_string()))
    }

    pub async fn list_descendants(&self, node_id: &str) -> NodeResult<Vec<Node>> {
        Ok(traversal::list_descendants(self.store.as_ref(), node_id, self.traversal).await?)
    }

    pub async fn create(&self, draft: NewNode) -> NodeResult<Node> {
        let node = Node::construct(draft)?;
        if self.integrity == IntegrityMode::Strict {
            self.check_parent(&node).await?;
        }

        let id = self.store.insert_one(node).await?;
        let created = self.get(&id).await?;
        info!("Nodo creado: {} ({}, {})", created.id, created.name, created.node_type);
        Ok(created)
    }

    pub async fn update(&self, node_id: &str, patch: NodePatch) -> NodeResult<Node> {
        if patch.is_empty() {
            return Err(NodeError::NoFieldsToUpdate);
        }

        let existing = self.get(node_id).await?;
        let merged = existing.apply_update(&patch)?;
        if merged == existing {
            return Ok(existing);
        }

        let set = SetFields::between(&existing, &merged);
        let updated = self
            .store
            .find_one_and_update(&NodeFilter::Id(node_id.to_string()), &set)
            .await?
            // Borrado entre la lectura y la escritura.
            .ok_or_else(|| NodeError::NotFound(node_id.to_string()))?;
        info!("Nodo actualizado: {node_id}");
        Ok(updated)
    }

    /// Borra un único nodo. En modo `Lenient` sus hijos quedan huérfanos.
    pub async fn delete(&self, node_id: &str) -> NodeResult<()> {
        if self.integrity == IntegrityMode::Strict {
            let child = self
                .store
                .find_one(&NodeFilter::ParentId(node_id.to_string()))
                .await?;
            if child.is_some() {
                return Err(NodeError::HasChildren(node_id.to_string()));
            }
        }

        let deleted = self
            .store
            .delete_one(&NodeFilter::Id(node_id.to_string()))
            .await?;
        if deleted == 0 {
            return Err(NodeError::NotFound(node_id.to_string()));
        }
        info!("Nodo borrado: {node_id}");
        Ok(())
    }

    pub async fn ping(&self) -> NodeResult<()> {
        Ok(self.store.ping().await?)
    }

    async fn check_parent(&self, node: &Node) -> NodeResult<()> {
        let Some(parent_id) = &node.parent_id else {
            return Ok(());
        };
        match self
            .store
            .find_one(&NodeFilter::Id(parent_id.clone()))
            .await?
        {
            Some(parent) if parent.is_dir() => Ok(()),
            Some(_) => Err(NodeError::ParentNotDirectory(parent_id.clone())),
            None => {
                warn!("Creación rechazada: el padre {parent_id} no existe");
                Err(NodeError::UnknownParent(parent_id.clone()))
            }
        }
    }
}
