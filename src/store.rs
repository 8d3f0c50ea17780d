//! Contrato del almacén de documentos: una única colección de nodos con
//! semántica find / find_one / insert_one / find_one_and_update / delete_one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::models::Node;

/// Marcador persistido que indica que el nodo raíz ya se sembró.
pub const BOOTSTRAP_MARKER: &str = "root_bootstrap";

/// Predicados de filtrado soportados por la colección.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeFilter {
    All,
    Id(String),
    ParentId(String),
    /// `parent_id IN {ids}`, para expandir un nivel completo de una vez.
    ParentIn(Vec<String>),
}

impl NodeFilter {
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            NodeFilter::All => true,
            NodeFilter::Id(id) => node.id == *id,
            NodeFilter::ParentId(parent) => node.parent_id.as_deref() == Some(parent.as_str()),
            NodeFilter::ParentIn(parents) => node
                .parent_id
                .as_ref()
                .is_some_and(|p| parents.contains(p)),
        }
    }
}

/// Resultado de `NodeStore::seed_root`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Marcador reclamado y raíz insertada.
    Seeded,
    /// Marcador reclamado sobre una colección que ya tenía nodos.
    Adopted,
    /// El marcador ya existía; no se escribe nada.
    AlreadyBootstrapped,
}

/// Campos que `find_one_and_update` fija sobre el documento (`$set`).
#[derive(Debug, Clone, PartialEq)]
pub struct SetFields {
    pub name: Option<String>,
    pub data: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SetFields {
    /// Diferencia entre el nodo almacenado y su versión fusionada.
    pub fn between(before: &Node, after: &Node) -> Self {
        Self {
            name: (before.name != after.name).then(|| after.name.clone()),
            data: (before.data != after.data).then(|| after.data.clone()).flatten(),
            updated_at: after.updated_at,
        }
    }

    pub fn apply(&self, node: &mut Node) {
        if let Some(name) = &self.name {
            node.name = name.clone();
        }
        if let Some(data) = &self.data {
            node.data = Some(data.clone());
        }
        node.updated_at = self.updated_at;
    }
}

/// Colaborador de persistencia. Ninguna operación coordina con otras:
/// no hay transacciones ni aislamiento entre llamadas.
#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn find(&self, filter: &NodeFilter) -> StoreResult<Vec<Node>>;

    async fn find_one(&self, filter: &NodeFilter) -> StoreResult<Option<Node>>;

    /// Inserta el documento y devuelve el id asignado.
    async fn insert_one(&self, node: Node) -> StoreResult<String>;

    /// Aplica `set` al primer documento que cumple el filtro y lo devuelve
    /// ya actualizado.
    async fn find_one_and_update(
        &self,
        filter: &NodeFilter,
        set: &SetFields,
    ) -> StoreResult<Option<Node>>;

    /// Devuelve el número de documentos borrados (0 ó 1).
    async fn delete_one(&self, filter: &NodeFilter) -> StoreResult<u64>;

    /// Reclama el marcador `marker` y, si la colección está vacía, inserta
    /// `root`. Ambas escrituras ocurren en un único paso atómico: si falla,
    /// no queda ni marcador ni raíz y la siguiente llamada vuelve a intentarlo.
    async fn seed_root(&self, marker: &str, root: Node) -> StoreResult<SeedOutcome>;

    /// Comprobación de salud del almacén.
    async fn ping(&self) -> StoreResult<()>;
}
