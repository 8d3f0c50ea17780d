//! Modelo de dominio: el nodo del árbol (directorio o fichero) y sus
//! invariantes, validados al construir y al actualizar.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Nombre del nodo raíz sembrado al arrancar.
pub const ROOT_NAME: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    #[serde(alias = "dir")]
    Directory,
    File,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Directory => "directory",
            NodeType::File => "file",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "directory" | "dir" => Ok(Self::Directory),
            "file" => Ok(Self::File),
            other => Err(anyhow!("Tipo de nodo desconocido: {other}")),
        }
    }
}

/// Un nodo persistido. Los hijos no se guardan: se descubren consultando
/// por `parent_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub node_type: NodeType,
    pub data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cuerpo de la petición de creación.
#[derive(Debug, Clone, Deserialize)]
pub struct NewNode {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub node_type: NodeType,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Cuerpo de la petición de actualización parcial. `null` equivale a ausente.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NodePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.data.is_none()
    }
}

/// Respuesta de los listados.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeCollection {
    pub nodes: Vec<Node>,
}

impl From<Vec<Node>> for NodeCollection {
    fn from(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}

impl Node {
    /// Construye y valida un nodo nuevo. Si no se aporta `id` se asigna un
    /// UUID v4 en formato simple.
    pub fn construct(draft: NewNode) -> Result<Self, ValidationError> {
        let now = Utc::now();
        let node_type = draft.node_type;
        let data = match node_type {
            NodeType::File => Some(draft.data.unwrap_or_default()),
            NodeType::Directory => draft.data,
        };

        let node = Self {
            id: draft
                .id
                .unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
            name: draft.name,
            parent_id: draft.parent_id,
            node_type,
            data,
            created_at: now,
            updated_at: now,
        };
        node.validate()?;
        Ok(node)
    }

    /// Nodo raíz que se siembra en una colección vacía.
    pub fn root() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().simple().to_string(),
            name: ROOT_NAME.to_string(),
            parent_id: None,
            node_type: NodeType::Directory,
            data: Some(String::new()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Comprueba los invariantes I1–I4.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.node_type == NodeType::Directory
            && self.data.as_deref().is_some_and(|d| !d.is_empty())
        {
            return Err(ValidationError::DirectoryHasData);
        }
        if self.parent_id.as_deref() == Some(self.id.as_str()) {
            return Err(ValidationError::SelfParent);
        }
        if self.node_type == NodeType::File && self.parent_id.is_none() {
            return Err(ValidationError::FileMissingParent);
        }
        Ok(())
    }

    /// Fusiona un parche sobre el nodo existente y revalida el resultado
    /// completo. `updated_at` sólo avanza si algún campo cambia de valor.
    ///
    /// Un parche vacío no es un error aquí; la capa CRUD lo rechaza antes.
    pub fn apply_update(&self, patch: &NodePatch) -> Result<Self, ValidationError> {
        let mut merged = self.clone();
        if let Some(name) = &patch.name {
            merged.name = name.clone();
        }
        if let Some(data) = &patch.data {
            merged.data = Some(data.clone());
        }
        merged.validate()?;

        if merged.name != self.name || merged.data != self.data {
            merged.updated_at = Utc::now();
        }
        Ok(merged)
    }

    pub fn is_dir(&self) -> bool {
        self.node_type == NodeType::Directory
    }
}
