//! Errores tipados del dominio (validación, almacén y orquestación CRUD).

use thiserror::Error;

/// Violaciones de los invariantes de un nodo.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("el nombre del nodo no puede estar vacío")]
    EmptyName,

    #[error("los directorios no pueden tener datos")]
    DirectoryHasData,

    #[error("un nodo no puede ser su propio padre")]
    SelfParent,

    #[error("los ficheros deben tener un padre")]
    FileMissingParent,
}

/// Fallos del almacén de documentos.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ya existe un nodo con id {0}")]
    Duplicate(String),

    #[error("error del almacén: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Errores que la capa CRUD devuelve a quien la invoca.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("nodo {0} no encontrado")]
    NotFound(String),

    #[error("no hay valores que actualizar")]
    NoFieldsToUpdate,

    #[error("el nodo padre {0} no existe")]
    UnknownParent(String),

    #[error("el nodo padre {0} no es un directorio")]
    ParentNotDirectory(String),

    #[error("el nodo {0} todavía tiene hijos")]
    HasChildren(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl NodeError {
    /// Identificador estable del tipo de error, expuesto en las respuestas HTTP.
    pub fn code(&self) -> &'static str {
        match self {
            NodeError::Validation(ValidationError::EmptyName) => "empty_name",
            NodeError::Validation(ValidationError::DirectoryHasData) => "directory_has_data",
            NodeError::Validation(ValidationError::SelfParent) => "self_parent",
            NodeError::Validation(ValidationError::FileMissingParent) => "file_missing_parent",
            NodeError::NotFound(_) => "not_found",
            NodeError::NoFieldsToUpdate => "no_fields_to_update",
            NodeError::UnknownParent(_) => "unknown_parent",
            NodeError::ParentNotDirectory(_) => "parent_not_directory",
            NodeError::HasChildren(_) => "has_children",
            NodeError::Store(StoreError::Duplicate(_)) => "duplicate_id",
            NodeError::Store(StoreError::Backend(_)) => "store_error",
        }
    }
}

pub type NodeResult<T> = Result<T, NodeError>;
pub type StoreResult<T> = Result<T, StoreError>;
