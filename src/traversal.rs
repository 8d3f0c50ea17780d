//! Recorrido en anchura de los descendientes de un nodo.
//!
//! El árbol sólo guarda el puntero al padre, así que los hijos se descubren
//! consultando la colección por `parent_id`. Dos estrategias:
//!   - `PerNode`: una consulta por cada nodo descubierto.
//!   - `PerLevel`: una consulta `parent_id IN {frontera}` por nivel.
//!
//! En ambas se lleva un conjunto de ids visitados (sembrado con la raíz), de
//! modo que el resultado no repite nodos, nunca incluye la raíz y el recorrido
//! termina aunque los datos almacenados formen ciclos.

use std::collections::{HashSet, VecDeque};
use std::str::FromStr;

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::error::StoreResult;
use crate::models::Node;
use crate::store::{NodeFilter, NodeStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TraversalStrategy {
    #[default]
    PerNode,
    PerLevel,
}

impl FromStr for TraversalStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "per-node" | "node" => Ok(Self::PerNode),
            "per-level" | "level" => Ok(Self::PerLevel),
            other => Err(anyhow!("Estrategia de recorrido no soportada: {other}")),
        }
    }
}

/// Todos los nodos alcanzables desde `root_id` siguiendo la relación
/// padre → hijo, sin incluir `root_id`. El orden no está garantizado.
pub async fn list_descendants(
    store: &dyn NodeStore,
    root_id: &str,
    strategy: TraversalStrategy,
) -> StoreResult<Vec<Node>> {
    let mut visited = HashSet::from([root_id.to_string()]);
    let (result, queries) = match strategy {
        TraversalStrategy::PerNode => per_node(store, root_id, &mut visited).await?,
        TraversalStrategy::PerLevel => per_level(store, root_id, &mut visited).await?,
    };
    debug!(
        "Descendientes de {root_id}: {} nodos en {queries} consultas ({strategy:?})",
        result.len()
    );
    Ok(result)
}

async fn per_node(
    store: &dyn NodeStore,
    root_id: &str,
    visited: &mut HashSet<String>,
) -> StoreResult<(Vec<Node>, usize)> {
    let mut result = Vec::new();
    let mut queue = VecDeque::new();
    let mut queries = 1;

    enqueue_unvisited(
        &mut queue,
        visited,
        store.find(&NodeFilter::ParentId(root_id.to_string())).await?,
    );

    while let Some(node) = queue.pop_front() {
        queries += 1;
        let children = store.find(&NodeFilter::ParentId(node.id.clone())).await?;
        enqueue_unvisited(&mut queue, visited, children);
        result.push(node);
    }

    Ok((result, queries))
}

async fn per_level(
    store: &dyn NodeStore,
    root_id: &str,
    visited: &mut HashSet<String>,
) -> StoreResult<(Vec<Node>, usize)> {
    let mut result = Vec::new();
    let mut frontier = vec![root_id.to_string()];
    let mut queries = 0;

    while !frontier.is_empty() {
        queries += 1;
        let level = store.find(&NodeFilter::ParentIn(frontier)).await?;
        let mut fresh = VecDeque::new();
        enqueue_unvisited(&mut fresh, visited, level);

        frontier = fresh.iter().map(|n| n.id.clone()).collect();
        result.extend(fresh);
    }

    Ok((result, queries))
}

/// Encola sólo los nodos que no se habían visto, marcándolos como visitados.
fn enqueue_unvisited(queue: &mut VecDeque<Node>, visited: &mut HashSet<String>, nodes: Vec<Node>) {
    for node in nodes {
        if visited.insert(node.id.clone()) {
            queue.push_back(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::models::NodeType;
    use chrono::Utc;

    const STRATEGIES: [TraversalStrategy; 2] = [TraversalStrategy::PerNode, TraversalStrategy::PerLevel];

    /// Inserta sin validar, para poder fabricar datos malformados.
    async fn raw(store: &MemoryStore, id: &str, parent: Option<&str>, node_type: NodeType) {
        let now = Utc::now();
        store
            .insert_one(Node {
                id: id.to_string(),
                name: id.to_string(),
                parent_id: parent.map(str::to_string),
                node_type,
                data: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    fn ids(nodes: &[Node]) -> Vec<String> {
        let mut ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        ids.sort();
        ids
    }

    async fn sample_tree() -> MemoryStore {
        // root -> a -> b ; root -> c
        let store = MemoryStore::new();
        raw(&store, "root", None, NodeType::Directory).await;
        raw(&store, "a", Some("root"), NodeType::Directory).await;
        raw(&store, "b", Some("a"), NodeType::File).await;
        raw(&store, "c", Some("root"), NodeType::File).await;
        store
    }

    #[tokio::test]
    async fn collects_whole_subtree() {
        let store = sample_tree().await;
        for strategy in STRATEGIES {
            let all = list_descendants(&store, "root", strategy).await.unwrap();
            assert_eq!(ids(&all), vec!["a", "b", "c"]);

            let under_a = list_descendants(&store, "a", strategy).await.unwrap();
            assert_eq!(ids(&under_a), vec!["b"]);

            let leaf = list_descendants(&store, "b", strategy).await.unwrap();
            assert!(leaf.is_empty());
        }
    }

    #[tokio::test]
    async fn unknown_root_has_no_descendants() {
        let store = sample_tree().await;
        for strategy in STRATEGIES {
            assert!(list_descendants(&store, "missing", strategy).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn repeated_listing_is_stable_and_deduplicated() {
        let store = sample_tree().await;
        raw(&store, "d", Some("b"), NodeType::File).await;
        for strategy in STRATEGIES {
            let first = list_descendants(&store, "root", strategy).await.unwrap();
            let second = list_descendants(&store, "root", strategy).await.unwrap();
            assert_eq!(ids(&first), ids(&second));

            let unique: HashSet<_> = first.iter().map(|n| n.id.as_str()).collect();
            assert_eq!(unique.len(), first.len());
        }
    }

    #[tokio::test]
    async fn terminates_on_cycles() {
        // x -> y -> z -> x, y la raíz consultada forma parte del ciclo.
        let store = MemoryStore::new();
        raw(&store, "x", Some("z"), NodeType::Directory).await;
        raw(&store, "y", Some("x"), NodeType::Directory).await;
        raw(&store, "z", Some("y"), NodeType::Directory).await;
        for strategy in STRATEGIES {
            let found = list_descendants(&store, "x", strategy).await.unwrap();
            assert_eq!(ids(&found), vec!["y", "z"]);
        }
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!("per-node".parse::<TraversalStrategy>().unwrap(), TraversalStrategy::PerNode);
        assert_eq!("PER_LEVEL".parse::<TraversalStrategy>().unwrap(), TraversalStrategy::PerLevel);
        assert!("depth".parse::<TraversalStrategy>().is_err());
    }
}
