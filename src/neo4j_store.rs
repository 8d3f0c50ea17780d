//! `NodeStore` sobre Neo4j: cada documento es un nodo `:Node` con sus campos
//! como propiedades. Los hijos se resuelven por la propiedad `parent_id`,
//! que se indexa en `ensure_schema`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{query, Graph, Query, Row};
use tracing::info;
use url::Url;

use crate::config::AppConfig;
use crate::error::{StoreError, StoreResult};
use crate::models::{Node, NodeType};
use crate::store::{NodeFilter, NodeStore, SeedOutcome, SetFields};

const NODE_PROJECTION: &str = "n.id AS id, n.name AS name, n.parent_id AS parent_id, \
     n.node_type AS node_type, n.data AS data, \
     n.created_at AS created_at, n.updated_at AS updated_at";

pub async fn connect_from_config(cfg: &AppConfig) -> Result<Graph> {
    let neo4j = cfg
        .neo4j
        .as_ref()
        .ok_or_else(|| anyhow!("Falta la configuración de Neo4j"))?;
    let url = Url::parse(&neo4j.uri)?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    let addr = format!("{host}:{port}");

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &neo4j.user, &neo4j.password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// Unicidad de `:Node(id)` y `:Marker(name)`, e índice sobre `parent_id`
/// para que la expansión de hijos no recorra toda la colección.
pub async fn ensure_schema(graph: &Graph) -> Result<()> {
    let statements = [
        "CREATE CONSTRAINT node_id IF NOT EXISTS
         FOR (n:Node)
         REQUIRE n.id IS UNIQUE",
        "CREATE INDEX node_parent_id IF NOT EXISTS
         FOR (n:Node)
         ON (n.parent_id)",
        "CREATE CONSTRAINT marker_name IF NOT EXISTS
         FOR (m:Marker)
         REQUIRE m.name IS UNIQUE",
    ];

    for stmt in statements {
        graph.run(query(stmt)).await?;
    }

    info!("Esquema de Neo4j asegurado (constraints e índice de parent_id).");
    Ok(())
}

/// Siembra atómica de la raíz: una sola sentencia (y por tanto una sola
/// transacción) reclama el marcador y crea la raíz si no hay nodos.
const SEED_ROOT: &str = "MERGE (m:Marker {name: $marker})
     ON CREATE SET m.created_at = $created_at, m.fresh = 1
     ON MATCH SET m.fresh = 0
     WITH m, m.fresh AS fresh
     REMOVE m.fresh
     WITH fresh
     OPTIONAL MATCH (existing:Node)
     WITH fresh, count(existing) AS total
     FOREACH (x IN CASE WHEN fresh = 1 AND total = 0 THEN [1] ELSE [] END |
       CREATE (:Node {id: $id, name: $name, node_type: $node_type, data: $data,
                      created_at: $created_at, updated_at: $updated_at}))
     RETURN fresh, total";

pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    async fn fetch(&self, filter: &NodeFilter, limit: Option<usize>) -> Result<Vec<Node>> {
        let limit = limit.map(|l| format!(" LIMIT {l}")).unwrap_or_default();
        let cypher = format!("{} RETURN {NODE_PROJECTION}{limit}", match_clause(filter));
        let mut cursor = self.graph.execute(bind(query(&cypher), filter)).await?;

        let mut nodes = Vec::new();
        while let Some(row) = cursor.next().await? {
            nodes.push(node_from_row(&row)?);
        }
        Ok(nodes)
    }

    /// Devuelve `false` si ya existía un nodo con ese id.
    async fn create(&self, node: &Node) -> Result<bool> {
        let q = bind_node(query(&insert_cypher(node)), node);
        let mut cursor = self.graph.execute(q).await?;
        let row = cursor
            .next()
            .await?
            .ok_or_else(|| anyhow!("MERGE del nodo {} no devolvió filas", node.id))?;
        let inserted = row
            .get::<i64>("inserted")
            .ok_or_else(|| anyhow!("Falta campo 'inserted' en resultado de Neo4j"))?;
        Ok(inserted == 1)
    }

    async fn set_fields(&self, filter: &NodeFilter, set: &SetFields) -> Result<Option<Node>> {
        let cypher = update_cypher(filter, set);
        let mut q = bind(query(&cypher), filter).param("updated_at", set.updated_at.to_rfc3339());
        if let Some(name) = &set.name {
            q = q.param("name", name.clone());
        }
        if let Some(data) = &set.data {
            q = q.param("data", data.clone());
        }

        let mut cursor = self.graph.execute(q).await?;
        match cursor.next().await? {
            Some(row) => Ok(Some(node_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, filter: &NodeFilter) -> Result<u64> {
        let cypher = format!(
            "{} WITH n LIMIT 1 DELETE n RETURN count(*) AS deleted",
            match_clause(filter)
        );
        let mut cursor = self.graph.execute(bind(query(&cypher), filter)).await?;
        let deleted = match cursor.next().await? {
            Some(row) => row.get::<i64>("deleted").unwrap_or(0),
            None => 0,
        };
        Ok(deleted.max(0) as u64)
    }

    async fn seed(&self, marker: &str, root: &Node) -> Result<SeedOutcome> {
        let q = query(SEED_ROOT)
            .param("marker", marker)
            .param("id", root.id.clone())
            .param("name", root.name.clone())
            .param("node_type", root.node_type.as_str())
            .param("data", root.data.clone().unwrap_or_default())
            .param("created_at", root.created_at.to_rfc3339())
            .param("updated_at", root.updated_at.to_rfc3339());
        let mut cursor = self.graph.execute(q).await?;
        let row = cursor
            .next()
            .await?
            .ok_or_else(|| anyhow!("La siembra de la raíz no devolvió filas"))?;
        let fresh = row
            .get::<i64>("fresh")
            .ok_or_else(|| anyhow!("Falta campo 'fresh' en resultado de Neo4j"))?;
        let total = row
            .get::<i64>("total")
            .ok_or_else(|| anyhow!("Falta campo 'total' en resultado de Neo4j"))?;
        Ok(seed_outcome(fresh == 1, total))
    }
}

fn match_clause(filter: &NodeFilter) -> &'static str {
    match filter {
        NodeFilter::All => "MATCH (n:Node)",
        NodeFilter::Id(_) => "MATCH (n:Node {id: $id})",
        NodeFilter::ParentId(_) => "MATCH (n:Node {parent_id: $parent_id})",
        NodeFilter::ParentIn(_) => "MATCH (n:Node) WHERE n.parent_id IN $parent_ids",
    }
}

fn bind(q: Query, filter: &NodeFilter) -> Query {
    match filter {
        NodeFilter::All => q,
        NodeFilter::Id(id) => q.param("id", id.clone()),
        NodeFilter::ParentId(parent) => q.param("parent_id", parent.clone()),
        NodeFilter::ParentIn(parents) => q.param("parent_ids", parents.clone()),
    }
}

/// `MERGE` por id: la comprobación de duplicado y la creación son la misma
/// sentencia, protegida por la constraint `node_id`. `inserted` es `true`
/// sólo si esta sentencia creó el nodo.
fn insert_cypher(node: &Node) -> String {
    let mut assignments = vec![
        "n.name = $name",
        "n.node_type = $node_type",
        "n.created_at = $created_at",
        "n.updated_at = $updated_at",
    ];
    if node.parent_id.is_some() {
        assignments.push("n.parent_id = $parent_id");
    }
    if node.data.is_some() {
        assignments.push("n.data = $data");
    }
    format!(
        "MERGE (n:Node {{id: $id}}) \
         ON CREATE SET {}, n.inserted_now = 1 \
         ON MATCH SET n.inserted_now = 0 \
         WITH n, n.inserted_now AS inserted \
         REMOVE n.inserted_now \
         RETURN inserted",
        assignments.join(", ")
    )
}

fn bind_node(q: Query, node: &Node) -> Query {
    let mut q = q
        .param("id", node.id.clone())
        .param("name", node.name.clone())
        .param("node_type", node.node_type.as_str())
        .param("created_at", node.created_at.to_rfc3339())
        .param("updated_at", node.updated_at.to_rfc3339());
    if let Some(parent_id) = &node.parent_id {
        q = q.param("parent_id", parent_id.clone());
    }
    if let Some(data) = &node.data {
        q = q.param("data", data.clone());
    }
    q
}

fn update_cypher(filter: &NodeFilter, set: &SetFields) -> String {
    let mut assignments = vec!["n.updated_at = $updated_at"];
    if set.name.is_some() {
        assignments.push("n.name = $name");
    }
    if set.data.is_some() {
        assignments.push("n.data = $data");
    }
    format!(
        "{} WITH n LIMIT 1 SET {} RETURN {NODE_PROJECTION}",
        match_clause(filter),
        assignments.join(", ")
    )
}

fn seed_outcome(fresh: bool, total: i64) -> SeedOutcome {
    match (fresh, total) {
        (false, _) => SeedOutcome::AlreadyBootstrapped,
        (true, 0) => SeedOutcome::Seeded,
        (true, _) => SeedOutcome::Adopted,
    }
}

fn node_from_row(row: &Row) -> Result<Node> {
    decode_node(|name| row.get::<String>(name))
}

/// Reconstruye un nodo a partir de sus propiedades. Las propiedades nulas
/// (`parent_id`, `data`) llegan como `None`.
fn decode_node<F>(get: F) -> Result<Node>
where
    F: Fn(&str) -> Option<String>,
{
    let field = |name: &str| -> Result<String> {
        get(name).ok_or_else(|| anyhow!("Falta campo '{name}' en resultado de Neo4j"))
    };
    let timestamp = |name: &str| -> Result<DateTime<Utc>> {
        let raw = field(name)?;
        let parsed = DateTime::parse_from_rfc3339(&raw)
            .with_context(|| format!("Fecha inválida en '{name}': {raw}"))?;
        Ok(parsed.with_timezone(&Utc))
    };

    Ok(Node {
        id: field("id")?,
        name: field("name")?,
        parent_id: get("parent_id"),
        node_type: field("node_type")?.parse::<NodeType>()?,
        data: get("data"),
        created_at: timestamp("created_at")?,
        updated_at: timestamp("updated_at")?,
    })
}

#[async_trait]
impl NodeStore for Neo4jStore {
    async fn find(&self, filter: &NodeFilter) -> StoreResult<Vec<Node>> {
        Ok(self.fetch(filter, None).await?)
    }

    async fn find_one(&self, filter: &NodeFilter) -> StoreResult<Option<Node>> {
        Ok(self.fetch(filter, Some(1)).await?.into_iter().next())
    }

    async fn insert_one(&self, node: Node) -> StoreResult<String> {
        if !self.create(&node).await? {
            return Err(StoreError::Duplicate(node.id));
        }
        Ok(node.id)
    }

    async fn find_one_and_update(
        &self,
        filter: &NodeFilter,
        set: &SetFields,
    ) -> StoreResult<Option<Node>> {
        Ok(self.set_fields(filter, set).await?)
    }

    async fn delete_one(&self, filter: &NodeFilter) -> StoreResult<u64> {
        Ok(self.remove(filter).await?)
    }

    async fn seed_root(&self, marker: &str, root: Node) -> StoreResult<SeedOutcome> {
        Ok(self.seed(marker, &root).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| StoreError::Backend(e.into()))
    }
}
