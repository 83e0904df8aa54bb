use log::info;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;

use crate::error::{AdapterError, Result};
use crate::logic::element_filter;
use crate::model::{
    Artifact, ArtifactInput, Blob, Branch, BranchInput, BranchScope, Element, ElementInput,
    ElementQuery, Id, Org, OrgInput, Project, ProjectInput, ProjectScope, UserContext,
};
use crate::store::records;
use crate::store::traits::{
    ArtifactStore, Backend, BranchStore, ElementStore, OrgStore, ProjectStore,
};

/// Entity tables; each row holds the composite id, the composite id of the
/// owning scope and the serialized entity
#[derive(Debug, Clone, Copy)]
enum Table {
    Orgs,
    Projects,
    Branches,
    Elements,
    Artifacts,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::Orgs => "orgs",
            Table::Projects => "projects",
            Table::Branches => "branches",
            Table::Elements => "elements",
            Table::Artifacts => "artifacts",
        }
    }

    const ALL: [Table; 5] = [
        Table::Orgs,
        Table::Projects,
        Table::Branches,
        Table::Elements,
        Table::Artifacts,
    ];
}

/// Scope column value for orgs, which have no parent
const ROOT_SCOPE: &str = "";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        use anyhow::Context;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the tables if they do not exist yet
    pub async fn migrate(&self) -> Result<()> {
        for table in Table::ALL {
            let ddl = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {name} (
                    id TEXT PRIMARY KEY,
                    scope TEXT NOT NULL,
                    doc JSONB NOT NULL
                )
                "#,
                name = table.name()
            );
            sqlx::query(&ddl).execute(&self.pool).await?;
            let index = format!(
                "CREATE INDEX IF NOT EXISTS {name}_scope_idx ON {name} (scope)",
                name = table.name()
            );
            sqlx::query(&index).execute(&self.pool).await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blobs (
                project TEXT NOT NULL,
                id TEXT NOT NULL,
                content_type TEXT NOT NULL,
                data BYTEA NOT NULL,
                PRIMARY KEY (project, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database schema ready");
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn exists(&self, table: Table, id: &str) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE id = $1", table.name());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn require_org(&self, org_id: &str) -> Result<()> {
        if self.exists(Table::Orgs, org_id).await? {
            Ok(())
        } else {
            Err(AdapterError::not_found(format!("Org '{}' not found", org_id)))
        }
    }

    async fn require_project(&self, scope: &ProjectScope) -> Result<()> {
        self.require_org(&scope.org_id).await?;
        if self.exists(Table::Projects, &scope.key()).await? {
            Ok(())
        } else {
            Err(AdapterError::not_found(format!(
                "Project '{}' not found",
                scope.project_id
            )))
        }
    }

    async fn require_branch(&self, scope: &BranchScope) -> Result<()> {
        self.require_project(&scope.project()).await?;
        if self.exists(Table::Branches, &scope.key()).await? {
            Ok(())
        } else {
            Err(AdapterError::not_found(format!(
                "Branch '{}' not found",
                scope.branch_id
            )))
        }
    }

    async fn fetch_scope<T: DeserializeOwned + Send + Unpin + 'static>(
        &self,
        table: Table,
        scope: &str,
    ) -> Result<Vec<T>> {
        let sql = format!(
            "SELECT doc FROM {} WHERE scope = $1 ORDER BY id",
            table.name()
        );
        let rows = sqlx::query(&sql).bind(scope).fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| Ok(row.try_get::<Json<T>, _>("doc")?.0))
            .collect()
    }

    async fn fetch_all<T: DeserializeOwned + Send + Unpin + 'static>(
        &self,
        table: Table,
    ) -> Result<Vec<T>> {
        let sql = format!("SELECT doc FROM {} ORDER BY id", table.name());
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| Ok(row.try_get::<Json<T>, _>("doc")?.0))
            .collect()
    }

    /// Rows for the given composite ids, in the order requested
    async fn fetch_keys<T: DeserializeOwned + Send + Unpin + 'static>(
        &self,
        table: Table,
        keys: &[String],
    ) -> Result<Vec<T>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT id, doc FROM {} WHERE id = ANY($1)", table.name());
        let rows = sqlx::query(&sql).bind(keys).fetch_all(&self.pool).await?;
        let mut by_key = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            by_key.insert(id, row.try_get::<Json<T>, _>("doc")?.0);
        }
        Ok(keys.iter().filter_map(|key| by_key.remove(key)).collect())
    }

    async fn fetch_one<T: DeserializeOwned + Send + Unpin + 'static>(
        &self,
        table: Table,
        key: &str,
    ) -> Result<Option<T>> {
        let sql = format!("SELECT doc FROM {} WHERE id = $1", table.name());
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| Ok(row.try_get::<Json<T>, _>("doc")?.0))
            .transpose()
    }

    async fn upsert<T: Serialize + Sync>(
        tx: &mut Transaction<'_, Postgres>,
        table: Table,
        id: &str,
        scope: &str,
        doc: &T,
    ) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO {} (id, scope, doc)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                scope = EXCLUDED.scope,
                doc = EXCLUDED.doc
            "#,
            table.name()
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(scope)
            .bind(Json(doc))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

/// Compress blob contents using gzip
fn compress_data(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| AdapterError::server(format!("Failed to compress blob: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| AdapterError::server(format!("Failed to compress blob: {}", e)))
}

fn decompress_data(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| AdapterError::server(format!("Failed to decompress blob: {}", e)))?;
    Ok(decompressed)
}

fn selected(ids: Option<&[Id]>, local_id: &str) -> bool {
    ids.map_or(true, |ids| ids.iter().any(|id| id == local_id))
}

#[async_trait::async_trait]
impl OrgStore for PostgresStore {
    async fn find_orgs(&self, _user: &UserContext, ids: Option<&[Id]>) -> Result<Vec<Org>> {
        match ids {
            Some(ids) => self.fetch_keys(Table::Orgs, ids).await,
            None => self.fetch_all(Table::Orgs).await,
        }
    }

    async fn create_or_replace_orgs(
        &self,
        user: &UserContext,
        orgs: Vec<OrgInput>,
    ) -> Result<Vec<Org>> {
        let mut tx = self.pool.begin().await?;
        let mut written = Vec::with_capacity(orgs.len());
        for input in orgs {
            let existing: Option<Org> = self.fetch_one(Table::Orgs, &input.id).await?;
            let org = records::org_record(user, input, existing.as_ref())?;
            Self::upsert(&mut tx, Table::Orgs, &org.id, ROOT_SCOPE, &org).await?;
            written.push(org);
        }
        tx.commit().await?;
        Ok(written)
    }
}

#[async_trait::async_trait]
impl ProjectStore for PostgresStore {
    async fn find_projects(
        &self,
        _user: &UserContext,
        org_id: &Id,
        ids: Option<&[Id]>,
    ) -> Result<Vec<Project>> {
        self.require_org(org_id).await?;
        let projects: Vec<Project> = self.fetch_scope(Table::Projects, org_id).await?;
        Ok(projects
            .into_iter()
            .filter(|project| selected(ids, project.local_id()))
            .collect())
    }

    async fn find_all_projects(&self, _user: &UserContext) -> Result<Vec<Project>> {
        self.fetch_all(Table::Projects).await
    }

    async fn lookup_project(&self, _user: &UserContext, project_id: &Id) -> Result<Option<Project>> {
        let projects: Vec<Project> = self.fetch_all(Table::Projects).await?;
        Ok(projects
            .into_iter()
            .find(|project| project.local_id() == project_id))
    }

    async fn create_or_replace_projects(
        &self,
        user: &UserContext,
        org_id: &Id,
        projects: Vec<ProjectInput>,
    ) -> Result<Vec<Project>> {
        self.require_org(org_id).await?;
        let mut tx = self.pool.begin().await?;
        let mut written = Vec::with_capacity(projects.len());
        for input in projects {
            let scope = ProjectScope::new(org_id.clone(), input.id.clone())?;
            let existing: Option<Project> = self.fetch_one(Table::Projects, &scope.key()).await?;
            let project = records::project_record(user, &scope, input, existing.as_ref());
            Self::upsert(&mut tx, Table::Projects, &project.id, org_id, &project).await?;

            let master = records::master_branch(user, &scope)?;
            if !self.exists(Table::Branches, &master.id).await? {
                Self::upsert(&mut tx, Table::Branches, &master.id, &scope.key(), &master).await?;
            }
            written.push(project);
        }
        tx.commit().await?;
        Ok(written)
    }
}

#[async_trait::async_trait]
impl BranchStore for PostgresStore {
    async fn find_branches(
        &self,
        _user: &UserContext,
        scope: &ProjectScope,
        ids: Option<&[Id]>,
    ) -> Result<Vec<Branch>> {
        self.require_project(scope).await?;
        let branches: Vec<Branch> = self.fetch_scope(Table::Branches, &scope.key()).await?;
        Ok(branches
            .into_iter()
            .filter(|branch| selected(ids, branch.local_id()))
            .collect())
    }

    async fn create_branches(
        &self,
        user: &UserContext,
        scope: &ProjectScope,
        branches: Vec<BranchInput>,
    ) -> Result<Vec<Branch>> {
        self.require_project(scope).await?;
        let mut tx = self.pool.begin().await?;
        let mut written = Vec::with_capacity(branches.len());
        for input in branches {
            let branch = records::branch_record(user, scope, input)?;
            if self.exists(Table::Branches, &branch.id).await? {
                return Err(AdapterError::bad_request(format!(
                    "Branch '{}' already exists",
                    branch.local_id()
                )));
            }
            if let Some(parent) = &branch.parent {
                let parent_scope = scope.branch(parent.clone())?;
                if !self.exists(Table::Branches, &parent_scope.key()).await? {
                    return Err(AdapterError::not_found(format!(
                        "Parent branch '{}' not found",
                        parent
                    )));
                }
                let target = scope.branch(branch.local_id())?;
                let elements: Vec<Element> =
                    self.fetch_scope(Table::Elements, &parent_scope.key()).await?;
                for element in &elements {
                    let copy = records::branch_copy(element, &target)?;
                    Self::upsert(&mut tx, Table::Elements, &copy.id, &target.key(), &copy).await?;
                }
                info!(
                    "Branch '{}' created from '{}' with {} elements",
                    branch.local_id(),
                    parent,
                    elements.len()
                );
            }
            Self::upsert(&mut tx, Table::Branches, &branch.id, &scope.key(), &branch).await?;
            written.push(branch);
        }
        tx.commit().await?;
        Ok(written)
    }
}

#[async_trait::async_trait]
impl ElementStore for PostgresStore {
    async fn find_elements(
        &self,
        _user: &UserContext,
        scope: &BranchScope,
        query: ElementQuery,
    ) -> Result<Vec<Element>> {
        self.require_branch(scope).await?;
        match query {
            ElementQuery::All => self.fetch_scope(Table::Elements, &scope.key()).await,
            ElementQuery::Ids(ids) => {
                let keys = ids
                    .iter()
                    .map(|id| scope.element_key(id))
                    .collect::<Result<Vec<_>>>()?;
                self.fetch_keys(Table::Elements, &keys).await
            }
            ElementQuery::Keys(keys) => self.fetch_keys(Table::Elements, &keys).await,
            ElementQuery::Filter(filter) => {
                let elements: Vec<Element> =
                    self.fetch_scope(Table::Elements, &scope.key()).await?;
                Ok(element_filter::filter_elements(elements, &filter))
            }
        }
    }

    async fn create_or_replace_elements(
        &self,
        user: &UserContext,
        scope: &BranchScope,
        elements: Vec<ElementInput>,
    ) -> Result<Vec<Element>> {
        self.require_branch(scope).await?;
        let keys = elements
            .iter()
            .map(|input| scope.element_key(&input.id))
            .collect::<Result<Vec<_>>>()?;
        let mut existing: HashMap<Id, Element> = self
            .fetch_keys::<Element>(Table::Elements, &keys)
            .await?
            .into_iter()
            .map(|element| (element.id.clone(), element))
            .collect();

        let mut tx = self.pool.begin().await?;
        let mut written = Vec::with_capacity(elements.len());
        for (input, key) in elements.into_iter().zip(keys) {
            let element = records::element_record(user, scope, input, existing.get(&key))?;
            Self::upsert(&mut tx, Table::Elements, &key, &scope.key(), &element).await?;
            existing.insert(key, element.clone());
            written.push(element);
        }
        tx.commit().await?;
        Ok(written)
    }

    async fn remove_elements(
        &self,
        _user: &UserContext,
        scope: &BranchScope,
        ids: &[Id],
    ) -> Result<Vec<Element>> {
        self.require_branch(scope).await?;
        let keys = ids
            .iter()
            .map(|id| scope.element_key(id))
            .collect::<Result<Vec<_>>>()?;
        let rows = sqlx::query("DELETE FROM elements WHERE id = ANY($1) RETURNING doc")
            .bind(&keys)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| Ok(row.try_get::<Json<Element>, _>("doc")?.0))
            .collect()
    }
}

#[async_trait::async_trait]
impl ArtifactStore for PostgresStore {
    async fn find_artifacts(
        &self,
        _user: &UserContext,
        scope: &BranchScope,
        ids: Option<&[Id]>,
    ) -> Result<Vec<Artifact>> {
        self.require_branch(scope).await?;
        let artifacts: Vec<Artifact> = self.fetch_scope(Table::Artifacts, &scope.key()).await?;
        Ok(artifacts
            .into_iter()
            .filter(|artifact| selected(ids, artifact.local_id()))
            .collect())
    }

    async fn create_or_replace_artifacts(
        &self,
        user: &UserContext,
        scope: &BranchScope,
        artifacts: Vec<ArtifactInput>,
    ) -> Result<Vec<Artifact>> {
        self.require_branch(scope).await?;
        let mut tx = self.pool.begin().await?;
        let mut written = Vec::with_capacity(artifacts.len());
        for input in artifacts {
            let key = scope.element_key(&input.id)?;
            let existing: Option<Artifact> = self.fetch_one(Table::Artifacts, &key).await?;
            let artifact = records::artifact_record(user, scope, input, existing.as_ref())?;
            Self::upsert(&mut tx, Table::Artifacts, &key, &scope.key(), &artifact).await?;
            written.push(artifact);
        }
        tx.commit().await?;
        Ok(written)
    }

    async fn put_blob(&self, _user: &UserContext, scope: &ProjectScope, blob: Blob) -> Result<()> {
        self.require_project(scope).await?;
        let compressed = compress_data(&blob.data)?;
        sqlx::query(
            r#"
            INSERT INTO blobs (project, id, content_type, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (project, id) DO NOTHING
            "#,
        )
        .bind(scope.key())
        .bind(&blob.id)
        .bind(&blob.content_type)
        .bind(compressed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_blob(
        &self,
        _user: &UserContext,
        scope: &ProjectScope,
        blob_id: &str,
    ) -> Result<Option<Blob>> {
        self.require_project(scope).await?;
        let row = sqlx::query("SELECT content_type, data FROM blobs WHERE project = $1 AND id = $2")
            .bind(scope.key())
            .bind(blob_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let data: Vec<u8> = row.try_get("data")?;
        Ok(Some(Blob {
            id: blob_id.to_string(),
            content_type: row.try_get("content_type")?,
            data: decompress_data(&data)?,
        }))
    }
}

impl Backend for PostgresStore {}
