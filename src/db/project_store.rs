use crate::db::db_pool::{build_pool, DuckDBConnectionManager};
use crate::db::models::{
    GenerationHistory, InputType, NewGenerationHistory, NewSchemaProject, ProjectUpdate,
    ProjectWithHistory, SchemaProject,
};
use crate::db::StoreError;
use chrono::{SecondsFormat, Utc};
use duckdb::{params, Connection, Row};
use r2d2::Pool;
use std::path::Path;
use tracing::{debug, info};

const SCHEMA_DDL: &str = "
    CREATE TABLE IF NOT EXISTS schema_projects (
        id VARCHAR PRIMARY KEY,
        owner_id VARCHAR NOT NULL,
        name VARCHAR NOT NULL,
        description VARCHAR,
        input_type VARCHAR NOT NULL,
        original_prompt VARCHAR,
        uploaded_sql VARCHAR,
        generated_sql VARCHAR NOT NULL,
        ai_explanation VARCHAR,
        ai_suggestions VARCHAR NOT NULL DEFAULT '[]',
        tags VARCHAR NOT NULL DEFAULT '[]',
        is_favorite BOOLEAN NOT NULL DEFAULT false,
        created_at VARCHAR NOT NULL,
        updated_at VARCHAR NOT NULL
    );

    CREATE TABLE IF NOT EXISTS generation_history (
        id VARCHAR PRIMARY KEY,
        project_id VARCHAR NOT NULL,
        prompt_used VARCHAR NOT NULL,
        sql_generated VARCHAR NOT NULL,
        ai_model VARCHAR NOT NULL,
        generation_time_ms BIGINT NOT NULL,
        tokens_used BIGINT,
        created_at VARCHAR NOT NULL
    );
";

const PROJECT_COLUMNS: &str = "id, owner_id, name, description, input_type, original_prompt, \
     uploaded_sql, generated_sql, ai_explanation, ai_suggestions, tags, is_favorite, \
     created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, project_id, prompt_used, sql_generated, ai_model, \
     generation_time_ms, tokens_used, created_at";

// Row as stored; list columns are JSON text until decoded
struct ProjectRow {
    id: String,
    owner_id: String,
    name: String,
    description: Option<String>,
    input_type: String,
    original_prompt: Option<String>,
    uploaded_sql: Option<String>,
    generated_sql: String,
    ai_explanation: Option<String>,
    ai_suggestions: String,
    tags: String,
    is_favorite: bool,
    created_at: String,
    updated_at: String,
}

impl ProjectRow {
    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            input_type: row.get(4)?,
            original_prompt: row.get(5)?,
            uploaded_sql: row.get(6)?,
            generated_sql: row.get(7)?,
            ai_explanation: row.get(8)?,
            ai_suggestions: row.get(9)?,
            tags: row.get(10)?,
            is_favorite: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn into_project(self) -> Result<SchemaProject, StoreError> {
        Ok(SchemaProject {
            input_type: InputType::parse(&self.input_type).unwrap_or(InputType::Prompt),
            ai_suggestions: serde_json::from_str(&self.ai_suggestions)?,
            tags: serde_json::from_str(&self.tags)?,
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            description: self.description,
            original_prompt: self.original_prompt,
            uploaded_sql: self.uploaded_sql,
            generated_sql: self.generated_sql,
            ai_explanation: self.ai_explanation,
            is_favorite: self.is_favorite,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn history_from_row(row: &Row<'_>) -> duckdb::Result<GenerationHistory> {
    Ok(GenerationHistory {
        id: row.get(0)?,
        project_id: row.get(1)?,
        prompt_used: row.get(2)?,
        sql_generated: row.get(3)?,
        ai_model: row.get(4)?,
        generation_time_ms: row.get(5)?,
        tokens_used: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Schema projects and their generation history, kept in DuckDB.
#[derive(Clone)]
pub struct ProjectStore {
    pool: Pool<DuckDBConnectionManager>,
}

impl ProjectStore {
    pub fn open(path: &Path, pool_size: u32) -> Result<Self, StoreError> {
        let store = Self {
            pool: build_pool(path, pool_size)?,
        };
        store.pool.get()?.execute_batch(SCHEMA_DDL)?;
        info!("Project store ready ({} connections)", pool_size.max(1));
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::open(Path::new(":memory:"), 2)
    }

    /// All projects of an owner, most recently updated first.
    pub fn list_projects(&self, owner_id: &str) -> Result<Vec<SchemaProject>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM schema_projects WHERE owner_id = ? ORDER BY updated_at DESC",
            PROJECT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![owner_id], ProjectRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(ProjectRow::into_project).collect()
    }

    /// Projects whose name or description contains `term` (case-insensitive) or that carry it
    /// as a tag.
    pub fn search_projects(&self, owner_id: &str, term: &str) -> Result<Vec<SchemaProject>, StoreError> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return self.list_projects(owner_id);
        }

        let matches = |text: Option<&str>| text.is_some_and(|t| t.to_lowercase().contains(&needle));

        Ok(self
            .list_projects(owner_id)?
            .into_iter()
            .filter(|p| {
                matches(Some(p.name.as_str()))
                    || matches(p.description.as_deref())
                    || p.tags.iter().any(|tag| tag.to_lowercase() == needle)
            })
            .collect())
    }

    pub fn get_project(&self, id: &str) -> Result<Option<SchemaProject>, StoreError> {
        let conn = self.pool.get()?;
        fetch_project(&conn, id)
    }

    pub fn get_project_with_history(&self, id: &str) -> Result<Option<ProjectWithHistory>, StoreError> {
        let Some(project) = self.get_project(id)? else {
            return Ok(None);
        };
        let generation_history = self.list_history(id)?;
        Ok(Some(ProjectWithHistory {
            project,
            generation_history,
        }))
    }

    pub fn create_project(&self, new: NewSchemaProject) -> Result<SchemaProject, StoreError> {
        let timestamp = now();
        let project = SchemaProject {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: new.owner_id,
            name: new.name,
            description: new.description,
            input_type: new.input_type,
            original_prompt: new.original_prompt,
            uploaded_sql: new.uploaded_sql,
            generated_sql: new.generated_sql,
            ai_explanation: new.ai_explanation,
            ai_suggestions: new.ai_suggestions,
            tags: new.tags,
            is_favorite: new.is_favorite,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };

        let conn = self.pool.get()?;
        conn.execute(
            &format!(
                "INSERT INTO schema_projects ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                PROJECT_COLUMNS
            ),
            params![
                project.id,
                project.owner_id,
                project.name,
                project.description,
                project.input_type.as_str(),
                project.original_prompt,
                project.uploaded_sql,
                project.generated_sql,
                project.ai_explanation,
                serde_json::to_string(&project.ai_suggestions)?,
                serde_json::to_string(&project.tags)?,
                project.is_favorite,
                project.created_at,
                project.updated_at,
            ],
        )?;

        debug!("Created project {} for owner {}", project.id, project.owner_id);
        Ok(project)
    }

    pub fn update_project(&self, id: &str, update: ProjectUpdate) -> Result<SchemaProject, StoreError> {
        let conn = self.pool.get()?;
        let mut project =
            fetch_project(&conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(name) = update.name {
            project.name = name;
        }
        if let Some(description) = update.description {
            project.description = Some(description);
        }
        if let Some(sql) = update.generated_sql {
            project.generated_sql = sql;
        }
        if let Some(explanation) = update.ai_explanation {
            project.ai_explanation = Some(explanation);
        }
        if let Some(suggestions) = update.ai_suggestions {
            project.ai_suggestions = suggestions;
        }
        if let Some(tags) = update.tags {
            project.tags = tags;
        }
        if let Some(is_favorite) = update.is_favorite {
            project.is_favorite = is_favorite;
        }
        project.updated_at = now();

        conn.execute(
            "UPDATE schema_projects SET name = ?, description = ?, generated_sql = ?, \
             ai_explanation = ?, ai_suggestions = ?, tags = ?, is_favorite = ?, updated_at = ? \
             WHERE id = ?",
            params![
                project.name,
                project.description,
                project.generated_sql,
                project.ai_explanation,
                serde_json::to_string(&project.ai_suggestions)?,
                serde_json::to_string(&project.tags)?,
                project.is_favorite,
                project.updated_at,
                project.id,
            ],
        )?;

        Ok(project)
    }

    pub fn set_favorite(&self, id: &str, is_favorite: bool) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE schema_projects SET is_favorite = ? WHERE id = ?",
            params![is_favorite, id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Removes a project together with its history.
    pub fn delete_project(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM generation_history WHERE project_id = ?", params![id])?;
        let deleted = tx.execute("DELETE FROM schema_projects WHERE id = ?", params![id])?;
        if deleted == 0 {
            tx.rollback()?;
            return Err(StoreError::NotFound(id.to_string()));
        }
        tx.commit()?;
        debug!("Deleted project {}", id);
        Ok(())
    }

    pub fn add_history(&self, entry: NewGenerationHistory) -> Result<GenerationHistory, StoreError> {
        let conn = self.pool.get()?;
        if fetch_project(&conn, &entry.project_id)?.is_none() {
            return Err(StoreError::NotFound(entry.project_id));
        }

        let history = GenerationHistory {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: entry.project_id,
            prompt_used: entry.prompt_used,
            sql_generated: entry.sql_generated,
            ai_model: entry.ai_model,
            generation_time_ms: entry.generation_time_ms,
            tokens_used: entry.tokens_used,
            created_at: now(),
        };

        conn.execute(
            &format!(
                "INSERT INTO generation_history ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                HISTORY_COLUMNS
            ),
            params![
                history.id,
                history.project_id,
                history.prompt_used,
                history.sql_generated,
                history.ai_model,
                history.generation_time_ms,
                history.tokens_used,
                history.created_at,
            ],
        )?;

        Ok(history)
    }

    /// History of a project, oldest first.
    pub fn list_history(&self, project_id: &str) -> Result<Vec<GenerationHistory>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM generation_history WHERE project_id = ? ORDER BY created_at ASC",
            HISTORY_COLUMNS
        ))?;
        let history = stmt
            .query_map(params![project_id], history_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(history)
    }

    pub fn count_projects(&self) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM schema_projects", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn fetch_project(conn: &Connection, id: &str) -> Result<Option<SchemaProject>, StoreError> {
    let row = conn.query_row(
        &format!("SELECT {} FROM schema_projects WHERE id = ?", PROJECT_COLUMNS),
        params![id],
        ProjectRow::from_row,
    );

    match row {
        Ok(row) => Ok(Some(row.into_project()?)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_project(owner: &str, name: &str, tags: &[&str]) -> NewSchemaProject {
        NewSchemaProject {
            owner_id: owner.to_string(),
            name: name.to_string(),
            description: Some(format!("{} description", name)),
            input_type: InputType::Prompt,
            original_prompt: Some("A blog with users and posts".to_string()),
            uploaded_sql: None,
            generated_sql: "CREATE TABLE users (id INT);".to_string(),
            ai_explanation: Some("One table".to_string()),
            ai_suggestions: vec!["Add an index".to_string()],
            tags: tags.iter().map(|t| t.to_string()).collect(),
            is_favorite: false,
        }
    }

    #[test]
    fn test_create_and_get_round_trip() {
        let store = ProjectStore::in_memory().unwrap();
        let created = store.create_project(new_project("alice", "Blog", &["blog"])).unwrap();

        let fetched = store.get_project(&created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.ai_suggestions, vec!["Add an index"]);
        assert!(store.get_project("missing").unwrap().is_none());
    }

    #[test]
    fn test_list_is_per_owner_and_newest_first() {
        let store = ProjectStore::in_memory().unwrap();
        let first = store.create_project(new_project("alice", "First", &[])).unwrap();
        store.create_project(new_project("alice", "Second", &[])).unwrap();
        store.create_project(new_project("bob", "Other", &[])).unwrap();

        store
            .update_project(&first.id, ProjectUpdate {
                name: Some("First, renamed".to_string()),
                ..Default::default()
            })
            .unwrap();

        let names: Vec<String> = store
            .list_projects("alice")
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["First, renamed", "Second"]);
    }

    #[test]
    fn test_search_matches_name_description_and_tags() {
        let store = ProjectStore::in_memory().unwrap();
        store.create_project(new_project("alice", "Shop Backend", &["ecommerce"])).unwrap();
        store.create_project(new_project("alice", "Analytics", &["saas"])).unwrap();

        assert_eq!(store.search_projects("alice", "shop").unwrap().len(), 1);
        assert_eq!(store.search_projects("alice", "DESCRIPTION").unwrap().len(), 2);
        assert_eq!(store.search_projects("alice", "saas").unwrap()[0].name, "Analytics");
        assert!(store.search_projects("bob", "shop").unwrap().is_empty());
    }

    #[test]
    fn test_update_and_favorite() {
        let store = ProjectStore::in_memory().unwrap();
        let project = store.create_project(new_project("alice", "Blog", &[])).unwrap();

        let updated = store
            .update_project(&project.id, ProjectUpdate {
                tags: Some(vec!["blog".to_string(), "users".to_string()]),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.tags, vec!["blog", "users"]);
        assert!(updated.updated_at >= project.updated_at);

        store.set_favorite(&project.id, true).unwrap();
        assert!(store.get_project(&project.id).unwrap().unwrap().is_favorite);

        assert!(matches!(
            store.set_favorite("missing", true),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.update_project("missing", ProjectUpdate::default()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_history_append_and_delete_cascade() {
        let store = ProjectStore::in_memory().unwrap();
        let project = store.create_project(new_project("alice", "Blog", &[])).unwrap();

        for ms in [120, 340] {
            store
                .add_history(NewGenerationHistory {
                    project_id: project.id.clone(),
                    prompt_used: "Create a database schema".to_string(),
                    sql_generated: "CREATE TABLE users (id INT);".to_string(),
                    ai_model: "gpt-4".to_string(),
                    generation_time_ms: ms,
                    tokens_used: Some(900),
                })
                .unwrap();
        }

        let with_history = store.get_project_with_history(&project.id).unwrap().unwrap();
        let times: Vec<i64> = with_history
            .generation_history
            .iter()
            .map(|h| h.generation_time_ms)
            .collect();
        assert_eq!(times, vec![120, 340]);

        store.delete_project(&project.id).unwrap();
        assert!(store.get_project(&project.id).unwrap().is_none());
        assert!(store.list_history(&project.id).unwrap().is_empty());
        assert!(matches!(
            store.delete_project(&project.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_history_requires_project() {
        let store = ProjectStore::in_memory().unwrap();
        let result = store.add_history(NewGenerationHistory {
            project_id: "missing".to_string(),
            prompt_used: String::new(),
            sql_generated: String::new(),
            ai_model: "gpt-4".to_string(),
            generation_time_ms: 1,
            tokens_used: None,
        });
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("projects.duckdb");

        let id = {
            let store = ProjectStore::open(&path, 3).unwrap();
            store.create_project(new_project("alice", "Blog", &[])).unwrap().id
        };

        let reopened = ProjectStore::open(&path, 1).unwrap();
        assert_eq!(reopened.count_projects().unwrap(), 1);
        assert!(reopened.get_project(&id).unwrap().is_some());
    }
}
