mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row};
use uuid::Uuid;

use crate::context::{PathKey, SelectionStore};
use crate::models::*;

const PROJECT_COLUMNS: &str = "id, name, root_path, prompt_guide, is_active, created_at, updated_at";
const CATEGORY_COLUMNS: &str = "id, project_id, name, created_at";
const SELECTION_COLUMNS: &str =
    "id, project_id, path, is_directory, category_id, file_types, created_at, updated_at";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Project operations
    // ============================================================

    pub fn get_all_projects(&self) -> Result<Vec<Project>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY name COLLATE NOCASE"
        ))?;

        let projects = stmt
            .query_map([], project_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(projects)
    }

    pub fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let project = conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"),
                [id.to_string()],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    /// Look a project up by name, ignoring case.
    pub fn get_project_by_name(&self, name: &str) -> Result<Option<Project>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let project = conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE name = ?"),
                [name],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    pub fn get_active_project(&self) -> Result<Option<Project>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let project = conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE is_active = 1 LIMIT 1"),
                [],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    pub fn create_project(&self, input: CreateProjectInput) -> Result<Project> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();
        let root_path = PathKey::new(&input.root_path).display();
        let prompt_guide = input
            .prompt_guide
            .unwrap_or_else(|| DEFAULT_PROMPT_GUIDE.to_string());

        conn.execute(
            "INSERT INTO projects (id, name, root_path, prompt_guide, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, ?, ?)",
            (
                id.to_string(),
                &input.name,
                &root_path,
                &prompt_guide,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )
        .map_err(|e| unique_violation(e, || format!("Project name already exists: {}", input.name)))?;

        Ok(Project {
            id,
            name: input.name,
            root_path,
            prompt_guide,
            is_active: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update_project(&self, id: Uuid, input: UpdateProjectInput) -> Result<Option<Project>> {
        let Some(existing) = self.get_project(id)? else {
            return Ok(None);
        };

        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();
        let name = input.name.unwrap_or(existing.name);
        let root_path = input
            .root_path
            .map(|p| PathKey::new(p).display())
            .unwrap_or(existing.root_path);
        let prompt_guide = input.prompt_guide.unwrap_or(existing.prompt_guide);

        conn.execute(
            "UPDATE projects SET name = ?, root_path = ?, prompt_guide = ?, updated_at = ? WHERE id = ?",
            (
                &name,
                &root_path,
                &prompt_guide,
                now.to_rfc3339(),
                id.to_string(),
            ),
        )
        .map_err(|e| unique_violation(e, || format!("Project name already exists: {name}")))?;

        Ok(Some(Project {
            id,
            name,
            root_path,
            prompt_guide,
            is_active: existing.is_active,
            created_at: existing.created_at,
            updated_at: now,
        }))
    }

    /// Delete a project together with its categories and selections.
    pub fn delete_project(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM projects WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }

    /// Make `id` the only active project, or clear the active project.
    pub fn set_active_project(&self, id: Option<Uuid>) -> Result<()> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        tx.execute("UPDATE projects SET is_active = 0", [])?;
        if let Some(id) = id {
            let rows = tx.execute(
                "UPDATE projects SET is_active = 1 WHERE id = ?",
                [id.to_string()],
            )?;
            if rows == 0 {
                return Err(anyhow!("Project not found"));
            }
        }
        tx.commit()?;
        Ok(())
    }

    // ============================================================
    // Category operations
    // ============================================================

    pub fn get_categories(&self, project_id: Uuid) -> Result<Vec<Category>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE project_id = ? ORDER BY name COLLATE NOCASE"
        ))?;

        let categories = stmt
            .query_map([project_id.to_string()], category_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(categories)
    }

    pub fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let category = conn
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?"),
                [id.to_string()],
                category_from_row,
            )
            .optional()?;
        Ok(category)
    }

    pub fn get_category_by_name(&self, project_id: Uuid, name: &str) -> Result<Option<Category>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let category = conn
            .query_row(
                &format!(
                    "SELECT {CATEGORY_COLUMNS} FROM categories WHERE project_id = ? AND name = ?"
                ),
                (project_id.to_string(), name),
                category_from_row,
            )
            .optional()?;
        Ok(category)
    }

    pub fn create_category(&self, project_id: Uuid, input: CreateCategoryInput) -> Result<Category> {
        self.get_project(project_id)?
            .ok_or_else(|| anyhow!("Project not found"))?;

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO categories (id, project_id, name, created_at) VALUES (?, ?, ?, ?)",
            (
                id.to_string(),
                project_id.to_string(),
                &input.name,
                now.to_rfc3339(),
            ),
        )
        .map_err(|e| unique_violation(e, || format!("Category already exists: {}", input.name)))?;

        Ok(Category {
            id,
            project_id,
            name: input.name,
            created_at: now,
        })
    }

    /// Delete a category. Its selections stay, uncategorized.
    pub fn delete_category(&self, id: Uuid) -> Result<bool> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE selections SET category_id = NULL WHERE category_id = ?",
            [id.to_string()],
        )?;
        let rows = tx.execute("DELETE FROM categories WHERE id = ?", [id.to_string()])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    // ============================================================
    // Selection operations
    // ============================================================

    /// Selections of a project in the order they were first added.
    pub fn get_selections(
        &self,
        project_id: Uuid,
        category_id: Option<Uuid>,
    ) -> Result<Vec<Selection>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let selections = match category_id {
            Some(category_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECTION_COLUMNS} FROM selections
                     WHERE project_id = ? AND category_id = ? ORDER BY created_at, path_key"
                ))?;
                let rows = stmt
                    .query_map(
                        (project_id.to_string(), category_id.to_string()),
                        selection_from_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECTION_COLUMNS} FROM selections
                     WHERE project_id = ? ORDER BY created_at, path_key"
                ))?;
                let rows = stmt
                    .query_map([project_id.to_string()], selection_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(selections)
    }

    /// Find a selection by path; any spelling of the path that normalizes to
    /// the same key matches.
    pub fn get_selection_by_path(&self, project_id: Uuid, path: &str) -> Result<Option<Selection>> {
        let key = PathKey::new(path);
        let conn = self.conn.lock().expect("database lock poisoned");
        let selection = conn
            .query_row(
                &format!(
                    "SELECT {SELECTION_COLUMNS} FROM selections WHERE project_id = ? AND path_key = ?"
                ),
                (project_id.to_string(), key.as_str()),
                selection_from_row,
            )
            .optional()?;
        Ok(selection)
    }

    /// Add a selection, or replace the settings of the one already recorded for
    /// the same normalized path. An input without a category keeps the recorded
    /// one; use [`Database::set_selection_category`] to clear it.
    pub fn upsert_selection(
        &self,
        project_id: Uuid,
        input: UpsertSelectionInput,
    ) -> Result<Selection> {
        self.get_project(project_id)?
            .ok_or_else(|| anyhow!("Project not found"))?;
        if let Some(category_id) = input.category_id {
            self.ensure_category_in_project(project_id, category_id)?;
        }

        let key = PathKey::new(&input.path);
        let file_types = if input.is_directory {
            normalize_file_types(input.file_types.as_deref())
        } else {
            None
        };

        {
            let conn = self.conn.lock().expect("database lock poisoned");
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO selections
                     (id, project_id, path, path_key, is_directory, category_id, file_types, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (project_id, path_key) DO UPDATE SET
                     path = excluded.path,
                     is_directory = excluded.is_directory,
                     category_id = COALESCE(excluded.category_id, selections.category_id),
                     file_types = excluded.file_types,
                     updated_at = excluded.updated_at",
                (
                    Uuid::new_v4().to_string(),
                    project_id.to_string(),
                    key.display(),
                    key.as_str(),
                    if input.is_directory { 1 } else { 0 },
                    input.category_id.map(|u| u.to_string()),
                    &file_types,
                    &now,
                    &now,
                ),
            )?;
        }

        self.get_selection_by_path(project_id, &input.path)?
            .ok_or_else(|| anyhow!("Selection vanished after upsert"))
    }

    /// Remove the selection for `path`. Other selections are untouched.
    pub fn remove_selection(&self, project_id: Uuid, path: &str) -> Result<bool> {
        let key = PathKey::new(path);
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM selections WHERE project_id = ? AND path_key = ?",
            (project_id.to_string(), key.as_str()),
        )?;
        Ok(rows > 0)
    }

    pub fn set_selection_category(
        &self,
        project_id: Uuid,
        path: &str,
        category_id: Option<Uuid>,
    ) -> Result<bool> {
        if let Some(category_id) = category_id {
            self.ensure_category_in_project(project_id, category_id)?;
        }
        let key = PathKey::new(path);
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE selections SET category_id = ?, updated_at = ? WHERE project_id = ? AND path_key = ?",
            (
                category_id.map(|u| u.to_string()),
                Utc::now().to_rfc3339(),
                project_id.to_string(),
                key.as_str(),
            ),
        )?;
        Ok(rows > 0)
    }

    /// Change a directory selection's filter. `None` or a blank filter means all files.
    pub fn set_selection_file_types(
        &self,
        project_id: Uuid,
        path: &str,
        file_types: Option<&str>,
    ) -> Result<bool> {
        let key = PathKey::new(path);
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE selections SET file_types = ?, updated_at = ?
             WHERE project_id = ? AND path_key = ? AND is_directory = 1",
            (
                normalize_file_types(file_types),
                Utc::now().to_rfc3339(),
                project_id.to_string(),
                key.as_str(),
            ),
        )?;
        Ok(rows > 0)
    }

    fn ensure_category_in_project(&self, project_id: Uuid, category_id: Uuid) -> Result<()> {
        match self.get_category(category_id)? {
            Some(category) if category.project_id == project_id => Ok(()),
            Some(_) => Err(anyhow!("Category belongs to a different project")),
            None => Err(anyhow!("Category not found")),
        }
    }
}

impl SelectionStore for Database {
    fn get_selections(
        &self,
        project_id: Uuid,
        category_id: Option<Uuid>,
    ) -> Result<Vec<Selection>> {
        Database::get_selections(self, project_id, category_id)
    }

    fn get_project_root(&self, project_id: Uuid) -> Result<Option<String>> {
        Ok(self.get_project(project_id)?.map(|p| p.root_path))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

/// `<data dir>/context_dropper.db` for the current user.
pub fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "context-dropper")
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("context_dropper.db"))
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        root_path: row.get(2)?,
        prompt_guide: row.get(3)?,
        is_active: row.get::<_, i32>(4)? != 0,
        created_at: parse_datetime(row.get::<_, String>(5)?),
        updated_at: parse_datetime(row.get::<_, String>(6)?),
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: parse_uuid(row.get::<_, String>(0)?),
        project_id: parse_uuid(row.get::<_, String>(1)?),
        name: row.get(2)?,
        created_at: parse_datetime(row.get::<_, String>(3)?),
    })
}

fn selection_from_row(row: &Row<'_>) -> rusqlite::Result<Selection> {
    Ok(Selection {
        id: parse_uuid(row.get::<_, String>(0)?),
        project_id: parse_uuid(row.get::<_, String>(1)?),
        path: row.get(2)?,
        is_directory: row.get::<_, i32>(3)? != 0,
        category_id: row.get::<_, Option<String>>(4)?.map(parse_uuid),
        file_types: row.get(5)?,
        created_at: parse_datetime(row.get::<_, String>(6)?),
        updated_at: parse_datetime(row.get::<_, String>(7)?),
    })
}

fn normalize_file_types(file_types: Option<&str>) -> Option<String> {
    file_types
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn unique_violation(err: rusqlite::Error, message: impl FnOnce() -> String) -> anyhow::Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            anyhow!(message())
        }
        _ => err.into(),
    }
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
