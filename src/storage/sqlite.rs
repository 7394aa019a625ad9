//! SQLite implementation of [`Persistence`].
//!
//! Schema:
//! - `projects`, `phases` with `INTEGER PRIMARY KEY AUTOINCREMENT` ids
//! - `tasks` with a nullable, unconstrained `phase_id` so dangling
//!   references survive a round trip
//! - `task_tags` (ordered by `position`) and `task_links`

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tokio::sync::Mutex;

use super::{Persistence, as_unavailable};
use crate::hierarchy::{validate_phase, validate_project, validate_task};
use crate::models::{NewPhase, NewProject, NewTask, Phase, Project, ProjectLocation, Task};
use crate::{Error, Result};

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        tracing::debug!(path = %path.display(), "opened sqlite store");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT 'local',
                timezone TEXT NOT NULL DEFAULT 'UTC',
                description TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS phases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                sort_order INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (project_id) REFERENCES projects(id)
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'Assigned',
                assignee TEXT NOT NULL DEFAULT 'Unassigned',
                priority INTEGER NOT NULL DEFAULT 3,
                start_date TEXT NOT NULL,
                due_date TEXT NOT NULL,
                requires_signoff INTEGER NOT NULL DEFAULT 0,
                phase_id INTEGER
            );

            CREATE TABLE IF NOT EXISTS task_tags (
                task_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                tag TEXT NOT NULL,
                PRIMARY KEY (task_id, position),
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS task_links (
                task_id INTEGER NOT NULL,
                linked_task_id INTEGER NOT NULL,
                PRIMARY KEY (task_id, linked_task_id),
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_phases_project ON phases(project_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_phase ON tasks(phase_id);
            CREATE INDEX IF NOT EXISTS idx_task_tags_tag ON task_tags(tag);
            "#,
        )?;
        Ok(())
    }
}

// === Synchronous queries (run while holding the connection lock) ===

fn read_tasks(conn: &Connection) -> Result<Vec<Task>> {
    let mut tags: HashMap<i64, Vec<String>> = HashMap::new();
    let mut stmt = conn.prepare("SELECT task_id, tag FROM task_tags ORDER BY task_id, position")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (task_id, tag) = row?;
        tags.entry(task_id).or_default().push(tag);
    }

    let mut links: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut stmt =
        conn.prepare("SELECT task_id, linked_task_id FROM task_links ORDER BY task_id, rowid")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (task_id, linked) = row?;
        links.entry(task_id).or_default().push(linked);
    }

    let mut stmt = conn.prepare(
        "SELECT id, title, status, assignee, priority, start_date, due_date,
                requires_signoff, phase_id
         FROM tasks ORDER BY id",
    )?;
    let tasks = stmt
        .query_map([], |row| {
            Ok(Task {
                id: row.get(0)?,
                title: row.get(1)?,
                status: row.get(2)?,
                assignee: row.get(3)?,
                priority: row.get(4)?,
                start_date: row.get(5)?,
                due_date: row.get(6)?,
                tags: Vec::new(),
                links: Vec::new(),
                requires_signoff: row.get(7)?,
                phase_id: row.get(8)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<Task>>>()?;

    Ok(tasks
        .into_iter()
        .map(|mut task| {
            task.tags = tags.remove(&task.id).unwrap_or_default();
            task.links = links.remove(&task.id).unwrap_or_default();
            task
        })
        .collect())
}

fn read_hierarchy(conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, location, timezone, description FROM projects ORDER BY id",
    )?;
    let mut projects = stmt
        .query_map([], |row| {
            let location: String = row.get(2)?;
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
                location: ProjectLocation::parse(&location).unwrap_or_default(),
                timezone: row.get(3)?,
                description: row.get(4)?,
                phases: Vec::new(),
            })
        })?
        .collect::<rusqlite::Result<Vec<Project>>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, project_id, name, description, sort_order
         FROM phases ORDER BY sort_order, id",
    )?;
    let phases = stmt
        .query_map([], |row| {
            Ok(Phase {
                id: row.get(0)?,
                project_id: row.get(1)?,
                name: row.get(2)?,
                description: row.get(3)?,
                order: row.get(4)?,
                tasks: Vec::new(),
            })
        })?
        .collect::<rusqlite::Result<Vec<Phase>>>()?;

    let mut by_phase: HashMap<i64, Vec<Task>> = HashMap::new();
    for task in read_tasks(conn)? {
        if let Some(phase_id) = task.phase_id {
            by_phase.entry(phase_id).or_default().push(task);
        }
    }

    let index: HashMap<i64, usize> = projects
        .iter()
        .enumerate()
        .map(|(i, project)| (project.id, i))
        .collect();
    for mut phase in phases {
        phase.tasks = by_phase.remove(&phase.id).unwrap_or_default();
        if let Some(&i) = index.get(&phase.project_id) {
            projects[i].phases.push(phase);
        }
    }

    Ok(projects)
}

fn insert_project(conn: &Connection, new: NewProject) -> Result<Project> {
    validate_project(&new)?;
    conn.execute(
        "INSERT INTO projects (name, location, timezone, description) VALUES (?1, ?2, ?3, ?4)",
        params![new.name, new.location.as_str(), new.timezone, new.description],
    )?;
    Ok(Project {
        id: conn.last_insert_rowid(),
        name: new.name,
        location: new.location,
        timezone: new.timezone,
        description: new.description,
        phases: Vec::new(),
    })
}

fn insert_phase(conn: &Connection, new: NewPhase) -> Result<Phase> {
    validate_phase(&new)?;
    let exists: Option<i64> = conn
        .query_row(
            "SELECT id FROM projects WHERE id = ?1",
            [new.project_id],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(Error::NotFound(format!("Project not found: {}", new.project_id)));
    }

    conn.execute(
        "INSERT INTO phases (project_id, name, description, sort_order) VALUES (?1, ?2, ?3, ?4)",
        params![new.project_id, new.name, new.description, new.order],
    )?;
    Ok(Phase {
        id: conn.last_insert_rowid(),
        project_id: new.project_id,
        name: new.name,
        description: new.description,
        order: new.order,
        tasks: Vec::new(),
    })
}

fn insert_task(tx: &Transaction<'_>, new: NewTask) -> Result<Task> {
    validate_task(&new)?;
    tx.execute(
        r#"
        INSERT INTO tasks
        (title, status, assignee, priority, start_date, due_date, requires_signoff, phase_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            new.title,
            new.status,
            new.assignee,
            new.priority,
            new.start_date,
            new.due_date,
            new.requires_signoff,
            new.phase_id,
        ],
    )?;
    let id = tx.last_insert_rowid();

    for (position, tag) in new.tags.iter().enumerate() {
        tx.execute(
            "INSERT INTO task_tags (task_id, position, tag) VALUES (?1, ?2, ?3)",
            params![id, position as i64, tag],
        )?;
    }
    for linked in &new.links {
        tx.execute(
            "INSERT OR IGNORE INTO task_links (task_id, linked_task_id) VALUES (?1, ?2)",
            params![id, linked],
        )?;
    }

    Ok(new.into_task(id))
}

#[async_trait]
impl Persistence for SqliteStore {
    async fn load_full_hierarchy(&self) -> Result<Vec<Project>> {
        let conn = self.conn.lock().await;
        read_hierarchy(&conn).map_err(as_unavailable)
    }

    async fn load_all_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.conn.lock().await;
        read_tasks(&conn).map_err(as_unavailable)
    }

    async fn create_project(&self, project: NewProject) -> Result<Project> {
        let conn = self.conn.lock().await;
        insert_project(&conn, project).map_err(as_unavailable)
    }

    async fn create_phase(&self, phase: NewPhase) -> Result<Phase> {
        let conn = self.conn.lock().await;
        insert_phase(&conn, phase).map_err(as_unavailable)
    }

    async fn create_task(&self, task: NewTask) -> Result<Task> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(|e| as_unavailable(e.into()))?;
        let created = insert_task(&tx, task).map_err(as_unavailable)?;
        tx.commit().map_err(|e| as_unavailable(e.into()))?;
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{day, today};
    use tempfile::TempDir;

    async fn store_with_project() -> (SqliteStore, Project) {
        let store = SqliteStore::open_in_memory().unwrap();
        let project = store
            .create_project(NewProject::new("Website Redesign").with_description("Overhaul"))
            .await
            .unwrap();
        (store, project)
    }

    #[tokio::test]
    async fn test_create_project_assigns_ids() {
        let (store, first) = store_with_project().await;
        let second = store.create_project(NewProject::new("Ops")).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.description, "Overhaul");
    }

    #[tokio::test]
    async fn test_create_project_rejects_empty_name() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.create_project(NewProject::new("")).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(store.load_full_hierarchy().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_phase_requires_project() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.create_phase(NewPhase::new(3, "Planning")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_hierarchy_round_trip() {
        let (store, project) = store_with_project().await;
        let testing = store
            .create_phase(NewPhase::new(project.id, "Testing").with_order(3))
            .await
            .unwrap();
        let planning = store
            .create_phase(NewPhase::new(project.id, "Planning").with_order(1))
            .await
            .unwrap();

        let mut new = NewTask::new("Draft task card UI", today());
        new.phase_id = Some(planning.id);
        new.tags = vec!["design".to_string(), "ui".to_string()];
        new.links = vec![7, 3];
        new.requires_signoff = true;
        new.due_date = day(1);
        let task = store.create_task(new).await.unwrap();

        let projects = store.load_full_hierarchy().await.unwrap();
        assert_eq!(projects.len(), 1);
        let phases = &projects[0].phases;
        assert_eq!(phases[0].id, planning.id);
        assert_eq!(phases[1].id, testing.id);
        assert_eq!(phases[0].tasks, vec![task.clone()]);
        assert!(phases[1].tasks.is_empty());

        let loaded = &phases[0].tasks[0];
        assert_eq!(loaded.tags, vec!["design", "ui"]);
        assert_eq!(loaded.links, vec![7, 3]);
        assert!(loaded.requires_signoff);
        assert_eq!(loaded.due_date, day(1));
    }

    #[tokio::test]
    async fn test_orphan_task_is_kept() {
        let (store, _project) = store_with_project().await;
        let mut new = NewTask::new("Lost task", today());
        new.phase_id = Some(55);
        let task = store.create_task(new).await.unwrap();

        let all = store.load_all_tasks().await.unwrap();
        assert_eq!(all, vec![task]);
        assert_eq!(all[0].phase_id, Some(55));

        let projects = store.load_full_hierarchy().await.unwrap();
        assert!(projects[0].phases.is_empty());
    }

    #[tokio::test]
    async fn test_create_task_validation_writes_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.create_task(NewTask::new("  ", today())).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(store.load_all_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_file_persists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("trellis.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.create_project(NewProject::new("Kept")).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let projects = store.load_full_hierarchy().await.unwrap();
        assert_eq!(projects[0].name, "Kept");
    }
}
