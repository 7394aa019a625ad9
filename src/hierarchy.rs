//! In-memory project hierarchy.
//!
//! `Hierarchy` owns projects, their phases, and their tasks, plus the tasks
//! whose phase reference does not resolve (orphans). Creation is append-only
//! and validated the same way every store validates it.

use crate::models::{NewPhase, NewProject, NewTask, Phase, Project, Task};
use crate::{Error, Result};

/// Reject an empty (or whitespace-only) project name.
pub fn validate_project(new: &NewProject) -> Result<()> {
    if new.name.trim().is_empty() {
        return Err(Error::Validation("project name must not be empty".to_string()));
    }
    Ok(())
}

/// Reject an empty phase name.
pub fn validate_phase(new: &NewPhase) -> Result<()> {
    if new.name.trim().is_empty() {
        return Err(Error::Validation("phase name must not be empty".to_string()));
    }
    Ok(())
}

/// Reject an empty title or a priority outside 1-5.
pub fn validate_task(new: &NewTask) -> Result<()> {
    if new.title.trim().is_empty() {
        return Err(Error::Validation("task title must not be empty".to_string()));
    }
    if !(1..=5).contains(&new.priority) {
        return Err(Error::Validation(format!(
            "priority must be 1-5, got {}",
            new.priority
        )));
    }
    Ok(())
}

/// Project → Phase → Task tree with surrogate id allocation.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    projects: Vec<Project>,
    /// Tasks created with a missing or unknown phase id
    orphans: Vec<Task>,
    next_project_id: i64,
    next_phase_id: i64,
    next_task_id: i64,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete snapshot of every project with nested phases and tasks.
    pub fn load_hierarchy(&self) -> Vec<Project> {
        self.projects.clone()
    }

    /// Flat list of every task in creation order, orphans included.
    pub fn all_tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .projects
            .iter()
            .flat_map(|project| project.tasks().cloned())
            .collect();
        tasks.extend(self.orphans.iter().cloned());
        tasks.sort_by_key(|task| task.id);
        tasks
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn project(&self, id: i64) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == id)
    }

    pub fn phase(&self, id: i64) -> Option<&Phase> {
        self.projects
            .iter()
            .flat_map(|project| project.phases.iter())
            .find(|phase| phase.id == id)
    }

    fn phase_mut(&mut self, id: i64) -> Option<&mut Phase> {
        self.projects
            .iter_mut()
            .flat_map(|project| project.phases.iter_mut())
            .find(|phase| phase.id == id)
    }

    /// Create a project. Fails with `Validation` on an empty name.
    pub fn create_project(&mut self, new: NewProject) -> Result<Project> {
        validate_project(&new)?;
        self.next_project_id += 1;
        let project = Project {
            id: self.next_project_id,
            name: new.name,
            location: new.location,
            timezone: new.timezone,
            description: new.description,
            phases: Vec::new(),
        };
        self.projects.push(project.clone());
        Ok(project)
    }

    /// Create a phase. Fails with `NotFound` when the project does not exist.
    pub fn create_phase(&mut self, new: NewPhase) -> Result<Phase> {
        validate_phase(&new)?;
        let next_id = self.next_phase_id + 1;
        let project = self
            .projects
            .iter_mut()
            .find(|project| project.id == new.project_id)
            .ok_or_else(|| Error::NotFound(format!("Project not found: {}", new.project_id)))?;

        self.next_phase_id = next_id;
        let phase = Phase {
            id: next_id,
            project_id: new.project_id,
            name: new.name,
            description: new.description,
            order: new.order,
            tasks: Vec::new(),
        };
        project.phases.push(phase.clone());
        project.sort_phases();
        Ok(phase)
    }

    /// Create a task. An unresolved phase id is kept and the task becomes an orphan.
    pub fn create_task(&mut self, new: NewTask) -> Result<Task> {
        validate_task(&new)?;
        self.next_task_id += 1;
        let task = new.into_task(self.next_task_id);

        let owner = task.phase_id.and_then(|id| self.phase_mut(id));
        match owner {
            Some(phase) => phase.tasks.push(task.clone()),
            None => self.orphans.push(task.clone()),
        }
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::today;

    #[test]
    fn test_create_project_rejects_empty_name() {
        let mut hierarchy = Hierarchy::new();
        let result = hierarchy.create_project(NewProject::new("   "));
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(hierarchy.projects().is_empty());
    }

    #[test]
    fn test_create_phase_unknown_project() {
        let mut hierarchy = Hierarchy::new();
        let result = hierarchy.create_phase(NewPhase::new(42, "Planning"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_ids_are_sequential_per_kind() {
        let mut hierarchy = Hierarchy::new();
        let a = hierarchy.create_project(NewProject::new("A")).unwrap();
        let b = hierarchy.create_project(NewProject::new("B")).unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let phase = hierarchy.create_phase(NewPhase::new(b.id, "Build")).unwrap();
        assert_eq!(phase.id, 1);
        assert_eq!(phase.project_id, 2);
    }

    #[test]
    fn test_failed_phase_creation_does_not_consume_id() {
        let mut hierarchy = Hierarchy::new();
        let project = hierarchy.create_project(NewProject::new("A")).unwrap();
        assert!(hierarchy.create_phase(NewPhase::new(99, "x")).is_err());
        let phase = hierarchy.create_phase(NewPhase::new(project.id, "y")).unwrap();
        assert_eq!(phase.id, 1);
    }

    #[test]
    fn test_phases_follow_order_then_creation() {
        let mut hierarchy = Hierarchy::new();
        let project = hierarchy.create_project(NewProject::new("A")).unwrap();
        for (name, order) in [("Testing", 3), ("Planning", 1), ("Review", 3), ("Build", 2)] {
            hierarchy
                .create_phase(NewPhase::new(project.id, name).with_order(order))
                .unwrap();
        }
        let names: Vec<&str> = hierarchy.projects()[0]
            .phases
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Planning", "Build", "Testing", "Review"]);
    }

    #[test]
    fn test_create_task_nests_under_phase() {
        let mut hierarchy = Hierarchy::new();
        let project = hierarchy.create_project(NewProject::new("A")).unwrap();
        let phase = hierarchy.create_phase(NewPhase::new(project.id, "P")).unwrap();

        let mut new = NewTask::new("Do it", today());
        new.phase_id = Some(phase.id);
        let task = hierarchy.create_task(new).unwrap();

        let loaded = hierarchy.load_hierarchy();
        assert_eq!(loaded[0].phases[0].tasks, vec![task]);
    }

    #[test]
    fn test_create_task_with_unknown_phase_is_orphan() {
        let mut hierarchy = Hierarchy::new();
        let mut new = NewTask::new("Lost", today());
        new.phase_id = Some(404);
        let task = hierarchy.create_task(new).unwrap();

        assert_eq!(task.phase_id, Some(404));
        assert_eq!(hierarchy.all_tasks(), vec![task]);
        assert!(hierarchy.load_hierarchy().is_empty());
    }

    #[test]
    fn test_create_task_validation() {
        let mut hierarchy = Hierarchy::new();
        assert!(matches!(
            hierarchy.create_task(NewTask::new("", today())),
            Err(Error::Validation(_))
        ));

        let mut bad_priority = NewTask::new("x", today());
        bad_priority.priority = 6;
        assert!(matches!(
            hierarchy.create_task(bad_priority),
            Err(Error::Validation(_))
        ));
        assert!(hierarchy.all_tasks().is_empty());
    }

    #[test]
    fn test_project_progress_spans_phases() {
        let mut hierarchy = Hierarchy::new();
        let project = hierarchy.create_project(NewProject::new("A")).unwrap();
        let p1 = hierarchy.create_phase(NewPhase::new(project.id, "One")).unwrap();
        let p2 = hierarchy.create_phase(NewPhase::new(project.id, "Two")).unwrap();
        for (phase_id, status) in [(p1.id, "Completed"), (p1.id, "Started"), (p2.id, "completed")] {
            let mut new = NewTask::new("t", today());
            new.phase_id = Some(phase_id);
            new.status = status.to_string();
            hierarchy.create_task(new).unwrap();
        }

        let project = hierarchy.project(project.id).unwrap();
        assert_eq!(project.phases[0].progress(), 50);
        assert_eq!(project.phases[1].progress(), 100);
        assert_eq!(project.progress(), 67);
    }

    #[test]
    fn test_project_without_tasks_has_zero_progress() {
        let mut hierarchy = Hierarchy::new();
        let project = hierarchy.create_project(NewProject::new("A")).unwrap();
        hierarchy.create_phase(NewPhase::new(project.id, "Empty")).unwrap();
        assert_eq!(hierarchy.project(project.id).unwrap().progress(), 0);
    }
}
