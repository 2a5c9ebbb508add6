//! Project resolution for tool calls
//!
//! Every `tools/call` runs against one open project. The resolver picks it
//! from the optional `projectPath` argument and reports one of four outcomes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// The project a tool call executes against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    pub name: String,
    pub base_path: PathBuf,
}

impl ProjectContext {
    pub fn new(name: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
        }
    }
}

/// Outcome of resolving a project for a tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectResolution {
    Success(ProjectContext),
    /// No path was given and more than one project is open
    MultipleProjects(Vec<ProjectContext>),
    /// A path was given and no open project contains it
    NotFound(String),
    NoProjectsOpen,
}

/// Host capability that maps an optional path to an open project
#[async_trait]
pub trait ProjectResolver: Send + Sync {
    async fn resolve(&self, project_path: Option<&str>) -> ProjectResolution;
}

/// In-memory set of open projects.
///
/// A path resolves to the project whose base path equals it or contains it;
/// with nested projects the innermost wins. Without a path the sole open
/// project is used.
#[derive(Debug, Default)]
pub struct WorkspaceProjects {
    projects: RwLock<Vec<ProjectContext>>,
}

impl WorkspaceProjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projects(projects: impl IntoIterator<Item = ProjectContext>) -> Self {
        let workspace = Self::new();
        for project in projects {
            workspace.open(project);
        }
        workspace
    }

    /// Open a project, replacing any project with the same base path
    pub fn open(&self, project: ProjectContext) {
        let mut projects = self.projects.write();
        projects.retain(|p| p.base_path != project.base_path);
        projects.push(project);
    }

    pub fn close(&self, base_path: impl AsRef<Path>) -> bool {
        let mut projects = self.projects.write();
        let before = projects.len();
        projects.retain(|p| p.base_path != base_path.as_ref());
        projects.len() != before
    }

    pub fn list(&self) -> Vec<ProjectContext> {
        self.projects.read().clone()
    }

    fn resolve_now(&self, project_path: Option<&str>) -> ProjectResolution {
        let projects = self.projects.read();
        match project_path.map(str::trim).filter(|p| !p.is_empty()) {
            Some(path) => {
                let requested = Path::new(path);
                projects
                    .iter()
                    .filter(|p| requested.starts_with(&p.base_path))
                    .max_by_key(|p| p.base_path.components().count())
                    .cloned()
                    .map(ProjectResolution::Success)
                    .unwrap_or_else(|| ProjectResolution::NotFound(path.to_string()))
            }
            None => match projects.as_slice() {
                [] => ProjectResolution::NoProjectsOpen,
                [only] => ProjectResolution::Success(only.clone()),
                many => ProjectResolution::MultipleProjects(many.to_vec()),
            },
        }
    }
}

#[async_trait]
impl ProjectResolver for WorkspaceProjects {
    async fn resolve(&self, project_path: Option<&str>) -> ProjectResolution {
        self.resolve_now(project_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> WorkspaceProjects {
        WorkspaceProjects::with_projects([
            ProjectContext::new("app", "/work/app"),
            ProjectContext::new("lib", "/work/lib"),
            ProjectContext::new("plugin", "/work/app/plugin"),
        ])
    }

    #[tokio::test]
    async fn test_no_projects_open() {
        assert_eq!(
            WorkspaceProjects::new().resolve(None).await,
            ProjectResolution::NoProjectsOpen
        );
    }

    #[tokio::test]
    async fn test_sole_project_without_path() {
        let workspace = WorkspaceProjects::with_projects([ProjectContext::new("app", "/work/app")]);
        assert_eq!(
            workspace.resolve(None).await,
            ProjectResolution::Success(ProjectContext::new("app", "/work/app"))
        );
        // blank counts as absent
        assert!(matches!(
            workspace.resolve(Some("  ")).await,
            ProjectResolution::Success(_)
        ));
    }

    #[tokio::test]
    async fn test_multiple_projects_without_path() {
        match workspace().resolve(None).await {
            ProjectResolution::MultipleProjects(projects) => assert_eq!(projects.len(), 3),
            other => panic!("unexpected resolution: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_path_match_exact_and_ancestry() {
        let workspace = workspace();
        assert_eq!(
            workspace.resolve(Some("/work/lib")).await,
            ProjectResolution::Success(ProjectContext::new("lib", "/work/lib"))
        );
        assert_eq!(
            workspace.resolve(Some("/work/app/src/main.rs")).await,
            ProjectResolution::Success(ProjectContext::new("app", "/work/app"))
        );
        // innermost project wins
        assert_eq!(
            workspace.resolve(Some("/work/app/plugin/src")).await,
            ProjectResolution::Success(ProjectContext::new("plugin", "/work/app/plugin"))
        );
    }

    #[tokio::test]
    async fn test_path_not_found() {
        // component-wise: /work/application is not inside /work/app
        assert_eq!(
            workspace().resolve(Some("/work/application")).await,
            ProjectResolution::NotFound("/work/application".to_string())
        );
    }

    #[tokio::test]
    async fn test_open_replaces_and_close_removes() {
        let workspace = workspace();
        workspace.open(ProjectContext::new("lib-renamed", "/work/lib"));
        assert_eq!(workspace.list().len(), 3);
        assert!(workspace.close("/work/lib"));
        assert!(!workspace.close("/work/lib"));
        assert_eq!(workspace.list().len(), 2);
    }
}
