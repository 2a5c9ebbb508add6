//! Debugger domain error codes.
//!
//! These live in the JSON-RPC implementation-defined server range and are
//! shared by protocol errors ([`crate::McpError`]) and tool-level failures
//! ([`crate::tools::CallToolResult::domain_error`]).

use serde::{Deserialize, Serialize};

pub const NO_ACTIVE_SESSION: i64 = -32001;
pub const SESSION_NOT_FOUND: i64 = -32002;
pub const BREAKPOINT_ERROR: i64 = -32003;
pub const EVALUATION_ERROR: i64 = -32004;
pub const MULTIPLE_PROJECTS: i64 = -32005;
pub const PROJECT_NOT_FOUND: i64 = -32006;
pub const RUN_CONFIG_NOT_FOUND: i64 = -32007;
pub const EXECUTION_ERROR: i64 = -32008;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainErrorKind {
    NoActiveSession,
    SessionNotFound,
    BreakpointError,
    EvaluationError,
    MultipleProjects,
    ProjectNotFound,
    RunConfigNotFound,
    ExecutionError,
}

impl DomainErrorKind {
    pub fn code(&self) -> i64 {
        match self {
            DomainErrorKind::NoActiveSession => NO_ACTIVE_SESSION,
            DomainErrorKind::SessionNotFound => SESSION_NOT_FOUND,
            DomainErrorKind::BreakpointError => BREAKPOINT_ERROR,
            DomainErrorKind::EvaluationError => EVALUATION_ERROR,
            DomainErrorKind::MultipleProjects => MULTIPLE_PROJECTS,
            DomainErrorKind::ProjectNotFound => PROJECT_NOT_FOUND,
            DomainErrorKind::RunConfigNotFound => RUN_CONFIG_NOT_FOUND,
            DomainErrorKind::ExecutionError => EXECUTION_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainErrorKind::NoActiveSession => "no_active_session",
            DomainErrorKind::SessionNotFound => "session_not_found",
            DomainErrorKind::BreakpointError => "breakpoint_error",
            DomainErrorKind::EvaluationError => "evaluation_error",
            DomainErrorKind::MultipleProjects => "multiple_projects",
            DomainErrorKind::ProjectNotFound => "project_not_found",
            DomainErrorKind::RunConfigNotFound => "run_config_not_found",
            DomainErrorKind::ExecutionError => "execution_error",
        }
    }
}

impl std::fmt::Display for DomainErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
