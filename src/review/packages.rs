// SPDX-License-Identifier: MIT
//! Maps modified files to the packages they belong to.
//!
//! Multi-package workspaces carry one project descriptor per package; a
//! descriptor with an empty `package_path` is the workspace root package.
//! Matching is longest-prefix by path component: a file belongs to the
//! project with the longest `package_path` that prefixes it, so the root
//! package (length zero) only wins when no real package matches.  Files
//! matching nothing fall back to the active project path — never dropped.

use serde::{Deserialize, Serialize};

/// One package inside a workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    /// Package directory relative to the workspace root; `""` is the root
    /// package itself.
    pub package_path: String,
    /// Absolute path of the package on disk.
    pub project_path: String,
}

/// True if `package_path` is a path-component prefix of `file`.
fn matches_package(file: &str, package_path: &str) -> bool {
    if package_path.is_empty() {
        // Root package: matches any file at component-prefix length zero.
        return true;
    }
    file == package_path || file.strip_prefix(package_path).is_some_and(|r| r.starts_with('/'))
}

/// Resolve the set of package paths affected by the given modified files.
///
/// With no workspace, or a single project, every file maps to the active
/// project path.  Otherwise each file is matched to the project with the
/// longest matching `package_path`, falling back to the active project path.
/// The result is deduplicated, first-seen order.
pub fn determine_affected_packages(
    modified_files: &[String],
    projects: &[ProjectDescriptor],
    active_project_path: &str,
    workspace_path: Option<&str>,
) -> Vec<String> {
    if workspace_path.is_none() || projects.len() <= 1 {
        return vec![active_project_path.to_string()];
    }

    let mut affected: Vec<String> = Vec::new();
    for file in modified_files {
        let resolved = projects
            .iter()
            .filter(|p| matches_package(file, &p.package_path))
            .max_by_key(|p| p.package_path.len())
            .map(|p| p.project_path.as_str())
            .unwrap_or(active_project_path);
        if !affected.iter().any(|p| p == resolved) {
            affected.push(resolved.to_string());
        }
    }
    affected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proj(package_path: &str, project_path: &str) -> ProjectDescriptor {
        ProjectDescriptor {
            package_path: package_path.to_string(),
            project_path: project_path.to_string(),
        }
    }

    #[test]
    fn test_single_project_short_circuit() {
        let projects = vec![proj("", "/ws")];
        let files = vec!["src/main.src".to_string()];
        assert_eq!(
            determine_affected_packages(&files, &projects, "/ws", None),
            vec!["/ws".to_string()]
        );
        // Even with a workspace path, one project short-circuits.
        assert_eq!(
            determine_affected_packages(&files, &projects, "/ws", Some("/ws")),
            vec!["/ws".to_string()]
        );
    }

    #[test]
    fn test_longest_prefix_wins_over_root() {
        let projects = vec![proj("", "/ws"), proj("svc", "/ws/svc")];
        let files = vec!["svc/main.src".to_string(), "README.md".to_string()];
        assert_eq!(
            determine_affected_packages(&files, &projects, "/active", Some("/ws")),
            vec!["/ws/svc".to_string(), "/ws".to_string()]
        );
    }

    #[test]
    fn test_lexical_overlap_does_not_match() {
        // "lib" must not claim files under "lib2".
        let projects = vec![proj("lib", "/ws/lib"), proj("lib2", "/ws/lib2")];
        let files = vec!["lib2/util.src".to_string()];
        assert_eq!(
            determine_affected_packages(&files, &projects, "/active", Some("/ws")),
            vec!["/ws/lib2".to_string()]
        );
    }

    #[test]
    fn test_exact_package_path_match() {
        let projects = vec![proj("svc", "/ws/svc"), proj("lib", "/ws/lib")];
        let files = vec!["svc".to_string()];
        assert_eq!(
            determine_affected_packages(&files, &projects, "/active", Some("/ws")),
            vec!["/ws/svc".to_string()]
        );
    }

    #[test]
    fn test_unmatched_file_falls_back_to_active() {
        let projects = vec![proj("svc", "/ws/svc"), proj("lib", "/ws/lib")];
        let files = vec!["docs/readme.md".to_string()];
        assert_eq!(
            determine_affected_packages(&files, &projects, "/active", Some("/ws")),
            vec!["/active".to_string()]
        );
    }

    #[test]
    fn test_result_is_deduplicated() {
        let projects = vec![proj("svc", "/ws/svc"), proj("lib", "/ws/lib")];
        let files = vec![
            "svc/a.src".to_string(),
            "svc/b.src".to_string(),
            "lib/c.src".to_string(),
        ];
        assert_eq!(
            determine_affected_packages(&files, &projects, "/active", Some("/ws")),
            vec!["/ws/svc".to_string(), "/ws/lib".to_string()]
        );
    }

    #[test]
    fn test_nested_packages_pick_deepest() {
        let projects = vec![proj("svc", "/ws/svc"), proj("svc/inner", "/ws/svc/inner")];
        let files = vec!["svc/inner/handler.src".to_string()];
        assert_eq!(
            determine_affected_packages(&files, &projects, "/active", Some("/ws")),
            vec!["/ws/svc/inner".to_string()]
        );
    }
}
