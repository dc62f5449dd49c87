//! Project and active-file context gathered around a refinement request.
//!
//! Context is best-effort: a provider that finds nothing returns `None` and the
//! pipeline proceeds with an empty [`GatheredContext`].
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ContextProvider`] | Trait for context sources |
//! | [`WorkspaceContextProvider`] | Detects language/framework from manifest files under a root directory |
//! | [`StaticContextProvider`] | Fixed context (tests, embedding hosts that already know the project) |
//! | [`NoContext`] | Always empty |

mod workspace;

pub use workspace::{language_for_path, WorkspaceContextProvider};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub framework: Option<String>,
    pub language: String,
    #[serde(default)]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFileContext {
    pub relative_path: String,
    pub language: String,
    pub content: String,
    pub cursor_line: Option<u32>,
    pub truncated: bool,
}

#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn project_context(&self) -> Option<ProjectContext>;
    async fn active_file_context(&self) -> Option<ActiveFileContext>;
}

/// Everything the pipeline gathered for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatheredContext {
    pub project: Option<ProjectContext>,
    pub active_file: Option<ActiveFileContext>,
}

/// The fingerprint-relevant subset: only fields that change the generated text.
#[derive(Serialize)]
struct ContextDigest<'a> {
    framework: Option<&'a str>,
    language: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    active_file: Option<&'a str>,
}

impl GatheredContext {
    pub async fn gather(provider: &dyn ContextProvider) -> Self {
        Self {
            project: provider.project_context().await,
            active_file: provider.active_file_context().await,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.active_file.is_none()
    }

    pub fn framework(&self) -> Option<&str> {
        self.project.as_ref().and_then(|p| p.framework.as_deref())
    }

    /// Serialized context subset used for fingerprinting: framework, language and
    /// the active file's path. Cursor position and file content are excluded so
    /// edits within the same file keep hitting the cache.
    pub fn digest(&self) -> String {
        let digest = ContextDigest {
            framework: self.framework(),
            language: self.project.as_ref().map(|p| p.language.as_str()),
            active_file: self.active_file.as_ref().map(|f| f.relative_path.as_str()),
        };
        serde_json::to_string(&digest).unwrap_or_default()
    }
}

pub struct NoContext;

#[async_trait]
impl ContextProvider for NoContext {
    async fn project_context(&self) -> Option<ProjectContext> {
        None
    }
    async fn active_file_context(&self) -> Option<ActiveFileContext> {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticContextProvider {
    project: Option<ProjectContext>,
    active_file: Option<ActiveFileContext>,
}

impl StaticContextProvider {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_project(mut self, project: ProjectContext) -> Self {
        self.project = Some(project);
        self
    }
    pub fn with_active_file(mut self, file: ActiveFileContext) -> Self {
        self.active_file = Some(file);
        self
    }
}

#[async_trait]
impl ContextProvider for StaticContextProvider {
    async fn project_context(&self) -> Option<ProjectContext> {
        self.project.clone()
    }
    async fn active_file_context(&self) -> Option<ActiveFileContext> {
        self.active_file.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn react() -> ProjectContext {
        ProjectContext {
            framework: Some("React".into()),
            language: "TypeScript".into(),
            constraints: vec![],
        }
    }

    fn file_at(path: &str, line: u32, content: &str) -> ActiveFileContext {
        ActiveFileContext {
            relative_path: path.into(),
            language: "TypeScript".into(),
            content: content.into(),
            cursor_line: Some(line),
            truncated: false,
        }
    }

    #[test]
    fn test_digest_ignores_volatile_fields() {
        let file = |line, content: &str| ActiveFileContext {
            relative_path: "src/App.tsx".into(),
            language: "TypeScript".into(),
            content: content.into(),
            cursor_line: Some(line),
            truncated: false,
        };
        let a = GatheredContext {
            project: Some(react()),
            active_file: Some(file(3, "a")),
        };
        let b = GatheredContext {
            project: Some(react()),
            active_file: Some(file(40, "b")),
        };
        assert_eq!(a.digest(), b.digest());
        assert_eq!(
            a.digest(),
            r#"{"framework":"React","language":"TypeScript","active_file":"src/App.tsx"}"#
        );
    }

    #[test]
    fn test_digest_distinguishes_active_file_path() {
        let in_file = |path| GatheredContext {
            project: Some(react()),
            active_file: Some(file_at(path, 1, "same")),
        };
        assert_ne!(in_file("src/App.tsx").digest(), in_file("src/Settings.tsx").digest());
        let no_file = GatheredContext {
            project: Some(react()),
            active_file: None,
        };
        assert_eq!(no_file.digest(), r#"{"framework":"React","language":"TypeScript"}"#);
    }

    #[test]
    fn test_empty_digest_is_stable() {
        assert_eq!(
            GatheredContext::default().digest(),
            r#"{"framework":null,"language":null}"#
        );
    }

    #[tokio::test]
    async fn test_gather_from_static_provider() {
        let provider = StaticContextProvider::new().with_project(react());
        let ctx = GatheredContext::gather(&provider).await;
        assert_eq!(ctx.framework(), Some("React"));
        assert!(ctx.active_file.is_none());
        assert!(GatheredContext::gather(&NoContext).await.is_empty());
    }
}
