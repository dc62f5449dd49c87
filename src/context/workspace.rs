//! Filesystem-backed context provider.

use super::{ActiveFileContext, ContextProvider, ProjectContext};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

const DEFAULT_MAX_CHARS: usize = 4_000;

/// (dependency name, display name); first match wins, so meta-frameworks precede
/// the libraries they build on.
const NODE_FRAMEWORKS: &[(&str, &str)] = &[
    ("next", "Next.js"),
    ("nuxt", "Nuxt"),
    ("@sveltejs/kit", "SvelteKit"),
    ("@angular/core", "Angular"),
    ("@nestjs/core", "NestJS"),
    ("svelte", "Svelte"),
    ("vue", "Vue"),
    ("react", "React"),
    ("express", "Express"),
];

const RUST_FRAMEWORKS: &[(&str, &str)] = &[
    ("tauri", "Tauri"),
    ("leptos", "Leptos"),
    ("axum", "Axum"),
    ("actix-web", "Actix Web"),
    ("rocket", "Rocket"),
    ("bevy", "Bevy"),
];

const PYTHON_FRAMEWORKS: &[(&str, &str)] = &[
    ("django", "Django"),
    ("fastapi", "FastAPI"),
    ("flask", "Flask"),
];

const GO_FRAMEWORKS: &[(&str, &str)] = &[
    ("github.com/gin-gonic/gin", "Gin"),
    ("github.com/labstack/echo", "Echo"),
    ("github.com/gofiber/fiber", "Fiber"),
];

/// Language name for a file path, by extension.
pub fn language_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    match ext.as_str() {
        "rs" => "Rust",
        "ts" | "tsx" | "mts" | "cts" => "TypeScript",
        "js" | "jsx" | "mjs" | "cjs" => "JavaScript",
        "py" => "Python",
        "go" => "Go",
        "java" => "Java",
        "kt" | "kts" => "Kotlin",
        "rb" => "Ruby",
        "cs" => "C#",
        "cpp" | "cc" | "cxx" | "hpp" => "C++",
        "c" | "h" => "C",
        "swift" => "Swift",
        "php" => "PHP",
        "vue" => "Vue",
        "svelte" => "Svelte",
        "md" => "Markdown",
        _ => "Plain Text",
    }
    .to_string()
}

struct ActiveFile {
    path: PathBuf,
    cursor_line: Option<u32>,
}

/// Reads project manifests under `root` and the currently active file.
pub struct WorkspaceContextProvider {
    root: PathBuf,
    active: RwLock<Option<ActiveFile>>,
    max_chars: usize,
}

impl WorkspaceContextProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            active: RwLock::new(None),
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn with_active_file(self, path: impl Into<PathBuf>, cursor_line: Option<u32>) -> Self {
        self.set_active_file(Some(path.into()), cursor_line);
        self
    }

    /// Updates (or clears) the active file, e.g. when the editor focus changes.
    pub fn set_active_file(&self, path: Option<PathBuf>, cursor_line: Option<u32>) {
        let mut active = self.active.write().unwrap_or_else(|p| p.into_inner());
        *active = path.map(|path| ActiveFile { path, cursor_line });
    }

    async fn read(&self, name: &str) -> Option<String> {
        tokio::fs::read_to_string(self.root.join(name)).await.ok()
    }

    async fn detect_node(&self) -> Option<ProjectContext> {
        let raw = self.read("package.json").await?;
        let pkg: serde_json::Value = serde_json::from_str(&raw).ok()?;
        let has_dep = |name: &str| {
            ["dependencies", "devDependencies", "peerDependencies"]
                .iter()
                .any(|section| pkg.get(section).and_then(|d| d.get(name)).is_some())
        };

        let framework = NODE_FRAMEWORKS
            .iter()
            .find(|(dep, _)| has_dep(dep))
            .map(|(_, display)| display.to_string());

        let tsconfig = self.read("tsconfig.json").await;
        let typescript = has_dep("typescript") || tsconfig.is_some();
        let mut constraints = Vec::new();
        if let Some(ts) = tsconfig {
            if tsconfig_is_strict(&ts) {
                constraints.push("TypeScript strict mode is enabled".to_string());
            }
        }
        if has_dep("tailwindcss") {
            constraints.push("Styling uses Tailwind CSS".to_string());
        }

        Some(ProjectContext {
            framework,
            language: if typescript { "TypeScript" } else { "JavaScript" }.to_string(),
            constraints,
        })
    }

    async fn detect_rust(&self) -> Option<ProjectContext> {
        let manifest = self.read("Cargo.toml").await?;
        Some(ProjectContext {
            framework: find_manifest_dep(&manifest, RUST_FRAMEWORKS),
            language: "Rust".to_string(),
            constraints: Vec::new(),
        })
    }

    async fn detect_python(&self) -> Option<ProjectContext> {
        let mut manifest = self.read("pyproject.toml").await.unwrap_or_default();
        if let Some(reqs) = self.read("requirements.txt").await {
            manifest.push('\n');
            manifest.push_str(&reqs);
        }
        if manifest.trim().is_empty() {
            return None;
        }
        let lower = manifest.to_lowercase();
        Some(ProjectContext {
            framework: PYTHON_FRAMEWORKS
                .iter()
                .find(|(dep, _)| lower.contains(dep))
                .map(|(_, display)| display.to_string()),
            language: "Python".to_string(),
            constraints: Vec::new(),
        })
    }

    async fn detect_go(&self) -> Option<ProjectContext> {
        let manifest = self.read("go.mod").await?;
        Some(ProjectContext {
            framework: GO_FRAMEWORKS
                .iter()
                .find(|(dep, _)| manifest.contains(dep))
                .map(|(_, display)| display.to_string()),
            language: "Go".to_string(),
            constraints: Vec::new(),
        })
    }
}

/// Matches `name = ...` / `name.workspace = ...` dependency lines in a TOML manifest.
fn find_manifest_dep(manifest: &str, candidates: &[(&str, &str)]) -> Option<String> {
    candidates
        .iter()
        .find(|(dep, _)| {
            manifest.lines().any(|line| {
                let line = line.trim_start();
                line.strip_prefix(dep)
                    .map(|rest| {
                        let rest = rest.trim_start();
                        rest.starts_with('=') || rest.starts_with('.')
                    })
                    .unwrap_or(false)
            })
        })
        .map(|(_, display)| display.to_string())
}

fn tsconfig_is_strict(raw: &str) -> bool {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(v) => v
            .get("compilerOptions")
            .and_then(|o| o.get("strict"))
            .and_then(|s| s.as_bool())
            .unwrap_or(false),
        // tsconfig allows comments; fall back to a textual check
        Err(_) => raw.replace(' ', "").contains("\"strict\":true"),
    }
}

#[async_trait]
impl ContextProvider for WorkspaceContextProvider {
    async fn project_context(&self) -> Option<ProjectContext> {
        if let Some(ctx) = self.detect_node().await {
            return Some(ctx);
        }
        if let Some(ctx) = self.detect_rust().await {
            return Some(ctx);
        }
        if let Some(ctx) = self.detect_python().await {
            return Some(ctx);
        }
        let ctx = self.detect_go().await;
        if ctx.is_none() {
            debug!(root = %self.root.display(), "no project manifest found");
        }
        ctx
    }

    async fn active_file_context(&self) -> Option<ActiveFileContext> {
        let (path, cursor_line) = {
            let active = self.active.read().unwrap_or_else(|p| p.into_inner());
            let file = active.as_ref()?;
            (file.path.clone(), file.cursor_line)
        };
        let full = if path.is_absolute() {
            path.clone()
        } else {
            self.root.join(&path)
        };
        let raw = tokio::fs::read_to_string(&full).await.ok()?;
        let truncated = raw.chars().count() > self.max_chars;
        let content = if truncated {
            raw.chars().take(self.max_chars).collect()
        } else {
            raw
        };
        let relative_path = full
            .strip_prefix(&self.root)
            .unwrap_or(&full)
            .to_string_lossy()
            .replace('\\', "/");
        Some(ActiveFileContext {
            relative_path,
            language: language_for_path(&full),
            content,
            cursor_line,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn test_detects_next_over_react() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "package.json",
            r#"{"dependencies":{"react":"18","next":"14"},"devDependencies":{"typescript":"5","tailwindcss":"3"}}"#,
        );
        write(dir.path(), "tsconfig.json", r#"{"compilerOptions":{"strict":true}}"#);

        let ctx = WorkspaceContextProvider::new(dir.path())
            .project_context()
            .await
            .unwrap();
        assert_eq!(ctx.framework.as_deref(), Some("Next.js"));
        assert_eq!(ctx.language, "TypeScript");
        assert_eq!(ctx.constraints.len(), 2);
    }

    #[tokio::test]
    async fn test_detects_rust_framework() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "Cargo.toml",
            "[package]\nname = \"svc\"\n\n[dependencies]\naxum = \"0.7\"\ntokio = { version = \"1\" }\n",
        );
        let ctx = WorkspaceContextProvider::new(dir.path())
            .project_context()
            .await
            .unwrap();
        assert_eq!(ctx.language, "Rust");
        assert_eq!(ctx.framework.as_deref(), Some("Axum"));
    }

    #[tokio::test]
    async fn test_empty_workspace_has_no_context() {
        let dir = tempfile::tempdir().unwrap();
        let provider = WorkspaceContextProvider::new(dir.path());
        assert!(provider.project_context().await.is_none());
        assert!(provider.active_file_context().await.is_none());
    }

    #[tokio::test]
    async fn test_active_file_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/app.py", &"x".repeat(50));
        let provider = WorkspaceContextProvider::new(dir.path())
            .with_max_chars(10)
            .with_active_file("src/app.py", Some(4));

        let file = provider.active_file_context().await.unwrap();
        assert_eq!(file.relative_path, "src/app.py");
        assert_eq!(file.language, "Python");
        assert_eq!(file.content.len(), 10);
        assert!(file.truncated);
        assert_eq!(file.cursor_line, Some(4));

        provider.set_active_file(None, None);
        assert!(provider.active_file_context().await.is_none());
    }

    #[test]
    fn test_tsconfig_with_comments_falls_back_to_text() {
        assert!(tsconfig_is_strict("{ // c\n \"compilerOptions\": { \"strict\": true } }"));
        assert!(!tsconfig_is_strict(r#"{"compilerOptions":{}}"#));
    }
}
