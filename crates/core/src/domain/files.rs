use serde::{Deserialize, Serialize};

/// A piece of call context materialized into the sandbox filesystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualFile {
    /// Relative to the sandbox workdir, `/`-separated.
    pub path: String,
    pub content: String,
}

impl VirtualFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self { path: path.into(), content: content.into() }
    }

    pub fn parent_dir(&self) -> Option<&str> {
        self.path.rsplit_once('/').map(|(dir, _)| dir).filter(|dir| !dir.is_empty())
    }
}

/// Ordered listing of file paths, used only for prompt text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FileTree {
    paths: Vec<String>,
}

impl FileTree {
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn render(&self) -> String {
        self.paths.iter().map(|path| format!("- {path}")).collect::<Vec<_>>().join("\n")
    }
}

/// The files built for one call, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallContext {
    files: Vec<VirtualFile>,
}

impl CallContext {
    pub fn push(&mut self, file: VirtualFile) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[VirtualFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.iter().any(|file| file.path == path)
    }

    pub fn get(&self, path: &str) -> Option<&VirtualFile> {
        self.files.iter().find(|file| file.path == path)
    }

    pub fn tree(&self) -> FileTree {
        FileTree { paths: self.files.iter().map(|file| file.path.clone()).collect() }
    }

    /// Distinct parent directories in first-seen order.
    pub fn directories(&self) -> Vec<String> {
        let mut directories: Vec<String> = Vec::new();
        for dir in self.files.iter().filter_map(VirtualFile::parent_dir) {
            if !directories.iter().any(|seen| seen == dir) {
                directories.push(dir.to_string());
            }
        }
        directories
    }
}
