use crate::{
    errors::{FileOperation, IoError, ParseError},
    plugins::{ManifestFiles, ManifestReader},
};
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tampopo::Graph;
use thiserror::Error;

/// Root manifest file name.
pub const BOWER_JSON: &str = "bower.json";
/// Directory bower installs packages into.
pub const COMPONENTS_DIR: &str = "bower_components";

#[derive(Debug, Error, Diagnostic)]
pub enum ManifestError {
    #[error("I/O error within manifest domain")]
    #[diagnostic(code(sprig::manifest::io))]
    Io(#[from] IoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error("no bower manifest at '{path}'")]
    #[diagnostic(code(sprig::manifest::missing))]
    Missing { path: PathBuf },

    #[error("package '{package}' is not installed (looked in '{path}')")]
    #[diagnostic(code(sprig::manifest::not_installed))]
    NotInstalled { package: String, path: PathBuf },

    #[error("bower manifest declares no dependencies")]
    #[diagnostic(code(sprig::manifest::no_packages))]
    NoPackages,

    #[error("installed bower packages list no main files")]
    #[diagnostic(
        code(sprig::manifest::no_files),
        help("Add a `main` entry for the package under `overrides` in bower.json")
    )]
    NoFiles,

    #[error("bower packages depend on each other in a cycle: {message}")]
    #[diagnostic(code(sprig::manifest::cycle))]
    Cycle { message: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MainField {
    One(String),
    Many(Vec<String>),
}
impl MainField {
    fn files(&self) -> Vec<&str> {
        match self {
            Self::One(file) => vec![file.as_str()],
            Self::Many(files) => files.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PackageOverride {
    main: Option<MainField>,
}

#[derive(Debug, Default, Deserialize)]
struct BowerJson {
    #[serde(default)]
    main: Option<MainField>,
    #[serde(default)]
    dependencies: IndexMap<String, String>,
    #[serde(default)]
    overrides: IndexMap<String, PackageOverride>,
}

/// Lists the main files of installed bower packages, dependencies first.
#[derive(Debug, Clone)]
pub struct BowerManifest {
    root: PathBuf,
}
impl BowerManifest {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn parse(path: &Path) -> Result<BowerJson, ManifestError> {
        let content = fs::read_to_string(path)
            .map_err(|error| IoError::new(FileOperation::Read, path.to_path_buf(), error))?;

        Ok(serde_json::from_str(&content)
            .map_err(|error| ParseError::json(path.to_path_buf(), error))?)
    }

    /// Installed packages keep a resolved copy as `.bower.json`; prefer it.
    fn package(&self, name: &str) -> Result<(PathBuf, BowerJson), ManifestError> {
        let dir = self.root.join(COMPONENTS_DIR).join(name);

        for file in [".bower.json", BOWER_JSON] {
            let path = dir.join(file);
            if path.is_file() {
                return Ok((dir, Self::parse(&path)?));
            }
        }

        Err(ManifestError::NotInstalled {
            package: name.to_string(),
            path: dir,
        })
    }
}
impl ManifestReader for BowerManifest {
    fn read(&self) -> Result<ManifestFiles, ManifestError> {
        let root_path = self.root.join(BOWER_JSON);
        if !root_path.is_file() {
            return Err(ManifestError::Missing { path: root_path });
        }

        let root = Self::parse(&root_path)?;
        if root.dependencies.is_empty() {
            return Err(ManifestError::NoPackages);
        }

        let mut graph: Graph<String> = Graph::new();
        let mut packages: IndexMap<String, (PathBuf, BowerJson)> = IndexMap::new();
        let mut pending: Vec<String> = root.dependencies.keys().cloned().collect();
        pending.reverse();

        while let Some(name) = pending.pop() {
            if packages.contains_key(&name) {
                continue;
            }

            let (dir, manifest) = self.package(&name)?;
            graph.add_node(name.clone());

            for dependency in manifest.dependencies.keys().rev() {
                pending.push(dependency.clone());
            }

            packages.insert(name, (dir, manifest));
        }

        for (name, (_, manifest)) in &packages {
            for dependency in manifest.dependencies.keys() {
                graph.add_edge(dependency.clone(), name.clone());
            }
        }

        let order = tampopo::sort_graph(&graph).map_err(|error| ManifestError::Cycle {
            message: error.to_string(),
        })?;

        let mut files = ManifestFiles::new();

        for name in order {
            let Some((dir, manifest)) = packages.get(&name) else {
                continue;
            };

            let main = root
                .overrides
                .get(&name)
                .and_then(|o| o.main.as_ref())
                .or(manifest.main.as_ref());

            let Some(main) = main else {
                log::warn!("bower package '{}' declares no main files", name);
                continue;
            };

            for file in main.files() {
                let path = dir.join(file);
                if !path.is_file() {
                    log::warn!("bower package '{}' lists missing file: {}", name, path.display());
                    continue;
                }

                let extension = path
                    .extension()
                    .map(|ext| ext.to_string_lossy().to_string())
                    .unwrap_or_default();

                files.entry(extension).or_default().push(path);
            }
        }

        log::debug!("resolved {} bower packages", packages.len());

        Ok(files)
    }
}
