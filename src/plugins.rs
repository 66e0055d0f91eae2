//! Narrow contracts for the work sprig delegates: compiling styles, transpiling and
//! bundling scripts, injecting the live-reload client and listing installed packages.
//!
//! [`Toolchain`] bundles one implementation of each; [`Toolchain::external`] wires up
//! the command-line tools from [`crate::tools`] and [`crate::bower`].
use crate::{
    bower::{BowerManifest, ManifestError},
    errors::IoError,
    tools::{EsbuildCommand, EsbuildTransform, Passthrough, SassCommand, ScriptTagInjector},
    vfs::{Tree, TreeError},
};
use indexmap::IndexMap;
use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PluginError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Tree(#[from] TreeError),

    #[error("I/O error within plugin domain")]
    #[diagnostic(code(sprig::plugin::io))]
    Io(#[from] IoError),

    #[error("unable to start '{program}': {source}")]
    #[diagnostic(
        code(sprig::plugin::spawn),
        help("Make sure the tool is installed and on PATH, or point sprig at it explicitly")
    )]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed (exit {code}): {stderr}")]
    #[diagnostic(code(sprig::plugin::failed))]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("{program} did not produce '{path}'")]
    #[diagnostic(code(sprig::plugin::missing_output))]
    MissingOutput { program: String, path: PathBuf },
}

/// Parameters for compiling one stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleJob {
    pub include_paths: Vec<PathBuf>,
    /// Input file, relative to the first include path.
    pub input_file: String,
    /// Output file, relative to the tree root.
    pub output_file: PathBuf,
    pub source_map: bool,
    pub source_map_embed: bool,
    pub source_map_contents: bool,
}

/// Parameters for bundling transpiled modules into one browser script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleJob {
    /// Entry module, relative to the tree being bundled.
    pub entry: String,
    /// Output file, relative to the tree root.
    pub output_file: PathBuf,
    /// Emit inline source maps.
    pub debug: bool,
}

/// Files of installed third-party packages, grouped by extension (`js`, `css`, ...)
/// and listed in load order.
pub type ManifestFiles = IndexMap<String, Vec<PathBuf>>;

#[cfg_attr(test, mockall::automock)]
pub trait StyleCompiler {
    fn compile(&self, job: &StyleJob) -> Result<Tree, PluginError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait ModuleTranspiler {
    fn transpile(&self, modules: Tree) -> Result<Tree, PluginError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait ScriptBundler {
    fn bundle(&self, modules: &Tree, job: &BundleJob) -> Result<Tree, PluginError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait LiveReloadInjector {
    /// Returns `tree` with the reload client added to `target`. `None` means no entry
    /// file is configured.
    fn inject(&self, tree: Tree, target: Option<PathBuf>) -> Result<Tree, PluginError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait ManifestReader {
    fn read(&self) -> Result<ManifestFiles, ManifestError>;
}

/// One implementation of every plugin contract.
pub struct Toolchain {
    pub styles: Box<dyn StyleCompiler>,
    pub transpiler: Box<dyn ModuleTranspiler>,
    pub bundler: Box<dyn ScriptBundler>,
    pub livereload: Box<dyn LiveReloadInjector>,
    pub manifest: Box<dyn ManifestReader>,
}
impl Toolchain {
    /// The external command-line tools, with bower packages read from `root`. With
    /// `transpile` off, modules reach the bundler as written.
    pub fn external(root: &Path, sass: &str, esbuild: &str, transpile: bool) -> Self {
        let transpiler: Box<dyn ModuleTranspiler> = if transpile {
            Box::new(EsbuildTransform::new(esbuild))
        } else {
            Box::new(Passthrough)
        };

        Self {
            styles: Box::new(SassCommand::new(sass)),
            transpiler,
            bundler: Box::new(EsbuildCommand::new(esbuild)),
            livereload: Box::new(ScriptTagInjector::default()),
            manifest: Box::new(BowerManifest::new(root)),
        }
    }
}
impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain").finish_non_exhaustive()
    }
}
