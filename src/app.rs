use crate::{
    bower::ManifestError,
    concat::{CommentStyle, Concat},
    errors::{FileOperation, IoError},
    options::{merge_with_defaults, ConfigError, Options, Preprocessor, StyleOptions, VendorPrecedence},
    pipeline::Pipeline,
    plugins::{BundleJob, PluginError, StyleJob, Toolchain},
    utils::{asset_path, join_dirs, tree_path},
    value::Mapping,
    vfs::{Precedence, Tree, TreeError},
};
use miette::Diagnostic;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

const VENDOR_JS_HEADER: &str = ";(function() {";
const VENDOR_JS_FOOTER: &str = "}());";
const VENDOR_CSS_FOOTER: &str = "\n";

#[derive(Debug, Error, Diagnostic)]
pub enum VendorError {
    #[error("bower packages were requested but could not be resolved")]
    #[diagnostic(
        code(sprig::vendor::bower_unresolved),
        help("Run `bower install` in the project root, or set vendor.bower = false")
    )]
    BowerUnresolved {
        #[source]
        source: ManifestError,
    },
}

#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Vendor(#[from] VendorError),

    #[error("I/O error within build domain")]
    #[diagnostic(code(sprig::build::io))]
    Io(#[from] IoError),
}

/// A front-end application build: merged options plus the tree builders that turn
/// them into one output tree.
#[derive(Debug, Clone)]
pub struct App {
    root: PathBuf,
    mapping: Mapping,
    options: Options,
}
impl App {
    /// Merges `overrides` against the default options, with paths relative to the
    /// current directory.
    pub fn new(overrides: &Mapping) -> Result<Self, ConfigError> {
        Self::with_root(".", overrides)
    }

    /// Like [`App::new`], with option paths relative to `root`.
    pub fn with_root<P: AsRef<Path>>(root: P, overrides: &Mapping) -> Result<Self, ConfigError> {
        let (mapping, options) = merge_with_defaults(overrides)?;

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            mapping,
            options,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Merged option mapping, with every default key present.
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The root and every enabled source directory the options point at.
    pub fn project_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![
            self.root.clone(),
            self.root.join(&self.options.source.src_dir),
        ];
        dirs.extend(self.options.public.iter().map(|public| self.root.join(public)));
        dirs.extend(
            self.options
                .vendor
                .iter()
                .map(|vendor| self.root.join(&vendor.src_dir)),
        );
        dirs
    }

    /// Composes the final tree: app, then public underneath it, then live reload,
    /// then vendor assets.
    pub fn to_tree(&self, tools: &Toolchain) -> Result<Tree, BuildError> {
        let vendor_precedence = match self.options.vendor.as_ref().map(|v| v.precedence) {
            Some(VendorPrecedence::App) => Precedence::Existing,
            Some(VendorPrecedence::Vendor) => Precedence::Incoming,
            Some(VendorPrecedence::Error) | None => Precedence::Strict,
        };
        let target = self.options.entry.as_deref().map(tree_path);

        Pipeline::new()
            .merge("app", true, Precedence::Strict, || self.app_tree(tools))
            .merge(
                "public",
                self.options.public.is_some(),
                Precedence::Existing,
                || self.public_tree(),
            )
            .wrap("livereload", self.options.devel, |tree| {
                Ok(tools.livereload.inject(tree, target)?)
            })
            .merge(
                "vendor",
                self.options.vendor.is_some(),
                vendor_precedence,
                || self.vendor_tree(tools),
            )
            .run()
    }

    /// Scripts, plus the entry html and styles when they are enabled.
    pub fn app_tree(&self, tools: &Toolchain) -> Result<Tree, BuildError> {
        Pipeline::new()
            .merge("scripts", true, Precedence::Strict, || self.scripts_tree(tools))
            .merge(
                "html",
                self.options.entry.is_some(),
                Precedence::Strict,
                || self.html_tree(),
            )
            .merge(
                "styles",
                self.options.source.styles.is_some(),
                Precedence::Strict,
                || self.styles_tree(tools),
            )
            .run()
    }

    /// The entry html file, copied to the tree root.
    pub fn html_tree(&self) -> Result<Tree, BuildError> {
        let Some(entry) = &self.options.entry else {
            return Ok(Tree::new());
        };

        let src_dir = self.root.join(&self.options.source.src_dir);

        Ok(Tree::pick(&src_dir, &[entry.as_str()], "/")?)
    }

    pub fn styles_tree(&self, tools: &Toolchain) -> Result<Tree, BuildError> {
        match self.options.source.styles.as_ref().map(|s| s.preprocessor) {
            Some(Preprocessor::Scss) => self.scss_tree(tools),
            Some(Preprocessor::Css) => self.css_tree(),
            None => Ok(Tree::new()),
        }
    }

    /// Resolved `(source dir, asset name, output dir)` for the application styles.
    fn style_paths<'a>(&'a self, styles: &'a StyleOptions) -> (String, &'a str, &'a str) {
        let source = &self.options.source;

        (
            join_dirs(&source.src_dir, &styles.src_dir),
            styles.name.as_deref().unwrap_or(&source.name),
            styles.dest_dir.as_deref().unwrap_or(&source.dest_dir),
        )
    }

    /// Plain stylesheet `{name}.css`, copied to `{destDir}/{name}.css`.
    pub fn css_tree(&self) -> Result<Tree, BuildError> {
        let Some(styles) = &self.options.source.styles else {
            return Ok(Tree::new());
        };
        let (src_dir, name, dest_dir) = self.style_paths(styles);

        let input = format!("{}.css", name);
        let picked = Tree::pick(&self.root.join(src_dir), &[input.as_str()], "")?;

        Ok(Concat::new(asset_path(dest_dir, name, "css")).run(picked.iter()))
    }

    /// `{name}.scss` compiled to `{destDir}/{name}.css` by the style compiler.
    pub fn scss_tree(&self, tools: &Toolchain) -> Result<Tree, BuildError> {
        let Some(styles) = &self.options.source.styles else {
            return Ok(Tree::new());
        };
        let (src_dir, name, dest_dir) = self.style_paths(styles);

        let job = StyleJob {
            include_paths: vec![self.root.join(src_dir)],
            input_file: format!("{}.scss", name),
            output_file: asset_path(dest_dir, name, "css"),
            source_map: styles.source_map,
            source_map_embed: styles.source_map_embed,
            source_map_contents: styles.source_map_contents,
        };

        Ok(tools.styles.compile(&job)?)
    }

    /// Every `.js` module under the scripts directory, transpiled and, unless
    /// `browserify` is off, bundled into `{destDir}/{name}.js`.
    pub fn scripts_tree(&self, tools: &Toolchain) -> Result<Tree, BuildError> {
        let source = &self.options.source;
        let scripts = &source.scripts;

        let src_dir = self.root.join(join_dirs(&source.src_dir, &scripts.src_dir));
        let name = scripts.name.as_deref().unwrap_or(&source.name);
        let dest_dir = scripts.dest_dir.as_deref().unwrap_or(&source.dest_dir);

        let modules = Tree::funnel(&src_dir, Some("js"), "")?;
        let modules = tools.transpiler.transpile(modules)?;

        if !scripts.browserify {
            return Ok(modules);
        }

        let job = BundleJob {
            entry: scripts
                .entry
                .clone()
                .unwrap_or_else(|| format!("{}.js", name)),
            output_file: asset_path(dest_dir, name, "js"),
            debug: scripts.source_map,
        };

        Ok(tools.bundler.bundle(&modules, &job)?)
    }

    /// The public directory, copied verbatim to the tree root.
    pub fn public_tree(&self) -> Result<Tree, BuildError> {
        let Some(public) = &self.options.public else {
            return Ok(Tree::new());
        };

        Ok(Tree::funnel(&self.root.join(public), None, "/")?)
    }

    /// Vendor scripts and stylesheets, each concatenated into a single file. Bower
    /// package files come first when enabled.
    pub fn vendor_tree(&self, tools: &Toolchain) -> Result<Tree, BuildError> {
        let Some(vendor) = &self.options.vendor else {
            return Ok(Tree::new());
        };

        let vendor_dir = self.root.join(&vendor.src_dir);
        let mut scripts: Vec<(PathBuf, Vec<u8>)> = Vec::new();
        let mut styles: Vec<(PathBuf, Vec<u8>)> = Vec::new();

        if vendor.bower {
            let files = tools
                .manifest
                .read()
                .and_then(|files| {
                    if files.values().all(Vec::is_empty) {
                        Err(ManifestError::NoFiles)
                    } else {
                        Ok(files)
                    }
                })
                .map_err(|source| VendorError::BowerUnresolved { source })?;

            for (extension, target) in [("js", &mut scripts), ("css", &mut styles)] {
                for path in files.get(extension).into_iter().flatten() {
                    let content = fs::read(path)
                        .map_err(|error| IoError::new(FileOperation::Read, path.clone(), error))?;
                    let label = path.strip_prefix(&self.root).unwrap_or(path).to_path_buf();

                    target.push((label, content));
                }
            }
        }

        for (extension, target) in [("js", &mut scripts), ("css", &mut styles)] {
            let local = Tree::funnel_optional(&vendor_dir, Some(extension), &vendor.src_dir)?;
            target.extend(
                local
                    .iter()
                    .map(|(path, content)| (path.to_path_buf(), content.to_vec())),
            );
        }

        log::debug!(
            "vendor: {} script(s), {} stylesheet(s)",
            scripts.len(),
            styles.len()
        );

        let js = Concat::new(asset_path(
            vendor.scripts.dest_dir.as_deref().unwrap_or(&vendor.dest_dir),
            vendor.scripts.name.as_deref().unwrap_or(&vendor.name),
            "js",
        ))
        .header(VENDOR_JS_HEADER)
        .footer(VENDOR_JS_FOOTER)
        .source_map(vendor.scripts.source_map, CommentStyle::Line)
        .run(scripts.iter().map(|(path, content)| (path.as_path(), content.as_slice())));

        let css = Concat::new(asset_path(
            vendor.styles.dest_dir.as_deref().unwrap_or(&vendor.dest_dir),
            vendor.styles.name.as_deref().unwrap_or(&vendor.name),
            "css",
        ))
        .footer(VENDOR_CSS_FOOTER)
        .source_map(vendor.styles.source_map, CommentStyle::Block)
        .run(styles.iter().map(|(path, content)| (path.as_path(), content.as_slice())));

        Ok(js.union(css, Precedence::Strict)?)
    }
}
