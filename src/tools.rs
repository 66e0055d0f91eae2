use crate::{
    errors::{FileOperation, IoError},
    plugins::{
        BundleJob, LiveReloadInjector, ModuleTranspiler, PluginError, ScriptBundler,
        StyleCompiler, StyleJob,
    },
    utils::display_tree_path,
    vfs::Tree,
};
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

/// Port the live-reload server listens on by convention.
pub const LIVERELOAD_PORT: u16 = 35729;

/// Runs a command to completion, turning a non-zero exit into [`PluginError::Failed`].
fn execute_checked(mut cmd: Command, program: &str) -> Result<(), PluginError> {
    log::debug!("running {:?}", cmd);

    let output = cmd.output().map_err(|error| PluginError::Spawn {
        program: program.to_string(),
        source: error,
    })?;

    if !output.status.success() {
        return Err(PluginError::Failed {
            program: program.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}

fn staging_dir() -> Result<tempfile::TempDir, PluginError> {
    tempfile::tempdir()
        .map_err(|error| IoError::new(FileOperation::Mkdir, std::env::temp_dir(), error).into())
}

fn read_output(program: &str, path: &Path) -> Result<Vec<u8>, PluginError> {
    if !path.is_file() {
        return Err(PluginError::MissingOutput {
            program: program.to_string(),
            path: path.to_path_buf(),
        });
    }

    Ok(fs::read(path).map_err(|error| IoError::new(FileOperation::Read, path.to_path_buf(), error))?)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "out".into())
}

/// Compiles one stylesheet with the Dart Sass command-line tool.
#[derive(Debug, Clone)]
pub struct SassCommand {
    program: String,
}
impl SassCommand {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    /// Arguments for compiling `job` into `output`.
    pub fn arguments(&self, job: &StyleJob, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = job
            .include_paths
            .iter()
            .map(|path| format!("--load-path={}", path.display()))
            .collect();

        let input = match job.include_paths.first() {
            Some(dir) => dir.join(&job.input_file),
            None => PathBuf::from(&job.input_file),
        };
        args.push(input.display().to_string());
        args.push(output.display().to_string());

        if job.source_map {
            if job.source_map_embed {
                args.push("--embed-source-map".into());
            }
            if job.source_map_contents {
                args.push("--embed-sources".into());
            }
        } else {
            args.push("--no-source-map".into());
        }

        args
    }
}
impl StyleCompiler for SassCommand {
    fn compile(&self, job: &StyleJob) -> Result<Tree, PluginError> {
        let staging = staging_dir()?;
        let output = staging.path().join(file_name_of(&job.output_file));

        let mut cmd = Command::new(&self.program);
        cmd.args(self.arguments(job, &output));
        execute_checked(cmd, &self.program)?;

        let mut tree = Tree::new();
        tree.insert(&job.output_file, read_output(&self.program, &output)?);

        if job.source_map && !job.source_map_embed {
            let map = output.with_file_name(format!("{}.map", file_name_of(&output)));
            let map_target = job
                .output_file
                .with_file_name(format!("{}.map", file_name_of(&job.output_file)));

            tree.insert(map_target, read_output(&self.program, &map)?);
        }

        Ok(tree)
    }
}

/// Bundles modules with esbuild. The module tree is written to a staging directory
/// first, since esbuild only reads from disk.
#[derive(Debug, Clone)]
pub struct EsbuildCommand {
    program: String,
}
impl EsbuildCommand {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    pub fn arguments(&self, job: &BundleJob, output: &Path) -> Vec<String> {
        let mut args = vec![
            job.entry.clone(),
            "--bundle".to_string(),
            format!("--outfile={}", output.display()),
        ];

        if job.debug {
            args.push("--sourcemap=inline".into());
        }

        args
    }
}
impl ScriptBundler for EsbuildCommand {
    fn bundle(&self, modules: &Tree, job: &BundleJob) -> Result<Tree, PluginError> {
        let staging = staging_dir()?;
        let sources = staging.path().join("src");
        let output = staging.path().join("out").join(file_name_of(&job.output_file));

        fs::create_dir_all(&sources)
            .map_err(|error| IoError::new(FileOperation::Mkdir, sources.clone(), error))?;
        modules.materialize(&sources)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(self.arguments(job, &output)).current_dir(&sources);
        execute_checked(cmd, &self.program)?;

        let mut tree = Tree::new();
        tree.insert(&job.output_file, read_output(&self.program, &output)?);

        Ok(tree)
    }
}

/// Transpiles each module on its own with esbuild, keeping its path. Modules are
/// rewritten to CommonJS so the bundler can link them.
#[derive(Debug, Clone)]
pub struct EsbuildTransform {
    program: String,
}
impl EsbuildTransform {
    pub const TARGET: &'static str = "es2015";

    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    /// Arguments for transpiling `files`, relative to the working directory, into `outdir`.
    pub fn arguments(&self, files: &[String], outdir: &Path) -> Vec<String> {
        let mut args = files.to_vec();
        args.push(format!("--outdir={}", outdir.display()));
        args.push("--outbase=.".into());
        args.push("--format=cjs".into());
        args.push(format!("--target={}", Self::TARGET));
        args
    }
}
impl ModuleTranspiler for EsbuildTransform {
    fn transpile(&self, modules: Tree) -> Result<Tree, PluginError> {
        if modules.is_empty() {
            return Ok(modules);
        }

        let staging = staging_dir()?;
        let sources = staging.path().join("src");
        let output = staging.path().join("out");

        fs::create_dir_all(&sources)
            .map_err(|error| IoError::new(FileOperation::Mkdir, sources.clone(), error))?;
        modules.materialize(&sources)?;

        let files: Vec<String> = modules.paths().map(display_tree_path).collect();

        let mut cmd = Command::new(&self.program);
        cmd.args(self.arguments(&files, &output)).current_dir(&sources);
        execute_checked(cmd, &self.program)?;

        let mut tree = Tree::new();
        for path in modules.paths() {
            tree.insert(path, read_output(&self.program, &output.join(path))?);
        }

        Ok(tree)
    }
}

/// Leaves modules untouched, for sources that browsers or the bundler already understand.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;
impl ModuleTranspiler for Passthrough {
    fn transpile(&self, modules: Tree) -> Result<Tree, PluginError> {
        Ok(modules)
    }
}

/// Adds the live-reload client script to an HTML file.
#[derive(Debug, Clone)]
pub struct ScriptTagInjector {
    pub port: u16,
}
impl Default for ScriptTagInjector {
    fn default() -> Self {
        Self {
            port: LIVERELOAD_PORT,
        }
    }
}
impl ScriptTagInjector {
    pub fn snippet(&self) -> String {
        format!(
            "<script src=\"//localhost:{}/livereload.js?snipver=1\"></script>",
            self.port
        )
    }

    /// Places the snippet before the last closing body tag, or at the end.
    pub fn inject_into(&self, html: &str) -> String {
        lazy_static::lazy_static! {
            static ref BODY_CLOSE: regex::Regex =
                regex::Regex::new(r"(?i)</body\s*>").expect("a valid regex pattern");
        }

        let snippet = self.snippet();

        match BODY_CLOSE.find_iter(html).last() {
            Some(found) => format!(
                "{}{}\n{}",
                &html[..found.start()],
                snippet,
                &html[found.start()..]
            ),
            None => format!("{}\n{}\n", html.trim_end_matches('\n'), snippet),
        }
    }
}
impl LiveReloadInjector for ScriptTagInjector {
    fn inject(&self, mut tree: Tree, target: Option<PathBuf>) -> Result<Tree, PluginError> {
        let Some(target) = target else {
            log::warn!("live reload is enabled but no entry file is configured");
            return Ok(tree);
        };

        let Some(html) = tree.get_str(&target) else {
            log::warn!(
                "live reload target '{}' is not part of the output",
                display_tree_path(&target)
            );
            return Ok(tree);
        };

        let injected = self.inject_into(html);
        log::debug!("injected live reload client into {}", display_tree_path(&target));
        tree.insert(&target, injected);

        Ok(tree)
    }
}
