use crate::{
    app::{App, BuildError},
    options::{ConfigError, Overrides, CONFIG_FILE_NAME},
    output::{self, OutputError, WriteReport},
    plugins::Toolchain,
    preview::preview_as_tree,
    value::{Mapping, Value},
    vfs::Tree,
};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SprigError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Output(#[from] OutputError),

    #[error("unable to render options as toml")]
    #[diagnostic(code(sprig::api::render))]
    Render(#[from] toml::ser::Error),
}

/// Where the user-supplied option layers come from.
#[derive(Debug, Clone, Default)]
pub struct OverrideSources {
    /// Explicit options file. When absent, `Sprig.toml` in the project root is used
    /// if it exists.
    pub config: Option<PathBuf>,
    /// Value of `SPRIG_ENV`, if set.
    pub env_mode: Option<String>,
    pub devel: bool,
    /// `key.path=value` arguments, applied in order.
    pub sets: Vec<String>,
}

/// What `build` should do with the composed tree.
#[derive(Debug, Clone)]
pub struct BuildTarget {
    pub output: PathBuf,
    pub clean: bool,
    pub dry_run: bool,
}

/// Deep-merges the file, environment and command-line layers, lowest first.
pub fn load_overrides(root: &Path, sources: &OverrideSources) -> Result<Mapping, ConfigError> {
    let mut overrides = Overrides::new();

    match &sources.config {
        Some(path) => {
            log::debug!("reading options from {}", path.display());
            overrides.layer(&Overrides::from_file(path)?);
        }
        None => {
            let path = root.join(CONFIG_FILE_NAME);
            if path.is_file() {
                log::debug!("reading options from {}", path.display());
                overrides.layer(&Overrides::from_file(&path)?);
            }
        }
    }

    if let Some(layer) = sources.env_mode.as_deref().and_then(Overrides::from_env_mode) {
        overrides.layer(&layer);
    }

    if sources.devel {
        let mut layer = Mapping::new();
        layer.insert("devel".into(), Value::Bool(true));
        overrides.layer(&layer);
    }

    for argument in &sources.sets {
        overrides.layer(&Overrides::parse_set(argument)?);
    }

    Ok(overrides.0)
}

/// Composes the application tree and writes it to `target.output`, relative to the app
/// root. A dry run only previews it.
pub fn build(
    app: &App,
    tools: &Toolchain,
    target: &BuildTarget,
) -> Result<(Tree, WriteReport), SprigError> {
    let destination = app.root().join(&target.output);

    if target.clean && !target.dry_run {
        output::ensure_clean_is_safe(&destination, &app.project_dirs())?;
    }

    let tree = app.to_tree(tools)?;

    log::debug!("composed {} file(s)", tree.len());

    if target.dry_run {
        preview_as_tree(&tree, &destination);
        return Ok((tree, WriteReport::default()));
    }

    let report = output::write_tree(&tree, &destination, target.clean)?;
    log::info!(
        "wrote {} file(s) to {}",
        report.len(),
        destination.display()
    );

    Ok((tree, report))
}

/// The merged options as TOML. Unset keys have no TOML spelling and are left out.
pub fn render_config(app: &App) -> Result<String, SprigError> {
    let value = Value::Mapping(app.mapping().clone())
        .to_toml()
        .unwrap_or_else(|| toml::Value::Table(toml::Table::new()));

    Ok(toml::to_string_pretty(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn later_layers_win() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "devel = true\n[source]\nname = \"site\"\ndestDir = \"static\"\n",
        )
        .unwrap();

        let sources = OverrideSources {
            env_mode: Some("production".into()),
            sets: vec!["source.name=main".into()],
            ..Default::default()
        };

        let overrides = load_overrides(dir.path(), &sources).unwrap();
        let root = Value::Mapping(overrides);

        assert_eq!(root.lookup("devel"), Some(&Value::Bool(false)));
        assert_eq!(root.lookup("source.name"), Some(&Value::from("main")));
        assert_eq!(root.lookup("source.destDir"), Some(&Value::from("static")));
    }

    #[test]
    fn devel_flag_beats_the_environment() {
        let dir = tempfile::tempdir().unwrap();
        let sources = OverrideSources {
            env_mode: Some("production".into()),
            devel: true,
            ..Default::default()
        };

        let overrides = load_overrides(dir.path(), &sources).unwrap();

        assert_eq!(overrides.get("devel"), Some(&Value::Bool(true)));
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let sources = OverrideSources {
            config: Some(dir.path().join("missing.toml")),
            ..Default::default()
        };

        let error = load_overrides(dir.path(), &sources).unwrap_err();

        assert!(matches!(error, ConfigError::Io(_)));
    }

    #[test]
    fn clean_build_into_a_source_directory_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("app/styles")).unwrap();
        fs::write(root.join("app/styles/app.scss"), "body {}").unwrap();

        let app = App::with_root(root, &Mapping::new()).unwrap();
        let tools = Toolchain::external(root, "sass", "esbuild", false);

        for output in ["app", "."] {
            let target = BuildTarget {
                output: PathBuf::from(output),
                clean: true,
                dry_run: false,
            };

            let error = build(&app, &tools, &target).unwrap_err();

            assert!(matches!(
                error,
                SprigError::Output(OutputError::CleanRemovesProject { .. })
            ));
        }
        assert!(root.join("app/styles/app.scss").exists());
    }

    #[test]
    fn rendered_config_omits_unset_keys() {
        let app = App::new(&Mapping::new()).unwrap();

        let rendered = render_config(&app).unwrap();

        assert!(rendered.contains("entry = \"index.html\""));
        assert!(rendered.contains("[source.styles]"));
        assert!(!rendered.contains("null"));
    }
}
