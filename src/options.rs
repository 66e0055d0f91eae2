use crate::{
    errors::{FileOperation, IoError, ParseError},
    value::{merge_deep, merged, Mapping, Value},
};
use miette::Diagnostic;
use std::{fmt, fs, path::Path, str::FromStr};
use thiserror::Error;

/// Name of the configuration file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "Sprig.toml";
/// Environment variable selecting `development` or `production` mode.
pub const ENV_VAR: &str = "SPRIG_ENV";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("I/O error within config domain")]
    #[diagnostic(code(sprig::config::io))]
    Io(#[from] IoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error("option '{path}' must be {expected}, found {found}")]
    #[diagnostic(
        code(sprig::config::invalid_type),
        help("Check the value given in Sprig.toml or on the command line")
    )]
    InvalidType {
        path: String,
        expected: &'static str,
        found: String,
    },

    #[error("option '{path}' has unsupported value '{value}' (supported: {supported})")]
    #[diagnostic(code(sprig::config::invalid_value))]
    InvalidValue {
        path: String,
        value: String,
        supported: &'static str,
    },

    #[error("invalid --set argument: '{argument}'")]
    #[diagnostic(
        code(sprig::config::invalid_set),
        help("Use the form key.path=value, for example --set source.name=main")
    )]
    InvalidSet { argument: String },
}

/// The built-in option set every override is merged against.
pub fn default_options() -> Mapping {
    let defaults = r#"
        entry = "index.html"
        public = "public"
        devel = false

        [source]
        srcDir = "app"
        name = "app"
        destDir = "assets"

        [source.styles]
        srcDir = "styles"
        preprocessor = "scss"
        sourceMapEmbed = true
        sourceMapContents = true

        [source.scripts]
        srcDir = ""
        browserify = true

        [vendor]
        srcDir = "vendor"
        name = "vendor"
        destDir = "assets"
        bower = false
        precedence = "error"

        [vendor.styles]

        [vendor.scripts]
        name = "vendor"
    "#;

    let table: toml::Table = match toml::from_str(defaults) {
        Ok(table) => table,
        Err(error) => unreachable!("built-in defaults are valid toml: {error}"),
    };

    let mut options = match Value::from(table) {
        Value::Mapping(m) => m,
        _ => unreachable!(),
    };

    // keys that exist in the defaults but have no toml spelling for "unset"
    let nulls: [(&str, &[&str]); 4] = [
        ("source.styles", &["name", "destDir", "sourceMap"]),
        ("source.scripts", &["name", "destDir", "entry", "sourceMap"]),
        ("vendor.styles", &["name", "destDir", "sourceMap"]),
        ("vendor.scripts", &["destDir", "sourceMap"]),
    ];
    for (path, keys) in nulls {
        let mut level = Mapping::new();
        for key in keys {
            level.insert((*key).to_string(), Value::Null);
        }
        let Value::Mapping(patch) = Value::from_dotted(path, Value::Mapping(level)) else {
            unreachable!()
        };
        merge_deep(&mut options, &patch);
    }

    options
}

/// Accumulates override layers (file, environment, command line) before they are
/// merged against [`default_options`].
#[derive(Debug, Clone, Default)]
pub struct Overrides(pub Mapping);
impl Overrides {
    pub fn new() -> Self {
        Self(Mapping::new())
    }

    /// Deep-merges another layer on top of the current one.
    pub fn layer(&mut self, layer: &Mapping) -> &mut Self {
        merge_deep(&mut self.0, layer);
        self
    }

    /// Reads a TOML options file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Mapping, ConfigError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .map_err(|error| IoError::new(FileOperation::Read, path.to_path_buf(), error))?;

        let table: toml::Table = toml::from_str(&content)
            .map_err(|error| ParseError::toml(path.to_path_buf(), error))?;

        match Value::from(table) {
            Value::Mapping(m) => Ok(m),
            _ => unreachable!(),
        }
    }

    /// Maps a `SPRIG_ENV` value onto the `devel` flag.
    pub fn from_env_mode(mode: &str) -> Option<Mapping> {
        let devel = match mode.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => true,
            "production" | "prod" => false,
            other => {
                log::warn!("ignoring unknown {}: '{}'", ENV_VAR, other);
                return None;
            }
        };

        let mut layer = Mapping::new();
        layer.insert("devel".into(), Value::Bool(devel));
        Some(layer)
    }

    /// Parses a single `key.path=value` argument. The value is read as a TOML value and
    /// falls back to a plain string when it is not one (`--set source.name=main`).
    pub fn parse_set(argument: &str) -> Result<Mapping, ConfigError> {
        let (path, raw) = argument
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidSet {
                argument: argument.to_string(),
            })?;

        let path = path.trim();
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(ConfigError::InvalidSet {
                argument: argument.to_string(),
            });
        }

        let value = parse_scalar(raw.trim());

        match Value::from_dotted(path, value) {
            Value::Mapping(m) => Ok(m),
            _ => unreachable!(),
        }
    }
}

fn parse_scalar(raw: &str) -> Value {
    if raw == "null" {
        return Value::Null;
    }

    let document = format!("value = {}", raw);
    toml::from_str::<toml::Table>(&document)
        .ok()
        .and_then(|mut table| table.remove("value"))
        .map(Value::from)
        .unwrap_or_else(|| Value::from(raw))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preprocessor {
    Scss,
    Css,
}
impl FromStr for Preprocessor {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scss" => Ok(Self::Scss),
            "css" => Ok(Self::Css),
            _ => Err(()),
        }
    }
}
impl fmt::Display for Preprocessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scss => write!(f, "scss"),
            Self::Css => write!(f, "css"),
        }
    }
}

/// Which side wins when the vendor tree and the application tree write the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorPrecedence {
    /// A collision fails the build.
    Error,
    /// The application file is kept.
    App,
    /// The vendor file is kept.
    Vendor,
}
impl FromStr for VendorPrecedence {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(Self::Error),
            "app" => Ok(Self::App),
            "vendor" => Ok(Self::Vendor),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleOptions {
    pub src_dir: String,
    pub name: Option<String>,
    pub dest_dir: Option<String>,
    pub preprocessor: Preprocessor,
    pub source_map: bool,
    pub source_map_embed: bool,
    pub source_map_contents: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOptions {
    pub src_dir: String,
    pub name: Option<String>,
    pub dest_dir: Option<String>,
    pub entry: Option<String>,
    pub source_map: bool,
    pub browserify: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceOptions {
    pub src_dir: String,
    pub name: String,
    pub dest_dir: String,
    pub styles: Option<StyleOptions>,
    pub scripts: ScriptOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VendorAssetOptions {
    pub name: Option<String>,
    pub dest_dir: Option<String>,
    pub source_map: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VendorOptions {
    pub src_dir: String,
    pub name: String,
    pub dest_dir: String,
    pub bower: bool,
    pub precedence: VendorPrecedence,
    pub styles: VendorAssetOptions,
    pub scripts: VendorAssetOptions,
}

/// Typed view over a merged option mapping. `None` means the section is disabled.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub entry: Option<String>,
    pub source: SourceOptions,
    pub public: Option<String>,
    pub devel: bool,
    pub vendor: Option<VendorOptions>,
}
impl Options {
    /// Resolves a merged mapping. Unset `sourceMap` flags follow `devel`.
    pub fn resolve(merged: &Mapping) -> Result<Self, ConfigError> {
        let root = Reader::root(merged);

        let devel = root.bool("devel")?.unwrap_or(false);

        let source = root.section("source")?.ok_or_else(|| ConfigError::InvalidType {
            path: "source".into(),
            expected: "a mapping",
            found: root.found("source"),
        })?;

        let styles = match source.section("styles")? {
            Some(styles) => Some(StyleOptions {
                src_dir: styles.string("srcDir")?.unwrap_or_default(),
                name: styles.string("name")?,
                dest_dir: styles.string("destDir")?,
                preprocessor: styles
                    .parsed("preprocessor", "scss, css")?
                    .unwrap_or(Preprocessor::Scss),
                source_map: styles.bool("sourceMap")?.unwrap_or(devel),
                source_map_embed: styles.bool("sourceMapEmbed")?.unwrap_or(true),
                source_map_contents: styles.bool("sourceMapContents")?.unwrap_or(true),
            }),
            None => None,
        };

        let scripts = source.section("scripts")?.unwrap_or_else(|| source.empty("scripts"));
        let scripts = ScriptOptions {
            src_dir: scripts.string("srcDir")?.unwrap_or_default(),
            name: scripts.string("name")?,
            dest_dir: scripts.string("destDir")?,
            entry: scripts.string("entry")?,
            source_map: scripts.bool("sourceMap")?.unwrap_or(devel),
            browserify: scripts.bool("browserify")?.unwrap_or(true),
        };

        let vendor = match root.section("vendor")? {
            Some(vendor) => {
                let asset = |key: &'static str| -> Result<VendorAssetOptions, ConfigError> {
                    let level = vendor.section(key)?.unwrap_or_else(|| vendor.empty(key));
                    Ok(VendorAssetOptions {
                        name: level.string("name")?,
                        dest_dir: level.string("destDir")?,
                        source_map: level.bool("sourceMap")?.unwrap_or(devel),
                    })
                };

                Some(VendorOptions {
                    src_dir: vendor.string("srcDir")?.unwrap_or_else(|| "vendor".into()),
                    name: vendor.string("name")?.unwrap_or_else(|| "vendor".into()),
                    dest_dir: vendor.string("destDir")?.unwrap_or_else(|| "assets".into()),
                    bower: vendor.bool("bower")?.unwrap_or(false),
                    precedence: vendor
                        .parsed("precedence", "error, app, vendor")?
                        .unwrap_or(VendorPrecedence::Error),
                    styles: asset("styles")?,
                    scripts: asset("scripts")?,
                })
            }
            None => None,
        };

        Ok(Options {
            entry: root.string("entry")?,
            source: SourceOptions {
                src_dir: source.string("srcDir")?.unwrap_or_default(),
                name: source.string("name")?.unwrap_or_else(|| "app".into()),
                dest_dir: source.string("destDir")?.unwrap_or_default(),
                styles,
                scripts,
            },
            public: root.string("public")?,
            devel,
            vendor,
        })
    }
}

/// Merges `overrides` against the defaults and writes the resolved `sourceMap` flags
/// back, so no declared key is left `null` in the returned mapping.
pub fn merge_with_defaults(overrides: &Mapping) -> Result<(Mapping, Options), ConfigError> {
    let defaults = default_options();
    let mut mapping = merged(&defaults, overrides);
    enable_sections(&mut mapping, &defaults);
    let options = Options::resolve(&mapping)?;

    let mut resolved = Mapping::new();
    if let Some(styles) = &options.source.styles {
        set_flag(&mut resolved, "source.styles.sourceMap", styles.source_map);
    }
    set_flag(&mut resolved, "source.scripts.sourceMap", options.source.scripts.source_map);
    if let Some(vendor) = &options.vendor {
        set_flag(&mut resolved, "vendor.styles.sourceMap", vendor.styles.source_map);
        set_flag(&mut resolved, "vendor.scripts.sourceMap", vendor.scripts.source_map);
    }
    merge_deep(&mut mapping, &resolved);

    Ok((mapping, options))
}

/// `true` in place of a default section turns it on with the section's defaults.
fn enable_sections(target: &mut Mapping, defaults: &Mapping) {
    for (key, default) in defaults {
        let Value::Mapping(default_level) = default else {
            continue;
        };

        match target.get_mut(key) {
            Some(value) if matches!(value, Value::Bool(true)) => {
                *value = Value::Mapping(default_level.clone());
            }
            Some(Value::Mapping(level)) => enable_sections(level, default_level),
            _ => {}
        }
    }
}

fn set_flag(target: &mut Mapping, path: &str, flag: bool) {
    if let Value::Mapping(patch) = Value::from_dotted(path, Value::Bool(flag)) {
        merge_deep(target, &patch);
    }
}

/// Typed accessors over one level of the merged mapping, tracking the dotted path for
/// error messages.
struct Reader<'a> {
    prefix: String,
    level: Option<&'a Mapping>,
}
impl<'a> Reader<'a> {
    fn root(level: &'a Mapping) -> Self {
        Self {
            prefix: String::new(),
            level: Some(level),
        }
    }

    fn path(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.prefix, key)
        }
    }

    fn value(&self, key: &str) -> Option<&'a Value> {
        self.level.and_then(|m| m.get(key))
    }

    fn found(&self, key: &str) -> String {
        self.value(key)
            .map(|v| v.type_name().to_string())
            .unwrap_or_else(|| "nothing".into())
    }

    fn empty(&self, key: &str) -> Reader<'a> {
        Reader {
            prefix: self.path(key),
            level: None,
        }
    }

    /// A mapping is an enabled section, a falsy value disables it.
    fn section(&self, key: &str) -> Result<Option<Reader<'a>>, ConfigError> {
        match self.value(key) {
            Some(Value::Mapping(m)) => Ok(Some(Reader {
                prefix: self.path(key),
                level: Some(m),
            })),
            Some(Value::Bool(true)) => Ok(Some(self.empty(key))),
            Some(v) if !v.is_truthy() => Ok(None),
            None => Ok(None),
            Some(v) => Err(ConfigError::InvalidType {
                path: self.path(key),
                expected: "a mapping or false",
                found: v.type_name().to_string(),
            }),
        }
    }

    /// Strings; `null`, `false` and `""` read as unset.
    fn string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.value(key) {
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(v) if !v.is_truthy() => Ok(None),
            None => Ok(None),
            Some(v) => Err(ConfigError::InvalidType {
                path: self.path(key),
                expected: "a string or false",
                found: v.type_name().to_string(),
            }),
        }
    }

    fn bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.value(key) {
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::Null) | None => Ok(None),
            Some(v) => Err(ConfigError::InvalidType {
                path: self.path(key),
                expected: "a boolean",
                found: v.type_name().to_string(),
            }),
        }
    }

    fn parsed<T: FromStr>(
        &self,
        key: &str,
        supported: &'static str,
    ) -> Result<Option<T>, ConfigError> {
        match self.string(key)? {
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    path: self.path(key),
                    value: raw,
                    supported,
                }),
            None => Ok(None),
        }
    }
}
