use indexmap::IndexMap;
use std::fmt;

/// Ordered key/value level of a configuration tree.
pub type Mapping = IndexMap<String, Value>;

/// A configuration value. Mappings are the only variant the merger descends into.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Mapping(Mapping),
}
impl Value {
    /// Whether the value enables whatever option it sits on.
    ///
    /// `null`, `false`, `0`, `NaN` and the empty string are all "off"; arrays and mappings
    /// are always "on", even when empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0 && !f.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Mapping(_) => true,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Mapping(_) => "mapping",
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Follows a dotted path such as `source.styles.name`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(self, |current, segment| current.get(segment))
    }

    /// Builds the nested mapping `{ a = { b = { c = value } } }` for the path `a.b.c`.
    pub fn from_dotted(path: &str, value: Value) -> Value {
        path.rsplit('.').fold(value, |inner, segment| {
            let mut level = Mapping::new();
            level.insert(segment.to_string(), inner);
            Value::Mapping(level)
        })
    }

    /// Converts back to TOML. `null` has no TOML spelling, so null leaves and
    /// array items are dropped.
    pub fn to_toml(&self) -> Option<toml::Value> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(toml::Value::Boolean(*b)),
            Self::Integer(i) => Some(toml::Value::Integer(*i)),
            Self::Float(f) => Some(toml::Value::Float(*f)),
            Self::String(s) => Some(toml::Value::String(s.clone())),
            Self::Array(items) => Some(toml::Value::Array(
                items.iter().filter_map(Value::to_toml).collect(),
            )),
            Self::Mapping(m) => Some(toml::Value::Table(
                m.iter()
                    .filter_map(|(k, v)| v.to_toml().map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Array(items) => write!(f, "[{} items]", items.len()),
            Self::Mapping(m) => write!(f, "{{{} keys}}", m.len()),
        }
    }
}

impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Self::String(s),
            toml::Value::Integer(i) => Self::Integer(i),
            toml::Value::Float(f) => Self::Float(f),
            toml::Value::Boolean(b) => Self::Bool(b),
            toml::Value::Datetime(dt) => Self::String(dt.to_string()),
            toml::Value::Array(items) => Self::Array(items.into_iter().map(Value::from).collect()),
            toml::Value::Table(table) => Self::from(table),
        }
    }
}
impl From<toml::Table> for Value {
    fn from(table: toml::Table) -> Self {
        Self::Mapping(table.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
    }
}
impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}
impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}
impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}
impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}
impl From<Mapping> for Value {
    fn from(value: Mapping) -> Self {
        Self::Mapping(value)
    }
}

/// Deep-merges `source` into `target`.
///
/// A mapping in `source` is merged recursively into the mapping at the same key of
/// `target`; when `target` holds no mapping there, it is replaced by an empty one first.
/// Any other value, arrays included, replaces the target value outright, so `false` and
/// `null` overrides stick.
pub fn merge_deep(target: &mut Mapping, source: &Mapping) {
    for (key, value) in source {
        match value {
            Value::Mapping(nested) => {
                let slot = target
                    .entry(key.clone())
                    .or_insert_with(|| Value::Mapping(Mapping::new()));

                if !matches!(slot, Value::Mapping(_)) {
                    *slot = Value::Mapping(Mapping::new());
                }

                if let Value::Mapping(inner) = slot {
                    merge_deep(inner, nested);
                }
            }
            other => {
                target.insert(key.clone(), other.clone());
            }
        }
    }
}

/// Returns `defaults` with `overrides` deep-merged on top.
pub fn merged(defaults: &Mapping, overrides: &Mapping) -> Mapping {
    let mut result = defaults.clone();
    merge_deep(&mut result, overrides);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(source: &str) -> Mapping {
        let table: toml::Table = toml::from_str(source).unwrap();
        match Value::from(table) {
            Value::Mapping(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn absent_keys_keep_their_defaults() {
        let defaults = mapping(
            r#"
            entry = "index.html"
            [source]
            srcDir = "app"
            name = "app"
            "#,
        );
        let overrides = mapping(
            r#"
            [source]
            name = "main"
            "#,
        );

        let result = Value::Mapping(merged(&defaults, &overrides));

        assert_eq!(result.lookup("entry"), Some(&Value::from("index.html")));
        assert_eq!(result.lookup("source.srcDir"), Some(&Value::from("app")));
        assert_eq!(result.lookup("source.name"), Some(&Value::from("main")));
    }

    #[test]
    fn false_replaces_a_nested_mapping() {
        let defaults = mapping(
            r#"
            [vendor]
            srcDir = "vendor"
            "#,
        );
        let overrides = mapping("vendor = false");

        let result = Value::Mapping(merged(&defaults, &overrides));

        assert_eq!(result.lookup("vendor"), Some(&Value::Bool(false)));
    }

    #[test]
    fn null_override_is_terminal() {
        let defaults = mapping(r#"public = "public""#);
        let mut overrides = Mapping::new();
        overrides.insert("public".into(), Value::Null);

        let result = merged(&defaults, &overrides);

        assert_eq!(result.get("public"), Some(&Value::Null));
    }

    #[test]
    fn arrays_are_replaced_not_concatenated() {
        let defaults = mapping(r#"files = ["a.js", "b.js"]"#);
        let overrides = mapping(r#"files = ["c.js"]"#);

        let result = merged(&defaults, &overrides);

        assert_eq!(
            result.get("files"),
            Some(&Value::Array(vec![Value::from("c.js")]))
        );
    }

    #[test]
    fn mapping_override_creates_missing_levels() {
        let defaults = Mapping::new();
        let overrides = mapping(
            r#"
            [vendor.scripts]
            name = "libs"
            "#,
        );

        let result = Value::Mapping(merged(&defaults, &overrides));

        assert_eq!(
            result.lookup("vendor.scripts.name"),
            Some(&Value::from("libs"))
        );
    }

    #[test]
    fn mapping_override_replaces_a_scalar_default() {
        let defaults = mapping("styles = false");
        let overrides = mapping(
            r#"
            [styles]
            name = "site"
            "#,
        );

        let result = Value::Mapping(merged(&defaults, &overrides));

        assert_eq!(result.lookup("styles.name"), Some(&Value::from("site")));
    }

    #[test]
    fn unknown_keys_pass_through() {
        let defaults = mapping(r#"entry = "index.html""#);
        let overrides = mapping(r#"extra = { anything = 1 }"#);

        let result = Value::Mapping(merged(&defaults, &overrides));

        assert_eq!(result.lookup("extra.anything"), Some(&Value::Integer(1)));
        assert_eq!(result.lookup("entry"), Some(&Value::from("index.html")));
    }

    #[test]
    fn merge_keeps_default_key_order() {
        let defaults = mapping(
            r#"
            zed = 1
            bee = 2
            "#,
        );
        let overrides = mapping(
            r#"
            cee = 3
            zed = 10
            "#,
        );

        let result = merged(&defaults, &overrides);

        let keys: Vec<&str> = result.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zed", "bee", "cee"]);
    }

    #[test]
    fn toml_conversion_keeps_key_order() {
        let source = mapping(
            r#"
            zed = 1
            alpha = 2
            "#,
        );

        let Some(toml::Value::Table(table)) = Value::Mapping(source).to_toml() else {
            panic!("mapping converts to a table");
        };

        let keys: Vec<&str> = table.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zed", "alpha"]);
    }

    #[test]
    fn dotted_paths_build_nested_mappings() {
        let value = Value::from_dotted("source.styles.name", Value::from("site"));

        assert_eq!(value.lookup("source.styles.name"), Some(&Value::from("site")));
    }

    #[test]
    fn truthiness_follows_option_semantics() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::from("index.html").is_truthy());
        assert!(Value::Mapping(Mapping::new()).is_truthy());
    }

    #[test]
    fn nulls_are_dropped_when_rendering_toml() {
        let mut level = Mapping::new();
        level.insert("name".into(), Value::Null);
        level.insert("srcDir".into(), Value::from("styles"));

        let rendered = Value::Mapping(level).to_toml().unwrap();

        let table = rendered.as_table().unwrap();
        assert!(!table.contains_key("name"));
        assert_eq!(table.get("srcDir").and_then(|v| v.as_str()), Some("styles"));
    }
}
