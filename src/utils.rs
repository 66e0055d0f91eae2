use std::path::{Component, Path, PathBuf};

/// Normalizes a path into one that is relative to a tree root.
///
/// `.` segments are dropped, `..` pops the previous segment and root or drive prefixes
/// are removed, so `/`, `./assets/../css/app.css` and `css/app.css` all land inside the tree.
pub fn tree_path<P: AsRef<Path>>(source: P) -> PathBuf {
    let mut new_path = PathBuf::new();

    for component in source.as_ref().components() {
        match component {
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}

            Component::ParentDir => {
                new_path.pop();
            }

            other => new_path.push(other.as_os_str()),
        }
    }

    new_path
}

/// Joins two configured directory fields with `/`, the way option paths are written.
pub fn join_dirs(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => parent.to_string(),
        _ => format!("{}/{}", parent.trim_end_matches('/'), child),
    }
}

/// `{dir}/{name}.{extension}`, relative to the tree root.
pub fn asset_path(dir: &str, name: &str, extension: &str) -> PathBuf {
    tree_path(join_dirs(dir, &format!("{}.{}", name, extension)))
}

/// Displays tree paths with forward slashes regardless of platform.
pub fn display_tree_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
