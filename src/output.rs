use crate::{
    errors::{FileOperation, IoError},
    transactions::{Active, RollbackOperation, Transaction},
    vfs::Tree,
};
use colored::Colorize;
use miette::Diagnostic;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum OutputError {
    #[error("I/O error within output domain")]
    #[diagnostic(code(sprig::output::io))]
    Io(#[from] IoError),

    #[error("output path exists and is not a directory: '{path}'")]
    #[diagnostic(
        code(sprig::output::not_a_directory),
        help("Choose another --output, or remove the file")
    )]
    NotADirectory { path: PathBuf },

    #[error("cleaning '{path}' would delete the project directory '{project_dir}'")]
    #[diagnostic(
        code(sprig::output::clean_removes_project),
        help("Point --output at a directory that holds only build output")
    )]
    CleanRemovesProject { path: PathBuf, project_dir: PathBuf },
}

/// Files touched by a successful write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub created: Vec<PathBuf>,
    pub overwritten: Vec<PathBuf>,
}
impl WriteReport {
    pub fn len(&self) -> usize {
        self.created.len() + self.overwritten.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Writes every file of `tree` below `destination`. Either all files land, or the
/// directory is put back the way it was.
///
/// With `clean`, an existing `destination` is set aside first and only deleted once
/// every write has succeeded.
pub fn write_tree(tree: &Tree, destination: &Path, clean: bool) -> Result<WriteReport, OutputError> {
    if destination.exists() && !destination.is_dir() {
        return Err(OutputError::NotADirectory {
            path: destination.to_path_buf(),
        });
    }

    let mut trx = Transaction::<Active>::new();

    if clean && destination.is_dir() {
        set_aside(&mut trx, destination)?;
    }

    let mut report = WriteReport::default();

    for (path, content) in tree.iter() {
        let final_path = destination.join(path);

        if let Some(parent) = final_path.parent() {
            create_directory(&mut trx, parent)?;
        }

        write_file(&mut trx, &final_path, content, &mut report)?;
    }

    trx.commit();

    Ok(report)
}

/// Fails when cleaning `destination` would delete one of `project_dirs`, that is
/// when the destination is one of them or contains one.
pub fn ensure_clean_is_safe(destination: &Path, project_dirs: &[PathBuf]) -> Result<(), OutputError> {
    let Ok(resolved) = fs::canonicalize(destination) else {
        return Ok(());
    };

    for dir in project_dirs {
        let Ok(project_dir) = fs::canonicalize(dir) else {
            continue;
        };

        if project_dir.starts_with(&resolved) {
            return Err(OutputError::CleanRemovesProject {
                path: destination.to_path_buf(),
                project_dir: dir.clone(),
            });
        }
    }

    Ok(())
}

/// Moves `destination` to a hidden sibling so it can be restored on rollback.
fn set_aside(trx: &mut Transaction<Active>, destination: &Path) -> Result<(), OutputError> {
    let name = destination
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".into());
    let backup = destination.with_file_name(format!(".{}.sprig-clean", name));

    if backup.exists() {
        fs::remove_dir_all(&backup)
            .map_err(|error| IoError::new(FileOperation::Remove, backup.clone(), error))?;
    }

    fs::rename(destination, &backup)
        .map_err(|error| IoError::new(FileOperation::Rename, destination.to_path_buf(), error))?;

    log::info!("{} {}", "clean".red(), destination.display());

    trx.add_operation(RollbackOperation::RestoreDir {
        backup: backup.clone(),
        path: destination.to_path_buf(),
    });
    trx.discard_on_commit(backup);

    Ok(())
}

/// Creates `path` and any missing parents, registering the outermost directory this
/// call created for removal on rollback.
fn create_directory(trx: &mut Transaction<Active>, path: &Path) -> Result<(), OutputError> {
    if path.is_dir() {
        return Ok(());
    }

    let outermost_missing = path
        .ancestors()
        .take_while(|ancestor| !ancestor.as_os_str().is_empty() && !ancestor.exists())
        .last()
        .map(Path::to_path_buf);

    fs::create_dir_all(path)
        .map_err(|error| IoError::new(FileOperation::Mkdir, path.to_path_buf(), error))?;

    if let Some(created) = outermost_missing {
        trx.add_operation(RollbackOperation::RemoveDir(created));
    }

    Ok(())
}

fn write_file(
    trx: &mut Transaction<Active>,
    path: &Path,
    content: &[u8],
    report: &mut WriteReport,
) -> Result<(), OutputError> {
    let previous = if path.is_file() {
        Some(
            fs::read(path)
                .map_err(|error| IoError::new(FileOperation::Read, path.to_path_buf(), error))?,
        )
    } else {
        None
    };

    fs::write(path, content)
        .map_err(|error| IoError::new(FileOperation::Write, path.to_path_buf(), error))?;

    match previous {
        Some(previous) => {
            println!("{} {}", "overwrite".yellow(), path.display());
            trx.add_operation(RollbackOperation::RestoreFile {
                path: path.to_path_buf(),
                content: previous,
            });
            report.overwritten.push(path.to_path_buf());
        }
        None => {
            println!("{} {}", "create".green(), path.display());
            trx.add_operation(RollbackOperation::RemoveFile(path.to_path_buf()));
            report.created.push(path.to_path_buf());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(files: &[(&str, &str)]) -> Tree {
        let mut tree = Tree::new();
        for (path, content) in files {
            tree.insert(path, *content);
        }
        tree
    }

    #[test]
    fn writes_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let dist = dir.path().join("dist");

        let report = write_tree(
            &tree(&[("index.html", "<html></html>"), ("assets/app.js", "app")]),
            &dist,
            false,
        )
        .unwrap();

        assert_eq!(report.created.len(), 2);
        assert_eq!(fs::read_to_string(dist.join("assets/app.js")).unwrap(), "app");
        assert_eq!(
            fs::read_to_string(dist.join("index.html")).unwrap(),
            "<html></html>"
        );
    }

    #[test]
    fn failed_write_rolls_back_everything() {
        let dir = tempfile::tempdir().unwrap();
        let dist = dir.path().join("dist");
        fs::create_dir_all(&dist).unwrap();
        fs::write(dist.join("a.txt"), "old").unwrap();
        // a regular file where the tree needs a directory
        fs::write(dist.join("c"), "blocker").unwrap();

        let result = write_tree(
            &tree(&[("a.txt", "new"), ("b/one.txt", "1"), ("c/two.txt", "2")]),
            &dist,
            false,
        );

        assert!(matches!(result, Err(OutputError::Io(_))));
        assert_eq!(fs::read_to_string(dist.join("a.txt")).unwrap(), "old");
        assert!(!dist.join("b").exists());
        assert_eq!(fs::read_to_string(dist.join("c")).unwrap(), "blocker");
    }

    #[test]
    fn rollback_keeps_directories_that_already_existed() {
        let dir = tempfile::tempdir().unwrap();
        let dist = dir.path().join("dist");
        fs::create_dir_all(dist.join("assets")).unwrap();
        fs::write(dist.join("c"), "blocker").unwrap();

        let result = write_tree(&tree(&[("assets/app.js", "app"), ("c/x", "")]), &dist, false);

        assert!(result.is_err());
        assert!(dist.join("assets").is_dir());
        assert!(!dist.join("assets/app.js").exists());
    }

    #[test]
    fn clean_removes_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let dist = dir.path().join("dist");
        fs::create_dir_all(&dist).unwrap();
        fs::write(dist.join("stale.js"), "stale").unwrap();

        write_tree(&tree(&[("index.html", "")]), &dist, true).unwrap();

        assert!(!dist.join("stale.js").exists());
        assert!(dist.join("index.html").exists());
        assert!(!dir.path().join(".dist.sprig-clean").exists());
    }

    #[test]
    fn failed_clean_build_restores_the_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let dist = dir.path().join("dist");
        fs::create_dir_all(&dist).unwrap();
        fs::write(dist.join("stale.js"), "stale").unwrap();

        // "index.html" is written as a file, then needed as a directory
        let mut broken = tree(&[("a/index.html", "")]);
        broken.insert("a/index.html/x", "");

        assert!(write_tree(&broken, &dist, true).is_err());
        assert_eq!(fs::read_to_string(dist.join("stale.js")).unwrap(), "stale");
        assert!(!dist.join("a").exists());
    }

    #[test]
    fn clean_refuses_to_delete_project_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::create_dir_all(root.join("app/styles")).unwrap();
        fs::create_dir_all(root.join("dist")).unwrap();
        let project_dirs = vec![root.clone(), root.join("app")];

        for destination in [root.join("app"), root.clone(), root.join("app/../app")] {
            let error = ensure_clean_is_safe(&destination, &project_dirs).unwrap_err();
            assert!(matches!(error, OutputError::CleanRemovesProject { .. }));
        }

        assert!(ensure_clean_is_safe(&root.join("dist"), &project_dirs).is_ok());
        assert!(ensure_clean_is_safe(&root.join("app/styles"), &project_dirs).is_ok());
        assert!(ensure_clean_is_safe(&root.join("missing"), &project_dirs).is_ok());
    }

    #[test]
    fn output_path_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dist");
        fs::write(&file, "").unwrap();

        let error = write_tree(&Tree::new(), &file, false).unwrap_err();

        assert!(matches!(error, OutputError::NotADirectory { .. }));
    }
}
