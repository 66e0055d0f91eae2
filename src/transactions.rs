use std::{fs, marker::PhantomData, path::PathBuf};

/// Undo steps recorded while writing an output directory.
#[derive(Debug)]
pub enum RollbackOperation {
    RemoveFile(PathBuf),
    RemoveDir(PathBuf),
    /// Puts back the contents a write replaced.
    RestoreFile { path: PathBuf, content: Vec<u8> },
    /// Moves a directory set aside by `--clean` back into place.
    RestoreDir { backup: PathBuf, path: PathBuf },
}
/// Active Transaction
pub struct Active;
/// Committed Transaction
pub struct Committed;
/// A trait that tells us if rollback should occur when dropped.
pub trait TransactionState {
    const SHOULD_ROLLBACK: bool;
}
impl TransactionState for Active {
    const SHOULD_ROLLBACK: bool = true;
}
impl TransactionState for Committed {
    const SHOULD_ROLLBACK: bool = false;
}

/// Tracks how to undo a partially written output directory.
///
/// A `Transaction<Active>` that is dropped without committing (for example when `?`
/// returns early) replays its operations in reverse. Committing discards them and
/// removes any backups that only existed to make rollback possible.
///
/// ```
/// use sprig::transactions::{Active, RollbackOperation, Transaction};
///
/// let mut trx = Transaction::<Active>::new();
/// trx.add_operation(RollbackOperation::RemoveFile("dist/index.html".into()));
/// trx.commit();
/// ```
pub struct Transaction<State: TransactionState> {
    rollback_operations: Vec<RollbackOperation>,
    discard_on_commit: Vec<PathBuf>,
    state: PhantomData<State>,
}
impl Default for Transaction<Active> {
    fn default() -> Self {
        Self::new()
    }
}
impl Transaction<Active> {
    pub fn new() -> Self {
        Transaction {
            rollback_operations: vec![],
            discard_on_commit: vec![],
            state: PhantomData,
        }
    }

    pub fn add_operation(&mut self, operation: RollbackOperation) {
        self.rollback_operations.push(operation);
    }

    /// Registers a directory to delete once the transaction commits.
    pub fn discard_on_commit(&mut self, path: PathBuf) {
        self.discard_on_commit.push(path);
    }

    /// Finalizes the transaction, preventing any rollback from occurring.
    pub fn commit(mut self) -> Transaction<Committed> {
        self.rollback_operations.clear();

        for path in self.discard_on_commit.drain(..) {
            log::debug!("removing backup: {}", path.display());
            if let Err(error) = fs::remove_dir_all(&path) {
                log::warn!("unable to remove backup '{}': {}", path.display(), error);
            }
        }

        Transaction {
            rollback_operations: vec![],
            discard_on_commit: vec![],
            state: PhantomData,
        }
    }
}
impl<S: TransactionState> Drop for Transaction<S> {
    fn drop(&mut self) {
        if S::SHOULD_ROLLBACK && !self.rollback_operations.is_empty() {
            log::debug!("rolling back {} operation(s)", self.rollback_operations.len());

            while let Some(operation) = self.rollback_operations.pop() {
                match operation {
                    RollbackOperation::RemoveDir(path) => {
                        log::debug!("removing dir: {}", path.display());
                        let _ = fs::remove_dir_all(&path);
                    }
                    RollbackOperation::RemoveFile(path) => {
                        log::debug!("removing file: {}", path.display());
                        let _ = fs::remove_file(&path);
                    }
                    RollbackOperation::RestoreFile { path, content } => {
                        log::debug!("restoring file: {}", path.display());
                        let _ = fs::write(&path, content);
                    }
                    RollbackOperation::RestoreDir { backup, path } => {
                        log::debug!("restoring dir: {}", path.display());
                        let _ = fs::remove_dir_all(&path);
                        let _ = fs::rename(&backup, &path);
                    }
                }
            }
        } else if !S::SHOULD_ROLLBACK {
            log::debug!("committed transaction");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_an_active_transaction_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let created = dir.path().join("created.txt");
        let replaced = dir.path().join("replaced.txt");
        fs::write(&created, "new").unwrap();
        fs::write(&replaced, "new").unwrap();

        {
            let mut trx = Transaction::<Active>::new();
            trx.add_operation(RollbackOperation::RemoveFile(created.clone()));
            trx.add_operation(RollbackOperation::RestoreFile {
                path: replaced.clone(),
                content: b"old".to_vec(),
            });
        }

        assert!(!created.exists());
        assert_eq!(fs::read_to_string(&replaced).unwrap(), "old");
    }

    #[test]
    fn commit_keeps_changes_and_discards_backups() {
        let dir = tempfile::tempdir().unwrap();
        let created = dir.path().join("created.txt");
        let backup = dir.path().join(".backup");
        fs::write(&created, "new").unwrap();
        fs::create_dir(&backup).unwrap();

        let mut trx = Transaction::<Active>::new();
        trx.add_operation(RollbackOperation::RemoveFile(created.clone()));
        trx.discard_on_commit(backup.clone());
        drop(trx.commit());

        assert!(created.exists());
        assert!(!backup.exists());
    }

    #[test]
    fn rollback_restores_a_set_aside_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("dist");
        let backup = dir.path().join(".dist.backup");
        fs::create_dir(&backup).unwrap();
        fs::write(backup.join("stale.txt"), "stale").unwrap();
        fs::create_dir(&output).unwrap();
        fs::write(output.join("partial.txt"), "partial").unwrap();

        let mut trx = Transaction::<Active>::new();
        trx.add_operation(RollbackOperation::RestoreDir {
            backup: backup.clone(),
            path: output.clone(),
        });
        drop(trx);

        assert!(output.join("stale.txt").exists());
        assert!(!output.join("partial.txt").exists());
        assert!(!backup.exists());
    }
}
