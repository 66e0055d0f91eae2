use crate::vfs::{Precedence, Tree, TreeError};

type Produce<'a, E> = Box<dyn FnOnce() -> Result<Tree, E> + 'a>;
type Wrap<'a, E> = Box<dyn FnOnce(Tree) -> Result<Tree, E> + 'a>;

enum Step<'a, E> {
    /// Builds a tree and unions it into the accumulated one.
    Merge {
        produce: Produce<'a, E>,
        precedence: Precedence,
    },
    /// Transforms the accumulated tree as a whole.
    Wrap(Wrap<'a, E>),
}

struct Stage<'a, E> {
    name: &'static str,
    enabled: bool,
    step: Step<'a, E>,
}

/// An ordered list of optional stages, folded left-to-right over an initially empty tree.
///
/// Disabled stages are skipped without running their closures.
pub struct Pipeline<'a, E> {
    stages: Vec<Stage<'a, E>>,
}
impl<'a, E: From<TreeError>> Default for Pipeline<'a, E> {
    fn default() -> Self {
        Self::new()
    }
}
impl<'a, E: From<TreeError>> Pipeline<'a, E> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Adds a stage whose tree is unioned into the accumulated tree with `precedence`,
    /// where the accumulated tree is the existing side.
    pub fn merge<F>(mut self, name: &'static str, enabled: bool, precedence: Precedence, produce: F) -> Self
    where
        F: FnOnce() -> Result<Tree, E> + 'a,
    {
        self.stages.push(Stage {
            name,
            enabled,
            step: Step::Merge {
                produce: Box::new(produce),
                precedence,
            },
        });
        self
    }

    /// Adds a stage that receives the accumulated tree and returns its replacement.
    pub fn wrap<F>(mut self, name: &'static str, enabled: bool, wrap: F) -> Self
    where
        F: FnOnce(Tree) -> Result<Tree, E> + 'a,
    {
        self.stages.push(Stage {
            name,
            enabled,
            step: Step::Wrap(Box::new(wrap)),
        });
        self
    }

    pub fn run(self) -> Result<Tree, E> {
        let mut tree = Tree::new();

        for stage in self.stages {
            if !stage.enabled {
                log::debug!("skipping stage: {}", stage.name);
                continue;
            }

            log::debug!("running stage: {}", stage.name);

            tree = match stage.step {
                Step::Merge {
                    produce,
                    precedence,
                } => tree.union(produce()?, precedence)?,
                Step::Wrap(wrap) => wrap(tree)?,
            };
        }

        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn single(path: &str, content: &str) -> Tree {
        let mut tree = Tree::new();
        tree.insert(path, content);
        tree
    }

    #[test]
    fn stages_fold_in_order() {
        let tree = Pipeline::<TreeError>::new()
            .merge("a", true, Precedence::Strict, || Ok(single("a.txt", "a")))
            .merge("b", true, Precedence::Strict, || Ok(single("b.txt", "b")))
            .wrap("upper", true, |mut tree| {
                tree.insert("wrapped.txt", "yes");
                Ok(tree)
            })
            .run()
            .unwrap();

        let paths: Vec<String> = tree.paths().map(|p| p.display().to_string()).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt", "wrapped.txt"]);
    }

    #[test]
    fn disabled_stages_never_run() {
        let ran = Cell::new(false);

        let pipeline = Pipeline::<TreeError>::new()
            .merge("on", true, Precedence::Strict, || Ok(single("a.txt", "a")))
            .merge("off", false, Precedence::Strict, || {
                ran.set(true);
                Ok(single("b.txt", "b"))
            });

        let tree = pipeline.run().unwrap();

        assert!(!ran.get());
        assert!(!tree.contains("b.txt"));
    }

    #[test]
    fn precedence_applies_to_the_incoming_stage() {
        let tree = Pipeline::<TreeError>::new()
            .merge("app", true, Precedence::Strict, || Ok(single("index.html", "app")))
            .merge("public", true, Precedence::Existing, || {
                Ok(single("index.html", "public"))
            })
            .run()
            .unwrap();

        assert_eq!(tree.get_str("index.html"), Some("app"));
    }

    #[test]
    fn strict_collision_stops_the_pipeline() {
        let result = Pipeline::<TreeError>::new()
            .merge("a", true, Precedence::Strict, || Ok(single("x", "1")))
            .merge("b", true, Precedence::Strict, || Ok(single("x", "2")))
            .run();

        assert!(matches!(result, Err(TreeError::Collision { .. })));
    }
}
