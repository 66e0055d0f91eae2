use crate::vfs::Tree;
use colored::Colorize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Represents a node in the tree (either file or directory).
#[derive(Debug)]
struct TreeNode {
    name: String,
    children: Vec<Rc<RefCell<TreeNode>>>,
    is_file: bool,
}
impl TreeNode {
    fn new(name: String, is_file: bool) -> Self {
        Self {
            name,
            children: Vec::new(),
            is_file,
        }
    }
}

/// Build the directory tree from the tree's file paths, creating a node for every
/// directory they imply.
fn build_tree(tree: &Tree, destination: &Path) -> Rc<RefCell<TreeNode>> {
    let root_name = destination
        .file_name()
        .map(|os| os.to_string_lossy().to_string())
        .unwrap_or_else(|| destination.display().to_string());

    let root = Rc::new(RefCell::new(TreeNode::new(root_name, false)));

    // directory path (relative to the root) to node
    let mut lookup: HashMap<PathBuf, Rc<RefCell<TreeNode>>> = HashMap::new();
    lookup.insert(PathBuf::new(), Rc::clone(&root));

    for path in tree.paths() {
        let mut parent = PathBuf::new();
        let components: Vec<_> = path.components().collect();

        for (i, component) in components.iter().enumerate() {
            let is_file = i == components.len() - 1;
            let current = parent.join(component);

            if !lookup.contains_key(&current) {
                let name = component.as_os_str().to_string_lossy().to_string();
                let node = Rc::new(RefCell::new(TreeNode::new(name, is_file)));

                if let Some(parent_node) = lookup.get(&parent) {
                    parent_node.borrow_mut().children.push(Rc::clone(&node));
                }

                lookup.insert(current.clone(), node);
            }

            parent = current;
        }
    }

    root
}

/// Render the tree with a nice ASCII style.
fn render_node(out: &mut String, node: &Rc<RefCell<TreeNode>>, prefix: &str, is_last: bool) {
    let node_borrow = node.borrow();

    let connector = if is_last {
        "└── ".yellow()
    } else {
        "├── ".yellow()
    };
    let name = if node_borrow.is_file {
        node_borrow.name.green()
    } else {
        node_borrow.name.blue()
    };
    let _ = writeln!(out, "{}{}{}", prefix.yellow(), connector, name);

    let child_prefix = if is_last {
        format!("{}    ", prefix)
    } else {
        format!("{}│   ", prefix)
    };

    let len = node_borrow.children.len();
    for (i, child) in node_borrow.children.iter().enumerate() {
        render_node(out, child, &child_prefix, i == len - 1);
    }
}

/// The files of `tree` as they would be laid out below `destination`.
pub fn render_tree(tree: &Tree, destination: &Path) -> String {
    let mut out = String::new();
    render_node(&mut out, &build_tree(tree, destination), "", true);
    out
}

pub fn preview_as_tree(tree: &Tree, destination: &Path) {
    println!(
        "Legend: {} = (directory), {} = (file)",
        "blue".blue(),
        "green".green()
    );

    let fancy_prompt = format!(
        "{} {}\n",
        "┌─".bold().bright_blue(),
        "Preview".bold().bright_blue(),
    );

    println!("{}", fancy_prompt);

    print!("{}", render_tree(tree, destination));

    let fancy_prompt = format!(
        "\n{} {}\n",
        "└─".bold().bright_blue(),
        format!("{} file(s), nothing written (dry run)", tree.len()).bright_green()
    );

    println!("{}", fancy_prompt);
}
