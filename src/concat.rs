use crate::{
    sourcemap::LineMapBuilder,
    utils::display_tree_path,
    vfs::Tree,
};
use std::path::{Path, PathBuf};

/// Comment syntax used for the trailing `sourceMappingURL` reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    Line,
    Block,
}

/// Joins an ordered list of files into a single output file.
#[derive(Debug, Clone)]
pub struct Concat {
    pub output_file: PathBuf,
    pub header: Option<String>,
    pub footer: Option<String>,
    pub separator: String,
    pub source_map: bool,
    pub comment_style: CommentStyle,
}
impl Concat {
    pub fn new<P: Into<PathBuf>>(output_file: P) -> Self {
        Self {
            output_file: output_file.into(),
            header: None,
            footer: None,
            separator: "\n".into(),
            source_map: false,
            comment_style: CommentStyle::Line,
        }
    }

    pub fn header(mut self, header: &str) -> Self {
        self.header = Some(header.to_string());
        self
    }

    pub fn footer(mut self, footer: &str) -> Self {
        self.footer = Some(footer.to_string());
        self
    }

    pub fn source_map(mut self, enabled: bool, comment_style: CommentStyle) -> Self {
        self.source_map = enabled;
        self.comment_style = comment_style;
        self
    }

    /// Builds the output tree. An empty input list still produces the file, holding
    /// only the header and footer.
    pub fn run<'a, I>(&self, inputs: I) -> Tree
    where
        I: IntoIterator<Item = (&'a Path, &'a [u8])>,
    {
        let mut output = String::new();
        let mut lines = LineMapBuilder::new();

        if let Some(header) = &self.header {
            output.push_str(header);
            output.push_str(&self.separator);
            lines.unmapped(line_span(header, &self.separator));
        }

        let mut first = true;
        for (path, content) in inputs {
            if !first {
                output.push_str(&self.separator);
                lines.unmapped(line_span("", &self.separator).saturating_sub(1));
            }
            first = false;

            let text = String::from_utf8_lossy(content);
            output.push_str(&text);
            lines.source(display_tree_path(path), &text);
        }

        if let Some(footer) = &self.footer {
            output.push_str(&self.separator);
            output.push_str(footer);
        }

        let mut tree = Tree::new();

        if self.source_map {
            let file_name = self
                .output_file
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let map_name = format!("{}.map", file_name);

            if !output.ends_with('\n') {
                output.push('\n');
            }
            match self.comment_style {
                CommentStyle::Line => {
                    output.push_str(&format!("//# sourceMappingURL={}\n", map_name))
                }
                CommentStyle::Block => {
                    output.push_str(&format!("/*# sourceMappingURL={} */\n", map_name))
                }
            }

            let map = lines.finish(file_name);
            tree.insert(self.output_file.with_file_name(&map_name), map.to_json());
        }

        tree.insert(&self.output_file, output);
        tree
    }
}

/// Number of generated lines occupied by `text` followed by `separator`, before the
/// next piece starts.
fn line_span(text: &str, separator: &str) -> usize {
    text.matches('\n').count() + separator.matches('\n').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs<'a>(files: &'a [(&'a str, &'a str)]) -> Vec<(&'a Path, &'a [u8])> {
        files
            .iter()
            .map(|(path, content)| (Path::new(*path), content.as_bytes()))
            .collect()
    }

    #[test]
    fn wraps_inputs_in_header_and_footer() {
        let files = [("a.js", "var a;"), ("b.js", "var b;")];

        let tree = Concat::new("assets/vendor.js")
            .header(";(function() {")
            .footer("}());")
            .run(inputs(&files));

        assert_eq!(
            tree.get_str("assets/vendor.js"),
            Some(";(function() {\nvar a;\nvar b;\n}());")
        );
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn no_inputs_still_produce_the_file() {
        let tree = Concat::new("assets/vendor.css").footer("\n").run(inputs(&[]));

        assert_eq!(tree.get_str("assets/vendor.css"), Some("\n\n"));
    }

    #[test]
    fn source_map_is_written_next_to_the_output() {
        let files = [("vendor/a.css", "a {}")];

        let tree = Concat::new("assets/vendor.css")
            .source_map(true, CommentStyle::Block)
            .run(inputs(&files));

        let css = tree.get_str("assets/vendor.css").unwrap();
        assert!(css.ends_with("/*# sourceMappingURL=vendor.css.map */\n"));

        let map = tree.get_str("assets/vendor.css.map").unwrap();
        assert!(map.contains("\"file\":\"vendor.css\""));
        assert!(map.contains("\"sources\":[\"vendor/a.css\"]"));
    }

    #[test]
    fn mapped_lines_follow_the_header() {
        let files = [("a.js", "one\ntwo")];

        let tree = Concat::new("out.js")
            .header("head")
            .source_map(true, CommentStyle::Line)
            .run(inputs(&files));

        let map = tree.get_str("out.js.map").unwrap();
        assert!(map.contains("\"mappings\":\";AAAA;AACA\""));
    }
}
