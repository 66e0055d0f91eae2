use serde::Serialize;

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// A version 3 source map with one segment per generated line.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    version: u8,
    file: String,
    sources: Vec<String>,
    sources_content: Vec<String>,
    names: Vec<String>,
    mappings: String,
}

/// Where a generated line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineOrigin {
    pub source: usize,
    pub line: usize,
}

/// Collects line origins while output is being concatenated.
#[derive(Debug, Default)]
pub struct LineMapBuilder {
    sources: Vec<String>,
    contents: Vec<String>,
    lines: Vec<Option<LineOrigin>>,
}
impl LineMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `count` generated lines that map to nothing (headers, separators).
    pub fn unmapped(&mut self, count: usize) {
        self.lines.extend(std::iter::repeat(None).take(count));
    }

    /// Records a source file whose lines are copied verbatim into the output.
    pub fn source(&mut self, name: String, content: &str) {
        let index = self.sources.len();
        self.sources.push(name);
        self.contents.push(content.to_string());

        // a trailing newline leaves an empty line that still belongs to this source
        let line_count = content.matches('\n').count() + 1;
        self.lines.extend((0..line_count).map(|line| {
            Some(LineOrigin {
                source: index,
                line,
            })
        }));
    }

    pub fn finish(self, file: String) -> SourceMap {
        SourceMap {
            version: 3,
            file,
            sources: self.sources,
            sources_content: self.contents,
            names: Vec::new(),
            mappings: encode_mappings(&self.lines),
        }
    }
}
impl SourceMap {
    pub fn to_json(&self) -> String {
        // a struct of strings and integers always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn encode_mappings(lines: &[Option<LineOrigin>]) -> String {
    let mut mappings = String::new();
    let mut previous = LineOrigin { source: 0, line: 0 };

    for (index, origin) in lines.iter().enumerate() {
        if index > 0 {
            mappings.push(';');
        }

        if let Some(origin) = origin {
            // generated column, source index, source line, source column
            encode_vlq(&mut mappings, 0);
            encode_vlq(&mut mappings, origin.source as i64 - previous.source as i64);
            encode_vlq(&mut mappings, origin.line as i64 - previous.line as i64);
            encode_vlq(&mut mappings, 0);
            previous = *origin;
        }
    }

    mappings
}

fn encode_vlq(out: &mut String, value: i64) {
    let mut rest = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };

    loop {
        let mut digit = (rest & 0b1_1111) as usize;
        rest >>= 5;
        if rest > 0 {
            digit |= 0b10_0000;
        }
        out.push(BASE64[digit] as char);
        if rest == 0 {
            break;
        }
    }
}
