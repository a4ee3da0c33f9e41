//! Declaration-level analysis of Go source files.
//!
//! Everything that depends on the Go grammar lives here: the rest of the
//! crate only sees [`Declarations`] and a few accessors on [`GoFile`].

use anyhow::{anyhow, Context, Result};
use tree_sitter::{Node, Parser, Tree};

pub struct GoFile<'a> {
    src: &'a [u8],
    tree: Tree,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Declarations {
    /// Test functions in declaration order.
    pub tests: Vec<String>,
    /// Example functions sorted by name.
    pub examples: Vec<Example>,
    /// A package-level `func main` exists.
    pub has_main: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    /// Name without the `Example` prefix.
    pub name: String,
    /// Expected output. `None` means the example is only compiled.
    pub output: Option<String>,
    pub unordered: bool,
}

pub fn classify_declarations(src: &[u8]) -> Result<Declarations> {
    Ok(GoFile::parse(src)?.declarations())
}

impl<'a> GoFile<'a> {
    pub fn parse(src: &'a [u8]) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .context("failed to load go grammar")?;
        let tree = parser
            .parse(src, None)
            .ok_or_else(|| anyhow!("go parser returned no tree"))?;
        Ok(Self { src, tree })
    }

    pub fn has_syntax_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.src).unwrap_or("")
    }

    fn package_ident(&self) -> Option<Node<'_>> {
        let root = self.tree.root_node();
        let mut cursor = root.walk();
        let clause = root
            .named_children(&mut cursor)
            .find(|n| n.kind() == "package_clause")?;
        if clause.has_error() {
            return None;
        }
        let mut cursor = clause.walk();
        let ident = clause
            .named_children(&mut cursor)
            .find(|n| n.kind() == "package_identifier");
        ident
    }

    /// The name in the package clause, if it parsed cleanly.
    pub fn package_name(&self) -> Option<&'a str> {
        self.package_ident().map(|n| self.text(n))
    }

    /// Byte offset right after the package name.
    pub fn package_name_end(&self) -> Option<usize> {
        self.package_ident().map(|n| n.end_byte())
    }

    /// Whether `path` is imported without a local name.
    pub fn imports_unnamed(&self, path: &str) -> bool {
        let quoted = format!("\"{}\"", path);
        let root = self.tree.root_node();
        let mut cursor = root.walk();
        let decls: Vec<Node<'_>> = root
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "import_declaration")
            .collect();

        let mut specs = Vec::new();
        for decl in decls {
            let mut cursor = decl.walk();
            for child in decl.named_children(&mut cursor) {
                match child.kind() {
                    "import_spec" => specs.push(child),
                    "import_spec_list" => {
                        let mut cursor = child.walk();
                        specs.extend(
                            child
                                .named_children(&mut cursor)
                                .filter(|n| n.kind() == "import_spec"),
                        );
                    }
                    _ => {}
                }
            }
        }

        specs.iter().any(|spec| {
            spec.child_by_field_name("name").is_none()
                && spec
                    .child_by_field_name("path")
                    .is_some_and(|p| self.text(p) == quoted)
        })
    }

    pub fn declarations(&self) -> Declarations {
        let mut decls = Declarations::default();
        let groups = self.comment_groups();

        let root = self.tree.root_node();
        let mut cursor = root.walk();
        for func in root.named_children(&mut cursor) {
            // methods have their own node kind and never count here
            if func.kind() != "function_declaration" {
                continue;
            }
            let name = match func.child_by_field_name("name") {
                Some(n) => self.text(n),
                None => continue,
            };

            if name == "main" {
                decls.has_main = true;
            } else if is_test_name(name, "Test") {
                if self.is_test_func(func) {
                    decls.tests.push(name.to_owned());
                }
            } else if is_test_name(name, "Example") {
                if let Some(example) = self.example(func, name, &groups) {
                    decls.examples.push(example);
                }
            }
        }

        decls.examples.sort_by(|a, b| a.name.cmp(&b.name));
        decls
    }

    /// `func TestXxx(t *T)` or `func TestXxx(t *pkg.T)` with no results.
    fn is_test_func(&self, func: Node<'_>) -> bool {
        if let Some(result) = func.child_by_field_name("result") {
            if result.kind() != "parameter_list" || has_named_children(result) {
                return false;
            }
        }

        let params = match func.child_by_field_name("parameters") {
            Some(p) => p,
            None => return false,
        };
        let mut cursor = params.walk();
        let list: Vec<Node<'_>> = params
            .named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .collect();
        if list.len() != 1 || list[0].kind() != "parameter_declaration" {
            return false;
        }

        let param = list[0];
        let mut cursor = param.walk();
        if param.children_by_field_name("name", &mut cursor).count() > 1 {
            return false;
        }

        let ty = match param.child_by_field_name("type") {
            Some(ty) if ty.kind() == "pointer_type" => ty,
            _ => return false,
        };
        let mut cursor = ty.walk();
        let target = ty
            .named_children(&mut cursor)
            .find(|n| n.kind() != "comment");
        match target {
            Some(t) if t.kind() == "type_identifier" => self.text(t) == "T",
            Some(t) if t.kind() == "qualified_type" => t
                .child_by_field_name("name")
                .is_some_and(|n| self.text(n) == "T"),
            _ => false,
        }
    }

    /// `func ExampleXxx()` with no parameters and no results.
    fn example(
        &self,
        func: Node<'_>,
        name: &str,
        groups: &[CommentGroup<'a>],
    ) -> Option<Example> {
        let params = func.child_by_field_name("parameters")?;
        if has_named_children(params) || func.child_by_field_name("result").is_some() {
            return None;
        }
        let body = func.child_by_field_name("body")?;

        let last = groups
            .iter()
            .filter(|g| g.start >= body.start_byte() && g.end <= body.end_byte())
            .last();

        let (output, unordered) = match last.and_then(|g| parse_output(&g.text())) {
            Some((output, unordered)) => (Some(output), unordered),
            None => (None, false),
        };

        Some(Example {
            name: name["Example".len()..].to_owned(),
            output,
            unordered,
        })
    }

    fn comment_groups(&self) -> Vec<CommentGroup<'a>> {
        let mut comments = Vec::new();
        let mut cursor = self.tree.root_node().walk();
        'walk: loop {
            let node = cursor.node();
            if node.kind() == "comment" {
                comments.push((node.start_byte(), node.end_byte()));
            }
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    continue 'walk;
                }
                if !cursor.goto_parent() {
                    break 'walk;
                }
            }
        }

        let src: &'a [u8] = self.src;
        let mut groups: Vec<CommentGroup<'a>> = Vec::new();
        for (start, end) in comments {
            let text = std::str::from_utf8(&src[start..end]).unwrap_or("");
            if let Some(group) = groups.last_mut() {
                let gap = &src[group.end..start];
                let newlines = gap.iter().filter(|&&b| b == b'\n').count();
                let joinable = gap.iter().all(u8::is_ascii_whitespace)
                    && newlines <= 1
                    && (!group.trailing || newlines == 0);
                if joinable {
                    group.end = end;
                    group.comments.push(text);
                    continue;
                }
            }
            let line_start = src[..start]
                .iter()
                .rposition(|&b| b == b'\n')
                .map_or(0, |i| i + 1);
            let trailing = !src[line_start..start]
                .iter()
                .all(u8::is_ascii_whitespace);
            groups.push(CommentGroup {
                start,
                end,
                trailing,
                comments: vec![text],
            });
        }
        groups
    }
}

fn has_named_children(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .any(|n| n.kind() != "comment");
    found
}

/// Whether `name` looks like a test (or example, according to `prefix`):
/// the prefix must not be followed by a lower-case letter, so `Testimony`
/// is not a test.
pub fn is_test_name(name: &str, prefix: &str) -> bool {
    match name.strip_prefix(prefix) {
        Some(rest) => rest.chars().next().is_none_or(|c| !c.is_lowercase()),
        None => false,
    }
}

/// Adjacent comments with no code or blank line between them.
struct CommentGroup<'a> {
    start: usize,
    end: usize,
    /// The group started on a line after code, so it only spans that line.
    trailing: bool,
    comments: Vec<&'a str>,
}

impl CommentGroup<'_> {
    /// Comment text without markers, leading blank lines and trailing
    /// whitespace. Runs of blank lines collapse into one and the result
    /// ends with a newline unless empty.
    fn text(&self) -> String {
        let mut lines: Vec<&str> = Vec::new();
        for &c in &self.comments {
            let body = if let Some(rest) = c.strip_prefix("//") {
                if let Some(rest) = rest.strip_prefix(' ') {
                    rest
                } else if is_directive(rest) {
                    continue;
                } else {
                    rest
                }
            } else if let Some(rest) = c.strip_prefix("/*") {
                rest.strip_suffix("*/").unwrap_or(rest)
            } else {
                c
            };
            lines.extend(body.split('\n').map(|l| l.trim_end_matches([' ', '\t', '\r', '\n'])));
        }

        let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 1);
        for line in lines {
            if !line.is_empty() || out.last().is_some_and(|l| !l.is_empty()) {
                out.push(line);
            }
        }
        if out.last().is_some_and(|l| !l.is_empty()) {
            out.push("");
        }
        out.join("\n")
    }
}

fn is_directive(c: &str) -> bool {
    if c.starts_with("line ") || c.starts_with("extern ") || c.starts_with("export ") {
        return true;
    }
    let is_word = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    match c.find(':') {
        Some(colon) if colon > 0 => {
            c.as_bytes()[..colon].iter().all(|&b| is_word(b))
                && c.as_bytes().get(colon + 1).is_some_and(|&b| is_word(b))
        }
        _ => false,
    }
}

/// Parses an `Output:` or `Unordered output:` comment.
fn parse_output(text: &str) -> Option<(String, bool)> {
    let trimmed = text.trim_start();
    let (rest, unordered) = match strip_prefix_ignore_case(trimmed, "unordered output:") {
        Some(rest) => (rest, true),
        None => (strip_prefix_ignore_case(trimmed, "output:")?, false),
    };
    let rest = rest.trim_start_matches(' ');
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    Some((rest.to_owned(), unordered))
}

fn strip_prefix_ignore_case<'s>(s: &'s str, prefix: &str) -> Option<&'s str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
