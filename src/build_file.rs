//! BUILD file model.
//!
//! Parses a BUILD file into a sequence of statements, exposes the rule
//! statements for inspection and mutation, and prints the whole file back out
//! deterministically. Only the shapes wollemi manages are modeled; every
//! other top-level statement, and every attribute value outside the modeled
//! subset, is captured verbatim and reprinted unchanged.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use crate::util::read_to_string;

/// Leading-comment pragma that immunizes a rule from rewriting.
pub const KEEP_PRAGMA: &str = "# wollemi:keep";

const INDENT: &str = "    ";

/// An attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A string literal.
    String(String),
    /// A list of string literals.
    Strings(Vec<String>),
    /// A bare identifier, `True` or `False` in practice.
    Ident(String),
    /// A `glob(include, exclude = ...)` call, optionally wrapped in a list
    /// together with additional target labels.
    Glob { include: Vec<String>, exclude: Vec<String>, targets: Vec<String> },
    /// Source text of an expression outside the modeled subset.
    Verbatim(String),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Strings(values.into_iter().map(Into::into).collect())
    }

    pub fn ident(value: impl Into<String>) -> Self {
        Self::Ident(value.into())
    }

    /// A glob over `include` minus `exclude`, with `targets` appended as
    /// extra sources. With targets present the value renders as a list whose
    /// first element is the glob call.
    pub fn glob(include: Vec<String>, exclude: Vec<String>, targets: Vec<String>) -> Self {
        Self::Glob { include, exclude, targets }
    }

    fn render(&self, out: &mut String, depth: usize) {
        match self {
            Self::String(value) => render_string(out, value),
            Self::Ident(value) | Self::Verbatim(value) => out.push_str(value),
            Self::Strings(values) => render_list(out, values, depth),
            Self::Glob { include, exclude, targets } => {
                if targets.is_empty() {
                    render_glob(out, include, exclude);
                } else {
                    out.push_str("[\n");
                    indent(out, depth + 1);
                    render_glob(out, include, exclude);
                    out.push_str(",\n");
                    for target in targets {
                        indent(out, depth + 1);
                        render_string(out, target);
                        out.push_str(",\n");
                    }
                    indent(out, depth);
                    out.push(']');
                }
            }
        }
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn render_string(out: &mut String, value: &str) {
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            ch => out.push(ch),
        }
    }
    out.push('"');
}

fn render_list(out: &mut String, values: &[String], depth: usize) {
    match values {
        [] => out.push_str("[]"),
        [value] => {
            out.push('[');
            render_string(out, value);
            out.push(']');
        }
        values => {
            out.push_str("[\n");
            for value in values {
                indent(out, depth + 1);
                render_string(out, value);
                out.push_str(",\n");
            }
            indent(out, depth);
            out.push(']');
        }
    }
}

fn render_inline_list(out: &mut String, values: &[String]) {
    out.push('[');
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        render_string(out, value);
    }
    out.push(']');
}

fn render_glob(out: &mut String, include: &[String], exclude: &[String]) {
    out.push_str("glob(");
    render_inline_list(out, include);
    if !exclude.is_empty() {
        out.push_str(", exclude = ");
        render_inline_list(out, exclude);
    }
    out.push(')');
}

/// A build rule: a named call statement with keyword attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    kind: String,
    leading_comments: Vec<String>,
    attrs: Vec<(String, Value)>,
}

impl Rule {
    /// A fresh rule of `kind` named `name`.
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            leading_comments: Vec::new(),
            attrs: vec![("name".to_owned(), Value::string(name))],
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        self.attr_string("name").unwrap_or_default()
    }

    /// Comment lines immediately preceding the rule, including the `#`.
    pub fn leading_comments(&self) -> &[String] {
        &self.leading_comments
    }

    /// Whether a leading comment pins this rule against rewriting.
    pub fn has_keep_pragma(&self) -> bool {
        self.leading_comments.iter().any(|line| line.trim().eq_ignore_ascii_case(KEEP_PRAGMA))
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.iter().find(|(name, _)| name == key).map(|(_, value)| value)
    }

    /// The attribute as a string literal, if it is one.
    pub fn attr_string(&self, key: &str) -> Option<&str> {
        match self.attr(key) {
            Some(Value::String(value)) => Some(value),
            _ => None,
        }
    }

    /// The attribute as a list of string literals, if it is one.
    pub fn attr_strings(&self, key: &str) -> Option<&[String]> {
        match self.attr(key) {
            Some(Value::Strings(values)) => Some(values),
            _ => None,
        }
    }

    /// The attribute as a bare identifier, if it is one.
    pub fn attr_literal(&self, key: &str) -> Option<&str> {
        match self.attr(key) {
            Some(Value::Ident(value)) => Some(value),
            _ => None,
        }
    }

    /// Replace the attribute in place, or append it.
    pub fn set_attr(&mut self, key: &str, value: Value) {
        match self.attrs.iter_mut().find(|(name, _)| name == key) {
            Some((_, slot)) => *slot = value,
            None => self.attrs.push((key.to_owned(), value)),
        }
    }

    pub fn del_attr(&mut self, key: &str) {
        self.attrs.retain(|(name, _)| name != key);
    }

    fn render(&self, out: &mut String) {
        for comment in &self.leading_comments {
            out.push_str(comment);
            out.push('\n');
        }
        out.push_str(&self.kind);
        out.push_str("(\n");
        for (key, value) in &self.attrs {
            indent(out, 1);
            out.push_str(key);
            out.push_str(" = ");
            value.render(out, 1);
            out.push_str(",\n");
        }
        out.push_str(")\n");
    }
}

#[derive(Debug, Clone)]
enum Statement {
    Rule(Rule),
    Verbatim(String),
}

/// One parsed BUILD file, possibly empty or not yet on disk.
#[derive(Debug, Clone, Default)]
pub struct BuildFile {
    path: PathBuf,
    source: String,
    statements: Vec<Statement>,
}

impl BuildFile {
    /// An empty model to be persisted at `path`.
    pub fn empty(path: PathBuf) -> Self {
        Self { path, source: String::new(), statements: Vec::new() }
    }

    /// Parse `source` as the contents of `path`.
    pub fn parse(path: PathBuf, source: String) -> Result<Self> {
        let statements = parse_statements(&source)?;
        Ok(Self { path, source, statements })
    }

    /// Read and parse the build file at `path`. A missing file yields an
    /// empty model.
    pub fn load(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::empty(path));
        }
        let source = read_to_string(&path)?;
        Self::parse(path, source)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The rules in source order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.statements.iter().filter_map(|statement| match statement {
            Statement::Rule(rule) => Some(rule),
            Statement::Verbatim(_) => None,
        })
    }

    /// Replace the rule with the same name, or append.
    pub fn set_rule(&mut self, rule: Rule) {
        let slot = self.statements.iter_mut().find_map(|statement| match statement {
            Statement::Rule(have) if have.name() == rule.name() => Some(have),
            Statement::Rule(_) | Statement::Verbatim(_) => None,
        });

        match slot {
            Some(have) => *have = rule,
            None => self.statements.push(Statement::Rule(rule)),
        }
    }

    /// Remove the rule named `name`.
    pub fn del_rule(&mut self, name: &str) {
        self.statements.retain(|statement| match statement {
            Statement::Rule(rule) => rule.name() != name,
            Statement::Verbatim(_) => true,
        });
    }

    /// Print the whole file. Equal models render byte-identically.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, statement) in self.statements.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            match statement {
                Statement::Rule(rule) => rule.render(&mut out),
                Statement::Verbatim(text) => {
                    out.push_str(text);
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Persist the rendered file, unless nothing would change. An empty model
    /// that never existed on disk is not created.
    pub fn write(&self) -> io::Result<()> {
        if self.statements.is_empty() && self.source.is_empty() {
            return Ok(());
        }

        let rendered = self.render();
        if rendered == self.source {
            return Ok(());
        }

        fs::write(&self.path, rendered)
    }
}

fn parse_statements(source: &str) -> Result<Vec<Statement>> {
    let mut statements = Vec::new();
    let mut comments: Vec<String> = Vec::new();
    let bytes = source.as_bytes();
    let mut pos = 0;

    let flush = |statements: &mut Vec<Statement>, comments: &mut Vec<String>| {
        if !comments.is_empty() {
            statements.push(Statement::Verbatim(comments.join("\n")));
            comments.clear();
        }
    };

    while pos < bytes.len() {
        // Leading horizontal whitespace of the line.
        while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
            pos += 1;
        }

        match bytes.get(pos) {
            None => break,
            Some(b'\n') => {
                // A blank line detaches any pending comments from the next rule.
                flush(&mut statements, &mut comments);
                pos += 1;
            }
            Some(b'#') => {
                let end = line_end(bytes, pos);
                comments.push(source[pos..end].trim_end().to_owned());
                pos = end;
                if pos < bytes.len() {
                    pos += 1; // consume the newline
                }
            }
            Some(_) => {
                let end = statement_end(bytes, pos);
                let chunk = source[pos..end].trim_end();
                if has_unterminated_string(chunk) {
                    bail!("unterminated string literal");
                }
                match parse_rule(chunk) {
                    Some(mut rule) => {
                        rule.leading_comments = std::mem::take(&mut comments);
                        statements.push(Statement::Rule(rule));
                    }
                    None => {
                        flush(&mut statements, &mut comments);
                        statements.push(Statement::Verbatim(chunk.to_owned()));
                    }
                }
                pos = end;
                if pos < bytes.len() {
                    pos += 1;
                }
            }
        }
    }

    flush(&mut statements, &mut comments);

    Ok(statements)
}

/// Whether a statement chunk ends inside a string literal. Comments are
/// skipped so an apostrophe in one does not count as an opening quote.
fn has_unterminated_string(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        match quote {
            Some(q) => {
                if byte == b'\\' {
                    i += 1;
                } else if byte == q {
                    quote = None;
                }
            }
            None => {
                if byte == b'"' || byte == b'\'' {
                    quote = Some(byte);
                } else if byte == b'#' {
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                    continue;
                }
            }
        }
        i += 1;
    }

    quote.is_some()
}

fn line_end(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos] != b'\n' {
        pos += 1;
    }
    pos
}

/// The exclusive end of the statement starting at `pos`: the first newline at
/// bracket depth zero, skipping over strings and comments.
fn statement_end(bytes: &[u8], mut pos: usize) -> usize {
    let mut depth = 0usize;

    while pos < bytes.len() {
        match bytes[pos] {
            b'\n' if depth == 0 => return pos,
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'#' => pos = line_end(bytes, pos).saturating_sub(1),
            b'"' | b'\'' => {
                let quote = bytes[pos];
                pos += 1;
                while pos < bytes.len() && bytes[pos] != quote {
                    if bytes[pos] == b'\\' {
                        pos += 1;
                    }
                    pos += 1;
                }
            }
            _ => {}
        }
        pos += 1;
    }

    bytes.len()
}

/// Try to read `chunk` as a rule: a single call expression whose arguments
/// are all keyword arguments. Anything else is kept verbatim by the caller.
fn parse_rule(chunk: &str) -> Option<Rule> {
    let mut parser = ValueParser::new(chunk);

    let kind = parser.ident()?;
    parser.skip_trivia();
    parser.eat(b'(')?;

    let mut attrs = Vec::new();
    loop {
        parser.skip_trivia();
        if parser.eat(b')').is_some() {
            break;
        }

        let key = parser.ident()?;
        parser.skip_trivia();
        parser.eat(b'=')?;
        let value = parser.value()?;
        attrs.push((key, value));

        parser.skip_trivia();
        if parser.eat(b',').is_some() {
            continue;
        }
        parser.eat(b')')?;
        break;
    }

    parser.skip_trivia();
    if !parser.at_end() {
        return None;
    }

    Some(Rule { kind, leading_comments: Vec::new(), attrs })
}

struct ValueParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> ValueParser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(byte) = self.peek() {
            match byte {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                b'#' => self.pos = line_end(self.bytes(), self.pos),
                _ => break,
            }
        }
    }

    fn eat(&mut self, byte: u8) -> Option<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    fn ident(&mut self) -> Option<String> {
        self.skip_trivia();
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if byte.is_ascii_alphanumeric() || byte == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start || self.bytes()[start].is_ascii_digit() {
            self.pos = start;
            return None;
        }
        Some(self.src[start..self.pos].to_owned())
    }

    fn string(&mut self) -> Option<String> {
        let quote = self.peek().filter(|byte| *byte == b'"' || *byte == b'\'')?;
        self.pos += 1;
        let mut out = String::new();
        while let Some(byte) = self.peek() {
            if byte == quote {
                self.pos += 1;
                return Some(out);
            }
            if byte == b'\\' {
                self.pos += 1;
                match self.peek() {
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(escaped) => out.push(escaped as char),
                    None => return None,
                }
                self.pos += 1;
                continue;
            }
            let ch = self.src[self.pos..].chars().next()?;
            out.push(ch);
            self.pos += ch.len_utf8();
        }
        None
    }

    /// Parse a value in keyword-argument or list-element position. Structured
    /// shapes (strings, string lists, identifiers, glob calls, glob + label
    /// lists) are modeled; everything else is captured verbatim up to the
    /// enclosing delimiter.
    fn value(&mut self) -> Option<Value> {
        self.skip_trivia();
        let start = self.pos;

        let parsed = self.structured_value();
        if parsed.is_some() {
            let after = self.pos;
            self.skip_trivia();
            if matches!(self.peek(), None | Some(b',' | b')' | b']')) {
                self.pos = after;
                return parsed;
            }
        }

        // Expression outside the modeled subset, e.g. `glob(...) + extras`
        // or a dict literal. Capture its source text verbatim.
        self.pos = start;
        let end = self.expression_end()?;
        let text = self.src[start..end].trim().to_owned();
        self.pos = end;
        if text.is_empty() { None } else { Some(Value::Verbatim(text)) }
    }

    fn structured_value(&mut self) -> Option<Value> {
        match self.peek()? {
            b'"' | b'\'' => self.string().map(Value::String),
            b'[' => self.list(),
            byte if byte.is_ascii_alphabetic() || byte == b'_' => {
                let ident = self.ident()?;
                self.skip_trivia();
                if self.peek() == Some(b'(') {
                    if ident == "glob" { self.glob_args() } else { None }
                } else {
                    Some(Value::Ident(ident))
                }
            }
            _ => None,
        }
    }

    fn list(&mut self) -> Option<Value> {
        self.eat(b'[')?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat(b']').is_some() {
                break;
            }
            items.push(self.value()?);
            self.skip_trivia();
            if self.eat(b',').is_some() {
                continue;
            }
            self.eat(b']')?;
            break;
        }

        if items.iter().all(|item| matches!(item, Value::String(_))) {
            let values = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(value) => Some(value),
                    Value::Strings(_) | Value::Ident(_) | Value::Glob { .. } | Value::Verbatim(_) => {
                        None
                    }
                })
                .collect();
            return Some(Value::Strings(values));
        }

        // A list mixing a leading glob call with target labels.
        let mut items = items.into_iter();
        if let Some(Value::Glob { include, exclude, targets }) = items.next()
            && targets.is_empty()
        {
            let mut targets = Vec::new();
            for item in items {
                match item {
                    Value::String(value) => targets.push(value),
                    Value::Strings(_) | Value::Ident(_) | Value::Glob { .. } | Value::Verbatim(_) => {
                        return None;
                    }
                }
            }
            return Some(Value::Glob { include, exclude, targets });
        }

        None
    }

    fn glob_args(&mut self) -> Option<Value> {
        self.eat(b'(')?;

        let mut include: Option<Vec<String>> = None;
        let mut exclude: Vec<String> = Vec::new();

        loop {
            self.skip_trivia();
            if self.eat(b')').is_some() {
                break;
            }

            let checkpoint = self.pos;
            let keyword = self.ident().and_then(|ident| {
                self.skip_trivia();
                if self.eat(b'=').is_some() { Some(ident) } else { None }
            });
            if keyword.is_none() {
                self.pos = checkpoint;
            }

            let value = self.value()?;
            let strings = match value {
                Value::Strings(values) => values,
                Value::String(value) => vec![value],
                Value::Ident(_) | Value::Glob { .. } | Value::Verbatim(_) => return None,
            };

            match keyword.as_deref() {
                None | Some("include") if include.is_none() => include = Some(strings),
                Some("exclude") => exclude = strings,
                None | Some(_) => return None,
            }

            self.skip_trivia();
            if self.eat(b',').is_some() {
                continue;
            }
            self.eat(b')')?;
            break;
        }

        Some(Value::Glob { include: include.unwrap_or_default(), exclude, targets: Vec::new() })
    }

    /// The exclusive end of the raw expression starting at the cursor: the
    /// first `,`, `)`, or `]` at bracket depth zero.
    fn expression_end(&self) -> Option<usize> {
        let bytes = self.bytes();
        let mut depth = 0usize;
        let mut pos = self.pos;

        while pos < bytes.len() {
            match bytes[pos] {
                b',' | b')' | b']' if depth == 0 => return Some(pos),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b'#' => pos = line_end(bytes, pos).saturating_sub(1),
                b'"' | b'\'' => {
                    let quote = bytes[pos];
                    pos += 1;
                    while pos < bytes.len() && bytes[pos] != quote {
                        if bytes[pos] == b'\\' {
                            pos += 1;
                        }
                        pos += 1;
                    }
                }
                _ => {}
            }
            pos += 1;
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> BuildFile {
        BuildFile::parse(PathBuf::from("BUILD.plz"), source.to_owned()).expect("parse failed")
    }

    #[test]
    fn parses_rule_attributes() {
        let build = parse(concat!(
            "go_library(\n",
            "    name = \"bar\",\n",
            "    srcs = glob([\"*.go\"], exclude = [\"*_test.go\"]),\n",
            "    deps = [\"//lib\"],\n",
            "    visibility = [\"PUBLIC\"],\n",
            ")\n",
        ));

        let rule = build.rules().next().expect("rule");
        assert_eq!(rule.kind(), "go_library");
        assert_eq!(rule.name(), "bar");
        assert_eq!(rule.attr_strings("deps"), Some(["//lib".to_owned()].as_slice()));
        assert_eq!(
            rule.attr("srcs"),
            Some(&Value::Glob {
                include: vec!["*.go".to_owned()],
                exclude: vec!["*_test.go".to_owned()],
                targets: vec![],
            })
        );
    }

    #[test]
    fn renders_deterministically() {
        let mut build = BuildFile::empty(PathBuf::from("BUILD.plz"));
        let mut rule = Rule::new("go_library", "bar");
        rule.set_attr(
            "srcs",
            Value::glob(vec!["*.go".to_owned()], vec!["*_test.go".to_owned()], vec![]),
        );
        rule.set_attr("visibility", Value::strings(["PUBLIC"]));
        rule.set_attr("deps", Value::strings(["//third_party/go/strings", "//lib"]));
        build.set_rule(rule);

        insta::assert_snapshot!(build.render(), @r#"
        go_library(
            name = "bar",
            srcs = glob(["*.go"], exclude = ["*_test.go"]),
            visibility = ["PUBLIC"],
            deps = [
                "//third_party/go/strings",
                "//lib",
            ],
        )
        "#);

        let reparsed = parse(&build.render());
        assert_eq!(reparsed.render(), build.render());
    }

    #[test]
    fn glob_with_targets_renders_as_list() {
        let mut out = String::new();
        Value::glob(vec!["*.go".to_owned()], vec![], vec![":gen".to_owned()]).render(&mut out, 1);
        assert_eq!(out, "[\n        glob([\"*.go\"]),\n        \":gen\",\n    ]");
    }

    #[test]
    fn keeps_unmodeled_statements_verbatim() {
        let source = concat!(
            "subinclude(\"//build_defs:go\")\n",
            "\n",
            "CONSTANT = 42\n",
            "\n",
            "go_library(\n",
            "    name = \"x\",\n",
            "    srcs = glob([\"*.go\"]) + [\"gen.go\"],\n",
            ")\n",
        );
        let build = parse(source);

        assert_eq!(build.rules().count(), 1);
        let rule = build.rules().next().expect("rule");
        assert_eq!(
            rule.attr("srcs"),
            Some(&Value::Verbatim("glob([\"*.go\"]) + [\"gen.go\"]".to_owned()))
        );
        assert_eq!(build.render(), source);
    }

    #[test]
    fn leading_comments_attach_to_rules() {
        let build = parse(concat!(
            "# wollemi:keep\n",
            "go_library(\n",
            "    name = \"x\",\n",
            ")\n",
        ));
        let rule = build.rules().next().expect("rule");
        assert_eq!(rule.leading_comments(), ["# wollemi:keep"]);
        assert!(rule.has_keep_pragma());
    }

    #[test]
    fn keep_pragma_is_case_insensitive_and_trimmed() {
        let build = parse("  # WOLLEMI:KEEP\ngo_library(name = \"x\")\n");
        assert!(build.rules().next().expect("rule").has_keep_pragma());
    }

    #[test]
    fn detached_comments_stay_verbatim() {
        let source = "# header comment\n\ngo_library(\n    name = \"x\",\n)\n";
        let build = parse(source);
        let rule = build.rules().next().expect("rule");
        assert!(rule.leading_comments().is_empty());
        assert_eq!(build.render(), source);
    }

    #[test]
    fn set_rule_replaces_by_name() {
        let mut build = parse("go_library(\n    name = \"x\",\n    deps = [\"//old\"],\n)\n");
        let mut rule = build.rules().next().expect("rule").clone();
        rule.set_attr("deps", Value::strings(["//new"]));
        build.set_rule(rule);

        assert_eq!(build.rules().count(), 1);
        assert_eq!(
            build.rules().next().expect("rule").attr_strings("deps"),
            Some(["//new".to_owned()].as_slice())
        );
    }

    #[test]
    fn del_rule_removes_by_name() {
        let mut build =
            parse("go_library(\n    name = \"x\",\n)\n\ngo_test(\n    name = \"test\",\n)\n");
        build.del_rule("test");
        assert_eq!(build.rules().count(), 1);
        assert_eq!(build.rules().next().expect("rule").name(), "x");
    }

    #[test]
    fn go_get_rule_attributes() {
        let source = "go_get(\n    get = \"github.com/pkg/errors\",\n    revision = \"v0.9.1\",\n)\n";
        let build = parse(source);
        let rule = build.rules().next().expect("rule");
        assert_eq!(rule.attr_string("get"), Some("github.com/pkg/errors"));
    }

    #[test]
    fn go_get_binary_literal() {
        let build = parse("go_get(\n    name = \"x\",\n    get = \"a.io/b\",\n    binary = True,\n)\n");
        let rule = build.rules().next().expect("rule");
        assert_eq!(rule.attr_literal("binary"), Some("True"));
    }

    #[test]
    fn empty_model_is_not_written() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("BUILD.plz");
        BuildFile::empty(path.clone()).write().expect("write");
        assert!(!path.exists());
    }

    #[test]
    fn unchanged_file_is_not_rewritten() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("BUILD.plz");
        let source = "go_library(\n    name = \"x\",\n)\n";
        std::fs::write(&path, source).expect("seed");

        let build = BuildFile::parse(path.clone(), source.to_owned()).expect("parse");
        let before = std::fs::metadata(&path).expect("metadata").modified().expect("mtime");
        build.write().expect("write");
        let after = std::fs::metadata(&path).expect("metadata").modified().expect("mtime");
        assert_eq!(before, after);
    }
}
