//! Line parser for `.lang` files.
//!
//! Groups the token stream from `lang-lexer` into lines and interprets each
//! line by its first significant token: set opener/closer, attribute,
//! reference, encoding directive, comment, or attribute text. Indentation is
//! not significant; nesting comes only from the number of `$`.

use crate::tree::{Reference, Set, Value};
use crate::{LangError, LangErrorKind, LoadOptions};
use lang_lexer::{is_ident_char, Scanner, Token, TokenKind};
use tracing::debug;

/// `.lang` line parser.
///
/// Produces the raw tree: references are stored as [`Value::Reference`] and
/// resolved later by [`crate::resolve`].
pub struct Parser<'o> {
    options: &'o LoadOptions,
    root: Set,
    /// Sets opened below the root, innermost last.
    open: Vec<(String, Set)>,
    /// Attribute that text lines are appended to.
    attribute: Option<String>,
}

impl<'o> Parser<'o> {
    /// Create a new parser with an empty root set.
    pub fn new(options: &'o LoadOptions) -> Self {
        Self {
            options,
            root: Set::new(),
            open: Vec::new(),
            attribute: None,
        }
    }

    /// Parse source into a raw tree.
    pub fn parse(source: &str, options: &LoadOptions) -> Result<Set, LangError> {
        let mut parser = Parser::new(options);
        let mut line = Vec::new();

        for token in Scanner::new(source) {
            match token.kind {
                TokenKind::Newline => {
                    parser.parse_line(&line)?;
                    line.clear();
                }
                TokenKind::Indent => {}
                _ => line.push(token),
            }
        }
        parser.parse_line(&line)?;

        Ok(parser.finish())
    }

    /// Close every open set and return the root.
    pub fn finish(mut self) -> Set {
        while !self.open.is_empty() {
            self.close_set();
        }
        self.root
    }

    /// Parse one line's tokens, trivia already removed.
    pub fn parse_line(&mut self, tokens: &[Token<'_>]) -> Result<(), LangError> {
        let Some(first) = tokens.first() else {
            return Ok(());
        };
        let line = first.span.line;
        let rest = &tokens[1..];

        match first.kind {
            TokenKind::EncodingMarker => self.parse_encoding(rest, line),
            TokenKind::Comment => Ok(()),
            TokenKind::Keyword => self.parse_set(first.text, line),
            // `$name extra` and friends are not keywords but are still set lines
            TokenKind::Plain if first.text.starts_with('$') => self.parse_set(first.text, line),
            TokenKind::AttributeMarker => self.parse_attribute(rest, line),
            TokenKind::ReferenceMarker => self.parse_reference(first.text == ".~@", rest, line),
            _ => self.parse_text(tokens, line),
        }
    }

    // =========================================================================
    // Line kinds
    // =========================================================================

    /// `%=label`
    fn parse_encoding(&mut self, tokens: &[Token<'_>], line: usize) -> Result<(), LangError> {
        let declared = concat(tokens);
        if !declared.eq_ignore_ascii_case(&self.options.encoding) {
            return Err(self.error(
                LangErrorKind::EncodingMismatch {
                    declared,
                    expected: self.options.encoding.clone(),
                },
                line,
            ));
        }
        self.attribute = None;
        Ok(())
    }

    /// `$name`, `$$name`, ... or `$!`, `$$!`, ...
    fn parse_set(&mut self, text: &str, line: usize) -> Result<(), LangError> {
        let name = text.trim_start_matches('$');
        let level = text.len() - name.len();

        if level > self.depth() {
            return Err(self.error(LangErrorKind::OrphanSet, line));
        }
        while self.depth() > level {
            self.close_set();
        }

        // Closing keeps the current attribute; later text lands in the enclosing set.
        if name == "!" {
            return Ok(());
        }

        self.check_name(name, line)?;
        self.attribute = None;
        debug!(name, level, line, "open set");
        self.open.push((name.to_string(), Set::new()));
        Ok(())
    }

    /// `@name` or `@name:value`
    fn parse_attribute(&mut self, tokens: &[Token<'_>], line: usize) -> Result<(), LangError> {
        match assignment(tokens) {
            Some(i) => {
                let name = concat(&tokens[..i]);
                self.check_name(&name, line)?;
                let value = concat(&tokens[i + 1..]);
                debug!(%name, line, "attribute");
                self.current_mut().insert(name, Value::Text(value));
                self.attribute = None;
            }
            None => {
                let name = concat(tokens);
                self.check_name(&name, line)?;
                debug!(%name, line, "multi-line attribute");
                self.attribute = Some(name);
            }
        }
        Ok(())
    }

    /// `~@name:path` or `.~@name:path`
    fn parse_reference(
        &mut self,
        local: bool,
        tokens: &[Token<'_>],
        line: usize,
    ) -> Result<(), LangError> {
        let Some(i) = assignment(tokens) else {
            return Err(self.error(LangErrorKind::ExpectedColon, line));
        };
        let name = concat(&tokens[..i]);
        let target = concat(&tokens[i + 1..]);
        if target.contains(':') {
            return Err(self.error(LangErrorKind::InvalidSyntax, line));
        }
        self.check_name(&name, line)?;

        debug!(%name, %target, local, line, "reference");
        let reference = Reference {
            path: target.split('.').map(String::from).collect(),
            local,
            suffix: String::new(),
            line,
        };
        self.current_mut().insert(name, Value::Reference(reference));
        self.attribute = None;
        Ok(())
    }

    /// Any other line is text for the current attribute.
    fn parse_text(&mut self, tokens: &[Token<'_>], line: usize) -> Result<(), LangError> {
        let mut text = concat(tokens);
        match tokens.first() {
            // `&` joins the line without a newline
            Some(t) if t.kind == TokenKind::Escape && t.text == "&" => {
                text.remove(0);
            }
            Some(t) if t.kind == TokenKind::Escape => {
                text.remove(0);
                text.push('\n');
            }
            _ => text.push('\n'),
        }

        let Some(name) = self.attribute.clone() else {
            return Err(self.error(LangErrorKind::TextWithoutAttribute, line));
        };

        let set = self.current_mut();
        if let Some(value) = set.get_mut(&name) {
            match value {
                Value::Text(existing) => {
                    existing.push_str(&text);
                    return Ok(());
                }
                Value::Reference(reference) => {
                    reference.suffix.push_str(&text);
                    return Ok(());
                }
                Value::Set(_) => {}
            }
        }
        set.insert(name, Value::Text(text));
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Nesting level of the current set; the root is level 1.
    fn depth(&self) -> usize {
        self.open.len() + 1
    }

    fn current_mut(&mut self) -> &mut Set {
        match self.open.last_mut() {
            Some((_, set)) => set,
            None => &mut self.root,
        }
    }

    fn close_set(&mut self) {
        if let Some((name, set)) = self.open.pop() {
            debug!(%name, entries = set.len(), "close set");
            self.current_mut().insert(name, Value::Set(set));
        }
    }

    fn check_name(&self, name: &str, line: usize) -> Result<(), LangError> {
        if is_valid_name(name) {
            Ok(())
        } else {
            Err(self.error(LangErrorKind::InvalidName(name.to_string()), line))
        }
    }

    fn error(&self, kind: LangErrorKind, line: usize) -> LangError {
        self.options.error(kind, line)
    }
}

/// Names are `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(is_ident_char),
        _ => false,
    }
}

fn assignment(tokens: &[Token<'_>]) -> Option<usize> {
    tokens
        .iter()
        .position(|t| t.kind == TokenKind::AssignmentOperator)
}

fn concat(tokens: &[Token<'_>]) -> String {
    tokens.iter().map(|t| t.text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(source: &str) -> Set {
        Parser::parse(source, &LoadOptions::default()).unwrap()
    }

    fn err(source: &str) -> LangError {
        Parser::parse(source, &LoadOptions::default()).unwrap_err()
    }

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    fn set(entries: &[(&str, Value)]) -> Value {
        let mut set = Set::new();
        for (name, value) in entries {
            set.insert(*name, value.clone());
        }
        Value::Set(set)
    }

    // =========================================================================
    // Names
    // =========================================================================

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("title"));
        assert!(is_valid_name("_private"));
        assert!(is_valid_name("level_2"));
        assert!(!is_valid_name("2nd"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("with space"));
        assert!(!is_valid_name("héllo"));
    }

    // =========================================================================
    // Sets
    // =========================================================================

    #[test]
    fn test_empty_source() {
        assert!(raw("").is_empty());
    }

    #[test]
    fn test_nested_sets() {
        let root = raw("$a\n  $$b\n    @x:1\n  $$c\n$d");
        assert_eq!(
            Value::Set(root),
            set(&[
                ("a", set(&[("b", set(&[("x", text("1"))])), ("c", set(&[]))])),
                ("d", set(&[])),
            ])
        );
    }

    #[test]
    fn test_close_set() {
        let root = raw("$a\n@x:1\n$!\n@y:2");
        assert_eq!(
            Value::Set(root),
            set(&[("a", set(&[("x", text("1"))])), ("y", text("2"))])
        );
    }

    #[test]
    fn test_close_nested_level_only() {
        let root = raw("$a\n$$b\n$$!\n@x:1");
        assert_eq!(
            Value::Set(root),
            set(&[("a", set(&[("b", set(&[])), ("x", text("1"))]))])
        );
    }

    #[test]
    fn test_orphan_set() {
        let e = err("$a\n$$$c");
        assert_eq!(e.kind, LangErrorKind::OrphanSet);
        assert_eq!(e.line, 2);
        assert_eq!(err("$$a").kind, LangErrorKind::OrphanSet);
    }

    #[test]
    fn test_invalid_set_names() {
        assert_eq!(err("$1abc").kind, LangErrorKind::InvalidName("1abc".into()));
        assert_eq!(
            err("$foo bar").kind,
            LangErrorKind::InvalidName("foo bar".into())
        );
        assert_eq!(err("$").kind, LangErrorKind::InvalidName("".into()));
    }

    #[test]
    fn test_reopened_set_replaces_in_place() {
        let root = raw("$a\n@x:1\n$b\n$a\n@y:2");
        let names: Vec<_> = root.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(root.get("a"), Some(&set(&[("y", text("2"))])));
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    #[test]
    fn test_inline_attribute() {
        let root = raw("@title:Start game\n@padded: b ");
        assert_eq!(root.get("title"), Some(&text("Start game")));
        assert_eq!(root.get("padded"), Some(&text(" b ")));
    }

    #[test]
    fn test_multi_line_attribute() {
        let root = raw("@desc\nLine 1\n  Line 2");
        assert_eq!(root.get("desc"), Some(&text("Line 1\nLine 2\n")));
    }

    #[test]
    fn test_attribute_without_text_is_not_created() {
        assert!(raw("@empty").is_empty());
    }

    #[test]
    fn test_blank_lines_and_comments_skipped() {
        let root = raw("@d\nx\n\n   \n:: note\ny");
        assert_eq!(root.get("d"), Some(&text("x\ny\n")));
    }

    #[test]
    fn test_escapes() {
        let root = raw("@d\n\\$notaset\n&joined\n\\\\back\n\\::kept");
        assert_eq!(
            root.get("d"),
            Some(&text("$notaset\njoined\\back\n::kept\n"))
        );
    }

    #[test]
    fn test_windows_line_endings() {
        let root = raw("@d\r\nx\r\n");
        assert_eq!(root.get("d"), Some(&text("x\n")));
    }

    #[test]
    fn test_invalid_attribute_name() {
        let e = err("@my attr:x");
        assert_eq!(e.kind, LangErrorKind::InvalidName("my attr".into()));
        assert_eq!(err("@").kind, LangErrorKind::InvalidName("".into()));
    }

    #[test]
    fn test_text_without_attribute() {
        let e = err("hello");
        assert_eq!(e.kind, LangErrorKind::TextWithoutAttribute);
        assert_eq!(e.line, 1);
        assert_eq!(err("@a:1\nmore").line, 2);
    }

    #[test]
    fn test_new_set_ends_attribute() {
        let e = err("@a\nx\n$s\ny");
        assert_eq!(e.kind, LangErrorKind::TextWithoutAttribute);
        assert_eq!(e.line, 4);
    }

    #[test]
    fn test_closing_set_keeps_attribute() {
        let root = raw("$s\n@a\nx\n$!\ny");
        assert_eq!(
            Value::Set(root),
            set(&[("s", set(&[("a", text("x\n"))])), ("a", text("y\n"))])
        );
    }

    #[test]
    fn test_duplicate_attribute_replaced() {
        let root = raw("@a:1\n@b:2\n@a:3");
        let names: Vec<_> = root.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(root.get("a"), Some(&text("3")));
    }

    // =========================================================================
    // References
    // =========================================================================

    #[test]
    fn test_local_reference() {
        let root = raw(".~@alias:menu.title");
        assert_eq!(
            root.get("alias"),
            Some(&Value::Reference(Reference {
                path: vec!["menu".into(), "title".into()],
                local: true,
                suffix: String::new(),
                line: 1,
            }))
        );
    }

    #[test]
    fn test_absolute_reference_inside_set() {
        let root = raw("$menu\n  ~@start:title");
        let Some(Value::Set(menu)) = root.get("menu") else {
            panic!("menu should be a set");
        };
        match menu.get("start") {
            Some(Value::Reference(r)) => {
                assert!(!r.local);
                assert_eq!(r.dotted(), "title");
                assert_eq!(r.line, 2);
            }
            other => panic!("expected reference, got {other:?}"),
        }
    }

    #[test]
    fn test_reference_errors() {
        assert_eq!(err("~@alias").kind, LangErrorKind::ExpectedColon);
        assert_eq!(err("~@a:b:c").kind, LangErrorKind::InvalidSyntax);
        assert_eq!(err("~@1a:b").kind, LangErrorKind::InvalidName("1a".into()));
    }

    #[test]
    fn test_text_after_reference_becomes_suffix() {
        let root = raw("~@r:x\n@r\n tail");
        match root.get("r") {
            Some(Value::Reference(r)) => assert_eq!(r.suffix, "tail\n"),
            other => panic!("expected reference, got {other:?}"),
        }
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    #[test]
    fn test_encoding_directive() {
        assert_eq!(raw("%=utf-8\n@a:b").get("a"), Some(&text("b")));
        assert_eq!(raw("%=UTF-8\n@a:b").get("a"), Some(&text("b")));
    }

    #[test]
    fn test_encoding_mismatch() {
        let e = err("%=ascii");
        assert_eq!(
            e.kind,
            LangErrorKind::EncodingMismatch {
                declared: "ascii".into(),
                expected: "utf-8".into(),
            }
        );
    }

    #[test]
    fn test_encoding_ends_attribute() {
        let e = err("@a\n%=utf-8\ntext");
        assert_eq!(e.kind, LangErrorKind::TextWithoutAttribute);
        assert_eq!(e.line, 3);
    }

    #[test]
    fn test_custom_expected_encoding() {
        let options = LoadOptions::default().with_encoding("latin-1");
        assert!(Parser::parse("%=Latin-1\n@a:b", &options).is_ok());
    }
}
