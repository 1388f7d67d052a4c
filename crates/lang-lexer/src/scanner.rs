use crate::token::{is_ident_char, Span, Token, TokenKind};
use tracing::trace;

/// Tokenizer context. Contexts nest on a stack; every context other than
/// `Main` is closed at the end of its line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexState {
    /// Line-start rules, then plain text.
    Main,
    /// After `@`: the attribute name up to `:`.
    Attribute,
    /// After `~@` / `.~@`: the new attribute's name up to `:`.
    AttributeReference,
    /// After the `:` of a reference: the dotted path being referenced.
    Reference,
    /// After `%=`: the encoding label.
    Encoding,
}

/// Sequences that a leading backslash escapes, longest first.
const ESCAPABLE: &[&str] = &[".~@", "~@", "::", "%=", "&", "$", "@", "\\"];

/// `.lang` source scanner.
///
/// Yields tokens lazily as an iterator. Every byte of the input belongs to
/// exactly one token, so concatenating token texts reproduces the source.
/// The scanner never fails: anything no rule claims becomes `Plain`.
///
/// - Line-oriented: rules in `Main` are anchored at the start of a line
/// - Stack-based contexts, reset to `Main` at every line break
/// - Byte offsets plus line/column on every token
pub struct Scanner<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    stack: Vec<LexState>,
    at_line_start: bool,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
            stack: vec![LexState::Main],
            at_line_start: true,
        }
    }

    /// Tokenize the entire source into a vector of tokens.
    pub fn tokenize(source: &'a str) -> Vec<Token<'a>> {
        Scanner::new(source).collect()
    }

    /// The active context.
    pub fn state(&self) -> LexState {
        self.stack.last().copied().unwrap_or(LexState::Main)
    }

    /// Number of contexts open above `Main`.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Scan the next token. Callers guarantee input remains.
    fn scan_token(&mut self) -> Token<'a> {
        let rest = self.rest();

        if let Some(len) = line_break_len(rest) {
            self.close_contexts();
            let token = self.emit(TokenKind::Newline, len);
            self.line += 1;
            self.column = 1;
            self.at_line_start = true;
            return token;
        }

        if self.at_line_start {
            return self.scan_line_start();
        }

        match self.state() {
            LexState::Main => self.emit(TokenKind::Plain, line_content(rest).len()),
            LexState::Attribute => self.scan_attribute(),
            LexState::AttributeReference => self.scan_attribute_reference(),
            LexState::Reference => self.scan_reference(),
            LexState::Encoding => self.scan_encoding(),
        }
    }

    // --- Main ---

    /// Line-start rules, tried in order after the indentation anchor.
    fn scan_line_start(&mut self) -> Token<'a> {
        let rest = self.rest();

        let indent = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        if indent > 0 {
            // Stay anchored: the rules below still apply after indentation.
            return self.emit(TokenKind::Indent, indent);
        }
        self.at_line_start = false;

        let line = line_content(rest);

        if is_set_keyword(line) {
            return self.emit(TokenKind::Keyword, line.len());
        }

        if rest.starts_with('@') {
            self.push(LexState::Attribute);
            return self.emit(TokenKind::AttributeMarker, 1);
        }

        if let Some(marker) = [".~@", "~@"].into_iter().find(|m| rest.starts_with(m)) {
            self.push(LexState::AttributeReference);
            return self.emit(TokenKind::ReferenceMarker, marker.len());
        }

        if rest.starts_with("%=") {
            self.push(LexState::Encoding);
            return self.emit(TokenKind::EncodingMarker, 2);
        }

        if let Some(tail) = rest.strip_prefix('\\') {
            let escaped = ESCAPABLE
                .iter()
                .find(|seq| tail.starts_with(*seq))
                .map_or(0, |seq| seq.len());
            return self.emit(TokenKind::Escape, 1 + escaped);
        }

        if rest.starts_with('&') {
            return self.emit(TokenKind::Escape, 1);
        }

        if line.starts_with("::") {
            return self.emit(TokenKind::Comment, line.len());
        }

        self.emit(TokenKind::Plain, line.len())
    }

    // --- Contexts ---

    fn scan_attribute(&mut self) -> Token<'a> {
        let rest = self.rest();
        if rest.starts_with(':') {
            let token = self.emit(TokenKind::AssignmentOperator, 1);
            self.pop();
            return token;
        }
        self.scan_name_or_plain(&[':'])
    }

    fn scan_attribute_reference(&mut self) -> Token<'a> {
        let rest = self.rest();
        if rest.starts_with(':') {
            let token = self.emit(TokenKind::AssignmentOperator, 1);
            self.pop();
            self.push(LexState::Reference);
            return token;
        }
        if rest.starts_with('.') {
            return self.emit(TokenKind::ReferenceSeparator, 1);
        }
        self.scan_name_or_plain(&[':', '.'])
    }

    fn scan_reference(&mut self) -> Token<'a> {
        if self.rest().starts_with('.') {
            return self.emit(TokenKind::ReferenceSeparator, 1);
        }
        self.scan_name_or_plain(&['.'])
    }

    fn scan_encoding(&mut self) -> Token<'a> {
        let len = self.rest().chars().next().map_or(1, char::len_utf8);
        self.emit(TokenKind::EncodingTag, len)
    }

    /// An identifier run, or a run of anything that is neither an identifier
    /// character, one of `stops`, nor a line break.
    fn scan_name_or_plain(&mut self, stops: &[char]) -> Token<'a> {
        let rest = self.rest();
        let name = prefix_len(rest, is_ident_char);
        if name > 0 {
            return self.emit(TokenKind::AttributeName, name);
        }
        let other = prefix_len(rest, |c| {
            !is_ident_char(c) && !stops.contains(&c) && !is_line_break(c)
        });
        // Callers only get here on a character no other rule claims.
        let len = if other > 0 {
            other
        } else {
            rest.chars().next().map_or(1, char::len_utf8)
        };
        self.emit(TokenKind::Plain, len)
    }

    // --- Stack ---

    fn push(&mut self, state: LexState) {
        trace!(?state, line = self.line, "push context");
        self.stack.push(state);
    }

    fn pop(&mut self) {
        if self.stack.len() > 1 {
            let state = self.stack.pop();
            trace!(?state, line = self.line, "pop context");
        }
    }

    /// End of line or input: every open context ends here.
    fn close_contexts(&mut self) {
        while self.stack.len() > 1 {
            self.pop();
        }
    }

    // --- Helpers ---

    fn emit(&mut self, kind: TokenKind, len: usize) -> Token<'a> {
        let source = self.source;
        let start = self.pos;
        let end = (start + len).min(source.len());
        let text = &source[start..end];
        let token = Token::new(kind, text, Span::new(start, end, self.line, self.column));
        self.pos = end;
        self.column += text.chars().count();
        token
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.is_at_end() {
            self.close_contexts();
            return None;
        }
        Some(self.scan_token())
    }
}

impl std::iter::FusedIterator for Scanner<'_> {}

/// `$`, `$$`, ... followed by a name or `!`, filling the whole line.
fn is_set_keyword(line: &str) -> bool {
    let name = line.trim_start_matches('$');
    if name.len() == line.len() {
        return false;
    }
    name == "!" || (!name.is_empty() && name.chars().all(is_ident_char))
}

fn is_line_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

/// Length of the line break at the start of `s`, if any (`\n`, `\r\n`, `\r`).
fn line_break_len(s: &str) -> Option<usize> {
    if s.starts_with("\r\n") {
        Some(2)
    } else if s.starts_with('\n') || s.starts_with('\r') {
        Some(1)
    } else {
        None
    }
}

/// `s` up to (not including) the next line break.
fn line_content(s: &str) -> &str {
    &s[..s.find(is_line_break).unwrap_or(s.len())]
}

/// Byte length of the longest prefix whose characters all satisfy `pred`.
fn prefix_len(s: &str, pred: impl Fn(char) -> bool) -> usize {
    s.find(|c| !pred(c)).unwrap_or(s.len())
}
