use serde::Serialize;

/// A position in source text. `start`/`end` are byte offsets; `line` and
/// `column` are 1-based, with columns counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

/// Token classification for `.lang` source.
///
/// Kinds map one-to-one onto highlighting scopes, except for the trivia
/// kinds (`Indent`, `Newline`) which only exist so that every byte of the
/// input belongs to some token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    // Trivia
    Indent,
    Newline,

    // Context openers
    AttributeMarker, // @
    ReferenceMarker, // ~@ .~@
    EncodingMarker,  // %=

    /// `$set`, `$$nested`, `$!`
    Keyword,
    AttributeName,
    AssignmentOperator,
    ReferenceSeparator,
    EncodingTag,
    Escape,
    Comment,
    Plain,
}

impl TokenKind {
    /// Whitespace and line breaks, which carry no scope.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Indent | TokenKind::Newline)
    }

    /// TextMate-style scope name a renderer can map to a style.
    pub fn scope(self) -> Option<&'static str> {
        let scope = match self {
            TokenKind::Indent | TokenKind::Newline => return None,
            TokenKind::AttributeMarker | TokenKind::ReferenceMarker => {
                "keyword.operator.attribute.lang"
            }
            TokenKind::EncodingMarker => "keyword.operator.encoding.lang",
            TokenKind::Keyword => "keyword.control.set.lang",
            TokenKind::AttributeName => "entity.name.tag.attribute.lang",
            TokenKind::AssignmentOperator => "keyword.operator.assignment.lang",
            TokenKind::ReferenceSeparator => "punctuation.separator.reference.lang",
            TokenKind::EncodingTag => "constant.other.encoding.lang",
            TokenKind::Escape => "constant.character.escape.lang",
            TokenKind::Comment => "comment.line.lang",
            TokenKind::Plain => "string.unquoted.lang",
        };
        Some(scope)
    }
}

/// A token produced by the `.lang` scanner. `text` borrows the exact slice
/// of the input the token covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, text: &'a str, span: Span) -> Self {
        Self { kind, text, span }
    }
}

/// Identifier characters: exactly ASCII `[a-zA-Z0-9_]`.
pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_chars_are_ascii_only() {
        assert!(is_ident_char('a'));
        assert!(is_ident_char('Z'));
        assert!(is_ident_char('9'));
        assert!(is_ident_char('_'));
        assert!(!is_ident_char('-'));
        assert!(!is_ident_char('é'));
        assert!(!is_ident_char(' '));
    }

    #[test]
    fn test_trivia_has_no_scope() {
        assert!(TokenKind::Indent.is_trivia());
        assert!(TokenKind::Newline.is_trivia());
        assert_eq!(TokenKind::Newline.scope(), None);
        assert!(!TokenKind::Plain.is_trivia());
        assert_eq!(TokenKind::Comment.scope(), Some("comment.line.lang"));
    }
}
