//! `.lang` Lexer
//!
//! Tokenizes `.lang` localization files into a lazy stream of classified
//! tokens for highlighting and loading. Handles the line-start rules
//! (`$` sets, `@` attributes, `~@` / `.~@` references, `%=` encoding,
//! `::` comments, `\` and `&` escapes) and the contexts they open.
//!
//! # Example
//!
//! ```
//! use lang_lexer::{tokenize, TokenKind};
//!
//! let kinds: Vec<_> = tokenize("$menu").map(|t| t.kind).collect();
//! assert_eq!(kinds, vec![TokenKind::Keyword]);
//! ```

pub mod scanner;
pub mod token;

pub use scanner::{LexState, Scanner};
pub use token::{is_ident_char, Span, Token, TokenKind};

/// Lazily tokenize `source`. Each call starts from a fresh state.
pub fn tokenize(source: &str) -> Scanner<'_> {
    Scanner::new(source)
}
