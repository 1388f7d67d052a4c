//! `.lang` Loader
//!
//! Loads `.lang` localization files into a tree of sets and attributes.
//! Loading runs in two passes: the [`Parser`] turns the token stream from
//! `lang-lexer` into a raw [`Set`] tree, then [`resolve`] replaces every
//! `~@` / `.~@` reference with the value it points at.
//!
//! # Example
//!
//! ```
//! use lang_parser::{loads, LoadOptions};
//!
//! let doc = loads("$menu\n@title:Start\n~@alias:menu.title", &LoadOptions::default()).unwrap();
//! assert_eq!(doc.text("menu.title"), Some("Start"));
//! assert_eq!(doc.text("menu.alias"), Some("Start"));
//! ```

pub mod parser;
pub mod resolve;
pub mod tree;

use encoding_rs::Encoding;
use std::borrow::Cow;
use std::path::{Path, PathBuf};

pub use parser::Parser;
pub use resolve::resolve;
pub use tree::{Document, Reference, Set, Value};

/// Display name used in errors when loading from a string.
pub const STRING_SOURCE: &str = "<string>";

/// Loader error with the file and line it was raised at.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("File {}, line {} - {}", display_file(.file), .line, .kind)]
pub struct LangError {
    pub kind: LangErrorKind,
    pub file: String,
    pub line: usize,
}

/// What went wrong while loading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LangErrorKind {
    #[error("name '{0}' is not valid")]
    InvalidName(String),
    #[error("accessing child set with no parent")]
    OrphanSet,
    #[error("expected ':'")]
    ExpectedColon,
    #[error("invalid syntax")]
    InvalidSyntax,
    #[error("text with no attribute")]
    TextWithoutAttribute,
    #[error("the value {0} is not valid")]
    InvalidReference(String),
    #[error("the value {0} refers to itself")]
    CircularReference(String),
    #[error("the value {0} is a set and cannot have text appended")]
    SetWithSuffix(String),
    #[error("file declares encoding '{declared}' but was read as '{expected}'")]
    EncodingMismatch { declared: String, expected: String },
}

/// Error from [`load_file`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unknown encoding '{label}'")]
    UnknownEncoding { label: String },
    #[error("Error decoding {} as {encoding}", .path.display())]
    Decode { path: PathBuf, encoding: String },
    #[error(transparent)]
    Lang(#[from] LangError),
}

fn display_file(file: &str) -> String {
    if file == STRING_SOURCE {
        file.to_string()
    } else {
        format!("\"{file}\"")
    }
}

/// Loader settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Encoding the source was read with. A `%=` directive naming a
    /// different label is an error, except in [`load_file`], which decodes
    /// the file again with the declared encoding.
    pub encoding: String,
    /// Name shown in error messages.
    pub file: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            encoding: "utf-8".into(),
            file: STRING_SOURCE.into(),
        }
    }
}

impl LoadOptions {
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    pub(crate) fn error(&self, kind: LangErrorKind, line: usize) -> LangError {
        LangError {
            kind,
            file: self.file.clone(),
            line,
        }
    }
}

/// Parse `source` without resolving references.
pub fn load_raw(source: &str, options: &LoadOptions) -> Result<Set, LangError> {
    Parser::parse(source, options)
}

/// Parse `source` and resolve every reference.
pub fn loads(source: &str, options: &LoadOptions) -> Result<Document, LangError> {
    let raw = Parser::parse(source, options)?;
    resolve(&raw, options)
}

/// Read a file, decode it with `options.encoding`, and load it.
///
/// A file whose `%=` directive declares another encoding is decoded again
/// with the declared one and reloaded.
pub fn load_file(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Document, LoadError> {
    load_file_with(path.as_ref(), options, loads)
}

/// [`load_file`] without resolving references.
pub fn load_raw_file(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Set, LoadError> {
    load_file_with(path.as_ref(), options, load_raw)
}

fn load_file_with<T>(
    path: &Path,
    options: &LoadOptions,
    load: fn(&str, &LoadOptions) -> Result<T, LangError>,
) -> Result<T, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let options = options.clone().with_file(path.display().to_string());

    // Lenient first pass: the file only has to be readable far enough to
    // find a `%=` directive naming its real encoding.
    let encoding = encoding_for(&options.encoding)?;
    let (source, malformed) = encoding.decode_without_bom_handling(&bytes);

    match load(&source, &options) {
        Err(LangError {
            kind: LangErrorKind::EncodingMismatch { declared, .. },
            ..
        }) => {
            tracing::debug!(%declared, "reloading with declared encoding");
            let options = options.with_encoding(declared);
            let source = decode(&bytes, encoding_for(&options.encoding)?, path)?;
            Ok(load(&source, &options)?)
        }
        _ if malformed => Err(decode_error(encoding, path)),
        result => Ok(result?),
    }
}

/// Encoding named by a WHATWG label, so `latin-1`, `cp1252` and `utf8` are
/// all understood.
fn encoding_for(label: &str) -> Result<&'static Encoding, LoadError> {
    Encoding::for_label(label.as_bytes()).ok_or_else(|| LoadError::UnknownEncoding {
        label: label.to_string(),
    })
}

fn decode(bytes: &[u8], encoding: &'static Encoding, path: &Path) -> Result<String, LoadError> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
        .ok_or_else(|| decode_error(encoding, path))
}

fn decode_error(encoding: &'static Encoding, path: &Path) -> LoadError {
    LoadError::Decode {
        path: path.to_path_buf(),
        encoding: encoding.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        write_temp_bytes(name, contents.as_bytes())
    }

    fn write_temp_bytes(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("lang-parser-{}-{name}", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_error_display_for_string_source() {
        let err = LoadOptions::default().error(LangErrorKind::OrphanSet, 3);
        assert_eq!(
            err.to_string(),
            "File <string>, line 3 - accessing child set with no parent"
        );
    }

    #[test]
    fn test_error_display_quotes_file_names() {
        let options = LoadOptions::default().with_file("menu.lang");
        let err = options.error(LangErrorKind::InvalidName("1x".into()), 1);
        assert_eq!(
            err.to_string(),
            "File \"menu.lang\", line 1 - name '1x' is not valid"
        );
    }

    #[test]
    fn test_load_file() {
        let path = write_temp("basic.lang", "$menu\n  @title:Start\n");
        let doc = load_file(&path, &LoadOptions::default()).unwrap();
        assert_eq!(doc.text("menu.title"), Some("Start"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_file_reloads_utf8_alias() {
        let path = write_temp("alias.lang", "%=UTF8\n@a:b\n");
        let doc = load_file(&path, &LoadOptions::default()).unwrap();
        assert_eq!(doc.text("a"), Some("b"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_file_decodes_declared_encoding() {
        let path = write_temp_bytes("latin.lang", b"%=latin-1\n@a:caf\xe9\n@b\nna\xefve\n");
        let doc = load_file(&path, &LoadOptions::default()).unwrap();
        assert_eq!(doc.text("a"), Some("café"));
        assert_eq!(doc.text("b"), Some("naïve\n"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_file_with_expected_encoding() {
        let path = write_temp_bytes("cp1252.lang", b"@a:\x80 5\n");
        let options = LoadOptions::default().with_encoding("cp1252");
        let doc = load_file(&path, &options).unwrap();
        assert_eq!(doc.text("a"), Some("€ 5"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_file_unknown_declared_encoding() {
        let path = write_temp("klingon.lang", "%=klingon\n@a:b\n");
        let err = load_file(&path, &LoadOptions::default()).unwrap_err();
        match err {
            LoadError::UnknownEncoding { label } => assert_eq!(label, "klingon"),
            other => panic!("expected unknown encoding, got {other:?}"),
        }
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_file_malformed_without_directive() {
        let path = write_temp_bytes("malformed.lang", b"@a:caf\xe9\n");
        let err = load_file(&path, &LoadOptions::default()).unwrap_err();
        match err {
            LoadError::Decode { encoding, .. } => assert_eq!(encoding, "UTF-8"),
            other => panic!("expected decode error, got {other:?}"),
        }
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_raw_file_keeps_references() {
        let path = write_temp_bytes("raw.lang", b"%=latin-1\n@a:\xe9\n~@b:a\n");
        let raw = load_raw_file(&path, &LoadOptions::default()).unwrap();
        assert_eq!(raw.get("a"), Some(&Value::Text("é".into())));
        assert!(matches!(raw.get("b"), Some(Value::Reference(_))));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_file_missing() {
        let err = load_file("/nonexistent/dir/missing.lang", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().starts_with("Error reading /nonexistent/dir/missing.lang"));
    }
}
