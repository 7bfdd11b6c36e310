//! AST-aware chunking for the languages this workspace carries a
//! `tree-sitter` grammar for. Everything else uses [`crate::fallback`]
//! directly. A chunk here is one top-level declaration (function, class,
//! struct, impl, ...); runs of non-declaration top-level text (imports,
//! stray statements) are coalesced into their own chunk so nothing is
//! dropped.

use crate::error::{ChunkerError, Result};
use crate::language::Language;
use tree_sitter::{Node, Parser};

fn grammar(language: Language) -> Option<tree_sitter::Language> {
    Some(match language {
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        _ => return None,
    })
}

/// Node kinds treated as an independent chunk boundary at the top level.
fn is_declaration_kind(language: Language, kind: &str) -> bool {
    match language {
        Language::Rust => matches!(
            kind,
            "function_item"
                | "struct_item"
                | "enum_item"
                | "impl_item"
                | "trait_item"
                | "mod_item"
                | "macro_definition"
        ),
        Language::Python => matches!(kind, "function_definition" | "class_definition"),
        Language::JavaScript | Language::TypeScript => matches!(
            kind,
            "function_declaration"
                | "class_declaration"
                | "lexical_declaration"
                | "export_statement"
        ),
        _ => false,
    }
}

/// Parse `content` as `language` and return one text span per top-level
/// chunk. Returns `Err` on genuine parse failure (caller falls back to
/// line-based chunking); a parse that succeeds but yields no children
/// (e.g. an empty file) returns `Ok(vec![])`.
pub fn chunk_source(language: Language, content: &str) -> Result<Vec<String>> {
    let grammar = grammar(language).ok_or_else(|| {
        ChunkerError::UnsupportedLanguage(language.as_str().to_string())
    })?;

    let mut parser = Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|_| ChunkerError::ParseFailed {
            language: language.as_str().to_string(),
        })?;

    let tree = parser.parse(content, None).ok_or_else(|| ChunkerError::ParseFailed {
        language: language.as_str().to_string(),
    })?;

    let root = tree.root_node();
    if root.has_error() && root.child_count() == 0 {
        return Err(ChunkerError::ParseFailed {
            language: language.as_str().to_string(),
        });
    }

    Ok(collect_chunks(language, root, content.as_bytes()))
}

fn collect_chunks(language: Language, root: Node, source: &[u8]) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut preamble_start: Option<usize> = None;
    let mut cursor = root.walk();

    for child in root.children(&mut cursor) {
        if is_declaration_kind(language, child.kind()) {
            if let Some(start) = preamble_start.take() {
                push_span(&mut chunks, source, start, child.start_byte());
            }
            push_span(&mut chunks, source, child.start_byte(), child.end_byte());
        } else if preamble_start.is_none() {
            preamble_start = Some(child.start_byte());
        }
    }

    if let Some(start) = preamble_start {
        push_span(&mut chunks, source, start, root.end_byte());
    }

    chunks
}

fn push_span(chunks: &mut Vec<String>, source: &[u8], start: usize, end: usize) {
    if end <= start {
        return;
    }
    if let Ok(text) = std::str::from_utf8(&source[start..end]) {
        if !text.trim().is_empty() {
            chunks.push(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_splits_into_function_and_struct() {
        let src = "fn hello() {\n    println!(\"hi\");\n}\n\nstruct Point {\n    x: i32,\n}\n";
        let chunks = chunk_source(Language::Rust, src).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("fn hello"));
        assert!(chunks[1].starts_with("struct Point"));
    }

    #[test]
    fn python_splits_into_functions() {
        let src = "def login():\n    pass\n\n\ndef logout():\n    pass\n";
        let chunks = chunk_source(Language::Python, src).unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn leading_imports_become_their_own_chunk() {
        let src = "use std::io;\nuse std::fs;\n\nfn main() {}\n";
        let chunks = chunk_source(Language::Rust, src).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].contains("use std::io"));
    }

    #[test]
    fn empty_source_yields_no_chunks() {
        let chunks = chunk_source(Language::Rust, "").unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn unsupported_language_is_err() {
        assert!(chunk_source(Language::Go, "package main").is_err());
    }
}
