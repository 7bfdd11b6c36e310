//! Extension -> language identifier table (§6) and the subset of languages
//! that carry a tree-sitter grammar in this workspace.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Rust,
    Go,
    Ruby,
    Java,
    C,
    Cpp,
    CSharp,
    Php,
    Swift,
    Kotlin,
    Scala,
    Lua,
    R,
    Julia,
    Elixir,
    Erlang,
    Haskell,
    OCaml,
    Bash,
    Yaml,
    Json,
    Toml,
    Markdown,
    Sql,
}

impl Language {
    /// The identifier as it appears on the wire / in chunk metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Ruby => "ruby",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "c_sharp",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Scala => "scala",
            Language::Lua => "lua",
            Language::R => "r",
            Language::Julia => "julia",
            Language::Elixir => "elixir",
            Language::Erlang => "erlang",
            Language::Haskell => "haskell",
            Language::OCaml => "ocaml",
            Language::Bash => "bash",
            Language::Yaml => "yaml",
            Language::Json => "json",
            Language::Toml => "toml",
            Language::Markdown => "markdown",
            Language::Sql => "sql",
        }
    }

    /// Extension (without the leading dot, lowercased) -> recognized
    /// language. Returns `None` for anything not in the §6 table; callers
    /// fall back to line-based chunking for those.
    pub fn from_extension(ext: &str) -> Option<Self> {
        Some(match ext.to_ascii_lowercase().as_str() {
            "py" | "pyi" => Language::Python,
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "rs" => Language::Rust,
            "go" => Language::Go,
            "rb" => Language::Ruby,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Language::Cpp,
            "cs" => Language::CSharp,
            "php" => Language::Php,
            "swift" => Language::Swift,
            "kt" | "kts" => Language::Kotlin,
            "scala" => Language::Scala,
            "lua" => Language::Lua,
            "r" => Language::R,
            "jl" => Language::Julia,
            "ex" | "exs" => Language::Elixir,
            "erl" => Language::Erlang,
            "hs" => Language::Haskell,
            "ml" | "mli" => Language::OCaml,
            "sh" | "bash" => Language::Bash,
            "yaml" | "yml" => Language::Yaml,
            "json" => Language::Json,
            "toml" => Language::Toml,
            "md" | "markdown" => Language::Markdown,
            "sql" => Language::Sql,
            _ => return None,
        })
    }

    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::from_extension(ext)
    }

    /// Whether a `tree-sitter` grammar backs AST-aware chunking for this
    /// language. Everything else uses the line-based fallback even though
    /// it's a recognized language for watcher/extension purposes.
    pub fn supports_ast(self) -> bool {
        matches!(
            self,
            Language::Rust | Language::Python | Language::JavaScript | Language::TypeScript
        )
    }
}
