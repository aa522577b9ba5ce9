//! Go build constraint evaluation.
//!
//! A file takes part in a build when its `_GOOS`/`_GOARCH` file-name suffixes
//! match the target platform and every `//go:build` (or legacy `// +build`)
//! line in its header is satisfied by the active tag set.

use std::collections::HashSet;

use tracing::trace;

const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Platform and tag set a build is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Target operating system (Go spelling)
    pub goos: String,
    /// Target architecture (Go spelling)
    pub goarch: String,
    /// User-supplied build tags
    pub tags: HashSet<String>,
}

impl BuildContext {
    /// Build context for the host platform plus `tags`.
    pub fn host<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(host_goos(), host_goarch(), tags)
    }

    /// Build context for an explicit platform.
    pub fn new<I, S>(goos: impl Into<String>, goarch: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            goos: goos.into(),
            goarch: goarch.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a single build tag is satisfied.
    pub fn satisfies(&self, tag: &str) -> bool {
        if self.tags.contains(tag) || tag == self.goos || tag == self.goarch {
            return true;
        }
        match tag {
            "gc" | "cgo" => true,
            "unix" => UNIX_OS.contains(&self.goos.as_str()),
            "linux" => self.goos == "android",
            "solaris" => self.goos == "illumos",
            "darwin" => self.goos == "ios",
            _ => is_release_tag(tag),
        }
    }

    /// Whether the file-name suffixes (`_linux`, `_arm64`, `_windows_amd64`)
    /// allow the file on this platform.
    pub fn matches_file_name(&self, file_name: &str) -> bool {
        let stem = file_name.strip_suffix(".go").unwrap_or(file_name);
        let stem = stem.strip_suffix("_test").unwrap_or(stem);
        let Some(first_underscore) = stem.find('_') else {
            return true;
        };

        let parts: Vec<&str> = stem[first_underscore..].split('_').collect();
        let n = parts.len();
        if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
            return self.satisfies(parts[n - 2]) && parts[n - 1] == self.goarch;
        }
        if n >= 1 {
            let last = parts[n - 1];
            if KNOWN_OS.contains(&last) {
                return self.satisfies(last);
            }
            if KNOWN_ARCH.contains(&last) {
                return last == self.goarch;
            }
        }
        true
    }

    /// Whether the constraint lines in the file header allow the file.
    ///
    /// A `//go:build` line takes precedence; legacy `// +build` lines are
    /// only consulted when it is absent. Unparseable expressions exclude
    /// the file, as the Go toolchain does.
    pub fn matches_source(&self, source: &str) -> bool {
        let mut go_build: Option<&str> = None;
        let mut plus_build: Vec<&str> = Vec::new();

        for line in header_lines(source) {
            if let Some(expr) = line.strip_prefix("//go:build") {
                if expr.is_empty() || expr.starts_with(char::is_whitespace) {
                    go_build.get_or_insert(expr.trim());
                }
            } else if let Some(rest) = line.strip_prefix("//") {
                if let Some(expr) = rest.trim_start().strip_prefix("+build") {
                    if expr.is_empty() || expr.starts_with(char::is_whitespace) {
                        plus_build.push(expr.trim());
                    }
                }
            }
        }

        if let Some(expr) = go_build {
            let result = parse_expr(expr).map(|ast| ast.eval(self));
            trace!(expr, ?result, "Evaluated //go:build");
            return result.unwrap_or(false);
        }

        plus_build.iter().all(|line| self.matches_plus_build(line))
    }

    /// `// +build a,b c` means (a AND b) OR c.
    fn matches_plus_build(&self, line: &str) -> bool {
        line.split_whitespace().any(|option| {
            option.split(',').all(|term| match term.strip_prefix('!') {
                Some(tag) => !self.satisfies(tag),
                None => self.satisfies(term),
            })
        })
    }
}

/// Lines before the package clause, trimmed, with blank lines and block
/// comments skipped.
fn header_lines(source: &str) -> impl Iterator<Item = &str> {
    let mut in_block_comment = false;
    source
        .lines()
        .map(str::trim)
        .take_while(|line| !line.starts_with("package ") && *line != "package")
        .filter(move |line| {
            if in_block_comment {
                if line.contains("*/") {
                    in_block_comment = false;
                }
                return false;
            }
            if line.starts_with("/*") {
                in_block_comment = !line.contains("*/");
                return false;
            }
            line.starts_with("//")
        })
}

fn is_release_tag(tag: &str) -> bool {
    let Some(version) = tag.strip_prefix("go") else {
        return false;
    };
    let mut parts = version.split('.');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(major), Some(minor), None)
            if !major.is_empty()
                && !minor.is_empty()
                && major.chars().all(|c| c.is_ascii_digit())
                && minor.chars().all(|c| c.is_ascii_digit())
    )
}

fn host_goos() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn host_goarch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        other => other,
    }
}

/// Parsed `//go:build` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Tag(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    fn eval(&self, ctx: &BuildContext) -> bool {
        match self {
            Expr::Tag(tag) => ctx.satisfies(tag),
            Expr::Not(inner) => !inner.eval(ctx),
            Expr::And(lhs, rhs) => lhs.eval(ctx) && rhs.eval(ctx),
            Expr::Or(lhs, rhs) => lhs.eval(ctx) || rhs.eval(ctx),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Tag(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '&' | '|' => {
                chars.next();
                if chars.next() != Some(c) {
                    return None;
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut tag = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        tag.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Tag(tag));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

fn parse_expr(input: &str) -> Option<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.or()?;
    (parser.pos == parser.tokens.len()).then_some(expr)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn or(&mut self) -> Option<Expr> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Some(lhs)
    }

    fn and(&mut self) -> Option<Expr> {
        let mut lhs = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Some(lhs)
    }

    fn not(&mut self) -> Option<Expr> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Some(Expr::Not(Box::new(self.not()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Option<Expr> {
        let token = self.tokens.get(self.pos)?.clone();
        self.pos += 1;
        match token {
            Token::Tag(tag) => Some(Expr::Tag(tag)),
            Token::Open => {
                let inner = self.or()?;
                if self.peek() != Some(&Token::Close) {
                    return None;
                }
                self.pos += 1;
                Some(inner)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_amd64(tags: &[&str]) -> BuildContext {
        BuildContext::new("linux", "amd64", tags.iter().copied())
    }

    #[test]
    fn file_name_suffixes() {
        let ctx = linux_amd64(&[]);
        assert!(ctx.matches_file_name("widget.go"));
        assert!(ctx.matches_file_name("widget_linux.go"));
        assert!(ctx.matches_file_name("widget_amd64.go"));
        assert!(ctx.matches_file_name("widget_linux_amd64_test.go"));
        assert!(ctx.matches_file_name("linux.go"));
        assert!(!ctx.matches_file_name("widget_windows.go"));
        assert!(!ctx.matches_file_name("widget_arm64.go"));
        assert!(!ctx.matches_file_name("widget_linux_arm64.go"));
        assert!(ctx.matches_file_name("widget_helper.go"));
    }

    #[test]
    fn go_build_expressions() {
        let ctx = linux_amd64(&["integration"]);
        assert!(ctx.matches_source("//go:build linux\n\npackage alpha\n"));
        assert!(ctx.matches_source("//go:build integration && !windows\npackage alpha\n"));
        assert!(!ctx.matches_source("//go:build windows || (darwin && arm64)\npackage alpha\n"));
        assert!(ctx.matches_source("//go:build go1.18\npackage alpha\n"));
        assert!(ctx.matches_source("//go:build unix\npackage alpha\n"));
        assert!(!ctx.matches_source("//go:build ignore\npackage alpha\n"));
    }

    #[test]
    fn malformed_expression_excludes_file() {
        let ctx = linux_amd64(&[]);
        assert!(!ctx.matches_source("//go:build linux &&\npackage alpha\n"));
        assert!(!ctx.matches_source("//go:build (linux\npackage alpha\n"));
    }

    #[test]
    fn legacy_plus_build_lines() {
        let ctx = linux_amd64(&[]);
        assert!(ctx.matches_source("// +build linux,amd64 darwin\n\npackage alpha\n"));
        assert!(!ctx.matches_source("// +build !linux\n\npackage alpha\n"));
        assert!(!ctx.matches_source("// +build linux\n// +build arm\n\npackage alpha\n"));
    }

    #[test]
    fn constraints_after_package_clause_are_ignored() {
        let ctx = linux_amd64(&[]);
        assert!(ctx.matches_source("package alpha\n\n//go:build windows\n"));
        assert!(ctx.matches_source("/*\n//go:build windows\n*/\npackage alpha\n"));
    }

    #[test]
    fn release_tags() {
        assert!(is_release_tag("go1.21"));
        assert!(!is_release_tag("go1"));
        assert!(!is_release_tag("gopher"));
    }
}
