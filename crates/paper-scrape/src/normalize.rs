//! Deterministic text canonicalization for query building and title matching.

use std::sync::LazyLock;

use regex::Regex;

/// Everything that is neither a letter, a digit nor whitespace.
static SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("valid regex"));

static NEWLINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\r\n]").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s").expect("valid regex"));

/// Which transformations [`normalize`] applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Literal substrings removed wherever they occur.
    pub remove: Vec<String>,
    /// Strip non-alphanumeric symbols.
    pub remove_symbols: bool,
    /// Strip `\r` and `\n`.
    pub remove_newlines: bool,
    /// Strip all whitespace.
    pub remove_whitespace: bool,
    /// Fold to lowercase.
    pub lowercase: bool,
}

impl NormalizeOptions {
    /// Options that only strip the given substrings.
    #[must_use]
    pub fn removing<I, S>(substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { remove: substrings.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    /// Options used to compare titles across sources.
    ///
    /// Strips `&amp`, symbols, newlines and whitespace, then lowercases, so an
    /// entity-encoded ampersand and a literal one compare equal.
    #[must_use]
    pub fn title_match() -> Self {
        Self {
            remove: vec!["&amp".to_string()],
            remove_symbols: true,
            remove_newlines: true,
            remove_whitespace: true,
            lowercase: true,
        }
    }
}

/// Canonicalize `text` according to `options`.
///
/// Lowercasing happens first; the removals are then repeated until nothing
/// changes, so removing one pattern can never expose another and
/// `normalize(normalize(x)) == normalize(x)` holds for every input.
#[must_use]
pub fn normalize(text: &str, options: &NormalizeOptions) -> String {
    let (mut out, patterns) = if options.lowercase {
        let patterns: Vec<String> = options.remove.iter().map(|p| p.to_lowercase()).collect();
        (lowercase_fixpoint(text), patterns)
    } else {
        (text.to_string(), options.remove.clone())
    };

    loop {
        let before = out.len();

        for pattern in patterns.iter().filter(|p| !p.is_empty()) {
            while out.contains(pattern.as_str()) {
                out = out.replace(pattern.as_str(), "");
            }
        }
        if options.remove_symbols {
            out = SYMBOL_RE.replace_all(&out, "").into_owned();
        }
        if options.remove_newlines {
            out = NEWLINE_RE.replace_all(&out, "").into_owned();
        }
        if options.remove_whitespace {
            out = WHITESPACE_RE.replace_all(&out, "").into_owned();
        }

        // Every step only deletes, so an unchanged length means a fixpoint.
        if out.len() == before {
            return out;
        }
    }
}

/// A handful of characters lowercase into sequences that lowercase again differently.
fn lowercase_fixpoint(text: &str) -> String {
    let mut out = text.to_lowercase();
    loop {
        let next = out.to_lowercase();
        if next == out {
            return out;
        }
        out = next;
    }
}
