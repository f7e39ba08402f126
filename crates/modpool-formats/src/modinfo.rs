//! modinfo descriptor parser
//!
//! A mod's tree may carry a small descriptor of the form
//!
//! ```text
//! return {
//!     name = 'Total Annihilation',
//!     version = '$VERSION',
//!     depend_level = 3,
//! }
//! ```
//!
//! The grammar is deliberately strict: a single `return { ... }`
//! block whose body is `identifier = value` entries separated by
//! commas or newlines, where a value is either a single-quoted
//! string (no escapes, no embedded quotes) or an unsigned decimal
//! integer. Anything else is a parse failure; this is not a general
//! expression language.

use std::collections::HashMap;

use crate::{Error, Result};

/// Parsed modinfo descriptor.
#[derive(Debug, Clone, Default)]
pub struct Modinfo {
    values: HashMap<String, String>,
}

impl Modinfo {
    /// Parse a descriptor from its full file content.
    pub fn parse(input: &str) -> Result<Self> {
        let mut rest = block_body(input)?;

        let mut values = HashMap::new();
        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }

            let (key, value, after) = parse_entry(rest)?;
            values.insert(key, value);

            // An entry ends at a comma, a newline, or the end of the
            // body; anything else on the same line is a failure.
            let after_inline = after.trim_start_matches([' ', '\t']);
            rest = if let Some(next) = after_inline.strip_prefix(',') {
                next
            } else if after_inline.is_empty() || after_inline.starts_with('\n')
                || after_inline.starts_with('\r')
            {
                after_inline
            } else {
                return Err(entry_error(after_inline));
            };
        }

        Ok(Self { values })
    }

    /// Look up an entry by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// The mod's display name, if declared.
    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    /// The mod's version string, if declared.
    pub fn version(&self) -> Option<&str> {
        self.get("version")
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the descriptor declared no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Replace every occurrence of the literal `$VERSION` token.
///
/// The ingestion pipeline resolves the token to the upstream tag, or
/// to a `test-<count>-<short_rev>` placeholder for untagged
/// revisions, before parsing and before snapshotting the tree.
pub fn substitute_version(input: &str, version: &str) -> String {
    input.replace("$VERSION", version)
}

/// Strip the `return { ... }` wrapper and hand back the body.
fn block_body(input: &str) -> Result<&str> {
    let trimmed = input.trim();
    let rest = trimmed.strip_prefix("return").ok_or(Error::ModinfoShape)?;
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('{').ok_or(Error::ModinfoShape)?;
    let rest = rest.trim_end();
    rest.strip_suffix('}').ok_or(Error::ModinfoShape)
}

/// Parse one `identifier = value` entry at the start of `input`.
/// Returns the key, the value, and the unconsumed remainder.
fn parse_entry(input: &str) -> Result<(String, String, &str)> {
    let bad = || entry_error(input);

    let ident_len = input
        .char_indices()
        .take_while(|&(i, c)| {
            if i == 0 {
                c.is_ascii_alphabetic() || c == '_'
            } else {
                c.is_ascii_alphanumeric() || c == '_'
            }
        })
        .count();
    if ident_len == 0 {
        return Err(bad());
    }
    let (key, rest) = input.split_at(ident_len);

    let rest = rest.trim_start_matches([' ', '\t']);
    let rest = rest.strip_prefix('=').ok_or_else(bad)?;
    let rest = rest.trim_start_matches([' ', '\t']);

    let (value, rest) = if let Some(quoted) = rest.strip_prefix('\'') {
        let close = quoted.find('\'').ok_or_else(bad)?;
        (&quoted[..close], &quoted[close + 1..])
    } else {
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            return Err(bad());
        }
        rest.split_at(digits)
    };

    Ok((key.to_string(), value.to_string(), rest))
}

/// Failure at some point in the body; report the offending line.
fn entry_error(at: &str) -> Error {
    let line = at.lines().next().unwrap_or(at).trim();
    Error::ModinfoEntry(line.to_string())
}
