//! Tokenizer for Makefile-format dependency fragments.
//!
//! Compilers invoked with `-MMD -MF` emit one rule per object file:
//!
//! ```make
//! main.o: src/main.c include/board.h \
//!   include/uart.h
//! ```
//!
//! The build only cares about the header paths, so the scan treats the file
//! as a flat list of whitespace-delimited tokens and keeps the ones whose
//! extension is in the configured header set. The rule target, the source
//! file and line continuations all fall out of the extension filter.

use std::path::Path;

/// Split `content` into raw Make tokens.
///
/// Runs of whitespace and stray backslashes (line-continuation noise) are
/// skipped between tokens. Inside a token, `\<space>` is an escaped path
/// separator and becomes a literal space; a backslash followed by any other
/// character is kept verbatim.
pub fn tokenize(content: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = content.chars().peekable();

    loop {
        // Skip to the start of the next token
        match chars.peek() {
            None => break,
            Some(&c) if c.is_whitespace() || c == '\\' => {
                chars.next();
                continue;
            }
            Some(_) => {}
        }

        let mut token = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            if c == '\\' {
                chars.next();
                match chars.peek() {
                    Some(' ') => {
                        token.push(' ');
                        chars.next();
                    }
                    Some(&other) => {
                        token.push('\\');
                        token.push(other);
                        chars.next();
                    }
                    None => token.push('\\'),
                }
            } else {
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }

    tokens
}

/// Extract the header paths from a dependency fragment.
///
/// `header_exts` holds extensions without the leading dot (`["h", "hpp"]`).
/// Every other token, including the rule target and the source file itself,
/// is discarded.
pub fn parse_headers(content: &str, header_exts: &[String]) -> Vec<String> {
    tokenize(content)
        .into_iter()
        .filter(|token| match Path::new(token).extension() {
            Some(ext) => header_exts.iter().any(|e| ext == e.as_str()),
            None => false,
        })
        .collect()
}
