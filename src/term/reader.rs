//! A minimal s-expression reader, compiled for tests, the `kif-text`
//! feature, and the `serde` feature (which round-trips `Term` through its
//! `kif_string()` text form).
//!
//! This is deliberately not the textual-KIF-parsing collaborator spec.md
//! §1 treats as out of scope: it understands bare atoms, `?`-variables,
//! and parenthesized lists only (no comments, strings, or numeric
//! literals). It exists so tests and examples can write
//! `read_kif("(instance Rex Dog)")` instead of building `Term`s by hand,
//! and so `Term`'s `Deserialize` impl has something to parse; nothing on
//! the `submit_potential_assertion`/`submit_rule` path calls it.

use crate::term::Term;

/// Parse a single KIF term from `input`. Panics on malformed input — this
/// is test/example tooling, not a production entry point.
pub fn read_kif(input: &str) -> Term {
    try_read_kif(input).unwrap_or_else(|e| panic!("{e}"))
}

/// As [`read_kif`], returning a `Result` instead of panicking. Used by
/// `Term`'s `serde::Deserialize` impl, where malformed input must surface
/// as a deserialization error rather than a panic.
pub fn try_read_kif(input: &str) -> Result<Term, String> {
    let tokens = tokenize(input);
    let mut pos = 0;
    if tokens.is_empty() {
        return Err(format!("empty input, expected a KIF term in {input:?}"));
    }
    let term = parse_term(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(format!("trailing tokens after term in {input:?}"));
    }
    Ok(term)
}

/// Parse every top-level term in `input` (for rule-store callers that
/// submit several facts/rules from one fixture string). Panics on
/// malformed input — test/example tooling, not a production entry point.
pub fn read_kif_all(input: &str) -> Vec<Term> {
    let tokens = tokenize(input);
    let mut pos = 0;
    let mut out = Vec::new();
    while pos < tokens.len() {
        out.push(parse_term(&tokens, &mut pos).unwrap_or_else(|e| panic!("{e}")));
    }
    out
}

#[derive(Debug, PartialEq, Eq)]
enum Tok {
    LParen,
    RParen,
    Atom(String),
}

fn tokenize(input: &str) -> Vec<Tok> {
    let mut out = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                out.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                out.push(Tok::RParen);
            }
            _ => {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' {
                        break;
                    }
                    s.push(c);
                    chars.next();
                }
                out.push(Tok::Atom(s));
            }
        }
    }
    out
}

fn parse_term(tokens: &[Tok], pos: &mut usize) -> Result<Term, String> {
    match tokens.get(*pos) {
        Some(Tok::LParen) => {
            *pos += 1;
            let mut items = Vec::new();
            loop {
                match tokens.get(*pos) {
                    Some(Tok::RParen) => break,
                    Some(_) => items.push(parse_term(tokens, pos)?),
                    None => return Err("unexpected end of input inside list".to_string()),
                }
            }
            *pos += 1;
            Ok(Term::list(items))
        }
        Some(Tok::RParen) => Err(format!("unexpected ')' at token {pos}")),
        Some(Tok::Atom(s)) => {
            *pos += 1;
            if s.starts_with('?') && s.len() >= 2 {
                Ok(Term::variable(s.as_str()))
            } else {
                Ok(Term::atom(s.as_str()))
            }
        }
        None => Err("unexpected end of input".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_flat_fact() {
        let t = read_kif("(instance Rex Dog)");
        assert_eq!(t.kif_string(), "(instance Rex Dog)");
    }

    #[test]
    fn reads_variables() {
        let t = read_kif("(=> (instance ?x Dog) (instance ?x Mammal))");
        assert_eq!(t.operator(), Some("=>"));
        assert!(t.contains_variable());
    }

    #[test]
    fn reads_several_top_level_terms() {
        let terms = read_kif_all("(P a) (Q a)");
        assert_eq!(terms.len(), 2);
    }

    #[test]
    fn try_read_kif_reports_unbalanced_parens() {
        assert!(try_read_kif("(instance Rex Dog").is_err());
        assert!(try_read_kif("instance Rex Dog)").is_err());
    }
}
