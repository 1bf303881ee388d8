//! Cleanup of assembly-qualified type names.
//!
//! System class members carry names such as
//!
//! ```text
//! System.Collections.Generic.Dictionary`2[[System.String, mscorlib, Version=4.0.0.0,
//!     Culture=neutral, PublicKeyToken=b77a5c561934e089],[NS.Item, Assembly-CSharp]]
//! ```
//!
//! which [`clean_type_name`] turns into
//! `System.Collections.Generic.Dictionary<String, NS.Item>`.
//!
//! Grammar, parsed by recursive descent:
//!
//! ```text
//! qualified := type ( ',' assembly-qualifier )?
//! type      := base ( '`' arity args )? rank*
//! args      := '[' '[' qualified ']' ( ',' '[' qualified ']' )* ']'
//! rank      := '[' ','* ']'
//! ```
//!
//! Assembly qualifiers (assembly name, version, culture, public key token) are
//! dropped at every nesting level. The number of parsed arguments must equal
//! the declared arity, and generic arguments may nest at most
//! [`MAX_GENERIC_DEPTH`] levels deep.

use crate::error::{Error, Result};

const SYSTEM_PREFIX: &str = "System.";

/// Deepest generic argument nesting accepted by [`clean_type_name`]
pub const MAX_GENERIC_DEPTH: usize = 32;

/// Strips assembly qualifiers and rewrites generic arity markers as `<...>`
pub fn clean_type_name(raw: &str) -> Result<String> {
    clean_at_depth(raw, 0)
}

fn clean_at_depth(raw: &str, depth: usize) -> Result<String> {
    if depth > MAX_GENERIC_DEPTH {
        return Err(Error::invalid_type_name(raw, "generic nesting too deep"));
    }

    let name = strip_assembly_qualifier(raw).trim();
    if name.is_empty() {
        return Err(Error::invalid_type_name(raw, "empty type name"));
    }

    let Some(tick) = name.find('`') else {
        check_rank_suffix(raw, name.find('[').map_or("", |open| &name[open..]))?;
        return Ok(simplify_system_name(name).to_string());
    };

    let base = &name[..tick];
    let rest = &name[tick + 1..];

    let digits = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits == 0 {
        return Err(Error::invalid_type_name(raw, "missing generic arity"));
    }
    let arity: usize = rest[..digits]
        .parse()
        .map_err(|_| Error::invalid_type_name(raw, "generic arity out of range"))?;

    let list = &rest[digits..];
    if !list.starts_with('[') {
        return Err(Error::invalid_type_name(
            raw,
            "expected '[' after generic arity",
        ));
    }

    let (arguments, consumed) = split_arguments(raw, list)?;
    if arguments.len() != arity {
        return Err(Error::invalid_type_name(
            raw,
            format!(
                "declared arity {} but found {} arguments",
                arity,
                arguments.len()
            ),
        ));
    }

    let suffix = &list[consumed..];
    check_rank_suffix(raw, suffix)?;

    let cleaned = arguments
        .into_iter()
        .map(|argument| clean_at_depth(argument, depth + 1))
        .collect::<Result<Vec<_>>>()?;

    Ok(format!(
        "{}<{}>{}",
        simplify_system_name(base),
        cleaned.join(", "),
        suffix
    ))
}

/// Cuts the name at its first comma outside any brackets
fn strip_assembly_qualifier(name: &str) -> &str {
    let mut depth = 0usize;
    for (i, c) in name.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return &name[..i],
            _ => {}
        }
    }
    name
}

/// Splits `[[A],[B],...]` into its top-level arguments
///
/// Returns the argument texts and the number of bytes consumed, closing
/// bracket included.
fn split_arguments<'a>(raw: &str, list: &'a str) -> Result<(Vec<&'a str>, usize)> {
    let bytes = list.as_bytes();
    let mut arguments = Vec::new();
    let mut pos = 1;

    loop {
        if bytes.get(pos) != Some(&b'[') {
            return Err(Error::invalid_type_name(
                raw,
                "expected '[' to open a generic argument",
            ));
        }
        let close = matching_bracket(bytes, pos)
            .ok_or_else(|| Error::invalid_type_name(raw, "unmatched '['"))?;
        arguments.push(&list[pos + 1..close]);
        pos = close + 1;

        match bytes.get(pos) {
            Some(b',') => pos += 1,
            Some(b']') => return Ok((arguments, pos + 1)),
            _ => {
                return Err(Error::invalid_type_name(
                    raw,
                    "unterminated generic argument list",
                ))
            }
        }
    }
}

/// Index of the `]` closing the `[` at `open`
fn matching_bracket(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Accepts only array rank markers such as `[]` or `[,][]`
fn check_rank_suffix(raw: &str, suffix: &str) -> Result<()> {
    let mut rest = suffix;
    while !rest.is_empty() {
        let Some(inner) = rest.strip_prefix('[') else {
            return Err(Error::invalid_type_name(raw, "unexpected trailing text"));
        };
        let Some(close) = inner.find(']') else {
            return Err(Error::invalid_type_name(raw, "unmatched '['"));
        };
        if !inner[..close].bytes().all(|b| b == b',') {
            return Err(Error::invalid_type_name(raw, "malformed array rank"));
        }
        rest = &inner[close + 1..];
    }
    Ok(())
}

/// `System.X` becomes `X` when `X` sits directly in the System namespace
fn simplify_system_name(name: &str) -> &str {
    match name.strip_prefix(SYSTEM_PREFIX) {
        Some(rest) if !rest.split('[').next().unwrap_or(rest).contains('.') => rest,
        _ => name,
    }
}
