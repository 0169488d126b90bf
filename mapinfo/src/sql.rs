//! SQL construction for map information queries.
//!
//! Identifiers from configuration are validated and interpolated; the click
//! position and SRID are always bound as parameters. Statements are written
//! with named placeholders (`:x`, `:y`, `:srid`) which [`bind_placeholders`]
//! rewrites into PostgreSQL's positional `$n` form.

use std::fmt;

use crate::config::{QueryKind, StructuredQuery};
use crate::error::{MapInfoError, Result};
use crate::params::{Position, Srid};

/// PostgreSQL truncates identifiers longer than this.
const MAX_IDENTIFIER_LEN: usize = 63;

/// A parameter value bound to a positional placeholder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SqlParam {
    Float(f64),
    Int(i32),
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlParam::Float(v) => write!(f, "{v}"),
            SqlParam::Int(v) => write!(f, "{v}"),
        }
    }
}

/// A statement ready for execution: positional SQL plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// Check that `identifier` is a plain, unquoted SQL identifier.
///
/// # Examples
///
/// ```
/// use mapinfo::sql::validate_identifier;
///
/// assert!(validate_identifier("ne_10m_admin_0_countries").is_ok());
/// assert!(validate_identifier("name; --").is_err());
/// assert!(validate_identifier("1st").is_err());
/// ```
pub fn validate_identifier(identifier: &str) -> Result<()> {
    let mut chars = identifier.chars();
    let valid = identifier.len() <= MAX_IDENTIFIER_LEN
        && chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    if valid {
        Ok(())
    } else {
        Err(MapInfoError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

/// Render the containment lookup for a structured query.
///
/// The click point is reprojected into the geometry column's SRID as
/// registered in `geometry_columns`.
pub fn structured_sql(query: &StructuredQuery) -> String {
    let table = query.table.qualified();
    let extra_where = query
        .extra_where
        .as_deref()
        .map(|clause| format!(" AND ({clause})"))
        .unwrap_or_default();

    format!(
        "SELECT {display} FROM {table} \
         WHERE ST_Contains({table}.{geom}, \
         ST_Transform(ST_SetSRID(ST_Point(:x, :y), :srid), \
         Find_SRID('{schema}', '{table_name}', '{geom}'))){extra_where} \
         LIMIT 1",
        display = query.display_column,
        geom = query.geometry_column,
        schema = query.table.schema,
        table_name = query.table.table,
    )
}

/// Rewrite named placeholders to `$n` and collect the matching parameters.
///
/// Placeholders are numbered in order of first appearance; a placeholder
/// used twice binds once. Casts (`::`), quoted strings and identifiers, and
/// `--` comments are copied unchanged.
///
/// # Errors
///
/// Returns [`MapInfoError::UnknownParameter`] for placeholders other than
/// `:x`, `:y` and `:srid`.
///
/// # Examples
///
/// ```
/// use mapinfo::params::{Position, Srid};
/// use mapinfo::sql::{bind_placeholders, SqlParam};
///
/// let srid = Srid::new(3857).unwrap();
/// let query = bind_placeholders(
///     "SELECT ST_SetSRID(ST_Point(:x, :y), :srid)::geometry",
///     Position::new(1.0, 2.0),
///     srid,
/// ).unwrap();
/// assert_eq!(query.sql, "SELECT ST_SetSRID(ST_Point($1, $2), $3)::geometry");
/// assert_eq!(query.params, vec![SqlParam::Float(1.0), SqlParam::Float(2.0), SqlParam::Int(3857)]);
/// ```
pub fn bind_placeholders(sql: &str, position: Position, srid: Srid) -> Result<BoundQuery> {
    let lookup = |name: &str| match name {
        "x" => Some(SqlParam::Float(position.x)),
        "y" => Some(SqlParam::Float(position.y)),
        "srid" => Some(SqlParam::Int(srid.code())),
        _ => None,
    };

    let mut out = String::with_capacity(sql.len() + 8);
    let mut names: Vec<&str> = Vec::new();
    let mut params = Vec::new();

    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                let end = find_closing_quote(bytes, i + 1, quote);
                out.push_str(&sql[i..end]);
                i = end;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                let end = sql[i..].find('\n').map_or(sql.len(), |n| i + n);
                out.push_str(&sql[i..end]);
                i = end;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                out.push_str("::");
                i += 2;
            }
            b':' if bytes.get(i + 1).is_some_and(|b| is_name_start(*b)) => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && is_name_char(bytes[end]) {
                    end += 1;
                }
                let name = &sql[start..end];
                let index = match names.iter().position(|n| *n == name) {
                    Some(index) => index,
                    None => {
                        let param = lookup(name).ok_or_else(|| MapInfoError::UnknownParameter {
                            name: name.to_string(),
                        })?;
                        names.push(name);
                        params.push(param);
                        names.len() - 1
                    }
                };
                out.push('$');
                out.push_str(&(index + 1).to_string());
                i = end;
            }
            _ => {
                let ch_len = utf8_len(bytes[i]);
                out.push_str(&sql[i..i + ch_len]);
                i += ch_len;
            }
        }
    }

    Ok(BoundQuery { sql: out, params })
}

/// Build the executable statement for a configured query.
pub fn build_query(kind: &QueryKind, position: Position, srid: Srid) -> Result<BoundQuery> {
    match kind {
        QueryKind::Structured(query) => bind_placeholders(&structured_sql(query), position, srid),
        QueryKind::Raw { sql } => bind_placeholders(sql, position, srid),
    }
}

/// Index just past the quote closing a literal opened before `start`.
/// Doubled quotes are escapes. An unterminated literal runs to the end.
fn find_closing_quote(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn utf8_len(first: u8) -> usize {
    match first {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}
