use crate::error::{EngineError, EngineResult};

/// Hard limit PostgreSQL imposes on identifier length (NAMEDATALEN - 1).
const MAX_IDENT_LEN: usize = 63;

/// PostgreSQL reserved keywords that can never be used bare as a table or
/// column name. Subset of the full reserved list covering everything that
/// could appear in the statements this engine emits.
const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc",
    "asymmetric", "both", "case", "cast", "check", "collate", "column",
    "constraint", "create", "current_catalog", "current_date", "current_role",
    "current_time", "current_timestamp", "current_user", "default",
    "deferrable", "desc", "distinct", "do", "else", "end", "except", "false",
    "fetch", "for", "foreign", "from", "grant", "group", "having", "in",
    "initially", "intersect", "into", "lateral", "leading", "limit",
    "localtime", "localtimestamp", "not", "null", "offset", "on", "only",
    "or", "order", "placing", "primary", "references", "returning", "select",
    "session_user", "some", "symmetric", "table", "then", "to", "trailing",
    "true", "union", "unique", "user", "using", "variadic", "when", "where",
    "window", "with",
];

/// Validate a user-supplied identifier before it is spliced into SQL text.
///
/// Identifiers cannot be parameter-bound, so this allow-list is the injection
/// defense: `[a-z_][a-z0-9_]*`, at most 63 bytes, not a reserved keyword.
/// Every statement builder takes identifiers that have passed through here.
pub fn validate(name: &str) -> EngineResult<&str> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some('a'..='z' | '_'));
    let valid_rest = chars.all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'));

    if !valid_start || !valid_rest || name.len() > MAX_IDENT_LEN {
        return Err(EngineError::InvalidIdentifier(name.to_string()));
    }
    if RESERVED.binary_search(&name).is_ok() {
        return Err(EngineError::InvalidIdentifier(name.to_string()));
    }
    Ok(name)
}

/// Canonicalize a free-form table label into an identifier, then validate it.
///
/// Labels come from UI text fields ("Order Items"), so they are lowercased
/// and whitespace runs collapse to a single underscore. Column names are NOT
/// canonicalized (they round-trip to UI labels verbatim) and go through
/// [`validate`] directly.
pub fn canonicalize_table_label(label: &str) -> EngineResult<String> {
    let mut out = String::with_capacity(label.len());
    let mut last_was_sep = false;
    for c in label.trim().chars() {
        if c.is_whitespace() {
            if !last_was_sep && !out.is_empty() {
                out.push('_');
            }
            last_was_sep = true;
        } else {
            out.extend(c.to_lowercase());
            last_was_sep = false;
        }
    }
    validate(&out)?;
    Ok(out)
}
