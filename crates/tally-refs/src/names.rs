//! Ref name validation following git-style conventions.
//!
//! Valid branch names:
//! - Must be non-empty
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..` (double dot) or `@{`
//! - Must not start or end with `.` or `/`
//! - Must not end with `.lock`
//! - Components between slashes must be non-empty and not start with `.`

use crate::error::{RefError, Result};

/// Characters that are forbidden anywhere in a ref name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

/// Placeholder substituted by [`branch_for_coin`].
pub const COIN_PLACEHOLDER: &str = "{coin}";

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a branch name (without the `refs/heads/` prefix).
///
/// ```
/// use tally_refs::names::validate_branch_name;
///
/// assert!(validate_branch_name("coins/gold").is_ok());
/// assert!(validate_branch_name("").is_err());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "name must not be empty"));
    }
    if let Some(ch) = FORBIDDEN_CHARS.iter().find(|ch| name.contains(**ch)) {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }
    if name.contains("@{") {
        return Err(invalid(name, "must not contain '@{'"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(name, "must not start or end with '/'"));
    }
    if name.ends_with('.') {
        return Err(invalid(name, "must not end with '.'"));
    }
    if name.ends_with(".lock") {
        return Err(invalid(name, "must not end with '.lock'"));
    }
    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid(name, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid(
                name,
                format!("component must not start with '.': {component:?}"),
            ));
        }
    }
    Ok(())
}

/// Validate a tag name. Same rules as branch names.
pub fn validate_tag_name(name: &str) -> Result<()> {
    validate_branch_name(name)
}

/// Validate a remote name. Must be a single component.
pub fn validate_remote_name(name: &str) -> Result<()> {
    validate_branch_name(name)?;
    if name.contains('/') {
        return Err(invalid(name, "remote name must not contain '/'"));
    }
    Ok(())
}

/// Validate a canonical ref name such as `refs/heads/coins/gold`.
pub fn validate_ref_name(canonical: &str) -> Result<()> {
    if let Some(rest) = canonical.strip_prefix("refs/heads/") {
        return validate_branch_name(rest);
    }
    if let Some(rest) = canonical.strip_prefix("refs/tags/") {
        return validate_tag_name(rest);
    }
    if let Some(rest) = canonical.strip_prefix("refs/remotes/") {
        let (remote, branch) = rest
            .split_once('/')
            .ok_or_else(|| invalid(canonical, "remote ref needs a branch"))?;
        validate_remote_name(remote)?;
        return validate_branch_name(branch);
    }
    Err(invalid(canonical, "must start with refs/heads/, refs/tags/ or refs/remotes/"))
}

/// Expand a branch template for one coin.
///
/// ```
/// use tally_refs::branch_for_coin;
///
/// assert_eq!(branch_for_coin("coins/{coin}", "gold").unwrap(), "coins/gold");
/// assert!(branch_for_coin("coins/{coin}", "bad coin").is_err());
/// ```
pub fn branch_for_coin(template: &str, coin: &str) -> Result<String> {
    if coin.is_empty() || coin.contains('/') {
        return Err(invalid(coin, "coin must be a single non-empty component"));
    }
    let branch = template.replace(COIN_PLACEHOLDER, coin);
    validate_branch_name(&branch)?;
    Ok(branch)
}
