use super::error::RoleError;
use thiserror::Error;
use tracing::{debug, warn};

/// Characters with a glob meaning that role patterns do not support.
const UNSUPPORTED_GLOB: &[char] = &['?', '[', ']', '{', '}', '\\'];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("empty role pattern")]
    Empty,
    #[error("unsupported glob character {0:?} in role pattern")]
    Unsupported(char),
}

/// Anchored glob where `*` matches any (possibly empty) sequence of characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePattern {
    // Literal text between the stars; always at least two entries.
    parts: Vec<String>,
}

impl RolePattern {
    /// Compile a pattern containing at least one `*`.
    ///
    /// # Errors
    /// Returns a [`PatternError`] for an empty pattern or one using glob syntax
    /// other than `*`.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let pattern = pattern.trim();

        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }

        if let Some(c) = pattern.chars().find(|c| UNSUPPORTED_GLOB.contains(c)) {
            return Err(PatternError::Unsupported(c));
        }

        Ok(Self {
            parts: pattern.split('*').map(str::to_string).collect(),
        })
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let Some((first, rest)) = self.parts.split_first() else {
            return false;
        };

        let Some((last, middle)) = rest.split_last() else {
            // No star at all: plain equality
            return name == first;
        };

        if name.len() < first.len() + last.len() {
            return false;
        }

        let Some(remainder) = name
            .strip_prefix(first.as_str())
            .and_then(|r| r.strip_suffix(last.as_str()))
        else {
            return false;
        };

        // Leftmost match of each middle literal is always safe for `*`-only globs
        let mut remainder = remainder;
        for part in middle {
            match remainder.find(part.as_str()) {
                Some(index) => remainder = &remainder[index + part.len()..],
                None => return false,
            }
        }

        true
    }
}

/// Check if the role name in the verification response satisfies
/// `allowed_roles`, a comma separated list of role names and `*` patterns.
///
/// # Errors
/// Returns a [`RoleError`] if no policy is configured, the response carries no
/// role name, or no entry matches.
pub fn validate_role_name(role_name: &str, allowed_roles: &str) -> Result<(), RoleError> {
    if allowed_roles.trim().is_empty() {
        return Err(RoleError::MissingPolicy);
    }

    if allowed_roles == "*" {
        return Ok(());
    }

    let role_name = role_name.trim();
    if role_name.is_empty() {
        return Err(RoleError::MissingRoleName);
    }

    for role in allowed_roles.split(',').map(str::trim) {
        if role == role_name {
            return Ok(());
        }

        if role.contains('*') {
            let pattern = match RolePattern::compile(role) {
                Ok(pattern) => pattern,
                Err(e) => {
                    warn!("skipping allowed role {:?}: {}", role, e);
                    continue;
                }
            };

            if pattern.matches(role_name) {
                debug!("{} matches {}", role, role_name);
                return Ok(());
            }
        }
    }

    Err(RoleError::NoRoleMatch {
        role: role_name.to_string(),
    })
}
