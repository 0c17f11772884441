use crate::errors::ImpactError;

pub const MIN_REQUIREMENT_CHARS: usize = 20;

/// Checked before any request is built; never sent to the backend.
pub fn validate_requirement(text: &str) -> Result<(), ImpactError> {
    let len = text.trim().chars().count();
    if len < MIN_REQUIREMENT_CHARS {
        return Err(ImpactError::Validation(format!(
            "Requirement must be at least {} characters (got {})",
            MIN_REQUIREMENT_CHARS, len
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_requirement_rejected() {
        assert!(matches!(validate_requirement("Add OAuth login"), Err(ImpactError::Validation(_))));
        assert!(validate_requirement("   padded short text      ").is_err());
    }

    #[test]
    fn test_boundary_length_accepted() {
        assert!(validate_requirement(&"x".repeat(20)).is_ok());
        assert!(validate_requirement("Add OAuth login for partner portal users").is_ok());
    }
}
