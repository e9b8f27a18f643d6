use crate::utils::error::{RelayError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(RelayError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| RelayError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("backend.url", "http://localhost:11434").is_ok());
        assert!(validate_url("backend.url", "https://example.com").is_ok());
        assert!(validate_url("backend.url", "").is_err());
        assert!(validate_url("backend.url", "localhost:11434/api").is_err());
        assert!(validate_url("backend.url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("tools.max_retries", 10, 1).is_ok());
        assert!(validate_positive_number("tools.max_retries", 0, 1).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("server.port", 11435u32, 1, 65535).is_ok());
        assert!(validate_range("server.port", 0u32, 1, 65535).is_err());
    }

    #[test]
    fn test_validate_required_field() {
        let present = Some("key".to_string());
        let missing: Option<String> = None;
        assert_eq!(validate_required_field("api_key", &present).unwrap(), "key");
        assert!(matches!(
            validate_required_field("api_key", &missing),
            Err(RelayError::MissingConfigError { .. })
        ));
        assert!(validate_non_empty_string("chat.default_model", "  ").is_err());
    }
}
