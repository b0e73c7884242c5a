use crate::error::ApiError;

/// Trimmed value of a required text field.
pub fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(format!("{} is required", field)));
    }
    Ok(value)
}

/// Blank optional fields are stored as NULL.
pub fn optional(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
