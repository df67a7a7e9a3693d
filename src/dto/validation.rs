//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest display name accepted from clients, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 32;
/// Room ids are 16 lowercase hexadecimal characters.
pub const ROOM_ID_LEN: usize = 16;

/// Validates that a display name is non-blank and at most [`MAX_DISPLAY_NAME_CHARS`] characters.
///
/// # Examples
///
/// ```ignore
/// validate_display_name("Mania") // Ok
/// validate_display_name("   ")   // Err - blank
/// ```
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("Display name must not be blank".into());
        return Err(err);
    }

    let chars = name.chars().count();
    if chars > MAX_DISPLAY_NAME_CHARS {
        let mut err = ValidationError::new("display_name_length");
        err.message = Some(
            format!("Display name must be at most {MAX_DISPLAY_NAME_CHARS} characters (got {chars})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that a room id is exactly [`ROOM_ID_LEN`] lowercase hexadecimal characters.
pub fn validate_room_id(id: &str) -> Result<(), ValidationError> {
    if id.len() != ROOM_ID_LEN {
        let mut err = ValidationError::new("room_id_length");
        err.message = Some(
            format!(
                "Room ID must be exactly {ROOM_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    {
        let mut err = ValidationError::new("room_id_format");
        err.message = Some("Room ID must contain only lowercase hexadecimal characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates optional free-text profile fields (status, country).
pub fn validate_profile_text(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() > 64 {
        let mut err = ValidationError::new("profile_text_length");
        err.message = Some("Profile text fields must be at most 64 characters".into());
        return Err(err);
    }
    Ok(())
}
