//! The signed-in user's own profile.

use axum::extract::State;

use crate::db::UserRepository;
use crate::error::{AppError, AppJson, Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::models::user::{ProfileUpdate, User};
use crate::response::ApiResponse;
use crate::services::auth::validate_name;
use crate::state::AppState;

/// Trim names and reject blank ones before they reach the database.
pub(crate) fn validate_profile(mut update: ProfileUpdate) -> Result<ProfileUpdate> {
    if let Some(first_name) = update.first_name.as_deref() {
        update.first_name = Some(validate_name(first_name, "first name")?);
    }
    if let Some(last_name) = update.last_name.as_deref() {
        update.last_name = Some(validate_name(last_name, "last name")?);
    }
    if update
        .monthly_income
        .is_some_and(|income| income.is_sign_negative())
    {
        return Err(AppError::BadRequest(
            "monthlyIncome cannot be negative".to_string(),
        ));
    }
    Ok(update)
}

/// # Route
///
/// `GET /api/users/me`
pub async fn me(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<ApiResponse<User>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(ApiResponse::ok(user))
}

/// Update several profile fields at once. Email and phone cannot change here.
///
/// # Route
///
/// `PATCH /api/users/me`
pub async fn update_me(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    AppJson(update): AppJson<ProfileUpdate>,
) -> Result<ApiResponse<User>> {
    if update.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }
    let update = validate_profile(update)?;
    let user = UserRepository::new(state.pool())
        .update_profile(current.id, &update)
        .await?;
    add_breadcrumb("profile", "Profile updated", &[("user_id", &user.id.to_string())]);
    Ok(ApiResponse::ok(user))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_names_are_trimmed() {
        let update = validate_profile(ProfileUpdate {
            first_name: Some("  Chidi ".to_string()),
            ..ProfileUpdate::default()
        })
        .expect("valid update");
        assert_eq!(update.first_name.as_deref(), Some("Chidi"));
    }

    #[test]
    fn test_blank_name_and_negative_income_are_rejected() {
        assert!(
            validate_profile(ProfileUpdate {
                last_name: Some("   ".to_string()),
                ..ProfileUpdate::default()
            })
            .is_err()
        );
        assert!(
            validate_profile(ProfileUpdate {
                monthly_income: Some(Decimal::new(-1, 0)),
                ..ProfileUpdate::default()
            })
            .is_err()
        );
    }

    #[test]
    fn test_email_cannot_be_changed_here() {
        let parsed: std::result::Result<ProfileUpdate, _> =
            serde_json::from_str(r#"{"email":"new@example.com"}"#);
        assert!(parsed.is_err());
    }
}
