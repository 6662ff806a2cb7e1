//! Admin customer management.

use axum::extract::State;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ubuntu_lend_core::{Email, PhoneNumber, UserId, UserStatus};

use crate::db::{ApplicationRepository, UserRepository};
use crate::error::{AppError, AppJson, AppPath, AppQuery, Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::models::application::Application;
use crate::models::user::{AdminUserUpdate, CustomerSummary, ProfileUpdate, User};
use crate::response::ApiResponse;
use crate::routes::params::CustomerQuery;
use crate::routes::users::validate_profile;
use crate::state::AppState;

/// A customer together with their applications.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub user: User,
    pub applications: Vec<Application>,
}

/// Admin edit of a customer account.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCustomerRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Country calling code for `phone`; omit when `phone` starts with `+`.
    pub country_code: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub national_id: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub employment_status: Option<String>,
    pub employer_name: Option<String>,
    pub monthly_income: Option<Decimal>,
    pub is_admin: Option<bool>,
    pub status: Option<UserStatus>,
}

impl UpdateCustomerRequest {
    fn into_update(self) -> Result<AdminUserUpdate> {
        let email = self.email.as_deref().map(Email::parse).transpose()?;
        let phone = self
            .phone
            .as_deref()
            .map(|phone| PhoneNumber::parse(self.country_code.as_deref().unwrap_or_default(), phone))
            .transpose()?;

        let profile = ProfileUpdate {
            first_name: self.first_name,
            last_name: self.last_name,
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            national_id: self.national_id,
            address: self.address,
            city: self.city,
            country: self.country,
            employment_status: self.employment_status,
            employer_name: self.employer_name,
            monthly_income: self.monthly_income,
        };

        let update = AdminUserUpdate {
            profile: validate_profile(profile)?,
            email,
            phone,
            is_admin: self.is_admin,
            status: self.status,
        };
        if update.is_empty() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }
        Ok(update)
    }
}

/// # Route
///
/// `GET /api/admin/users`
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    AppQuery(query): AppQuery<CustomerQuery>,
) -> Result<ApiResponse<Vec<CustomerSummary>>> {
    let page = query.page_request();
    let customers = UserRepository::new(state.pool())
        .list_customers(&query.filter(), page)
        .await?;
    Ok(ApiResponse::page(customers, page))
}

/// # Route
///
/// `GET /api/admin/users/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    AppPath(id): AppPath<i32>,
) -> Result<ApiResponse<CustomerDetail>> {
    let id = UserId::new(id);
    let user = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let applications = ApplicationRepository::new(state.pool())
        .list_for_user(id)
        .await?;
    Ok(ApiResponse::ok(CustomerDetail { user, applications }))
}

/// # Route
///
/// `PATCH /api/admin/users/{id}`
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    AppPath(id): AppPath<i32>,
    AppJson(request): AppJson<UpdateCustomerRequest>,
) -> Result<ApiResponse<User>> {
    let update = request.into_update()?;
    let user = UserRepository::new(state.pool())
        .update(UserId::new(id), &update)
        .await?;
    tracing::info!(admin_id = %admin.id, user_id = %user.id, "Customer updated");
    add_breadcrumb("admin", "Customer updated", &[("user_id", &user.id.to_string())]);
    Ok(ApiResponse::ok(user))
}

/// Soft-delete a customer. Admins cannot delete themselves.
///
/// # Route
///
/// `DELETE /api/admin/users/{id}`
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    AppPath(id): AppPath<i32>,
) -> Result<ApiResponse<()>> {
    let id = UserId::new(id);
    if id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }
    UserRepository::new(state.pool()).soft_delete(id).await?;
    tracing::info!(admin_id = %admin.id, user_id = %id, "Customer deleted");
    Ok(ApiResponse::ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_only_update_is_accepted() {
        let update = UpdateCustomerRequest {
            is_admin: Some(true),
            ..UpdateCustomerRequest::default()
        }
        .into_update()
        .expect("valid update");
        assert_eq!(update.is_admin, Some(true));
        assert!(update.profile.is_empty());
    }

    #[test]
    fn test_contact_fields_are_normalized() {
        let update = UpdateCustomerRequest {
            email: Some(" Zola@Example.COM ".to_string()),
            phone: Some("0712 345 678".to_string()),
            country_code: Some("+254".to_string()),
            ..UpdateCustomerRequest::default()
        }
        .into_update()
        .expect("valid update");
        assert_eq!(update.email.as_ref().map(Email::as_str), Some("zola@example.com"));
        assert_eq!(
            update.phone.as_ref().map(PhoneNumber::as_str),
            Some("+254712345678")
        );
    }

    #[test]
    fn test_empty_or_invalid_update_is_rejected() {
        assert!(UpdateCustomerRequest::default().into_update().is_err());
        assert!(
            UpdateCustomerRequest {
                email: Some("not-an-email".to_string()),
                ..UpdateCustomerRequest::default()
            }
            .into_update()
            .is_err()
        );
    }
}
