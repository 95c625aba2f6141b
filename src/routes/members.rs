//! Member self-service. `/member/modify` is where the success handler sends
//! social members still carrying the placeholder credential.

use rocket::form::Form;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::openapi;

use crate::auth::{AuthState, SessionUser};
use crate::db::ClubDb;
use crate::error::ApiError;
use crate::models::MemberSummary;

/// Shows the signed-in member their profile; landing spot of the
/// account-completion redirect.
#[openapi(tag = "Members")]
#[get("/member/modify?<from>")]
pub fn modify_prompt(user: SessionUser, from: Option<String>) -> Json<MemberSummary> {
    if from.as_deref() == Some("social") {
        log::info!(
            "social member {} prompted to set a permanent password",
            user.0.email()
        );
    }
    Json(MemberSummary::from(&user.0))
}

#[derive(rocket::form::FromForm)]
pub struct PasswordChangeForm {
    pub pw: String,
}

/// Replace the member's credential with a freshly hashed password.
#[openapi(skip)]
#[post("/member/modify", data = "<form>")]
pub async fn modify_password(
    user: SessionUser,
    state: &State<AuthState>,
    mut db: Connection<ClubDb>,
    form: Form<PasswordChangeForm>,
) -> Result<&'static str, ApiError> {
    let form = form.into_inner();
    if form.pw.trim().is_empty() {
        return Err(ApiError::BadRequest("password cannot be empty".into()));
    }

    let hash = state
        .password_service
        .hash_password(&form.pw)
        .map_err(|err| ApiError::InternalError(err.to_string()))?;

    let result = sqlx::query("UPDATE members SET password_hash = $1 WHERE email = $2")
        .bind(&hash)
        .bind(user.0.email())
        .execute(&mut **db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!(
            "Member {} not found",
            user.0.email()
        )));
    }

    log::info!("member {} updated their password", user.0.email());
    Ok("modified")
}
