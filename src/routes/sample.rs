//! Role-demo endpoints: the pure `has_role` check applied at the routing
//! layer.

use rocket::get;
use rocket::serde::json::Json;
use rocket_okapi::openapi;

use crate::auth::SessionUser;
use crate::auth::principal::MemberRole;
use crate::error::ApiError;
use crate::models::MemberSummary;

#[openapi(tag = "Sample")]
#[get("/sample/all")]
pub fn sample_all() -> &'static str {
    "for all"
}

#[openapi(tag = "Sample")]
#[get("/sample/member")]
pub fn sample_member(user: SessionUser) -> Result<Json<MemberSummary>, ApiError> {
    if !user.0.has_role(MemberRole::User) {
        return Err(ApiError::Forbidden("ROLE_USER required".into()));
    }
    Ok(Json(MemberSummary::from(&user.0)))
}

#[openapi(tag = "Sample")]
#[get("/sample/admin")]
pub fn sample_admin(user: SessionUser) -> Result<Json<MemberSummary>, ApiError> {
    if !user.0.has_role(MemberRole::Admin) {
        return Err(ApiError::Forbidden("ROLE_ADMIN required".into()));
    }
    Ok(Json(MemberSummary::from(&user.0)))
}
