//! Membership CRUD. Plain data-access shims over the `memberships` table.

use rocket::serde::json::Json;
use rocket::{get, post, put};
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::openapi;

use crate::db::ClubDb;
use crate::error::ApiError;
use crate::models::{Membership, PointRequest};

/// Register (or overwrite) a membership for a user.
#[openapi(tag = "Memberships")]
#[post("/membership", data = "<payload>")]
pub async fn register_membership(
    mut db: Connection<ClubDb>,
    payload: Json<Membership>,
) -> Result<Json<Membership>, ApiError> {
    let membership = payload.into_inner();

    sqlx::query(
        "INSERT INTO memberships (user_id, membership_id, membership_name, membership_status, point) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (user_id, membership_id) DO UPDATE SET \
             membership_name = EXCLUDED.membership_name, \
             membership_status = EXCLUDED.membership_status, \
             point = EXCLUDED.point",
    )
    .bind(&membership.user_id)
    .bind(&membership.membership_id)
    .bind(&membership.membership_name)
    .bind(membership.membership_status)
    .bind(membership.point)
    .execute(&mut **db)
    .await?;

    Ok(Json(membership))
}

/// List all memberships held by one user.
#[openapi(tag = "Memberships")]
#[get("/membership/all?<user_id>")]
pub async fn list_memberships(
    mut db: Connection<ClubDb>,
    user_id: String,
) -> Result<Json<Vec<Membership>>, ApiError> {
    let memberships = sqlx::query_as::<_, Membership>(
        "SELECT user_id, membership_id, membership_name, membership_status, point \
         FROM memberships WHERE user_id = $1 ORDER BY membership_id",
    )
    .bind(&user_id)
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(memberships))
}

/// Accrue points on an existing membership.
#[openapi(tag = "Memberships")]
#[put("/membership/points", data = "<payload>")]
pub async fn add_points(
    mut db: Connection<ClubDb>,
    payload: Json<PointRequest>,
) -> Result<&'static str, ApiError> {
    let payload = payload.into_inner();

    let result = sqlx::query(
        "UPDATE memberships SET point = point + $1 WHERE user_id = $2 AND membership_id = $3",
    )
    .bind(payload.money)
    .bind(&payload.user_id)
    .bind(&payload.membership_id)
    .execute(&mut **db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!(
            "Membership {}/{} not found",
            payload.user_id, payload.membership_id
        )));
    }
    Ok("added")
}
