//! Note endpoints. Everything under `/notes` sits behind the filter chain's
//! token guard; handlers additionally receive the resolved principal through
//! [`ApiUser`] rather than re-deriving it from the header.

use rocket::serde::json::Json;
use rocket::{delete, get, post, put};
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::openapi;

use crate::auth::ApiUser;
use crate::db::ClubDb;
use crate::error::ApiError;
use crate::models::{Note, NoteRequest};

const NOTE_WITH_WRITER: &str = r#"
    SELECT n.num, n.writer_email, m.name AS writer_name, n.title, n.content,
           n.created_at, n.updated_at
    FROM notes n
    JOIN members m ON m.email = n.writer_email
"#;

/// Register a new note, returning its number.
#[openapi(tag = "Notes")]
#[post("/notes", data = "<payload>")]
pub async fn register_note(
    user: ApiUser,
    mut db: Connection<ClubDb>,
    payload: Json<NoteRequest>,
) -> Result<Json<i64>, ApiError> {
    let payload = payload.into_inner();
    log::info!(
        "registering note '{}' (requested by {})",
        payload.title,
        user.0.email()
    );

    let num: i64 = sqlx::query_scalar(
        "INSERT INTO notes (writer_email, title, content) VALUES ($1, $2, $3) RETURNING num",
    )
    .bind(&payload.writer_email)
    .bind(&payload.title)
    .bind(&payload.content)
    .fetch_one(&mut **db)
    .await?;

    Ok(Json(num))
}

/// Retrieve a single note with its writer.
#[openapi(tag = "Notes")]
#[get("/notes/<num>")]
pub async fn read_note(
    _user: ApiUser,
    mut db: Connection<ClubDb>,
    num: i64,
) -> Result<Json<Note>, ApiError> {
    let note = sqlx::query_as::<_, Note>(&format!("{NOTE_WITH_WRITER} WHERE n.num = $1"))
        .bind(num)
        .fetch_one(&mut **db)
        .await?;

    Ok(Json(note))
}

/// List all notes belonging to one writer.
#[openapi(tag = "Notes")]
#[get("/notes/all?<email>")]
pub async fn list_notes(
    _user: ApiUser,
    mut db: Connection<ClubDb>,
    email: String,
) -> Result<Json<Vec<Note>>, ApiError> {
    let notes = sqlx::query_as::<_, Note>(&format!(
        "{NOTE_WITH_WRITER} WHERE n.writer_email = $1 ORDER BY n.num"
    ))
    .bind(&email)
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(notes))
}

/// Update title and content of an existing note.
#[openapi(tag = "Notes")]
#[put("/notes/<num>", data = "<payload>")]
pub async fn modify_note(
    _user: ApiUser,
    mut db: Connection<ClubDb>,
    num: i64,
    payload: Json<NoteRequest>,
) -> Result<&'static str, ApiError> {
    let payload = payload.into_inner();
    let result =
        sqlx::query("UPDATE notes SET title = $1, content = $2, updated_at = now() WHERE num = $3")
            .bind(&payload.title)
            .bind(&payload.content)
            .bind(num)
            .execute(&mut **db)
            .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Note {num} not found")));
    }
    Ok("modified")
}

/// Delete a note.
#[openapi(tag = "Notes")]
#[delete("/notes/<num>")]
pub async fn remove_note(
    _user: ApiUser,
    mut db: Connection<ClubDb>,
    num: i64,
) -> Result<&'static str, ApiError> {
    let result = sqlx::query("DELETE FROM notes WHERE num = $1")
        .bind(num)
        .execute(&mut **db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Note {num} not found")));
    }
    Ok("removed")
}
