#[rocket::main]
async fn main() -> Result<(), rocket::Error> {
    club_api::rocket().launch().await?;
    Ok(())
}
