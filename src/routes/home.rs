use rocket::get;
use rocket_okapi::openapi;

#[openapi(tag = "Home")]
#[get("/")]
pub fn hello() -> &'static str {
    "Hello World!"
}
