use std::io::{self, Write};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use club_api::auth::passwords::PasswordService;
use club_api::auth::principal::MemberRole;

#[derive(Parser, Debug)]
#[command(name = "create_member", about = "Create a local club member account")]
struct Args {
    /// Email address for the account.
    #[arg(long)]
    email: String,

    /// Plaintext password to hash and store for this member.
    #[arg(long)]
    password: String,

    /// Optional display name (defaults to the email address).
    #[arg(long)]
    name: Option<String>,

    /// Comma-separated roles to grant (`user`, `manager`, `admin`).
    #[arg(long, default_value = "user", value_delimiter = ',')]
    roles: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let email = args.email.trim().to_lowercase();

    if !email.contains('@') {
        writeln!(io::stderr(), "error: email must contain '@'")?;
        std::process::exit(1);
    }

    let mut roles = Vec::new();
    for raw in &args.roles {
        match MemberRole::from_code(&raw.trim().to_uppercase()) {
            Some(role) => roles.push(role),
            None => {
                writeln!(
                    io::stderr(),
                    "error: unsupported role '{raw}'. Use 'user', 'manager' or 'admin'."
                )?;
                std::process::exit(1);
            }
        }
    }

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let mut tx = pool.begin().await?;

    let existing =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM members WHERE lower(email) = lower($1)")
            .bind(&email)
            .fetch_one(&mut *tx)
            .await?;

    if existing > 0 {
        writeln!(
            io::stderr(),
            "error: a member with email '{email}' already exists."
        )?;
        std::process::exit(1);
    }

    let password_service = PasswordService::new()
        .map_err(|err| io::Error::other(format!("argon2 init failed: {err}")))?;
    let password_hash = password_service
        .hash_password(&args.password)
        .map_err(|err| io::Error::other(format!("password hash failed: {err}")))?;

    sqlx::query(
        "INSERT INTO members (email, password_hash, name, from_social) VALUES ($1, $2, $3, FALSE)",
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(args.name.as_deref().unwrap_or(&email))
    .execute(&mut *tx)
    .await?;

    for role in &roles {
        sqlx::query("INSERT INTO member_roles (member_email, role) VALUES ($1, $2)")
            .bind(&email)
            .bind(role.code())
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let granted: Vec<&str> = roles.iter().map(|role| role.code()).collect();
    println!("Created member '{email}' with roles {}", granted.join(","));
    Ok(())
}
