use std::process::ExitCode;

use labvisit_lib::config::{self, AppConfig};
use labvisit_lib::db::SqliteRecordStore;
use labvisit_lib::models::UserRole;
use labvisit_lib::{auth, init_tracing};

const USAGE: &str = "usage: labvisit [serve | hash-password | add-user <email> <Admin|Staff>]\n\
                     hash-password and add-user read the password from LABVISIT_NEW_USER_PASSWORD";

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [] | ["serve"] => labvisit_lib::run().await.map_err(|e| e.to_string()),
        ["hash-password"] => new_user_password().map(|password| println!("{}", auth::hash_password(&password))),
        ["add-user", email, role] => add_user(email, role),
        _ => Err(USAGE.to_string()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn add_user(email: &str, role: &str) -> Result<(), String> {
    let role: UserRole = role.parse().map_err(|_| format!("Unknown role {role}, expected Admin or Staff"))?;
    let password = new_user_password()?;

    let config = AppConfig::from_env().map_err(|e| e.to_string())?;
    std::fs::create_dir_all(&config.data_dir).map_err(|e| e.to_string())?;
    let store = SqliteRecordStore::open(&config.database_path()).map_err(|e| e.to_string())?;

    let actor = auth::create_user(&store, email, &password, role).map_err(|e| e.to_string())?;
    println!("Added {} ({})", actor.email, actor.role);
    Ok(())
}


fn new_user_password() -> Result<String, String> {
    config::new_user_password(|key| std::env::var(key).ok()).map_err(|e| e.to_string())
}
