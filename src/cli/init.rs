use std::path::PathBuf;

use colored::Colorize;

use crate::cli::local_conn;
use crate::error::{Result, ShopfloorError};
use crate::settings::{
    load_settings, save_settings, settings_file_exists, shellexpand_path, Backend, ACCESS_KEY_ENV,
};

fn read_access_key(prompt: impl FnOnce() -> std::io::Result<String>) -> Result<String> {
    let key = prompt().map_err(|e| {
        ShopfloorError::Settings(format!(
            "could not read the access key ({e}); set {ACCESS_KEY_ENV} instead"
        ))
    })?;
    Ok(key.trim().to_string())
}

pub fn run(
    data_dir: Option<String>,
    user: Option<String>,
    backend: Option<Backend>,
    app_id: Option<String>,
) -> Result<()> {
    let mut settings = load_settings();
    let first_run = !settings_file_exists();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(name) = user {
        settings.user_name = name.trim().to_string();
    }
    if let Some(b) = backend {
        settings.backend = b;
    }
    if let Some(id) = app_id {
        settings.appsheet.app_id = id.trim().to_string();
    }

    if settings.backend == Backend::Appsheet
        && settings.appsheet.access_key.is_empty()
        && std::env::var(ACCESS_KEY_ENV).is_err()
    {
        settings.appsheet.access_key = read_access_key(|| {
            rpassword::prompt_password(format!(
                "AppSheet access key (or set {ACCESS_KEY_ENV}; Enter to skip): "
            ))
        })?;
    }

    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    for sub in ["imports", "exports", "backups"] {
        std::fs::create_dir_all(resolved.join(sub))?;
    }
    local_conn(&settings)?;

    if first_run {
        println!("Initialized shopfloor at {}", resolved.display());
    } else {
        println!("Updated settings for {}", resolved.display());
    }
    if settings.user_name.is_empty() {
        println!(
            "{}",
            "No user name set. Pass --user NAME so history entries name you.".yellow()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_read_access_key_trims_input() {
        let key = read_access_key(|| Ok("  abc-123\n".to_string())).unwrap();
        assert_eq!(key, "abc-123");
    }

    #[test]
    fn test_read_access_key_reports_prompt_failure() {
        let err = read_access_key(|| Err(io::Error::new(io::ErrorKind::NotFound, "no tty")))
            .unwrap_err();
        assert!(matches!(err, ShopfloorError::Settings(_)));
        assert!(err.to_string().contains(ACCESS_KEY_ENV));
    }
}
