use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration, sourced from the environment.
///
/// Only `DISCORD_TOKEN` is required; everything else has defaults matching
/// the guild layout the bot was written for.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub discord_token: String,
    pub http_port: u16,

    // Verification flow
    pub verify_timeout: Duration,
    pub optin_start_delay: Duration,
    pub thread_archive_delay: Duration,
    pub thread_delete_delay: Duration,
    pub verification_channel: String,
    pub verified_role: String,
    pub unverified_role: String,

    // Moderation
    pub mod_log_channel: String,
    pub verify_log_channel: String,
    pub mod_commands_channel: String,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let discord_token = env_str("DISCORD_TOKEN").unwrap_or_default();
        if discord_token.trim().is_empty() {
            return Err(Error::Config(
                "DISCORD_TOKEN environment variable is required".to_string(),
            ));
        }

        let http_port = env_u16("PORT").unwrap_or(3000);

        let verify_timeout = Duration::from_secs(env_u64("VERIFY_TIMEOUT_SECS").unwrap_or(300));
        let optin_start_delay =
            Duration::from_millis(env_u64("VERIFY_OPTIN_DELAY_MS").unwrap_or(2000));
        let thread_archive_delay =
            Duration::from_millis(env_u64("THREAD_ARCHIVE_DELAY_MS").unwrap_or(3000));
        let thread_delete_delay =
            Duration::from_millis(env_u64("THREAD_DELETE_DELAY_MS").unwrap_or(3000));

        let verification_channel =
            env_str("VERIFICATION_CHANNEL").unwrap_or("verification".to_string());
        let verified_role = env_str("VERIFIED_ROLE").unwrap_or("Verified".to_string());
        let unverified_role = env_str("UNVERIFIED_ROLE").unwrap_or("Unverified".to_string());

        let mod_log_channel = env_str("MOD_LOG_CHANNEL").unwrap_or("moderation-logs".to_string());
        let verify_log_channel =
            env_str("VERIFY_LOG_CHANNEL").unwrap_or("verification-logs".to_string());
        let mod_commands_channel =
            env_str("MOD_COMMANDS_CHANNEL").unwrap_or("mod-commands".to_string());

        let audit_log_path = PathBuf::from(
            env_str("AUDIT_LOG_PATH").unwrap_or("/tmp/warden-audit.log".to_string()),
        );
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        Ok(Self {
            discord_token,
            http_port,
            verify_timeout,
            optin_start_delay,
            thread_archive_delay,
            thread_delete_delay,
            verification_channel,
            verified_role,
            unverified_role,
            mod_log_channel,
            verify_log_channel,
            mod_commands_channel,
            audit_log_path,
            audit_log_json,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u16(key: &str) -> Option<u16> {
    env_str(key).and_then(|s| s.trim().parse::<u16>().ok())
}
