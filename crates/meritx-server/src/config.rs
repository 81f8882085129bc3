use std::str::FromStr;

use anyhow::bail;
use clap::Parser;

/// Runtime configuration. Flags are parsed first; an environment variable
/// overrides its flag whenever it is set and non-empty. A numeric variable
/// that is set but not a positive integer fails startup.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "meritx-server",
    version,
    about = "meritx — loyalty-points accounting service"
)]
pub struct Config {
    /// Log verbosity.
    #[arg(short = 'l', default_value = "info")]
    pub log_level: String,

    /// HTTP listen address.
    #[arg(short = 'a', default_value = "localhost:8080")]
    pub run_address: String,

    /// Postgres connection URI (required).
    #[arg(short = 'd', default_value = "")]
    pub database_uri: String,

    /// Base URL of the external accrual system.
    #[arg(short = 'r', default_value = "")]
    pub accrual_address: String,

    /// Token signing secret.
    #[arg(short = 's', default_value = "development-secret-change-me")]
    pub secret: String,

    /// Orders leased per accrual poll.
    #[arg(short = 'b', default_value_t = 10)]
    pub batch_size: i64,

    /// Worker pool size: the max number of concurrent accrual polls.
    #[arg(short = 'n', default_value_t = 5)]
    pub rate_limit: usize,

    /// Token lifetime in hours.
    #[arg(short = 't', default_value_t = 24)]
    pub token_ttl_hours: i64,

    /// Accrual poll interval in seconds.
    #[arg(short = 'i', default_value_t = 1)]
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = Self::parse();
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Some(v) = non_empty_env("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = non_empty_env("RUN_ADDRESS") {
            self.run_address = v;
        }
        if let Some(v) = non_empty_env("DATABASE_URI") {
            self.database_uri = v;
        }
        if let Some(v) = non_empty_env("ACCRUAL_SYSTEM_ADDRESS") {
            self.accrual_address = v;
        }
        if let Some(v) = non_empty_env("SECRET") {
            self.secret = v;
        }
        if let Some(v) = non_empty_env("BATCH_SIZE") {
            self.batch_size = positive(&v, "BATCH_SIZE")?;
        }
        if let Some(v) = non_empty_env("RATE_LIMIT") {
            self.rate_limit = positive(&v, "RATE_LIMIT")?;
        }
        if let Some(v) = non_empty_env("TOKEN_TTL") {
            self.token_ttl_hours = positive(&v, "TOKEN_TTL")?;
        }
        if let Some(v) = non_empty_env("POLL_INTERVAL") {
            self.poll_interval_secs = positive(&v, "POLL_INTERVAL")?;
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn positive<T>(value: &str, key: &str) -> anyhow::Result<T>
where
    T: FromStr + PartialOrd + From<u8>,
{
    match value.parse::<T>() {
        Ok(parsed) if parsed >= T::from(1u8) => Ok(parsed),
        _ => bail!("{key} must be a positive integer, got {value:?}"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("meritx-server").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults_match_the_documented_table() {
        let cfg = parse(&[]);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.run_address, "localhost:8080");
        assert_eq!(cfg.database_uri, "");
        assert_eq!(cfg.accrual_address, "");
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.rate_limit, 5);
        assert_eq!(cfg.token_ttl_hours, 24);
        assert_eq!(cfg.poll_interval_secs, 1);
    }

    #[test]
    fn short_flags_set_their_fields() {
        let cfg = parse(&[
            "-l", "debug",
            "-a", "0.0.0.0:9090",
            "-d", "postgres://localhost/meritx",
            "-r", "http://accrual:8081",
            "-s", "secret",
            "-b", "25",
            "-n", "8",
            "-t", "48",
            "-i", "3",
        ]);
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.run_address, "0.0.0.0:9090");
        assert_eq!(cfg.database_uri, "postgres://localhost/meritx");
        assert_eq!(cfg.accrual_address, "http://accrual:8081");
        assert_eq!(cfg.secret, "secret");
        assert_eq!(cfg.batch_size, 25);
        assert_eq!(cfg.rate_limit, 8);
        assert_eq!(cfg.token_ttl_hours, 48);
        assert_eq!(cfg.poll_interval_secs, 3);
    }

    // Environment handling is covered in one test: the process environment
    // is shared across the test harness's threads.
    #[test]
    fn env_overrides_flags_and_validates_integers() {
        let mut cfg = parse(&["-a", "localhost:8080", "-b", "10"]);
        std::env::set_var("RUN_ADDRESS", "0.0.0.0:7070");
        std::env::set_var("BATCH_SIZE", "42");
        std::env::set_var("SECRET", "");
        cfg.apply_env().unwrap();
        assert_eq!(cfg.run_address, "0.0.0.0:7070");
        assert_eq!(cfg.batch_size, 42);
        // Empty env values leave the flag value untouched.
        assert_eq!(cfg.secret, "development-secret-change-me");

        std::env::set_var("BATCH_SIZE", "0");
        assert!(cfg.apply_env().is_err());
        std::env::set_var("BATCH_SIZE", "-3");
        assert!(cfg.apply_env().is_err());
        std::env::set_var("BATCH_SIZE", "ten");
        assert!(cfg.apply_env().is_err());

        std::env::remove_var("RUN_ADDRESS");
        std::env::remove_var("BATCH_SIZE");
        std::env::remove_var("SECRET");
    }

    #[test]
    fn positive_rejects_zero_and_garbage() {
        assert_eq!(positive::<i64>("7", "X").unwrap(), 7);
        assert!(positive::<i64>("0", "X").is_err());
        assert!(positive::<usize>("-1", "X").is_err());
        assert!(positive::<u64>("1.5", "X").is_err());
    }
}
