//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lockbox")]
#[command(about = "One-time access codes for object store downloads", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind to
        #[arg(short, long, default_value = "0.0.0.0:3000", env = "LOCKBOX_BIND")]
        bind: String,

        /// Token store file (must exist)
        #[arg(long, default_value = "otps.json", env = "LOCKBOX_TOKENS")]
        tokens: PathBuf,

        /// Resource catalog file
        #[arg(long, default_value = "catalog.toml", env = "LOCKBOX_CATALOG")]
        catalog: PathBuf,

        /// Session cookie signing secret (at least 32 bytes)
        #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
        session_secret: String,

        /// Mark the session cookie Secure
        #[arg(long, env = "LOCKBOX_SECURE_COOKIES")]
        secure_cookies: bool,

        #[command(flatten)]
        s3: S3Args,
    },

    /// Generate new one-time codes
    ///
    /// Examples:
    ///   lockbox issue
    ///   lockbox issue 25 --tokens /var/lib/lockbox/otps.json
    Issue {
        /// Number of codes to generate
        #[arg(default_value_t = 1, value_parser = parse_count)]
        count: usize,

        /// Token store file (created if missing)
        #[arg(long, default_value = "otps.json", env = "LOCKBOX_TOKENS")]
        tokens: PathBuf,
    },

    /// List the groups and items of a catalog
    Groups {
        /// Resource catalog file
        #[arg(long, default_value = "catalog.toml", env = "LOCKBOX_CATALOG")]
        catalog: PathBuf,
    },
}

#[derive(clap::Args)]
pub struct S3Args {
    /// Bucket holding the files
    #[arg(long, env = "S3_BUCKET")]
    pub bucket: String,

    /// Bucket region
    #[arg(long, env = "AWS_REGION")]
    pub region: String,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: String,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: String,

    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    /// Custom endpoint for S3-compatible stores, e.g. http://localhost:9000
    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Address objects as endpoint/bucket/key instead of bucket.endpoint/key
    #[arg(long, env = "S3_PATH_STYLE")]
    pub path_style: bool,
}

fn parse_count(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("count must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("Invalid count: {}. Must be a positive integer", s)),
    }
}
