//! Derive ephemeral TURN relay credentials from a shared secret.
//!
//! Useful to hand out time-bound credentials for a relay without
//! going through the broker:
//!
//! ```no_run
//! signaling-credential hunter2 villas 1h
//! ```

use anyhow::{anyhow, Result};
use chrono::{NaiveDateTime, TimeZone, Utc};
use clap::Parser;

use signaling_protocol::ephemeral_credentials;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Credential {
    /// Shared secret of the relay.
    secret: String,

    /// Username embedded in the derived credential.
    username: String,

    /// Credential lifetime (e.g. `1h`) or an absolute expiry time
    /// as `YYYY-MM-DD HH:MM:SS`.
    #[clap(default_value = "7d")]
    expires: String,
}

fn main() -> Result<()> {
    let args = Credential::parse();

    let expires = match humantime::parse_duration(&args.expires) {
        Ok(ttl) => {
            Utc::now()
                + chrono::Duration::seconds(ttl.as_secs() as i64)
        }
        Err(_) => {
            let naive = NaiveDateTime::parse_from_str(
                &args.expires,
                "%Y-%m-%d %H:%M:%S",
            )
            .map_err(|_| {
                anyhow!(
                    "invalid lifetime or expiry time: {}",
                    args.expires
                )
            })?;
            Utc.from_utc_datetime(&naive)
        }
    };

    let (username, password) =
        ephemeral_credentials(&args.secret, &args.username, expires);

    println!("Username: {}", username);
    println!("Password: {}", password);

    Ok(())
}
