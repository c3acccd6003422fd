use chrono_tz::Tz;
use dotenv::dotenv;

pub struct Config {
    pub bot_token: String,
    pub crypto_pay_token: String,
    pub database_url: String,
    pub admin_ids: Vec<i64>,
    pub vip_channel_id: Option<i64>,
    pub timezone: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        Ok(Config {
            bot_token: std::env::var("BOT_TOKEN")?,
            crypto_pay_token: std::env::var("CRYPTO_PAY_TOKEN")?,
            database_url: std::env::var("DATABASE_URL")?,
            admin_ids: parse_admin_ids(&std::env::var("ADMIN_IDS").unwrap_or_default()),
            vip_channel_id: std::env::var("VIP_CHANNEL_ID")
                .ok()
                .and_then(|v| v.parse().ok()),
            timezone: std::env::var("TIMEZONE")
                .unwrap_or_else(|_| "UTC".to_string())
                .parse()
                .unwrap_or(chrono_tz::UTC),
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_admin_ids() {
        assert_eq!(parse_admin_ids("123, 456,789"), vec![123, 456, 789]);
    }

    #[test]
    fn skips_malformed_admin_ids() {
        assert_eq!(parse_admin_ids("123,abc,,777"), vec![123, 777]);
        assert!(parse_admin_ids("").is_empty());
    }
}
