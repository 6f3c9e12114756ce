//! HTML message bodies sent by the bot.

use teloxide::utils::html::escape;

use common::{Alert, DEFAULT_ALERT_PERCENT};
use store::SubscriberProfile;

const MARKET_URL: &str = "https://www.binance.com/en/futures/";

/// Price-move alert: linked pair, current price, advisory signal.
pub fn alert(alert: &Alert) -> String {
    let pair = escape(&alert.pair);
    format!(
        "<b>Trading Pair: </b><a href=\"{MARKET_URL}{pair}\">{pair}</a>\n\
         ├Price: <code>{}</code>\n\
         ├Prediction: <i>{}</i>",
        alert.price, alert.signal
    )
}

pub fn new_user_notice(id: i64, username: Option<&str>, is_bot: bool) -> String {
    format!(
        "<i>New user</i>\n\nStats:\n\
         ├<b>ID</b>: <code>{id}</code>\n\
         ├<b>Nick</b>: @{}\n\
         ├<b>Is_bot</b>: {is_bot}\n",
        escape(username.unwrap_or("-"))
    )
}

pub fn welcome(username: Option<&str>) -> String {
    format!("Welcome back, @{}", escape(username.unwrap_or("user")))
}

pub fn profile(profile: &SubscriberProfile) -> String {
    let percent = profile.alert_percent.unwrap_or(DEFAULT_ALERT_PERCENT);
    let alerts = if profile.notifications_enabled { "on" } else { "off" };
    format!("My Profile:\n├Alert % (min): <code>{percent}%</code>\n\nAlerts: {alerts}")
}

pub fn toggled(enabled: bool) -> String {
    if enabled {
        "Alerts <b>on</b>...\n\n\
         As soon as the price moves enough, I'll send a notification.\n\
         To disable notifications, type /sw"
            .to_string()
    } else {
        "Alerts <b>off</b>...\n\nTo enable notifications, type /sw".to_string()
    }
}

pub fn percent_updated(percent: f64) -> String {
    format!("Percent updated: <code>{percent}%</code>")
}

pub const INCORRECT_PERCENT: &str =
    "Incorrect input. Try again, type the command /prc followed by a non-negative number, e.g. /prc 2.5";

pub const NOT_REGISTERED: &str = "You are not registered yet. Send /start first.";

/// Parse a user-typed alert threshold. Accepts an optional trailing `%`.
pub fn parse_percent(input: &str) -> Option<f64> {
    let raw = input.trim();
    let raw = raw.strip_suffix('%').unwrap_or(raw).trim();
    raw.parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Signal;

    #[test]
    fn alert_links_pair_and_shows_price_and_signal() {
        let text = alert(&Alert {
            pair: "ETHUSDT".into(),
            price: 2185.5,
            signal: Signal::Sell,
        });
        assert_eq!(
            text,
            "<b>Trading Pair: </b><a href=\"https://www.binance.com/en/futures/ETHUSDT\">ETHUSDT</a>\n\
             ├Price: <code>2185.5</code>\n\
             ├Prediction: <i>sell</i>"
        );
    }

    #[test]
    fn usernames_are_escaped() {
        assert_eq!(welcome(Some("a<b>")), "Welcome back, @a&lt;b&gt;");
        assert_eq!(welcome(None), "Welcome back, @user");
        assert!(new_user_notice(42, Some("eve&co"), false).contains("@eve&amp;co"));
    }

    #[test]
    fn profile_defaults_unset_threshold_to_one_percent() {
        let mut p = SubscriberProfile {
            id: 1,
            username: None,
            is_admin: false,
            notifications_enabled: true,
            alert_percent: None,
        };
        assert_eq!(
            profile(&p),
            "My Profile:\n├Alert % (min): <code>1%</code>\n\nAlerts: on"
        );
        p.alert_percent = Some(2.5);
        p.notifications_enabled = false;
        assert!(profile(&p).contains("<code>2.5%</code>"));
        assert!(profile(&p).ends_with("Alerts: off"));
    }

    #[test]
    fn percent_input_validation() {
        assert_eq!(parse_percent("2.5"), Some(2.5));
        assert_eq!(parse_percent(" 3% "), Some(3.0));
        assert_eq!(parse_percent("0"), Some(0.0));
        assert_eq!(parse_percent("-1"), None);
        assert_eq!(parse_percent("abc"), None);
        assert_eq!(parse_percent(""), None);
        assert_eq!(parse_percent("inf"), None);
        assert_eq!(parse_percent("NaN"), None);
    }
}
