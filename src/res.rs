use axum::{http::StatusCode, response::{Html, IntoResponse, Response}};
use time::OffsetDateTime;

use crate::{db::User, session::{Flash, FlashLevel}};

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

/// Escapes text for HTML bodies and attributes.
///
/// Braces are escaped too so user text can never be picked up as a
/// `{placeholder}` by a later `replace` on the same template.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encodes a value for use inside a query string.
pub fn encode_query(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Wraps a rendered fragment in the site layout.
pub fn page(title: &str, viewer: Option<&User>, flashes: &[Flash], content: &str) -> Html<String> {
    let nav = match viewer {
        Some(user) => include_res!(str, "/pages/nav_user.html")
            .replace("{id}", &escape(&user.id))
            .replace("{username}", &escape(&user.username)),
        None => include_res!(str, "/pages/nav_guest.html").to_owned(),
    };

    let flashes: String = flashes
        .iter()
        .map(|flash| {
            let class = match flash.level {
                FlashLevel::Success => "success",
                FlashLevel::Error => "error",
            };
            format!(r#"<li class="flash {class}">{}</li>"#, escape(&flash.text))
        })
        .collect();

    Html(
        include_res!(str, "/pages/layout.html")
            .replace("{title}", &escape(title))
            .replace("{nav}", &nav)
            .replace("{flashes}", &flashes)
            .replace("{content}", content),
    )
}

pub fn permission_denied() -> Response {
    (StatusCode::FORBIDDEN, Html("Permission Denied")).into_response()
}

pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html(include_res!(str, "/pages/not_found.html"))).into_response()
}

/// Current time as unix microseconds, the unit every timestamp column uses.
pub fn now_micros() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000) as i64
}

/// Renders a timestamp relative to now, e.g. "3 hours ago".
pub fn since(micros: i64) -> String {
    since_at(micros, now_micros())
}

fn since_at(micros: i64, now: i64) -> String {
    let secs = (now - micros).max(0) / 1_000_000;
    let (n, unit) = match secs {
        0..60 => return "just now".to_owned(),
        60..3_600 => (secs / 60, "minute"),
        3_600..86_400 => (secs / 3_600, "hour"),
        86_400..2_592_000 => (secs / 86_400, "day"),
        2_592_000..31_536_000 => (secs / 2_592_000, "month"),
        _ => (secs / 31_536_000, "year"),
    };
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_neutralises_markup_and_placeholders() {
        assert_eq!(
            escape(r#"<b a="x">{content}</b> & 'q'"#),
            "&lt;b a=&quot;x&quot;&gt;&#123;content&#125;&lt;/b&gt; &amp; &#39;q&#39;"
        );
    }

    #[test]
    fn encode_query_escapes_reserved_bytes() {
        assert_eq!(encode_query("C++ & Rust"), "C%2B%2B+%26+Rust");
        assert_eq!(encode_query("héllo"), "h%C3%A9llo");
    }

    #[test]
    fn since_picks_the_largest_unit() {
        let now = 100 * 86_400 * 1_000_000i64;
        assert_eq!(since_at(now - 5 * 1_000_000, now), "just now");
        assert_eq!(since_at(now - 60 * 1_000_000, now), "1 minute ago");
        assert_eq!(since_at(now - 3 * 3_600 * 1_000_000, now), "3 hours ago");
        assert_eq!(since_at(now - 2 * 86_400 * 1_000_000, now), "2 days ago");
        assert_eq!(since_at(now + 10, now), "just now");
    }
}
