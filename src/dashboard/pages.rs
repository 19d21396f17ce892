//! HTML pages
//!
//! Plain string templates. Everything that comes from outside (GitHub
//! profile fields, error messages) goes through `html_escape`.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use url::Url;

use super::data::{DailyMetrics, DemoData, recent_activity};
use crate::auth::GitHubUser;
use crate::error::AuthError;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; color: #1f2328; background: #f6f8fa; }
main { padding: 1.5rem 2rem; }
.banner { padding: .75rem 1rem; border-radius: 6px; margin: 1rem 0; }
.error { background: #ffebe9; border: 1px solid #ff8182; }
.warning { background: #fff8c5; border: 1px solid #d4a72c; }
.login { max-width: 32rem; margin: 4rem auto; text-align: center; }
.button { display: inline-block; padding: .6rem 1.2rem; background: #24292f; color: #fff; border-radius: 6px; text-decoration: none; }
.layout { display: flex; min-height: 100vh; }
aside { width: 14rem; padding: 1.5rem; background: #fff; border-right: 1px solid #d0d7de; }
aside img { border-radius: 50%; }
.kpis { display: grid; grid-template-columns: repeat(4, 1fr); gap: 1rem; }
.kpi { background: #fff; border: 1px solid #d0d7de; border-radius: 6px; padding: 1rem; }
.kpi .value { font-size: 1.6rem; font-weight: 600; }
table { border-collapse: collapse; background: #fff; width: 100%; }
th, td { border: 1px solid #d0d7de; padding: .4rem .6rem; text-align: left; }
.bar { background: #0969da; height: .8rem; }
.columns { display: grid; grid-template-columns: 1fr 1fr; gap: 1rem; }
pre { background: #fff; border: 1px solid #d0d7de; padding: 1rem; overflow: auto; }
"#;

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
{body}
</body>
</html>
"#,
        title = text(title),
    )
}

fn error_banner(flash: Option<&str>) -> String {
    flash
        .map(|message| format!(r#"<div class="banner error">{}</div>"#, text(message)))
        .unwrap_or_default()
}

/// Login page
///
/// Shows the sign-in link, or a configuration warning when the OAuth app
/// credentials are missing.
pub fn login_page(sign_in: Result<&Url, &AuthError>, flash: Option<&str>) -> String {
    let action = match sign_in {
        Ok(url) => format!(
            r#"<a class="button" href="{}">Sign in with GitHub</a>"#,
            attr(url.as_str())
        ),
        Err(err) => format!(r#"<div class="banner warning">{}</div>"#, text(&err.to_string())),
    };

    let body = format!(
        r#"<main class="login">
<h1>Welcome - sign in with GitHub</h1>
<p>You need to authenticate with GitHub to access the dashboard.</p>
{banner}
{action}
</main>"#,
        banner = error_banner(flash),
    );

    layout("Octodash - Sign in", &body)
}

/// Format an integer with thousands separators
fn thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Inline SVG line chart of the daily series
fn time_series_chart(daily: &[DailyMetrics]) -> String {
    const WIDTH: f64 = 800.0;
    const HEIGHT: f64 = 240.0;
    const PAD: f64 = 20.0;

    let max = daily
        .iter()
        .flat_map(|d| [d.visitors, d.conversions, d.revenue])
        .max()
        .unwrap_or(0)
        .max(1) as f64;
    let step = if daily.len() > 1 {
        (WIDTH - 2.0 * PAD) / (daily.len() - 1) as f64
    } else {
        0.0
    };

    let line = |pick: fn(&DailyMetrics) -> u64, color: &str| {
        let points = daily
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let x = PAD + i as f64 * step;
                let y = HEIGHT - PAD - pick(d) as f64 / max * (HEIGHT - 2.0 * PAD);
                format!("{x:.1},{y:.1}")
            })
            .collect::<Vec<_>>()
            .join(" ");
        format!(r#"<polyline fill="none" stroke="{color}" stroke-width="2" points="{points}"/>"#)
    };

    let (first, last) = match (daily.first(), daily.last()) {
        (Some(first), Some(last)) => (first.date.to_string(), last.date.to_string()),
        _ => (String::new(), String::new()),
    };

    format!(
        r##"<svg viewBox="0 0 {WIDTH} {HEIGHT}" width="100%" role="img" aria-label="Daily visitors, conversions and revenue">
{visitors}
{conversions}
{revenue}
</svg>
<p><span style="color:#0969da">visitors</span> · <span style="color:#1a7f37">conversions</span> · <span style="color:#bf3989">revenue</span> ({first} to {last})</p>"##,
        visitors = line(|d| d.visitors, "#0969da"),
        conversions = line(|d| d.conversions, "#1a7f37"),
        revenue = line(|d| d.revenue, "#bf3989"),
    )
}

fn channel_section(data: &DemoData) -> String {
    let mut rows = String::new();
    let mut sent_bars = String::new();
    let mut conversion_bars = String::new();

    let max_sent = data.channels.iter().map(|c| c.sent).max().unwrap_or(0).max(1);
    let total_conversions: u64 = data.channels.iter().map(|c| c.conversions).sum();

    for channel in &data.channels {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            text(channel.channel),
            thousands(channel.sent),
            thousands(channel.opens),
            thousands(channel.conversions),
        );

        let sent_pct = channel.sent as f64 / max_sent as f64 * 100.0;
        let _ = write!(
            sent_bars,
            r#"<tr><td>{}</td><td><div class="bar" style="width:{sent_pct:.1}%"></div></td></tr>"#,
            text(channel.channel),
        );

        let share = channel.conversions as f64 / total_conversions.max(1) as f64 * 100.0;
        let _ = write!(
            conversion_bars,
            r#"<tr><td>{}</td><td><div class="bar" style="width:{share:.1}%"></div> {share:.1}%</td></tr>"#,
            text(channel.channel),
        );
    }

    format!(
        r#"<h2>Channels and performance</h2>
<table>
<thead><tr><th>Channel</th><th>Sent</th><th>Opens</th><th>Conversions</th></tr></thead>
<tbody>{rows}</tbody>
</table>
<div class="columns">
<div><h3>Messages sent per channel</h3><table>{sent_bars}</table></div>
<div><h3>Conversions per channel</h3><table>{conversion_bars}</table></div>
</div>"#
    )
}

/// Authenticated dashboard
pub fn dashboard_page(
    user: &GitHubUser,
    data: &DemoData,
    logout_url: &str,
    now: DateTime<Utc>,
) -> String {
    let kpis = data.kpis();

    let avatar = user
        .avatar_url
        .as_deref()
        .map(|url| format!(r#"<img src="{}" width="64" height="64" alt="">"#, attr(url)))
        .unwrap_or_default();

    let mut activity = String::new();
    for entry in recent_activity(now, &user.login) {
        let _ = write!(
            activity,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            text(&entry.time),
            text(entry.event),
            text(&entry.by),
        );
    }

    let raw_profile = serde_json::to_string_pretty(user).unwrap_or_default();

    let body = format!(
        r#"<div class="layout">
<aside>
{avatar}
<p><strong>{display_name}</strong></p>
<p><a href="{logout_url}">Logout</a></p>
</aside>
<main>
<h1>Dashboard - Overview</h1>
<p>Overview of the key metrics (demo data).</p>
<div class="kpis">
<div class="kpi"><div>Visitors (last 30d)</div><div class="value">{visitors}</div></div>
<div class="kpi"><div>Conversions</div><div class="value">{conversions}</div></div>
<div class="kpi"><div>Revenue</div><div class="value">{revenue}</div></div>
<div class="kpi"><div>Conversion rate</div><div class="value">{rate:.2}%</div></div>
</div>
<h2>Over time</h2>
{chart}
{channels}
<h2>Recent activity</h2>
<table>
<thead><tr><th>Time</th><th>Event</th><th>By</th></tr></thead>
<tbody>{activity}</tbody>
</table>
<hr>
<p><em>This is a prototype. Real campaign delivery and analytics need external integrations and a database.</em></p>
<details><summary>GitHub profile (raw)</summary><pre>{raw_profile}</pre></details>
</main>
</div>"#,
        display_name = text(user.display_name()),
        logout_url = attr(logout_url),
        visitors = thousands(kpis.visitors),
        conversions = thousands(kpis.conversions),
        revenue = thousands(kpis.revenue),
        rate = kpis.conversion_rate,
        chart = time_series_chart(&data.daily),
        channels = channel_section(data),
        raw_profile = text(&raw_profile),
    );

    layout("Octodash - Dashboard", &body)
}
