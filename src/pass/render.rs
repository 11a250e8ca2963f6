//! Renderings of a verdict for the scanning client.

use super::verdict::{PassVerdict, VerdictColor};

/// Output representation requested by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassFormat {
    Json,
    Html,
}

impl PassFormat {
    /// `json` selects JSON; anything else renders the status page.
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "json" => Self::Json,
            _ => Self::Html,
        }
    }

    /// Pick the format from a raw query string, even one that fails to
    /// deserialize as a whole.
    pub fn from_query_string(raw: Option<&str>) -> Self {
        let format = raw.and_then(|raw| {
            url::form_urlencoded::parse(raw.as_bytes())
                .find(|(key, _)| key == "format")
                .map(|(_, value)| value.into_owned())
        });
        Self::from_param(format.as_deref())
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn palette(color: VerdictColor) -> (&'static str, &'static str) {
    match color {
        VerdictColor::Green => ("#14532d", "#dcfce7"),
        VerdictColor::Yellow => ("#713f12", "#fef9c3"),
        VerdictColor::Red => ("#7f1d1d", "#fee2e2"),
    }
}

/// Full-screen status page readable from across the door.
pub fn render_html(verdict: &PassVerdict) -> String {
    let (fg, bg) = palette(verdict.color);
    let headline = if verdict.valid { "VALID" } else { "NOT VALID" };
    let identity = if verdict.username.is_empty() {
        String::new()
    } else {
        format!(
            "<h2>{}</h2>\n    <p class=\"username\">@{}</p>\n    ",
            escape_html(&verdict.full_name),
            escape_html(&verdict.username)
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>62 Crepusculo pass: {status}</title>
  <style>
    body {{ margin: 0; font-family: system-ui, sans-serif; background: {bg}; color: {fg}; }}
    main {{ min-height: 100vh; display: flex; flex-direction: column; align-items: center; justify-content: center; text-align: center; padding: 1rem; }}
    h1 {{ font-size: 3rem; margin: 0 0 1rem; }}
    h2 {{ font-size: 1.75rem; margin: 0; }}
    .username {{ font-size: 1.25rem; margin: 0.25rem 0 1.5rem; }}
    .status {{ font-weight: 600; text-transform: uppercase; letter-spacing: 0.1em; }}
  </style>
</head>
<body class="{color}">
  <main>
    <h1>{headline}</h1>
    {identity}<p class="status">{status}</p>
    <p class="message">{message}</p>
  </main>
</body>
</html>
"#,
        color = verdict.color.as_str(),
        status = escape_html(&verdict.status),
        message = escape_html(&verdict.message),
    )
}
