//! Branded email composition
//!
//! Every outbound email carries a plain-text part (the body as given) and an
//! HTML alternative: dark header with the wordmark, the body with line
//! breaks preserved, a portal button, and a do-not-reply footer.

/// Render the HTML alternative for a plain-text body
pub fn branded_html(body: &str, portal_url: &str) -> String {
    format!(
        r#"<div style="font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; max-width: 600px; margin: 0 auto; border: 1px solid #e2e8f0; background-color: #ffffff;">
  <div style="background: #0f172a; padding: 24px; text-align: center;">
    <span style="color: #ffffff; font-size: 22px; font-weight: 700; letter-spacing: 0.5px;">TaxDesk</span>
  </div>
  <div style="padding: 32px 24px;">
    <h2 style="color: #0f172a; margin-top: 0; font-size: 20px; font-weight: 600;">Update on your Request</h2>
    <div style="color: #475569; font-size: 16px; line-height: 1.6; white-space: pre-wrap;">{body}</div>
    <div style="margin-top: 32px; text-align: center;">
      <a href="{portal_url}" style="background-color: #0ea5e9; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px; font-weight: 600; font-size: 14px; display: inline-block;">View in Portal</a>
    </div>
  </div>
  <div style="background-color: #f8fafc; padding: 24px; text-align: center; border-top: 1px solid #e2e8f0;">
    <p style="margin: 0; color: #64748b; font-size: 12px;">
      &copy; {year} TaxDesk Tax Advisors.<br>
      This is an automated notification. Please do not reply directly.
    </p>
  </div>
</div>"#,
        body = escape_html(body),
        portal_url = escape_html(portal_url),
        year = chrono::Utc::now().format("%Y"),
    )
}

/// Escape text for safe interpolation into the HTML template
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_metacharacters() {
        assert_eq!(
            escape_html(r#"<b>"a" & 'b'</b>"#),
            "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn body_is_escaped_into_template() {
        let html = branded_html("Status: <Closed>", "https://portal.example");
        assert!(html.contains("Status: &lt;Closed&gt;"));
        assert!(!html.contains("<Closed>"));
        assert!(html.contains(r#"href="https://portal.example""#));
    }

    #[test]
    fn line_breaks_survive_via_pre_wrap() {
        let html = branded_html("line one\nline two", "https://portal.example");
        assert!(html.contains("white-space: pre-wrap"));
        assert!(html.contains("line one\nline two"));
    }
}
