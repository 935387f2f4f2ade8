//! Channel message rendering (HTML parse mode).

use std::fmt::Write;

use crate::domain::PostContent;

/// Closing line appended to every post.
pub const CONTACT_FOOTER: &str =
    "For collaboration:\nApply in the comments with your audience statistics";

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

fn present(field: Option<&String>) -> Option<&str> {
    field.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Renders post content as the channel message text. Empty fields are
/// omitted; user text is HTML-escaped.
#[must_use]
pub fn render_caption(content: &PostContent) -> String {
    let mut parts: Vec<String> = Vec::new();

    let name = content.product_name.trim();
    if !name.is_empty() {
        parts.push(format!("<b>{}</b>\n", escape(name)));
    }

    if let Some(extra) = present(content.has_payment.as_ref()) {
        let mut line = escape(extra);
        if let Some(amount) = present(content.payment_amount.as_ref()) {
            let _ = write!(line, " ({})", escape(amount));
        }
        parts.push(format!("Extra fee:\n🔸 {line}\n"));
    }

    let labelled = [
        ("Marketplace", &content.marketplace),
        ("Expected publication date", &content.expected_date),
        ("Blog theme", &content.blog_theme),
    ];
    for (label, value) in labelled {
        if let Some(value) = present(value.as_ref()) {
            parts.push(format!("{label}:\n🔸 {}\n", escape(value)));
        }
    }

    if !content.social_networks.is_empty() {
        let networks: Vec<String> = content.social_networks.iter().map(|n| escape(n)).collect();
        parts.push(format!("Social networks:\n🔸 {}\n", networks.join(", ")));
    }

    if !content.ad_formats.is_empty() {
        parts.push("Ad format:".to_string());
        for (network, format) in &content.ad_formats {
            parts.push(format!("🔸 {}: {}", escape(network), escape(format)));
        }
        parts.push(String::new());
    }

    if let Some(conditions) = present(content.conditions.as_ref()) {
        parts.push("Conditions:".to_string());
        parts.push(format!("🔻 {}", escape(conditions)));
        parts.push(String::new());
    }

    parts.push(CONTACT_FOOTER.to_string());
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_renders_only_footer() {
        assert_eq!(render_caption(&PostContent::default()), CONTACT_FOOTER);
    }

    #[test]
    fn fields_render_in_order_and_escape_html() {
        let mut content = PostContent {
            product_name: "Kettle <XL>".to_string(),
            has_payment: Some("Yes".to_string()),
            payment_amount: Some("300".to_string()),
            marketplace: Some("Ozon".to_string()),
            social_networks: vec!["Instagram".to_string(), "TikTok".to_string()],
            ..PostContent::default()
        };
        content
            .ad_formats
            .insert("Instagram".to_string(), "Reels".to_string());

        let text = render_caption(&content);
        assert!(text.starts_with("<b>Kettle &lt;XL&gt;</b>"));
        assert!(text.contains("🔸 Yes (300)"));
        assert!(text.contains("Marketplace:\n🔸 Ozon"));
        assert!(text.contains("🔸 Instagram, TikTok"));
        assert!(text.contains("🔸 Instagram: Reels"));
        assert!(text.ends_with(CONTACT_FOOTER));
        let marketplace = text.find("Marketplace").unwrap_or(usize::MAX);
        let networks = text.find("Social networks").unwrap_or(0);
        assert!(marketplace < networks);
    }

    #[test]
    fn blank_fields_are_skipped() {
        let content = PostContent {
            marketplace: Some("   ".to_string()),
            ..PostContent::default()
        };
        assert!(!render_caption(&content).contains("Marketplace"));
    }
}
