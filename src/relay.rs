//! Rendering and correlation of relayed messages.
//!
//! A request forwarded to the responder pool carries its database id as a
//! plain-text token inside the rendered envelope. When a responder replies
//! to that message, the id is recovered by scanning the quoted text. The
//! token format is load-bearing wire compatibility with existing message
//! history; everything that needs to parse it goes through
//! [`extract_request_id`] so the encoding can be swapped for a structured
//! reference later.

use lazy_static::lazy_static;
use regex::Regex;

use crate::utils::truncate_str;

/// Label written into outgoing envelopes.
pub const CORRELATION_LABEL: &str = "ID savol:";

lazy_static! {
    // Both labels occur in historical messages; accept either.
    static ref RE_CORRELATION: Regex =
        Regex::new(r"(?:ID savol|ID вопроса):\s*(\d+)").unwrap();
}

/// Recovers a request id from the text of a forwarded envelope.
///
/// Scans for the known label tokens and parses the trailing integer. When
/// the text carries several tokens, the last one wins. Returns `None` when
/// no token is present or the number does not parse.
pub fn extract_request_id(text: &str) -> Option<i64> {
    RE_CORRELATION
        .captures_iter(text)
        .last()
        .and_then(|caps| caps[1].parse().ok())
}

/// Renders the HTML envelope forwarded to every responder.
pub fn render_request_envelope(
    requester_name: &str,
    requester_id: i64,
    body: &str,
    request_id: i64,
) -> String {
    format!(
        "❓ <b>Yangi savol bemordan:</b>\n\n\
         👤 {}\nID: {}\n\n\
         📝 <b>Savol:</b>\n{}\n\n\
         {} {}",
        html_escape::encode_text(requester_name),
        requester_id,
        html_escape::encode_text(body),
        CORRELATION_LABEL,
        request_id,
    )
}

/// Renders the HTML answer delivered back to the requester.
pub fn render_answer(responder_name: &str, request_body: &str, answer: &str) -> String {
    format!(
        "👨‍⚕️ <b>Javob shifokordan {}</b>\n\n\
         📝 <b>Sizning savolingiz:</b>\n{}\n\n\
         💬 <b>Javob:</b>\n{}",
        html_escape::encode_text(responder_name),
        html_escape::encode_text(&preview(request_body, 100)),
        html_escape::encode_text(answer),
    )
}

/// Truncated single-line preview of a request body, with a trailing
/// ellipsis when anything was cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", truncate_str(text, max_chars))
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_extraction() {
        let envelope = render_request_envelope("Aziza Karimova", 555, "tizzamda og'riq", 42);
        assert!(envelope.contains("ID savol: 42"));
        assert_eq!(extract_request_id(&envelope), Some(42));
    }

    #[test]
    fn extracts_russian_label_from_historical_messages() {
        assert_eq!(extract_request_id("...\nID вопроса: 17"), Some(17));
    }

    #[test]
    fn last_token_wins_when_body_contains_one() {
        let envelope =
            render_request_envelope("B", 1, "oldingi savolim ID savol: 3 edi, yana so'rayman", 9);
        assert_eq!(extract_request_id(&envelope), Some(9));
    }

    #[test]
    fn missing_or_malformed_token_yields_none() {
        assert_eq!(extract_request_id("shunchaki matn"), None);
        assert_eq!(extract_request_id("ID savol: yo'q"), None);
        assert_eq!(extract_request_id(""), None);
    }

    #[test]
    fn envelope_escapes_html_in_user_input() {
        let envelope = render_request_envelope("<script>", 1, "a < b & c", 5);
        assert!(envelope.contains("&lt;script&gt;"));
        assert!(envelope.contains("a &lt; b &amp; c"));
        assert_eq!(extract_request_id(&envelope), Some(5));
    }

    #[test]
    fn preview_truncates_long_bodies_only() {
        assert_eq!(preview("qisqa", 50), "qisqa");
        let long = "x".repeat(60);
        let p = preview(&long, 50);
        assert_eq!(p.chars().count(), 53);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn answer_contains_escaped_parts() {
        let html = render_answer("Dr <X>", "savol", "javob & izoh");
        assert!(html.contains("Dr &lt;X&gt;"));
        assert!(html.contains("javob &amp; izoh"));
    }
}
