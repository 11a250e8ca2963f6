//! URL encoded into a member's QR pass.

use url::Url;

/// `<base>/validate-pass?user_id=<uid>&event=<tag>`
///
/// The id travels unsigned; anyone holding the code can query the status.
pub fn validation_url(base: &Url, user_id: &str, event_tag: &str) -> Url {
    let mut url = base.clone();
    let path = format!("{}/validate-pass", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut()
        .clear()
        .append_pair("user_id", user_id)
        .append_pair("event", event_tag);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_at_root() {
        let base = Url::parse("https://pass.example.org").unwrap();
        let url = validation_url(&base, "abc-123", "62_crepusculo");
        assert_eq!(
            url.as_str(),
            "https://pass.example.org/validate-pass?user_id=abc-123&event=62_crepusculo"
        );
    }

    #[test]
    fn payload_under_prefix() {
        let base = Url::parse("https://example.org/functions/v1/").unwrap();
        let url = validation_url(&base, "u1", "62_crepusculo");
        assert_eq!(url.path(), "/functions/v1/validate-pass");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("user_id".to_string(), "u1".to_string()),
                ("event".to_string(), "62_crepusculo".to_string()),
            ]
        );
    }
}
