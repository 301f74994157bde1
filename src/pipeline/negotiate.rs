//! Response content type selection.
//!
//! First match wins, no `Accept` q-value arbitration:
//! explicit handler choice, first producible type, first request
//! `Content-Type`, first accepted request type, then JSON.

use crate::codec::APPLICATION_JSON;

pub fn negotiate(
    explicit: Option<&str>,
    produces: &[String],
    request_types: &[String],
    accepts: &[String],
) -> String {
    explicit
        .filter(|ct| !ct.trim().is_empty())
        .or_else(|| produces.first().map(String::as_str))
        .or_else(|| request_types.first().map(String::as_str))
        .or_else(|| accepts.first().map(String::as_str))
        .unwrap_or(APPLICATION_JSON)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_explicit_wins() {
        let ct = negotiate(Some("text/csv"), &list(&["application/json"]), &[], &[]);
        assert_eq!(ct, "text/csv");
    }

    #[test]
    fn test_producible_first() {
        let ct = negotiate(
            None,
            &list(&["application/json", "text/plain"]),
            &list(&["application/x-www-form-urlencoded"]),
            &[],
        );
        assert_eq!(ct, "application/json");
    }

    #[test]
    fn test_falls_back_through_request_types() {
        let ct = negotiate(None, &[], &list(&["text/plain; charset=utf-8"]), &list(&["image/png"]));
        assert_eq!(ct, "text/plain; charset=utf-8");

        let ct = negotiate(Some(""), &[], &[], &list(&["image/png"]));
        assert_eq!(ct, "image/png");

        assert_eq!(negotiate(None, &[], &[], &[]), APPLICATION_JSON);
    }
}
