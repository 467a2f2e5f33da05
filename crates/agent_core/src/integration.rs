//! crates/agent_core/src/integration.rs
//!
//! The script tag a customer pastes into their site to load the chat widget.

/// Builds the embed snippet for `client_id`, served from `origin`.
pub fn embed_snippet(origin: &str, client_id: &str) -> String {
    let origin = origin.trim_end_matches('/');
    format!(r#"<script src="{origin}/widget.js?id={client_id}" defer></script>"#)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_points_at_widget_with_client_id() {
        assert_eq!(
            embed_snippet("https://app.example.com/", "CLIENT_883_ZK"),
            r#"<script src="https://app.example.com/widget.js?id=CLIENT_883_ZK" defer></script>"#
        );
    }
}
