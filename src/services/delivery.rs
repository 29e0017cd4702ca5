//! Recommendation delivery.
//!
//! Pushes a ranked title list back into Plex: a playlist for movies, a
//! collection (optionally promoted to the Home row) for shows. Delivery is
//! fire-and-forget from the engine's perspective; failures are surfaced to
//! the caller's log and never roll back the computed recommendations.

use std::sync::Arc;

use crate::{
    error::AppResult,
    models::MediaKind,
    services::providers::{plex::PlexClient, DeliverySink},
};

pub struct PlexDelivery {
    plex: Arc<PlexClient>,
    name_template: String,
    home_promote: bool,
}

impl PlexDelivery {
    pub fn new(plex: Arc<PlexClient>, name_template: String, home_promote: bool) -> Self {
        Self {
            plex,
            name_template,
            home_promote,
        }
    }

    fn target_name(&self, user: &str, kind: MediaKind) -> String {
        self.name_template
            .replace("{kind}", kind.label())
            .replace("{user}", user)
    }

    /// Match titles to library items. Unmatched titles get one retry with the
    /// part before a colon ("Title: Subtitle" often indexes as "Title"), then
    /// are skipped with a warning.
    async fn resolve_rating_keys(
        &self,
        section_key: &str,
        kind: MediaKind,
        titles: &[String],
    ) -> AppResult<Vec<String>> {
        let mut keys = Vec::new();
        for title in titles {
            let mut hit = self.plex.find_item(section_key, kind, title).await?;
            if hit.is_none() {
                if let Some(short) = colon_prefix(title) {
                    hit = self.plex.find_item(section_key, kind, short).await?;
                }
            }
            match hit {
                Some(item) => keys.push(item.rating_key),
                None => tracing::warn!(title = %title, kind = %kind, "Title not found in library"),
            }
        }
        Ok(keys)
    }
}

fn colon_prefix(title: &str) -> Option<&str> {
    title
        .split_once(':')
        .map(|(prefix, _)| prefix.trim())
        .filter(|prefix| !prefix.is_empty())
}

#[async_trait::async_trait]
impl DeliverySink for PlexDelivery {
    async fn deliver(&self, user: &str, kind: MediaKind, titles: &[String]) -> AppResult<()> {
        if titles.is_empty() {
            tracing::debug!(user = %user, kind = %kind, "No titles to deliver");
            return Ok(());
        }

        let name = self.target_name(user, kind);
        let section_key = self.plex.section_key(kind).await?;
        let rating_keys = self.resolve_rating_keys(&section_key, kind, titles).await?;
        if rating_keys.is_empty() {
            tracing::warn!(user = %user, kind = %kind, "No titles matched in library, nothing delivered");
            return Ok(());
        }

        match kind {
            MediaKind::Movie => self.plex.replace_playlist(&name, &rating_keys).await?,
            MediaKind::Show => {
                self.plex
                    .replace_collection(&section_key, kind, &name, &rating_keys, self.home_promote)
                    .await?
            }
        }

        tracing::info!(
            user = %user,
            kind = %kind,
            target = %name,
            items = rating_keys.len(),
            "Recommendations delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;

    fn delivery() -> PlexDelivery {
        PlexDelivery::new(
            Arc::new(PlexClient::new(
                Client::new(),
                "http://plex.local:32400".to_string(),
                "token".to_string(),
            )),
            "Fresh {kind} Recs for {user}".to_string(),
            true,
        )
    }

    #[test]
    fn test_target_name_substitution() {
        let delivery = delivery();
        assert_eq!(
            delivery.target_name("zafy4", MediaKind::Movie),
            "Fresh Movie Recs for zafy4"
        );
        assert_eq!(
            delivery.target_name("peter", MediaKind::Show),
            "Fresh Show Recs for peter"
        );
    }

    #[test]
    fn test_colon_prefix() {
        assert_eq!(
            colon_prefix("Anchorman: The Legend of Ron Burgundy"),
            Some("Anchorman")
        );
        assert_eq!(colon_prefix("Inception"), None);
        assert_eq!(colon_prefix(": odd"), None);
    }
}
