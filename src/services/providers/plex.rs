//! Plex media server client.
//!
//! Covers the three server-side concerns the engine needs: listing a library
//! section as catalog items with resolved external ids, looking items up by
//! title, and mutating playlists/collections for delivery.

use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{resolve_external_id, CatalogItem, MediaKind},
    services::providers::CatalogLister,
};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    media_container: T,
}

#[derive(Debug, Default, Deserialize)]
struct ServerInfo {
    #[serde(rename = "machineIdentifier", default)]
    machine_identifier: String,
}

#[derive(Debug, Default, Deserialize)]
struct SectionList {
    #[serde(rename = "Directory", default)]
    directory: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct Section {
    key: String,
    #[serde(rename = "type")]
    section_type: String,
    title: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ItemList {
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<PlexItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PlexItem {
    #[serde(rename = "ratingKey")]
    pub rating_key: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(rename = "Guid", default)]
    pub guids: Vec<PlexGuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PlexGuid {
    pub id: String,
}

impl MediaKind {
    fn section_type(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Show => "show",
        }
    }
}

#[derive(Clone)]
pub struct PlexClient {
    http_client: HttpClient,
    base_url: String,
    token: String,
}

impl PlexClient {
    pub fn new(http_client: HttpClient, base_url: String, token: String) -> Self {
        Self {
            http_client,
            base_url,
            token,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, &str)],
    ) -> AppResult<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .query(&[("X-Plex-Token", self.token.as_str())])
            .query(extra)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Plex API returned status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    async fn send_without_body(&self, method: reqwest::Method, path: &str) -> AppResult<()> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http_client
            .request(method, &url)
            .header("Accept", "application/json")
            .query(&[("X-Plex-Token", self.token.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Plex API returned status {}: {}",
                status, body
            )));
        }
        Ok(())
    }

    pub(crate) async fn machine_identifier(&self) -> AppResult<String> {
        let info: Envelope<ServerInfo> = self.get_json("/", &[]).await?;
        if info.media_container.machine_identifier.is_empty() {
            return Err(AppError::ExternalApi(
                "Plex server reported no machine identifier".to_string(),
            ));
        }
        Ok(info.media_container.machine_identifier)
    }

    /// Key of the first library section whose type matches `kind`
    pub(crate) async fn section_key(&self, kind: MediaKind) -> AppResult<String> {
        let sections: Envelope<SectionList> = self.get_json("/library/sections", &[]).await?;
        sections
            .media_container
            .directory
            .into_iter()
            .find(|section| section.section_type == kind.section_type())
            .map(|section| {
                tracing::debug!(kind = %kind, section = %section.title, "Resolved library section");
                section.key
            })
            .ok_or_else(|| {
                AppError::ExternalApi(format!("Plex server has no {} library section", kind))
            })
    }

    /// Search a section for `title`, preferring an exact match of the right
    /// item type over the first hit.
    pub(crate) async fn find_item(
        &self,
        section_key: &str,
        kind: MediaKind,
        title: &str,
    ) -> AppResult<Option<PlexItem>> {
        let path = format!("/library/sections/{}/all", section_key);
        let items: Envelope<ItemList> = self.get_json(&path, &[("title", title)]).await?;
        let hits = items.media_container.metadata;

        let exact = hits
            .iter()
            .find(|item| item.title == title && item.item_type == kind.section_type())
            .cloned();
        Ok(exact.or_else(|| {
            hits.into_iter()
                .find(|item| item.item_type == kind.section_type())
        }))
    }

    pub(crate) async fn replace_playlist(
        &self,
        name: &str,
        rating_keys: &[String],
    ) -> AppResult<()> {
        // Drop any previous playlist with the same name first
        let playlists: Envelope<ItemList> = self.get_json("/playlists", &[]).await?;
        for playlist in playlists.media_container.metadata {
            if playlist.title == name {
                self.send_without_body(
                    reqwest::Method::DELETE,
                    &format!("/playlists/{}", playlist.rating_key),
                )
                .await?;
            }
        }

        let machine = self.machine_identifier().await?;
        let uri = format!(
            "server://{}/com.plexapp.plugins.library/library/metadata/{}",
            machine,
            rating_keys.join(",")
        );
        let url = format!("{}/playlists", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .query(&[
                ("X-Plex-Token", self.token.as_str()),
                ("type", "video"),
                ("smart", "0"),
                ("title", name),
                ("uri", uri.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalApi(format!(
                "Plex playlist creation returned status {}",
                status
            )));
        }
        Ok(())
    }

    pub(crate) async fn replace_collection(
        &self,
        section_key: &str,
        kind: MediaKind,
        name: &str,
        rating_keys: &[String],
        promote_to_home: bool,
    ) -> AppResult<()> {
        let existing: Envelope<ItemList> = self
            .get_json(
                &format!("/library/sections/{}/collections", section_key),
                &[],
            )
            .await?;
        for collection in existing.media_container.metadata {
            if collection.title == name {
                self.send_without_body(
                    reqwest::Method::DELETE,
                    &format!("/library/collections/{}", collection.rating_key),
                )
                .await?;
            }
        }

        let machine = self.machine_identifier().await?;
        let uri = format!(
            "server://{}/com.plexapp.plugins.library/library/metadata/{}",
            machine,
            rating_keys.join(",")
        );
        let collection_type = match kind {
            MediaKind::Movie => "1",
            MediaKind::Show => "2",
        };
        let url = format!("{}/library/collections", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .query(&[
                ("X-Plex-Token", self.token.as_str()),
                ("type", collection_type),
                ("smart", "0"),
                ("sectionId", section_key),
                ("title", name),
                ("uri", uri.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalApi(format!(
                "Plex collection creation returned status {}",
                status
            )));
        }

        let created: Envelope<ItemList> = response.json().await?;
        if promote_to_home {
            if let Some(collection) = created.media_container.metadata.first() {
                let path = format!("/hubs/sections/{}/manage", section_key);
                let url = format!("{}{}", self.base_url, path);
                let response = self
                    .http_client
                    .put(&url)
                    .query(&[
                        ("X-Plex-Token", self.token.as_str()),
                        ("metadataId", collection.rating_key.as_str()),
                        ("promotedToOwnHome", "1"),
                    ])
                    .send()
                    .await?;
                if !response.status().is_success() {
                    tracing::warn!(
                        collection = %name,
                        status = %response.status(),
                        "Home promotion failed"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Map raw section items to catalog entries. Items without a usable GUID are
/// dropped here, before enrichment, so the working set only holds resolved
/// identifiers.
pub(crate) fn items_to_catalog(items: Vec<PlexItem>) -> Vec<CatalogItem> {
    items
        .into_iter()
        .filter_map(|item| {
            let guids: Vec<String> = item.guids.iter().map(|g| g.id.clone()).collect();
            match resolve_external_id(&guids) {
                Some(id) => Some(CatalogItem {
                    title: item.title,
                    id,
                }),
                None => {
                    tracing::warn!(title = %item.title, "No TMDB or IMDB GUID, skipping item");
                    None
                }
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl CatalogLister for PlexClient {
    async fn list(&self, kind: MediaKind) -> AppResult<Vec<CatalogItem>> {
        let section = self.section_key(kind).await?;
        let path = format!("/library/sections/{}/all", section);
        let items: Envelope<ItemList> = self.get_json(&path, &[("includeGuids", "1")]).await?;

        let catalog = items_to_catalog(items.media_container.metadata);
        tracing::info!(kind = %kind, items = catalog.len(), "Catalog listed");
        Ok(catalog)
    }
}
