use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Plex server base URL (e.g. "http://plex.local:32400")
    pub plex_base_url: String,

    /// Plex authentication token
    pub plex_token: String,

    /// TMDB API key
    pub tmdb_api_key: String,

    /// TMDB API base URL
    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// Tautulli base URL (e.g. "http://tautulli.local:8181")
    pub tautulli_base_url: String,

    /// Tautulli API key (Settings > Web Interface > API)
    pub tautulli_api_key: String,

    /// Directory holding one cache generation per media kind
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Timeout applied to every outbound provider request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Promote show collections to the Home row after delivery
    #[serde(default = "default_home_promote")]
    pub home_promote: bool,

    /// Name template for delivered playlists/collections.
    /// `{kind}` and `{user}` are substituted.
    #[serde(default = "default_playlist_template")]
    pub playlist_template: String,
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_cache_dir() -> String {
    "rec-cache".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_home_promote() -> bool {
    true
}

fn default_playlist_template() -> String {
    "Fresh {kind} Recs for {user}".to_string()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}
