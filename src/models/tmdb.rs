//! TMDB wire payloads.
//!
//! Every optional field carries `#[serde(default)]` so absent data collapses to
//! the documented defaults here, at the parse boundary, instead of leaking
//! `Option`s into the feature pipeline.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Genre {
    pub name: String,
}

/// Response from GET /movie/{id}
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieDetails {
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub release_date: Option<String>,
}

/// Response from GET /tv/{id}
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TvDetails {
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub episode_run_time: Vec<u32>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub first_air_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CastMember {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrewMember {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub job: String,
    #[serde(default)]
    pub department: String,
}

/// Response from GET /movie/{id}/credits
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

/// Response from GET /tv/{id}/season/{s}/episode/{e}/credits
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EpisodeCredits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub guest_stars: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FindResult {
    pub id: u64,
}

/// Response from GET /find/{imdb_id}?external_source=imdb_id
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindResults {
    #[serde(default)]
    pub movie_results: Vec<FindResult>,
    #[serde(default)]
    pub tv_results: Vec<FindResult>,
}
