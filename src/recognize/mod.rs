pub mod client;
pub mod overrides;
pub mod parser;

use crate::api::CatalogLookup;
use crate::auth::AuthProvider;
use crate::models::{ItemKind, RecognitionResult};
use client::{RecognitionService, RecognizedMedia};
use overrides::ManualOverrideMap;
use parser::{fallback_clean, parse_filename, MediaKind};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("not signed in")]
    AuthRequired,
    #[error("could not derive a title from '{0}'")]
    EmptyTitle(String),
    #[error("episode S{season:02}E{episode:02} not found")]
    EpisodeNotFound { season: u32, episode: u32 },
    #[error("recognition failed after {} attempted steps", trace.len())]
    RecognitionFailed {
        /// Ordered log of every resolution step attempted, kept so the user
        /// can create a manual override
        trace: Vec<String>,
    },
}

impl ResolveError {
    /// Single classified message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            ResolveError::AuthRequired => {
                "Not signed in - please sign in before uploading".to_string()
            }
            ResolveError::EmptyTitle(_) => {
                "Could not derive a searchable title from the filename".to_string()
            }
            ResolveError::EpisodeNotFound { season, episode } => {
                format!("Could not locate S{:02}E{:02} in the catalog", season, episode)
            }
            ResolveError::RecognitionFailed { .. } => "File recognition failed".to_string(),
        }
    }
}

/// Resolves a raw filename to the catalog item the file belongs to.
///
/// Resolution runs a strict precedence order, first success wins:
/// authorization precheck, manual override, external recognition, exact
/// lookup by external ID, filename heuristics, catalog search by title,
/// series disambiguation. Every step leaves an entry in a diagnostic trace
/// that is returned with the failure when nothing matches.
pub struct Resolver {
    auth: Arc<dyn AuthProvider>,
    recognition: Arc<dyn RecognitionService>,
    catalog: Arc<dyn CatalogLookup>,
    overrides: Arc<ManualOverrideMap>,
}

impl Resolver {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        recognition: Arc<dyn RecognitionService>,
        catalog: Arc<dyn CatalogLookup>,
        overrides: Arc<ManualOverrideMap>,
    ) -> Self {
        Self {
            auth,
            recognition,
            catalog,
            overrides,
        }
    }

    pub async fn resolve(&self, filename: &str) -> Result<RecognitionResult, ResolveError> {
        // No valid session means no network calls at all
        if !self.auth.is_authenticated() {
            return Err(ResolveError::AuthRequired);
        }

        let mut trace = vec![format!("resolving '{}'", filename)];

        // Manual override wins over everything
        if let Some(entry) = self.overrides.get(filename).await {
            info!("Resolver: manual override hit for '{}'", filename);
            return Ok(RecognitionResult {
                item_id: entry.item_id,
                kind: entry.item_type.unwrap_or(ItemKind::Single),
                title: "Manual Link".to_string(),
                grouping_id: entry.grouping_id,
            });
        }
        trace.push("no manual override".to_string());

        // External recognition, best effort
        let recognized = self.recognition.recognize(filename).await;
        match &recognized {
            Some(media) => trace.push(format!(
                "external recognition: series={} external_id={:?} s/e={:?}/{:?}",
                media.is_series, media.external_id, media.season, media.episode
            )),
            None => trace.push("external recognition unavailable".to_string()),
        }

        // Exact lookup by external ID short-circuits; any failure here is
        // logged and falls through to the heuristics
        if let Some(media) = &recognized {
            if let Some(result) = self.try_exact_lookup(media, &mut trace).await {
                return Ok(result);
            }
        }

        // Heuristic parse of the filename
        let parsed = parse_filename(filename);
        trace.push(format!(
            "heuristic parse: kind={:?} title='{}' s/e={}/{}",
            parsed.kind, parsed.title, parsed.season, parsed.episode
        ));

        // The filename heuristics decide kind/season/episode here; a
        // series-flagged recognition answer only supplies the numbers the
        // parse could not find. An episodic filename is never demoted to a
        // single item by a recognition answer.
        let (kind, season, episode) = match &recognized {
            Some(media) if media.is_series && parsed.kind != MediaKind::Series => (
                MediaKind::Series,
                media.season.unwrap_or(parsed.season),
                media.episode.unwrap_or(parsed.episode),
            ),
            _ => (parsed.kind, parsed.season, parsed.episode),
        };

        // Title precedence: recognition-provided title first, heuristic
        // cleanup second, last-resort filename cleanup third
        let mut title = recognized
            .as_ref()
            .and_then(|m| m.title.clone())
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(parsed.title);
        if title.is_empty() {
            title = fallback_clean(filename);
        }
        if title.is_empty() {
            return Err(ResolveError::EmptyTitle(filename.to_string()));
        }

        // Catalog search by title
        let results = match self.catalog.search_by_title(&title).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Resolver: catalog search failed: {}", e);
                trace.push(format!("catalog search failed: {}", e));
                Vec::new()
            }
        };

        if results.is_empty() {
            trace.push(format!("catalog search for '{}' returned no results", title));
            return Err(ResolveError::RecognitionFailed { trace });
        }

        // Prefer the first candidate carrying an external cross-reference ID,
        // otherwise the literal first result
        let candidate = results
            .iter()
            .find(|r| r.tmdb_id.is_some() || r.todb_id.is_some())
            .unwrap_or(&results[0]);
        trace.push(format!(
            "candidate: '{}' ({})",
            candidate.video_title, candidate.video_type
        ));

        if kind == MediaKind::Series && candidate.video_type == "tv" {
            let external = candidate
                .tmdb_id
                .as_deref()
                .map(|id| ("tmdb", id))
                .or(candidate.todb_id.as_deref().map(|id| ("todb", id)));

            if let Some((id_type, id_value)) = external {
                match self
                    .catalog
                    .lookup_by_external_id(id_type, id_value, Some((season, episode)))
                    .await
                {
                    Ok(result) => {
                        if let Some(ep) = result.episode_info {
                            return Ok(RecognitionResult {
                                item_id: ep.item_id,
                                kind: ItemKind::Episode,
                                title: ep.episode_title.unwrap_or_else(|| {
                                    format!(
                                        "{} S{:02}E{:02}",
                                        candidate.video_title, season, episode
                                    )
                                }),
                                grouping_id: None,
                            });
                        }
                        trace.push("candidate lookup returned no episode".to_string());
                    }
                    Err(e) => trace.push(format!("candidate lookup failed: {}", e)),
                }
            } else {
                trace.push("candidate carries no external id".to_string());
            }

            // Hard failure: no further fallback for episodic content
            return Err(ResolveError::EpisodeNotFound { season, episode });
        }

        if kind == MediaKind::Single || candidate.video_type == "vl" {
            return Ok(RecognitionResult {
                item_id: candidate.video_id.clone(),
                kind: ItemKind::Single,
                title: candidate.video_title.clone(),
                grouping_id: None,
            });
        }

        trace.push("no usable candidate".to_string());
        Err(ResolveError::RecognitionFailed { trace })
    }

    /// Step 4: direct catalog lookup by the external ID the recognition
    /// service produced. Returns `Some` only on a definitive hit.
    async fn try_exact_lookup(
        &self,
        media: &RecognizedMedia,
        trace: &mut Vec<String>,
    ) -> Option<RecognitionResult> {
        let external_id = media.external_id.as_deref()?;
        let season = media.season.unwrap_or(1);
        let episode = media.episode.unwrap_or(1);

        trace.push(format!("exact lookup by tmdb id {}", external_id));

        let lookup = self
            .catalog
            .lookup_by_external_id(
                "tmdb",
                external_id,
                media.is_series.then_some((season, episode)),
            )
            .await;

        match lookup {
            Ok(result) => {
                if media.is_series {
                    if let Some(ep) = result.episode_info {
                        let series_title = result.video_title.unwrap_or_default();
                        return Some(RecognitionResult {
                            item_id: ep.item_id,
                            kind: ItemKind::Episode,
                            title: format!("{} S{:02}E{:02}", series_title, season, episode),
                            grouping_id: None,
                        });
                    }
                    trace.push(format!(
                        "episode S{:02}E{:02} not found by external id",
                        season, episode
                    ));
                } else if let Some(item_id) = result.item_id {
                    return Some(RecognitionResult {
                        item_id,
                        kind: ItemKind::Single,
                        title: result.video_title.unwrap_or_default(),
                        grouping_id: None,
                    });
                } else {
                    trace.push("external id lookup returned no item".to_string());
                }
            }
            Err(e) => trace.push(format!("external id lookup failed: {}", e)),
        }

        None
    }
}
