//! Picks a gallery image in reply to a chat message.
//!
//! Three stages run in order: whole-message keyword equality against
//! exact-match galleries, keyword containment against fuzzy galleries, then
//! BM25 relevance over every gallery. The first stage with a candidate
//! decides; its probability gate may still decline to answer.

use crate::gallery::{Outcome, StoredImage};
use crate::manager::{GalleryManager, ManagerError};
use crate::relevance::RelevanceBM25;
use crate::MatchingConfig;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    Fuzzy,
    Relevance,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchMode::Exact => "exact",
            MatchMode::Fuzzy => "fuzzy",
            MatchMode::Relevance => "relevance",
        })
    }
}

/// Gallery chosen for a message, before an image is drawn from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub gallery: String,
    pub mode: MatchMode,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchHit {
    pub gallery: String,
    pub mode: MatchMode,
    pub score: f64,
    pub image: StoredImage,
}

/// What the matcher needs to know about a gallery.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub tags: Vec<String>,
    pub fuzzy: bool,
}

pub struct AutoMatcher {
    config: MatchingConfig,
    bm25: RelevanceBM25,
}

impl AutoMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self {
            config,
            bm25: RelevanceBM25::default(),
        }
    }

    pub fn score(&self, tags: &[String], message: &str) -> f64 {
        self.bm25.calc(tags, message)
    }

    /// Decide which gallery, if any, should answer `message`.
    pub fn select<R: Rng + ?Sized>(
        &self,
        candidates: &[Candidate],
        message: &str,
        rng: &mut R,
    ) -> Option<Selection> {
        let message = message.trim();
        let length = message.chars().count();
        if length < self.config.user_min_msg_len || length > self.config.user_max_msg_len {
            return None;
        }

        let exact: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| !c.fuzzy && c.tags.iter().any(|t| t == message))
            .collect();
        if !exact.is_empty() {
            return gate(rng, self.config.exact_prob)
                .then(|| exact.choose(rng))
                .flatten()
                .map(|c| Selection {
                    gallery: c.name.clone(),
                    mode: MatchMode::Exact,
                    score: 1.0,
                });
        }

        let fuzzy: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.fuzzy && c.tags.iter().any(|t| !t.is_empty() && message.contains(t.as_str())))
            .collect();
        if !fuzzy.is_empty() {
            return gate(rng, self.config.fuzzy_prob)
                .then(|| fuzzy.choose(rng))
                .flatten()
                .map(|c| Selection {
                    gallery: c.name.clone(),
                    mode: MatchMode::Fuzzy,
                    score: 1.0,
                });
        }

        let best = candidates
            .iter()
            .map(|c| (c, self.score(&c.tags, message)))
            .filter(|(_, score)| *score > self.config.bm25_threshold)
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        debug!("Best relevance for {:?}: '{}' at {}", message, best.0.name, best.1);

        gate(rng, self.config.bm25_prob).then(|| Selection {
            gallery: best.0.name.clone(),
            mode: MatchMode::Relevance,
            score: best.1,
        })
    }

    /// Select a gallery for `message` and draw a random image from it.
    pub async fn pick(&self, manager: &GalleryManager, message: &str) -> Result<Option<MatchHit>, ManagerError> {
        let mut rng = StdRng::from_rng(&mut rand::rng());
        self.pick_with_rng(manager, message, &mut rng).await
    }

    pub async fn pick_with_rng<R: Rng + Send>(
        &self,
        manager: &GalleryManager,
        message: &str,
        rng: &mut R,
    ) -> Result<Option<MatchHit>, ManagerError> {
        let mut candidates = Vec::new();
        for gallery in manager.get_all_galleries().await {
            let settings = gallery.settings().await;
            candidates.push(Candidate {
                name: gallery.name().to_string(),
                tags: settings.tags,
                fuzzy: settings.fuzzy,
            });
        }

        let Some(selection) = self.select(&candidates, message, rng) else {
            return Ok(None);
        };
        let Some(gallery) = manager.get_gallery(&selection.gallery).await else {
            return Ok(None);
        };

        Ok(match gallery.random_image().await? {
            Outcome::Done(image) => Some(MatchHit {
                gallery: selection.gallery,
                mode: selection.mode,
                score: selection.score,
                image,
            }),
            Outcome::Rejected(rejection) => {
                debug!("Matched gallery has nothing to send: {}", rejection);
                None
            }
        })
    }
}

fn gate<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    if probability.is_nan() {
        return false;
    }
    rng.random_bool(probability.clamp(0.0, 1.0))
}
