//! The moderation pipeline: lexicon screen, then remote classifier.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use murmur_core::constants::OFFENSIVE_LABEL;

use crate::classifier::Classifier;
use crate::lexicon::Lexicon;
use crate::notify::Notice;

/// Verdict from the remote classifier stage.
///
/// Only reached when the lexicon passes the line; a lexical hit
/// short-circuits before any classification happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Scored, and the winning label was not offensive.
    NotOffensive,
    /// The service failed, or returned nothing usable. Fails open.
    CouldNotClassify,
    /// The winning label was offensive. The line is not relayed.
    Offensive,
}

/// Everything the session handler needs after moderating one line.
#[derive(Debug, Clone)]
pub struct ModerationOutcome {
    /// Classifier verdict, `None` when the lexicon short-circuited.
    pub classification: Option<Classification>,
    /// Whether the line may be published to subscribers.
    pub relay: bool,
    /// Text to echo back to the sender (no trailing newline).
    pub reply: String,
    /// Operator notice describing the verdict.
    pub notice: Notice,
}

/// Optional thumbnail URLs for operator notices, one per verdict.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thumbnails {
    /// Shown on blocked lines.
    pub blocked: Option<String>,
    /// Shown on relayed lines.
    pub relayed: Option<String>,
    /// Shown when the classifier could not score the line.
    pub unscored: Option<String>,
}

/// Moderates lines on behalf of session handlers.
#[derive(Clone)]
pub struct ModerationPipeline {
    lexicon: Lexicon,
    classifier: Arc<dyn Classifier>,
    thumbnails: Thumbnails,
}

impl std::fmt::Debug for ModerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationPipeline")
            .field("lexicon", &self.lexicon)
            .finish_non_exhaustive()
    }
}

impl ModerationPipeline {
    /// Build a pipeline over the given gates.
    #[must_use]
    pub fn new(lexicon: Lexicon, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            lexicon,
            classifier,
            thumbnails: Thumbnails::default(),
        }
    }

    /// Attach per-verdict thumbnails to the notices this pipeline emits.
    #[must_use]
    pub fn with_thumbnails(mut self, thumbnails: Thumbnails) -> Self {
        self.thumbnails = thumbnails;
        self
    }

    /// Moderate one trimmed line from `sender`.
    ///
    /// Always returns an outcome; there is no error path. Classifier
    /// failures degrade to [`Classification::CouldNotClassify`] and the
    /// line is relayed anyway.
    pub async fn moderate(&self, sender: &str, line: &str) -> ModerationOutcome {
        if self.lexicon.is_profane(line) {
            debug!(sender, "lexicon rejected line");
            return ModerationOutcome {
                classification: None,
                relay: false,
                reply: format!(
                    "please remember to be kind and keep it clean. \
                     not sending your message. you sent me: {line}"
                ),
                notice: Notice::lexical_block(sender, line, self.thumbnails.blocked.clone()),
            };
        }

        let classification = self.classify(line).await;
        match classification {
            Classification::Offensive => ModerationOutcome {
                classification: Some(classification),
                relay: false,
                reply: format!(
                    "your message seems like it might be offensive. \
                     we didn't relay it. you sent me: {line}"
                ),
                notice: Notice::classifier_block(sender, line, self.thumbnails.blocked.clone()),
            },
            Classification::CouldNotClassify => ModerationOutcome {
                classification: Some(classification),
                relay: true,
                reply: format!(
                    "i couldn't tell if your message was offensive. \
                     sending it anyway. you sent me: {line}"
                ),
                notice: Notice::unscored(sender, line, self.thumbnails.unscored.clone()),
            },
            Classification::NotOffensive => ModerationOutcome {
                classification: Some(classification),
                relay: true,
                reply: format!("you sent me: {line}"),
                notice: Notice::relayed(sender, line, self.thumbnails.relayed.clone()),
            },
        }
    }

    /// The service ranks its labels; the first element is the verdict.
    /// Service failure or an empty result fails open.
    async fn classify(&self, line: &str) -> Classification {
        let scores = match self.classifier.classify(line).await {
            Ok(scores) => scores,
            Err(error) => {
                warn!(%error, "classifier unavailable, relaying unscored");
                return Classification::CouldNotClassify;
            }
        };
        let Some(top) = scores.first() else {
            warn!("classifier returned no scores, relaying unscored");
            return Classification::CouldNotClassify;
        };
        debug!(label = %top.label, score = top.score, "classifier verdict");
        if top.label == OFFENSIVE_LABEL {
            Classification::Offensive
        } else {
            Classification::NotOffensive
        }
    }
}
