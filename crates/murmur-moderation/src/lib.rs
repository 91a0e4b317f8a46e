//! Message moderation for the relay.
//!
//! Incoming lines pass through two gates before they are allowed onto the
//! broadcast fan-out:
//!
//! 1. A local [`Lexicon`] screen — cheap, word-boundary aware, and final.
//!    A lexical hit short-circuits the pipeline; the remote classifier is
//!    never consulted for that line.
//! 2. A remote [`Classifier`] — an HTTP scoring service whose verdict gates
//!    relaying. Classifier failures fail *open*: an unreachable or
//!    misbehaving service must never silence the relay.
//!
//! Every moderated line also produces a [`Notice`] for the operator sink,
//! delivered fire-and-forget by [`Notifier`].

#![deny(unsafe_code)]

mod classifier;
mod lexicon;
mod notify;
mod pipeline;

pub use classifier::{Classifier, ClassifierError, ClassifierScore, HttpClassifier};
pub use lexicon::Lexicon;
pub use notify::{Notice, NoticeAction, Notifier};
pub use pipeline::{Classification, ModerationOutcome, ModerationPipeline, Thumbnails};
