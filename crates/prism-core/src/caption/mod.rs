//! Caption generation for processed images.
//!
//! A single long-lived [`Captioner`] is built at startup from config and
//! shared by every worker. Providers make one attempt per image; failures are
//! returned to the worker, which degrades them into a diagnostic caption.

pub(crate) mod anthropic;
pub(crate) mod ollama;
pub(crate) mod openai;
pub(crate) mod provider;

pub use provider::{
    resolve_env_var, CaptionSettings, Captioner, CaptionerFactory, DisabledCaptioner, ImageInput,
};
