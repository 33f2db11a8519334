//! Card rendering: templates, attachments, and extension result envelopes.

pub mod model;
pub mod template;

pub use model::{
    ActionType, Attachment, CardAction, CardImage, ExtensionResponse, ExtensionResult, HeroCard,
};
pub use template::{CardTemplate, RenderedCard, TemplateRegistry};
