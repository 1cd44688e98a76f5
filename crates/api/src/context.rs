/// Acting operator for a request, taken from the `X-User` header.
///
/// The label is opaque and unverified; an absent header yields an empty actor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorContext {
    actor: String,
}

impl ActorContext {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }
}
