use anyhow::{Result, bail};
use versewright_core::{Action, SessionState, is_valid_state_transition};
use versewright_local_ml::TokenCodec;

/// Token context and state for one editing session.
///
/// The context always starts with the boundary marker's encoding.
#[derive(Debug, Clone)]
pub struct Session {
    baseline: Vec<u32>,
    context: Vec<u32>,
    eot_len: usize,
    state: SessionState,
}

impl Session {
    pub fn start(codec: &dyn TokenCodec, prompt: &str) -> Result<Self> {
        let eot = codec.boundary_tokens()?;
        let baseline = codec.encode(&format!("{}{}", codec.boundary_marker(), prompt))?;
        if !baseline.starts_with(&eot) {
            bail!("codec does not keep the boundary marker as a prefix");
        }
        Ok(Self {
            context: baseline.clone(),
            baseline,
            eot_len: eot.len(),
            state: SessionState::Sampling,
        })
    }

    pub fn context(&self) -> &[u32] {
        &self.context
    }

    /// Context without the leading boundary marker.
    pub fn visible_tokens(&self) -> &[u32] {
        &self.context[self.eot_len..]
    }

    pub fn visible_text(&self, codec: &dyn TokenCodec) -> Result<String> {
        codec.decode(self.visible_tokens())
    }

    pub fn eot_len(&self) -> usize {
        self.eot_len
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transition(&mut self, to: SessionState) -> Result<()> {
        if !is_valid_state_transition(self.state, to) {
            bail!("invalid session transition {:?} -> {:?}", self.state, to);
        }
        self.state = to;
        Ok(())
    }

    /// Applies a context edit and returns how many tokens it added, removed
    /// or discarded. Actions that leave the context alone return 0.
    ///
    /// The new context is built in full before it replaces the old one.
    pub fn apply(&mut self, codec: &dyn TokenCodec, action: &Action) -> Result<usize> {
        let (next, changed) = match action {
            Action::Accept(text) | Action::CustomText(text) => {
                let added = codec.encode(text)?;
                let count = added.len();
                let mut next = self.context.clone();
                next.extend(added);
                (next, count)
            }
            Action::DeleteChunk(requested) => {
                let removed = (*requested).min(self.context.len() - self.eot_len);
                let keep = self.context.len() - removed;
                (self.context[..keep].to_vec(), removed)
            }
            Action::ResetPrompt => (self.baseline.clone(), self.visible_tokens().len()),
            Action::Reject | Action::Save(_) | Action::Quit => return Ok(0),
        };
        self.context = next;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use versewright_testkit::WordCodec;

    #[test]
    fn session_starts_from_the_marked_prompt() {
        let codec = WordCodec::new();
        let session = Session::start(&codec, "The sea").unwrap();
        assert_eq!(session.context()[0], 0);
        assert_eq!(session.eot_len(), 1);
        assert_eq!(session.visible_text(&codec).unwrap(), "The sea");
        assert_eq!(session.state(), SessionState::Sampling);
    }

    #[test]
    fn deletion_stops_at_the_boundary_marker() {
        let codec = WordCodec::new();
        let mut session = Session::start(&codec, "The sea").unwrap();
        assert_eq!(session.apply(&codec, &Action::DeleteChunk(1)).unwrap(), 1);
        assert_eq!(session.visible_text(&codec).unwrap(), "The");
        assert_eq!(session.apply(&codec, &Action::DeleteChunk(50)).unwrap(), 1);
        assert_eq!(session.context(), &[0]);
        assert_eq!(session.apply(&codec, &Action::DeleteChunk(1)).unwrap(), 0);
    }

    #[test]
    fn reset_restores_the_prompt() {
        let codec = WordCodec::new();
        let mut session = Session::start(&codec, "The sea").unwrap();
        session
            .apply(&codec, &Action::Accept(" at night".to_string()))
            .unwrap();
        assert_eq!(session.apply(&codec, &Action::ResetPrompt).unwrap(), 4);
        assert_eq!(session.visible_text(&codec).unwrap(), "The sea");
    }

    #[test]
    fn invalid_transitions_are_refused() {
        let codec = WordCodec::new();
        let mut session = Session::start(&codec, "").unwrap();
        assert!(session.transition(SessionState::Applying).is_err());
        session.transition(SessionState::Presenting).unwrap();
        session.transition(SessionState::Quit).unwrap();
        assert!(session.transition(SessionState::Sampling).is_err());
    }
}
