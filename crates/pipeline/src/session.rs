//! Session state: the three conversation channels and their version.
//!
//! The dialogue channel is written by generation, the emotion channel by
//! classification, the layer channel by layer selection. Jobs read a
//! snapshot taken when they start and hand back whole replacement
//! histories; [`Session::commit`] accepts them only if the session has not
//! moved on since the snapshot.

use murasame_core::{History, Persona};

use crate::job::JobBundle;

/// Live session state. Owned by the coordinator.
#[derive(Debug, Clone)]
pub struct Session {
    dialogue: History,
    emotion: History,
    layers: History,
    version: u64,
}

/// A point-in-time copy of the session a job runs against.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub dialogue: History,
    pub emotion: History,
    pub layers: History,
    pub version: u64,
}

/// A commit lost the race against a newer session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("job started at session version {job_version}, session is at {session_version}")]
pub struct StaleCommit {
    pub job_version: u64,
    pub session_version: u64,
}

impl Session {
    /// A fresh session: persona-seeded dialogue, empty control channels.
    pub fn new(persona: &Persona) -> Self {
        Self {
            dialogue: persona.history(),
            emotion: History::new(),
            layers: History::new(),
            version: 0,
        }
    }

    pub fn dialogue(&self) -> &History {
        &self.dialogue
    }

    pub fn emotion(&self) -> &History {
        &self.emotion
    }

    pub fn layers(&self) -> &History {
        &self.layers
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            dialogue: self.dialogue.clone(),
            emotion: self.emotion.clone(),
            layers: self.layers.clone(),
            version: self.version,
        }
    }

    /// Install a completed job's histories if the job started from the
    /// current version. Returns the new version.
    pub fn commit(&mut self, bundle: &JobBundle) -> Result<u64, StaleCommit> {
        if bundle.base_version != self.version {
            return Err(StaleCommit {
                job_version: bundle.base_version,
                session_version: self.version,
            });
        }
        self.dialogue = bundle.dialogue.clone();
        self.emotion = bundle.emotion_history.clone();
        self.layers = bundle.layer_history.clone();
        self.version += 1;
        Ok(self.version)
    }

    /// Replace all three channels at once. In-flight jobs become stale.
    pub fn reset(&mut self, persona: &Persona) {
        self.dialogue = persona.history();
        self.emotion = History::new();
        self.layers = History::new();
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murasame_core::{Role, Turn};

    fn bundle(base_version: u64, dialogue: History) -> JobBundle {
        JobBundle {
            job_id: "job".into(),
            display_text: "「主人好」".into(),
            reply: "主人好".into(),
            translated: "ご主人".into(),
            emotion: "平静".into(),
            layers: vec![1717, 1475, 1261],
            dialogue,
            emotion_history: History::seeded("emotion"),
            layer_history: History::seeded("layers"),
            audio: None,
            base_version,
        }
    }

    fn grown(session: &Session) -> History {
        let mut dialogue = session.dialogue().clone();
        dialogue.push(Turn::user("你好"));
        dialogue.push(Turn::assistant("主人好"));
        dialogue
    }

    #[test]
    fn new_session_is_persona_only() {
        let session = Session::new(&Persona::default());
        assert_eq!(session.dialogue().len(), 1);
        assert_eq!(session.dialogue().first().unwrap().role, Role::System);
        assert!(session.emotion().is_empty());
        assert!(session.layers().is_empty());
        assert_eq!(session.version(), 0);
    }

    #[test]
    fn commit_installs_histories_and_bumps_version() {
        let mut session = Session::new(&Persona::default());
        let dialogue = grown(&session);
        assert_eq!(session.commit(&bundle(0, dialogue)), Ok(1));
        assert_eq!(session.dialogue().len(), 3);
        assert_eq!(session.emotion().len(), 1);
        assert_eq!(session.layers().len(), 1);
    }

    #[test]
    fn stale_commit_rejected() {
        let mut session = Session::new(&Persona::default());
        let first = grown(&session);
        let second = grown(&session);
        session.commit(&bundle(0, first)).unwrap();

        let err = session.commit(&bundle(0, second)).unwrap_err();
        assert_eq!(
            err,
            StaleCommit {
                job_version: 0,
                session_version: 1
            }
        );
        assert_eq!(session.dialogue().len(), 3);
    }

    #[test]
    fn reset_replaces_every_channel() {
        let mut session = Session::new(&Persona::default());
        let dialogue = grown(&session);
        session.commit(&bundle(0, dialogue)).unwrap();

        session.reset(&Persona::default());
        assert_eq!(session.dialogue().len(), 1);
        assert_eq!(session.dialogue().first().unwrap().role, Role::System);
        assert!(session.emotion().is_empty());
        assert!(session.layers().is_empty());
        assert_eq!(session.version(), 2);
    }

    #[test]
    fn reset_makes_running_jobs_stale() {
        let mut session = Session::new(&Persona::default());
        let snapshot = session.snapshot();
        session.reset(&Persona::default());
        let dialogue = snapshot.dialogue.clone();
        assert!(session.commit(&bundle(snapshot.version, dialogue)).is_err());
    }
}
