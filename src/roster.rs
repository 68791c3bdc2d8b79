use std::collections::HashMap;

use crate::model::Participant;

/// Authoritative identity -> participant mapping, iterated in insertion order.
///
/// Holds at most one entry per identity: inserting a known identity is refused
/// and leaves the existing entry untouched.
#[derive(Debug, Clone)]
pub struct Roster<R> {
    participants: HashMap<String, Participant<R>>,
    order: Vec<String>,
}

impl<R> Default for Roster<R> {
    fn default() -> Self {
        Roster {
            participants: HashMap::new(),
            order: vec![],
        }
    }
}

impl<R> Roster<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `participant`. Returns false if its identity is already present.
    pub fn insert(&mut self, participant: Participant<R>) -> bool {
        if self.participants.contains_key(&participant.id) {
            return false;
        }

        self.order.push(participant.id.clone());
        self.participants.insert(participant.id.clone(), participant);
        true
    }

    pub fn remove(&mut self, identity: &str) -> Option<Participant<R>> {
        let removed = self.participants.remove(identity)?;
        self.order.retain(|id| id != identity);
        Some(removed)
    }

    pub fn get(&self, identity: &str) -> Option<&Participant<R>> {
        self.participants.get(identity)
    }

    pub(crate) fn get_mut(&mut self, identity: &str) -> Option<&mut Participant<R>> {
        self.participants.get_mut(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.participants.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.participants.clear();
        self.order.clear();
    }

    pub fn identities(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant<R>> {
        self.order.iter().filter_map(|id| self.participants.get(id))
    }
}

impl<R: Clone> Roster<R> {
    /// Ordered copy handed to consumers; they never see the mapping itself.
    pub fn to_vec(&self) -> Vec<Participant<R>> {
        self.iter().cloned().collect()
    }
}

impl<R> FromIterator<Participant<R>> for Roster<R> {
    fn from_iter<I: IntoIterator<Item = Participant<R>>>(iter: I) -> Self {
        let mut roster = Roster::new();
        for participant in iter {
            roster.insert(participant);
        }
        roster
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParticipantKind;

    fn participant(id: &str) -> Participant<()> {
        Participant {
            id: id.to_string(),
            name: id.to_uppercase(),
            label: "Participant".to_string(),
            avatar: String::new(),
            audio_enabled: true,
            video_enabled: true,
            kind: ParticipantKind::Remote,
            track: None,
        }
    }

    fn ids(roster: &Roster<()>) -> Vec<&str> {
        roster.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn keeps_insertion_order() {
        let roster: Roster<()> = ["local", "zed", "amy"].into_iter().map(participant).collect();
        assert_eq!(ids(&roster), vec!["local", "zed", "amy"]);
    }

    #[test]
    fn refuses_duplicate_identity() {
        let mut roster = Roster::new();
        assert!(roster.insert(participant("u1")));

        let mut changed = participant("u1");
        changed.name = "Someone else".to_string();
        assert!(!roster.insert(changed));

        assert_eq!(roster.len(), 1);
        assert_eq!(roster.get("u1").map(|p| p.name.as_str()), Some("U1"));
    }

    #[test]
    fn remove_preserves_remaining_order() {
        let mut roster: Roster<()> = ["a", "b", "c"].into_iter().map(participant).collect();
        assert!(roster.remove("b").is_some());
        assert!(roster.remove("b").is_none());
        assert_eq!(ids(&roster), vec!["a", "c"]);

        roster.insert(participant("b"));
        assert_eq!(ids(&roster), vec!["a", "c", "b"]);
    }

    #[test]
    fn clear_empties_everything() {
        let mut roster: Roster<()> = ["a", "b"].into_iter().map(participant).collect();
        roster.clear();
        assert!(roster.is_empty());
        assert!(!roster.contains("a"));
    }
}
