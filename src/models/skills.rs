use serde::{Deserialize, Serialize};

/// Ordered, case-insensitively deduplicated set of skill names.
///
/// The first spelling seen for a skill is the one kept, and iteration follows
/// insertion order. Blank entries are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SkillSet {
    skills: Vec<String>,
    keys: Vec<String>,
}

impl SkillSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a skill. Returns `false` if it was blank or already present.
    pub fn insert(&mut self, skill: &str) -> bool {
        let skill = skill.trim();
        if skill.is_empty() {
            return false;
        }

        let key = skill.to_lowercase();
        if self.keys.contains(&key) {
            return false;
        }

        self.skills.push(skill.to_string());
        self.keys.push(key);
        true
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn contains(&self, skill: &str) -> bool {
        let key = skill.trim().to_lowercase();
        self.keys.contains(&key)
    }

    /// Skills as originally spelled, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.skills.iter().map(String::as_str)
    }

    /// `(original, lowercase)` pairs in insertion order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.skills
            .iter()
            .map(String::as_str)
            .zip(self.keys.iter().map(String::as_str))
    }

    /// Lowercase keys in insertion order.
    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for SkillSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SkillSet::new();
        for skill in iter {
            set.insert(skill.as_ref());
        }
        set
    }
}

impl From<Vec<String>> for SkillSet {
    fn from(skills: Vec<String>) -> Self {
        skills.into_iter().collect()
    }
}

impl From<SkillSet> for Vec<String> {
    fn from(set: SkillSet) -> Self {
        set.skills
    }
}
