use serde::{Deserialize, Serialize};

/// Ordinal degree scale used for education fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EducationLevel {
    #[serde(rename = "none")]
    NoDegree,
    Associate,
    Bachelor,
    Master,
    Doctorate,
}

const DOCTORATE_WORDS: &[&str] = &["phd", "doctorate", "doctoral", "dphil", "edd"];
const MASTER_WORDS: &[&str] = &["master", "masters", "mba", "msc", "ms", "ma", "meng", "mphil"];
const BACHELOR_WORDS: &[&str] = &[
    "bachelor",
    "bachelors",
    "bsc",
    "bs",
    "ba",
    "beng",
    "btech",
    "undergraduate",
];
const ASSOCIATE_WORDS: &[&str] = &["associate", "associates"];
const NO_DEGREE_WORDS: &[&str] = &["none", "ged"];

impl EducationLevel {
    /// Ordinal rank on the degree scale, `NoDegree` being 0.
    pub fn ordinal(self) -> u8 {
        match self {
            EducationLevel::NoDegree => 0,
            EducationLevel::Associate => 1,
            EducationLevel::Bachelor => 2,
            EducationLevel::Master => 3,
            EducationLevel::Doctorate => 4,
        }
    }

    /// Map free-form degree text ("B.Sc. Computer Science", "PhD", "MBA") to a level.
    ///
    /// When several levels are mentioned the highest wins. Returns `None` if
    /// nothing in the text names a degree.
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = text.to_lowercase().replace(['.', '\''], "");
        let words: Vec<&str> = normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has_word = |table: &[&str]| words.iter().any(|w| table.contains(w));

        if has_word(DOCTORATE_WORDS) || normalized.contains("doctor of") {
            Some(EducationLevel::Doctorate)
        } else if has_word(MASTER_WORDS) {
            Some(EducationLevel::Master)
        } else if has_word(BACHELOR_WORDS) {
            Some(EducationLevel::Bachelor)
        } else if has_word(ASSOCIATE_WORDS) {
            Some(EducationLevel::Associate)
        } else if has_word(NO_DEGREE_WORDS) || normalized.contains("high school") {
            Some(EducationLevel::NoDegree)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_follows_scale() {
        assert!(EducationLevel::NoDegree < EducationLevel::Associate);
        assert!(EducationLevel::Associate < EducationLevel::Bachelor);
        assert!(EducationLevel::Bachelor < EducationLevel::Master);
        assert!(EducationLevel::Master < EducationLevel::Doctorate);
    }

    #[test]
    fn test_parse_common_degrees() {
        assert_eq!(EducationLevel::parse("Ph.D. in Physics"), Some(EducationLevel::Doctorate));
        assert_eq!(EducationLevel::parse("MBA"), Some(EducationLevel::Master));
        assert_eq!(EducationLevel::parse("Master's degree"), Some(EducationLevel::Master));
        assert_eq!(EducationLevel::parse("B.Sc. Computer Science"), Some(EducationLevel::Bachelor));
        assert_eq!(EducationLevel::parse("Bachelor of Arts"), Some(EducationLevel::Bachelor));
        assert_eq!(EducationLevel::parse("Associate degree"), Some(EducationLevel::Associate));
        assert_eq!(EducationLevel::parse("High School Diploma"), Some(EducationLevel::NoDegree));
    }

    #[test]
    fn test_parse_highest_level_wins() {
        assert_eq!(
            EducationLevel::parse("BS and MS in Electrical Engineering"),
            Some(EducationLevel::Master)
        );
    }

    #[test]
    fn test_parse_unknown_is_none() {
        assert_eq!(EducationLevel::parse("Certified Scrum Practitioner"), None);
        assert_eq!(EducationLevel::parse(""), None);
    }

    #[test]
    fn test_serde_names() {
        let level: EducationLevel = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(level, EducationLevel::NoDegree);
        assert_eq!(serde_json::to_string(&EducationLevel::Master).unwrap(), "\"master\"");
    }
}
