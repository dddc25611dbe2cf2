use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Kind of employment a posting offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Part-time")]
    PartTime,
    Contract,
    Internship,
    Temporary,
    Volunteer,
}

impl JobType {
    pub const ALL: [JobType; 6] = [
        JobType::FullTime,
        JobType::PartTime,
        JobType::Contract,
        JobType::Internship,
        JobType::Temporary,
        JobType::Volunteer,
    ];

    /// Label as job boards print it.
    pub fn label(self) -> &'static str {
        match self {
            JobType::FullTime => "Full-time",
            JobType::PartTime => "Part-time",
            JobType::Contract => "Contract",
            JobType::Internship => "Internship",
            JobType::Temporary => "Temporary",
            JobType::Volunteer => "Volunteer",
        }
    }

    /// Read a label, ignoring case, spacing and hyphens ("full time",
    /// "FULL-TIME" and "fulltime" all give `FullTime`).
    pub fn parse(text: &str) -> Option<Self> {
        let key = squash(text);
        if key.is_empty() {
            return None;
        }
        match key.as_str() {
            "contractor" => Some(JobType::Contract),
            "intern" => Some(JobType::Internship),
            "temp" => Some(JobType::Temporary),
            _ => Self::ALL.into_iter().find(|t| squash(t.label()) == key),
        }
    }
}

/// Seniority a posting is pitched at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExperienceLevel {
    #[serde(rename = "Entry level")]
    Entry,
    Associate,
    #[serde(rename = "Mid-Senior level")]
    MidSenior,
    #[serde(rename = "Senior level")]
    Senior,
    Director,
    Executive,
}

impl ExperienceLevel {
    pub const ALL: [ExperienceLevel; 6] = [
        ExperienceLevel::Entry,
        ExperienceLevel::Associate,
        ExperienceLevel::MidSenior,
        ExperienceLevel::Senior,
        ExperienceLevel::Director,
        ExperienceLevel::Executive,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ExperienceLevel::Entry => "Entry level",
            ExperienceLevel::Associate => "Associate",
            ExperienceLevel::MidSenior => "Mid-Senior level",
            ExperienceLevel::Senior => "Senior level",
            ExperienceLevel::Director => "Director",
            ExperienceLevel::Executive => "Executive",
        }
    }

    /// Read a label the same lenient way as [`JobType::parse`]. The
    /// trailing "level" is optional.
    pub fn parse(text: &str) -> Option<Self> {
        let key = level_key(text);
        if key.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|l| level_key(l.label()) == key)
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown job type: {}", s))
    }
}

impl FromStr for ExperienceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown experience level: {}", s))
    }
}

/// Optional field that reads any spelling `FromStr` accepts and drops
/// values it does not recognise.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

fn level_key(text: &str) -> String {
    let key = squash(text);
    key.strip_suffix("level").map(str::to_string).unwrap_or(key)
}

fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_parse() {
        assert_eq!(JobType::parse("Full-time"), Some(JobType::FullTime));
        assert_eq!(JobType::parse("full time"), Some(JobType::FullTime));
        assert_eq!(JobType::parse("PART_TIME"), Some(JobType::PartTime));
        assert_eq!(JobType::parse("contractor"), Some(JobType::Contract));
        assert_eq!(JobType::parse(" Volunteer "), Some(JobType::Volunteer));
        assert_eq!(JobType::parse("gig"), None);
        assert_eq!(JobType::parse(""), None);
    }

    #[test]
    fn test_experience_level_parse() {
        assert_eq!(ExperienceLevel::parse("Entry level"), Some(ExperienceLevel::Entry));
        assert_eq!(ExperienceLevel::parse("entry"), Some(ExperienceLevel::Entry));
        assert_eq!(ExperienceLevel::parse("mid-senior"), Some(ExperienceLevel::MidSenior));
        assert_eq!(ExperienceLevel::parse("Senior Level"), Some(ExperienceLevel::Senior));
        assert_eq!(ExperienceLevel::parse("executive"), Some(ExperienceLevel::Executive));
        assert_eq!(ExperienceLevel::parse("level"), None);
        assert_eq!(ExperienceLevel::parse("wizard"), None);
    }

    #[test]
    fn test_labels_parse_back() {
        for t in JobType::ALL {
            assert_eq!(JobType::parse(t.label()), Some(t));
            assert_eq!(t.to_string(), t.label());
        }
        for l in ExperienceLevel::ALL {
            assert_eq!(ExperienceLevel::parse(l.label()), Some(l));
        }
    }

    #[test]
    fn test_serde_uses_labels() {
        assert_eq!(serde_json::to_string(&JobType::FullTime).unwrap(), "\"Full-time\"");
        assert_eq!(
            serde_json::to_string(&ExperienceLevel::MidSenior).unwrap(),
            "\"Mid-Senior level\""
        );
        let level: ExperienceLevel = serde_json::from_str("\"Director\"").unwrap();
        assert_eq!(level, ExperienceLevel::Director);
    }
}
