//! Retention policy and deterministic artifact naming.

use chrono::NaiveDateTime;

use super::BackupError;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub name: String,
    pub created_at: NaiveDateTime,
}

/// Keep at most `max_count` artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    max_count: usize,
}

impl RetentionPolicy {
    pub fn new(max_count: usize) -> Result<Self, BackupError> {
        if max_count == 0 {
            return Err(BackupError::InvalidPolicy("max_count must be at least 1".to_string()));
        }
        Ok(Self { max_count })
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Oldest `count - max_count` artifacts, oldest first. Ties on
    /// `created_at` are broken by name.
    pub fn select_for_deletion(&self, existing: &[BackupArtifact]) -> Vec<BackupArtifact> {
        if existing.len() <= self.max_count {
            return Vec::new();
        }

        let mut sorted = existing.to_vec();
        sorted.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        sorted.truncate(existing.len() - self.max_count);
        sorted
    }
}

/// `PREFIX_YYYYMMDDHHMMSS.ext`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming {
    prefix: String,
    extension: String,
}

impl ArtifactNaming {
    pub fn new(prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    pub fn name_for(&self, timestamp: NaiveDateTime) -> String {
        format!("{}_{}.{}", self.prefix, timestamp.format(TIMESTAMP_FORMAT), self.extension)
    }

    /// Glob for files that look like artifacts of this naming.
    pub fn file_pattern(&self) -> String {
        format!(
            "{}_*.{}",
            glob::Pattern::escape(&self.prefix),
            glob::Pattern::escape(&self.extension)
        )
    }

    pub fn matches(&self, name: &str) -> bool {
        self.middle(name).is_some()
    }

    /// Timestamp encoded in `name`, if it follows the naming exactly.
    pub fn parse_timestamp(&self, name: &str) -> Option<NaiveDateTime> {
        let stamp = self.middle(name)?;
        if stamp.len() != 14 {
            return None;
        }
        NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
    }

    fn middle<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_prefix(self.prefix.as_str())?
            .strip_prefix('_')?
            .strip_suffix(self.extension.as_str())?
            .strip_suffix('.')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap()
    }

    fn artifacts(days: &[u32]) -> Vec<BackupArtifact> {
        let naming = ArtifactNaming::new("Tipi", "tar.gz");
        days.iter()
            .map(|&d| BackupArtifact {
                name: naming.name_for(at(d)),
                created_at: at(d),
            })
            .collect()
    }

    #[test]
    fn zero_max_count_is_rejected() {
        assert!(matches!(RetentionPolicy::new(0), Err(BackupError::InvalidPolicy(_))));
        assert_eq!(RetentionPolicy::new(1).unwrap().max_count(), 1);
    }

    #[test]
    fn deletes_the_oldest_surplus_oldest_first() {
        let policy = RetentionPolicy::new(3).unwrap();
        let existing = artifacts(&[4, 1, 5, 3, 2]);

        let doomed = policy.select_for_deletion(&existing);

        assert_eq!(doomed, artifacts(&[1, 2]));
    }

    #[test]
    fn nothing_to_delete_at_or_under_the_limit() {
        let policy = RetentionPolicy::new(3).unwrap();
        assert!(policy.select_for_deletion(&artifacts(&[1, 2, 3])).is_empty());
        assert!(policy.select_for_deletion(&artifacts(&[1])).is_empty());
        assert!(policy.select_for_deletion(&[]).is_empty());
    }

    #[test]
    fn reapplying_after_deletion_selects_nothing() {
        let policy = RetentionPolicy::new(2).unwrap();
        let existing = artifacts(&[1, 2, 3, 4, 5, 6]);

        let doomed = policy.select_for_deletion(&existing);
        let kept: Vec<BackupArtifact> =
            existing.into_iter().filter(|a| !doomed.contains(a)).collect();

        assert_eq!(kept, artifacts(&[5, 6]));
        assert!(policy.select_for_deletion(&kept).is_empty());
    }

    #[test]
    fn equal_timestamps_break_ties_by_name() {
        let policy = RetentionPolicy::new(1).unwrap();
        let existing = vec![
            BackupArtifact { name: "b".into(), created_at: at(1) },
            BackupArtifact { name: "a".into(), created_at: at(1) },
        ];
        assert_eq!(policy.select_for_deletion(&existing)[0].name, "a");
    }

    #[test]
    fn names_encode_the_timestamp() {
        let naming = ArtifactNaming::new("Tipi", ".tar.gz");
        let ts = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();

        let name = naming.name_for(ts);

        assert_eq!(name, "Tipi_20240131235959.tar.gz");
        assert_eq!(naming.parse_timestamp(&name), Some(ts));
        assert_eq!(naming.file_pattern(), "Tipi_*.tar.gz");
    }

    #[test]
    fn foreign_names_do_not_parse() {
        let naming = ArtifactNaming::new("Tipi", "tar.gz");
        assert!(naming.matches("Tipi_manual.tar.gz"));
        assert_eq!(naming.parse_timestamp("Tipi_manual.tar.gz"), None);
        assert_eq!(naming.parse_timestamp("Tipi_20241301000000.tar.gz"), None);
        assert!(!naming.matches("Other_20240131235959.tar.gz"));
        assert!(!naming.matches("Tipi_20240131235959.zip"));
    }
}
