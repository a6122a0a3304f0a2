// src/bot/chat_log.rs - Append-only category log files

use chrono::{DateTime, Local, TimeZone};
use log::{debug, info};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::types::{Category, Player};

/// One text file per category inside a shared log directory
#[derive(Debug, Clone)]
pub struct ChatLog {
    directory: PathBuf,
    general_path: PathBuf,
    obscene_path: PathBuf,
}

impl ChatLog {
    pub fn new<P: AsRef<Path>>(directory: P, general_name: &str, obscene_name: &str) -> Self {
        let directory = directory.as_ref().to_path_buf();
        Self {
            general_path: directory.join(general_name),
            obscene_path: directory.join(obscene_name),
            directory,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, category: Category) -> &Path {
        match category {
            Category::General => &self.general_path,
            Category::Obscene => &self.obscene_path,
        }
    }

    /// Create the log directory if it is missing
    pub fn ensure_directory(&self) -> io::Result<()> {
        if !self.directory.exists() {
            fs::create_dir_all(&self.directory)?;
            info!("Created chat log directory: {}", self.directory.display());
        }
        Ok(())
    }

    /// Append one line for a matched message, stamped with local time
    pub fn append(&self, category: Category, player: &Player, message: &str) -> io::Result<()> {
        self.append_at(category, player, message, Local::now())
    }

    pub fn append_at<Tz: TimeZone>(
        &self,
        category: Category,
        player: &Player,
        message: &str,
        timestamp: DateTime<Tz>,
    ) -> io::Result<()>
    where
        Tz::Offset: std::fmt::Display,
    {
        self.ensure_directory()?;

        let path = self.path_for(category);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", format_log_line(&timestamp, player, message))?;

        debug!("Logged {} message from {} to {}", category, player.name, path.display());
        Ok(())
    }
}

/// `[YYYY-MM-DD HH:MM:SS | PlayerUID: <uid>] <name>: <message>`
pub fn format_log_line<Tz: TimeZone>(timestamp: &DateTime<Tz>, player: &Player, message: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "[{} | PlayerUID: {}] {}: {}",
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        player.uid,
        player.name,
        message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    #[test]
    fn test_log_line_format() {
        let player = Player::new("abc123", "Steve");
        assert_eq!(
            format_log_line(&fixed_time(), &player, "hello world"),
            "[2024-03-09 07:05:01 | PlayerUID: abc123] Steve: hello world"
        );
    }

    #[test]
    fn test_append_creates_directory_and_separates_categories() {
        let temp_dir = tempdir().unwrap();
        let log_dir = temp_dir.path().join("nested").join("logs");
        let log = ChatLog::new(&log_dir, "general.log", "obscene.log");
        let player = Player::new("uid-7", "Alex");

        log.append_at(Category::Obscene, &player, "first", fixed_time()).unwrap();
        log.append_at(Category::Obscene, &player, "second", fixed_time()).unwrap();
        log.append_at(Category::General, &player, "third", fixed_time()).unwrap();

        let obscene = fs::read_to_string(log_dir.join("obscene.log")).unwrap();
        let lines: Vec<&str> = obscene.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Alex: first"));
        assert!(lines[1].ends_with("Alex: second"));

        let general = fs::read_to_string(log_dir.join("general.log")).unwrap();
        assert_eq!(general.lines().count(), 1);
    }

    #[test]
    fn test_append_reports_unwritable_target() {
        let temp_dir = tempdir().unwrap();
        // A regular file where the directory should be
        let blocker = temp_dir.path().join("blocked");
        fs::write(&blocker, "not a directory").unwrap();

        let log = ChatLog::new(blocker.join("logs"), "g.log", "o.log");
        let result = log.append(Category::General, &Player::new("u", "n"), "msg");
        assert!(result.is_err());
    }
}
