use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::core::message::{Conversation, Message};

/// On-disk form of a saved conversation.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedConversation {
    pub model: String,
    pub saved_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

pub fn default_file_name(now: DateTime<Local>) -> String {
    format!("termpal-chat-{}.json", now.format("%Y%m%d-%H%M%S"))
}

/// `requested` as given, otherwise a timestamped name inside `dir` (or the
/// current directory).
pub fn resolve_save_path(requested: Option<&str>, dir: Option<&Path>) -> PathBuf {
    match requested {
        Some(name) => PathBuf::from(name),
        None => {
            let name = default_file_name(Local::now());
            match dir {
                Some(dir) => dir.join(name),
                None => PathBuf::from(name),
            }
        }
    }
}

/// Write the conversation as pretty JSON. The target is replaced only after
/// the whole document has been written.
pub fn save(
    path: &Path,
    model: &str,
    conversation: &Conversation,
) -> Result<(), Box<dyn std::error::Error>> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let document = SavedConversation {
        model: model.to_string(),
        saved_at: Utc::now(),
        messages: conversation.messages().to_vec(),
    };

    let mut temp_file = NamedTempFile::new_in(parent)?;
    serde_json::to_writer_pretty(&mut temp_file, &document)?;
    writeln!(temp_file)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path)?;
    Ok(())
}

pub fn load(path: &Path) -> Result<SavedConversation, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let document: SavedConversation = serde_json::from_str(&contents)
        .map_err(|e| format!("{} is not a saved conversation: {e}", path.display()))?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::MessageStatus;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn save_then_load_preserves_messages() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("chats").join("session.json");

        let mut conversation = Conversation::new();
        conversation.push(Message::user("hello"));
        conversation.push(Message::assistant("hi th", MessageStatus::Cancelled));

        save(&path, "gemini-2.0-flash", &conversation).expect("save");
        let loaded = load(&path).expect("load");
        assert_eq!(loaded.model, "gemini-2.0-flash");
        assert_eq!(loaded.messages, conversation.messages());
    }

    #[test]
    fn load_rejects_foreign_json() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("other.json");
        std::fs::write(&path, r#"{"hello":"world"}"#).expect("write");
        let err = load(&path).expect_err("not a transcript");
        assert!(err.to_string().contains("is not a saved conversation"));
    }

    #[test]
    fn default_names_are_timestamped() {
        let when = Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .expect("valid time");
        assert_eq!(default_file_name(when), "termpal-chat-20240309-140507.json");

        let path = resolve_save_path(None, Some(Path::new("/tmp/chats")));
        assert!(path.starts_with("/tmp/chats"));
        assert_eq!(
            resolve_save_path(Some("mine.json"), Some(Path::new("/tmp"))),
            PathBuf::from("mine.json")
        );
    }
}
