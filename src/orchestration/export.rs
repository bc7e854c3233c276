//! Favorites export command.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::export::export_to_jsonl;
use crate::state::TrackerState;

/// Writes every favorite (with history) as JSONL. Returns the record count.
#[tracing::instrument(skip_all, fields(output = %output.as_ref().display()))]
pub fn run_export_command<P: AsRef<Path>, Q: AsRef<Path>>(
    data_dir: P,
    output: Q,
) -> Result<usize, Box<dyn std::error::Error>> {
    let state = TrackerState::new(data_dir)?;
    let favorites = state.all_favorites()?;

    let mut writer = BufWriter::new(File::create(output.as_ref())?);
    let count = export_to_jsonl(&favorites, &mut writer)?;

    tracing::info!(count, "Export complete");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Favorite;
    use crate::sites::SiteKey;
    use tempfile::TempDir;

    #[test]
    fn test_export_command_writes_lines() {
        let dir = TempDir::new().unwrap();
        {
            let state = TrackerState::new(dir.path()).unwrap();
            state
                .put_favorite("alice", &Favorite::new("f1", SiteKey::Trendyol, "https://www.trendyol.com/a-p-1", ""))
                .unwrap();
            state
                .put_favorite("alice", &Favorite::new("f2", SiteKey::N11, "", "kettle"))
                .unwrap();
        }

        let output = dir.path().join("out.jsonl");
        let count = run_export_command(dir.path(), &output).unwrap();
        assert_eq!(count, 2);
        assert_eq!(std::fs::read_to_string(&output).unwrap().lines().count(), 2);
    }
}
