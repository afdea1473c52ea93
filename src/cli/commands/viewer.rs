//! Staging for `tools view`.
//!
//! Each session unpacks the visualization into its own directory under
//! `<home>/views/` and holds a lock on it until the user quits. A session
//! killed by Control-C leaves an unlocked directory behind; the next
//! `tools view` removes it before staging.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use uuid::Uuid;

use crate::core::result::Artifact;
use crate::store::CacheLock;

pub const QUIT_PROMPT: &str = "Press 'q' then Enter, Control-C, or Control-D to quit. \
    This view may no longer be accessible or work correctly after quitting.";

/// No display to open a browser on.
pub fn is_headless() -> bool {
    if cfg!(any(target_os = "macos", windows)) {
        return false;
    }
    ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .all(|var| std::env::var_os(var).map_or(true, |v| v.is_empty()))
}

/// An unpacked visualization, locked for the life of the session.
#[derive(Debug)]
pub struct StagedView {
    pub dir: PathBuf,
    pub index: PathBuf,
    lock: Option<CacheLock>,
}

impl StagedView {
    pub fn stage(views: &Path, viz: &Artifact, index_name: &str) -> Result<Self> {
        let dir = views.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&dir).with_context(|| format!("cannot create {}", dir.display()))?;
        let lock = CacheLock::acquire(&dir)?;
        let root = viz
            .extract(&dir)
            .with_context(|| format!("cannot unpack the visualization into {}", dir.display()))?;
        Ok(Self {
            index: root.join("data").join(index_name),
            dir,
            lock: Some(lock),
        })
    }

    /// Release the lock and delete the unpacked files.
    pub fn close(mut self) -> io::Result<()> {
        drop(self.lock.take());
        fs::remove_dir_all(&self.dir)
    }
}

/// Remove views whose session is gone. Returns how many were removed.
pub fn prune_stale(views: &Path) -> usize {
    let Ok(entries) = fs::read_dir(views) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|dir| dir.is_dir() && !CacheLock::is_contended(dir))
        .filter(|dir| fs::remove_dir_all(dir).is_ok())
        .count()
}

/// Block until the user quits.
///
/// Quitting is a line starting with `q`, end of input, or an interrupted
/// read.
pub fn wait_for_quit(input: &mut impl BufRead, prompt: &mut impl Write) -> io::Result<()> {
    loop {
        write!(prompt, "{}", QUIT_PROMPT)?;
        prompt.flush()?;
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) if line.trim_start().starts_with('q') => break,
            Ok(_) => writeln!(prompt)?,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => break,
            Err(e) => return Err(e),
        }
    }
    writeln!(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn viz() -> Artifact {
        Artifact::visualization(json!({"index.html": "<p>hi</p>"}))
    }

    #[test]
    fn stage_unpacks_and_close_removes() {
        let temp = TempDir::new().unwrap();
        let staged = StagedView::stage(temp.path(), &viz(), "index.html").unwrap();
        assert_eq!(fs::read_to_string(&staged.index).unwrap(), "<p>hi</p>");
        assert!(CacheLock::is_contended(&staged.dir));

        let dir = staged.dir.clone();
        staged.close().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn prune_keeps_live_sessions() {
        let temp = TempDir::new().unwrap();
        let live = StagedView::stage(temp.path(), &viz(), "index.html").unwrap();
        let stale = temp.path().join("left-behind");
        fs::create_dir_all(stale.join("data")).unwrap();

        assert_eq!(prune_stale(temp.path()), 1);
        assert!(!stale.exists());
        assert!(live.dir.exists());
        assert_eq!(prune_stale(&temp.path().join("missing")), 0);
        live.close().unwrap();
    }

    #[test]
    fn quits_on_q_or_end_of_input() {
        let mut prompt = Vec::new();
        wait_for_quit(&mut Cursor::new("\nnope\nq\nunread\n"), &mut prompt).unwrap();
        let text = String::from_utf8(prompt).unwrap();
        assert_eq!(text.matches("Press 'q'").count(), 3);

        let mut prompt = Vec::new();
        wait_for_quit(&mut Cursor::new(""), &mut prompt).unwrap();
        assert!(String::from_utf8(prompt).unwrap().starts_with("Press 'q'"));
    }
}
