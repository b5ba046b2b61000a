//! Interactive manager menu: status, clean, move, quit.
//!
//! Fatal errors from an action are shown as a blocking message and the menu
//! comes back; only Quit (or cancelling the menu) leaves.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use crate::core::errors::Result;
use crate::ui::dialog::Dialog;

const TITLE: &str = "Overlay Space Guard";
const OPTIONS: [&str; 4] = ["Show status", "Clean caches and logs", "Move folders", "Quit"];

/// The operations the menu drives. Each returns the text to show the user.
pub trait MenuHandler {
    /// One-line summary shown above the menu.
    fn headline(&self) -> String;
    fn status(&self) -> Result<String>;
    fn clean(&self) -> Result<String>;
    fn relocate(&self, destination_root: &Path) -> Result<String>;
    fn default_destination(&self) -> PathBuf;
    /// Labels of the configured sources, for the confirmation prompt.
    fn relocation_sources(&self) -> Vec<String>;
}

/// Run the menu until the user quits.
pub fn run_menu(dialog: &dyn Dialog, handler: &dyn MenuHandler) -> Result<()> {
    loop {
        let Some(choice) = dialog.choose(TITLE, &handler.headline(), &OPTIONS)? else {
            return Ok(());
        };
        match choice {
            0 => show_result(dialog, "Status", handler.status())?,
            1 => {
                if dialog.confirm(
                    TITLE,
                    "Remove cached files, empty the trash and trim logs?",
                )? {
                    show_result(dialog, "Cleanup", handler.clean())?;
                }
            }
            2 => {
                let Some(destination) = dialog.pick_directory(
                    "Choose where to move folders",
                    &handler.default_destination(),
                )?
                else {
                    continue;
                };
                let question = format!(
                    "Move {} to {} and leave symlinks behind?",
                    handler.relocation_sources().join(", "),
                    destination.display()
                );
                if dialog.confirm(TITLE, &question)? {
                    show_result(dialog, "Move folders", handler.relocate(&destination))?;
                }
            }
            _ => return Ok(()),
        }
    }
}

fn show_result(dialog: &dyn Dialog, title: &str, result: Result<String>) -> Result<()> {
    match result {
        Ok(text) => dialog.show_text(title, &text),
        Err(err) => {
            eprintln!("[OSG-UI] {title} failed: {err}");
            dialog.show_text(&format!("{title} failed"), &err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::OsgError;
    use crate::ui::dialog::{AlertResponse, Dialog};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Answer {
        Choose(Option<usize>),
        Confirm(bool),
        Pick(Option<PathBuf>),
    }

    #[derive(Default)]
    struct Scripted {
        answers: Mutex<VecDeque<Answer>>,
        shown: Mutex<Vec<(String, String)>>,
    }

    impl Scripted {
        fn new(answers: Vec<Answer>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                shown: Mutex::default(),
            }
        }

        fn next(&self) -> Answer {
            self.answers.lock().pop_front().unwrap_or(Answer::Choose(None))
        }
    }

    impl Dialog for Scripted {
        fn kind(&self) -> &'static str {
            "scripted"
        }
        fn show_text(&self, title: &str, text: &str) -> Result<()> {
            self.shown.lock().push((title.to_string(), text.to_string()));
            Ok(())
        }
        fn confirm(&self, _: &str, _: &str) -> Result<bool> {
            Ok(matches!(self.next(), Answer::Confirm(true)))
        }
        fn pick_directory(&self, _: &str, _: &Path) -> Result<Option<PathBuf>> {
            match self.next() {
                Answer::Pick(p) => Ok(p),
                _ => Ok(None),
            }
        }
        fn choose(&self, _: &str, _: &str, _: &[&str]) -> Result<Option<usize>> {
            match self.next() {
                Answer::Choose(c) => Ok(c),
                _ => Ok(None),
            }
        }
        fn alert(&self, _: &str, _: &str, _: Duration) -> Result<AlertResponse> {
            Ok(AlertResponse::Dismissed)
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail_relocate: bool,
    }

    impl MenuHandler for Recorder {
        fn headline(&self) -> String {
            "Status: OK".to_string()
        }
        fn status(&self) -> Result<String> {
            self.calls.lock().push("status".to_string());
            Ok("usage table".to_string())
        }
        fn clean(&self) -> Result<String> {
            self.calls.lock().push("clean".to_string());
            Ok("cleaned".to_string())
        }
        fn relocate(&self, destination_root: &Path) -> Result<String> {
            self.calls
                .lock()
                .push(format!("relocate {}", destination_root.display()));
            if self.fail_relocate {
                return Err(OsgError::MoveFailed {
                    source_path: PathBuf::from("/home/u/Music"),
                    destination: destination_root.join("Music"),
                    details: "disk full".to_string(),
                });
            }
            Ok("moved".to_string())
        }
        fn default_destination(&self) -> PathBuf {
            PathBuf::from("/mnt/data")
        }
        fn relocation_sources(&self) -> Vec<String> {
            vec!["Music".to_string()]
        }
    }

    #[test]
    fn status_then_quit() {
        let dialog = Scripted::new(vec![Answer::Choose(Some(0)), Answer::Choose(Some(3))]);
        let handler = Recorder::default();
        run_menu(&dialog, &handler).unwrap();
        assert_eq!(*handler.calls.lock(), vec!["status"]);
        assert_eq!(dialog.shown.lock()[0].1, "usage table");
    }

    #[test]
    fn declined_clean_does_nothing() {
        let dialog = Scripted::new(vec![
            Answer::Choose(Some(1)),
            Answer::Confirm(false),
            Answer::Choose(None),
        ]);
        let handler = Recorder::default();
        run_menu(&dialog, &handler).unwrap();
        assert!(handler.calls.lock().is_empty());
    }

    #[test]
    fn move_uses_picked_directory() {
        let dialog = Scripted::new(vec![
            Answer::Choose(Some(2)),
            Answer::Pick(Some(PathBuf::from("/media/usb"))),
            Answer::Confirm(true),
            Answer::Choose(Some(3)),
        ]);
        let handler = Recorder::default();
        run_menu(&dialog, &handler).unwrap();
        assert_eq!(*handler.calls.lock(), vec!["relocate /media/usb"]);
    }

    #[test]
    fn fatal_error_is_shown_and_menu_continues() {
        let dialog = Scripted::new(vec![
            Answer::Choose(Some(2)),
            Answer::Pick(Some(PathBuf::from("/media/usb"))),
            Answer::Confirm(true),
            Answer::Choose(Some(0)),
            Answer::Choose(Some(3)),
        ]);
        let handler = Recorder {
            fail_relocate: true,
            ..Recorder::default()
        };
        run_menu(&dialog, &handler).unwrap();

        let shown = dialog.shown.lock();
        assert_eq!(shown[0].0, "Move folders failed");
        assert!(shown[0].1.contains("OSG-4002"));
        assert_eq!(shown[1].1, "usage table");
    }

    #[test]
    fn cancelled_picker_returns_to_menu() {
        let dialog = Scripted::new(vec![
            Answer::Choose(Some(2)),
            Answer::Pick(None),
            Answer::Choose(Some(3)),
        ]);
        let handler = Recorder::default();
        run_menu(&dialog, &handler).unwrap();
        assert!(handler.calls.lock().is_empty());
    }
}
