//! Interactive stdin prompts.

use std::io::{self, BufRead, Stderr, StdinLock, Write};
use std::path::Path;

use tracing::warn;

use jflash_patch::discover::subdirectories;
use jflash_patch::{AutoSelector, FolderSelector, Selection, SelectionReason};

/// Lets the operator pick the algorithm folder of each bundle.
///
/// An empty answer, or end of input, takes the automatic suggestion; `s`
/// skips the folder copy for that bundle.
pub struct PromptSelector<R, W> {
    input: R,
    output: W,
}

impl PromptSelector<StdinLock<'static>, Stderr> {
    /// Reads answers from stdin and prints the menu to stderr, so stdout
    /// only carries command output (including `--json` documents).
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> PromptSelector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn prompt(&mut self, bundle: &Path) -> io::Result<Option<Selection>> {
        let dirs = match subdirectories(bundle) {
            Ok(dirs) => dirs,
            Err(err) => {
                warn!(bundle = %bundle.display(), %err, "cannot list bundle folders");
                return Ok(None);
            }
        };
        if dirs.is_empty() {
            return Ok(None);
        }
        let suggested = AutoSelector::choose(bundle);

        writeln!(self.output, "device folders in {}:", bundle.display())?;
        for (index, dir) in dirs.iter().enumerate() {
            let mark = match &suggested {
                Some(selection) if &selection.path == dir => " (suggested)",
                _ => "",
            };
            let name = dir.file_name().unwrap_or(dir.as_os_str());
            writeln!(self.output, "  [{}] {}{mark}", index + 1, name.to_string_lossy())?;
        }

        loop {
            write!(self.output, "folder number, Enter for suggested, s to skip: ")?;
            self.output.flush()?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(suggested);
            }
            let answer = line.trim();
            if answer.is_empty() {
                return Ok(suggested);
            }
            if answer.eq_ignore_ascii_case("s") {
                return Ok(None);
            }
            match answer.parse::<usize>() {
                Ok(number) if (1..=dirs.len()).contains(&number) => {
                    let path = dirs[number - 1].clone();
                    return Ok(Some(Selection::new(path, SelectionReason::Chosen)));
                }
                _ => writeln!(self.output, "invalid choice: {answer}")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> FolderSelector for PromptSelector<R, W> {
    fn select(&mut self, bundle: &Path) -> Option<Selection> {
        self.prompt(bundle).unwrap_or_else(|err| {
            warn!(%err, "prompt failed, skipping folder selection");
            None
        })
    }
}

/// Ask a yes/no question; anything but `y`/`yes` is a no.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    write!(output, "{question} [y/N] ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}
