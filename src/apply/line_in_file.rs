//! Idempotent single-line edits of text files such as `sshd_config` and `authorized_keys`.

use regex::Regex;

/// Describes one line that a file should contain.
#[derive(Clone, Copy, Debug)]
pub struct LineInFile<'a> {
    /// The exact line, without a line terminator.
    pub line: &'a str,

    /// Identifies the line that [Self::line] supersedes.
    ///
    /// If this matches a line in the file, the first match is the authoritative one: it is left
    /// alone if it already equals [Self::line] and replaced otherwise.
    pub pattern: Option<&'a Regex>,

    /// If [Self::line] must be added, it is inserted before the first line this matches instead
    /// of at the end of the file.
    pub before: Option<&'a Regex>,
}

impl LineInFile<'_> {
    /// Returns the edited contents, or [None] if `contents` already satisfies this edit.
    ///
    /// Line terminators of untouched lines are preserved, including `\r\n`.
    pub fn apply(&self, contents: &str) -> Option<String> {
        // A line without its terminator.
        fn text(line: &str) -> &str {
            line.trim_end_matches(['\n', '\r'])
        }

        let lines: Vec<&str> = contents.split_inclusive('\n').collect();

        if let Some(pattern) = self.pattern {
            if let Some(index) = lines.iter().position(|l| pattern.is_match(text(l))) {
                let current = lines[index];
                if text(current).trim_end() == self.line.trim_end() {
                    return None;
                }
                let terminator = &current[text(current).len()..];
                let terminator = if terminator.is_empty() { "\n" } else { terminator };
                let mut output = String::with_capacity(contents.len() + self.line.len());
                output.extend(lines[..index].iter().copied());
                output.push_str(self.line);
                output.push_str(terminator);
                output.extend(lines[index + 1..].iter().copied());
                return Some(output);
            }
        }

        if lines
            .iter()
            .any(|l| text(l).trim_end() == self.line.trim_end())
        {
            return None;
        }

        let insert_at = self
            .before
            .and_then(|before| lines.iter().position(|l| before.is_match(text(l))))
            .unwrap_or(lines.len());

        let mut output = String::with_capacity(contents.len() + self.line.len() + 1);
        output.extend(lines[..insert_at].iter().copied());
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(self.line);
        output.push('\n');
        output.extend(lines[insert_at..].iter().copied());
        Some(output)
    }
}
