//! Confirmation policy for replacing existing output files.

use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::warn;

/// What to do when an output file already exists
///
/// One value lives for the whole run and is passed to every write, so an
/// "all" answer applies to the files that follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OverwritePolicy {
    /// Prompt for each existing file
    Ask,
    /// Replace existing files
    Always,
    /// Keep existing files
    Never,
}

impl OverwritePolicy {
    /// Picks the policy for a run from the command line flags
    ///
    /// Without a terminal to prompt on, `Ask` degrades to `Never`.
    pub(crate) fn from_flags(force: bool, no_clobber: bool, interactive: bool) -> Self {
        match (force, no_clobber) {
            (true, _) => Self::Always,
            (_, true) => Self::Never,
            _ if interactive => Self::Ask,
            _ => {
                warn!("stdin is not a terminal; existing files will be kept (use --force to overwrite)");
                Self::Never
            }
        }
    }

    /// Decides whether the existing file at `path` may be replaced
    ///
    /// Under `Ask` the question goes to `output` and the answer is read from
    /// `input`. An empty answer or end of input means no; unrecognized answers
    /// repeat the question; `a`/`all` switches the policy to `Always`.
    pub(crate) fn allows_overwrite(
        &mut self,
        path: &Path,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> io::Result<bool> {
        match self {
            Self::Always => return Ok(true),
            Self::Never => return Ok(false),
            Self::Ask => {}
        }

        let mut answer = String::new();
        loop {
            write!(output, "{} already exists. Overwrite? [y/N/all] ", path.display())?;
            output.flush()?;

            answer.clear();
            if input.read_line(&mut answer)? == 0 {
                writeln!(output)?;
                return Ok(false);
            }

            match answer.trim().to_ascii_lowercase().as_str() {
                "" | "n" | "no" => return Ok(false),
                "y" | "yes" => return Ok(true),
                "a" | "all" => {
                    *self = Self::Always;
                    return Ok(true);
                }
                _ => writeln!(output, "Please answer y, n or all.")?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn ask(policy: &mut OverwritePolicy, answers: &str) -> (bool, String) {
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output = Vec::new();
        let allowed = policy
            .allows_overwrite(Path::new("out/Foo.cs"), &mut input, &mut output)
            .unwrap();
        (allowed, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_from_flags() {
        assert_eq!(OverwritePolicy::from_flags(true, false, false), OverwritePolicy::Always);
        assert_eq!(OverwritePolicy::from_flags(false, true, true), OverwritePolicy::Never);
        assert_eq!(OverwritePolicy::from_flags(false, false, true), OverwritePolicy::Ask);
        assert_eq!(OverwritePolicy::from_flags(false, false, false), OverwritePolicy::Never);
    }

    #[test]
    fn test_fixed_policies_never_prompt() {
        let (allowed, prompt) = ask(&mut OverwritePolicy::Always, "");
        assert!(allowed);
        assert!(prompt.is_empty());

        let (allowed, prompt) = ask(&mut OverwritePolicy::Never, "y\n");
        assert!(!allowed);
        assert!(prompt.is_empty());
    }

    #[test]
    fn test_answers() {
        for (answer, expected) in [("y\n", true), ("YES\n", true), ("n\n", false), ("\n", false), ("", false)] {
            let mut policy = OverwritePolicy::Ask;
            let (allowed, prompt) = ask(&mut policy, answer);
            assert_eq!(allowed, expected, "answer {:?}", answer);
            assert!(prompt.contains("out/Foo.cs already exists"));
            assert_eq!(policy, OverwritePolicy::Ask);
        }
    }

    #[test]
    fn test_all_switches_policy() {
        let mut policy = OverwritePolicy::Ask;
        let (allowed, _) = ask(&mut policy, "all\n");
        assert!(allowed);
        assert_eq!(policy, OverwritePolicy::Always);

        let (allowed, prompt) = ask(&mut policy, "");
        assert!(allowed);
        assert!(prompt.is_empty());
    }

    #[test]
    fn test_invalid_answer_reprompts() {
        let mut policy = OverwritePolicy::Ask;
        let (allowed, prompt) = ask(&mut policy, "maybe\ny\n");
        assert!(allowed);
        assert_eq!(prompt.matches("[y/N/all]").count(), 2);
        assert!(prompt.contains("Please answer y, n or all."));
    }
}
