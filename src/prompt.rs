//! Terminal prompts with validation loops.
//!
//! Every prompt re-asks until the answer is valid. Only the end of the input
//! stream stops a prompt early.

use std::io::{self, BufRead, Write};

use anyhow::{Result, bail};

use crate::store::{Document, RESERVED_SECTION};

pub const DEFAULT_DURATION: u32 = 86_400;
/// Bounds accepted by STS `GetSessionToken` for IAM users, inclusive.
pub const MIN_DURATION: u32 = 900;
pub const MAX_DURATION: u32 = 129_600;

const INVALID: &str = "Your selection is not valid. Try again.";

/// Credentials sections the operator may pick as a base profile, in file order.
pub fn eligible_profiles(credentials: &Document, suffix: &str) -> Vec<String> {
    credentials
        .sections()
        .into_iter()
        .filter(|name| name != RESERVED_SECTION)
        .filter(|name| suffix.is_empty() || !name.ends_with(suffix))
        .collect()
}

/// Maps a 1-based menu answer to an index into `count` choices.
pub fn parse_selection(input: &str, count: usize) -> Option<usize> {
    let n: usize = input.trim().parse().ok()?;
    (1..=count).contains(&n).then(|| n - 1)
}

/// Blank means [`DEFAULT_DURATION`]; anything else must be whole seconds in
/// `MIN_DURATION..=MAX_DURATION`.
pub fn parse_duration(input: &str) -> Option<u32> {
    let input = input.trim();
    if input.is_empty() {
        return Some(DEFAULT_DURATION);
    }
    let seconds: u32 = input.parse().ok()?;
    (MIN_DURATION..=MAX_DURATION).contains(&seconds).then_some(seconds)
}

pub fn is_numeric_code(input: &str) -> bool {
    let input = input.trim();
    !input.is_empty() && input.chars().all(|c| c.is_ascii_digit())
}

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }

    pub fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{message}")?;
        Ok(())
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "\n{question}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("Input closed before an answer was given");
        }
        Ok(line.trim().to_string())
    }

    fn ask_until<T>(&mut self, question: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T> {
        loop {
            let answer = self.ask(question)?;
            if let Some(value) = parse(&answer) {
                return Ok(value);
            }
            self.say(INVALID)?;
        }
    }

    /// Lists `choices` as a numbered menu and returns the picked name.
    pub fn select_profile(&mut self, choices: &[String]) -> Result<String> {
        if choices.is_empty() {
            bail!("No AWS profiles found in the credentials file");
        }

        for (i, name) in choices.iter().enumerate() {
            writeln!(self.output, "{}: {name}", i + 1)?;
        }

        let index = self.ask_until("Pick AWS profile: ", |s| parse_selection(s, choices.len()))?;
        Ok(choices[index].clone())
    }

    pub fn select_duration(&mut self) -> Result<u32> {
        let question = format!(
            "Enter token lifetime in seconds ({MIN_DURATION}-{MAX_DURATION}) [{DEFAULT_DURATION}]: "
        );
        self.ask_until(&question, parse_duration)
    }

    pub fn mfa_code(&mut self) -> Result<String> {
        self.ask_until("Enter MFA code: ", |s| {
            is_numeric_code(s).then(|| s.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn output(p: Prompter<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(p.into_output()).unwrap()
    }

    #[test]
    fn test_duration_bounds_are_inclusive() {
        assert_eq!(parse_duration("900"), Some(900));
        assert_eq!(parse_duration("129600"), Some(129_600));
        assert_eq!(parse_duration("899"), None);
        assert_eq!(parse_duration("129601"), None);
    }

    #[test]
    fn test_duration_blank_is_default() {
        assert_eq!(parse_duration(""), Some(86_400));
        assert_eq!(parse_duration("   "), Some(86_400));
    }

    #[test]
    fn test_duration_rejects_garbage() {
        assert_eq!(parse_duration("3600s"), None);
        assert_eq!(parse_duration("-900"), None);
        assert_eq!(parse_duration("1.5"), None);
    }

    #[test]
    fn test_parse_selection_range() {
        assert_eq!(parse_selection("1", 3), Some(0));
        assert_eq!(parse_selection("3", 3), Some(2));
        assert_eq!(parse_selection("0", 3), None);
        assert_eq!(parse_selection("4", 3), None);
        assert_eq!(parse_selection("two", 3), None);
    }

    #[test]
    fn test_numeric_code() {
        assert!(is_numeric_code("123456"));
        assert!(is_numeric_code("0042"));
        assert!(!is_numeric_code(""));
        assert!(!is_numeric_code("12a456"));
        assert!(!is_numeric_code("-12345"));
    }

    #[test]
    fn test_eligible_profiles_skip_reserved_and_derived() {
        let doc = Document::parse(
            "region = us-east-1\n[work]\na = 1\n[work-mfa]\na = 2\n[default]\na = 3\n[personal]\na = 4\n",
        )
        .unwrap();

        assert_eq!(eligible_profiles(&doc, "-mfa"), vec!["work", "default", "personal"]);
        assert_eq!(
            eligible_profiles(&doc, "-sts"),
            vec!["work", "work-mfa", "default", "personal"]
        );
    }

    #[test]
    fn test_select_profile_retries_until_valid() {
        let choices = vec!["work".to_string(), "personal".to_string()];
        let mut p = prompter("zero\n3\n2\n");

        assert_eq!(p.select_profile(&choices).unwrap(), "personal");

        let out = output(p);
        assert!(out.contains("1: work\n2: personal\n"));
        assert_eq!(out.matches(INVALID).count(), 2);
    }

    #[test]
    fn test_select_profile_without_choices_fails() {
        let mut p = prompter("1\n");
        assert!(p.select_profile(&[]).is_err());
    }

    #[test]
    fn test_select_duration_prompt() {
        let mut p = prompter("\n");
        assert_eq!(p.select_duration().unwrap(), 86_400);

        let mut p = prompter("899\n900\n");
        assert_eq!(p.select_duration().unwrap(), 900);
    }

    #[test]
    fn test_mfa_code_prompt() {
        let mut p = prompter("abc\n\n 123456 \n");
        assert_eq!(p.mfa_code().unwrap(), "123456");
        assert_eq!(output(p).matches(INVALID).count(), 2);
    }

    #[test]
    fn test_closed_input_is_an_error() {
        let mut p = prompter("nope\n");
        assert!(p.mfa_code().is_err());
    }
}
