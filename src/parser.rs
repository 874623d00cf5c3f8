//! Turns one input line into a [`Pipeline`].
//!
//! The grammar is deliberately small:
//!
//! ```text
//! line     := pipeline? ('#' comment)?
//! pipeline := stage ('|' stage)*
//! stage    := word* (('<' | '>') word word*)*
//! ```
//!
//! The command text of a stage is everything before its first `<` or `>`;
//! stray words after a redirection target are ignored.
//! Words are whitespace separated; there is no quoting. A `\#` keeps a literal
//! hash inside a word. Words of the form `*suffix` are expanded against the
//! glob directory (see [`crate::glob`]).

use crate::error::ParseError;
use crate::glob;
use std::borrow::Cow;
use std::path::PathBuf;

/// Default bound on the number of stages in a pipeline.
pub const MAX_PIPELINE: usize = 32;

/// Default size of a stage's argument vector, including its null sentinel.
pub const MAX_ARGS: usize = 16;

/// Size bounds applied while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of populated stages.
    pub max_stages: usize,
    /// Size of the argument vector, counting the terminating null entry.
    pub max_args: usize,
}

impl Limits {
    /// How many tokens a stage may hold.
    pub fn arg_budget(&self) -> usize {
        self.max_args.saturating_sub(1)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_stages: MAX_PIPELINE,
            max_args: MAX_ARGS,
        }
    }
}

/// One command of a pipeline: `argv[0]` is the command name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage<'a> {
    pub argv: Vec<Cow<'a, str>>,
}

impl<'a> Stage<'a> {
    /// Command name, i.e. the first token.
    pub fn name(&self) -> &str {
        self.argv.first().map(|s| s.as_ref()).unwrap_or("")
    }

    /// Tokens as plain string slices.
    pub fn args(&self) -> Vec<&str> {
        self.argv.iter().map(|s| s.as_ref()).collect()
    }
}

/// Files bound to the pipeline's ends.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Redirection<'a> {
    /// Standard input of the first stage.
    pub infile: Option<&'a str>,
    /// Standard output of the last stage.
    pub outfile: Option<&'a str>,
}

/// A parsed line: zero stages means there was nothing to run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Pipeline<'a> {
    pub stages: Vec<Stage<'a>>,
    pub redirection: Redirection<'a>,
}

impl<'a> Pipeline<'a> {
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }
}

/// A lexeme inside one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme<'a> {
    Word(&'a str),
    Redirect(char),
}

struct Lexer<'a> {
    text: &'a str,
    i: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Lexer { text, i: 0 }
    }

    fn is_operator(c: char) -> bool {
        matches!(c, '<' | '>')
    }

    fn proceed_while<F>(&mut self, f: F)
    where
        F: Fn(char) -> bool,
    {
        while let Some(c) = self.text[self.i..].chars().next() {
            if !f(c) {
                break;
            }
            self.i += c.len_utf8();
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Lexeme<'a>;

    fn next(&mut self) -> Option<Lexeme<'a>> {
        self.proceed_while(char::is_whitespace);
        let c = self.text[self.i..].chars().next()?;
        if Lexer::is_operator(c) {
            self.i += c.len_utf8();
            return Some(Lexeme::Redirect(c));
        }
        let start = self.i;
        self.proceed_while(|c| !c.is_whitespace() && !Lexer::is_operator(c));
        Some(Lexeme::Word(&self.text[start..self.i]))
    }
}

/// A stage before positional checks and glob expansion.
#[derive(Debug, Default)]
struct RawStage<'a> {
    words: Vec<&'a str>,
    redirects: Vec<(char, &'a str)>,
}

impl<'a> RawStage<'a> {
    fn scan(text: &'a str) -> Result<Self, ParseError> {
        let mut stage = RawStage::default();
        let mut lexer = Lexer::new(text);
        while let Some(lexeme) = lexer.next() {
            match lexeme {
                // The command text ends at the first operator.
                Lexeme::Word(w) if stage.redirects.is_empty() => stage.words.push(w),
                Lexeme::Word(w) => tracing::debug!(word = w, "dropping word after redirection"),
                Lexeme::Redirect(op) => match lexer.next() {
                    Some(Lexeme::Word(target)) => stage.redirects.push((op, target)),
                    _ => return Err(ParseError::MissingRedirectTarget { op }),
                },
            }
        }
        Ok(stage)
    }

    fn is_blank(&self) -> bool {
        self.words.is_empty() && self.redirects.is_empty()
    }
}

/// Cut the line at the first `#` that is not escaped with a backslash.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'#' && (i == 0 || bytes[i - 1] != b'\\') {
            return &line[..i];
        }
    }
    line
}

fn unescape(word: &str) -> Cow<'_, str> {
    if word.contains("\\#") {
        Cow::Owned(word.replace("\\#", "#"))
    } else {
        Cow::Borrowed(word)
    }
}

fn set_once<'a>(slot: &mut Option<&'a str>, target: &'a str, op: char) -> Result<(), ParseError> {
    if slot.is_some() {
        return Err(ParseError::DuplicateRedirect { op });
    }
    *slot = Some(target);
    Ok(())
}

/// Line parser configured with size limits and a glob directory.
#[derive(Debug, Clone)]
pub struct Parser {
    limits: Limits,
    glob_dir: PathBuf,
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new(Limits::default())
    }
}

impl Parser {
    /// Parser that expands globs against the current directory.
    pub fn new(limits: Limits) -> Self {
        Parser {
            limits,
            glob_dir: PathBuf::from("."),
        }
    }

    /// Expand globs against `dir` instead of the current directory.
    pub fn with_glob_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.glob_dir = dir.into();
        self
    }

    /// Parse one line.
    ///
    /// Blank and comment-only lines produce an empty pipeline, not an error.
    pub fn parse<'a>(&self, line: &'a str) -> Result<Pipeline<'a>, ParseError> {
        let text = strip_comment(line);

        let mut raw = Vec::new();
        for segment in text.split('|') {
            let stage = RawStage::scan(segment)?;
            if stage.is_blank() {
                continue;
            }
            if stage.words.is_empty() {
                return Err(ParseError::EmptyCommand);
            }
            if raw.len() == self.limits.max_stages {
                return Err(ParseError::TooManyStages {
                    max: self.limits.max_stages,
                });
            }
            raw.push(stage);
        }

        let last = raw.len().saturating_sub(1);
        let mut pipeline = Pipeline::default();
        for (index, stage) in raw.into_iter().enumerate() {
            for (op, target) in stage.redirects {
                match op {
                    '<' if index != 0 => {
                        return Err(ParseError::MisplacedRedirect { op, allowed: "first" });
                    }
                    '>' if index != last => {
                        return Err(ParseError::MisplacedRedirect { op, allowed: "last" });
                    }
                    '<' => set_once(&mut pipeline.redirection.infile, target, op)?,
                    _ => set_once(&mut pipeline.redirection.outfile, target, op)?,
                }
            }
            let argv = self.expand_words(index, stage.words)?;
            pipeline.stages.push(Stage { argv });
        }

        tracing::trace!(stages = pipeline.len(), ?pipeline.redirection, "parsed line");
        Ok(pipeline)
    }

    fn expand_words<'a>(&self, stage: usize, words: Vec<&'a str>) -> Result<Vec<Cow<'a, str>>, ParseError> {
        let budget = self.limits.arg_budget();
        let mut argv: Vec<Cow<'a, str>> = Vec::with_capacity(words.len().min(budget));
        let push = |argv: &mut Vec<Cow<'a, str>>, token: Cow<'a, str>| {
            if argv.len() == budget {
                return Err(ParseError::TooManyArgs { stage, max: budget });
            }
            argv.push(token);
            Ok(())
        };

        for word in words {
            if glob::glob_suffix(word).is_some() {
                let before = argv.len();
                for name in glob::expand_glob(word, glob::dir_entries(&self.glob_dir)) {
                    push(&mut argv, Cow::Owned(name))?;
                }
                if argv.len() > before {
                    continue;
                }
            }
            push(&mut argv, unescape(word))?;
        }
        Ok(argv)
    }
}

/// Parse `line` with `limits`, expanding globs in the current directory.
pub fn parse(line: &str, limits: Limits) -> Result<Pipeline<'_>, ParseError> {
    Parser::new(limits).parse(line)
}
