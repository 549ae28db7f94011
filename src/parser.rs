use crate::ast::*;
use crate::error::{ParseError, Result};
use crate::expression::{looks_like_call, parse_call, split_quoted};
use crate::types::parse_number;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, trace, warn};

const TRIPLE_QUOTES: [&str; 2] = ["\"\"\"", "'''"];

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Columns a tab counts for when measuring indentation.
    pub tab_width: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { tab_width: 4 }
    }
}

pub fn parse(input: &str) -> Result<Vec<Command>> {
    parse_with_options(input, &ParseOptions::default())
}

pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<Command>> {
    let text = fs::read_to_string(path)?;
    parse(&text)
}

pub fn parse_with_options(input: &str, options: &ParseOptions) -> Result<Vec<Command>> {
    let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
    let mut parser = ScriptParser::new(options);

    for (idx, line) in normalized.split('\n').enumerate() {
        let mut raw = line;
        if idx == 0 {
            raw = raw.trim_start_matches('\u{feff}');
        }
        parser.line(raw, idx + 1)?;
    }

    parser.finish()
}

/// One nesting level: the body of a compound command being collected.
struct Scope {
    head: Option<Command>,
    header_indent: Option<isize>,
    body_indent: Option<isize>,
    commands: Vec<Command>,
    last_speaker: Option<String>,
}

impl Scope {
    fn root() -> Self {
        Self {
            head: None,
            header_indent: None,
            body_indent: None,
            commands: Vec::new(),
            last_speaker: None,
        }
    }
}

struct OpenString {
    delimiter: &'static str,
    speaker: Option<String>,
    lines: Vec<String>,
    line_no: usize,
    opening: String,
}

struct ScriptParser<'o> {
    options: &'o ParseOptions,
    scopes: Vec<Scope>,
    open_string: Option<OpenString>,
    base_indent: Option<isize>,
}

impl<'o> ScriptParser<'o> {
    fn new(options: &'o ParseOptions) -> Self {
        Self {
            options,
            scopes: vec![Scope::root()],
            open_string: None,
            base_indent: None,
        }
    }

    fn line(&mut self, raw: &str, line_no: usize) -> Result<()> {
        if self.open_string.is_some() {
            self.continue_string(raw);
            return Ok(());
        }

        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }

        let measured = self.measure_indent(raw);
        let base = *self.base_indent.get_or_insert(measured);
        let indent = measured - base;

        self.close_scopes(indent);
        let top = self.top_mut();
        if top.body_indent.is_none() {
            top.body_indent = Some(indent);
        }
        trace!(line_no, indent, depth = self.scopes.len(), "line");

        if self.start_string(trimmed, line_no) {
            return Ok(());
        }
        self.dispatch(trimmed, indent, line_no)
    }

    fn finish(mut self) -> Result<Vec<Command>> {
        if let Some(open) = self.open_string.take() {
            return Err(ParseError::UnterminatedString {
                line: open.line_no,
                text: open.opening,
            });
        }
        while self.scopes.len() > 1 {
            self.close_scope();
        }
        Ok(self.scopes.pop().map(|s| s.commands).unwrap_or_default())
    }

    fn measure_indent(&self, raw: &str) -> isize {
        raw.chars()
            .take_while(|c| c.is_whitespace())
            .map(|c| if c == '\t' { self.options.tab_width } else { 1 })
            .sum::<usize>() as isize
    }

    fn top(&self) -> &Scope {
        &self.scopes[self.scopes.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn should_close(&self, indent: isize) -> bool {
        if self.scopes.len() <= 1 {
            return false;
        }
        let top = self.top();
        let dedented = top.body_indent.map(|b| indent < b).unwrap_or(false);
        let at_header = top.header_indent.map(|h| indent <= h).unwrap_or(false);
        dedented || at_header
    }

    fn close_scopes(&mut self, indent: isize) {
        while self.should_close(indent) {
            self.close_scope();
        }
    }

    fn open_scope(&mut self, head: Command, indent: isize) {
        debug!(kind = head.kind(), indent, "open scope");
        self.scopes.push(Scope {
            head: Some(head),
            header_indent: Some(indent),
            body_indent: None,
            commands: Vec::new(),
            last_speaker: None,
        });
    }

    fn close_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        let Some(mut head) = scope.head else {
            return;
        };

        match &mut head {
            Command::Label(label) => label.commands = scope.commands,
            Command::MenuChoice(choice) => choice.commands = scope.commands,
            Command::IfCondition(branch) | Command::ElifCondition(branch) => {
                branch.commands = scope.commands
            }
            Command::Else(branch) => branch.commands = scope.commands,
            Command::Menu(menu) => {
                menu.choices = scope
                    .commands
                    .into_iter()
                    .filter_map(|c| match c {
                        Command::MenuChoice(choice) => Some(choice),
                        other => {
                            warn!(kind = other.kind(), "dropping non-choice line inside menu");
                            None
                        }
                    })
                    .collect()
            }
            other => warn!(kind = other.kind(), "scope opened by a command without a body"),
        }

        self.push(head);
    }

    fn push(&mut self, command: Command) {
        trace!(kind = command.kind(), "emit");
        self.top_mut().commands.push(command);
    }

    fn start_string(&mut self, trimmed: &str, line_no: usize) -> bool {
        let Some((at, delimiter)) = TRIPLE_QUOTES
            .iter()
            .filter_map(|d| trimmed.find(d).map(|at| (at, *d)))
            .min_by_key(|(at, _)| *at)
        else {
            return false;
        };

        let prefix = trimmed[..at].trim();
        let speaker = if prefix.is_empty() {
            self.top().last_speaker.clone()
        } else {
            self.top_mut().last_speaker = Some(prefix.to_string());
            Some(prefix.to_string())
        };

        let rest = &trimmed[at + delimiter.len()..];
        if let Some(end) = rest.find(delimiter) {
            self.push(Command::Dialogue(Dialogue {
                speaker,
                text: rest[..end].trim().to_string(),
            }));
            return true;
        }

        self.open_string = Some(OpenString {
            delimiter,
            speaker,
            lines: vec![rest.trim().to_string()],
            line_no,
            opening: trimmed.to_string(),
        });
        true
    }

    fn continue_string(&mut self, raw: &str) {
        let Some(open) = self.open_string.as_mut() else {
            return;
        };
        match raw.find(open.delimiter) {
            Some(end) => {
                open.lines.push(raw[..end].to_string());
            }
            None => {
                open.lines.push(raw.to_string());
                return;
            }
        }

        if let Some(open) = self.open_string.take() {
            self.push(Command::Dialogue(Dialogue {
                speaker: open.speaker,
                text: open.lines.join("\n").trim().to_string(),
            }));
        }
    }

    fn dispatch(&mut self, line: &str, indent: isize, line_no: usize) -> Result<()> {
        if let Some(rest) = line.strip_prefix("label ") {
            let name = rest.split(':').next().unwrap_or_default().trim();
            let label = Label {
                name: name.to_string(),
                commands: Vec::new(),
            };
            self.open_scope(Command::Label(label), indent);
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix("scene ") {
            let (image, mut clauses) = split_clauses(rest, &["with"]);
            self.push(Command::Scene(Scene {
                image,
                transition: clauses.remove("with"),
            }));
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix("define ") {
            return self.define(rest, line, line_no);
        }

        if let Some(rest) = line.strip_prefix("$ ") {
            self.assignment(rest, line_no);
            return Ok(());
        }

        if block_keyword(line) == Some("menu") {
            self.open_scope(Command::Menu(Menu { choices: Vec::new() }), indent);
            return Ok(());
        }

        if matches!(self.top().head, Some(Command::Menu(_))) {
            if let Some(text) = menu_choice(line) {
                let choice = MenuChoice {
                    text,
                    commands: Vec::new(),
                };
                self.open_scope(Command::MenuChoice(choice), indent);
                return Ok(());
            }
        }

        if let Some(rest) = line.strip_prefix("if ") {
            let branch = Conditional {
                condition: condition_text(rest),
                commands: Vec::new(),
            };
            self.open_scope(Command::IfCondition(branch), indent);
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix("elif ") {
            let branch = Conditional {
                condition: condition_text(rest),
                commands: Vec::new(),
            };
            self.open_scope(Command::ElifCondition(branch), indent);
            return Ok(());
        }

        if block_keyword(line) == Some("else") {
            self.open_scope(Command::Else(Else { commands: Vec::new() }), indent);
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix("jump ") {
            self.push(Command::Jump(Jump {
                label: rest.trim().to_string(),
            }));
            return Ok(());
        }

        if line == "pause" || line.starts_with("pause ") {
            let duration = optional_number(line["pause".len()..].trim(), line, line_no)?;
            self.push(Command::Pause(Pause { duration }));
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix("play music ") {
            return self.play_music(rest, line, line_no);
        }

        if line == "stop music" || line.starts_with("stop music ") {
            let (_, mut clauses) = split_clauses(&line["stop music".len()..], &["fadeout"]);
            let fade_out = match clauses.remove("fadeout") {
                Some(value) => Some(required_number(&value, line, line_no)?),
                None => None,
            };
            self.push(Command::StopMusic(StopMusic { fade_out }));
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix("show ") {
            let (image, mut clauses) = split_clauses(rest, &["at", "with"]);
            if !image.is_empty() {
                self.push(Command::Show(Show {
                    image,
                    position: clauses.remove("at"),
                    transition: clauses.remove("with"),
                }));
                return Ok(());
            }
        }

        if let Some(rest) = line.strip_prefix("hide ") {
            let (image, mut clauses) = split_clauses(rest, &["with"]);
            if !image.is_empty() {
                self.push(Command::Hide(Hide {
                    image,
                    transition: clauses.remove("with"),
                }));
                return Ok(());
            }
        }

        if line == "return" {
            self.push(Command::Return);
            return Ok(());
        }

        if let Some(dialogue) = parse_dialogue(line) {
            if let Some(speaker) = &dialogue.speaker {
                self.top_mut().last_speaker = Some(speaker.clone());
            }
            self.push(Command::Dialogue(dialogue));
            return Ok(());
        }

        debug!(line_no, line, "ignoring unrecognized line");
        Ok(())
    }

    fn define(&mut self, rest: &str, line: &str, line_no: usize) -> Result<()> {
        let Some((name, value)) = rest.split_once('=') else {
            debug!(line_no, line, "define without a value");
            return Ok(());
        };
        let value = value.trim();

        let definition = if looks_like_call(value) {
            let call = parse_call(value).map_err(|message| ParseError::MalformedDefinition {
                line: line_no,
                text: line.to_string(),
                message,
            })?;
            Some(call)
        } else {
            None
        };

        self.push(Command::Define(Define {
            name: name.trim().to_string(),
            value: value.to_string(),
            definition,
        }));
        Ok(())
    }

    fn assignment(&mut self, rest: &str, line_no: usize) {
        let Some((name, value)) = rest.split_once('=') else {
            debug!(line_no, rest, "python line without an assignment");
            return;
        };
        let name = name.trim();
        let plain_target = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
        if !plain_target {
            debug!(line_no, name, "unsupported assignment target");
            return;
        }

        self.push(Command::Define(Define {
            name: name.to_string(),
            value: value.trim().to_string(),
            definition: None,
        }));
    }

    fn play_music(&mut self, rest: &str, line: &str, line_no: usize) -> Result<()> {
        let rest = rest.trim();
        let (file, remainder) = match split_quoted(rest) {
            Some((file, remainder)) => (file, remainder),
            None => {
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                (rest[..end].to_string(), &rest[end..])
            }
        };

        let (_, mut clauses) = split_clauses(remainder, &["fadein"]);
        let fade_in = match clauses.remove("fadein") {
            Some(value) => Some(required_number(&value, line, line_no)?),
            None => None,
        };

        self.push(Command::PlayMusic(PlayMusic { file, fade_in }));
        Ok(())
    }
}

/// `menu:` / `else :` style headers; returns the keyword.
fn block_keyword(line: &str) -> Option<&str> {
    line.strip_suffix(':').map(str::trim)
}

fn menu_choice(line: &str) -> Option<String> {
    let (text, rest) = split_quoted(line)?;
    (rest.trim() == ":").then_some(text)
}

fn condition_text(rest: &str) -> String {
    rest.trim().trim_end_matches(':').trim().to_string()
}

fn parse_dialogue(line: &str) -> Option<Dialogue> {
    let quote_at = line.find(['"', '\''])?;
    let speaker = line[..quote_at].trim();
    if !is_speaker(speaker) {
        return None;
    }
    let quoted = &line[quote_at..];

    let text = match split_quoted(quoted) {
        Some((text, _)) => text,
        None => {
            let quote = &quoted[..1];
            quoted[1..].trim_end_matches(quote).to_string()
        }
    };

    Some(Dialogue {
        speaker: (!speaker.is_empty()).then(|| speaker.to_string()),
        text,
    })
}

/// Empty, or whitespace-separated words like `e` or `e happy`.
fn is_speaker(text: &str) -> bool {
    text.split_whitespace().all(|word| {
        word.chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
    })
}

fn optional_number(text: &str, line: &str, line_no: usize) -> Result<Option<f64>> {
    if text.is_empty() {
        return Ok(None);
    }
    required_number(text, line, line_no).map(Some)
}

fn required_number(text: &str, line: &str, line_no: usize) -> Result<f64> {
    parse_number(text.trim()).ok_or_else(|| ParseError::InvalidNumber {
        line: line_no,
        text: line.to_string(),
    })
}

/// Splits `subject [kw value...]...` into the subject and keyword values,
/// keeping quoted words together.
fn split_clauses(text: &str, keywords: &[&'static str]) -> (String, HashMap<&'static str, String>) {
    let mut subject: Vec<&str> = Vec::new();
    let mut clauses: HashMap<&'static str, Vec<&str>> = HashMap::new();
    let mut current: Option<&'static str> = None;

    for word in words(text) {
        if let Some(&keyword) = keywords.iter().find(|k| **k == word) {
            current = Some(keyword);
            clauses.entry(keyword).or_default();
            continue;
        }
        match current {
            Some(keyword) => clauses.entry(keyword).or_default().push(word),
            None => subject.push(word),
        }
    }

    let clauses = clauses
        .into_iter()
        .map(|(k, v)| (k, v.join(" ")))
        .collect();
    (subject.join(" "), clauses)
}

fn words(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut quote: Option<char> = None;

    for (idx, ch) in text.char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                start.get_or_insert(idx);
            }
            None if ch.is_whitespace() => {
                if let Some(s) = start.take() {
                    out.push(&text[s..idx]);
                }
            }
            None => {
                start.get_or_insert(idx);
            }
        }
    }
    if let Some(s) = start {
        out.push(&text[s..]);
    }
    out
}
