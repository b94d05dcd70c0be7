//! Flat shell lexer producing literals, operators and comments.
//!
//! Quote characters are tagged with a private-use marker before lexing so that
//! literals keep a record of the quoting they were written with. Inputs that
//! already contain a reserved code point are rejected outright.

use std::fmt;

use thiserror::Error;

pub const DOUBLE_QUOTE_MARKER: &str = "\u{E000}\u{E001}";
pub const SINGLE_QUOTE_MARKER: &str = "\u{E000}\u{E002}";

const RESERVED: std::ops::RangeInclusive<char> = '\u{E000}'..='\u{E002}';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unterminated {quote} quote")]
    UnterminatedQuote { quote: char },

    #[error("unterminated parameter expansion")]
    UnterminatedExpansion,

    #[error("reserved character U+{code:04X} at byte {position}")]
    ReservedCharacter { code: u32, position: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    And,
    Or,
    Semicolon,
    CaseTerminator,
    Pipe,
    PipeWithStderr,
    Background,
    Newline,
    SubshellOpen,
    SubshellClose,
    CommandSubstitution,
    ProcessSubstitution,
    RedirectOutput,
    RedirectAppend,
    RedirectClobber,
    RedirectOutputAndError,
    DuplicateOutput,
    DuplicateInput,
    RedirectInput,
    ReadWrite,
    HereDoc,
    HereString,
    Glob(String),
}

impl OperatorKind {
    pub fn symbol(&self) -> &str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Semicolon => ";",
            Self::CaseTerminator => ";;",
            Self::Pipe => "|",
            Self::PipeWithStderr => "|&",
            Self::Background => "&",
            Self::Newline => "\\n",
            Self::SubshellOpen => "(",
            Self::SubshellClose => ")",
            Self::CommandSubstitution => "$(",
            Self::ProcessSubstitution => "<(",
            Self::RedirectOutput => ">",
            Self::RedirectAppend => ">>",
            Self::RedirectClobber => ">|",
            Self::RedirectOutputAndError => "&>",
            Self::DuplicateOutput => ">&",
            Self::DuplicateInput => "<&",
            Self::RedirectInput => "<",
            Self::ReadWrite => "<>",
            Self::HereDoc => "<<",
            Self::HereString => "<<<",
            Self::Glob(pattern) => pattern,
        }
    }

    /// Operators whose following word is a file or descriptor, not an argument.
    pub fn is_redirection(&self) -> bool {
        matches!(
            self,
            Self::RedirectOutput
                | Self::RedirectAppend
                | Self::RedirectClobber
                | Self::RedirectOutputAndError
                | Self::DuplicateOutput
                | Self::DuplicateInput
                | Self::RedirectInput
                | Self::ReadWrite
                | Self::HereDoc
                | Self::HereString
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AstNode {
    Literal(String),
    Operator(OperatorKind),
    Comment(String),
}

impl AstNode {
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Self::Comment(_))
    }
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.write_str(&restore_quotes(text)),
            Self::Operator(op) => f.write_str(&restore_quotes(op.symbol())),
            Self::Comment(text) => write!(f, "#{}", restore_quotes(text)),
        }
    }
}

/// Parses a command line into a flat node sequence.
///
/// Variable references are kept as text (`$HOME`, `${PATH}`), never expanded.
pub fn parse(command: &str) -> Result<Vec<AstNode>, ParseError> {
    if let Some((position, c)) = command.char_indices().find(|(_, c)| RESERVED.contains(c)) {
        return Err(ParseError::ReservedCharacter {
            code: c as u32,
            position,
        });
    }
    Lexer::new(&mark_quotes(command)).run()
}

/// Appends a marker after every quote character.
pub fn mark_quotes(command: &str) -> String {
    let mut marked = String::with_capacity(command.len() + 8);
    for c in command.chars() {
        marked.push(c);
        match c {
            '"' => marked.push_str(DOUBLE_QUOTE_MARKER),
            '\'' => marked.push_str(SINGLE_QUOTE_MARKER),
            _ => {}
        }
    }
    marked
}

/// Turns markers back into the quote characters they stand for.
pub fn restore_quotes(text: &str) -> String {
    if !text.contains(*RESERVED.start()) {
        return text.to_string();
    }
    text.replace(&format!("\"{DOUBLE_QUOTE_MARKER}"), "\"")
        .replace(&format!("'{SINGLE_QUOTE_MARKER}"), "'")
        .replace(DOUBLE_QUOTE_MARKER, "\"")
        .replace(SINGLE_QUOTE_MARKER, "'")
}

/// Word text as the shell would see it once quoting is removed.
pub fn unquote(text: &str) -> String {
    text.chars().filter(|c| !RESERVED.contains(c)).collect()
}

fn operator_at(chars: &[char], i: usize) -> Option<(OperatorKind, usize)> {
    use OperatorKind::*;

    let c1 = chars.get(i + 1).copied();
    let c2 = chars.get(i + 2).copied();
    let found = match (chars[i], c1, c2) {
        ('<', Some('<'), Some('<')) => (HereString, 3),
        ('&', Some('&'), _) => (And, 2),
        ('|', Some('|'), _) => (Or, 2),
        (';', Some(';'), _) => (CaseTerminator, 2),
        ('|', Some('&'), _) => (PipeWithStderr, 2),
        ('>', Some('>'), _) => (RedirectAppend, 2),
        ('>', Some('&'), _) => (DuplicateOutput, 2),
        ('>', Some('|'), _) => (RedirectClobber, 2),
        ('>', Some('('), _) => (ProcessSubstitution, 2),
        ('&', Some('>'), _) => (RedirectOutputAndError, 2),
        ('<', Some('<'), _) => (HereDoc, 2),
        ('<', Some('&'), _) => (DuplicateInput, 2),
        ('<', Some('>'), _) => (ReadWrite, 2),
        ('<', Some('('), _) => (ProcessSubstitution, 2),
        ('&', _, _) => (Background, 1),
        (';', _, _) => (Semicolon, 1),
        ('|', _, _) => (Pipe, 1),
        ('(', _, _) => (SubshellOpen, 1),
        (')', _, _) => (SubshellClose, 1),
        ('<', _, _) => (RedirectInput, 1),
        ('>', _, _) => (RedirectOutput, 1),
        ('\n', _, _) => (Newline, 1),
        _ => return None,
    };
    Some(found)
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    nodes: Vec<AstNode>,
    word: String,
    in_word: bool,
    glob: bool,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            nodes: Vec::new(),
            word: String::new(),
            in_word: false,
            glob: false,
        }
    }

    fn run(mut self) -> Result<Vec<AstNode>, ParseError> {
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.pos += 1;
                    match self.bump() {
                        Some('\n') => {}
                        Some(escaped) => self.push_char(escaped),
                        None => self.push_char('\\'),
                    }
                }
                '\'' => self.single_quoted()?,
                '"' => self.double_quoted()?,
                '$' => self.dollar()?,
                '`' => {
                    self.pos += 1;
                    self.emit(OperatorKind::CommandSubstitution);
                }
                '#' if !self.in_word => self.comment(),
                ' ' | '\t' | '\r' => {
                    self.pos += 1;
                    self.flush();
                }
                _ => match operator_at(&self.chars, self.pos) {
                    Some((op, len)) => {
                        self.pos += len;
                        self.emit(op);
                    }
                    None => {
                        if matches!(c, '*' | '?' | '[') {
                            self.glob = true;
                        }
                        self.push_char(c);
                        self.pos += 1;
                    }
                },
            }
        }
        self.flush();
        Ok(self.nodes)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn push_char(&mut self, c: char) {
        self.word.push(c);
        self.in_word = true;
    }

    fn flush(&mut self) {
        if !self.in_word {
            return;
        }
        let text = std::mem::take(&mut self.word);
        let node = if self.glob {
            AstNode::Operator(OperatorKind::Glob(text))
        } else {
            AstNode::Literal(text)
        };
        self.nodes.push(node);
        self.in_word = false;
        self.glob = false;
    }

    fn emit(&mut self, op: OperatorKind) {
        self.flush();
        self.nodes.push(AstNode::Operator(op));
    }

    fn single_quoted(&mut self) -> Result<(), ParseError> {
        self.pos += 1;
        self.in_word = true;
        loop {
            match self.bump() {
                None => return Err(ParseError::UnterminatedQuote { quote: '\'' }),
                Some('\'') => return Ok(()),
                Some(c) => self.word.push(c),
            }
        }
    }

    fn double_quoted(&mut self) -> Result<(), ParseError> {
        self.pos += 1;
        self.in_word = true;
        loop {
            match self.peek() {
                None => return Err(ParseError::UnterminatedQuote { quote: '"' }),
                Some('"') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c @ ('"' | '\\' | '$' | '`')) => {
                            self.pos += 1;
                            self.push_char(c);
                        }
                        Some('\n') => self.pos += 1,
                        _ => self.push_char('\\'),
                    }
                }
                Some('$') => self.dollar()?,
                Some('`') => {
                    self.pos += 1;
                    self.emit(OperatorKind::CommandSubstitution);
                }
                Some(c) => {
                    self.pos += 1;
                    self.push_char(c);
                }
            }
        }
    }

    fn dollar(&mut self) -> Result<(), ParseError> {
        let next = self.chars.get(self.pos + 1).copied();
        match next {
            Some('(') => {
                self.pos += 2;
                self.emit(OperatorKind::CommandSubstitution);
            }
            Some('{') => {
                let close = self.chars[self.pos + 2..]
                    .iter()
                    .position(|c| *c == '}')
                    .map(|offset| self.pos + 2 + offset)
                    .ok_or(ParseError::UnterminatedExpansion)?;
                let body: String = self.chars[self.pos + 2..close].iter().collect();
                self.pos = close + 1;
                if body.contains("$(") || body.contains('`') {
                    self.emit(OperatorKind::CommandSubstitution);
                }
                self.word.push_str("${");
                self.word.push_str(&body);
                self.push_char('}');
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.pos += 1;
                self.push_char('$');
                while let Some(c) = self.peek() {
                    if !(c.is_ascii_alphanumeric() || c == '_') {
                        break;
                    }
                    self.pos += 1;
                    self.word.push(c);
                }
            }
            Some(c) if c.is_ascii_digit() || "@*#?$!-".contains(c) => {
                self.pos += 2;
                self.push_char('$');
                self.word.push(c);
            }
            _ => {
                self.pos += 1;
                self.push_char('$');
            }
        }
        Ok(())
    }

    fn comment(&mut self) {
        self.flush();
        self.pos += 1;
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.pos += 1;
        }
        self.nodes.push(AstNode::Comment(text));
    }
}
