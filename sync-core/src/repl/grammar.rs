#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the monitor console.
//!
//! The lexer uses `regal` to produce a bounded token stream, while the parser
//! composes `winnow` combinators over those tokens to build structured
//! command values.

use super::catalog::{self, CommandTag, Node, PropertySpec, ValueSpec};
use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;

use crate::config::{ConfigField, MetricMode, Setting};

/// Maximum number of tokens produced per console line.
pub const MAX_TOKENS: usize = 32;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the console grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Signed decimal literal with optional fraction and exponent.
    #[regex(r"-?[0-9]+(?:\.[0-9]+)?(?:[eE][-+]?[0-9]+)?")]
    Number,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9_]*")]
    Ident,
    /// Optional separator between a property and its value.
    #[token("=")]
    Equals,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Bounded token buffer to avoid dynamic allocation in `no_std` environments.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Lexer errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: Option<TokenKind>,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    UnknownProperty {
        span: Range<usize>,
        lexeme: &'a str,
    },
    InvalidValue {
        field: ConfigField,
        span: Range<usize>,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::UnknownProperty { span, lexeme } => {
                write!(f, "unknown property `{lexeme}` at {span:?}")
            }
            GrammarErrorKind::InvalidValue { field, span } => {
                write!(f, "invalid value for {} at {span:?}", field.keyword())
            }
            GrammarErrorKind::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

/// Wrapper type enabling a consistent error surface for consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: Some(tok.kind),
                    span: tok.span.clone(),
                },
                None => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn unknown_property(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::UnknownProperty {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }

    fn invalid_value(field: ConfigField, token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidValue {
                field,
                span: token.span.clone(),
            },
        }
    }

    fn invalid_duration(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidDuration {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    type Inner = Self;

    fn from_input(input: &Input<'src, 'slice>) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn or(self, other: Self) -> Self {
        other
    }

    fn into_inner(self) -> Result<Self::Inner, Self> {
        Ok(self)
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq)]
pub enum Command<'a> {
    Arm,
    Disarm,
    Set(Setting),
    Run(Duration),
    Status,
    Help(HelpCommand<'a>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

pub(crate) fn parse_tokens_partial<'src, 'slice>(
    tokens: &'slice [Token<'src>],
) -> Result<(Command<'src>, &'slice [Token<'src>]), GrammarError<'src>>
where
    'src: 'slice,
{
    let mut input = tokens;
    match command().parse_next(&mut input) {
        Ok(cmd) => Ok((cmd, input)),
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => Err(err),
        Err(ErrMode::Incomplete(_)) => Err(GrammarError::unexpected("token", input.first())),
    }
}

/// Tokenize the provided line.
///
/// # Errors
///
/// Returns [`LexError`] when the line overflows the token buffer or the
/// lexer engine fails.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        push_token(
            &mut buffer,
            Token {
                kind: record.token,
                lexeme,
                span,
            },
        )?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let span = start..start + partial.fragment.len();
        push_token(
            &mut buffer,
            Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span,
            },
        )?;
    }

    Ok(buffer)
}

fn push_token<'a>(buffer: &mut TokenBuffer<'a>, token: Token<'a>) -> Result<(), LexError> {
    buffer.push(token).map_err(|_| LexError::TooManyTokens {
        processed: buffer.len() + 1,
    })
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a console command from the provided line.
///
/// # Errors
///
/// Returns [`ParseError`] describing the first lexical or grammatical
/// problem in `line`.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }

    let (command, mut rest) =
        parse_tokens_partial(tokens.as_slice()).map_err(ParseError::Grammar)?;

    while let Some((token, remaining)) = rest.split_first() {
        if token.kind == TokenKind::Eol {
            rest = remaining;
        } else {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(token),
            )));
        }
    }

    Ok(command)
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let snapshot = *input;
        let command_token = expect_kind(TokenKind::Ident, "command keyword").parse_next(input)?;

        if let Some(spec) = catalog::find(command_token.lexeme) {
            let mut state = CommandState::new(spec.tag);
            parse_node(spec.grammar, input, &mut state)?;
            state.finish()
        } else {
            *input = snapshot;
            Err(ErrMode::Backtrack(GrammarError::unexpected(
                "command keyword",
                Some(&command_token),
            )))
        }
    }
}

fn parse_node<'src, 'slice>(
    node: &'static Node,
    input: &mut Input<'src, 'slice>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match node {
        Node::End => Ok(()),
        Node::Assignment(properties) => parse_assignment(properties, input, state),
        Node::Duration { next } => {
            let token = expect_kind(TokenKind::Duration, "duration").parse_next(input)?;
            let duration = parse_duration(&token).map_err(ErrMode::Cut)?;
            state.set_duration(duration);
            parse_node(next, input, state)
        }
        Node::Topic { next } => {
            parse_topic(input, state)?;
            parse_node(next, input, state)
        }
    }
}

fn parse_assignment<'src, 'slice>(
    properties: &'static [PropertySpec],
    input: &mut Input<'src, 'slice>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    let name = expect_kind(TokenKind::Ident, "property").parse_next(input)?;
    let field = ConfigField::from_keyword(name.lexeme)
        .ok_or_else(|| ErrMode::Cut(GrammarError::unknown_property(&name)))?;
    let spec = properties
        .iter()
        .find(|spec| spec.field == field)
        .ok_or_else(|| ErrMode::Cut(GrammarError::unknown_property(&name)))?;

    if let Some((token, rest)) = input.split_first()
        && token.kind == TokenKind::Equals
    {
        *input = rest;
    }

    let setting = parse_value(spec, input)?;
    state.set_setting(setting);
    Ok(())
}

fn parse_value<'src, 'slice>(
    spec: &'static PropertySpec,
    input: &mut Input<'src, 'slice>,
) -> Result<Setting, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    let field = spec.field;
    match spec.value {
        ValueSpec::Flag => {
            let token = expect_kind(TokenKind::Ident, "true or false").parse_next(input)?;
            parse_flag(token.lexeme)
                .map(Setting::Armed)
                .ok_or_else(|| ErrMode::Cut(GrammarError::invalid_value(field, &token)))
        }
        ValueSpec::Keyword(_) => {
            let token = expect_kind(TokenKind::Ident, "mode keyword").parse_next(input)?;
            MetricMode::from_keyword(token.lexeme)
                .map(Setting::Mode)
                .ok_or_else(|| ErrMode::Cut(GrammarError::invalid_value(field, &token)))
        }
        ValueSpec::Number => {
            let token = expect_kind(TokenKind::Number, "number").parse_next(input)?;
            token
                .lexeme
                .parse::<f64>()
                .ok()
                .and_then(|value| Setting::numeric(field, value))
                .ok_or_else(|| ErrMode::Cut(GrammarError::invalid_value(field, &token)))
        }
    }
}

fn parse_flag(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("on") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") || text.eq_ignore_ascii_case("off") {
        Some(false)
    } else {
        None
    }
}

fn parse_topic<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            state.set_topic(token.lexeme);
            *input = rest;
            Ok(())
        }
        Some((token, _)) if token.kind != TokenKind::Eol => Err(ErrMode::Backtrack(
            GrammarError::unexpected("identifier", Some(token)),
        )),
        _ => Ok(()),
    }
}

enum CommandState<'a> {
    Arm,
    Disarm,
    Set { setting: Option<Setting> },
    Run { duration: Option<Duration> },
    Status,
    Help { topic: Option<&'a str> },
}

impl<'a> CommandState<'a> {
    fn new(tag: CommandTag) -> Self {
        match tag {
            CommandTag::Arm => CommandState::Arm,
            CommandTag::Disarm => CommandState::Disarm,
            CommandTag::Set => CommandState::Set { setting: None },
            CommandTag::Run => CommandState::Run { duration: None },
            CommandTag::Status => CommandState::Status,
            CommandTag::Help => CommandState::Help { topic: None },
        }
    }

    fn set_setting(&mut self, value: Setting) {
        if let CommandState::Set { setting } = self {
            *setting = Some(value);
        }
    }

    fn set_duration(&mut self, value: Duration) {
        if let CommandState::Run { duration } = self {
            *duration = Some(value);
        }
    }

    fn set_topic(&mut self, value: &'a str) {
        if let CommandState::Help { topic } = self {
            *topic = Some(value);
        }
    }

    fn finish(self) -> Result<Command<'a>, ErrMode<GrammarError<'a>>> {
        match self {
            CommandState::Arm => Ok(Command::Arm),
            CommandState::Disarm => Ok(Command::Disarm),
            CommandState::Set {
                setting: Some(setting),
            } => Ok(Command::Set(setting)),
            CommandState::Run {
                duration: Some(duration),
            } => Ok(Command::Run(duration)),
            CommandState::Status => Ok(Command::Status),
            CommandState::Help { topic } => Ok(Command::Help(HelpCommand { topic })),
            CommandState::Set { setting: None } => Err(ErrMode::Backtrack(
                GrammarError::unexpected("property", None),
            )),
            CommandState::Run { duration: None } => Err(ErrMode::Backtrack(
                GrammarError::unexpected("duration", None),
            )),
        }
    }
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let text = token.lexeme;
    if let Some(rest) = text.strip_suffix("ms") {
        let millis = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_millis(millis.into()))
    } else if let Some(rest) = text.strip_suffix('s') {
        let seconds = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_secs(seconds.into()))
    } else {
        Err(GrammarError::invalid_duration(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    #[test]
    fn parses_bare_commands() {
        assert_eq!(parse_ok("arm"), Command::Arm);
        assert_eq!(parse_ok("disarm\r\n"), Command::Disarm);
        assert_eq!(parse_ok("status"), Command::Status);
    }

    #[test]
    fn parses_numeric_setting() {
        assert_eq!(
            parse_ok("set frequency_tolerance 0.01"),
            Command::Set(Setting::Value {
                field: ConfigField::FrequencyTolerance,
                value: 0.01,
            })
        );
    }

    #[test]
    fn parses_setting_with_equals_and_exponent() {
        assert_eq!(
            parse_ok("set voltage_tolerance=5e-3"),
            Command::Set(Setting::Value {
                field: ConfigField::VoltageTolerance,
                value: 5e-3,
            })
        );
    }

    #[test]
    fn parses_negative_values_for_later_defaulting() {
        match parse_ok("set delta_trigger_mult -1") {
            Command::Set(Setting::Value { field, value }) => {
                assert_eq!(field, ConfigField::TriggerMultiplier);
                assert!(value < 0.0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_flag_and_mode_settings() {
        assert_eq!(
            parse_ok("set armed on"),
            Command::Set(Setting::Armed(true))
        );
        assert_eq!(
            parse_ok("SET Volt_Compare_Mode SEP_DIFF"),
            Command::Set(Setting::Mode(MetricMode::SeparationDifference))
        );
    }

    #[test]
    fn parses_run_durations() {
        assert_eq!(parse_ok("run 250ms"), Command::Run(Duration::from_millis(250)));
        assert_eq!(parse_ok("run 3s"), Command::Run(Duration::from_secs(3)));
    }

    #[test]
    fn parses_help_topic() {
        assert_eq!(
            parse_ok("help set"),
            Command::Help(HelpCommand { topic: Some("set") })
        );
        assert_eq!(parse_ok("help"), Command::Help(HelpCommand { topic: None }));
    }

    #[test]
    fn rejects_unknown_property() {
        match parse("set bogus 1") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(
                    err.kind,
                    GrammarErrorKind::UnknownProperty { lexeme: "bogus", .. }
                ));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_mismatched_value() {
        match parse("set armed 1") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::UnexpectedToken { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        match parse("set volt_compare_mode fast") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(
                    err.kind,
                    GrammarErrorKind::InvalidValue {
                        field: ConfigField::VoltCompareMode,
                        ..
                    }
                ));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_duration() {
        assert!(parse("run").is_err());
        assert!(parse("run 1.5").is_err());
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(parse("arm now").is_err());
    }

    #[test]
    fn rejects_invalid_token() {
        match parse("status$") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidToken { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn lexer_emits_error_token_for_unknown_symbol() {
        let tokens = lex("arm$").expect("lexing should succeed");
        let last = tokens.last().expect("expected at least one token");
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.lexeme, "$");
    }
}
