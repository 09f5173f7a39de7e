//! Stylesheet syntax scanning for the frame handler.
//!
//! Parses raw CSS text just far enough to answer the one question the
//! sizing pipeline asks: does any rule targeting `body` declare a `width`
//! or `min-width`? Style rules keep their raw selector prelude and parsed
//! declarations; `@media` blocks are descended one level so width rules
//! behind media queries are still seen.

use cssparser::AtRuleParser as CssAtRuleParser;
use cssparser::BasicParseErrorKind;
use cssparser::CowRcStr;
use cssparser::DeclarationParser as CssDeclarationParser;
use cssparser::ParseError;
use cssparser::Parser;
use cssparser::ParserInput;
use cssparser::ParserState;
use cssparser::QualifiedRuleParser as CssQualifiedRuleParser;
use cssparser::RuleBodyItemParser as CssRuleBodyItemParser;
use cssparser::RuleBodyParser as CssRuleBodyParser;
use cssparser::StyleSheetParser;

/// A single CSS declaration (property: value [!important]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// Lowercased property name.
    pub name: String,
    /// Raw value text (without trailing !important).
    pub value: String,
    /// Whether the declaration was marked as `!important`.
    pub important: bool,
}

/// A single style rule with a raw prelude and parsed declarations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleRule {
    /// Raw prelude text (typically the selector list), trimmed.
    pub prelude: String,
    /// Declarations within the rule block.
    pub declarations: Vec<Declaration>,
}

/// A top-level stylesheet rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    /// A plain style rule.
    Style(StyleRule),
    /// An `@media` block and the style rules nested in it.
    Media {
        /// Raw media query text.
        prelude: String,
        /// Nested style rules in source order.
        rules: Vec<StyleRule>,
    },
}

/// A parsed stylesheet consisting of top-level rules in source order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
}

/// Parse `!important` at the end of a value, returning
/// (`value_without_important`, `important_flag`).
fn split_important_tail(value: &str) -> (String, bool) {
    let trimmed = value.trim();
    if let Some(pos) = trimmed.rfind("!important")
        && let Some(prefix) = trimmed.get(..pos)
    {
        let head = prefix.trim_end();
        return (head.to_owned(), true);
    }
    (trimmed.to_owned(), false)
}

/// A declaration parser that records property name and its raw value.
struct BodyDeclParser;

impl CssDeclarationParser<'_> for BodyDeclParser {
    type Declaration = Declaration;
    type Error = ();

    fn parse_value<'input>(
        &mut self,
        name: CowRcStr<'input>,
        input: &mut Parser<'input, '_>,
        _decl_start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'input, Self::Error>> {
        let start = input.position();
        // Consume until end of the declaration item.
        while input.next_including_whitespace_and_comments().is_ok() {}
        let raw = input.slice_from(start);
        let (value, important) = split_important_tail(raw);
        Ok(Declaration {
            name: name.to_ascii_lowercase(),
            value,
            important,
        })
    }
}

impl CssAtRuleParser<'_> for BodyDeclParser {
    type Prelude = ();
    type AtRule = Declaration; // Not produced
    type Error = ();

    #[inline]
    fn parse_prelude<'input>(
        &mut self,
        _name: CowRcStr<'input>,
        _input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        Ok(())
    }

    #[inline]
    fn parse_block<'input>(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::AtRule, ParseError<'input, Self::Error>> {
        // Not produced by this parser
        Err(input.new_error(BasicParseErrorKind::AtRuleBodyInvalid))
    }

    #[inline]
    fn rule_without_block(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
    ) -> Result<Self::AtRule, Self::Error> {
        Err(())
    }
}

impl CssQualifiedRuleParser<'_> for BodyDeclParser {
    type Prelude = ();
    type QualifiedRule = Declaration; // Not produced
    type Error = ();

    #[inline]
    fn parse_prelude<'input>(
        &mut self,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        Err(input.new_error(BasicParseErrorKind::QualifiedRuleInvalid))
    }

    #[inline]
    fn parse_block<'input>(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::QualifiedRule, ParseError<'input, Self::Error>> {
        Err(input.new_error(BasicParseErrorKind::QualifiedRuleInvalid))
    }
}

impl CssRuleBodyItemParser<'_, Declaration, ()> for BodyDeclParser {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}

/// Parses the style rules nested inside an `@media` block.
struct NestedRuleParser;

impl CssDeclarationParser<'_> for NestedRuleParser {
    type Declaration = StyleRule; // Not produced
    type Error = ();

    #[inline]
    fn parse_value<'input>(
        &mut self,
        _name: CowRcStr<'input>,
        input: &mut Parser<'input, '_>,
        _decl_start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'input, Self::Error>> {
        // Declarations directly inside @media are not style rules.
        Err(input.new_error(BasicParseErrorKind::QualifiedRuleInvalid))
    }
}

impl CssAtRuleParser<'_> for NestedRuleParser {
    type Prelude = ();
    type AtRule = StyleRule; // Not produced
    type Error = ();

    #[inline]
    fn parse_prelude<'input>(
        &mut self,
        _name: CowRcStr<'input>,
        _input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        Ok(())
    }

    #[inline]
    fn parse_block<'input>(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::AtRule, ParseError<'input, Self::Error>> {
        // Nested at-rules are skipped; one level of media is enough here.
        Err(input.new_error(BasicParseErrorKind::AtRuleBodyInvalid))
    }

    #[inline]
    fn rule_without_block(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
    ) -> Result<Self::AtRule, Self::Error> {
        Err(())
    }
}

impl CssQualifiedRuleParser<'_> for NestedRuleParser {
    type Prelude = String; // raw selector/prelude
    type QualifiedRule = StyleRule;
    type Error = ();

    #[inline]
    fn parse_prelude<'input>(
        &mut self,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        let start = input.state();
        while input.next_including_whitespace_and_comments().is_ok() {}
        Ok(input.slice_from(start.position()).trim().to_owned())
    }

    #[inline]
    fn parse_block<'input>(
        &mut self,
        prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::QualifiedRule, ParseError<'input, Self::Error>> {
        let declarations = parse_declarations_from_block(input);
        Ok(StyleRule {
            prelude,
            declarations,
        })
    }
}

impl CssRuleBodyItemParser<'_, StyleRule, ()> for NestedRuleParser {
    fn parse_declarations(&self) -> bool {
        false
    }
    fn parse_qualified(&self) -> bool {
        true
    }
}

/// Top-level parser producing style rules and one-level `@media` blocks.
struct TopLevelParser;

impl CssAtRuleParser<'_> for TopLevelParser {
    /// `Some(media query text)` for `@media`, `None` for skipped at-rules.
    type Prelude = Option<String>;
    type AtRule = Rule;
    type Error = ();

    fn parse_prelude<'input>(
        &mut self,
        name: CowRcStr<'input>,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        if !name.eq_ignore_ascii_case("media") {
            return Ok(None);
        }
        let start = input.position();
        while input.next_including_whitespace_and_comments().is_ok() {}
        Ok(Some(input.slice_from(start).trim().to_owned()))
    }

    fn parse_block<'input>(
        &mut self,
        prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::AtRule, ParseError<'input, Self::Error>> {
        match prelude {
            Some(media) => Ok(Rule::Media {
                prelude: media,
                rules: parse_nested_rules(input),
            }),
            None => Err(input.new_error(BasicParseErrorKind::AtRuleBodyInvalid)),
        }
    }

    #[inline]
    fn rule_without_block(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
    ) -> Result<Self::AtRule, Self::Error> {
        Err(())
    }
}

impl CssQualifiedRuleParser<'_> for TopLevelParser {
    type Prelude = String; // raw selector/prelude
    type QualifiedRule = Rule;
    type Error = ();

    #[inline]
    fn parse_prelude<'input>(
        &mut self,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        let start = input.state();
        while input.next_including_whitespace_and_comments().is_ok() {}
        Ok(input.slice_from(start.position()).trim().to_owned())
    }

    #[inline]
    fn parse_block<'input>(
        &mut self,
        prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::QualifiedRule, ParseError<'input, Self::Error>> {
        let declarations = parse_declarations_from_block(input);
        Ok(Rule::Style(StyleRule {
            prelude,
            declarations,
        }))
    }
}

/// Parse declarations from a rule block using `cssparser` body parser.
fn parse_declarations_from_block(block: &mut Parser) -> Vec<Declaration> {
    let mut out: Vec<Declaration> = Vec::new();
    let mut body = BodyDeclParser;
    for declaration in CssRuleBodyParser::new(block, &mut body).flatten() {
        out.push(declaration);
    }
    out
}

/// Parse the style rules inside an `@media` block.
fn parse_nested_rules(block: &mut Parser) -> Vec<StyleRule> {
    let mut out: Vec<StyleRule> = Vec::new();
    let mut nested = NestedRuleParser;
    for rule in CssRuleBodyParser::new(block, &mut nested).flatten() {
        out.push(rule);
    }
    out
}

/// Parse a full stylesheet using cssparser. Unparseable rules are dropped.
pub fn parse_stylesheet(css: &str) -> Stylesheet {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut top = TopLevelParser;
    let mut sheet = Stylesheet::default();
    for rule in StyleSheetParser::new(&mut parser, &mut top).flatten() {
        sheet.rules.push(rule);
    }
    sheet
}

/// True when the rule's selector is exactly `body` and it declares
/// `width` or `min-width`.
fn is_body_width_rule(rule: &StyleRule) -> bool {
    rule.prelude == "body"
        && rule
            .declarations
            .iter()
            .any(|declaration| declaration.name == "width" || declaration.name == "min-width")
}

/// Scan parsed stylesheets for a rule that gives the body an intrinsic
/// width. Inside each media block only the last matching nested rule is
/// considered, mirroring how the embedded page would cascade them.
pub fn has_body_width_rule(sheets: &[Stylesheet]) -> bool {
    sheets
        .iter()
        .flat_map(|sheet| &sheet.rules)
        .any(|rule| match rule {
            Rule::Style(style) => is_body_width_rule(style),
            Rule::Media { rules, .. } => {
                // The last matching nested rule is the one the page would
                // end up cascading; its presence is all that matters here.
                rules.iter().rfind(|rule| is_body_width_rule(rule)).is_some()
            }
        })
}
