//! Expression parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use serde_json::Value;

use crate::error::ParseError;
use crate::parser::ast::*;
use crate::parser::lexer::Token;

/// Parse the tokens of one delimiter into a single expression
///
/// `eoi` is the byte offset reported for errors at the end of the tokens.
pub fn parse_expression(tokens: &[(Token, Span)], eoi: usize) -> Result<Expr, ParseError> {
    let token_iter = tokens
        .iter()
        .cloned()
        .map(|(tok, span)| (tok, SimpleSpan::from(span)));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream =
        Stream::from_iter(token_iter).map((eoi..eoi).into(), |(t, s): (_, _)| (t, s));

    expression_parser()
        .then_ignore(end())
        .parse(token_stream)
        .into_result()
        .map_err(|errs| match errs.into_iter().next() {
            Some(err) => err.into(),
            None => ParseError::syntax(eoi..eoi, "invalid expression"),
        })
}

fn expression_parser<'a, I>() -> impl Parser<'a, I, Expr, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    recursive(|expr| {
        let literal = select! {
            Token::Integer(n) => Value::from(n),
            Token::Float(f) => Value::from(f),
            Token::String(s) => Value::String(s),
            Token::True => Value::Bool(true),
            Token::False => Value::Bool(false),
            Token::Null => Value::Null,
        }
        .map(Expr::Literal)
        .labelled("literal");

        let identifier = select! {
            Token::Ident(s) => s,
        }
        .labelled("identifier");

        let accessor = choice((
            just(Token::Dot)
                .ignore_then(identifier.clone())
                .map(Accessor::Field),
            expr.clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                .map(|index| Accessor::Index(Box::new(index))),
        ));

        let variable = identifier
            .then(accessor.repeated().collect::<Vec<_>>())
            .map(|(root, accessors)| Expr::Variable { root, accessors });

        let atom = choice((
            literal,
            variable,
            expr.clone()
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
        ));

        // Unary minus binds tightest
        let unary = just(Token::Minus)
            .to(UnaryOp::Neg)
            .repeated()
            .foldr(atom, |op, rhs| Expr::Unary(op, Box::new(rhs)));

        let product_op = choice((
            just(Token::Star).to(BinaryOp::Mul),
            just(Token::Slash).to(BinaryOp::Div),
            just(Token::Percent).to(BinaryOp::Rem),
        ));
        let product = unary
            .clone()
            .foldl(product_op.then(unary).repeated(), |lhs, (op, rhs)| {
                Expr::binary(op, lhs, rhs)
            });

        let sum_op = choice((
            just(Token::Plus).to(BinaryOp::Add),
            just(Token::Minus).to(BinaryOp::Sub),
        ));
        let sum = product
            .clone()
            .foldl(sum_op.then(product).repeated(), |lhs, (op, rhs)| {
                Expr::binary(op, lhs, rhs)
            });

        let comparison_op = choice((
            just(Token::Equal).to(BinaryOp::Equal),
            just(Token::NotEqual).to(BinaryOp::NotEqual),
            just(Token::LessOrEqual).to(BinaryOp::LessOrEqual),
            just(Token::GreaterOrEqual).to(BinaryOp::GreaterOrEqual),
            just(Token::Less).to(BinaryOp::Less),
            just(Token::Greater).to(BinaryOp::Greater),
        ));
        let comparison = sum
            .clone()
            .foldl(comparison_op.then(sum).repeated(), |lhs, (op, rhs)| {
                Expr::binary(op, lhs, rhs)
            });

        // `not a == b` negates the whole comparison
        let negation = just(Token::Not)
            .to(UnaryOp::Not)
            .repeated()
            .foldr(comparison, |op, rhs| Expr::Unary(op, Box::new(rhs)));

        let conjunction = negation.clone().foldl(
            just(Token::And).to(BinaryOp::And).then(negation).repeated(),
            |lhs, (op, rhs)| Expr::binary(op, lhs, rhs),
        );

        conjunction.clone().foldl(
            just(Token::Or).to(BinaryOp::Or).then(conjunction).repeated(),
            |lhs, (op, rhs)| Expr::binary(op, lhs, rhs),
        )
    })
}
