// Formula parser - converts formula strings into AST
// Supports: numbers, strings, booleans, error literals, cell refs (A1, $A$1),
// ranges (A1:B5), sheet-qualified refs ('My Sheet'!A1), function calls,
// arithmetic, comparison, concatenation (&), power (^), percent (%)

use cellgrid_core::{col_to_letters, Position, Zone};

use super::refs::Reference;
use super::value::ErrorKind;

/// Sheet a reference points into. Names are resolved when the formula is
/// registered or evaluated, so one tree serves every cell that shares the text.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetRef {
    Current,
    Named(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Error literal such as `#REF!` (left behind when a referenced row is deleted)
    Error(ErrorKind),
    /// Cell reference
    /// - col_abs/row_abs: true if that component is absolute ($A vs A, $1 vs 1)
    CellRef {
        sheet: SheetRef,
        col: usize,
        row: usize,
        col_abs: bool,
        row_abs: bool,
    },
    /// Range reference, normalized so start <= end on both axes
    Range {
        sheet: SheetRef,
        start_col: usize,
        start_row: usize,
        end_col: usize,
        end_row: usize,
        start_col_abs: bool,
        start_row_abs: bool,
        end_col_abs: bool,
        end_row_abs: bool,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Explicit parentheses, kept so rewritten formulas print the same grouping
    Group(Box<Expr>),
    /// Bare identifier that is not a function call
    Name(String),
    /// Empty/omitted argument (e.g. the trailing slot in `=IF(a,b,)`)
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    // Comparison
    Lt,      // <
    Gt,      // >
    Eq,      // =
    LtEq,    // <=
    GtEq,    // >=
    NotEq,   // <>
    // String
    Concat,  // &
    // Exponentiation
    Pow,     // ^
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Percent,
}

/// Parse a formula string (with leading '=') into an AST.
pub fn parse(formula: &str) -> Result<Expr, String> {
    let formula = formula.trim();
    let input = formula
        .strip_prefix('=')
        .ok_or_else(|| "Formula must start with =".to_string())?;
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("Empty formula".to_string());
    }
    let (expr, pos) = parse_comparison(&tokens, 0)?;
    if pos < tokens.len() {
        return Err(format!("Unexpected token at position {}", pos));
    }
    Ok(expr)
}

/// References in formula text that may be incomplete (`=SUM(A1:B2`).
/// Text that cannot be tokenized yields nothing.
pub fn scan_references(formula: &str) -> Vec<Reference> {
    let Some(input) = formula.trim().strip_prefix('=') else { return Vec::new() };
    let Ok(tokens) = tokenize(input) else { return Vec::new() };
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let (sheet, at) = match &tokens[i] {
            Token::SheetPrefix(name) => (SheetRef::Named(name.clone()), i + 1),
            _ => (SheetRef::Current, i),
        };
        let Some(Token::CellRef { col, row, .. }) = tokens.get(at) else {
            i += 1;
            continue;
        };
        let start = Position::new(*row, *col);
        match (tokens.get(at + 1), tokens.get(at + 2)) {
            (Some(Token::Colon), Some(Token::CellRef { col: c2, row: r2, .. })) => {
                let zone = Zone::from_positions(start, Position::new(*r2, *c2));
                out.push(Reference::Range { sheet, zone });
                i = at + 3;
            }
            _ => {
                out.push(Reference::Cell { sheet, position: start });
                i = at + 1;
            }
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    StringLit(String),
    ErrorLit(ErrorKind),
    /// Cell reference with absolute/relative flags
    CellRef {
        col: usize,
        row: usize,
        col_abs: bool,
        row_abs: bool,
    },
    /// Sheet name prefix (e.g., "Sheet1" from "Sheet1!A1")
    SheetPrefix(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Colon,
    Comma,
    Lt,
    Gt,
    Eq,
    LtEq,
    GtEq,
    NotEq,
    Ampersand,
    Caret,
    Percent,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => { chars.next(); }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '*' => { tokens.push(Token::Star); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            ':' => { tokens.push(Token::Colon); chars.next(); }
            ',' => { tokens.push(Token::Comma); chars.next(); }
            '&' => { tokens.push(Token::Ampersand); chars.next(); }
            '^' => { tokens.push(Token::Caret); chars.next(); }
            '%' => { tokens.push(Token::Percent); chars.next(); }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => { tokens.push(Token::LtEq); chars.next(); }
                    Some('>') => { tokens.push(Token::NotEq); chars.next(); }
                    _ => tokens.push(Token::Lt),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    tokens.push(Token::GtEq);
                    chars.next();
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '=' => { tokens.push(Token::Eq); chars.next(); }
            '"' => {
                // String literal; a doubled quote is an escaped quote
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            s.push('"');
                        }
                        Some('"') => break,
                        Some(ch) => s.push(ch),
                        None => return Err("Unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::StringLit(s));
            }
            '#' => {
                let rest: String = chars.clone().collect();
                let kind = ErrorKind::ALL
                    .into_iter()
                    .find(|k| {
                        rest.get(..k.code().len())
                            .map_or(false, |head| head.eq_ignore_ascii_case(k.code()))
                    })
                    .ok_or_else(|| format!("Unknown error literal: {}", rest))?;
                for _ in 0..kind.code().chars().count() {
                    chars.next();
                }
                tokens.push(Token::ErrorLit(kind));
            }
            '\'' => {
                // Quoted sheet name (e.g., 'My Sheet'!A1 or 'Bob''s Sheet'!A1)
                chars.next();
                let mut sheet_name = String::new();
                loop {
                    match chars.next() {
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            sheet_name.push('\'');
                        }
                        Some('\'') => break,
                        Some(ch) => sheet_name.push(ch),
                        None => return Err("Unterminated sheet name".to_string()),
                    }
                }
                if chars.next() != Some('!') {
                    return Err("Quoted sheet name must be followed by !".to_string());
                }
                tokens.push(Token::SheetPrefix(sheet_name));
            }
            'A'..='Z' | 'a'..='z' | '_' | '$' => {
                // Cell reference (A1, $B$2), function name (SUM), or sheet prefix (Sheet1!)
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' || ch == '.' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }

                if chars.peek() == Some(&'!') {
                    chars.next();
                    tokens.push(Token::SheetPrefix(ident));
                    continue;
                }

                let upper = ident.to_uppercase();
                let is_call = chars.peek() == Some(&'(');
                match try_parse_cell_ref(&upper) {
                    Some(token) if !is_call => tokens.push(token),
                    _ if ident.contains('$') => {
                        return Err(format!("Invalid cell reference: {}", ident));
                    }
                    _ => tokens.push(Token::Ident(upper)),
                }
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Exponent: 1e5, 2.5E-3
                if matches!(chars.peek(), Some('e') | Some('E')) {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    let mut exp = String::from("e");
                    if let Some(&sign) = lookahead.peek() {
                        if sign == '+' || sign == '-' {
                            exp.push(sign);
                            lookahead.next();
                        }
                    }
                    if lookahead.peek().map_or(false, |d| d.is_ascii_digit()) {
                        while let Some(&d) = lookahead.peek() {
                            if d.is_ascii_digit() {
                                exp.push(d);
                                lookahead.next();
                            } else {
                                break;
                            }
                        }
                        chars = lookahead;
                        num_str.push_str(&exp);
                    }
                }
                let num: f64 = num_str.parse().map_err(|_| format!("Invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            _ => return Err(format!("Unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

fn try_parse_cell_ref(s: &str) -> Option<Token> {
    let mut chars = s.chars().peekable();

    let col_abs = chars.next_if_eq(&'$').is_some();

    let mut col_str = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_uppercase()) {
        col_str.push(c);
    }
    if col_str.is_empty() || col_str.len() > 3 {
        return None;
    }

    let row_abs = chars.next_if_eq(&'$').is_some();

    let row_str: String = chars.collect();
    if row_str.is_empty() || !row_str.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let row: usize = row_str.parse().ok()?;
    if row == 0 {
        return None;
    }
    let col = cellgrid_core::letters_to_col(&col_str)?;

    Some(Token::CellRef { col, row: row - 1, col_abs, row_abs })
}

type Parsed = Result<(Expr, usize), String>;

// Lowest precedence: comparison operators
fn parse_comparison(tokens: &[Token], pos: usize) -> Parsed {
    let (mut left, mut pos) = parse_concat(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Lt => Op::Lt,
            Token::Gt => Op::Gt,
            Token::Eq => Op::Eq,
            Token::LtEq => Op::LtEq,
            Token::GtEq => Op::GtEq,
            Token::NotEq => Op::NotEq,
            _ => break,
        };
        let (right, new_pos) = parse_concat(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_concat(tokens: &[Token], pos: usize) -> Parsed {
    let (mut left, mut pos) = parse_add_sub(tokens, pos)?;

    while pos < tokens.len() && tokens[pos] == Token::Ampersand {
        let (right, new_pos) = parse_add_sub(tokens, pos + 1)?;
        left = binary(Op::Concat, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Parsed {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Parsed {
    let (mut left, mut pos) = parse_power(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            _ => break,
        };
        let (right, new_pos) = parse_power(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

// Exponentiation (^) - right-associative, higher precedence than * /
fn parse_power(tokens: &[Token], pos: usize) -> Parsed {
    let (base, pos) = parse_percent(tokens, pos)?;

    if pos < tokens.len() && tokens[pos] == Token::Caret {
        let (exponent, new_pos) = parse_power(tokens, pos + 1)?;
        return Ok((binary(Op::Pow, base, exponent), new_pos));
    }

    Ok((base, pos))
}

// Percent postfix (%)
fn parse_percent(tokens: &[Token], pos: usize) -> Parsed {
    let (mut expr, mut pos) = parse_unary(tokens, pos)?;

    while pos < tokens.len() && tokens[pos] == Token::Percent {
        expr = Expr::Unary { op: UnaryOp::Percent, operand: Box::new(expr) };
        pos += 1;
    }

    Ok((expr, pos))
}

fn parse_unary(tokens: &[Token], pos: usize) -> Parsed {
    let op = match tokens.get(pos) {
        Some(Token::Minus) => UnaryOp::Neg,
        Some(Token::Plus) => UnaryOp::Plus,
        _ => return parse_primary(tokens, pos),
    };
    let (operand, pos) = parse_unary(tokens, pos + 1)?;
    Ok((Expr::Unary { op, operand: Box::new(operand) }, pos))
}

fn parse_primary(tokens: &[Token], pos: usize) -> Parsed {
    let token = tokens.get(pos).ok_or_else(|| "Unexpected end of expression".to_string())?;

    match token {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::StringLit(s) => Ok((Expr::Text(s.clone()), pos + 1)),
        Token::ErrorLit(kind) => Ok((Expr::Error(*kind), pos + 1)),
        Token::SheetPrefix(sheet_name) => {
            match tokens.get(pos + 1) {
                Some(Token::CellRef { .. }) => {
                    parse_reference(tokens, pos + 1, SheetRef::Named(sheet_name.clone()))
                }
                _ => Err("Sheet reference must be followed by cell reference".to_string()),
            }
        }
        Token::CellRef { .. } => parse_reference(tokens, pos, SheetRef::Current),
        Token::Ident(name) => {
            if name == "TRUE" || name == "FALSE" {
                // TRUE() and FALSE() are functions too
                if tokens.get(pos + 1) != Some(&Token::LParen) {
                    return Ok((Expr::Boolean(name == "TRUE"), pos + 1));
                }
            }
            if tokens.get(pos + 1) == Some(&Token::LParen) {
                let (args, new_pos) = parse_function_args(tokens, pos + 2)?;
                return Ok((Expr::Function { name: name.clone(), args }, new_pos));
            }
            Ok((Expr::Name(name.clone()), pos + 1))
        }
        Token::LParen => {
            let (expr, pos) = parse_comparison(tokens, pos + 1)?;
            match tokens.get(pos) {
                Some(Token::RParen) => Ok((Expr::Group(Box::new(expr)), pos + 1)),
                Some(_) => Err("Expected closing parenthesis".to_string()),
                None => Err("Missing closing parenthesis".to_string()),
            }
        }
        _ => Err(format!("Unexpected token at position {}", pos)),
    }
}

/// Parse `A1` or `A1:B5` starting at a CellRef token.
fn parse_reference(tokens: &[Token], pos: usize, sheet: SheetRef) -> Parsed {
    let Some(&Token::CellRef { col, row, col_abs, row_abs }) = tokens.get(pos) else {
        return Err("Expected cell reference".to_string());
    };
    if tokens.get(pos + 1) == Some(&Token::Colon) {
        if let Some(&Token::CellRef { col: end_col, row: end_row, col_abs: end_col_abs, row_abs: end_row_abs }) =
            tokens.get(pos + 2)
        {
            let (start_col, end_col, start_col_abs, end_col_abs) =
                ordered(col, end_col, col_abs, end_col_abs);
            let (start_row, end_row, start_row_abs, end_row_abs) =
                ordered(row, end_row, row_abs, end_row_abs);
            return Ok((
                Expr::Range {
                    sheet,
                    start_col,
                    start_row,
                    end_col,
                    end_row,
                    start_col_abs,
                    start_row_abs,
                    end_col_abs,
                    end_row_abs,
                },
                pos + 3,
            ));
        }
        return Err("Range must end with a cell reference".to_string());
    }
    Ok((Expr::CellRef { sheet, col, row, col_abs, row_abs }, pos + 1))
}

fn ordered(a: usize, b: usize, a_abs: bool, b_abs: bool) -> (usize, usize, bool, bool) {
    if a <= b {
        (a, b, a_abs, b_abs)
    } else {
        (b, a, b_abs, a_abs)
    }
}

fn parse_function_args(tokens: &[Token], pos: usize) -> Result<(Vec<Expr>, usize), String> {
    let mut args = Vec::new();
    let mut pos = pos;

    // Handle empty function call SUM()
    if tokens.get(pos) == Some(&Token::RParen) {
        return Ok((args, pos + 1));
    }

    loop {
        // Empty argument: next token is , or ) immediately
        match tokens.get(pos) {
            Some(Token::RParen) => {
                args.push(Expr::Empty);
                return Ok((args, pos + 1));
            }
            Some(Token::Comma) => {
                args.push(Expr::Empty);
                pos += 1;
                continue;
            }
            _ => {}
        }

        let (arg, new_pos) = parse_comparison(tokens, pos)?;
        args.push(arg);
        pos = new_pos;

        match tokens.get(pos) {
            Some(Token::RParen) => return Ok((args, pos + 1)),
            Some(Token::Comma) => pos += 1,
            Some(_) => return Err("Expected comma or closing parenthesis".to_string()),
            None => return Err("Missing closing parenthesis in function call".to_string()),
        }
    }
}

fn binary(op: Op, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right) }
}

// =============================================================================
// Formula Printing - Convert Expr back to string
// =============================================================================

/// Format an expression as a formula string (with leading '=').
pub fn format_formula(expr: &Expr) -> String {
    format!("={}", format_expr(expr))
}

/// Format an expression without the leading '='.
pub fn format_expr(expr: &Expr) -> String {
    match expr {
        Expr::Empty => String::new(),
        Expr::Number(n) => super::value::format_number(*n),
        Expr::Text(s) => format!("\"{}\"", s.replace('"', "\"\"")),
        Expr::Boolean(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
        Expr::Error(kind) => kind.code().to_string(),
        Expr::Name(name) => name.clone(),
        Expr::CellRef { sheet, col, row, col_abs, row_abs } => {
            format!("{}{}", format_sheet_prefix(sheet), format_cell_addr(*col, *row, *col_abs, *row_abs))
        }
        Expr::Range { sheet, start_col, start_row, end_col, end_row, start_col_abs, start_row_abs, end_col_abs, end_row_abs } => {
            let start = format_cell_addr(*start_col, *start_row, *start_col_abs, *start_row_abs);
            let end = format_cell_addr(*end_col, *end_row, *end_col_abs, *end_row_abs);
            format!("{}{}:{}", format_sheet_prefix(sheet), start, end)
        }
        Expr::Function { name, args } => {
            let args_str: Vec<String> = args.iter().map(format_expr).collect();
            format!("{}({})", name, args_str.join(","))
        }
        Expr::BinaryOp { op, left, right } => {
            let op_str = match op {
                Op::Add => "+",
                Op::Sub => "-",
                Op::Mul => "*",
                Op::Div => "/",
                Op::Lt => "<",
                Op::Gt => ">",
                Op::Eq => "=",
                Op::LtEq => "<=",
                Op::GtEq => ">=",
                Op::NotEq => "<>",
                Op::Concat => "&",
                Op::Pow => "^",
            };
            format!("{}{}{}", format_expr(left), op_str, format_expr(right))
        }
        Expr::Unary { op: UnaryOp::Neg, operand } => format!("-{}", format_expr(operand)),
        Expr::Unary { op: UnaryOp::Plus, operand } => format!("+{}", format_expr(operand)),
        Expr::Unary { op: UnaryOp::Percent, operand } => format!("{}%", format_expr(operand)),
        Expr::Group(inner) => format!("({})", format_expr(inner)),
    }
}

fn format_sheet_prefix(sheet: &SheetRef) -> String {
    match sheet {
        SheetRef::Current => String::new(),
        SheetRef::Named(name) => format!("{}!", format_sheet_name(name)),
    }
}

/// Format a sheet name, adding quotes if necessary
pub fn format_sheet_name(name: &str) -> String {
    let plain = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.chars().next().map_or(false, |c| c.is_ascii_digit())
        && try_parse_cell_ref(&name.to_uppercase()).is_none();

    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

fn format_cell_addr(col: usize, row: usize, col_abs: bool, row_abs: bool) -> String {
    format!(
        "{}{}{}{}",
        if col_abs { "$" } else { "" },
        col_to_letters(col),
        if row_abs { "$" } else { "" },
        row + 1
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(formula: &str) -> String {
        format_formula(&parse(formula).unwrap())
    }

    #[test]
    fn test_parse_absolute_both() {
        match parse("=$A$1").unwrap() {
            Expr::CellRef { col, row, col_abs, row_abs, .. } => {
                assert_eq!((col, row), (0, 0));
                assert!(col_abs && row_abs);
            }
            other => panic!("Expected CellRef, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_mixed_absolute() {
        match parse("=$O95").unwrap() {
            Expr::CellRef { col, row, col_abs, row_abs, .. } => {
                assert_eq!((col, row), (14, 94));
                assert!(col_abs);
                assert!(!row_abs);
            }
            other => panic!("Expected CellRef, got {:?}", other),
        }
    }

    #[test]
    fn test_reversed_range_is_normalized() {
        match parse("=B$3:$A1").unwrap() {
            Expr::Range { start_col, start_row, end_col, end_row, start_col_abs, start_row_abs, end_col_abs, end_row_abs, .. } => {
                assert_eq!((start_col, start_row, end_col, end_row), (0, 0, 1, 2));
                assert!(start_col_abs && !end_col_abs);
                assert!(!start_row_abs && end_row_abs);
            }
            other => panic!("Expected Range, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 ^ 2 parses with ^ tightest, then *, then +
        let expr = parse("=1+2*3^2").unwrap();
        match expr {
            Expr::BinaryOp { op: Op::Add, right, .. } => match *right {
                Expr::BinaryOp { op: Op::Mul, right, .. } => {
                    assert!(matches!(*right, Expr::BinaryOp { op: Op::Pow, .. }));
                }
                other => panic!("Expected Mul, got {:?}", other),
            },
            other => panic!("Expected Add, got {:?}", other),
        }
    }

    #[test]
    fn test_power_is_right_associative() {
        assert_eq!(round_trip("=2^3^2"), "=2^3^2");
        match parse("=2^3^2").unwrap() {
            Expr::BinaryOp { op: Op::Pow, left, right } => {
                assert_eq!(*left, Expr::Number(2.0));
                assert!(matches!(*right, Expr::BinaryOp { op: Op::Pow, .. }));
            }
            other => panic!("Expected Pow, got {:?}", other),
        }
    }

    #[test]
    fn test_format_keeps_parentheses_and_unary() {
        assert_eq!(round_trip("=(A1+B1)*2"), "=(A1+B1)*2");
        assert_eq!(round_trip("=-A1+50%"), "=-A1+50%");
        assert_eq!(round_trip("= sum( a1 : b2 , 3 )"), "=SUM(A1:B2,3)");
    }

    #[test]
    fn test_sheet_prefixes() {
        assert_eq!(round_trip("='My Sheet'!A1+Data!$B$2"), "='My Sheet'!A1+Data!$B$2");
        assert_eq!(round_trip("='Bob''s'!A1:B2"), "='Bob''s'!A1:B2");
        match parse("=Data!C3").unwrap() {
            Expr::CellRef { sheet, .. } => assert_eq!(sheet, SheetRef::Named("Data".to_string())),
            other => panic!("Expected CellRef, got {:?}", other),
        }
    }

    #[test]
    fn test_sheet_name_that_looks_like_a_cell_is_quoted() {
        assert_eq!(format_sheet_name("AB12"), "'AB12'");
        assert_eq!(format_sheet_name("Sheet1"), "Sheet1");
        assert_eq!(format_sheet_name("2024"), "'2024'");
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(parse("=\"say \"\"hi\"\"\"").unwrap(), Expr::Text("say \"hi\"".to_string()));
        assert_eq!(round_trip("=\"a\"\"b\"&C1"), "=\"a\"\"b\"&C1");
        assert!(parse("=\"open").is_err());
    }

    #[test]
    fn test_error_literals() {
        assert_eq!(parse("=#REF!").unwrap(), Expr::Error(ErrorKind::BadReference));
        assert_eq!(round_trip("=SUM(#ref!,1)"), "=SUM(#REF!,1)");
        assert!(parse("=#WHAT").is_err());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse("=1.5e3").unwrap(), Expr::Number(1500.0));
        assert_eq!(parse("=.25").unwrap(), Expr::Number(0.25));
        assert!(parse("=1.2.3").is_err());
    }

    #[test]
    fn test_booleans_and_names() {
        assert_eq!(parse("=true").unwrap(), Expr::Boolean(true));
        assert!(matches!(parse("=TRUE()").unwrap(), Expr::Function { .. }));
        assert_eq!(parse("=revenue").unwrap(), Expr::Name("REVENUE".to_string()));
    }

    #[test]
    fn test_cell_like_function_name_is_a_call() {
        match parse("=LOG10(100)").unwrap() {
            Expr::Function { name, args } => {
                assert_eq!(name, "LOG10");
                assert_eq!(args.len(), 1);
            }
            other => panic!("Expected Function, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_arguments() {
        match parse("=IF(A1,,)").unwrap() {
            Expr::Function { args, .. } => {
                assert_eq!(args.len(), 3);
                assert_eq!(args[1], Expr::Empty);
                assert_eq!(args[2], Expr::Empty);
            }
            other => panic!("Expected Function, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("A1").is_err());
        assert!(parse("=").is_err());
        assert!(parse("=1+").is_err());
        assert!(parse("=(1+2").is_err());
        assert!(parse("=1 2").is_err());
        assert!(parse("=Sheet1!").is_err());
        assert!(parse("=A1:").is_err());
    }

    #[test]
    fn test_scan_references_in_partial_formula() {
        let refs = scan_references("=SUM(A1:B2, 'My Data'!C3 +");
        assert_eq!(
            refs,
            vec![
                Reference::Range { sheet: SheetRef::Current, zone: Zone::new(0, 0, 1, 1) },
                Reference::Cell { sheet: SheetRef::Named("My Data".into()), position: Position::new(2, 2) },
            ]
        );
        assert!(scan_references("plain text").is_empty());
        assert!(scan_references("=\"unterminated").is_empty());
    }
}
