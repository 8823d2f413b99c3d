/// SQL keywords, operators and punctuation.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    // Statements and clauses
    SELECT,
    DISTINCT,
    FROM,
    WHERE,
    GROUP_BY,
    HAVING,
    ORDER_BY,
    LIMIT,
    OFFSET,
    DELETE_FROM,
    JOIN,
    LEFT_JOIN,
    ON,
    AS,

    // Ordering
    ASC,
    DESC,
    NULLS_FIRST,
    NULLS_LAST,

    // Logical
    AND,
    OR,
    NOT,

    // Predicates
    IN,
    IS,
    IS_NOT,
    LIKE,
    NULL,

    // Comparison and arithmetic
    EQ,
    NE,
    LT,
    LE,
    GT,
    GE,
    PLUS,
    MINUS,
    STAR,
    SLASH,
    CONCAT,

    // Punctuation
    LPAREN,
    RPAREN,
    COMMA,
    DOT,
}

impl Token {
    /// Returns the SQL text for this token.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Token::SELECT => "SELECT",
            Token::DISTINCT => "DISTINCT",
            Token::FROM => "FROM",
            Token::WHERE => "WHERE",
            Token::GROUP_BY => "GROUP BY",
            Token::HAVING => "HAVING",
            Token::ORDER_BY => "ORDER BY",
            Token::LIMIT => "LIMIT",
            Token::OFFSET => "OFFSET",
            Token::DELETE_FROM => "DELETE FROM",
            Token::JOIN => "JOIN",
            Token::LEFT_JOIN => "LEFT JOIN",
            Token::ON => "ON",
            Token::AS => "AS",
            Token::ASC => "ASC",
            Token::DESC => "DESC",
            Token::NULLS_FIRST => "NULLS FIRST",
            Token::NULLS_LAST => "NULLS LAST",
            Token::AND => "AND",
            Token::OR => "OR",
            Token::NOT => "NOT",
            Token::IN => "IN",
            Token::IS => "IS",
            Token::IS_NOT => "IS NOT",
            Token::LIKE => "LIKE",
            Token::NULL => "NULL",
            Token::EQ => "=",
            Token::NE => "<>",
            Token::LT => "<",
            Token::LE => "<=",
            Token::GT => ">",
            Token::GE => ">=",
            Token::PLUS => "+",
            Token::MINUS => "-",
            Token::STAR => "*",
            Token::SLASH => "/",
            Token::CONCAT => "||",
            Token::LPAREN => "(",
            Token::RPAREN => ")",
            Token::COMMA => ",",
            Token::DOT => ".",
        }
    }
}

impl core::fmt::Display for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
