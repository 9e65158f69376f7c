//! Parse CREATE TABLE / ALTER TABLE statements into a schema description.

use tracing::{debug, warn};
use thiserror::Error;

use super::dialect::Dialect;
use super::lexer::{Lexer, Token};
use crate::schema::{ColumnPair, ColumnSchema, ForeignKey, SchemaDescription, TableSchema};

#[derive(Debug, Error)]
pub enum SqlParseError {
    #[error("Expected {expected}, found {found:?}")]
    Expected { expected: &'static str, found: Token },
    #[error("Unexpected end of input in table {0}")]
    UnexpectedEof(String),
}

/// Parse a DDL dump. Tables come from CREATE TABLE; keys from inline
/// column modifiers, table constraints and ALTER TABLE ... ADD CONSTRAINT.
pub fn parse_sql(input: &str, dialect: Dialect) -> Result<SchemaDescription, SqlParseError> {
    let dialect = dialect.resolve(input);
    let tokens = Lexer::new(input).tokenize();
    let mut parser = Parser::new(tokens, dialect);
    parser.parse()?;
    Ok(parser.finish())
}

/// FK as written; target columns may be omitted and resolved later.
#[derive(Debug)]
struct PendingFk {
    name: Option<String>,
    source: String,
    columns: Vec<String>,
    target: String,
    target_columns: Vec<String>,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    dialect: Dialect,
    tables: Vec<TableSchema>,
    fks: Vec<PendingFk>,
}

impl Parser {
    fn new(tokens: Vec<Token>, dialect: Dialect) -> Self {
        Self {
            tokens,
            pos: 0,
            dialect,
            tables: Vec::new(),
            fks: Vec::new(),
        }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.current() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), SqlParseError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(SqlParseError::Expected {
                expected,
                found: self.current().clone(),
            })
        }
    }

    /// Identifier text, folded the way the dialect folds unquoted names.
    fn ident(&mut self) -> Option<String> {
        let name = match self.current() {
            Token::Ident(s) if self.dialect.folds_to_lowercase() => s.to_lowercase(),
            Token::Ident(s) | Token::QuotedIdent(s) => s.clone(),
            _ => return None,
        };
        self.advance();
        Some(name)
    }

    fn expect_ident(&mut self, expected: &'static str) -> Result<String, SqlParseError> {
        self.ident().ok_or_else(|| SqlParseError::Expected {
            expected,
            found: self.current().clone(),
        })
    }

    /// `name` or `schema.name`; the schema qualifier is dropped.
    fn qualified_name(&mut self) -> Result<String, SqlParseError> {
        let mut name = self.expect_ident("table name")?;
        while self.eat(&Token::Dot) {
            name = self.expect_ident("table name")?;
        }
        Ok(name)
    }

    fn parse(&mut self) -> Result<(), SqlParseError> {
        loop {
            match self.current() {
                Token::Eof => return Ok(()),
                Token::Create => {
                    self.advance();
                    // CREATE [TEMPORARY | UNLOGGED ...] TABLE
                    while matches!(self.current(), Token::Ident(_)) {
                        self.advance();
                    }
                    if self.eat(&Token::Table) {
                        self.parse_create_table()?;
                    } else {
                        self.skip_statement();
                    }
                }
                Token::Alter => {
                    self.advance();
                    if self.eat(&Token::Table) {
                        self.parse_alter_table()?;
                    } else {
                        self.skip_statement();
                    }
                }
                _ => self.skip_statement(),
            }
        }
    }

    fn skip_if_exists(&mut self) {
        if self.eat(&Token::If) {
            self.eat(&Token::Not);
            self.eat(&Token::Exists);
        }
    }

    fn parse_create_table(&mut self) -> Result<(), SqlParseError> {
        self.skip_if_exists();
        let name = self.qualified_name()?;
        if !self.eat(&Token::LParen) {
            // CREATE TABLE ... AS SELECT and friends
            self.skip_statement();
            return Ok(());
        }

        let mut table = TableSchema::new(name);
        loop {
            match self.current() {
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Comma => self.advance(),
                Token::Eof => return Err(SqlParseError::UnexpectedEof(table.table_name)),
                Token::Constraint | Token::Primary | Token::Foreign | Token::Unique
                | Token::Index | Token::Key | Token::Check => {
                    self.parse_table_constraint(&mut table)?;
                }
                Token::Ident(_) | Token::QuotedIdent(_) => self.parse_column(&mut table)?,
                _ => self.skip_item(),
            }
        }

        // Table options (ENGINE=..., PARTITION BY ...)
        self.skip_statement();
        debug!(table = %table.table_name, columns = table.columns.len(), "table parsed");
        self.tables.push(table);
        Ok(())
    }

    fn parse_column(&mut self, table: &mut TableSchema) -> Result<(), SqlParseError> {
        let name = self.expect_ident("column name")?;
        let typ = self.parse_type();
        let mut constraint_name = None;

        loop {
            match self.current() {
                Token::Comma | Token::RParen | Token::Eof => break,
                Token::Primary => {
                    self.advance();
                    self.eat(&Token::Key);
                    table.primary_key.push(name.clone());
                }
                Token::Constraint => {
                    self.advance();
                    constraint_name = self.ident();
                }
                Token::References => {
                    self.advance();
                    let (target, target_columns) = self.parse_reference()?;
                    self.fks.push(PendingFk {
                        name: constraint_name.take(),
                        source: table.table_name.clone(),
                        columns: vec![name.clone()],
                        target,
                        target_columns,
                    });
                }
                Token::LParen => self.skip_parenthesized(),
                _ => self.advance(),
            }
        }

        table.columns.push(ColumnSchema { name, typ });
        Ok(())
    }

    /// Type words up to the first modifier, e.g. `character varying(255)`.
    fn parse_type(&mut self) -> String {
        let mut typ = String::new();
        loop {
            match self.current() {
                Token::Ident(word) => {
                    if !typ.is_empty() && !typ.ends_with('(') {
                        typ.push(' ');
                    }
                    typ.push_str(&word.to_lowercase());
                }
                Token::LParen if !typ.is_empty() => {
                    typ.push('(');
                    self.advance();
                    loop {
                        match self.current() {
                            Token::RParen => {
                                typ.push(')');
                                break;
                            }
                            Token::Eof => return typ,
                            Token::Comma => typ.push(','),
                            Token::Num(n) | Token::Ident(n) | Token::Str(n) => typ.push_str(n),
                            _ => {}
                        }
                        self.advance();
                    }
                }
                _ => return typ,
            }
            self.advance();
        }
    }

    fn parse_table_constraint(&mut self, table: &mut TableSchema) -> Result<(), SqlParseError> {
        let mut name = None;
        if self.eat(&Token::Constraint) {
            name = self.ident();
        }

        match self.current() {
            Token::Primary => {
                self.advance();
                self.expect(Token::Key, "KEY")?;
                table.primary_key = self.parse_column_list()?;
            }
            Token::Foreign => {
                let mut fk = self.parse_foreign_key(&table.table_name)?;
                fk.name = name;
                self.fks.push(fk);
            }
            _ => self.skip_item(),
        }
        Ok(())
    }

    /// `FOREIGN KEY (cols) REFERENCES target [(cols)] [ON ...]`
    fn parse_foreign_key(&mut self, source: &str) -> Result<PendingFk, SqlParseError> {
        self.expect(Token::Foreign, "FOREIGN")?;
        self.expect(Token::Key, "KEY")?;
        let columns = self.parse_column_list()?;
        self.expect(Token::References, "REFERENCES")?;
        let (target, target_columns) = self.parse_reference()?;
        Ok(PendingFk {
            name: None,
            source: source.to_string(),
            columns,
            target,
            target_columns,
        })
    }

    fn parse_reference(&mut self) -> Result<(String, Vec<String>), SqlParseError> {
        let target = self.qualified_name()?;
        let columns = if self.current() == &Token::LParen {
            self.parse_column_list()?
        } else {
            Vec::new()
        };
        Ok((target, columns))
    }

    fn parse_column_list(&mut self) -> Result<Vec<String>, SqlParseError> {
        self.expect(Token::LParen, "(")?;
        let mut cols = Vec::new();
        loop {
            match self.current() {
                Token::RParen => {
                    self.advance();
                    return Ok(cols);
                }
                Token::Comma => self.advance(),
                Token::Eof => {
                    return Err(SqlParseError::Expected {
                        expected: ")",
                        found: Token::Eof,
                    });
                }
                _ => match self.ident() {
                    Some(col) => cols.push(col),
                    // ASC/DESC, prefix lengths and similar.
                    None if self.current() == &Token::LParen => self.skip_parenthesized(),
                    None => self.advance(),
                },
            }
        }
    }

    /// `ALTER TABLE [ONLY] [IF EXISTS] t ADD [CONSTRAINT n] {PRIMARY KEY | FOREIGN KEY} ...`
    fn parse_alter_table(&mut self) -> Result<(), SqlParseError> {
        self.skip_if_exists();
        self.eat(&Token::Only);
        let table_name = self.qualified_name()?;

        if !self.eat(&Token::Add) {
            self.skip_statement();
            return Ok(());
        }
        let mut name = None;
        if self.eat(&Token::Constraint) {
            name = self.ident();
        }

        match self.current() {
            Token::Primary => {
                self.advance();
                self.expect(Token::Key, "KEY")?;
                let columns = self.parse_column_list()?;
                match self.tables.iter_mut().find(|t| t.table_name == table_name) {
                    Some(table) => table.primary_key = columns,
                    None => warn!(table = %table_name, "primary key for unknown table"),
                }
            }
            Token::Foreign => {
                let mut fk = self.parse_foreign_key(&table_name)?;
                fk.name = name;
                self.fks.push(fk);
            }
            _ => {}
        }
        self.skip_statement();
        Ok(())
    }

    fn skip_parenthesized(&mut self) {
        if !self.eat(&Token::LParen) {
            return;
        }
        let mut depth = 1;
        while depth > 0 {
            match self.current() {
                Token::LParen => depth += 1,
                Token::RParen => depth -= 1,
                Token::Eof => return,
                _ => {}
            }
            self.advance();
        }
    }

    /// Skip to the next top-level comma or the closing paren of the table body.
    fn skip_item(&mut self) {
        loop {
            match self.current() {
                Token::Comma | Token::RParen | Token::Eof => return,
                Token::LParen => self.skip_parenthesized(),
                _ => self.advance(),
            }
        }
    }

    fn skip_statement(&mut self) {
        loop {
            match self.current() {
                Token::Eof => return,
                Token::Semicolon => {
                    self.advance();
                    return;
                }
                _ => self.advance(),
            }
        }
    }

    /// Attach pending FKs to their tables, filling omitted target columns
    /// from the target's primary key.
    fn finish(mut self) -> SchemaDescription {
        let fks = std::mem::take(&mut self.fks);
        for fk in fks {
            let Some(target) = self.tables.iter().find(|t| t.table_name == fk.target) else {
                debug!(source = %fk.source, target = %fk.target, "reference to a table outside the dump");
                continue;
            };
            let target_columns = if fk.target_columns.is_empty() {
                target.primary_key.clone()
            } else {
                fk.target_columns
            };
            if target_columns.len() != fk.columns.len() {
                warn!(source = %fk.source, target = %fk.target, "foreign key column count mismatch, skipped");
                continue;
            }

            let Some(source) = self.tables.iter_mut().find(|t| t.table_name == fk.source) else {
                warn!(source = %fk.source, "foreign key on unknown table, skipped");
                continue;
            };
            let name = fk
                .name
                .unwrap_or_else(|| format!("{}_{}_fkey", fk.source, fk.columns.join("_")));
            source.foreign_keys.push(ForeignKey {
                constraint_name: name,
                source_table: fk.source,
                target_table: fk.target,
                column_pairs: fk
                    .columns
                    .into_iter()
                    .zip(target_columns)
                    .enumerate()
                    .map(|(i, (source_column, target_column))| ColumnPair {
                        position: i as u32 + 1,
                        source_column,
                        target_column,
                    })
                    .collect(),
                cardinality: None,
                is_custom: false,
            });
        }

        SchemaDescription { tables: self.tables }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(fk: &ForeignKey) -> Vec<(&str, &str)> {
        fk.column_pairs
            .iter()
            .map(|p| (p.source_column.as_str(), p.target_column.as_str()))
            .collect()
    }

    #[test]
    fn test_parse_simple_table() {
        let sql = r#"
            CREATE TABLE users (
                id INT PRIMARY KEY,
                email VARCHAR(255) NOT NULL UNIQUE,
                created_at timestamp with time zone DEFAULT now()
            );
        "#;

        let schema = parse_sql(sql, Dialect::Generic).unwrap();
        assert_eq!(schema.tables.len(), 1);

        let users = &schema.tables[0];
        assert_eq!(users.table_name, "users");
        assert_eq!(users.primary_key, vec!["id"]);
        let cols: Vec<(&str, &str)> = users.columns.iter().map(|c| (c.name.as_str(), c.typ.as_str())).collect();
        assert_eq!(
            cols,
            vec![
                ("id", "int"),
                ("email", "varchar(255)"),
                ("created_at", "timestamp with time zone"),
            ]
        );
    }

    #[test]
    fn test_inline_reference() {
        let sql = r#"
            CREATE TABLE users (id INT PRIMARY KEY);
            CREATE TABLE orders (
                id INT PRIMARY KEY,
                user_id INT REFERENCES users(id) ON DELETE CASCADE,
                owner_id INT CONSTRAINT fk_owner REFERENCES users
            );
        "#;

        let schema = parse_sql(sql, Dialect::Generic).unwrap();
        let orders = schema.table("orders").unwrap();
        assert_eq!(orders.foreign_keys.len(), 2);

        let first = &orders.foreign_keys[0];
        assert_eq!(first.constraint_name, "orders_user_id_fkey");
        assert_eq!(first.target_table, "users");
        assert_eq!(pairs(first), vec![("user_id", "id")]);

        let second = &orders.foreign_keys[1];
        assert_eq!(second.constraint_name, "fk_owner");
        assert_eq!(pairs(second), vec![("owner_id", "id")]);
    }

    #[test]
    fn test_composite_table_constraint() {
        let sql = r#"
            CREATE TABLE film_actor (
                actor_id INT NOT NULL,
                film_id INT NOT NULL,
                PRIMARY KEY (actor_id, film_id)
            );
            CREATE TABLE casting_note (
                id INT PRIMARY KEY,
                actor_id INT,
                film_id INT,
                CONSTRAINT fk_note_cast FOREIGN KEY (actor_id, film_id)
                    REFERENCES film_actor (actor_id, film_id) ON UPDATE CASCADE
            );
        "#;

        let schema = parse_sql(sql, Dialect::Generic).unwrap();
        assert_eq!(schema.table("film_actor").unwrap().primary_key, vec!["actor_id", "film_id"]);

        let fk = &schema.table("casting_note").unwrap().foreign_keys[0];
        assert_eq!(fk.constraint_name, "fk_note_cast");
        assert_eq!(pairs(fk), vec![("actor_id", "actor_id"), ("film_id", "film_id")]);
        assert_eq!(fk.column_pairs[1].position, 2);
    }

    #[test]
    fn test_pg_dump_alter_table() {
        let sql = r#"
            -- PostgreSQL database dump
            CREATE TABLE public.Rental (rental_id integer NOT NULL, inventory_id integer NOT NULL);
            CREATE TABLE public.inventory (inventory_id integer NOT NULL);
            ALTER TABLE ONLY public.inventory ADD CONSTRAINT inventory_pkey PRIMARY KEY (inventory_id);
            ALTER TABLE ONLY public.rental
                ADD CONSTRAINT rental_inventory_id_fkey FOREIGN KEY (inventory_id)
                REFERENCES public.inventory ON UPDATE CASCADE ON DELETE RESTRICT;
            CREATE INDEX idx_fk_inventory_id ON public.rental USING btree (inventory_id);
        "#;

        let schema = parse_sql(sql, Dialect::Auto).unwrap();
        // Unquoted names fold to lower case in PostgreSQL.
        let rental = schema.table("rental").unwrap();
        assert_eq!(schema.table("inventory").unwrap().primary_key, vec!["inventory_id"]);
        assert_eq!(rental.foreign_keys[0].constraint_name, "rental_inventory_id_fkey");
        assert_eq!(pairs(&rental.foreign_keys[0]), vec![("inventory_id", "inventory_id")]);
    }

    #[test]
    fn test_mysql_dump() {
        let sql = r#"
            CREATE TABLE `Store` (
              `store_id` tinyint unsigned NOT NULL AUTO_INCREMENT,
              PRIMARY KEY (`store_id`)
            ) ENGINE=InnoDB;
            CREATE TABLE `staff` (
              `staff_id` tinyint unsigned NOT NULL AUTO_INCREMENT,
              `store_id` tinyint unsigned NOT NULL,
              PRIMARY KEY (`staff_id`),
              KEY `idx_fk_store_id` (`store_id`),
              CONSTRAINT `fk_staff_store` FOREIGN KEY (`store_id`) REFERENCES `Store` (`store_id`) ON DELETE RESTRICT
            ) ENGINE=InnoDB;
        "#;

        let schema = parse_sql(sql, Dialect::Auto).unwrap();
        let staff = schema.table("staff").unwrap();
        assert_eq!(staff.primary_key, vec!["staff_id"]);
        assert_eq!(staff.columns.len(), 2);
        assert_eq!(staff.columns[0].typ, "tinyint unsigned");
        assert_eq!(staff.foreign_keys[0].target_table, "Store");
        assert_eq!(staff.foreign_keys[0].constraint_name, "fk_staff_store");
    }

    #[test]
    fn test_reference_outside_dump_dropped() {
        let sql = "CREATE TABLE t (id INT PRIMARY KEY, other_id INT REFERENCES elsewhere(id));";
        let schema = parse_sql(sql, Dialect::Generic).unwrap();
        assert!(schema.tables[0].foreign_keys.is_empty());
    }

    #[test]
    fn test_unterminated_table_is_error() {
        let err = parse_sql("CREATE TABLE t (id INT", Dialect::Generic).unwrap_err();
        assert!(matches!(err, SqlParseError::UnexpectedEof(name) if name == "t"));

        let err = parse_sql("CREATE TABLE t (id INT, FOREIGN KEY x);", Dialect::Generic).unwrap_err();
        assert!(matches!(err, SqlParseError::Expected { expected: "(", .. }));
    }
}
