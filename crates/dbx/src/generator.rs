//! INSERT / UPDATE generation from tagged records.
//!
//! Columns are emitted in column-name order. A column's `insert` or `update`
//! override replaces its placeholder with raw SQL and contributes no argument.

use crate::error::{OrmError, OrmResult};
use crate::named::{Placeholder, Positional};
use crate::reflect::{Column, Record, Table, reflect};
use crate::value::Value;

/// Statement generator for one placeholder style.
#[derive(Debug, Clone, Copy, Default)]
pub struct Generator {
    placeholder: Placeholder,
}

impl Generator {
    pub fn new(placeholder: Placeholder) -> Self {
        Self { placeholder }
    }

    pub fn placeholder(&self) -> Placeholder {
        self.placeholder
    }

    /// Build the INSERT for `record`.
    ///
    /// The auto-increment column is left out of the statement and kept as a
    /// handle so the generated id can be written back with
    /// [`InsertSql::assign_id`].
    pub fn insert_sql<T: Record + Table>(&self, record: &T) -> OrmResult<InsertSql<T>> {
        let mapping = reflect(record)?;
        if mapping.is_empty() {
            return Err(OrmError::mapping("not found insert columns"));
        }

        let mut auto_increment = None;
        let mut columns = Vec::with_capacity(mapping.len());
        let mut terms = Vec::with_capacity(mapping.len());
        let mut args = Vec::new();
        let mut positional = Positional::new(self.placeholder);

        for field in mapping {
            let binding = field.binding();
            if binding.auto_increment {
                auto_increment = Some(field.column());
                continue;
            }

            columns.push(field.name());
            match binding.insert.as_deref().or(binding.update.as_deref()) {
                Some(expr) => terms.push(expr.to_string()),
                None => {
                    let mut term = String::new();
                    positional.push(&mut term);
                    terms.push(term);
                    args.push(field.into_value());
                }
            }
        }

        let table = T::table_name();
        let sql = if columns.is_empty() {
            format!("insert into {table} default values")
        } else {
            format!(
                "insert into {table}({}) values({})",
                columns.join(", "),
                terms.join(", ")
            )
        };

        Ok(InsertSql {
            sql,
            args,
            auto_increment,
        })
    }

    /// Build the UPDATE for `record`, keyed by its primary key.
    ///
    /// With an empty `columns` every non-key column is written; otherwise only
    /// the named ones are.
    pub fn update_sql<T: Record + Table>(&self, record: &T, columns: &[&str]) -> OrmResult<UpdateSql> {
        let mapping = reflect(record)?;
        if mapping.is_empty() {
            return Err(OrmError::mapping("not found update columns"));
        }

        if T::columns().primary_key_count() > 1 {
            return Err(OrmError::mapping(format!(
                "composite primary keys are not supported ({})",
                std::any::type_name::<T>()
            )));
        }
        let Some(key) = mapping.primary_keys().next() else {
            return Err(OrmError::mapping(format!(
                "no primary key in {}",
                std::any::type_name::<T>()
            )));
        };

        if let Some(unknown) = columns.iter().find(|c| !mapping.contains(c)) {
            return Err(OrmError::UnknownColumn((*unknown).to_string()));
        }

        let mut assignments = Vec::new();
        let mut args = Vec::new();
        let mut positional = Positional::new(self.placeholder);

        for field in mapping.iter() {
            let binding = field.binding();
            if binding.primary_key || !(columns.is_empty() || columns.contains(&field.name())) {
                continue;
            }

            let mut assignment = format!("{} = ", field.name());
            match binding.update.as_deref() {
                Some(expr) => assignment.push_str(expr),
                None => {
                    positional.push(&mut assignment);
                    args.push(field.value().clone());
                }
            }
            assignments.push(assignment);
        }

        if assignments.is_empty() {
            return Err(OrmError::mapping(format!(
                "no columns to update in {}",
                std::any::type_name::<T>()
            )));
        }

        let mut sql = format!(
            "update {} set {} where {} = ",
            T::table_name(),
            assignments.join(", "),
            key.name()
        );
        positional.push(&mut sql);
        args.push(key.value().clone());

        Ok(UpdateSql { sql, args })
    }
}

/// A generated INSERT.
#[derive(Debug)]
pub struct InsertSql<T: 'static> {
    pub sql: String,
    pub args: Vec<Value>,
    auto_increment: Option<&'static Column<T>>,
}

impl<T: 'static> InsertSql<T> {
    /// Name of the auto-increment column, if the record has one.
    pub fn auto_increment_column(&self) -> Option<&'static str> {
        self.auto_increment.map(|column| column.name())
    }

    /// Write a database-generated id into the auto-increment field.
    ///
    /// A no-op for records without one.
    pub fn assign_id(&self, record: &mut T, id: i64) -> OrmResult<()> {
        match self.auto_increment {
            Some(column) => column.set(record, Value::I64(id)),
            None => Ok(()),
        }
    }
}

/// A generated UPDATE. The primary-key value is the last argument.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSql {
    pub sql: String,
    pub args: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::Columns;
    use std::sync::OnceLock;

    #[derive(Debug, Default, Clone)]
    struct Account {
        id: i64,
        name: String,
        email: String,
        updated_at: Option<chrono::NaiveDateTime>,
    }

    impl Record for Account {
        fn columns() -> &'static Columns<Self> {
            static COLUMNS: OnceLock<Columns<Account>> = OnceLock::new();
            COLUMNS.get_or_init(|| {
                Columns::builder()
                    .field(
                        "column:id,primary_key,auto_increment",
                        |r: &Account| &r.id,
                        |r: &mut Account| &mut r.id,
                    )
                    .field("column:name", |r: &Account| &r.name, |r: &mut Account| &mut r.name)
                    .field("column:email", |r: &Account| &r.email, |r: &mut Account| &mut r.email)
                    .field(
                        "column:updated_at,update:current_timestamp,insert:current_timestamp",
                        |r: &Account| &r.updated_at,
                        |r: &mut Account| &mut r.updated_at,
                    )
                    .build()
            })
        }
    }

    impl Table for Account {
        fn table_name() -> &'static str {
            "accounts"
        }
    }

    #[derive(Debug, Default)]
    struct Revision {
        id: i64,
        body: String,
        stamped_at: Option<chrono::NaiveDateTime>,
        touched_at: Option<chrono::NaiveDateTime>,
    }

    impl Record for Revision {
        fn columns() -> &'static Columns<Self> {
            static COLUMNS: OnceLock<Columns<Revision>> = OnceLock::new();
            COLUMNS.get_or_init(|| {
                Columns::builder()
                    .field("column:id,primary_key", |r: &Revision| &r.id, |r: &mut Revision| &mut r.id)
                    .field("column:body", |r: &Revision| &r.body, |r: &mut Revision| &mut r.body)
                    .field(
                        "column:stamped_at,insert:now(),update:clock_timestamp()",
                        |r: &Revision| &r.stamped_at,
                        |r: &mut Revision| &mut r.stamped_at,
                    )
                    .field(
                        "column:touched_at,update:clock_timestamp()",
                        |r: &Revision| &r.touched_at,
                        |r: &mut Revision| &mut r.touched_at,
                    )
                    .build()
            })
        }
    }

    impl Table for Revision {
        fn table_name() -> &'static str {
            "revisions"
        }
    }

    #[derive(Debug, Default)]
    struct Membership {
        user_id: i64,
        group_id: i64,
        role: String,
    }

    impl Record for Membership {
        fn columns() -> &'static Columns<Self> {
            static COLUMNS: OnceLock<Columns<Membership>> = OnceLock::new();
            COLUMNS.get_or_init(|| {
                Columns::builder()
                    .field(
                        "column:user_id,primary_key",
                        |r: &Membership| &r.user_id,
                        |r: &mut Membership| &mut r.user_id,
                    )
                    .field(
                        "column:group_id,primary_key",
                        |r: &Membership| &r.group_id,
                        |r: &mut Membership| &mut r.group_id,
                    )
                    .field("column:role", |r: &Membership| &r.role, |r: &mut Membership| &mut r.role)
                    .build()
            })
        }
    }

    impl Table for Membership {
        fn table_name() -> &'static str {
            "memberships"
        }
    }

    #[derive(Debug, Default)]
    struct Note {
        body: String,
    }

    impl Record for Note {
        fn columns() -> &'static Columns<Self> {
            static COLUMNS: OnceLock<Columns<Note>> = OnceLock::new();
            COLUMNS.get_or_init(|| {
                Columns::builder()
                    .field("column:body", |r: &Note| &r.body, |r: &mut Note| &mut r.body)
                    .build()
            })
        }
    }

    impl Table for Note {
        fn table_name() -> &'static str {
            "notes"
        }
    }

    fn account() -> Account {
        Account {
            id: 5,
            name: "ann".into(),
            email: "ann@example.com".into(),
            updated_at: None,
        }
    }

    #[test]
    fn insert_skips_auto_increment_and_uses_overrides() {
        let insert = Generator::default().insert_sql(&account()).unwrap();
        assert_eq!(
            insert.sql,
            "insert into accounts(email, name, updated_at) values(?, ?, current_timestamp)"
        );
        assert_eq!(
            insert.args,
            vec![Value::from("ann@example.com"), Value::from("ann")]
        );
        assert_eq!(insert.auto_increment_column(), Some("id"));
    }

    #[test]
    fn assign_id_writes_back() {
        let mut record = account();
        let insert = Generator::default().insert_sql(&record).unwrap();
        insert.assign_id(&mut record, 42).unwrap();
        assert_eq!(record.id, 42);
    }

    #[test]
    fn dollar_placeholders_are_numbered() {
        let generator = Generator::new(Placeholder::Dollar);
        let insert = generator.insert_sql(&account()).unwrap();
        assert_eq!(
            insert.sql,
            "insert into accounts(email, name, updated_at) values($1, $2, current_timestamp)"
        );

        let update = generator.update_sql(&account(), &[]).unwrap();
        assert_eq!(
            update.sql,
            "update accounts set email = $1, name = $2, updated_at = current_timestamp where id = $3"
        );
    }

    #[test]
    fn update_puts_primary_key_last() {
        let update = Generator::default().update_sql(&account(), &[]).unwrap();
        assert_eq!(
            update.sql,
            "update accounts set email = ?, name = ?, updated_at = current_timestamp where id = ?"
        );
        assert_eq!(
            update.args,
            vec![
                Value::from("ann@example.com"),
                Value::from("ann"),
                Value::I64(5)
            ]
        );
    }

    #[test]
    fn update_with_subset_touches_only_those_columns() {
        let update = Generator::default()
            .update_sql(&account(), &["name", "id"])
            .unwrap();
        assert_eq!(update.sql, "update accounts set name = ? where id = ?");
        assert_eq!(update.args, vec![Value::from("ann"), Value::I64(5)]);
    }

    #[test]
    fn update_rejects_unknown_columns() {
        let err = Generator::default()
            .update_sql(&account(), &["nope"])
            .unwrap_err();
        assert!(matches!(err, OrmError::UnknownColumn(ref c) if c == "nope"));
    }

    #[test]
    fn update_requires_a_primary_key() {
        let note = Note { body: "x".into() };
        let err = Generator::default().update_sql(&note, &[]).unwrap_err();
        assert!(err.to_string().contains("no primary key"));
    }

    #[test]
    fn update_with_only_the_key_selected_is_empty() {
        let err = Generator::default()
            .update_sql(&account(), &["id"])
            .unwrap_err();
        assert!(matches!(err, OrmError::Mapping(_)));
    }

    #[test]
    fn insert_without_auto_increment_has_no_handle() {
        let mut note = Note { body: "x".into() };
        let insert = Generator::default().insert_sql(&note).unwrap();
        assert_eq!(insert.sql, "insert into notes(body) values(?)");
        assert_eq!(insert.auto_increment_column(), None);
        insert.assign_id(&mut note, 1).unwrap();
    }

    #[test]
    fn insert_override_wins_and_update_override_falls_back() {
        let revision = Revision {
            id: 3,
            body: "draft".into(),
            ..Default::default()
        };
        let insert = Generator::default().insert_sql(&revision).unwrap();
        assert_eq!(
            insert.sql,
            "insert into revisions(body, id, stamped_at, touched_at) values(?, ?, now(), clock_timestamp())"
        );
        assert_eq!(insert.args, vec![Value::from("draft"), Value::I64(3)]);

        let update = Generator::default().update_sql(&revision, &[]).unwrap();
        assert_eq!(
            update.sql,
            "update revisions set body = ?, stamped_at = clock_timestamp(), touched_at = clock_timestamp() where id = ?"
        );
        assert_eq!(update.args, vec![Value::from("draft"), Value::I64(3)]);
    }

    #[test]
    fn update_rejects_composite_keys() {
        assert_eq!(Membership::columns().primary_key_count(), 2);
        let membership = Membership {
            user_id: 1,
            group_id: 2,
            role: "admin".into(),
        };
        let err = Generator::default().update_sql(&membership, &[]).unwrap_err();
        assert!(err.to_string().contains("composite primary keys"));

        let insert = Generator::default().insert_sql(&membership).unwrap();
        assert_eq!(
            insert.sql,
            "insert into memberships(group_id, role, user_id) values(?, ?, ?)"
        );
    }
}
