//! Rendering of [`EligibilityPredicate`]s into parameterized SQL.
//!
//! Column names come from closed enums in `shotserver_core::matching`; every
//! value goes through `push_bind`. Nothing a factory declares is ever
//! spliced into the query text.

use shotserver_core::matching::{Condition, EligibilityPredicate};
use sqlx::{Postgres, QueryBuilder};

/// Append ` AND (<condition>)` for each factory-level condition.
pub fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, predicate: &EligibilityPredicate) {
    for condition in &predicate.conditions {
        qb.push(" AND ");
        push_condition(qb, condition);
    }
}

/// Render one condition as `(col IS NULL OR col = $n)` or
/// `(col IS NULL OR col = ANY($n))`.
pub fn push_condition(qb: &mut QueryBuilder<'_, Postgres>, condition: &Condition) {
    match condition {
        Condition::TextEquals { column, value } => {
            let col = column.sql();
            qb.push(format!("({col} IS NULL OR {col} = "));
            qb.push_bind(value.clone());
            qb.push(")");
        }
        Condition::TextIn { column, values } => {
            let col = column.sql();
            qb.push(format!("({col} IS NULL OR {col} = ANY("));
            qb.push_bind(values.clone());
            qb.push("))");
        }
        Condition::IntIn { column, values } => {
            let col = column.sql();
            qb.push(format!("({col} IS NULL OR {col} = ANY("));
            qb.push_bind(values.clone());
            qb.push("))");
        }
    }
}

/// Append the exclusion list, if any.
pub fn push_exclusions(qb: &mut QueryBuilder<'_, Postgres>, predicate: &EligibilityPredicate) {
    if predicate.excluded_jobs.is_empty() {
        return;
    }
    qb.push(" AND j.id <> ALL(");
    qb.push_bind(predicate.excluded_jobs.clone());
    qb.push(")");
}

#[cfg(test)]
mod tests {
    use super::*;
    use shotserver_core::matching::{Capabilities, IntColumn, TextColumn};

    fn rendered(predicate: &EligibilityPredicate) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 WHERE true");
        push_conditions(&mut qb, predicate);
        push_exclusions(&mut qb, predicate);
        qb.sql().to_string()
    }

    #[test]
    fn factory_conditions_use_placeholders() {
        let caps = Capabilities {
            factory_id: 1,
            platform: "Linux'; DROP TABLE jobs; --".into(),
            screen_widths: vec![1024],
            ..Default::default()
        };
        let sql = rendered(&EligibilityPredicate::for_factory(&caps));
        assert!(!sql.contains("DROP TABLE"));
        assert!(sql.contains("(j.platform IS NULL OR j.platform = $1)"));
        assert!(sql.contains("(g.width IS NULL OR g.width = ANY($2))"));
        assert!(sql.contains("(g.bits_per_pixel IS NULL OR g.bits_per_pixel = ANY($3))"));
        assert!(sql.contains("(g.media IS NULL OR g.media = ANY($4))"));
    }

    #[test]
    fn exclusions_only_rendered_when_present() {
        let mut predicate = EligibilityPredicate::default().with(Condition::IntIn {
            column: IntColumn::Width,
            values: vec![800],
        });
        assert!(!rendered(&predicate).contains("<> ALL"));

        predicate.exclude(9);
        assert!(rendered(&predicate).ends_with(" AND j.id <> ALL($2)"));
    }

    #[test]
    fn text_in_renders_any() {
        let predicate = EligibilityPredicate::default().with(Condition::TextIn {
            column: TextColumn::Media,
            values: vec!["vlc".into()],
        });
        assert_eq!(
            rendered(&predicate),
            "SELECT 1 WHERE true AND (g.media IS NULL OR g.media = ANY($1))"
        );
    }
}
