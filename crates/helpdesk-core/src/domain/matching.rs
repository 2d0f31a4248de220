//! In-process evaluation of a domain against a [`RecordView`].
//!
//! Used by the stores to answer catalog searches without a query planner.
//! Dotted paths (`project_id.active`) walk related records; a to-many step
//! matches when any related record matches.

use super::{Condition, Domain, DomainError, DomainItem, Field, Operator, RecordView, Value};

impl Domain {
    /// Evaluate this domain against `record`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Malformed`] for an incomplete expression and
    /// [`DomainError::UnknownField`] when a leaf names a field the record
    /// does not carry.
    pub fn matches(&self, record: &RecordView) -> Result<bool, DomainError> {
        let normalized = self.normalize()?;
        let items = normalized.items();
        let (result, consumed) = eval_at(items, 0, record)?;
        if consumed != items.len() {
            return Err(DomainError::Malformed(self.to_string()));
        }
        Ok(result)
    }
}

fn eval_at(
    items: &[DomainItem],
    pos: usize,
    record: &RecordView,
) -> Result<(bool, usize), DomainError> {
    let Some(item) = items.get(pos) else {
        return Err(DomainError::Malformed(Domain::from_items(items.to_vec()).to_string()));
    };
    match item {
        DomainItem::And | DomainItem::Or => {
            let (left, next) = eval_at(items, pos + 1, record)?;
            let (right, end) = eval_at(items, next, record)?;
            let result = if matches!(item, DomainItem::And) {
                left && right
            } else {
                left || right
            };
            Ok((result, end))
        }
        DomainItem::Not => {
            let (inner, end) = eval_at(items, pos + 1, record)?;
            Ok((!inner, end))
        }
        DomainItem::Leaf(cond) => Ok((leaf_matches(cond, record)?, pos + 1)),
        DomainItem::Constant(flag) => Ok((*flag, pos + 1)),
        DomainItem::Group(inner) => Ok((inner.matches(record)?, pos + 1)),
    }
}

/// Values reachable through `path`. Unset values contribute nothing.
fn resolve(record: &RecordView, path: &str) -> Result<Vec<Value>, DomainError> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    if record.is_empty() {
        return Ok(Vec::new());
    }

    if head == "id" && rest.is_none() {
        return Ok(record.id().map(Value::Int).into_iter().collect());
    }

    let field = record.field(head).ok_or_else(|| DomainError::UnknownField {
        model: record.model().to_string(),
        field: head.to_string(),
    })?;

    match (field, rest) {
        (Field::Scalar(value), None) => Ok(if value.is_falsy_marker() {
            Vec::new()
        } else {
            vec![value.clone()]
        }),
        (Field::Scalar(_), Some(_)) => Err(DomainError::UnknownField {
            model: record.model().to_string(),
            field: path.to_string(),
        }),
        (Field::One(related), None) => Ok(related.id().map(Value::Int).into_iter().collect()),
        (Field::One(related), Some(rest)) => resolve(related, rest),
        (Field::Many(related), None) => {
            Ok(related.iter().filter_map(RecordView::id).map(Value::Int).collect())
        }
        (Field::Many(related), Some(rest)) => {
            let mut out = Vec::new();
            for r in related {
                out.extend(resolve(r, rest)?);
            }
            Ok(out)
        }
    }
}

fn leaf_matches(cond: &Condition, record: &RecordView) -> Result<bool, DomainError> {
    let candidates = resolve(record, &cond.field)?;
    let value = &cond.value;

    let result = match cond.operator {
        Operator::Eq => equals(&candidates, value),
        Operator::Ne => !equals(&candidates, value),
        Operator::In | Operator::ChildOf | Operator::ParentOf => member_of(&candidates, value),
        Operator::NotIn => !member_of(&candidates, value),
        Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => candidates.iter().any(|c| {
            c.loose_cmp(value).is_some_and(|ord| match cond.operator {
                Operator::Lt => ord.is_lt(),
                Operator::Le => ord.is_le(),
                Operator::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            })
        }),
        Operator::Like => contains_text(&candidates, value, false),
        Operator::Ilike => contains_text(&candidates, value, true),
        Operator::NotLike => !contains_text(&candidates, value, false),
        Operator::NotIlike => !contains_text(&candidates, value, true),
        Operator::EqLike => pattern_match(&candidates, value, false),
        Operator::EqIlike => pattern_match(&candidates, value, true),
    };
    Ok(result)
}

fn equals(candidates: &[Value], value: &Value) -> bool {
    if value.is_falsy_marker() {
        return candidates.is_empty();
    }
    candidates.iter().any(|c| c.loose_eq(value))
}

fn member_of(candidates: &[Value], value: &Value) -> bool {
    let options: &[Value] = match value {
        Value::List(items) => items,
        single => std::slice::from_ref(single),
    };
    if candidates.is_empty() {
        return options.iter().any(Value::is_falsy_marker);
    }
    candidates
        .iter()
        .any(|c| options.iter().any(|o| c.loose_eq(o)))
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

fn contains_text(candidates: &[Value], needle: &Value, fold_case: bool) -> bool {
    if needle.is_falsy_marker() {
        return candidates.is_empty();
    }
    let needle = plain_text(needle);
    candidates.iter().any(|c| {
        let hay = plain_text(c);
        if fold_case {
            hay.to_lowercase().contains(&needle.to_lowercase())
        } else {
            hay.contains(&needle)
        }
    })
}

fn pattern_match(candidates: &[Value], pattern: &Value, fold_case: bool) -> bool {
    let pattern = plain_text(pattern);
    let pattern: Vec<char> = if fold_case {
        pattern.to_lowercase().chars().collect()
    } else {
        pattern.chars().collect()
    };
    candidates.iter().any(|c| {
        let text = plain_text(c);
        let text: Vec<char> = if fold_case {
            text.to_lowercase().chars().collect()
        } else {
            text.chars().collect()
        };
        sql_like(&text, &pattern)
    })
}

/// SQL `LIKE` with `%` (any run) and `_` (any single char).
fn sql_like(text: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('%', rest)) => (0..=text.len()).any(|skip| sql_like(&text[skip..], rest)),
        Some(('_', rest)) => !text.is_empty() && sql_like(&text[1..], rest),
        Some((ch, rest)) => text.first() == Some(ch) && sql_like(&text[1..], rest),
    }
}

#[cfg(test)]
mod tests {
    use super::sql_like;
    use crate::domain::{Domain, DomainError, DomainItem, Operator, RecordView, Value, and_all, or_all};

    fn project() -> RecordView {
        RecordView::new("project.project", 4)
            .with("name", "Website Revamp")
            .with("active", true)
            .with("sequence", 10)
            .with_one("partner_id", RecordView::new("res.partner", 7).with("name", "Acme"))
            .with_one("company_id", RecordView::empty("res.company"))
            .with_many(
                "tag_ids",
                vec![RecordView::new("project.tags", 1), RecordView::new("project.tags", 2)],
            )
    }

    fn check(domain: &Domain) -> bool {
        domain.matches(&project()).expect("evaluate")
    }

    #[test]
    fn equality_and_false_convention() {
        assert!(check(&Domain::leaf("active", Operator::Eq, true)));
        assert!(check(&Domain::leaf("partner_id", Operator::Eq, 7)));
        assert!(check(&Domain::leaf("company_id", Operator::Eq, false)));
        assert!(check(&Domain::leaf("partner_id", Operator::Ne, false)));
        assert!(!check(&Domain::leaf("partner_id", Operator::Eq, 8)));
    }

    #[test]
    fn dotted_paths_walk_relations() {
        assert!(check(&Domain::leaf("partner_id.name", Operator::Eq, "Acme")));
        assert!(!check(&Domain::leaf("company_id.name", Operator::Eq, "Acme")));
    }

    #[test]
    fn membership_on_many_relations() {
        let wanted = Value::List(vec![Value::Int(2), Value::Int(5)]);
        assert!(check(&Domain::leaf("tag_ids", Operator::In, wanted.clone())));
        assert!(!check(&Domain::leaf("tag_ids", Operator::NotIn, wanted)));
        assert!(check(&Domain::leaf("id", Operator::In, Value::List(vec![Value::Int(4)]))));
    }

    #[test]
    fn text_and_ordering_operators() {
        assert!(check(&Domain::leaf("name", Operator::Ilike, "revamp")));
        assert!(!check(&Domain::leaf("name", Operator::Like, "revamp")));
        assert!(check(&Domain::leaf("name", Operator::EqLike, "Web%")));
        assert!(check(&Domain::leaf("name", Operator::EqIlike, "website_revamp")));
        assert!(check(&Domain::leaf("sequence", Operator::Ge, 10)));
        assert!(!check(&Domain::leaf("sequence", Operator::Lt, 10)));
    }

    #[test]
    fn prefix_operators_compose() {
        let either = or_all(&[
            Domain::leaf("active", Operator::Eq, false),
            Domain::leaf("partner_id", Operator::Eq, 7),
        ])
        .expect("or");
        assert!(check(&either));

        let mut negated = Domain::from_items(vec![DomainItem::Not]);
        for item in Domain::leaf("active", Operator::Eq, true).into_items() {
            negated.push(item);
        }
        assert!(!check(&negated));

        let both = and_all(&[either, Domain::false_domain()]).expect("and");
        assert!(!check(&both));
    }

    #[test]
    fn groups_match_as_conjunction() {
        let group = Domain::from_items(vec![DomainItem::Group(Domain::from_items(vec![
            DomainItem::Leaf(crate::domain::Condition::new("active", Operator::Eq, true)),
            DomainItem::Leaf(crate::domain::Condition::new("partner_id", Operator::Eq, 9)),
        ]))]);
        assert!(!check(&group));
    }

    #[test]
    fn unknown_fields_are_reported() {
        let err = Domain::leaf("stage", Operator::Eq, 1)
            .matches(&project())
            .expect_err("unknown field");
        assert!(matches!(err, DomainError::UnknownField { .. }));
    }

    #[test]
    fn like_patterns() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert!(sql_like(&chars("abc"), &chars("a%")));
        assert!(sql_like(&chars("abc"), &chars("_b_")));
        assert!(!sql_like(&chars("abc"), &chars("_b")));
        assert!(sql_like(&chars(""), &chars("%")));
    }
}
