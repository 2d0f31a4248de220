use super::{Domain, DomainError, DomainItem};

/// Conjunction of several domains, in order.
///
/// `[(1, '=', 1)]` and empty domains are skipped, a `[(0, '=', 1)]` input
/// short-circuits to itself. `n` contributing domains are normalized and
/// prefixed with `n - 1` `&` operators. With nothing contributing the
/// result is `[(1, '=', 1)]`.
///
/// # Errors
///
/// Returns [`DomainError::Malformed`] if any input fails to normalize.
pub fn and_all(domains: &[Domain]) -> Result<Domain, DomainError> {
    combine(
        &DomainItem::And,
        &Domain::true_domain(),
        &Domain::false_domain(),
        domains,
    )
}

/// Disjunction of several domains, the dual of [`and_all`].
///
/// # Errors
///
/// Returns [`DomainError::Malformed`] if any input fails to normalize.
pub fn or_all(domains: &[Domain]) -> Result<Domain, DomainError> {
    combine(
        &DomainItem::Or,
        &Domain::false_domain(),
        &Domain::true_domain(),
        domains,
    )
}

fn combine(
    operator: &DomainItem,
    unit: &Domain,
    zero: &Domain,
    domains: &[Domain],
) -> Result<Domain, DomainError> {
    if domains.len() == 1 && domains[0] == *unit {
        return Ok(unit.clone());
    }

    let mut body = Vec::new();
    let mut count = 0usize;
    for domain in domains {
        if domain == unit || domain.is_empty() {
            continue;
        }
        if domain == zero {
            return Ok(zero.clone());
        }
        body.extend(domain.normalize()?.into_items());
        count += 1;
    }

    if count == 0 {
        return Ok(unit.clone());
    }

    let mut items = vec![operator.clone(); count - 1];
    items.extend(body);
    Ok(Domain::from_items(items))
}

#[cfg(test)]
mod tests {
    use super::{and_all, or_all};
    use crate::domain::{Domain, DomainItem, Operator};

    fn active(flag: bool) -> Domain {
        Domain::leaf("active", Operator::Eq, flag)
    }

    #[test]
    fn and_is_order_preserving() {
        let combined = and_all(&[active(true), active(false)]).expect("and");
        assert_eq!(
            combined.to_string(),
            "['&', ('active', '=', True), ('active', '=', False)]"
        );
    }

    #[test]
    fn single_domain_gets_no_operator() {
        let combined = and_all(&[active(true)]).expect("and");
        assert_eq!(combined, active(true));
    }

    #[test]
    fn units_are_skipped_and_zero_wins() {
        let combined = and_all(&[Domain::true_domain(), active(true), Domain::new()]).expect("and");
        assert_eq!(combined, active(true));

        let zeroed = and_all(&[active(true), Domain::false_domain()]).expect("and");
        assert_eq!(zeroed, Domain::false_domain());

        let ored = or_all(&[active(true), Domain::true_domain()]).expect("or");
        assert_eq!(ored, Domain::true_domain());
    }

    #[test]
    fn nothing_contributing_yields_unit() {
        assert_eq!(and_all(&[]).expect("and"), Domain::true_domain());
        assert_eq!(or_all(&[Domain::new()]).expect("or"), Domain::false_domain());
    }

    #[test]
    fn inputs_are_normalized_before_joining() {
        let implicit = Domain::from_items(vec![
            DomainItem::Leaf(crate::domain::Condition::new("a", Operator::Eq, 1)),
            DomainItem::Leaf(crate::domain::Condition::new("b", Operator::Eq, 2)),
        ]);
        let combined = or_all(&[implicit, active(true)]).expect("or");
        assert_eq!(
            combined.to_string(),
            "['|', '&', ('a', '=', 1), ('b', '=', 2), ('active', '=', True)]"
        );
    }

    #[test]
    fn malformed_input_is_reported() {
        let broken = Domain::from_items(vec![DomainItem::Or]);
        assert!(and_all(&[broken, active(true)]).is_err());
    }
}
