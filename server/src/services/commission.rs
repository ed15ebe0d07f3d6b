//! Commission split validation
//!
//! Pure functions, no database access. Every split goes through
//! `validate_split` before `CommissionSplit::upsert`.

use crate::error::{EscrowError, EscrowResult};
use crate::models::commission_split::SplitValues;
use crate::models::decimal::Decimal2;

fn check_range(name: &str, share: Decimal2) -> EscrowResult<()> {
    if share > Decimal2::HUNDRED {
        return Err(EscrowError::validation(format!(
            "{} must be between 0.00 and 100.00, got {}",
            name, share
        )));
    }
    Ok(())
}

/// Two-branch split invariant, exact at two decimals:
/// with a co-broker both shares are set and sum to 100.00,
/// without one the co-broker share is null and the broker takes 100.00.
pub fn validate_split(values: &SplitValues) -> EscrowResult<()> {
    check_range("broker_share_pct", values.broker_share)?;

    if values.has_co_broker() {
        let co_share = values.co_broker_share.ok_or_else(|| {
            EscrowError::validation("co_broker_share_pct is required when a co-broker is set")
        })?;
        check_range("co_broker_share_pct", co_share)?;

        let total = values
            .broker_share
            .checked_add(co_share)
            .ok_or_else(|| EscrowError::validation("Commission shares overflow"))?;
        if total != Decimal2::HUNDRED {
            return Err(EscrowError::validation(format!(
                "broker_share_pct and co_broker_share_pct must total 100.00, got {}",
                total
            )));
        }
    } else {
        if values.co_broker_share.is_some() {
            return Err(EscrowError::validation(
                "co_broker_share_pct must be empty without a co-broker",
            ));
        }
        if values.broker_share != Decimal2::HUNDRED {
            return Err(EscrowError::validation(
                "broker_share_pct must be 100.00 without a co-broker",
            ));
        }
    }

    Ok(())
}

/// Resolve the shares an invitation asks for.
///
/// With a co-broker email both percentages are required and must total
/// 100.00. Without one, any supplied percentages are ignored and the broker
/// gets the full commission.
pub fn shares_for_invitation(
    cobroker_email: Option<&str>,
    broker_share: Option<Decimal2>,
    co_broker_share: Option<Decimal2>,
) -> EscrowResult<(Decimal2, Option<Decimal2>)> {
    if cobroker_email.is_none() {
        return Ok((Decimal2::HUNDRED, None));
    }

    match (broker_share, co_broker_share) {
        (Some(broker), Some(co)) => {
            check_range("broker_share_pct", broker)?;
            check_range("co_broker_share_pct", co)?;
            let total = broker
                .checked_add(co)
                .ok_or_else(|| EscrowError::validation("Commission shares overflow"))?;
            if total != Decimal2::HUNDRED {
                return Err(EscrowError::validation(
                    "broker_share_pct and co_broker_share_pct must total 100.00",
                ));
            }
            Ok((broker, Some(co)))
        }
        _ => Err(EscrowError::validation(
            "broker_share_pct and co_broker_share_pct are required when a co-broker is specified",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(s: &str) -> Decimal2 {
        s.parse().unwrap()
    }

    fn split(co_email: Option<&str>, broker: &str, co: Option<&str>) -> SplitValues {
        SplitValues {
            transaction_id: "tx".into(),
            broker_id: "broker".into(),
            co_broker_id: None,
            co_broker_email: co_email.map(str::to_string),
            broker_share: pct(broker),
            co_broker_share: co.map(pct),
        }
    }

    #[test]
    fn test_split_with_co_broker_must_total_hundred() {
        assert!(validate_split(&split(Some("co@x.com"), "60.00", Some("40.00"))).is_ok());
        assert!(validate_split(&split(Some("co@x.com"), "60.00", Some("39.99"))).is_err());
        assert!(validate_split(&split(Some("co@x.com"), "60.01", Some("40.00"))).is_err());
        assert!(validate_split(&split(Some("co@x.com"), "100.00", None)).is_err());
    }

    #[test]
    fn test_split_without_co_broker() {
        assert!(validate_split(&split(None, "100.00", None)).is_ok());
        assert!(validate_split(&split(None, "99.99", None)).is_err());
        assert!(validate_split(&split(None, "60.00", Some("40.00"))).is_err());
    }

    #[test]
    fn test_resolved_co_broker_without_email_counts_as_present() {
        let mut values = split(None, "100.00", None);
        values.co_broker_id = Some("user-2".into());
        assert!(validate_split(&values).is_err());
    }

    #[test]
    fn test_share_out_of_range() {
        assert!(validate_split(&split(Some("co@x.com"), "100.01", Some("0"))).is_err());
        assert!(matches!(
            shares_for_invitation(Some("co@x.com"), Some(pct("150")), Some(pct("0"))),
            Err(EscrowError::Validation(_))
        ));
    }

    #[test]
    fn test_invitation_shares() {
        let (broker, co) =
            shares_for_invitation(Some("co@x.com"), Some(pct("60")), Some(pct("40"))).unwrap();
        assert_eq!(broker.to_string(), "60.00");
        assert_eq!(co.unwrap().to_string(), "40.00");

        assert_eq!(
            shares_for_invitation(None, Some(pct("10")), None).unwrap(),
            (Decimal2::HUNDRED, None)
        );

        assert!(shares_for_invitation(Some("co@x.com"), Some(pct("60")), None).is_err());
        assert!(shares_for_invitation(Some("co@x.com"), None, Some(pct("40"))).is_err());
        assert!(shares_for_invitation(Some("co@x.com"), Some(pct("50")), Some(pct("49.99"))).is_err());
        assert!(shares_for_invitation(Some("co@x.com"), Some(pct("50")), Some(pct("50.01"))).is_err());
    }
}
